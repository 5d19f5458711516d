//! Candidate filtering after synthesis.
//!
//! A synthesized candidate survives when it is complete and its allomorph
//! environments hold ([`is_word_valid`]), when no identical candidate came
//! before it, when no candidate with a higher-precedence allomorph of the
//! same morphemes exists ([`disjunctive_filter`]) and, for parsing, when it
//! reproduces the input ([`surface_filter`]).

use std::collections::BTreeSet;

use crate::chardef::CharacterDefinitionTable;
use crate::error::Result;
use crate::language::AllomorphInfo;
use crate::lexicon::EnvironmentKind;
use crate::rule::{RuleContext, WordSet};
use crate::shape::AllomorphId;
use crate::trace::FailureReason;
use crate::word::Word;

/// Whether `word` is a finished, well-formed word.
pub(crate) fn is_word_valid(word: &Word, ctx: &RuleContext<'_>) -> Result<bool> {
    if !word.realizational().is_unifiable(word.syntactic()) || word.current_morphological_rule().is_some() {
        ctx.trace.parse_failed(word, FailureReason::PartialParse, None);
        return Ok(false);
    }

    let missing = word
        .obligatory_features()
        .iter()
        .find(|&&feature| !word.syntactic().contains_deep(feature));
    if let Some(&feature) = missing {
        let name = ctx.language.syntactic_system().name(feature);
        ctx.trace
            .parse_failed(word, FailureReason::ObligatorySyntacticFeatures, Some(name));
        return Ok(false);
    }

    let shape = word.shape();
    for id in shape.morphs() {
        let morph = shape.morph(id);
        let info = ctx.index.allomorph(morph.allomorph())?;
        let environments = info.environments();
        if environments.is_empty() {
            continue;
        }
        let mut required = environments
            .iter()
            .filter(|env| env.kind() == EnvironmentKind::Required)
            .peekable();
        let required_holds = required.peek().is_none() || required.any(|env| env.is_match(shape, morph));
        let excluded_holds = environments
            .iter()
            .filter(|env| env.kind() == EnvironmentKind::Excluded)
            .any(|env| env.is_match(shape, morph));
        if !required_holds || excluded_holds {
            ctx.trace
                .parse_failed(word, FailureReason::Environment, Some(morph.allomorph().as_str()));
            return Ok(false);
        }
    }
    Ok(true)
}

/// Valid candidates, deduplicated, in input order.
pub(crate) fn valid_words(words: Vec<Word>, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
    let mut set = WordSet::new();
    for word in words {
        if is_word_valid(&word, ctx)? {
            set.insert(word);
        }
    }
    Ok(set.into_vec())
}

/// Drop candidates that lose to a higher-precedence allomorph.
///
/// Candidates built from the same morphemes compete when they differ in
/// exactly one allomorph. The one whose differing allomorph has the higher
/// precedence index loses unless the two allomorphs vary freely, or unless
/// its derivation never tried the other allomorph. Affix morphs carry the
/// indices tried when they were applied; root morphs carry none and always
/// compete.
pub(crate) fn disjunctive_filter(words: Vec<Word>, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
    let mut keys: Vec<Vec<KeyEntry<'_>>> = Vec::with_capacity(words.len());
    for word in &words {
        let key = word
            .distinct_morphs()
            .into_iter()
            .map(|id| {
                let morph = word.shape().morph(id);
                let info = ctx.index.allomorph(morph.allomorph())?;
                Ok(KeyEntry {
                    allomorph: morph.allomorph().clone(),
                    info,
                    tried: word.disjunctive_indices(morph.label()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        keys.push(key);
    }

    let loses = |i: usize| {
        keys.iter().enumerate().any(|(j, other)| {
            let mine = &keys[i];
            if i == j || mine.len() != other.len() {
                return false;
            }
            let same_morphemes = mine
                .iter()
                .zip(other)
                .all(|(a, b)| a.info.morpheme() == b.info.morpheme());
            if !same_morphemes {
                return false;
            }
            let mut differing = mine.iter().zip(other).filter(|(a, b)| a.allomorph != b.allomorph);
            match (differing.next(), differing.next()) {
                (Some((a, b)), None) => {
                    // Non-head morphs keep their own labels, so a set that
                    // lacks the morph's own index belongs to another morph.
                    let tried = a.tried.filter(|tried| tried.contains(&a.info.index()));
                    a.info.index() > b.info.index()
                        && !a.info.free_fluctuates_with(&b.allomorph)
                        && tried.map_or(true, |tried| tried.contains(&b.info.index()))
                }
                _ => false,
            }
        })
    };

    let discarded: Vec<bool> = (0..words.len()).map(loses).collect();
    let mut out = Vec::with_capacity(words.len());
    for (word, discard) in words.into_iter().zip(discarded) {
        if discard {
            ctx.trace.parse_failed(&word, FailureReason::DisjunctiveAllomorph, None);
        } else {
            out.push(word);
        }
    }
    Ok(out)
}

struct KeyEntry<'a> {
    allomorph: AllomorphId,
    info: &'a AllomorphInfo,
    tried: Option<&'a BTreeSet<usize>>,
}

/// Candidates whose surface form matches `surface`.
pub(crate) fn surface_filter(
    words: Vec<Word>,
    surface: &str,
    table: &CharacterDefinitionTable,
    ctx: &RuleContext<'_>,
) -> Vec<Word> {
    words
        .into_iter()
        .filter(|word| {
            if table.is_match(surface, word.shape()) {
                ctx.trace.parse_successful(word);
                true
            } else {
                ctx.trace.parse_failed(word, FailureReason::SurfaceFormMismatch, None);
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::feature::FeatureStruct;
    use crate::language::{GrammarIndex, Language};
    use crate::lexicon::{LexEntry, RootAllomorph};
    use crate::morpher::MorpherConfig;
    use crate::morphology::{AffixProcessAllomorph, AffixProcessRule, MorphologicalOutput, PatternPart};
    use crate::pattern::Pattern;
    use crate::shape::NodeKind;
    use crate::stratum::Stratum;
    use crate::trace::RecordingTraceManager;

    fn language() -> Language {
        let mut table = CharacterDefinitionTable::new("table");
        table.add_segment(&["a"], FeatureStruct::new());
        table.add_segment(&["b"], FeatureStruct::new());
        let table = Arc::new(table);

        let allomorph = |id: &str| {
            AffixProcessAllomorph::new(
                id,
                vec![PatternPart::new("stem", Pattern::new())],
                vec![MorphologicalOutput::copy("stem")],
            )
        };
        let plural = AffixProcessRule::new("pl").allomorph(allomorph("pl1")).allomorph(allomorph("pl2"));
        let root = LexEntry::new("e1", FeatureStruct::new())
            .with_allomorph(RootAllomorph::new("e1a", table.segment("ab").unwrap()));
        let stratum = Stratum::new("surface", table).morphological_rule(plural).entry(root);
        Language::new("toy").with_stratum(stratum)
    }

    /// Root `e1a` plus one suffix node of `allomorph`, applied after trying `tried`.
    fn suffixed(language: &Language, allomorph: &str, tried: &[usize]) -> Word {
        let entry = &language.strata()[0].entries()[0];
        let mut word = Word::from_root(entry, &entry.allomorphs()[0], 0).unwrap();
        let node = word.shape_mut().unwrap().push(NodeKind::Segment, FeatureStruct::new()).unwrap();
        word.mark_morph(&[node], &AllomorphId::new(allomorph)).unwrap();
        let tried: BTreeSet<usize> = tried.iter().copied().collect();
        word.current_morphological_rule_applied(Some(&tried)).unwrap();
        word.freeze();
        word
    }

    fn filter(language: &Language, words: Vec<Word>) -> (Vec<Vec<String>>, Vec<FailureReason>) {
        let index = GrammarIndex::build(language).unwrap();
        let config = MorpherConfig::default();
        let recorder = RecordingTraceManager::new();
        let ctx = RuleContext {
            language,
            index: &index,
            config: &config,
            trace: &recorder,
            rule_selector: None,
            entry_selector: None,
        };
        let kept = disjunctive_filter(words, &ctx)
            .unwrap()
            .iter()
            .map(|w| w.allomorphs_in_morph_order().iter().map(|a| a.as_str().to_string()).collect())
            .collect();
        (kept, recorder.failures())
    }

    #[test]
    fn test_lower_precedence_loses_when_higher_was_tried() {
        let language = language();
        let words = vec![suffixed(&language, "pl2", &[0, 1]), suffixed(&language, "pl1", &[0])];

        let (kept, failures) = filter(&language, words);
        assert_eq!(kept, vec![vec!["e1a".to_string(), "pl1".to_string()]]);
        assert_eq!(failures, vec![FailureReason::DisjunctiveAllomorph]);
    }

    #[test]
    fn test_untried_allomorph_does_not_compete() {
        let language = language();
        let words = vec![suffixed(&language, "pl2", &[1]), suffixed(&language, "pl1", &[0])];

        let (kept, failures) = filter(&language, words);
        assert_eq!(kept.len(), 2);
        assert!(failures.is_empty());
    }
}
