//! The morpher: parsing surface forms and generating words.
//!
//! [`Morpher`] is built once from a [`Language`] by [`MorpherBuilder`] and is
//! read-only afterwards, so one instance can serve parse calls from many
//! threads.
//!
//! Parsing a surface form runs in four phases:
//!
//! 1. **Analysis**: the form is segmented with the surface stratum's table
//!    and every stratum's rules are unapplied, producing candidate
//!    underlying shapes annotated with the morphological rules to reapply.
//! 2. **Lexical lookup**: each candidate shape is matched against the root
//!    allomorphs of its stratum.
//! 3. **Synthesis**: each root is run forward through the strata, reapplying
//!    the recorded rules. Candidates are independent and are synthesized in
//!    parallel unless [`MorpherConfig::parallel`] is off.
//! 4. **Filtering**: candidates must be complete, respect their allomorph
//!    environments and precedence, and reproduce the input.
//!
//! # Example
//!
//! ```rust,ignore
//! use hermitcrab::prelude::*;
//!
//! let morpher = MorpherBuilder::new(language).build()?;
//! for word in morpher.parse_word("aba")? {
//!     println!("{:?} {:?}", word.entry(), word.allomorphs_in_morph_order());
//! }
//! ```

mod builder;
mod filter;

pub use builder::{BuilderError, MorpherBuilder};

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::language::{AnalysisLanguageRule, GrammarIndex, Language, SynthesisLanguageRule};
use crate::lexicon::{LexEntry, RootAllomorph};
use crate::rule::{Rule, RuleContext, RuleId};
use crate::shape::{NodeKind, Shape};
use crate::trace::{RecordingTraceManager, TraceEvent, TraceManager};
use crate::word::Word;

/// Predicate restricting which morphological rules and templates may fire.
pub type RuleSelector = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Predicate restricting which lexical entries lookup may return.
pub type LexEntrySelector = Arc<dyn Fn(&LexEntry) -> bool + Send + Sync>;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct MorpherConfig {
    /// Maximum number of stems in a compound
    pub max_stem_count: usize,
    /// How often a deleting phonological rule may be unapplied in a row
    pub deletion_reapplications: usize,
    /// Synthesize candidates on the rayon thread pool
    pub parallel: bool,
}

impl Default for MorpherConfig {
    fn default() -> Self {
        Self {
            max_stem_count: 2,
            deletion_reapplications: 0,
            parallel: true,
        }
    }
}

/// A compiled grammar ready to parse and generate.
pub struct Morpher {
    language: Language,
    index: GrammarIndex,
    analysis: AnalysisLanguageRule,
    synthesis: SynthesisLanguageRule,
    config: MorpherConfig,
    trace: Arc<dyn TraceManager>,
    rule_selector: Option<RuleSelector>,
    entry_selector: Option<LexEntrySelector>,
}

impl Morpher {
    /// The grammar.
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Lookup tables derived from the grammar.
    pub fn index(&self) -> &GrammarIndex {
        &self.index
    }

    /// Engine configuration.
    pub fn config(&self) -> &MorpherConfig {
        &self.config
    }

    fn context<'a>(&'a self, trace: &'a dyn TraceManager) -> RuleContext<'a> {
        RuleContext {
            language: &self.language,
            index: &self.index,
            config: &self.config,
            trace,
            rule_selector: self.rule_selector.as_ref(),
            entry_selector: self.entry_selector.as_ref(),
        }
    }

    /// All analyses of `surface`.
    ///
    /// An empty result means the form has no analysis. Errors indicate a
    /// defect in the grammar or input text the surface table cannot segment.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let words = morpher.parse_word("taktak")?;
    /// assert_eq!(words[0].entry(), Some("tak"));
    /// ```
    pub fn parse_word(&self, surface: &str) -> Result<Vec<Word>> {
        self.parse_with(surface, self.trace.as_ref())
    }

    /// Like [`parse_word`](Self::parse_word), also returning every trace event.
    ///
    /// Events are recorded for this call only, regardless of the configured
    /// trace manager.
    pub fn parse_word_traced(&self, surface: &str) -> Result<(Vec<Word>, Vec<TraceEvent>)> {
        let recorder = RecordingTraceManager::new();
        let words = self.parse_with(surface, &recorder)?;
        Ok((words, recorder.take()))
    }

    fn parse_with(&self, surface: &str, trace: &dyn TraceManager) -> Result<Vec<Word>> {
        let ctx = self.context(trace);
        let depth = self.language.surface_depth().ok_or(MorphError::UnknownStratum(0))?;
        let table = self.language.stratum(depth)?.table();

        let mut input = Word::new(depth, table.segment(surface)?);
        input.freeze();
        trace.analyze_word(&input);

        let analyses = self.analysis.apply(&input, &ctx)?;
        let candidates = self.lexical_lookup(&analyses, &ctx)?;
        let synthesized = self.synthesize(&candidates, &ctx)?;

        let valid = filter::valid_words(synthesized, &ctx)?;
        let preferred = filter::disjunctive_filter(valid, &ctx)?;
        let words = filter::surface_filter(preferred, surface, table, &ctx);
        debug!(
            "parsed '{}': {} analyses, {} roots, {} words",
            surface,
            analyses.len(),
            candidates.len(),
            words.len()
        );
        Ok(words)
    }

    /// Root every analysis in the entries whose allomorph shapes it matches.
    fn lexical_lookup(&self, analyses: &[Word], ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut candidates = Vec::new();
        for analysis in analyses {
            let stratum = self.language.stratum(analysis.stratum())?;
            let shape = analysis.shape();
            if !shape.live_nodes().into_iter().any(|n| shape.kind(n) == NodeKind::Segment) {
                continue;
            }
            ctx.trace.lexical_lookup(stratum.name(), analysis);

            let mut seen = FxHashSet::default();
            for (entry, _) in ctx.search_root_allomorphs(analysis.stratum(), analysis.shape())? {
                if !seen.insert(entry.id()) {
                    continue;
                }
                for allomorph in entry.allomorphs() {
                    let mut word = analysis.deep_clone();
                    word.set_root(entry, allomorph)?;
                    ctx.trace.synthesize_word(&word);
                    word.freeze();
                    candidates.push(word);
                }
            }
        }
        Ok(candidates)
    }

    /// Synthesize every candidate; the result is ordered by content hash.
    fn synthesize(&self, candidates: &[Word], ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let results = Mutex::new(Vec::new());
        let run = |word: &Word| -> Result<()> {
            let outputs = self.synthesis.apply(word, ctx)?;
            results.lock().extend(outputs);
            Ok(())
        };
        if self.config.parallel {
            candidates.par_iter().try_for_each(run)?;
        } else {
            candidates.iter().try_for_each(run)?;
        }
        let mut words = results.into_inner();
        words.sort_by_key(Word::content_hash);
        Ok(words)
    }

    /// Surface forms of entry `entry_id` after applying `rules` in order.
    ///
    /// Every allomorph of the entry is tried. `realizational` is the feature
    /// structure the finished word must be compatible with.
    ///
    /// # Errors
    ///
    /// Returns `MorphError::UnknownEntry` or `MorphError::UnknownRule` for
    /// names the grammar does not define.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let forms = morpher.generate_words("tak", &["redup"], FeatureStruct::new())?;
    /// assert_eq!(forms, vec!["taktak"]);
    /// ```
    pub fn generate_words(&self, entry_id: &str, rules: &[&str], realizational: FeatureStruct) -> Result<Vec<String>> {
        let (depth, entry) = self.index.entry(&self.language, entry_id)?;
        if let Some(unknown) = rules.iter().find(|name| !self.index.has_morphological_rule(name)) {
            return Err(MorphError::UnknownRule(unknown.to_string()));
        }
        let ctx = self.context(self.trace.as_ref());

        let mut roots = Vec::with_capacity(entry.allomorphs().len());
        for allomorph in entry.allomorphs() {
            let mut word = Word::from_root(entry, allomorph, depth)?;
            word.set_realizational(realizational.deep_clone())?;
            // The rule stack pops from the end.
            for name in rules.iter().rev() {
                word.morphological_rule_unapplied(&RuleId::new(name))?;
            }
            word.freeze();
            ctx.trace.synthesize_word(&word);
            roots.push(word);
        }

        let synthesized = self.synthesize(&roots, &ctx)?;
        let valid = filter::valid_words(synthesized, &ctx)?;
        let words = filter::disjunctive_filter(valid, &ctx)?;

        let table = self.language.stratum(self.language.surface_depth().unwrap_or(depth))?.table();
        let mut forms: Vec<String> = words.iter().map(|w| table.render(w.shape())).collect();
        forms.sort();
        forms.dedup();
        debug!("generated {} forms of '{}'", forms.len(), entry_id);
        Ok(forms)
    }

    /// Root allomorphs of stratum `depth` compatible with `shape`.
    pub fn search_root_allomorphs(&self, depth: usize, shape: &Shape) -> Result<Vec<(&LexEntry, &RootAllomorph)>> {
        self.context(self.trace.as_ref()).search_root_allomorphs(depth, shape)
    }
}

impl std::fmt::Debug for Morpher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Morpher")
            .field("language", &self.language.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chardef::CharacterDefinitionTable;
    use crate::feature::FeatureSystem;
    use crate::stratum::Stratum;
    use crate::trace::NullTraceManager;

    #[test]
    fn test_lookup_does_not_depend_on_spelling() {
        let mut phonetic = FeatureSystem::new();
        phonetic.add_symbolic("f", &["x", "y"]).unwrap();
        let symbol = |s: &str| FeatureStruct::builder(&phonetic).symbol("f", s).build().unwrap();

        // The table can only spell [f:x]; the root is a lone [f:y].
        let mut table = CharacterDefinitionTable::new("table");
        table.add_segment(&["a"], symbol("x"));
        let mut shape = Shape::new();
        shape.push(NodeKind::Segment, symbol("y")).unwrap();
        let entry = LexEntry::new("e1", FeatureStruct::new()).with_allomorph(RootAllomorph::new("e1a", shape.clone()));
        let stratum = Stratum::new("surface", Arc::new(table)).entry(entry);
        let language = Language::new("toy").with_phonetic_system(phonetic.clone()).with_stratum(stratum);
        let morpher = MorpherBuilder::new(language).build().unwrap();
        let ctx = morpher.context(&NullTraceManager);

        let mut analysis = Word::new(0, shape);
        analysis.freeze();
        let candidates = morpher.lexical_lookup(&[analysis], &ctx).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].entry(), Some("e1"));

        let mut empty = Word::new(0, Shape::new());
        empty.freeze();
        assert!(morpher.lexical_lookup(&[empty], &ctx).unwrap().is_empty());
    }
}
