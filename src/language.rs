//! The language: feature systems plus an ordered list of strata.
//!
//! [`GrammarIndex`] holds everything derived from a [`Language`] once, at
//! morpher construction: the per-stratum root allomorph tries, entry and
//! allomorph lookup tables, lexical families and compiled allomorph
//! environments. It is read-only afterwards and shared by all parse calls.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{MorphError, Result};
use crate::feature::FeatureSystem;
use crate::lexicon::{AllomorphEnvironment, EnvironmentMatcher, LexEntry, LexFamily, RootAllomorph};
use crate::morpher::BuilderError;
use crate::morphology::MorphologicalRule;
use crate::rule::{Rule, RuleContext, WordSet};
use crate::shape::AllomorphId;
use crate::stratum::{AnalysisStratumRule, Stratum, SynthesisStratumRule};
use crate::trie::{RootAllomorphTrie, RootEntry};
use crate::word::Word;

/// A complete grammar.
///
/// # Example
///
/// ```rust,ignore
/// let language = Language::new("toy")
///     .with_phonetic_system(phonetic)
///     .with_syntactic_system(syntactic)
///     .with_stratum(deep)
///     .with_stratum(surface);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Language {
    name: String,
    phonetic: FeatureSystem,
    syntactic: FeatureSystem,
    strata: Vec<Stratum>,
}

impl Language {
    /// Language with empty feature systems and no strata.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Set the feature system segments are described with.
    pub fn with_phonetic_system(mut self, system: FeatureSystem) -> Self {
        self.phonetic = system;
        self
    }

    /// Set the feature system words are described with.
    pub fn with_syntactic_system(mut self, system: FeatureSystem) -> Self {
        self.syntactic = system;
        self
    }

    /// Append a stratum; the last one added is the surface stratum.
    pub fn with_stratum(mut self, stratum: Stratum) -> Self {
        self.strata.push(stratum);
        self
    }

    /// Language name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Phonetic feature system.
    pub fn phonetic_system(&self) -> &FeatureSystem {
        &self.phonetic
    }

    /// Syntactic feature system.
    pub fn syntactic_system(&self) -> &FeatureSystem {
        &self.syntactic
    }

    /// Strata, deepest first.
    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// Stratum at `depth`.
    pub fn stratum(&self, depth: usize) -> Result<&Stratum> {
        self.strata.get(depth).ok_or(MorphError::UnknownStratum(depth))
    }

    /// Depth of the surface stratum.
    pub fn surface_depth(&self) -> Option<usize> {
        self.strata.len().checked_sub(1)
    }

    /// The surface stratum.
    pub fn surface_stratum(&self) -> Option<&Stratum> {
        self.strata.last()
    }
}

// ============================================================================
// Grammar index
// ============================================================================

/// What the index knows about an allomorph of any kind.
#[derive(Debug)]
pub struct AllomorphInfo {
    morpheme: String,
    index: usize,
    free_fluctuations: FxHashSet<AllomorphId>,
    environments: Vec<EnvironmentMatcher>,
}

impl AllomorphInfo {
    /// Entry id or rule name the allomorph belongs to.
    pub fn morpheme(&self) -> &str {
        &self.morpheme
    }

    /// Precedence within the morpheme; lower wins.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this allomorph varies freely with `other`.
    pub fn free_fluctuates_with(&self, other: &AllomorphId) -> bool {
        self.free_fluctuations.contains(other)
    }

    pub(crate) fn environments(&self) -> &[EnvironmentMatcher] {
        &self.environments
    }
}

/// Lookup tables derived from a [`Language`].
#[derive(Debug, Default)]
pub struct GrammarIndex {
    tries: Vec<RootAllomorphTrie>,
    entries: FxHashMap<String, (usize, usize)>,
    roots: FxHashMap<AllomorphId, (usize, usize, usize)>,
    allomorphs: FxHashMap<AllomorphId, AllomorphInfo>,
    families: FxHashMap<String, Vec<(usize, usize)>>,
    morphological_rules: FxHashSet<String>,
}

impl GrammarIndex {
    /// Index `language`, rejecting duplicate ids.
    pub fn build(language: &Language) -> std::result::Result<Self, BuilderError> {
        let mut index = GrammarIndex::default();
        let mut rule_names = FxHashSet::default();
        let mut fluctuations = Vec::new();

        for (depth, stratum) in language.strata().iter().enumerate() {
            let mut trie = RootAllomorphTrie::new();
            for (e, entry) in stratum.entries().iter().enumerate() {
                if index.entries.insert(entry.id().to_string(), (depth, e)).is_some() {
                    return Err(BuilderError::DuplicateEntry(entry.id().to_string()));
                }
                if let Some(family) = entry.family() {
                    index.families.entry(family.name().to_string()).or_default().push((depth, e));
                }
                for (a, allomorph) in entry.allomorphs().iter().enumerate() {
                    index.register(allomorph.id(), entry.id(), a, allomorph.environments())?;
                    fluctuations.extend(allomorph.free_fluctuations().iter().map(|o| (allomorph.id().clone(), o.clone())));
                    index.roots.insert(allomorph.id().clone(), (depth, e, a));
                    trie.add(
                        allomorph.shape(),
                        RootEntry {
                            entry: entry.id().to_string(),
                            allomorph: allomorph.id().clone(),
                        },
                    );
                }
            }
            debug!("stratum '{}': {} root allomorphs indexed", stratum.name(), trie.len());
            index.tries.push(trie);

            for prule in stratum.phonological_rules() {
                if !rule_names.insert(prule.name.clone()) {
                    return Err(BuilderError::DuplicateRule(prule.name.clone()));
                }
            }
            let template_rules = stratum
                .templates()
                .iter()
                .flat_map(|t| t.slots())
                .flat_map(|s| s.rules());
            for mrule in stratum.morphological_rules().iter().chain(template_rules) {
                if !rule_names.insert(mrule.name().to_string()) {
                    return Err(BuilderError::DuplicateRule(mrule.name().to_string()));
                }
                index.register_rule(mrule, &mut fluctuations)?;
                index.morphological_rules.insert(mrule.name().to_string());
            }
            for template in stratum.templates() {
                if !rule_names.insert(template.name().to_string()) {
                    return Err(BuilderError::DuplicateRule(template.name().to_string()));
                }
            }
        }

        // Free fluctuation is symmetric.
        for (a, b) in fluctuations {
            if let Some(info) = index.allomorphs.get_mut(&a) {
                info.free_fluctuations.insert(b.clone());
            }
            if let Some(info) = index.allomorphs.get_mut(&b) {
                info.free_fluctuations.insert(a);
            }
        }
        Ok(index)
    }

    fn register(
        &mut self,
        id: &AllomorphId,
        morpheme: &str,
        index: usize,
        environments: &[AllomorphEnvironment],
    ) -> std::result::Result<(), BuilderError> {
        if self.allomorphs.contains_key(id) {
            return Err(BuilderError::DuplicateAllomorph(id.to_string()));
        }
        let environments = environments
            .iter()
            .map(EnvironmentMatcher::new)
            .collect::<Result<Vec<_>>>()?;
        self.allomorphs.insert(
            id.clone(),
            AllomorphInfo {
                morpheme: morpheme.to_string(),
                index,
                free_fluctuations: FxHashSet::default(),
                environments,
            },
        );
        Ok(())
    }

    fn register_rule(
        &mut self,
        rule: &MorphologicalRule,
        fluctuations: &mut Vec<(AllomorphId, AllomorphId)>,
    ) -> std::result::Result<(), BuilderError> {
        match rule {
            MorphologicalRule::AffixProcess(r) => {
                for (i, allomorph) in r.allomorphs().iter().enumerate() {
                    self.register(allomorph.id(), r.name(), i, allomorph.environments())?;
                    fluctuations.extend(allomorph.free_fluctuations().iter().map(|o| (allomorph.id().clone(), o.clone())));
                }
            }
            MorphologicalRule::Compounding(r) => {
                for (i, subrule) in r.subrules().iter().enumerate() {
                    self.register(subrule.id(), r.name(), i, &[])?;
                }
            }
        }
        Ok(())
    }

    /// Root allomorph trie of the stratum at `depth`.
    pub fn trie(&self, depth: usize) -> Result<&RootAllomorphTrie> {
        self.tries.get(depth).ok_or(MorphError::UnknownStratum(depth))
    }

    /// Number of indexed strata.
    pub fn stratum_count(&self) -> usize {
        self.tries.len()
    }

    /// Entry `id` and the depth of its stratum.
    pub fn entry<'l>(&self, language: &'l Language, id: &str) -> Result<(usize, &'l LexEntry)> {
        let &(depth, e) = self
            .entries
            .get(id)
            .ok_or_else(|| MorphError::UnknownEntry(id.to_string()))?;
        let entry = language
            .stratum(depth)?
            .entries()
            .get(e)
            .ok_or_else(|| MorphError::UnknownEntry(id.to_string()))?;
        Ok((depth, entry))
    }

    /// Root allomorph `id` and its entry.
    pub fn root_allomorph<'l>(&self, language: &'l Language, id: &AllomorphId) -> Result<(&'l LexEntry, &'l RootAllomorph)> {
        let unknown = || MorphError::UnknownAllomorph(id.to_string());
        let &(depth, e, a) = self.roots.get(id).ok_or_else(unknown)?;
        let entry = language.stratum(depth)?.entries().get(e).ok_or_else(unknown)?;
        let allomorph = entry.allomorphs().get(a).ok_or_else(unknown)?;
        Ok((entry, allomorph))
    }

    /// Members of `family` with the depth of their stratum.
    pub fn family_members<'l>(&self, language: &'l Language, family: &LexFamily) -> Vec<(usize, &'l LexEntry)> {
        self.families
            .get(family.name())
            .into_iter()
            .flatten()
            .filter_map(|&(depth, e)| {
                let entry = language.strata().get(depth)?.entries().get(e)?;
                Some((depth, entry))
            })
            .collect()
    }

    /// Whether a morphological rule called `name` exists.
    pub fn has_morphological_rule(&self, name: &str) -> bool {
        self.morphological_rules.contains(name)
    }

    /// Information about allomorph `id`.
    pub fn allomorph(&self, id: &AllomorphId) -> Result<&AllomorphInfo> {
        self.allomorphs
            .get(id)
            .ok_or_else(|| MorphError::UnknownAllomorph(id.to_string()))
    }
}

// ============================================================================
// Language rules
// ============================================================================

/// Analysis across all strata, surface first.
///
/// Each stratum analyzes what the stratum above produced; the result pools
/// the analyses of every stratum.
#[derive(Debug)]
pub struct AnalysisLanguageRule {
    strata: Vec<AnalysisStratumRule>,
}

impl AnalysisLanguageRule {
    /// Compile every stratum of `language`.
    pub fn new(language: &Language) -> Result<Self> {
        let mut strata = language
            .strata()
            .iter()
            .enumerate()
            .map(|(depth, s)| AnalysisStratumRule::new(s, depth))
            .collect::<Result<Vec<_>>>()?;
        strata.reverse();
        Ok(Self { strata })
    }
}

impl Rule for AnalysisLanguageRule {
    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut inputs = vec![input.clone()];
        let mut results = WordSet::new();
        for stratum in &self.strata {
            if inputs.is_empty() {
                break;
            }
            let mut outputs = WordSet::new();
            for word in &inputs {
                for output in stratum.apply(word, ctx)? {
                    results.insert(output.clone());
                    outputs.insert(output);
                }
            }
            inputs = outputs.into_vec();
        }
        Ok(results.into_vec())
    }
}

/// Synthesis across all strata, deepest first.
#[derive(Debug)]
pub struct SynthesisLanguageRule {
    strata: Vec<SynthesisStratumRule>,
}

impl SynthesisLanguageRule {
    /// Compile every stratum of `language`.
    pub fn new(language: &Language) -> Result<Self> {
        let strata = language
            .strata()
            .iter()
            .enumerate()
            .map(|(depth, s)| SynthesisStratumRule::new(s, depth))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { strata })
    }
}

impl Rule for SynthesisLanguageRule {
    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut words = vec![input.clone()];
        for stratum in &self.strata {
            let mut outputs = WordSet::new();
            for word in &words {
                outputs.extend(stratum.apply(word, ctx)?);
            }
            words = outputs.into_vec();
        }
        Ok(words)
    }
}
