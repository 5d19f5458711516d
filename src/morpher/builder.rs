//! Builder pattern for morpher construction.

use std::sync::Arc;

use log::{debug, warn};

use super::{LexEntrySelector, Morpher, MorpherConfig, RuleSelector};
use crate::error::MorphError;
use crate::language::{AnalysisLanguageRule, GrammarIndex, Language, SynthesisLanguageRule};
use crate::lexicon::LexEntry;
use crate::trace::{NullTraceManager, TraceManager};

/// Builder for constructing [`Morpher`] instances with a fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use hermitcrab::prelude::*;
///
/// let morpher = MorpherBuilder::new(language)
///     .max_stem_count(3)
///     .parallel(false)
///     .build()?;
///
/// for word in morpher.parse_word("taktak")? {
///     println!("{:?}", word.entry());
/// }
/// ```
pub struct MorpherBuilder {
    language: Language,
    config: MorpherConfig,
    trace: Option<Arc<dyn TraceManager>>,
    rule_selector: Option<RuleSelector>,
    entry_selector: Option<LexEntrySelector>,
}

impl MorpherBuilder {
    /// Create a builder for `language` with the default configuration.
    pub fn new(language: Language) -> Self {
        Self {
            language,
            config: MorpherConfig::default(),
            trace: None,
            rule_selector: None,
            entry_selector: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: MorpherConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of stems in a compound (default: 2).
    pub fn max_stem_count(mut self, count: usize) -> Self {
        self.config.max_stem_count = count;
        self
    }

    /// Set how often deletion rules may be reapplied during analysis (default: 0).
    pub fn deletion_reapplications(mut self, count: usize) -> Self {
        self.config.deletion_reapplications = count;
        self
    }

    /// Enable or disable parallel synthesis (default: enabled).
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set the trace manager parse events are reported to.
    pub fn trace_manager(mut self, trace: Arc<dyn TraceManager>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Only return analyses rooted in entries accepted by `select`.
    pub fn lex_entry_selector<F>(mut self, select: F) -> Self
    where
        F: Fn(&LexEntry) -> bool + Send + Sync + 'static,
    {
        self.entry_selector = Some(Arc::new(select));
        self
    }

    /// Only apply morphological rules and templates whose name `select` accepts.
    pub fn rule_selector<F>(mut self, select: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.rule_selector = Some(Arc::new(select));
        self
    }

    /// Build the morpher.
    ///
    /// # Errors
    ///
    /// Returns `BuilderError` if the language has no strata, reuses an id,
    /// or contains a rule that cannot be compiled.
    pub fn build(self) -> Result<Morpher, BuilderError> {
        let language = self.language;
        if language.strata().is_empty() {
            return Err(BuilderError::NoStrata);
        }

        for stratum in language.strata() {
            for prule in stratum.phonological_rules() {
                if prule.subrules.is_empty() {
                    warn!("phonological rule '{}' has no subrules and never applies", prule.name);
                }
            }
        }

        let index = GrammarIndex::build(&language)?;
        let analysis = AnalysisLanguageRule::new(&language)?;
        let synthesis = SynthesisLanguageRule::new(&language)?;
        debug!(
            "built morpher for '{}': {} strata, config {:?}",
            language.name(),
            language.strata().len(),
            self.config
        );

        Ok(Morpher {
            language,
            index,
            analysis,
            synthesis,
            config: self.config,
            trace: self.trace.unwrap_or_else(|| Arc::new(NullTraceManager)),
            rule_selector: self.rule_selector,
            entry_selector: self.entry_selector,
        })
    }
}

/// Errors that can occur when building a morpher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    /// The language has no strata.
    #[error("Language has no strata")]
    NoStrata,

    /// Two allomorphs share an id.
    #[error("Duplicate allomorph id '{0}'")]
    DuplicateAllomorph(String),

    /// Two lexical entries share an id.
    #[error("Duplicate lexical entry id '{0}'")]
    DuplicateEntry(String),

    /// Two rules or templates share a name.
    #[error("Duplicate rule name '{0}'")]
    DuplicateRule(String),

    /// A rule could not be compiled.
    #[error("Invalid grammar: {0}")]
    InvalidGrammar(#[from] MorphError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chardef::CharacterDefinitionTable;
    use crate::feature::FeatureStruct;
    use crate::lexicon::RootAllomorph;
    use crate::stratum::Stratum;

    fn table() -> Arc<CharacterDefinitionTable> {
        let mut table = CharacterDefinitionTable::new("table");
        table.add_segment(&["a"], FeatureStruct::new());
        table.add_segment(&["b"], FeatureStruct::new());
        Arc::new(table)
    }

    fn entry(id: &str, allomorph: &str, table: &CharacterDefinitionTable) -> LexEntry {
        let shape = table.segment("ab").unwrap();
        LexEntry::new(id, FeatureStruct::new()).with_allomorph(RootAllomorph::new(allomorph, shape))
    }

    #[test]
    fn test_builder_basic() {
        let table = table();
        let stratum = Stratum::new("surface", table.clone()).entry(entry("e1", "e1a", &table));
        let morpher = MorpherBuilder::new(Language::new("toy").with_stratum(stratum))
            .build()
            .unwrap();

        assert_eq!(morpher.config(), &MorpherConfig::default());
        assert_eq!(morpher.language().strata().len(), 1);
    }

    #[test]
    fn test_builder_config() {
        let table = table();
        let stratum = Stratum::new("surface", table);
        let morpher = MorpherBuilder::new(Language::new("toy").with_stratum(stratum))
            .max_stem_count(3)
            .deletion_reapplications(1)
            .parallel(false)
            .build()
            .unwrap();

        assert_eq!(morpher.config().max_stem_count, 3);
        assert_eq!(morpher.config().deletion_reapplications, 1);
        assert!(!morpher.config().parallel);
    }

    #[test]
    fn test_builder_no_strata() {
        let result = MorpherBuilder::new(Language::new("empty")).build();
        assert_eq!(result.unwrap_err(), BuilderError::NoStrata);
    }

    #[test]
    fn test_builder_duplicate_entry() {
        let table = table();
        let stratum = Stratum::new("surface", table.clone())
            .entry(entry("e1", "e1a", &table))
            .entry(entry("e1", "e1b", &table));
        let result = MorpherBuilder::new(Language::new("toy").with_stratum(stratum)).build();
        assert_eq!(result.unwrap_err(), BuilderError::DuplicateEntry("e1".to_string()));
    }

    #[test]
    fn test_builder_duplicate_allomorph() {
        let table = table();
        let stratum = Stratum::new("surface", table.clone())
            .entry(entry("e1", "shared", &table))
            .entry(entry("e2", "shared", &table));
        let result = MorpherBuilder::new(Language::new("toy").with_stratum(stratum)).build();
        assert_eq!(result.unwrap_err(), BuilderError::DuplicateAllomorph("shared".to_string()));
    }

    #[test]
    fn test_builder_error_display() {
        let err = BuilderError::DuplicateRule("plural".to_string());
        assert_eq!(err.to_string(), "Duplicate rule name 'plural'");
    }
}
