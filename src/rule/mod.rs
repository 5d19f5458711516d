//! The rule abstraction and its combinators.
//!
//! Every compiled rule, whether phonological, morphological or a whole
//! stratum, implements [`Rule`]: a pure function from one frozen [`Word`] to
//! zero or more frozen words. Rules read shared grammar data through a
//! [`RuleContext`] and never mutate their input.
//!
//! [`RuleCascade`] composes rules in linear, permutation or simultaneous
//! order; [`WordSet`] collects outputs under a pluggable [`WordComparer`].

pub mod cascade;
pub mod comparer;

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::language::{GrammarIndex, Language};
use crate::lexicon::{LexEntry, RootAllomorph};
use crate::morpher::{LexEntrySelector, MorpherConfig, RuleSelector};
use crate::shape::Shape;
use crate::trace::TraceManager;
use crate::word::Word;

pub use cascade::{CascadeOrder, ContinueFn, RuleCascade};
pub use comparer::{ValueComparer, WordComparer, WordSet};

/// Name of a morphological rule, as recorded on a word's rule stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(Arc<str>);

impl RuleId {
    /// Id from a rule name.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The rule name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only state shared by every rule during one parse or synthesis.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    /// The grammar
    pub language: &'a Language,
    /// Lookup tables derived from the grammar
    pub index: &'a GrammarIndex,
    /// Engine configuration
    pub config: &'a MorpherConfig,
    /// Trace sink
    pub trace: &'a dyn TraceManager,
    /// Restricts which morphological rules may fire
    pub rule_selector: Option<&'a RuleSelector>,
    /// Restricts which lexical entries lookup may return
    pub entry_selector: Option<&'a LexEntrySelector>,
}

impl<'a> RuleContext<'a> {
    /// Whether the morphological rule `name` passes the rule selector.
    pub fn is_selected(&self, name: &str) -> bool {
        self.rule_selector.map_or(true, |select| select(name))
    }

    /// Whether `entry` passes the lexical entry selector.
    pub fn is_entry_selected(&self, entry: &LexEntry) -> bool {
        self.entry_selector.map_or(true, |select| select(entry))
    }

    /// Root allomorphs of `stratum` whose shape is compatible with `shape`.
    pub fn search_root_allomorphs(&self, stratum: usize, shape: &Shape) -> Result<Vec<(&'a LexEntry, &'a RootAllomorph)>> {
        let mut out = Vec::new();
        for root in self.index.trie(stratum)?.search(shape) {
            let (entry, allomorph) = self.index.root_allomorph(self.language, &root.allomorph)?;
            if self.is_entry_selected(entry) {
                out.push((entry, allomorph));
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleContext")
            .field("language", &self.language.name())
            .field("config", self.config)
            .field("rule_selector", &self.rule_selector.is_some())
            .field("entry_selector", &self.entry_selector.is_some())
            .finish()
    }
}

/// A transformation from one word to zero or more words.
///
/// Inputs and outputs are frozen. An empty output means the rule did not
/// apply; errors are reserved for grammar defects.
pub trait Rule: Send + Sync {
    /// Cheap pre-check; `apply` is only called when this returns `true`.
    fn is_applicable(&self, _input: &Word, _ctx: &RuleContext<'_>) -> bool {
        true
    }

    /// Apply the rule.
    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>>;
}

impl<R: Rule + ?Sized> Rule for Box<R> {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        (**self).is_applicable(input, ctx)
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        (**self).apply(input, ctx)
    }
}
