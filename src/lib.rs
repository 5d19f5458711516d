//! # hermitcrab
//!
//! A bidirectional morphological and phonological rule engine.
//!
//! A grammar ([`language::Language`]) is an ordered list of strata, each
//! holding phonological rewrite rules, morphological rules, affix templates
//! and a lexicon of root allomorphs. The engine runs the grammar in two
//! directions:
//!
//! - **Analysis** (parsing): a surface form is segmented into feature-bearing
//!   nodes and every rule is *unapplied*, yielding candidate underlying forms
//!   that are looked up in the lexicon.
//! - **Synthesis** (generation): a root is run forward through the same
//!   rules. Parsing synthesizes every analysis again and keeps only the
//!   candidates that reproduce the input.
//!
//! Segments and words are described with feature structures
//! ([`feature::FeatureStruct`]) that support unification, subsumption and
//! variable binding, so rules can say things like "a consonant takes the
//! voicing of the vowel before it".
//!
//! ## Example
//!
//! ```rust,ignore
//! use hermitcrab::prelude::*;
//!
//! let morpher = MorpherBuilder::new(language).build()?;
//!
//! for word in morpher.parse_word("aba")? {
//!     println!("root: {:?}", word.entry());
//! }
//!
//! let forms = morpher.generate_words("tak", &["redup"], FeatureStruct::new())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chardef;
pub mod error;
pub mod feature;
pub mod language;
pub mod lexicon;
pub mod morpher;
pub mod morphology;
pub mod pattern;
pub mod phonology;
pub mod rule;
pub mod shape;
pub mod stratum;
pub mod trace;
pub mod trie;
pub mod word;

/// Common imports for convenient usage
pub mod prelude {
    pub use crate::chardef::CharacterDefinitionTable;
    pub use crate::error::{MorphError, Result};
    pub use crate::feature::{FeatureId, FeatureStruct, FeatureStructBuilder, FeatureSystem, Value, Variable};
    pub use crate::language::Language;
    pub use crate::lexicon::{AllomorphEnvironment, LexEntry, LexFamily, MprFeatureSet, RootAllomorph};
    pub use crate::morpher::{BuilderError, Morpher, MorpherBuilder, MorpherConfig};
    pub use crate::morphology::{
        AffixProcessAllomorph, AffixProcessRule, AffixTemplate, AffixTemplateSlot, CompoundingRule,
        CompoundingSubrule, MorphologicalOutput, PatternPart, ReduplicationHint,
    };
    pub use crate::pattern::{Constraint, Pattern, PatternNode};
    pub use crate::phonology::{ApplicationMode, RewriteRule, RewriteSubrule};
    pub use crate::shape::{AllomorphId, Direction, Shape};
    pub use crate::stratum::Stratum;
    pub use crate::trace::{FailureReason, NullTraceManager, RecordingTraceManager, TraceEvent, TraceManager};
    pub use crate::word::Word;
}
