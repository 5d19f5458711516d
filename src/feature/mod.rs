//! Feature-structure algebra.
//!
//! Segments, rule constraints and syntactic properties are all described by
//! [`FeatureStruct`]s: finite maps from declared features to values. The
//! operations the rule engine relies on are
//!
//! - **unification** (`unify`, `is_unifiable`): mutual consistency, binding
//!   `α`-variables as a side effect,
//! - **priority union**: rule outputs overwrite input values,
//! - **merge**: widening, used when unapplying a feature-changing rule,
//! - **subtraction** and **negation** (`anti`): used to decide whether
//!   unapplying a rule is non-vacuous,
//! - **subsumption**.
//!
//! Symbolic values are bit sets over a feature's closed symbol list, so every
//! operation on them is a handful of bitwise instructions.

pub mod bindings;
pub mod structure;
pub mod system;
pub mod value;

pub use bindings::VariableBindings;
pub use structure::{FeatureStruct, FeatureStructBuilder};
pub use system::{FeatureDef, FeatureId, FeatureKind, FeatureSystem, MAX_SYMBOLS};
pub use value::{SymbolSet, Value, Variable};
