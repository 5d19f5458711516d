//! Error types for grammar construction and parsing.
//!
//! Recoverable parse failures (a candidate that does not survive filtering)
//! are not errors; they are reported through [`crate::trace::TraceManager`]
//! with a [`crate::trace::FailureReason`]. Everything in [`MorphError`] either
//! aborts the enclosing parse call or rejects a malformed grammar.

use thiserror::Error;

/// Errors raised by the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MorphError {
    /// A rule output referenced a variable that no match bound.
    ///
    /// This is a grammar error: an `α` on the right-hand side of a rule must
    /// be bound by the left-hand side or an environment.
    #[error("Uninstantiated feature variable '{0}' in rule output")]
    UninstantiatedFeature(String),

    /// An attempt was made to mutate a frozen object.
    #[error("Cannot modify frozen {0}")]
    Frozen(&'static str),

    /// A morph annotation referenced an allomorph that the grammar does not define.
    #[error("Unknown allomorph '{0}'")]
    UnknownAllomorph(String),

    /// A feature name was not declared in the feature system.
    #[error("Unknown feature '{0}'")]
    UnknownFeature(String),

    /// A symbol name was not declared for the given feature.
    #[error("Unknown symbol '{symbol}' for feature '{feature}'")]
    UnknownSymbol {
        /// Feature the symbol was looked up in
        feature: String,
        /// The unresolved symbol
        symbol: String,
    },

    /// A symbolic feature declared more symbols than a symbol set can hold.
    #[error("Feature '{0}' declares more than 64 symbols")]
    TooManySymbols(String),

    /// A symbolic value was used with a complex feature or vice versa.
    #[error("Feature '{0}' used with the wrong kind of value")]
    FeatureKindMismatch(String),

    /// Text could not be segmented by a character definition table.
    #[error("Cannot segment '{text}' at position {position} using table '{table}'")]
    InvalidSegment {
        /// Name of the table
        table: String,
        /// Character offset of the first unrecognized character
        position: usize,
        /// The full input text
        text: String,
    },

    /// A pattern is malformed (e.g. a quantifier over a nullable child).
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A stratum depth outside the language's strata.
    #[error("Unknown stratum at depth {0}")]
    UnknownStratum(usize),

    /// A lexical entry id that the grammar does not define.
    #[error("Unknown lexical entry '{0}'")]
    UnknownEntry(String),

    /// A morphological rule name that the grammar does not define.
    #[error("Unknown morphological rule '{0}'")]
    UnknownRule(String),
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, MorphError>;
