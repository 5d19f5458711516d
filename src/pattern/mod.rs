//! Pattern matching over shapes.
//!
//! A [`Pattern`] is a tree of constraints, named groups, quantifiers and
//! alternations. [`Matcher::new`] compiles it into a small backtracking
//! program; matching never mutates the shape and yields [`Match`] records
//! carrying the consumed nodes, group captures and variable bindings.

mod compile;
pub mod matcher;
pub mod node;

pub use matcher::{acceptable, AcceptableFn, Match, Matcher, MatcherSettings, MatchingMethod, NodeFilter};
pub use node::{Constraint, Pattern, PatternNode};
