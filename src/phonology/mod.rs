//! Phonological rewrite rules.
//!
//! A [`RewriteRule`] is written once as `lhs → rhs / left _ right` and
//! compiled twice: [`SynthesisRewriteRule`] applies it to an underlying
//! form, [`AnalysisRewriteRule`] undoes it on a surface form. Both compile
//! the rule into one pattern per subrule with the groups `leftEnv`,
//! `target` and `rightEnv`.

pub mod analysis;
pub mod rewrite;
pub mod synthesis;

pub use analysis::AnalysisRewriteRule;
pub use rewrite::{AnalysisReapplyType, ApplicationMode, RewriteRule, RewriteSubrule};
pub use synthesis::SynthesisRewriteRule;

pub(crate) const LEFT_ENV: &str = "leftEnv";
pub(crate) const RIGHT_ENV: &str = "rightEnv";
pub(crate) const TARGET: &str = "target";
