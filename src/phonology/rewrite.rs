//! Rewrite rule definitions.

use crate::feature::FeatureStruct;
use crate::lexicon::MprFeatureSet;
use crate::pattern::{Constraint, Pattern};
use crate::shape::{Direction, NodeKind};

/// How a rewrite rule scans the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ApplicationMode {
    /// Apply at each match in turn; later matches see earlier changes.
    #[default]
    Iterative,
    /// Find every match in the input first, then apply them all.
    Simultaneous,
}

/// How analysis reapplies an unapplied rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisReapplyType {
    /// A single pass.
    Normal,
    /// Repeat until the word stops changing; used by simultaneous rules whose
    /// output can create new environments for themselves.
    SelfOpaquing,
}

/// One `lhs → rhs / left _ right` alternative of a rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSubrule {
    /// Replacement nodes
    pub rhs: Vec<Constraint>,
    /// Context to the left of the target
    pub left: Pattern,
    /// Context to the right of the target
    pub right: Pattern,
    /// Syntactic features the word must be unifiable with
    pub required_syntactic: FeatureStruct,
    /// MPR features the word must have
    pub required_mpr: MprFeatureSet,
    /// MPR features the word must not have
    pub excluded_mpr: MprFeatureSet,
}

impl RewriteSubrule {
    /// Subrule rewriting the target to `rhs` in any context.
    pub fn new(rhs: Vec<Constraint>) -> Self {
        Self {
            rhs,
            left: Pattern::new(),
            right: Pattern::new(),
            required_syntactic: FeatureStruct::new(),
            required_mpr: MprFeatureSet::new(),
            excluded_mpr: MprFeatureSet::new(),
        }
    }

    /// Set the left environment.
    pub fn left(mut self, env: Pattern) -> Self {
        self.left = env;
        self
    }

    /// Set the right environment.
    pub fn right(mut self, env: Pattern) -> Self {
        self.right = env;
        self
    }

    /// Restrict to words unifiable with `fs`.
    pub fn required_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.required_syntactic = fs;
        self
    }

    /// Restrict to words carrying all of `features`.
    pub fn required_mpr(mut self, features: MprFeatureSet) -> Self {
        self.required_mpr = features;
        self
    }

    /// Restrict to words carrying none of `features`.
    pub fn excluded_mpr(mut self, features: MprFeatureSet) -> Self {
        self.excluded_mpr = features;
        self
    }

    pub(crate) fn has_environment(&self) -> bool {
        !self.left.is_empty() || !self.right.is_empty()
    }
}

/// A phonological rewrite rule.
///
/// A rule whose subrules replace each target segment by exactly one segment
/// only changes features in place. Any other shape (insertion, deletion,
/// different lengths or node kinds) restructures the word.
///
/// # Example
///
/// ```rust,ignore
/// // p → [+voice] / V _ V
/// let voicing = RewriteRule::new("voicing", vec![Constraint::segment(p)])
///     .subrule(
///         RewriteSubrule::new(vec![Constraint::segment(voiced)])
///             .left(Pattern::new().with(PatternNode::segment(vowel.clone())))
///             .right(Pattern::new().with(PatternNode::segment(vowel))),
///     );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    /// Rule name
    pub name: String,
    /// Target nodes
    pub lhs: Vec<Constraint>,
    /// Alternatives, tried in order at each position
    pub subrules: Vec<RewriteSubrule>,
    /// Scan direction for synthesis
    pub direction: Direction,
    /// Iterative or simultaneous
    pub mode: ApplicationMode,
    /// Syntactic features the word must be unifiable with
    pub required_syntactic: FeatureStruct,
}

impl RewriteRule {
    /// Left-to-right iterative rule with no subrules yet.
    pub fn new(name: &str, lhs: Vec<Constraint>) -> Self {
        Self {
            name: name.to_string(),
            lhs,
            subrules: Vec::new(),
            direction: Direction::LeftToRight,
            mode: ApplicationMode::Iterative,
            required_syntactic: FeatureStruct::new(),
        }
    }

    /// Append a subrule.
    pub fn subrule(mut self, subrule: RewriteSubrule) -> Self {
        self.subrules.push(subrule);
        self
    }

    /// Set the scan direction.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the application mode.
    pub fn mode(mut self, mode: ApplicationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Restrict to words unifiable with `fs`.
    pub fn required_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.required_syntactic = fs;
        self
    }

    /// Whether `subrule` only rewrites features of the target segments.
    pub fn is_feature_subrule(&self, subrule: &RewriteSubrule) -> bool {
        !self.lhs.is_empty()
            && self.lhs.len() == subrule.rhs.len()
            && self
                .lhs
                .iter()
                .zip(&subrule.rhs)
                .all(|(l, r)| l.kind == NodeKind::Segment && r.kind == NodeKind::Segment)
    }

    /// Reapplication strategy for analysis.
    ///
    /// A simultaneous rule is self-opaquing when some output segment is
    /// incompatible with a segment of its environments.
    pub fn analysis_reapply_type(&self) -> AnalysisReapplyType {
        if self.mode != ApplicationMode::Simultaneous {
            return AnalysisReapplyType::Normal;
        }
        let opaque = self.subrules.iter().any(|sr| {
            let env_constraints: Vec<&Constraint> = sr
                .left
                .nodes()
                .iter()
                .chain(sr.right.nodes())
                .flat_map(|n| n.constraints())
                .collect();
            sr.rhs.iter().filter(|out| out.kind == NodeKind::Segment).any(|out| {
                env_constraints
                    .iter()
                    .any(|env| env.kind == NodeKind::Segment && !env.fs.is_unifiable(&out.fs))
            })
        });
        if opaque {
            AnalysisReapplyType::SelfOpaquing
        } else {
            AnalysisReapplyType::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSystem;
    use crate::pattern::PatternNode;

    fn fs(sys: &FeatureSystem, voice: &str) -> FeatureStruct {
        FeatureStruct::builder(sys).symbol("voice", voice).build().unwrap()
    }

    #[test]
    fn test_feature_subrule_classification() {
        let mut sys = FeatureSystem::new();
        sys.add_symbolic("voice", &["+", "-"]).unwrap();
        let rule = RewriteRule::new("r", vec![Constraint::segment(fs(&sys, "-"))]);
        assert!(rule.is_feature_subrule(&RewriteSubrule::new(vec![Constraint::segment(fs(&sys, "+"))])));
        assert!(!rule.is_feature_subrule(&RewriteSubrule::new(vec![])));
        assert!(!rule.is_feature_subrule(&RewriteSubrule::new(vec![Constraint::boundary(FeatureStruct::new())])));
    }

    #[test]
    fn test_self_opaquing_detection() {
        let mut sys = FeatureSystem::new();
        sys.add_symbolic("voice", &["+", "-"]).unwrap();
        let plain = RewriteRule::new("r", vec![Constraint::segment(fs(&sys, "-"))])
            .mode(ApplicationMode::Simultaneous)
            .subrule(
                RewriteSubrule::new(vec![Constraint::segment(fs(&sys, "+"))])
                    .left(Pattern::new().with(PatternNode::segment(fs(&sys, "+")))),
            );
        assert_eq!(plain.analysis_reapply_type(), AnalysisReapplyType::Normal);

        let opaque = RewriteRule::new("r", vec![Constraint::segment(fs(&sys, "-"))])
            .mode(ApplicationMode::Simultaneous)
            .subrule(
                RewriteSubrule::new(vec![Constraint::segment(fs(&sys, "+"))])
                    .left(Pattern::new().with(PatternNode::segment(fs(&sys, "-")))),
            );
        assert_eq!(opaque.analysis_reapply_type(), AnalysisReapplyType::SelfOpaquing);
        assert_eq!(
            opaque.clone().mode(ApplicationMode::Iterative).analysis_reapply_type(),
            AnalysisReapplyType::Normal
        );
    }
}
