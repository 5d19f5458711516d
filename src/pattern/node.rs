//! Pattern trees.

use crate::feature::FeatureStruct;
use crate::shape::NodeKind;

/// Test against a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Required node kind
    pub kind: NodeKind,
    /// Structure the node must unify with (or be subsumed by)
    pub fs: FeatureStruct,
    /// Reject nodes an iterative rule has already visited
    pub unsearched_only: bool,
}

impl Constraint {
    /// Constraint on a segment.
    pub fn segment(fs: FeatureStruct) -> Self {
        Self {
            kind: NodeKind::Segment,
            fs,
            unsearched_only: false,
        }
    }

    /// Constraint on a boundary.
    pub fn boundary(fs: FeatureStruct) -> Self {
        Self {
            kind: NodeKind::Boundary,
            fs,
            unsearched_only: false,
        }
    }

    /// Constraint matching either anchor.
    pub fn anchor() -> Self {
        Self {
            kind: NodeKind::Anchor,
            fs: FeatureStruct::new(),
            unsearched_only: false,
        }
    }
}

/// One element of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternNode {
    /// Match one node.
    Constraint(Constraint),
    /// Named capture around a sub-sequence.
    Group {
        /// Capture name
        name: String,
        /// Captured sub-pattern
        children: Vec<PatternNode>,
    },
    /// Repeat `child` between `min` and `max` times (unbounded if `max` is `None`).
    Quantifier {
        /// Minimum repetitions
        min: usize,
        /// Maximum repetitions
        max: Option<usize>,
        /// Repeated sub-pattern; must not match the empty sequence
        child: Box<PatternNode>,
    },
    /// First alternative that leads to a match wins; later ones are backtracking options.
    Alternation(Vec<Vec<PatternNode>>),
}

impl PatternNode {
    /// Segment constraint.
    pub fn segment(fs: FeatureStruct) -> Self {
        PatternNode::Constraint(Constraint::segment(fs))
    }

    /// Boundary constraint.
    pub fn boundary(fs: FeatureStruct) -> Self {
        PatternNode::Constraint(Constraint::boundary(fs))
    }

    /// Word-edge constraint.
    pub fn anchor() -> Self {
        PatternNode::Constraint(Constraint::anchor())
    }

    /// Named group.
    pub fn group(name: &str, children: Vec<PatternNode>) -> Self {
        PatternNode::Group {
            name: name.to_string(),
            children,
        }
    }

    /// `child?`
    pub fn optional(child: PatternNode) -> Self {
        Self::repeat(child, 0, Some(1))
    }

    /// `child*`
    pub fn zero_or_more(child: PatternNode) -> Self {
        Self::repeat(child, 0, None)
    }

    /// `child+`
    pub fn one_or_more(child: PatternNode) -> Self {
        Self::repeat(child, 1, None)
    }

    /// `child{min,max}`
    pub fn repeat(child: PatternNode, min: usize, max: Option<usize>) -> Self {
        PatternNode::Quantifier {
            min,
            max,
            child: Box::new(child),
        }
    }

    /// Whether this node can match without consuming anything.
    pub fn is_nullable(&self) -> bool {
        match self {
            PatternNode::Constraint(_) => false,
            PatternNode::Group { children, .. } => children.iter().all(PatternNode::is_nullable),
            PatternNode::Quantifier { min, child, .. } => *min == 0 || child.is_nullable(),
            PatternNode::Alternation(alts) => alts.iter().any(|alt| alt.iter().all(PatternNode::is_nullable)),
        }
    }

    /// Every constraint, depth first.
    pub fn constraints(&self) -> Vec<&Constraint> {
        let mut out = Vec::new();
        self.collect_constraints(&mut out);
        out
    }

    fn collect_constraints<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            PatternNode::Constraint(c) => out.push(c),
            PatternNode::Group { children, .. } => {
                for child in children {
                    child.collect_constraints(out);
                }
            }
            PatternNode::Quantifier { child, .. } => child.collect_constraints(out),
            PatternNode::Alternation(alts) => {
                for child in alts.iter().flatten() {
                    child.collect_constraints(out);
                }
            }
        }
    }

    /// Copy with every constraint rewritten by `f`.
    pub fn map_constraints(&self, f: &mut dyn FnMut(&Constraint) -> Constraint) -> PatternNode {
        match self {
            PatternNode::Constraint(c) => PatternNode::Constraint(f(c)),
            PatternNode::Group { name, children } => PatternNode::Group {
                name: name.clone(),
                children: children.iter().map(|c| c.map_constraints(f)).collect(),
            },
            PatternNode::Quantifier { min, max, child } => PatternNode::Quantifier {
                min: *min,
                max: *max,
                child: Box::new(child.map_constraints(f)),
            },
            PatternNode::Alternation(alts) => PatternNode::Alternation(
                alts.iter()
                    .map(|alt| alt.iter().map(|c| c.map_constraints(f)).collect())
                    .collect(),
            ),
        }
    }
}

/// A sequence of pattern nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    nodes: Vec<PatternNode>,
}

impl Pattern {
    /// Empty pattern (matches the empty sequence).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern over the given nodes.
    pub fn from_nodes(nodes: Vec<PatternNode>) -> Self {
        Self { nodes }
    }

    /// Append a node.
    pub fn push(&mut self, node: PatternNode) {
        self.nodes.push(node);
    }

    /// Builder-style append.
    pub fn with(mut self, node: PatternNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Top-level nodes.
    pub fn nodes(&self) -> &[PatternNode] {
        &self.nodes
    }

    /// Whether the pattern has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of top-level nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl From<Vec<PatternNode>> for Pattern {
    fn from(nodes: Vec<PatternNode>) -> Self {
        Self::from_nodes(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nullability() {
        let seg = PatternNode::segment(FeatureStruct::new());
        assert!(!seg.is_nullable());
        assert!(PatternNode::optional(seg.clone()).is_nullable());
        assert!(!PatternNode::one_or_more(seg.clone()).is_nullable());
        assert!(PatternNode::group("g", vec![]).is_nullable());
        assert!(PatternNode::Alternation(vec![vec![seg.clone()], vec![]]).is_nullable());
    }

    #[test]
    fn test_map_constraints_reaches_nested() {
        let seg = PatternNode::segment(FeatureStruct::new());
        let tree = PatternNode::group("g", vec![PatternNode::one_or_more(seg.clone()), seg]);
        let mapped = tree.map_constraints(&mut |c| Constraint {
            unsearched_only: true,
            ..c.clone()
        });
        assert!(mapped.constraints().iter().all(|c| c.unsearched_only));
        assert_eq!(mapped.constraints().len(), 2);
    }
}
