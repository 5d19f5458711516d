//! Backtracking matcher over shapes.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::Result;
use crate::feature::VariableBindings;
use crate::pattern::compile::{Inst, Program};
use crate::pattern::node::{Constraint, Pattern};
use crate::shape::{Direction, NodeId, NodeKind, Shape};

/// How a constraint's structure is compared with a node's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchingMethod {
    /// The two structures must be unifiable
    #[default]
    Unification,
    /// The constraint must subsume the node
    Subsumption,
}

/// Node kinds a matcher sees; deleted nodes are always skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFilter {
    /// Include segments
    pub segments: bool,
    /// Include boundaries
    pub boundaries: bool,
    /// Include the begin/end anchors
    pub anchors: bool,
}

impl NodeFilter {
    /// Segments only.
    pub const SEGMENTS: NodeFilter = NodeFilter {
        segments: true,
        boundaries: false,
        anchors: false,
    };

    /// Every node kind.
    pub const ALL: NodeFilter = NodeFilter {
        segments: true,
        boundaries: true,
        anchors: true,
    };

    /// Whether nodes of `kind` pass the filter.
    pub fn accepts(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Segment => self.segments,
            NodeKind::Boundary => self.boundaries,
            NodeKind::Anchor => self.anchors,
        }
    }
}

impl Default for NodeFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Semantic veto applied to structurally successful matches.
pub type AcceptableFn = Arc<dyn Fn(&Shape, &Match) -> bool + Send + Sync>;

/// Wrap a closure as an [`AcceptableFn`].
pub fn acceptable<F>(f: F) -> AcceptableFn
where
    F: Fn(&Shape, &Match) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Matcher configuration.
#[derive(Clone, Default)]
pub struct MatcherSettings {
    /// Scan direction
    pub direction: Direction,
    /// Which nodes the pattern sees
    pub filter: NodeFilter,
    /// Match must begin at the first visible non-anchor node
    pub anchored_to_start: bool,
    /// Match must end at the last visible non-anchor node
    pub anchored_to_end: bool,
    /// Report every way the pattern can match, not only the preferred one
    pub all_submatches: bool,
    /// Constraint comparison
    pub method: MatchingMethod,
    /// Optional veto run after a structural match
    pub acceptable: Option<AcceptableFn>,
}

impl fmt::Debug for MatcherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherSettings")
            .field("direction", &self.direction)
            .field("filter", &self.filter)
            .field("anchored_to_start", &self.anchored_to_start)
            .field("anchored_to_end", &self.anchored_to_end)
            .field("all_submatches", &self.all_submatches)
            .field("method", &self.method)
            .field("acceptable", &self.acceptable.is_some())
            .finish()
    }
}

/// Result of a successful match.
///
/// Node lists are in shape order regardless of scan direction and contain
/// only nodes the matcher actually consumed.
#[derive(Debug, Clone)]
pub struct Match {
    nodes: Vec<NodeId>,
    groups: SmallVec<[(String, Vec<NodeId>); 4]>,
    bindings: VariableBindings,
    origin: Option<NodeId>,
}

impl Match {
    /// Every consumed node.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// First consumed node in shape order.
    pub fn start(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Last consumed node in shape order.
    pub fn end(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Node the scan started from (the first node in scan direction).
    pub fn origin(&self) -> Option<NodeId> {
        self.origin
    }

    /// Nodes captured by the first non-empty capture of `name`.
    pub fn group(&self, name: &str) -> Option<&[NodeId]> {
        self.groups
            .iter()
            .find(|(n, nodes)| n == name && !nodes.is_empty())
            .map(|(_, nodes)| nodes.as_slice())
    }

    /// Whether `name` captured at least one node.
    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    /// All captures in pattern order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[NodeId])> {
        self.groups.iter().map(|(n, nodes)| (n.as_str(), nodes.as_slice()))
    }

    /// Variable bindings established by the match.
    pub fn bindings(&self) -> &VariableBindings {
        &self.bindings
    }
}

#[derive(Clone)]
struct Thread {
    pc: usize,
    pos: usize,
    saves: SmallVec<[Option<usize>; 8]>,
    bindings: VariableBindings,
}

/// A compiled pattern plus its settings.
#[derive(Clone)]
pub struct Matcher {
    program: Program,
    settings: MatcherSettings,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("instructions", &self.program.insts.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Matcher {
    /// Compile `pattern`; fails with `InvalidPattern` for malformed quantifiers.
    pub fn new(pattern: &Pattern, settings: MatcherSettings) -> Result<Self> {
        let program = Program::compile(pattern.nodes(), settings.direction)?;
        Ok(Self { program, settings })
    }

    /// Settings the matcher was built with.
    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Visible nodes in scan order.
    fn visible(&self, shape: &Shape) -> Vec<NodeId> {
        let mut seq = shape.sequence();
        seq.retain(|&id| !shape.is_deleted(id) && self.settings.filter.accepts(shape.kind(id)));
        if self.settings.direction == Direction::RightToLeft {
            seq.reverse();
        }
        seq
    }

    fn content_bounds(shape: &Shape, seq: &[NodeId]) -> (usize, usize) {
        let start = seq
            .iter()
            .position(|&id| shape.kind(id) != NodeKind::Anchor)
            .unwrap_or(seq.len());
        let end = seq
            .iter()
            .rposition(|&id| shape.kind(id) != NodeKind::Anchor)
            .map(|p| p + 1)
            .unwrap_or(start);
        (start, end)
    }

    /// First match whose scan starts at or after `from` (in scan direction).
    pub fn first_match(&self, shape: &Shape, from: Option<NodeId>) -> Option<Match> {
        let seq = self.visible(shape);
        let first = match from {
            Some(node) => self.position_from(shape, &seq, node),
            None => 0,
        };
        let bounds = Self::content_bounds(shape, &seq);
        for pos in self.start_positions(first, seq.len(), bounds) {
            if let Some(m) = self.run(shape, &seq, pos, bounds, false).into_iter().next() {
                return Some(m);
            }
        }
        None
    }

    /// Preferred match starting exactly at `node`.
    pub fn match_at(&self, shape: &Shape, node: NodeId) -> Option<Match> {
        self.matches_at(shape, node, false).into_iter().next()
    }

    /// Matches starting exactly at `node`; every path if `all_submatches` is set.
    pub fn matches_at(&self, shape: &Shape, node: NodeId, all: bool) -> Vec<Match> {
        let seq = self.visible(shape);
        let bounds = Self::content_bounds(shape, &seq);
        match seq.iter().position(|&id| id == node) {
            Some(pos) => self.run(shape, &seq, pos, bounds, all || self.settings.all_submatches),
            None => Vec::new(),
        }
    }

    /// Matches at every permitted start position.
    pub fn all_matches(&self, shape: &Shape) -> Vec<Match> {
        let seq = self.visible(shape);
        let bounds = Self::content_bounds(shape, &seq);
        let mut out = Vec::new();
        for pos in self.start_positions(0, seq.len(), bounds) {
            out.extend(self.run(shape, &seq, pos, bounds, self.settings.all_submatches));
        }
        out
    }

    /// Whether the pattern matches anywhere.
    pub fn is_match(&self, shape: &Shape) -> bool {
        self.first_match(shape, None).is_some()
    }

    fn start_positions(&self, first: usize, len: usize, bounds: (usize, usize)) -> Vec<usize> {
        if self.settings.anchored_to_start {
            if first <= bounds.0 {
                vec![bounds.0]
            } else {
                Vec::new()
            }
        } else {
            // One past the end lets empty patterns match at the edge.
            (first..=len).collect()
        }
    }

    /// Index of the first visible node at or after `node` in scan order.
    fn position_from(&self, shape: &Shape, seq: &[NodeId], node: NodeId) -> usize {
        let order = shape.order();
        let target = order[node.0 as usize];
        let after = |id: &NodeId| match self.settings.direction {
            Direction::LeftToRight => order[id.0 as usize] >= target,
            Direction::RightToLeft => order[id.0 as usize] <= target,
        };
        seq.iter().position(after).unwrap_or(seq.len())
    }

    fn test(&self, constraint: &Constraint, shape: &Shape, node: NodeId, bindings: &mut VariableBindings) -> bool {
        if shape.kind(node) != constraint.kind {
            return false;
        }
        if constraint.unsearched_only && shape.is_searched(node) {
            return false;
        }
        match self.settings.method {
            MatchingMethod::Unification => constraint.fs.is_unifiable_bound(shape.fs(node), bindings),
            MatchingMethod::Subsumption => constraint.fs.subsumes_bound(shape.fs(node), bindings),
        }
    }

    fn run(&self, shape: &Shape, seq: &[NodeId], start: usize, bounds: (usize, usize), all: bool) -> Vec<Match> {
        let mut results = Vec::new();
        let mut stack = vec![Thread {
            pc: 0,
            pos: start,
            saves: SmallVec::from_elem(None, self.program.slot_count()),
            bindings: VariableBindings::new(),
        }];

        while let Some(mut t) = stack.pop() {
            loop {
                match self.program.insts[t.pc] {
                    Inst::Test(ci) => {
                        let constraint = &self.program.constraints[ci];
                        if t.pos < seq.len() && self.test(constraint, shape, seq[t.pos], &mut t.bindings) {
                            t.pos += 1;
                            t.pc += 1;
                        } else {
                            break;
                        }
                    }
                    Inst::Save(slot) => {
                        t.saves[slot] = Some(t.pos);
                        t.pc += 1;
                    }
                    Inst::Split(a, b) => {
                        let mut alt = t.clone();
                        alt.pc = b;
                        stack.push(alt);
                        t.pc = a;
                    }
                    Inst::Jump(a) => t.pc = a,
                    Inst::Match => {
                        if self.settings.anchored_to_end && t.pos != bounds.1 {
                            break;
                        }
                        let m = self.build_match(seq, start, &t);
                        let accepted = match &self.settings.acceptable {
                            Some(acceptable) => acceptable(shape, &m),
                            None => true,
                        };
                        if accepted {
                            results.push(m);
                            if !all {
                                return results;
                            }
                        }
                        break;
                    }
                }
            }
        }
        results
    }

    fn build_match(&self, seq: &[NodeId], start: usize, t: &Thread) -> Match {
        let in_shape_order = |from: usize, to: usize| -> Vec<NodeId> {
            let mut nodes = seq[from..to].to_vec();
            if self.settings.direction == Direction::RightToLeft {
                nodes.reverse();
            }
            nodes
        };
        let mut groups = SmallVec::new();
        for (k, name) in self.program.groups.iter().enumerate() {
            if let (Some(open), Some(close)) = (t.saves[2 * k], t.saves[2 * k + 1]) {
                if open <= close {
                    groups.push((name.clone(), in_shape_order(open, close)));
                }
            }
        }
        Match {
            nodes: in_shape_order(start, t.pos),
            groups,
            bindings: t.bindings.clone(),
            origin: seq.get(start).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureStruct, FeatureSystem};
    use crate::pattern::node::PatternNode;

    struct Fixture {
        sys: FeatureSystem,
    }

    impl Fixture {
        fn new() -> Self {
            let mut sys = FeatureSystem::new();
            sys.add_symbolic("cons", &["+", "-"]).unwrap();
            sys.add_symbolic("voice", &["+", "-"]).unwrap();
            Self { sys }
        }

        fn fs(&self, cons: &str, voice: &str) -> FeatureStruct {
            FeatureStruct::builder(&self.sys)
                .symbol("cons", cons)
                .symbol("voice", voice)
                .build()
                .unwrap()
        }

        fn vowel(&self) -> FeatureStruct {
            FeatureStruct::builder(&self.sys).symbol("cons", "-").build().unwrap()
        }

        fn consonant(&self) -> FeatureStruct {
            FeatureStruct::builder(&self.sys).symbol("cons", "+").build().unwrap()
        }

        /// a p a t
        fn shape(&self) -> Shape {
            let mut shape = Shape::new();
            shape.push(NodeKind::Segment, self.fs("-", "+")).unwrap();
            shape.push(NodeKind::Segment, self.fs("+", "-")).unwrap();
            shape.push(NodeKind::Segment, self.fs("-", "+")).unwrap();
            shape.push(NodeKind::Segment, self.fs("+", "-")).unwrap();
            shape
        }
    }

    #[test]
    fn test_unanchored_first_match() {
        let fx = Fixture::new();
        let shape = fx.shape();
        let pattern = Pattern::new()
            .with(PatternNode::segment(fx.vowel()))
            .with(PatternNode::group("c", vec![PatternNode::segment(fx.consonant())]))
            .with(PatternNode::segment(fx.vowel()));
        let matcher = Matcher::new(&pattern, MatcherSettings::default()).unwrap();
        let m = matcher.first_match(&shape, None).unwrap();
        let nodes = shape.nodes();
        assert_eq!(m.nodes(), &nodes[0..3]);
        assert_eq!(m.group("c"), Some(&nodes[1..2]));
    }

    #[test]
    fn test_right_to_left_finds_rightmost() {
        let fx = Fixture::new();
        let shape = fx.shape();
        let pattern = Pattern::new()
            .with(PatternNode::segment(fx.vowel()))
            .with(PatternNode::segment(fx.consonant()));
        let settings = MatcherSettings {
            direction: Direction::RightToLeft,
            ..Default::default()
        };
        let m = Matcher::new(&pattern, settings).unwrap().first_match(&shape, None).unwrap();
        let nodes = shape.nodes();
        assert_eq!(m.nodes(), &nodes[2..4]);
        assert_eq!(m.origin(), Some(nodes[3]));
    }

    #[test]
    fn test_anchored_all_submatches() {
        let fx = Fixture::new();
        let shape = fx.shape();
        let any = PatternNode::segment(FeatureStruct::new());
        let pattern = Pattern::new()
            .with(PatternNode::group("head", vec![PatternNode::one_or_more(any.clone())]))
            .with(PatternNode::group("tail", vec![PatternNode::one_or_more(any)]));
        let settings = MatcherSettings {
            filter: NodeFilter::SEGMENTS,
            anchored_to_start: true,
            anchored_to_end: true,
            all_submatches: true,
            ..Default::default()
        };
        let matches = Matcher::new(&pattern, settings).unwrap().all_matches(&shape);
        let mut head_lengths: Vec<usize> = matches.iter().map(|m| m.group("head").unwrap().len()).collect();
        head_lengths.sort_unstable();
        assert_eq!(head_lengths, vec![1, 2, 3]);
    }

    #[test]
    fn test_variables_agree_across_constraints() {
        let fx = Fixture::new();
        let shape = fx.shape();
        let same_voice = FeatureStruct::builder(&fx.sys).variable("voice", "a").build().unwrap();
        let pattern = Pattern::new()
            .with(PatternNode::segment(same_voice.clone()))
            .with(PatternNode::segment(same_voice));
        let matcher = Matcher::new(&pattern, MatcherSettings::default()).unwrap();
        // a-p, p-a, a-t all disagree in voicing.
        assert!(!matcher.is_match(&shape));
    }

    #[test]
    fn test_acceptable_veto_backtracks() {
        let fx = Fixture::new();
        let shape = fx.shape();
        let pattern = Pattern::new().with(PatternNode::segment(fx.consonant()));
        let last = shape.last().unwrap();
        let settings = MatcherSettings {
            acceptable: Some(acceptable(move |_, m| m.start() == Some(last))),
            ..Default::default()
        };
        let m = Matcher::new(&pattern, settings).unwrap().first_match(&shape, None).unwrap();
        assert_eq!(m.start(), Some(last));
    }

    #[test]
    fn test_deleted_and_searched_nodes() {
        let fx = Fixture::new();
        let mut shape = fx.shape();
        let nodes = shape.nodes();
        shape.set_deleted(nodes[1], true).unwrap();
        let pattern = Pattern::new()
            .with(PatternNode::segment(fx.vowel()))
            .with(PatternNode::segment(fx.vowel()));
        let matcher = Matcher::new(&pattern, MatcherSettings::default()).unwrap();
        assert_eq!(matcher.first_match(&shape, None).unwrap().nodes(), &[nodes[0], nodes[2]]);

        shape.set_searched(nodes[3], true).unwrap();
        let unsearched = Pattern::new().with(PatternNode::Constraint(Constraint {
            unsearched_only: true,
            ..Constraint::segment(fx.consonant())
        }));
        assert!(Matcher::new(&unsearched, MatcherSettings::default()).unwrap().first_match(&shape, None).is_none());
    }

    #[test]
    fn test_anchor_constraint() {
        let fx = Fixture::new();
        let shape = fx.shape();
        let pattern = Pattern::new()
            .with(PatternNode::segment(fx.consonant()))
            .with(PatternNode::anchor());
        let m = Matcher::new(&pattern, MatcherSettings::default()).unwrap().first_match(&shape, None).unwrap();
        assert_eq!(m.start(), shape.last());
    }
}
