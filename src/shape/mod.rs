//! Annotated segment sequences.
//!
//! A [`Shape`] is a doubly linked list of nodes stored in an arena. Node ids
//! are indices into that arena and stay valid across [`Shape::deep_clone`],
//! which is what lets a rule compute positions on one copy of a word and
//! apply them to another. Nodes are never unlinked: a deleted node is only
//! flagged, so spans and morph bookkeeping survive deletion rules.
//!
//! Two anchor nodes bracket every shape. Patterns can match them to express
//! word boundaries.

mod morph;

pub use morph::{AllomorphId, Morph, MorphId};

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashSet, FxHasher};

use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;

/// Index of a node inside its shape's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

/// Scan direction over a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Direction {
    /// From the begin anchor towards the end anchor
    #[default]
    LeftToRight,
    /// From the end anchor towards the begin anchor
    RightToLeft,
}

impl Direction {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::LeftToRight => Direction::RightToLeft,
            Direction::RightToLeft => Direction::LeftToRight,
        }
    }
}

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum NodeKind {
    /// Begin or end sentinel
    Anchor,
    /// A phonological segment
    Segment,
    /// A morpheme or word boundary marker
    Boundary,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    fs: FeatureStruct,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    deleted: bool,
    dirty: bool,
    searched: bool,
    morph: Option<MorphId>,
}

impl NodeData {
    fn new(kind: NodeKind, fs: FeatureStruct) -> Self {
        Self {
            kind,
            fs,
            prev: None,
            next: None,
            deleted: false,
            dirty: false,
            searched: false,
            morph: None,
        }
    }
}

const BEGIN: NodeId = NodeId(0);
const END: NodeId = NodeId(1);

/// An ordered, annotated sequence of nodes.
///
/// # Example
///
/// ```rust,ignore
/// let mut shape = Shape::new();
/// let a = shape.push(NodeKind::Segment, vowel_fs)?;
/// let p = shape.push(NodeKind::Segment, stop_fs)?;
/// assert_eq!(shape.next(a), Some(p));
/// ```
#[derive(Debug, Clone)]
pub struct Shape {
    nodes: Vec<NodeData>,
    morphs: Vec<Morph>,
    frozen: bool,
    hash: u64,
}

impl Default for Shape {
    fn default() -> Self {
        Self::new()
    }
}

impl Shape {
    /// Create an empty shape containing only the two anchors.
    pub fn new() -> Self {
        let mut begin = NodeData::new(NodeKind::Anchor, FeatureStruct::new());
        let mut end = NodeData::new(NodeKind::Anchor, FeatureStruct::new());
        begin.next = Some(END);
        end.prev = Some(BEGIN);
        Self {
            nodes: vec![begin, end],
            morphs: Vec::new(),
            frozen: false,
            hash: 0,
        }
    }

    fn check_frozen(&self) -> Result<()> {
        if self.frozen {
            Err(MorphError::Frozen("shape"))
        } else {
            Ok(())
        }
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.check_frozen()?;
        Ok(&mut self.nodes[id.0 as usize])
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// The begin anchor.
    pub fn begin(&self) -> NodeId {
        BEGIN
    }

    /// The end anchor.
    pub fn end(&self) -> NodeId {
        END
    }

    /// Anchor at the start of a scan in `dir`.
    pub fn begin_in(&self, dir: Direction) -> NodeId {
        match dir {
            Direction::LeftToRight => BEGIN,
            Direction::RightToLeft => END,
        }
    }

    /// First non-anchor node.
    pub fn first(&self) -> Option<NodeId> {
        self.next(BEGIN).filter(|&id| id != END)
    }

    /// Last non-anchor node.
    pub fn last(&self) -> Option<NodeId> {
        self.prev(END).filter(|&id| id != BEGIN)
    }

    /// Following node, anchors included.
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).next
    }

    /// Preceding node, anchors included.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).prev
    }

    /// Neighbour of `id` in direction `dir`.
    pub fn step(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        match dir {
            Direction::LeftToRight => self.next(id),
            Direction::RightToLeft => self.prev(id),
        }
    }

    /// Every node including anchors, in order.
    pub fn sequence(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut cur = Some(BEGIN);
        while let Some(id) = cur {
            out.push(id);
            cur = self.next(id);
        }
        out
    }

    /// Non-anchor nodes in order, deleted ones included.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut seq = self.sequence();
        seq.retain(|&id| self.kind(id) != NodeKind::Anchor);
        seq
    }

    /// Non-anchor nodes that are not deleted, in order.
    pub fn live_nodes(&self) -> Vec<NodeId> {
        let mut seq = self.nodes();
        seq.retain(|&id| !self.is_deleted(id));
        seq
    }

    /// Nodes from `start` to `end` inclusive, in shape order.
    pub fn range(&self, start: NodeId, end: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = Some(start);
        while let Some(id) = cur {
            out.push(id);
            if id == end {
                break;
            }
            cur = self.next(id);
        }
        out
    }

    /// Number of non-anchor nodes, deleted ones included.
    pub fn len(&self) -> usize {
        self.nodes.len() - 2
    }

    /// Whether there are no non-anchor nodes.
    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// Position of every node in shape order, indexed by node id.
    pub fn order(&self) -> Vec<usize> {
        let mut order = vec![0; self.nodes.len()];
        for (pos, id) in self.sequence().into_iter().enumerate() {
            order[id.0 as usize] = pos;
        }
        order
    }

    // ========================================================================
    // Node access
    // ========================================================================

    /// Node kind.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.data(id).kind
    }

    /// Node feature structure.
    pub fn fs(&self, id: NodeId) -> &FeatureStruct {
        &self.data(id).fs
    }

    /// Mutable node feature structure.
    pub fn fs_mut(&mut self, id: NodeId) -> Result<&mut FeatureStruct> {
        Ok(&mut self.data_mut(id)?.fs)
    }

    /// Whether the node has been deleted by a rule.
    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.data(id).deleted
    }

    /// Flag a node deleted.
    pub fn set_deleted(&mut self, id: NodeId, deleted: bool) -> Result<()> {
        self.data_mut(id)?.deleted = deleted;
        Ok(())
    }

    /// Whether the node was modified since the last reset.
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.data(id).dirty
    }

    /// Flag a node modified.
    pub fn set_dirty(&mut self, id: NodeId, dirty: bool) -> Result<()> {
        self.data_mut(id)?.dirty = dirty;
        Ok(())
    }

    /// Whether an iterative rule already visited the node.
    pub fn is_searched(&self, id: NodeId) -> bool {
        self.data(id).searched
    }

    /// Flag a node visited.
    pub fn set_searched(&mut self, id: NodeId, searched: bool) -> Result<()> {
        self.data_mut(id)?.searched = searched;
        Ok(())
    }

    /// Clear the dirty and searched flags of every node.
    pub fn reset_flags(&mut self) -> Result<()> {
        self.check_frozen()?;
        for node in &mut self.nodes {
            node.dirty = false;
            node.searched = false;
        }
        Ok(())
    }

    /// Top-level morph owning the node.
    pub fn node_morph(&self, id: NodeId) -> Option<MorphId> {
        self.data(id).morph
    }

    // ========================================================================
    // Structural mutation
    // ========================================================================

    /// Append a node before the end anchor.
    pub fn push(&mut self, kind: NodeKind, fs: FeatureStruct) -> Result<NodeId> {
        let last = self.prev(END).unwrap_or(BEGIN);
        self.add_after(last, kind, fs)
    }

    /// Insert a node directly after `after`.
    pub fn add_after(&mut self, after: NodeId, kind: NodeKind, fs: FeatureStruct) -> Result<NodeId> {
        self.check_frozen()?;
        let anchor = if after == END {
            self.prev(END).unwrap_or(BEGIN)
        } else {
            after
        };
        let id = NodeId(self.nodes.len() as u32);
        let next = self.data(anchor).next;
        let mut data = NodeData::new(kind, fs);
        data.prev = Some(anchor);
        data.next = next;
        self.nodes.push(data);
        self.nodes[anchor.0 as usize].next = Some(id);
        if let Some(n) = next {
            self.nodes[n.0 as usize].prev = Some(id);
        }
        Ok(id)
    }

    /// Insert a node directly before `before`.
    pub fn add_before(&mut self, before: NodeId, kind: NodeKind, fs: FeatureStruct) -> Result<NodeId> {
        let prev = self.prev(before).unwrap_or(BEGIN);
        self.add_after(prev, kind, fs)
    }

    /// Append a copy of node `id` of `source` and return the new node.
    pub fn push_copy(&mut self, source: &Shape, id: NodeId) -> Result<NodeId> {
        self.push(source.kind(id), source.fs(id).deep_clone())
    }

    /// Remove every node and morph.
    pub fn clear(&mut self) -> Result<()> {
        self.check_frozen()?;
        *self = Shape::new();
        Ok(())
    }

    // ========================================================================
    // Morphs
    // ========================================================================

    /// Mark `nodes` as a top-level morph of `allomorph`.
    ///
    /// Returns `None` when `nodes` is empty.
    pub fn mark_morph(&mut self, nodes: &[NodeId], allomorph: &AllomorphId, label: &str) -> Result<Option<MorphId>> {
        self.check_frozen()?;
        if nodes.is_empty() {
            return Ok(None);
        }
        let id = MorphId(self.morphs.len() as u32);
        self.morphs.push(Morph {
            allomorph: allomorph.clone(),
            label: label.to_string(),
            nodes: nodes.to_vec(),
            parent: None,
            children: Vec::new(),
        });
        for node in nodes {
            self.nodes[node.0 as usize].morph = Some(id);
        }
        Ok(Some(id))
    }

    /// Record `allomorph` as subsumed by `parent`, sharing its nodes.
    pub fn mark_subsumed_morph(&mut self, parent: MorphId, allomorph: &AllomorphId, label: &str) -> Result<MorphId> {
        self.check_frozen()?;
        let id = MorphId(self.morphs.len() as u32);
        let nodes = self.morphs[parent.0 as usize].nodes.clone();
        self.morphs.push(Morph {
            allomorph: allomorph.clone(),
            label: label.to_string(),
            nodes,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.morphs[parent.0 as usize].children.push(id);
        Ok(id)
    }

    /// Morph by id.
    pub fn morph(&self, id: MorphId) -> &Morph {
        &self.morphs[id.0 as usize]
    }

    /// Top-level morphs ordered by their first node.
    pub fn top_morphs(&self) -> Vec<MorphId> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for id in self.sequence() {
            if let Some(m) = self.node_morph(id) {
                if seen.insert(m) {
                    out.push(m);
                }
            }
        }
        out
    }

    /// Every morph, subsumed ones first (post-order), top-level morphs in shape order.
    pub fn morphs(&self) -> Vec<MorphId> {
        fn visit(shape: &Shape, id: MorphId, out: &mut Vec<MorphId>) {
            for &child in shape.morph(id).children() {
                visit(shape, child, out);
            }
            out.push(id);
        }
        let mut out = Vec::new();
        for id in self.top_morphs() {
            visit(self, id, &mut out);
        }
        out
    }

    // ========================================================================
    // Comparison, freezing
    // ========================================================================

    /// Whether both shapes have the same live length and every pair of
    /// corresponding live nodes is of the same kind and unifiable.
    pub fn duplicates(&self, other: &Shape) -> bool {
        let a = self.live_nodes();
        let b = other.live_nodes();
        a.len() == b.len()
            && a.iter().zip(&b).all(|(&x, &y)| {
                self.kind(x) == other.kind(y) && self.fs(x).is_unifiable(other.fs(y))
            })
    }

    /// Structural equality over live nodes and the morph forest.
    pub fn value_eq(&self, other: &Shape) -> bool {
        if self.frozen && other.frozen && self.hash != other.hash {
            return false;
        }
        let a = self.live_nodes();
        let b = other.live_nodes();
        a.len() == b.len()
            && a.iter()
                .zip(&b)
                .all(|(&x, &y)| self.kind(x) == other.kind(y) && self.fs(x) == other.fs(y))
            && self.morph_signature() == other.morph_signature()
    }

    fn morph_signature(&self) -> Vec<(AllomorphId, String, Vec<usize>, usize)> {
        let live = self.live_nodes();
        let mut position = vec![usize::MAX; self.nodes.len()];
        for (i, id) in live.iter().enumerate() {
            position[id.0 as usize] = i;
        }
        self.morphs()
            .into_iter()
            .map(|id| {
                let m = self.morph(id);
                let span = m
                    .nodes
                    .iter()
                    .map(|n| position[n.0 as usize])
                    .filter(|&p| p != usize::MAX)
                    .collect();
                let mut depth = 0;
                let mut cur = m.parent;
                while let Some(p) = cur {
                    depth += 1;
                    cur = self.morph(p).parent;
                }
                (m.allomorph.clone(), m.label.clone(), span, depth)
            })
            .collect()
    }

    /// Make the shape and all node structures immutable; returns the content hash.
    pub fn freeze(&mut self) -> u64 {
        if self.frozen {
            return self.hash;
        }
        for node in &mut self.nodes {
            node.fs.freeze();
        }
        self.hash = self.compute_hash();
        self.frozen = true;
        self.hash
    }

    /// Whether [`freeze`](Self::freeze) has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Content hash; cached once frozen.
    pub fn content_hash(&self) -> u64 {
        if self.frozen {
            self.hash
        } else {
            self.compute_hash()
        }
    }

    fn compute_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for id in self.live_nodes() {
            self.kind(id).hash(&mut hasher);
            self.fs(id).content_hash().hash(&mut hasher);
        }
        self.morph_signature().hash(&mut hasher);
        hasher.finish()
    }

    /// Mutable structural copy. Node and morph ids are preserved.
    pub fn deep_clone(&self) -> Shape {
        let mut copy = self.clone();
        copy.frozen = false;
        copy.hash = 0;
        for node in &mut copy.nodes {
            node.fs = node.fs.deep_clone();
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSystem;

    fn seg(sys: &FeatureSystem, sym: &str) -> FeatureStruct {
        FeatureStruct::builder(sys).symbol("seg", sym).build().unwrap()
    }

    fn system() -> FeatureSystem {
        let mut sys = FeatureSystem::new();
        sys.add_symbolic("seg", &["a", "p", "t"]).unwrap();
        sys
    }

    #[test]
    fn test_push_and_navigate() {
        let sys = system();
        let mut shape = Shape::new();
        let a = shape.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        let p = shape.push(NodeKind::Segment, seg(&sys, "p")).unwrap();
        assert_eq!(shape.first(), Some(a));
        assert_eq!(shape.last(), Some(p));
        assert_eq!(shape.next(a), Some(p));
        assert_eq!(shape.prev(a), Some(shape.begin()));
        assert_eq!(shape.step(p, Direction::LeftToRight), Some(shape.end()));
        assert_eq!(shape.len(), 2);
    }

    #[test]
    fn test_add_after_links() {
        let sys = system();
        let mut shape = Shape::new();
        let a = shape.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        let t = shape.push(NodeKind::Segment, seg(&sys, "t")).unwrap();
        let p = shape.add_after(a, NodeKind::Segment, seg(&sys, "p")).unwrap();
        assert_eq!(shape.nodes(), vec![a, p, t]);
        let b = shape.add_before(a, NodeKind::Boundary, FeatureStruct::new()).unwrap();
        assert_eq!(shape.nodes(), vec![b, a, p, t]);
    }

    #[test]
    fn test_deleted_nodes_stay_linked() {
        let sys = system();
        let mut shape = Shape::new();
        let a = shape.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        let p = shape.push(NodeKind::Segment, seg(&sys, "p")).unwrap();
        shape.set_deleted(a, true).unwrap();
        assert_eq!(shape.nodes(), vec![a, p]);
        assert_eq!(shape.live_nodes(), vec![p]);
    }

    #[test]
    fn test_morph_forest() {
        let sys = system();
        let mut shape = Shape::new();
        let a = shape.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        let p = shape.push(NodeKind::Segment, seg(&sys, "p")).unwrap();
        let t = shape.push(NodeKind::Segment, seg(&sys, "t")).unwrap();
        let prefix = shape.mark_morph(&[a], &AllomorphId::new("pfx"), "0").unwrap().unwrap();
        let root = shape.mark_morph(&[p, t], &AllomorphId::new("root"), "ROOT").unwrap().unwrap();
        let inner = shape.mark_subsumed_morph(root, &AllomorphId::new("old"), "1").unwrap();
        assert_eq!(shape.top_morphs(), vec![prefix, root]);
        assert_eq!(shape.morphs(), vec![prefix, inner, root]);
        assert_eq!(shape.morph(inner).parent(), Some(root));
        assert_eq!(shape.node_morph(t), Some(root));
        assert!(shape.mark_morph(&[], &AllomorphId::new("x"), "2").unwrap().is_none());
    }

    #[test]
    fn test_freeze_blocks_mutation() {
        let sys = system();
        let mut shape = Shape::new();
        let a = shape.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        shape.freeze();
        assert_eq!(shape.set_deleted(a, true), Err(MorphError::Frozen("shape")));
        assert!(shape.push(NodeKind::Segment, seg(&sys, "p")).is_err());
        assert!(!shape.is_deleted(a));
        assert_eq!(shape.len(), 1);

        let mut copy = shape.deep_clone();
        assert!(copy.set_deleted(a, true).is_ok());
        assert!(copy.fs_mut(a).is_ok());
    }

    #[test]
    fn test_value_eq_ignores_deleted_and_ids() {
        let sys = system();
        let mut x = Shape::new();
        let xa = x.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        x.push(NodeKind::Segment, seg(&sys, "p")).unwrap();
        x.add_after(xa, NodeKind::Segment, seg(&sys, "t")).unwrap();
        let t = x.nodes()[1];
        x.set_deleted(t, true).unwrap();

        let mut y = Shape::new();
        y.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        y.push(NodeKind::Segment, seg(&sys, "p")).unwrap();
        assert!(x.value_eq(&y));
        assert_eq!(x.freeze(), y.freeze());
    }

    #[test]
    fn test_value_eq_sees_morphs() {
        let sys = system();
        let mut x = Shape::new();
        let a = x.push(NodeKind::Segment, seg(&sys, "a")).unwrap();
        let mut y = x.deep_clone();
        x.mark_morph(&[a], &AllomorphId::new("one"), "ROOT").unwrap();
        y.mark_morph(&[a], &AllomorphId::new("two"), "ROOT").unwrap();
        assert!(!x.value_eq(&y));
    }
}
