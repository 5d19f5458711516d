//! Morph annotations over shape nodes.

use std::fmt;
use std::sync::Arc;

use crate::shape::NodeId;

/// Identifier of an allomorph, unique across a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllomorphId(Arc<str>);

impl AllomorphId {
    /// Wrap an identifier string.
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    /// The identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AllomorphId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for AllomorphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a morph inside its shape's morph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MorphId(pub(crate) u32);

/// A span of nodes contributed by one allomorph.
///
/// Top-level morphs own their nodes. A subsumed morph records an earlier
/// morph whose nodes were entirely consumed by a later rule; it shares its
/// parent's nodes and hangs below it in the morph tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morph {
    pub(crate) allomorph: AllomorphId,
    pub(crate) label: String,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) parent: Option<MorphId>,
    pub(crate) children: Vec<MorphId>,
}

impl Morph {
    /// Allomorph that produced this morph.
    pub fn allomorph(&self) -> &AllomorphId {
        &self.allomorph
    }

    /// Label used for disjunctive bookkeeping (`ROOT` or the rule application number).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Nodes covered, in shape order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// First covered node.
    pub fn start(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Last covered node.
    pub fn end(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    /// Enclosing morph if this one is subsumed.
    pub fn parent(&self) -> Option<MorphId> {
        self.parent
    }

    /// Subsumed morphs.
    pub fn children(&self) -> &[MorphId] {
        &self.children
    }

    /// Whether this morph has no subsumed children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
