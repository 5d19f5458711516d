//! Root allomorph lookup by shape.
//!
//! Root shapes are stored in a trie whose edges are labelled with segment
//! feature structures. Lookup walks the trie with a (possibly
//! underspecified) analysis shape and follows every edge whose label unifies
//! with the next segment, so a single search returns every root compatible
//! with the shape.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::feature::FeatureStruct;
use crate::shape::{AllomorphId, NodeKind, Shape};

/// A root allomorph stored in the trie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootEntry {
    /// Lexical entry id
    pub entry: String,
    /// Allomorph id
    pub allomorph: AllomorphId,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    // Most nodes branch on a handful of segments
    edges: SmallVec<[(FeatureStruct, usize); 4]>,
    values: SmallVec<[RootEntry; 1]>,
}

/// Trie of root allomorph shapes for one stratum.
///
/// # Example
///
/// ```rust,ignore
/// let mut trie = RootAllomorphTrie::new();
/// trie.add(allomorph.shape(), RootEntry { entry: "tak".into(), allomorph: allomorph.id().clone() });
/// let hits = trie.search(&analysis_shape);
/// ```
#[derive(Debug, Clone)]
pub struct RootAllomorphTrie {
    nodes: Vec<TrieNode>,
    len: usize,
}

impl Default for RootAllomorphTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl RootAllomorphTrie {
    /// Empty trie.
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            len: 0,
        }
    }

    fn segments(shape: &Shape) -> Vec<&FeatureStruct> {
        shape
            .live_nodes()
            .into_iter()
            .filter(|&id| shape.kind(id) == NodeKind::Segment)
            .map(|id| shape.fs(id))
            .collect()
    }

    /// Store `value` under the segments of `shape`.
    pub fn add(&mut self, shape: &Shape, value: RootEntry) {
        let mut node = 0;
        for fs in Self::segments(shape) {
            let existing = self.nodes[node].edges.iter().find(|(label, _)| label == fs).map(|&(_, child)| child);
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    let mut label = fs.deep_clone();
                    label.freeze();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].edges.push((label, child));
                    child
                }
            };
        }
        if !self.nodes[node].values.contains(&value) {
            self.nodes[node].values.push(value);
            self.len += 1;
        }
    }

    /// Every stored root whose shape unifies segment by segment with `shape`.
    ///
    /// Results are deduplicated and in trie order.
    pub fn search(&self, shape: &Shape) -> Vec<RootEntry> {
        let segments = Self::segments(shape);
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            if depth == segments.len() {
                for value in &self.nodes[node].values {
                    if seen.insert(value.clone()) {
                        out.push(value.clone());
                    }
                }
                continue;
            }
            // Reverse so the first edge is explored first.
            for (label, child) in self.nodes[node].edges.iter().rev() {
                if label.is_unifiable(segments[depth]) {
                    stack.push((*child, depth + 1));
                }
            }
        }
        out
    }

    /// Number of stored roots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSystem;

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

        fn shape(&self, segs: &[(&str, Option<&str>)]) -> Shape {
            let mut shape = Shape::new();
            for (cons, voice) in segs {
                let mut b = FeatureStruct::builder(&self.sys).symbol("cons", cons);
                if let Some(v) = voice {
                    b = b.symbol("voice", v);
                }
                shape.push(NodeKind::Segment, b.build().unwrap()).unwrap();
            }
            shape
        }
    }

    fn root(id: &str) -> RootEntry {
        RootEntry {
            entry: id.to_string(),
            allomorph: AllomorphId::new(id),
        }
    }

    #[test]
    fn test_underspecified_search_finds_all_compatible() {
        let f = Fixture::new();
        let mut trie = RootAllomorphTrie::new();
        trie.add(&f.shape(&[("-", Some("+")), ("+", Some("-"))]), root("ap"));
        trie.add(&f.shape(&[("-", Some("+")), ("+", Some("+"))]), root("ab"));
        assert_eq!(trie.len(), 2);

        let hits = trie.search(&f.shape(&[("-", None), ("+", None)]));
        assert_eq!(hits, vec![root("ap"), root("ab")]);

        let hits = trie.search(&f.shape(&[("-", None), ("+", Some("+"))]));
        assert_eq!(hits, vec![root("ab")]);
    }

    #[test]
    fn test_search_requires_full_match() {
        let f = Fixture::new();
        let mut trie = RootAllomorphTrie::new();
        trie.add(&f.shape(&[("-", Some("+"))]), root("a"));
        assert!(trie.search(&f.shape(&[("-", None), ("+", None)])).is_empty());
        assert!(trie.search(&Shape::new()).is_empty());
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let f = Fixture::new();
        let mut trie = RootAllomorphTrie::new();
        let shape = f.shape(&[("+", Some("-"))]);
        trie.add(&shape, root("p"));
        trie.add(&shape, root("p"));
        assert_eq!(trie.len(), 1);
    }
}
