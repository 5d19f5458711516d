//! Character definition tables: text ⇄ shape.
//!
//! A table maps surface strings (one or more characters) to segment or
//! boundary definitions. [`segment`](CharacterDefinitionTable::segment)
//! tokenizes greedily, always taking the longest representation that
//! matches; [`render`](CharacterDefinitionTable::render) maps nodes back to
//! the first definition they unify with.

use rustc_hash::FxHashMap;

use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::shape::{NodeKind, Shape};

/// One segment or boundary symbol.
#[derive(Debug, Clone)]
pub struct CharacterDefinition {
    representations: Vec<String>,
    kind: NodeKind,
    fs: FeatureStruct,
}

impl CharacterDefinition {
    /// Surface strings, the first being the preferred rendering.
    pub fn representations(&self) -> &[String] {
        &self.representations
    }

    /// Segment or boundary.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Phonetic features (frozen).
    pub fn fs(&self) -> &FeatureStruct {
        &self.fs
    }
}

/// A named set of character definitions.
///
/// # Example
///
/// ```rust,ignore
/// let mut table = CharacterDefinitionTable::new("ipa");
/// table.add_segment(&["p"], p_fs);
/// table.add_segment(&["a"], a_fs);
/// table.add_boundary(&["+"]);
/// let shape = table.segment("pa")?;
/// assert_eq!(table.render(&shape), "pa");
/// ```
#[derive(Debug, Clone)]
pub struct CharacterDefinitionTable {
    name: String,
    defs: Vec<CharacterDefinition>,
    by_rep: FxHashMap<String, usize>,
    max_chars: usize,
}

impl CharacterDefinitionTable {
    /// Empty table.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            defs: Vec::new(),
            by_rep: FxHashMap::default(),
            max_chars: 0,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definitions in insertion order.
    pub fn definitions(&self) -> &[CharacterDefinition] {
        &self.defs
    }

    /// Add a segment definition.
    pub fn add_segment(&mut self, representations: &[&str], fs: FeatureStruct) {
        self.add(representations, NodeKind::Segment, fs);
    }

    /// Add a boundary definition.
    pub fn add_boundary(&mut self, representations: &[&str]) {
        self.add(representations, NodeKind::Boundary, FeatureStruct::new());
    }

    fn add(&mut self, representations: &[&str], kind: NodeKind, mut fs: FeatureStruct) {
        fs.freeze();
        let index = self.defs.len();
        for rep in representations {
            self.max_chars = self.max_chars.max(rep.chars().count());
            self.by_rep.entry(rep.to_string()).or_insert(index);
        }
        self.defs.push(CharacterDefinition {
            representations: representations.iter().map(|r| r.to_string()).collect(),
            kind,
            fs,
        });
    }

    /// Definition for an exact representation.
    pub fn lookup(&self, representation: &str) -> Option<&CharacterDefinition> {
        self.by_rep.get(representation).map(|&i| &self.defs[i])
    }

    /// Tokenize `text` into a new shape.
    ///
    /// Fails with [`MorphError::InvalidSegment`] at the first position where
    /// no representation matches.
    pub fn segment(&self, text: &str) -> Result<Shape> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut shape = Shape::new();
        let mut pos = 0;
        while pos < chars.len() {
            let start = chars[pos].0;
            let longest = (1..=self.max_chars.min(chars.len() - pos)).rev().find_map(|n| {
                let end = chars.get(pos + n).map_or(text.len(), |&(b, _)| b);
                self.by_rep.get(&text[start..end]).map(|&i| (n, i))
            });
            let Some((n, index)) = longest else {
                return Err(MorphError::InvalidSegment {
                    table: self.name.clone(),
                    position: pos,
                    text: text.to_string(),
                });
            };
            let def = &self.defs[index];
            shape.push(def.kind, def.fs.clone())?;
            pos += n;
        }
        Ok(shape)
    }

    /// Render the live segments of `shape`.
    pub fn render(&self, shape: &Shape) -> String {
        self.render_nodes(shape, false)
    }

    /// Render live segments and boundaries.
    pub fn render_with_boundaries(&self, shape: &Shape) -> String {
        self.render_nodes(shape, true)
    }

    fn render_nodes(&self, shape: &Shape, boundaries: bool) -> String {
        let mut out = String::new();
        for id in shape.live_nodes() {
            let kind = shape.kind(id);
            if kind == NodeKind::Boundary && !boundaries {
                continue;
            }
            let def = self
                .defs
                .iter()
                .find(|d| d.kind == kind && d.fs.is_unifiable(shape.fs(id)));
            if let Some(rep) = def.and_then(|d| d.representations.first()) {
                out.push_str(rep);
            }
        }
        out
    }

    /// Whether `text` could be a rendering of `shape`.
    ///
    /// Both sides are compared segment by segment; boundaries are ignored.
    pub fn is_match(&self, text: &str, shape: &Shape) -> bool {
        let Ok(surface) = self.segment(text) else {
            return false;
        };
        let segments = |s: &Shape| -> Vec<_> {
            s.live_nodes()
                .into_iter()
                .filter(|&id| s.kind(id) == NodeKind::Segment)
                .collect()
        };
        let a = segments(&surface);
        let b = segments(shape);
        a.len() == b.len() && a.iter().zip(&b).all(|(&x, &y)| surface.fs(x).is_unifiable(shape.fs(y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureSystem;

    fn table() -> CharacterDefinitionTable {
        let mut sys = FeatureSystem::new();
        sys.add_symbolic("cons", &["+", "-"]).unwrap();
        sys.add_symbolic("asp", &["+", "-"]).unwrap();
        let fs = |cons: &str, asp: &str| {
            FeatureStruct::builder(&sys)
                .symbol("cons", cons)
                .symbol("asp", asp)
                .build()
                .unwrap()
        };
        let mut t = CharacterDefinitionTable::new("test");
        t.add_segment(&["t"], fs("+", "-"));
        t.add_segment(&["th"], fs("+", "+"));
        t.add_segment(&["a"], fs("-", "-"));
        t.add_boundary(&["+"]);
        t
    }

    #[test]
    fn test_longest_match_wins() {
        let t = table();
        let shape = t.segment("tha").unwrap();
        assert_eq!(shape.live_nodes().len(), 2);
        assert_eq!(t.render(&shape), "tha");
    }

    #[test]
    fn test_boundaries_are_skipped_when_rendering() {
        let t = table();
        let shape = t.segment("ta+a").unwrap();
        assert_eq!(t.render(&shape), "taa");
        assert_eq!(t.render_with_boundaries(&shape), "ta+a");
    }

    #[test]
    fn test_invalid_segment_reports_position() {
        let t = table();
        match t.segment("tax") {
            Err(MorphError::InvalidSegment { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_is_match() {
        let t = table();
        let shape = t.segment("ta").unwrap();
        assert!(t.is_match("ta", &shape));
        assert!(!t.is_match("tha", &shape));
        assert!(!t.is_match("t", &shape));
    }
}
