//! Right-hand-side actions of morphological rules.
//!
//! The left-hand side of an affixation or compounding rule is a list of
//! named [`PatternPart`]s. The right-hand side is a list of
//! [`MorphologicalOutput`] actions that build the output shape from the
//! captured parts and new material.

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::feature::{FeatureStruct, VariableBindings};
use crate::pattern::{Constraint, Match, Pattern, PatternNode};
use crate::shape::{NodeId, NodeKind, Shape};

/// A named part of a rule's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternPart {
    /// Part name, referenced by output actions
    pub name: String,
    /// What the part matches
    pub pattern: Pattern,
}

impl PatternPart {
    /// Part named `name` matching `pattern`.
    pub fn new(name: &str, pattern: Pattern) -> Self {
        Self {
            name: name.to_string(),
            pattern,
        }
    }

    pub(crate) fn group(&self) -> PatternNode {
        PatternNode::group(&self.name, self.pattern.nodes().to_vec())
    }

    /// Nodes that stand in for this part when analysis must invent it:
    /// one node per top-level constraint.
    pub(crate) fn placeholder_nodes(&self, shape: &mut Shape) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for node in self.pattern.nodes() {
            if let PatternNode::Constraint(c) = node {
                out.push(shape.push(c.kind, c.fs.instantiate_lenient(&VariableBindings::new()))?);
            }
        }
        Ok(out)
    }
}

/// One step in building a rule's output shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MorphologicalOutput {
    /// Copy the nodes captured by a part.
    CopyFromInput {
        /// Part to copy
        part: String,
    },
    /// Copy the nodes captured by a part, overwriting features.
    ModifyFromInput {
        /// Part to copy
        part: String,
        /// Features written over each copied segment
        fs: FeatureStruct,
    },
    /// Insert new nodes.
    InsertSegments {
        /// Node kind and features of each new node
        segments: Vec<(NodeKind, FeatureStruct)>,
    },
}

impl MorphologicalOutput {
    /// Copy `part` unchanged.
    pub fn copy(part: &str) -> Self {
        MorphologicalOutput::CopyFromInput { part: part.to_string() }
    }

    /// Copy `part` with `fs` priority-unioned into each segment.
    pub fn modify(part: &str, fs: FeatureStruct) -> Self {
        MorphologicalOutput::ModifyFromInput {
            part: part.to_string(),
            fs,
        }
    }

    /// Insert the live nodes of `shape`.
    pub fn insert_shape(shape: &Shape) -> Self {
        MorphologicalOutput::InsertSegments {
            segments: shape
                .live_nodes()
                .into_iter()
                .map(|id| (shape.kind(id), shape.fs(id).deep_clone()))
                .collect(),
        }
    }

    /// Part this action reads, if any.
    pub fn part_name(&self) -> Option<&str> {
        match self {
            MorphologicalOutput::CopyFromInput { part } | MorphologicalOutput::ModifyFromInput { part, .. } => Some(part),
            MorphologicalOutput::InsertSegments { .. } => None,
        }
    }

    /// Append this action's nodes to `output`.
    ///
    /// Returns `(source, new)` pairs; `source` is `None` for inserted nodes.
    pub(crate) fn apply(&self, input: &Shape, m: &Match, output: &mut Shape) -> Result<Vec<(Option<NodeId>, NodeId)>> {
        let mut mapping = Vec::new();
        match self {
            MorphologicalOutput::CopyFromInput { part } => {
                for node in captured(input, m, part) {
                    mapping.push((Some(node), output.push_copy(input, node)?));
                }
            }
            MorphologicalOutput::ModifyFromInput { part, fs } => {
                for node in captured(input, m, part) {
                    let new = output.push_copy(input, node)?;
                    if input.kind(node) == NodeKind::Segment {
                        output.fs_mut(new)?.priority_union(fs, m.bindings())?;
                    }
                    mapping.push((Some(node), new));
                }
            }
            MorphologicalOutput::InsertSegments { segments } => {
                for (kind, fs) in segments {
                    mapping.push((None, output.push(*kind, fs.instantiate(m.bindings())?)?));
                }
            }
        }
        Ok(mapping)
    }

    /// Pattern nodes matching what this action produced, for analysis.
    ///
    /// Copied parts reuse the part's pattern under the capture name `group`;
    /// modified parts additionally require the written features; inserted
    /// segments become literal constraints. Inserted boundaries are not
    /// visible to morphological patterns and are left out.
    pub(crate) fn analysis_nodes(&self, parts: &[PatternPart], group: &str) -> Vec<PatternNode> {
        match self {
            MorphologicalOutput::CopyFromInput { part } => parts
                .iter()
                .find(|p| &p.name == part)
                .map(|p| vec![PatternNode::group(group, p.pattern.nodes().to_vec())])
                .unwrap_or_default(),
            MorphologicalOutput::ModifyFromInput { part, fs } => parts
                .iter()
                .find(|p| &p.name == part)
                .map(|p| {
                    let children = p
                        .pattern
                        .nodes()
                        .iter()
                        .map(|n| {
                            n.map_constraints(&mut |c| Constraint {
                                fs: if c.kind == NodeKind::Segment { c.fs.overlaid(fs) } else { c.fs.clone() },
                                ..c.clone()
                            })
                        })
                        .collect();
                    vec![PatternNode::group(group, children)]
                })
                .unwrap_or_default(),
            MorphologicalOutput::InsertSegments { segments } => segments
                .iter()
                .filter(|(kind, _)| *kind == NodeKind::Segment)
                .map(|(_, fs)| PatternNode::segment(fs.clone()))
                .collect(),
        }
    }
}

// ============================================================================
// Analysis layout
// ============================================================================

#[derive(Debug)]
struct Capture {
    part: String,
    group: String,
    modified: Option<FeatureStruct>,
}

/// The pattern an analysis rule matches against a surface shape, built from
/// the rule's output actions, plus the means to rebuild the input parts
/// from a match.
///
/// The first capture of a part is named after the part, later ones
/// `part~1`, `part~2` and so on.
#[derive(Debug)]
pub(crate) struct AnalysisLayout {
    pattern: Pattern,
    captures: Vec<Capture>,
}

impl AnalysisLayout {
    pub(crate) fn new(parts: &[PatternPart], rhs: &[MorphologicalOutput]) -> Self {
        let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
        let mut captures = Vec::new();
        let mut pattern = Pattern::new();
        for action in rhs {
            let group = match action.part_name() {
                Some(part) => {
                    let n = seen.entry(part).or_insert(0);
                    let group = if *n == 0 { part.to_string() } else { format!("{}~{}", part, n) };
                    *n += 1;
                    captures.push(Capture {
                        part: part.to_string(),
                        group: group.clone(),
                        modified: match action {
                            MorphologicalOutput::ModifyFromInput { fs, .. } => Some(fs.clone()),
                            _ => None,
                        },
                    });
                    group
                }
                None => String::new(),
            };
            for node in action.analysis_nodes(parts, &group) {
                pattern.push(node);
            }
        }
        Self { pattern, captures }
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Capture groups of every part that the output copies more than once.
    pub(crate) fn repeated_groups(&self) -> Vec<Vec<String>> {
        let mut by_part: Vec<(&str, Vec<String>)> = Vec::new();
        for c in &self.captures {
            match by_part.iter_mut().find(|(p, _)| *p == c.part) {
                Some((_, groups)) => groups.push(c.group.clone()),
                None => by_part.push((&c.part, vec![c.group.clone()])),
            }
        }
        by_part
            .into_iter()
            .filter(|(_, groups)| groups.len() > 1)
            .map(|(_, groups)| groups)
            .collect()
    }

    /// Rebuild `parts` from the material `m` captured in `input`.
    ///
    /// An unmodified copy is preferred; a modified copy loses the features
    /// the rule wrote. Parts the output dropped are filled with placeholders.
    pub(crate) fn generate_shape(&self, parts: &[PatternPart], input: &Shape, m: &Match, shape: &mut Shape) -> Result<()> {
        for part in parts {
            let capture = self
                .captures
                .iter()
                .filter(|c| c.part == part.name)
                .min_by_key(|c| c.modified.is_some());
            match capture {
                Some(c) => {
                    for &node in m.group(&c.group).unwrap_or(&[]) {
                        let id = shape.push_copy(input, node)?;
                        if let Some(fs) = &c.modified {
                            let stripped = shape.fs(id).without_features_of(fs);
                            *shape.fs_mut(id)? = stripped;
                        }
                    }
                }
                None => {
                    part.placeholder_nodes(shape)?;
                }
            }
        }
        Ok(())
    }

    /// Capture group names of `part`.
    pub(crate) fn groups_of(&self, part: &str) -> Vec<String> {
        self.captures
            .iter()
            .filter(|c| c.part == part)
            .map(|c| c.group.clone())
            .collect()
    }
}

/// Whether every copy of each repeated part captured the same material.
pub(crate) fn copies_agree(repeats: &[Vec<String>], shape: &Shape, m: &Match) -> bool {
    repeats.iter().all(|groups| {
        let first = m.group(&groups[0]).unwrap_or(&[]);
        groups[1..].iter().all(|g| {
            let other = m.group(g).unwrap_or(&[]);
            other.len() == first.len()
                && first
                    .iter()
                    .zip(other)
                    .all(|(&a, &b)| shape.fs(a).is_unifiable(shape.fs(b)))
        })
    })
}

/// Live nodes spanned by the capture of `part`, boundaries included.
pub(crate) fn captured(shape: &Shape, m: &Match, part: &str) -> Vec<NodeId> {
    match m.group(part) {
        Some(nodes) => {
            let mut span = shape.range(nodes[0], nodes[nodes.len() - 1]);
            span.retain(|&id| !shape.is_deleted(id));
            span
        }
        None => Vec::new(),
    }
}
