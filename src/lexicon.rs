//! Lexical entries, root allomorphs and the features that gate affixation.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::Result;
use crate::feature::FeatureStruct;
use crate::pattern::{Matcher, MatcherSettings, NodeFilter, Pattern};
use crate::shape::{AllomorphId, Direction, Morph, NodeId, Shape};

/// A set of morphosyntactic-property (MPR) features.
///
/// MPR features are plain names: a lexical entry carries some, affixation
/// rules may require or exclude some, and affixes may add their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct MprFeatureSet(BTreeSet<String>);

impl MprFeatureSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature; returns whether it was new.
    pub fn insert(&mut self, feature: &str) -> bool {
        self.0.insert(feature.to_string())
    }

    /// Whether `feature` is present.
    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    /// Whether every feature of `other` is present.
    pub fn contains_all(&self, other: &MprFeatureSet) -> bool {
        other.0.is_subset(&self.0)
    }

    /// Whether no feature of `other` is present.
    pub fn is_disjoint(&self, other: &MprFeatureSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// Add every feature of `other`.
    pub fn union_with(&mut self, other: &MprFeatureSet) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Features in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for MprFeatureSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Whether an allomorph environment must or must not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    /// The allomorph is valid only where the environment matches.
    Required,
    /// The allomorph is invalid where the environment matches.
    Excluded,
}

/// Phonological context an allomorph requires or forbids around itself.
///
/// `left` is matched right-to-left starting just before the morph, `right`
/// left-to-right starting just after it. An empty side always matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllomorphEnvironment {
    /// Required or excluded
    pub kind: EnvironmentKind,
    /// Context to the left of the morph
    pub left: Pattern,
    /// Context to the right of the morph
    pub right: Pattern,
}

impl AllomorphEnvironment {
    /// Environment that must hold.
    pub fn required(left: Pattern, right: Pattern) -> Self {
        Self {
            kind: EnvironmentKind::Required,
            left,
            right,
        }
    }

    /// Environment that must not hold.
    pub fn excluded(left: Pattern, right: Pattern) -> Self {
        Self {
            kind: EnvironmentKind::Excluded,
            left,
            right,
        }
    }
}

/// A name shared by lexical entries that block one another.
///
/// When affixation derives a word whose root, category and features are
/// already covered by a listed entry of the same family (e.g. an irregular
/// form), the listed entry replaces the derived one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub struct LexFamily(String);

impl LexFamily {
    /// Family with the given name.
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Family name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LexFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One phonological form of a lexical entry.
#[derive(Debug, Clone)]
pub struct RootAllomorph {
    id: AllomorphId,
    shape: Shape,
    environments: Vec<AllomorphEnvironment>,
    free_fluctuations: Vec<AllomorphId>,
}

impl RootAllomorph {
    /// Allomorph with the given underlying shape; the shape is frozen.
    pub fn new(id: &str, mut shape: Shape) -> Self {
        shape.freeze();
        Self {
            id: AllomorphId::new(id),
            shape,
            environments: Vec::new(),
            free_fluctuations: Vec::new(),
        }
    }

    /// Add an environment condition.
    pub fn with_environment(mut self, env: AllomorphEnvironment) -> Self {
        self.environments.push(env);
        self
    }

    /// Declare that this allomorph varies freely with `other`.
    pub fn free_fluctuates_with(mut self, other: &str) -> Self {
        self.free_fluctuations.push(AllomorphId::new(other));
        self
    }

    /// Allomorph id.
    pub fn id(&self) -> &AllomorphId {
        &self.id
    }

    /// Underlying shape (frozen).
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Environment conditions.
    pub fn environments(&self) -> &[AllomorphEnvironment] {
        &self.environments
    }

    /// Allomorphs this one varies freely with.
    pub fn free_fluctuations(&self) -> &[AllomorphId] {
        &self.free_fluctuations
    }
}

/// A listed lexeme: syntactic features plus one or more root allomorphs.
///
/// # Example
///
/// ```rust,ignore
/// let entry = LexEntry::new("tak", noun_fs)
///     .with_allomorph(RootAllomorph::new("tak_1", table.segment("tak")?));
/// ```
#[derive(Debug, Clone)]
pub struct LexEntry {
    id: String,
    gloss: Option<String>,
    syntactic: FeatureStruct,
    mpr_features: MprFeatureSet,
    family: Option<LexFamily>,
    allomorphs: Vec<RootAllomorph>,
}

impl LexEntry {
    /// Entry with syntactic features and no allomorphs yet.
    pub fn new(id: &str, mut syntactic: FeatureStruct) -> Self {
        syntactic.freeze();
        Self {
            id: id.to_string(),
            gloss: None,
            syntactic,
            mpr_features: MprFeatureSet::new(),
            family: None,
            allomorphs: Vec::new(),
        }
    }

    /// Append an allomorph; earlier allomorphs take precedence.
    pub fn with_allomorph(mut self, allomorph: RootAllomorph) -> Self {
        self.allomorphs.push(allomorph);
        self
    }

    /// Set the gloss.
    pub fn with_gloss(mut self, gloss: &str) -> Self {
        self.gloss = Some(gloss.to_string());
        self
    }

    /// Set the MPR features.
    pub fn with_mpr_features(mut self, features: MprFeatureSet) -> Self {
        self.mpr_features = features;
        self
    }

    /// Put the entry in a blocking family.
    pub fn with_family(mut self, family: LexFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Entry id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gloss, if any.
    pub fn gloss(&self) -> Option<&str> {
        self.gloss.as_deref()
    }

    /// Syntactic feature structure (frozen).
    pub fn syntactic(&self) -> &FeatureStruct {
        &self.syntactic
    }

    /// MPR features.
    pub fn mpr_features(&self) -> &MprFeatureSet {
        &self.mpr_features
    }

    /// Blocking family.
    pub fn family(&self) -> Option<&LexFamily> {
        self.family.as_ref()
    }

    /// Allomorphs in precedence order.
    pub fn allomorphs(&self) -> &[RootAllomorph] {
        &self.allomorphs
    }

    /// Allomorph by id.
    pub fn allomorph(&self, id: &AllomorphId) -> Option<&RootAllomorph> {
        self.allomorphs.iter().find(|a| a.id() == id)
    }
}

// ============================================================================
// Environment matching
// ============================================================================

const ENVIRONMENT_FILTER: NodeFilter = NodeFilter {
    segments: true,
    boundaries: false,
    anchors: true,
};

/// An [`AllomorphEnvironment`] compiled against the shape of a finished word.
#[derive(Debug)]
pub(crate) struct EnvironmentMatcher {
    kind: EnvironmentKind,
    left: Option<Matcher>,
    right: Option<Matcher>,
}

impl EnvironmentMatcher {
    pub(crate) fn new(env: &AllomorphEnvironment) -> Result<Self> {
        let side = |pattern: &Pattern, direction: Direction| -> Result<Option<Matcher>> {
            if pattern.is_empty() {
                return Ok(None);
            }
            let settings = MatcherSettings {
                direction,
                filter: ENVIRONMENT_FILTER,
                ..MatcherSettings::default()
            };
            Matcher::new(pattern, settings).map(Some)
        };
        Ok(Self {
            kind: env.kind,
            left: side(&env.left, Direction::RightToLeft)?,
            right: side(&env.right, Direction::LeftToRight)?,
        })
    }

    pub(crate) fn kind(&self) -> EnvironmentKind {
        self.kind
    }

    /// Whether the context around `morph` in `shape` matches.
    pub(crate) fn is_match(&self, shape: &Shape, morph: &Morph) -> bool {
        let (Some(start), Some(end)) = (morph.start(), morph.end()) else {
            return false;
        };
        let side_matches = |matcher: &Option<Matcher>, from: NodeId, dir: Direction| match matcher {
            None => true,
            Some(matcher) => visible_neighbor(shape, from, dir).map_or(false, |node| matcher.match_at(shape, node).is_some()),
        };
        side_matches(&self.left, start, Direction::RightToLeft) && side_matches(&self.right, end, Direction::LeftToRight)
    }
}

fn visible_neighbor(shape: &Shape, from: NodeId, dir: Direction) -> Option<NodeId> {
    let mut cur = shape.step(from, dir);
    while let Some(node) = cur {
        if !shape.is_deleted(node) && ENVIRONMENT_FILTER.accepts(shape.kind(node)) {
            return Some(node);
        }
        cur = shape.step(node, dir);
    }
    None
}
