//! Candidate words.
//!
//! A [`Word`] is the unit every rule consumes and produces: a shape plus the
//! bookkeeping the analysis and synthesis passes carry along (root, stratum,
//! the stack of morphological rules still to be applied, compound non-heads,
//! disjunctive allomorph indices).
//!
//! Words are values. Rules never mutate their input; they
//! [`deep_clone`](Word::deep_clone) it, change the copy and
//! [`freeze`](Word::freeze) the result. A frozen word rejects every mutator
//! with [`MorphError::Frozen`].

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::error::{MorphError, Result};
use crate::feature::{FeatureId, FeatureStruct};
use crate::lexicon::{LexEntry, MprFeatureSet, RootAllomorph};
use crate::rule::RuleId;
use crate::shape::{AllomorphId, MorphId, NodeId, Shape};

/// Label of the morph a root allomorph contributes.
pub const ROOT_MORPH_LABEL: &str = "ROOT";

/// A candidate word.
#[derive(Debug, Clone)]
pub struct Word {
    shape: Shape,
    stratum: usize,
    root: Option<AllomorphId>,
    entry: Option<String>,
    allomorphs: BTreeSet<AllomorphId>,
    syntactic: FeatureStruct,
    realizational: FeatureStruct,
    mpr_features: MprFeatureSet,
    obligatory: BTreeSet<FeatureId>,
    mrules: Vec<RuleId>,
    unapplied: FxHashMap<RuleId, usize>,
    applied: FxHashMap<RuleId, usize>,
    non_heads: Vec<Word>,
    disjunctive: BTreeMap<String, BTreeSet<usize>>,
    app_count: usize,
    frozen: bool,
    hash: u64,
}

impl Word {
    /// Analysis input: a surface shape at the given stratum.
    pub fn new(stratum: usize, shape: Shape) -> Self {
        Self {
            shape,
            stratum,
            root: None,
            entry: None,
            allomorphs: BTreeSet::new(),
            syntactic: FeatureStruct::new(),
            realizational: FeatureStruct::new(),
            mpr_features: MprFeatureSet::new(),
            obligatory: BTreeSet::new(),
            mrules: Vec::new(),
            unapplied: FxHashMap::default(),
            applied: FxHashMap::default(),
            non_heads: Vec::new(),
            disjunctive: BTreeMap::new(),
            app_count: 0,
            frozen: false,
            hash: 0,
        }
    }

    /// Bare root word for `allomorph` of `entry`, as used for compound non-heads.
    pub fn from_root(entry: &LexEntry, allomorph: &RootAllomorph, stratum: usize) -> Result<Self> {
        let mut word = Word::new(stratum, Shape::new());
        word.set_root(entry, allomorph)?;
        Ok(word)
    }

    fn check_frozen(&self) -> Result<()> {
        if self.frozen {
            Err(MorphError::Frozen("word"))
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Phonological shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Mutable shape.
    pub fn shape_mut(&mut self) -> Result<&mut Shape> {
        self.check_frozen()?;
        Ok(&mut self.shape)
    }

    /// Replace the shape.
    pub fn set_shape(&mut self, shape: Shape) -> Result<()> {
        self.check_frozen()?;
        self.shape = shape;
        Ok(())
    }

    /// Depth of the stratum the word currently belongs to.
    pub fn stratum(&self) -> usize {
        self.stratum
    }

    /// Move the word to another stratum.
    pub fn set_stratum(&mut self, stratum: usize) -> Result<()> {
        self.check_frozen()?;
        self.stratum = stratum;
        Ok(())
    }

    /// Root allomorph, once lexical lookup has run.
    pub fn root(&self) -> Option<&AllomorphId> {
        self.root.as_ref()
    }

    /// Lexical entry of the root.
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// Every allomorph that contributed a morph.
    pub fn allomorphs(&self) -> &BTreeSet<AllomorphId> {
        &self.allomorphs
    }

    /// First morph of each allomorph, walking every morph in traversal
    /// order. Subsumed morphs come before the morph that holds them, and
    /// a root split by an infix counts once.
    pub fn distinct_morphs(&self) -> Vec<MorphId> {
        let mut seen = FxHashSet::default();
        self.shape
            .morphs()
            .into_iter()
            .filter(|&m| seen.insert(self.shape.morph(m).allomorph().clone()))
            .collect()
    }

    /// Allomorphs of [`Word::distinct_morphs`], in the same order.
    pub fn allomorphs_in_morph_order(&self) -> Vec<AllomorphId> {
        self.distinct_morphs()
            .into_iter()
            .map(|m| self.shape.morph(m).allomorph().clone())
            .collect()
    }

    /// Syntactic feature structure.
    pub fn syntactic(&self) -> &FeatureStruct {
        &self.syntactic
    }

    /// Mutable syntactic feature structure.
    pub fn syntactic_mut(&mut self) -> Result<&mut FeatureStruct> {
        self.check_frozen()?;
        Ok(&mut self.syntactic)
    }

    /// Replace the syntactic feature structure.
    pub fn set_syntactic(&mut self, fs: FeatureStruct) -> Result<()> {
        self.check_frozen()?;
        self.syntactic = fs;
        Ok(())
    }

    /// Realizational feature structure.
    pub fn realizational(&self) -> &FeatureStruct {
        &self.realizational
    }

    /// Replace the realizational feature structure.
    pub fn set_realizational(&mut self, fs: FeatureStruct) -> Result<()> {
        self.check_frozen()?;
        self.realizational = fs;
        Ok(())
    }

    /// MPR features accumulated from the root and affixes.
    pub fn mpr_features(&self) -> &MprFeatureSet {
        &self.mpr_features
    }

    /// Add MPR features.
    pub fn add_mpr_features(&mut self, features: &MprFeatureSet) -> Result<()> {
        self.check_frozen()?;
        self.mpr_features.union_with(features);
        Ok(())
    }

    /// Syntactic features that must carry a value in a final parse.
    pub fn obligatory_features(&self) -> &BTreeSet<FeatureId> {
        &self.obligatory
    }

    /// Require a syntactic feature to be present in a final parse.
    pub fn add_obligatory_feature(&mut self, feature: FeatureId) -> Result<()> {
        self.check_frozen()?;
        self.obligatory.insert(feature);
        Ok(())
    }

    // ========================================================================
    // Roots and morphs
    // ========================================================================

    /// Install `allomorph` of `entry` as the root.
    ///
    /// The shape is replaced by a copy of the allomorph's shape marked as a
    /// single root morph, and the syntactic and MPR features are taken from
    /// the entry.
    pub fn set_root(&mut self, entry: &LexEntry, allomorph: &RootAllomorph) -> Result<()> {
        self.check_frozen()?;
        let mut shape = allomorph.shape().deep_clone();
        let nodes = shape.nodes();
        shape.mark_morph(&nodes, allomorph.id(), ROOT_MORPH_LABEL)?;
        self.shape = shape;
        self.root = Some(allomorph.id().clone());
        self.entry = Some(entry.id().to_string());
        self.allomorphs.insert(allomorph.id().clone());
        self.syntactic = entry.syntactic().deep_clone();
        self.mpr_features = entry.mpr_features().clone();
        Ok(())
    }

    /// Label the next affix morph will carry.
    pub fn next_morph_label(&self) -> String {
        self.app_count.to_string()
    }

    /// Mark `nodes` as a morph of `allomorph`, labelled with the current application count.
    pub fn mark_morph(&mut self, nodes: &[NodeId], allomorph: &AllomorphId) -> Result<Option<MorphId>> {
        let label = self.next_morph_label();
        self.mark_labelled_morph(nodes, allomorph, &label)
    }

    /// Mark `nodes` as a morph of `allomorph` with an explicit label.
    pub fn mark_labelled_morph(
        &mut self,
        nodes: &[NodeId],
        allomorph: &AllomorphId,
        label: &str,
    ) -> Result<Option<MorphId>> {
        self.check_frozen()?;
        let id = self.shape.mark_morph(nodes, allomorph, label)?;
        if id.is_some() {
            self.allomorphs.insert(allomorph.clone());
        }
        Ok(id)
    }

    /// Record `allomorph` as subsumed by morph `parent`.
    pub fn mark_subsumed_morph(&mut self, parent: MorphId, allomorph: &AllomorphId, label: &str) -> Result<MorphId> {
        self.check_frozen()?;
        self.allomorphs.insert(allomorph.clone());
        self.shape.mark_subsumed_morph(parent, allomorph, label)
    }

    /// Allomorph indices recorded for the affix morph with `label`.
    pub fn disjunctive_indices(&self, label: &str) -> Option<&BTreeSet<usize>> {
        self.disjunctive.get(label)
    }

    // ========================================================================
    // Morphological rule bookkeeping
    // ========================================================================

    /// Morphological rules still to be applied; the last one is the next.
    pub fn morphological_rules(&self) -> &[RuleId] {
        &self.mrules
    }

    /// Next morphological rule synthesis must apply.
    pub fn current_morphological_rule(&self) -> Option<&RuleId> {
        self.mrules.last()
    }

    /// Record that analysis unapplied `rule`.
    pub fn morphological_rule_unapplied(&mut self, rule: &RuleId) -> Result<()> {
        self.check_frozen()?;
        *self.unapplied.entry(rule.clone()).or_insert(0) += 1;
        self.mrules.push(rule.clone());
        Ok(())
    }

    /// How often analysis has unapplied `rule`.
    pub fn unapplication_count(&self, rule: &RuleId) -> usize {
        self.unapplied.get(rule).copied().unwrap_or(0)
    }

    /// Pop the current rule after synthesis applied it.
    ///
    /// `indices` are the allomorph indices of the affix just realized and
    /// are stored under the label its morph received.
    pub fn current_morphological_rule_applied(&mut self, indices: Option<&BTreeSet<usize>>) -> Result<()> {
        self.check_frozen()?;
        if let Some(rule) = self.mrules.pop() {
            *self.applied.entry(rule).or_insert(0) += 1;
        }
        if let Some(indices) = indices {
            self.disjunctive.insert(self.next_morph_label(), indices.clone());
        }
        self.app_count += 1;
        Ok(())
    }

    /// How often synthesis has applied `rule`.
    pub fn application_count(&self, rule: &RuleId) -> usize {
        self.applied.get(rule).copied().unwrap_or(0)
    }

    // ========================================================================
    // Compound non-heads
    // ========================================================================

    /// Push a non-head produced by compounding analysis.
    pub fn non_head_unapplied(&mut self, non_head: Word) -> Result<()> {
        self.check_frozen()?;
        self.non_heads.push(non_head);
        Ok(())
    }

    /// Non-head the next compounding rule combines with.
    pub fn current_non_head(&self) -> Option<&Word> {
        self.non_heads.last()
    }

    /// Pop the current non-head after compounding synthesis consumed it.
    pub fn current_non_head_applied(&mut self) -> Result<Option<Word>> {
        self.check_frozen()?;
        Ok(self.non_heads.pop())
    }

    /// Pending non-heads.
    pub fn non_heads(&self) -> &[Word] {
        &self.non_heads
    }

    /// Number of pending non-heads.
    pub fn non_head_count(&self) -> usize {
        self.non_heads.len()
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Make the word and everything it owns immutable; returns the content hash.
    pub fn freeze(&mut self) -> u64 {
        if self.frozen {
            return self.hash;
        }
        self.shape.freeze();
        self.syntactic.freeze();
        self.realizational.freeze();
        for non_head in &mut self.non_heads {
            non_head.freeze();
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
        self.shape.content_hash().hash(&mut hasher);
        self.realizational.content_hash().hash(&mut hasher);
        self.syntactic.content_hash().hash(&mut hasher);
        for non_head in &self.non_heads {
            non_head.content_hash().hash(&mut hasher);
        }
        self.stratum.hash(&mut hasher);
        self.root.hash(&mut hasher);
        self.mrules.hash(&mut hasher);
        hasher.finish()
    }

    /// Value equality over shape, realizational and syntactic features,
    /// non-heads, stratum, root and the pending rule stack.
    pub fn value_eq(&self, other: &Word) -> bool {
        if self.frozen && other.frozen && self.hash != other.hash {
            return false;
        }
        self.stratum == other.stratum
            && self.root == other.root
            && self.mrules == other.mrules
            && self.realizational == other.realizational
            && self.syntactic == other.syntactic
            && self.non_heads.len() == other.non_heads.len()
            && self.non_heads.iter().zip(&other.non_heads).all(|(a, b)| a.value_eq(b))
            && self.shape.value_eq(&other.shape)
    }

    /// Mutable deep copy; non-heads are copied too.
    pub fn deep_clone(&self) -> Word {
        let mut copy = self.clone();
        copy.shape = self.shape.deep_clone();
        copy.syntactic = self.syntactic.deep_clone();
        copy.realizational = self.realizational.deep_clone();
        copy.non_heads = self.non_heads.iter().map(Word::deep_clone).collect();
        copy.frozen = false;
        copy.hash = 0;
        copy
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.value_eq(other)
    }
}

impl Eq for Word {}

impl Hash for Word {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content_hash().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::NodeKind;

    fn root_word() -> Word {
        let mut shape = Shape::new();
        shape.push(NodeKind::Segment, FeatureStruct::new()).unwrap();
        let entry = LexEntry::new("e1", FeatureStruct::new()).with_allomorph(RootAllomorph::new("a1", shape));
        Word::from_root(&entry, &entry.allomorphs()[0], 0).unwrap()
    }

    #[test]
    fn test_frozen_word_rejects_mutation() {
        let mut word = root_word();
        word.freeze();
        assert_eq!(word.set_stratum(1), Err(MorphError::Frozen("word")));
        assert!(word.morphological_rule_unapplied(&RuleId::new("r")).is_err());
        assert!(word.shape_mut().is_err());
        let mut copy = word.deep_clone();
        assert!(copy.set_stratum(1).is_ok());
        assert_eq!(word.stratum(), 0);
    }

    #[test]
    fn test_root_morph_covers_shape() {
        let word = root_word();
        let morphs = word.shape().top_morphs();
        assert_eq!(morphs.len(), 1);
        assert_eq!(word.shape().morph(morphs[0]).label(), ROOT_MORPH_LABEL);
        assert_eq!(word.root(), Some(&AllomorphId::new("a1")));
        assert_eq!(word.entry(), Some("e1"));
    }

    #[test]
    fn test_rule_stack_round_trip() {
        let mut word = root_word();
        let r1 = RuleId::new("r1");
        let r2 = RuleId::new("r2");
        word.morphological_rule_unapplied(&r1).unwrap();
        word.morphological_rule_unapplied(&r2).unwrap();
        assert_eq!(word.current_morphological_rule(), Some(&r2));
        assert_eq!(word.unapplication_count(&r1), 1);

        let indices: BTreeSet<usize> = [0, 1].into_iter().collect();
        word.current_morphological_rule_applied(Some(&indices)).unwrap();
        assert_eq!(word.current_morphological_rule(), Some(&r1));
        assert_eq!(word.application_count(&r2), 1);
        assert_eq!(word.disjunctive_indices("0"), Some(&indices));
        assert_eq!(word.next_morph_label(), "1");
    }

    #[test]
    fn test_distinct_morphs_walks_subsumed_and_split_morphs() {
        let mut word = root_word();
        let root = word.shape().top_morphs()[0];
        let first = word.shape().first().unwrap();
        let infix = word.shape_mut().unwrap().add_after(first, NodeKind::Segment, FeatureStruct::new()).unwrap();
        let tail = word.shape_mut().unwrap().push(NodeKind::Segment, FeatureStruct::new()).unwrap();
        word.mark_morph(&[infix], &AllomorphId::new("inf")).unwrap();
        word.mark_labelled_morph(&[tail], &AllomorphId::new("a1"), ROOT_MORPH_LABEL).unwrap();
        word.mark_subsumed_morph(root, &AllomorphId::new("sub"), "7").unwrap();

        assert_eq!(word.shape().top_morphs().len(), 3);
        let order: Vec<String> = word
            .allomorphs_in_morph_order()
            .iter()
            .map(|a| a.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["sub", "a1", "inf"]);
    }

    #[test]
    fn test_equality_tracks_rule_stack() {
        let a = root_word();
        let mut b = root_word();
        assert_eq!(a, b);
        b.morphological_rule_unapplied(&RuleId::new("r")).unwrap();
        assert_ne!(a, b);
    }
}
