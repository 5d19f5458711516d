//! Affixation, reduplication and other process morphology.

use std::collections::BTreeSet;

use log::trace;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::feature::{FeatureId, FeatureStruct, VariableBindings};
use crate::lexicon::{AllomorphEnvironment, MprFeatureSet};
use crate::morphology::output::{copies_agree, AnalysisLayout, MorphologicalOutput, PatternPart};
use crate::morphology::{check_blocking, mark_morphs, mark_subsumed_morphs};
use crate::pattern::{acceptable, Match, Matcher, MatcherSettings, NodeFilter, Pattern};
use crate::rule::{Rule, RuleContext, RuleId, WordSet};
use crate::shape::{AllomorphId, MorphId, NodeId, Shape};
use crate::trace::FailureReason;
use crate::word::Word;

/// Which copy of a reduplicated part stands for the original morph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum ReduplicationHint {
    /// The reduplicant precedes the base.
    Prefix,
    /// The reduplicant follows the base.
    Suffix,
    /// Treat like `Suffix`.
    #[default]
    Implicit,
}

/// One realization of an affix process.
///
/// # Example
///
/// ```rust,ignore
/// // Full reduplication: stem → stem stem
/// let redup = AffixProcessAllomorph::new(
///     "redup_1",
///     vec![PatternPart::new("stem", any_segments)],
///     vec![MorphologicalOutput::copy("stem"), MorphologicalOutput::copy("stem")],
/// )
/// .with_reduplication_hint(ReduplicationHint::Prefix);
/// ```
#[derive(Debug, Clone)]
pub struct AffixProcessAllomorph {
    id: AllomorphId,
    lhs: Vec<PatternPart>,
    rhs: Vec<MorphologicalOutput>,
    hint: ReduplicationHint,
    environments: Vec<AllomorphEnvironment>,
    free_fluctuations: Vec<AllomorphId>,
    required_mpr: MprFeatureSet,
    excluded_mpr: MprFeatureSet,
    out_mpr: MprFeatureSet,
}

impl AffixProcessAllomorph {
    /// Allomorph mapping `lhs` parts to the `rhs` actions.
    pub fn new(id: &str, lhs: Vec<PatternPart>, rhs: Vec<MorphologicalOutput>) -> Self {
        Self {
            id: AllomorphId::new(id),
            lhs,
            rhs,
            hint: ReduplicationHint::default(),
            environments: Vec::new(),
            free_fluctuations: Vec::new(),
            required_mpr: MprFeatureSet::new(),
            excluded_mpr: MprFeatureSet::new(),
            out_mpr: MprFeatureSet::new(),
        }
    }

    /// Set the reduplication hint.
    pub fn with_reduplication_hint(mut self, hint: ReduplicationHint) -> Self {
        self.hint = hint;
        self
    }

    /// Add an environment condition.
    pub fn with_environment(mut self, env: AllomorphEnvironment) -> Self {
        self.environments.push(env);
        self
    }

    /// Declare free fluctuation with `other`.
    pub fn free_fluctuates_with(mut self, other: &str) -> Self {
        self.free_fluctuations.push(AllomorphId::new(other));
        self
    }

    /// MPR features the input must have.
    pub fn required_mpr(mut self, features: MprFeatureSet) -> Self {
        self.required_mpr = features;
        self
    }

    /// MPR features the input must not have.
    pub fn excluded_mpr(mut self, features: MprFeatureSet) -> Self {
        self.excluded_mpr = features;
        self
    }

    /// MPR features added to the output.
    pub fn out_mpr(mut self, features: MprFeatureSet) -> Self {
        self.out_mpr = features;
        self
    }

    /// Allomorph id.
    pub fn id(&self) -> &AllomorphId {
        &self.id
    }

    /// Input parts.
    pub fn lhs(&self) -> &[PatternPart] {
        &self.lhs
    }

    /// Output actions.
    pub fn rhs(&self) -> &[MorphologicalOutput] {
        &self.rhs
    }

    /// Reduplication hint.
    pub fn reduplication_hint(&self) -> ReduplicationHint {
        self.hint
    }

    /// Environment conditions.
    pub fn environments(&self) -> &[AllomorphEnvironment] {
        &self.environments
    }

    /// Allomorphs this one varies freely with.
    pub fn free_fluctuations(&self) -> &[AllomorphId] {
        &self.free_fluctuations
    }

    /// Indices of the output actions whose copied nodes stay attributed to
    /// the input morph they came from.
    ///
    /// A part copied exactly once keeps its morph. For a part copied several
    /// times (reduplication), the copies forming the run that reproduces the
    /// whole input part sequence keep it; the hint decides whether that run
    /// is looked for from the right (prefix) or the left.
    fn non_allomorph_actions(&self) -> FxHashSet<usize> {
        let lhs = &self.lhs;
        let rhs = &self.rhs;
        let mut result = FxHashSet::default();
        let mut by_part: Vec<(&str, Vec<usize>)> = Vec::new();
        for (i, action) in rhs.iter().enumerate() {
            if let Some(part) = action.part_name() {
                match by_part.iter_mut().find(|(name, _)| *name == part) {
                    Some((_, indices)) => indices.push(i),
                    None => by_part.push((part, vec![i])),
                }
            }
        }
        let mut redup_parts = Vec::new();
        for (_, indices) in by_part {
            if indices.len() == 1 {
                if matches!(rhs[indices[0]], MorphologicalOutput::CopyFromInput { .. }) {
                    result.insert(indices[0]);
                }
            } else {
                redup_parts.push(indices);
            }
        }
        if redup_parts.is_empty() || lhs.is_empty() {
            return result;
        }

        let name = |i: usize| Some(lhs[i].name.as_str());
        let last = lhs.len() - 1;
        let mut start: Option<usize> = None;
        match self.hint {
            ReduplicationHint::Prefix => {
                let mut p = last;
                for i in (0..rhs.len()).rev() {
                    let part = rhs[i].part_name();
                    if part == name(p) || part == name(last) {
                        if part == name(0) {
                            start = Some(i);
                            break;
                        }
                        if part != name(p) {
                            p = last;
                        }
                        p -= 1;
                    } else {
                        p = last;
                    }
                }
            }
            ReduplicationHint::Suffix | ReduplicationHint::Implicit => {
                let mut s = 0;
                for (i, action) in rhs.iter().enumerate() {
                    let part = action.part_name();
                    if part == name(s) || part == name(0) {
                        if part == name(last) {
                            start = i.checked_sub(last);
                            break;
                        }
                        if part != name(s) {
                            s = 0;
                        }
                        s += 1;
                    } else {
                        s = 0;
                    }
                }
            }
        }

        for indices in redup_parts {
            let keep_nth = match self.hint {
                ReduplicationHint::Prefix => indices.len() - 1,
                _ => 0,
            };
            for (j, &index) in indices.iter().enumerate() {
                let chosen = match start {
                    None => j == keep_nth,
                    Some(s) => index >= s && index < s + lhs.len(),
                };
                if chosen {
                    result.insert(index);
                }
            }
        }
        result
    }
}

/// A morphological rule realized by one of several allomorphs.
///
/// # Example
///
/// ```rust,ignore
/// let plural = AffixProcessRule::new("pl")
///     .allomorph(suffix_s)
///     .required_syntactic(noun)
///     .out_syntactic(plural_fs);
/// ```
#[derive(Debug, Clone)]
pub struct AffixProcessRule {
    name: String,
    allomorphs: Vec<AffixProcessAllomorph>,
    required_syntactic: FeatureStruct,
    out_syntactic: FeatureStruct,
    max_application_count: usize,
    obligatory_features: Vec<FeatureId>,
    blockable: bool,
}

impl AffixProcessRule {
    /// Blockable rule applying at most once, with no allomorphs yet.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            allomorphs: Vec::new(),
            required_syntactic: FeatureStruct::new(),
            out_syntactic: FeatureStruct::new(),
            max_application_count: 1,
            obligatory_features: Vec::new(),
            blockable: true,
        }
    }

    /// Append an allomorph; earlier allomorphs take precedence.
    pub fn allomorph(mut self, allomorph: AffixProcessAllomorph) -> Self {
        self.allomorphs.push(allomorph);
        self
    }

    /// Syntactic features the input must be unifiable with.
    pub fn required_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.required_syntactic = fs;
        self
    }

    /// Syntactic features written into the output.
    pub fn out_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.out_syntactic = fs;
        self
    }

    /// How often the rule may apply to one word.
    pub fn max_application_count(mut self, count: usize) -> Self {
        self.max_application_count = count;
        self
    }

    /// Syntactic feature a final parse must carry once this rule applied.
    pub fn obligatory_feature(mut self, feature: FeatureId) -> Self {
        self.obligatory_features.push(feature);
        self
    }

    /// Whether a listed family member may block the output.
    pub fn blockable(mut self, blockable: bool) -> Self {
        self.blockable = blockable;
        self
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allomorphs in precedence order.
    pub fn allomorphs(&self) -> &[AffixProcessAllomorph] {
        &self.allomorphs
    }

    /// Required input syntactic features.
    pub fn required_syntactic_fs(&self) -> &FeatureStruct {
        &self.required_syntactic
    }

    /// Output syntactic features.
    pub fn out_syntactic_fs(&self) -> &FeatureStruct {
        &self.out_syntactic
    }

    /// Application cap.
    pub fn max_applications(&self) -> usize {
        self.max_application_count
    }
}

// ============================================================================
// Synthesis
// ============================================================================

#[derive(Debug)]
struct SynthesisAllomorph {
    allomorph: AffixProcessAllomorph,
    matcher: Matcher,
    non_allomorph_actions: FxHashSet<usize>,
}

/// An affix process rule compiled for synthesis.
#[derive(Debug)]
pub struct SynthesisAffixProcessRule {
    id: RuleId,
    rule: AffixProcessRule,
    allomorphs: Vec<SynthesisAllomorph>,
}

impl SynthesisAffixProcessRule {
    /// Compile `rule`.
    pub fn new(rule: &AffixProcessRule) -> Result<Self> {
        let mut allomorphs = Vec::with_capacity(rule.allomorphs.len());
        for allomorph in &rule.allomorphs {
            let pattern = Pattern::from_nodes(allomorph.lhs.iter().map(PatternPart::group).collect());
            let settings = MatcherSettings {
                filter: NodeFilter::SEGMENTS,
                anchored_to_start: true,
                anchored_to_end: true,
                ..MatcherSettings::default()
            };
            allomorphs.push(SynthesisAllomorph {
                matcher: Matcher::new(&pattern, settings)?,
                non_allomorph_actions: allomorph.non_allomorph_actions(),
                allomorph: allomorph.clone(),
            });
        }
        Ok(Self {
            id: RuleId::new(&rule.name),
            rule: rule.clone(),
            allomorphs,
        })
    }

    fn apply_allomorph(&self, sa: &SynthesisAllomorph, input: &Word, m: &Match) -> Result<Word> {
        let mut output = input.deep_clone();
        let mut shape = Shape::new();
        let mut existing: FxHashMap<MorphId, Vec<NodeId>> = FxHashMap::default();
        let mut new_nodes = Vec::new();
        for (k, action) in sa.allomorph.rhs.iter().enumerate() {
            for (source, node) in action.apply(input.shape(), m, &mut shape)? {
                match source {
                    Some(source) if sa.non_allomorph_actions.contains(&k) => {
                        if let Some(morph) = input.shape().node_morph(source) {
                            existing.entry(morph).or_default().push(node);
                        }
                    }
                    _ => new_nodes.push(node),
                }
            }
        }
        output.set_shape(shape)?;

        let new_morph = mark_morphs(&mut output, &new_nodes, &sa.allomorph.id, None)?;
        for input_morph in input.shape().morphs() {
            let morph = input.shape().morph(input_morph);
            if let Some(nodes) = existing.get(&input_morph) {
                if let Some(out) = mark_morphs(&mut output, nodes, morph.allomorph(), Some(morph.label()))? {
                    mark_subsumed_morphs(input, &mut output, input_morph, out)?;
                }
            } else if morph.parent().is_none() {
                // Completely replaced; keep track of it under the new morph.
                if let Some(new_morph) = new_morph {
                    let out = output.mark_subsumed_morph(new_morph, morph.allomorph(), morph.label())?;
                    mark_subsumed_morphs(input, &mut output, input_morph, out)?;
                }
            }
        }
        output.add_mpr_features(&sa.allomorph.out_mpr)?;
        Ok(output)
    }
}

impl Rule for SynthesisAffixProcessRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        input.current_morphological_rule() == Some(&self.id) && ctx.is_selected(&self.rule.name)
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let name = self.rule.name.as_str();
        if input.application_count(&self.id) >= self.rule.max_application_count {
            ctx.trace.morphological_rule_not_applied(name, input, FailureReason::MaxApplicationCount);
            return Ok(Vec::new());
        }
        if !self.rule.required_syntactic.is_unifiable(input.syntactic()) {
            ctx.trace
                .morphological_rule_not_applied(name, input, FailureReason::RequiredSyntacticFeatureStruct);
            return Ok(Vec::new());
        }

        let mut outputs = Vec::new();
        let mut applied = BTreeSet::new();
        for (i, sa) in self.allomorphs.iter().enumerate() {
            let allomorph = &sa.allomorph;
            if !input.mpr_features().contains_all(&allomorph.required_mpr) {
                ctx.trace.morphological_rule_not_applied(name, input, FailureReason::RequiredMprFeatures);
                continue;
            }
            if !input.mpr_features().is_disjoint(&allomorph.excluded_mpr) {
                ctx.trace.morphological_rule_not_applied(name, input, FailureReason::ExcludedMprFeatures);
                continue;
            }
            let Some(m) = sa.matcher.first_match(input.shape(), None) else {
                ctx.trace.morphological_rule_not_applied(name, input, FailureReason::Pattern);
                continue;
            };

            let mut output = self.apply_allomorph(sa, input, &m)?;
            output
                .syntactic_mut()?
                .priority_union(&self.rule.out_syntactic, &VariableBindings::new())?;
            for &feature in &self.rule.obligatory_features {
                output.add_obligatory_feature(feature)?;
            }
            applied.insert(i);
            output.current_morphological_rule_applied(Some(&applied))?;

            if self.rule.blockable {
                if let Some(blocked) = check_blocking(&output, ctx)? {
                    output = blocked;
                }
            }
            output.freeze();
            trace!("applied affix process '{}' with allomorph '{}'", name, allomorph.id);
            ctx.trace
                .morphological_rule_applied(name, Some(&allomorph.id), input, &output);
            outputs.push(output);

            if allomorph.environments.is_empty() {
                break;
            }
        }
        Ok(outputs)
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Debug)]
struct AnalysisAllomorph {
    lhs: Vec<PatternPart>,
    layout: AnalysisLayout,
    matcher: Matcher,
}

/// An affix process rule compiled for analysis.
#[derive(Debug)]
pub struct AnalysisAffixProcessRule {
    id: RuleId,
    rule: AffixProcessRule,
    allomorphs: Vec<AnalysisAllomorph>,
}

impl AnalysisAffixProcessRule {
    /// Compile `rule`.
    pub fn new(rule: &AffixProcessRule) -> Result<Self> {
        let mut allomorphs = Vec::with_capacity(rule.allomorphs.len());
        for allomorph in &rule.allomorphs {
            let layout = AnalysisLayout::new(&allomorph.lhs, &allomorph.rhs);
            let repeats = layout.repeated_groups();
            let settings = MatcherSettings {
                filter: NodeFilter::SEGMENTS,
                anchored_to_start: true,
                anchored_to_end: true,
                all_submatches: true,
                acceptable: Some(acceptable(move |shape: &Shape, m: &Match| copies_agree(&repeats, shape, m))),
                ..MatcherSettings::default()
            };
            allomorphs.push(AnalysisAllomorph {
                lhs: allomorph.lhs.clone(),
                matcher: Matcher::new(layout.pattern(), settings)?,
                layout,
            });
        }
        Ok(Self {
            id: RuleId::new(&rule.name),
            rule: rule.clone(),
            allomorphs,
        })
    }

    fn unapply(&self, aa: &AnalysisAllomorph, input: &Word, m: &Match) -> Result<Option<Word>> {
        let mut shape = Shape::new();
        aa.layout.generate_shape(&aa.lhs, input.shape(), m, &mut shape)?;

        let Some(syntactic) = input
            .syntactic()
            .without_features_of(&self.rule.out_syntactic)
            .unify(&self.rule.required_syntactic)
        else {
            return Ok(None);
        };
        let mut output = input.deep_clone();
        output.set_shape(shape)?;
        output.set_syntactic(syntactic)?;
        output.morphological_rule_unapplied(&self.id)?;
        output.freeze();
        Ok(Some(output))
    }
}

impl Rule for AnalysisAffixProcessRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        ctx.is_selected(&self.rule.name)
            && input.unapplication_count(&self.id) < self.rule.max_application_count
            && self.rule.out_syntactic.is_unifiable(input.syntactic())
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut outputs = WordSet::new();
        for aa in &self.allomorphs {
            for m in aa.matcher.all_matches(input.shape()) {
                if let Some(output) = self.unapply(aa, input, &m)? {
                    if !outputs.contains(&output) {
                        ctx.trace.morphological_rule_unapplied(&self.rule.name, input, &output);
                        outputs.insert(output);
                    }
                }
            }
        }
        trace!("unapplied affix process '{}': {} analyses", self.rule.name, outputs.len());
        Ok(outputs.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redup(hint: ReduplicationHint) -> AffixProcessAllomorph {
        AffixProcessAllomorph::new(
            "r",
            vec![PatternPart::new("stem", Pattern::new())],
            vec![MorphologicalOutput::copy("stem"), MorphologicalOutput::copy("stem")],
        )
        .with_reduplication_hint(hint)
    }

    #[test]
    fn test_prefix_reduplication_keeps_last_copy() {
        let actions = redup(ReduplicationHint::Prefix).non_allomorph_actions();
        assert_eq!(actions.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_suffix_reduplication_keeps_first_copy() {
        let actions = redup(ReduplicationHint::Suffix).non_allomorph_actions();
        assert_eq!(actions.into_iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_single_copy_keeps_morph_and_insert_does_not() {
        let allomorph = AffixProcessAllomorph::new(
            "s",
            vec![PatternPart::new("stem", Pattern::new())],
            vec![
                MorphologicalOutput::copy("stem"),
                MorphologicalOutput::InsertSegments { segments: Vec::new() },
            ],
        );
        let actions = allomorph.non_allomorph_actions();
        assert!(actions.contains(&0));
        assert!(!actions.contains(&1));
    }

    #[test]
    fn test_partial_reduplication_run() {
        // C V stem → C V C V stem, prefix: the final C V stem run is the base.
        let allomorph = AffixProcessAllomorph::new(
            "p",
            vec![
                PatternPart::new("c", Pattern::new()),
                PatternPart::new("v", Pattern::new()),
                PatternPart::new("rest", Pattern::new()),
            ],
            vec![
                MorphologicalOutput::copy("c"),
                MorphologicalOutput::copy("v"),
                MorphologicalOutput::copy("c"),
                MorphologicalOutput::copy("v"),
                MorphologicalOutput::copy("rest"),
            ],
        )
        .with_reduplication_hint(ReduplicationHint::Prefix);
        let mut actions: Vec<usize> = allomorph.non_allomorph_actions().into_iter().collect();
        actions.sort_unstable();
        assert_eq!(actions, vec![2, 3, 4]);
    }
}
