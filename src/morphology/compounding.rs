//! Compounding: combining a head word with a non-head root.

use log::trace;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::feature::{FeatureId, FeatureStruct, VariableBindings};
use crate::morphology::output::{copies_agree, AnalysisLayout, MorphologicalOutput, PatternPart};
use crate::morphology::{mark_morphs, mark_subsumed_morphs};
use crate::pattern::{acceptable, Match, Matcher, MatcherSettings, NodeFilter, Pattern};
use crate::rule::{Rule, RuleContext, RuleId};
use crate::shape::{AllomorphId, MorphId, NodeId, Shape};
use crate::trace::FailureReason;
use crate::word::Word;

/// One way of combining head and non-head.
///
/// Output actions may copy parts of either side; inserted material forms a
/// morph of the subrule itself.
#[derive(Debug, Clone)]
pub struct CompoundingSubrule {
    id: AllomorphId,
    head_lhs: Vec<PatternPart>,
    non_head_lhs: Vec<PatternPart>,
    rhs: Vec<MorphologicalOutput>,
}

impl CompoundingSubrule {
    /// Subrule `id` with the given head parts, non-head parts and output.
    pub fn new(
        id: &str,
        head_lhs: Vec<PatternPart>,
        non_head_lhs: Vec<PatternPart>,
        rhs: Vec<MorphologicalOutput>,
    ) -> Self {
        Self {
            id: AllomorphId::new(id),
            head_lhs,
            non_head_lhs,
            rhs,
        }
    }

    /// Allomorph id of inserted material.
    pub fn id(&self) -> &AllomorphId {
        &self.id
    }

    fn is_head_part(&self, part: &str) -> bool {
        self.head_lhs.iter().any(|p| p.name == part)
    }
}

/// A compounding rule.
///
/// # Example
///
/// ```rust,ignore
/// let nn = CompoundingRule::new("nn")
///     .subrule(CompoundingSubrule::new(
///         "nn_1",
///         vec![PatternPart::new("head", any)],
///         vec![PatternPart::new("nonhead", any)],
///         vec![MorphologicalOutput::copy("nonhead"), MorphologicalOutput::copy("head")],
///     ))
///     .head_required_syntactic(noun.clone())
///     .non_head_required_syntactic(noun);
/// ```
#[derive(Debug, Clone)]
pub struct CompoundingRule {
    name: String,
    subrules: Vec<CompoundingSubrule>,
    head_required_syntactic: FeatureStruct,
    non_head_required_syntactic: FeatureStruct,
    out_syntactic: FeatureStruct,
    max_application_count: usize,
    obligatory_features: Vec<FeatureId>,
}

impl CompoundingRule {
    /// Rule applying at most once, with no subrules yet.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subrules: Vec::new(),
            head_required_syntactic: FeatureStruct::new(),
            non_head_required_syntactic: FeatureStruct::new(),
            out_syntactic: FeatureStruct::new(),
            max_application_count: 1,
            obligatory_features: Vec::new(),
        }
    }

    /// Append a subrule; earlier subrules take precedence.
    pub fn subrule(mut self, subrule: CompoundingSubrule) -> Self {
        self.subrules.push(subrule);
        self
    }

    /// Syntactic features the head must be unifiable with.
    pub fn head_required_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.head_required_syntactic = fs;
        self
    }

    /// Syntactic features the non-head must be unifiable with.
    pub fn non_head_required_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.non_head_required_syntactic = fs;
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

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subrules.
    pub fn subrules(&self) -> &[CompoundingSubrule] {
        &self.subrules
    }
}

fn segment_matcher(parts: &[PatternPart]) -> Result<Matcher> {
    let pattern = Pattern::from_nodes(parts.iter().map(PatternPart::group).collect());
    Matcher::new(
        &pattern,
        MatcherSettings {
            filter: NodeFilter::SEGMENTS,
            anchored_to_start: true,
            anchored_to_end: true,
            ..MatcherSettings::default()
        },
    )
}

// ============================================================================
// Synthesis
// ============================================================================

#[derive(Debug)]
struct SynthesisSubrule {
    subrule: CompoundingSubrule,
    head_matcher: Matcher,
    non_head_matcher: Matcher,
}

/// A compounding rule compiled for synthesis.
#[derive(Debug)]
pub struct SynthesisCompoundingRule {
    id: RuleId,
    rule: CompoundingRule,
    subrules: Vec<SynthesisSubrule>,
}

impl SynthesisCompoundingRule {
    /// Compile `rule`.
    pub fn new(rule: &CompoundingRule) -> Result<Self> {
        let mut subrules = Vec::with_capacity(rule.subrules.len());
        for sr in &rule.subrules {
            subrules.push(SynthesisSubrule {
                head_matcher: segment_matcher(&sr.head_lhs)?,
                non_head_matcher: segment_matcher(&sr.non_head_lhs)?,
                subrule: sr.clone(),
            });
        }
        Ok(Self {
            id: RuleId::new(&rule.name),
            rule: rule.clone(),
            subrules,
        })
    }

    fn combine(&self, sr: &SynthesisSubrule, input: &Word, head_match: &Match, non_head_match: &Match) -> Result<Word> {
        let mut output = input.deep_clone();
        let Some(non_head) = output.current_non_head_applied()? else {
            return Ok(output);
        };

        let mut shape = Shape::new();
        let mut head_nodes: FxHashMap<MorphId, Vec<NodeId>> = FxHashMap::default();
        let mut non_head_nodes: FxHashMap<MorphId, Vec<NodeId>> = FxHashMap::default();
        let mut new_nodes = Vec::new();
        for action in &sr.subrule.rhs {
            let from_head = action.part_name().map_or(true, |p| sr.subrule.is_head_part(p));
            let (source_shape, m, existing) = if from_head {
                (input.shape(), head_match, &mut head_nodes)
            } else {
                (non_head.shape(), non_head_match, &mut non_head_nodes)
            };
            for (source, node) in action.apply(source_shape, m, &mut shape)? {
                match source.and_then(|s| source_shape.node_morph(s)) {
                    Some(morph) => existing.entry(morph).or_default().push(node),
                    None => new_nodes.push(node),
                }
            }
        }
        output.set_shape(shape)?;

        let new_morph = mark_morphs(&mut output, &new_nodes, &sr.subrule.id, None)?;
        for (source, existing) in [(input, &head_nodes), (&non_head, &non_head_nodes)] {
            for source_morph in source.shape().morphs() {
                let morph = source.shape().morph(source_morph);
                if let Some(nodes) = existing.get(&source_morph) {
                    if let Some(out) = mark_morphs(&mut output, nodes, morph.allomorph(), Some(morph.label()))? {
                        mark_subsumed_morphs(source, &mut output, source_morph, out)?;
                    }
                } else if morph.parent().is_none() {
                    if let Some(new_morph) = new_morph {
                        let out = output.mark_subsumed_morph(new_morph, morph.allomorph(), morph.label())?;
                        mark_subsumed_morphs(source, &mut output, source_morph, out)?;
                    }
                }
            }
        }
        output.add_mpr_features(non_head.mpr_features())?;
        Ok(output)
    }
}

impl Rule for SynthesisCompoundingRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        input.current_morphological_rule() == Some(&self.id) && ctx.is_selected(&self.rule.name)
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let name = self.rule.name.as_str();
        if input.application_count(&self.id) >= self.rule.max_application_count {
            ctx.trace.morphological_rule_not_applied(name, input, FailureReason::MaxApplicationCount);
            return Ok(Vec::new());
        }
        let Some(non_head) = input.current_non_head() else {
            ctx.trace.morphological_rule_not_applied(name, input, FailureReason::NonHead);
            return Ok(Vec::new());
        };
        if !self.rule.head_required_syntactic.is_unifiable(input.syntactic())
            || !self.rule.non_head_required_syntactic.is_unifiable(non_head.syntactic())
        {
            ctx.trace
                .morphological_rule_not_applied(name, input, FailureReason::RequiredSyntacticFeatureStruct);
            return Ok(Vec::new());
        }

        for sr in &self.subrules {
            let Some(head_match) = sr.head_matcher.first_match(input.shape(), None) else {
                continue;
            };
            let Some(non_head_match) = sr.non_head_matcher.first_match(non_head.shape(), None) else {
                continue;
            };
            let mut output = self.combine(sr, input, &head_match, &non_head_match)?;
            output
                .syntactic_mut()?
                .priority_union(&self.rule.out_syntactic, &VariableBindings::new())?;
            for &feature in &self.rule.obligatory_features {
                output.add_obligatory_feature(feature)?;
            }
            output.current_morphological_rule_applied(None)?;
            output.freeze();
            trace!("applied compounding rule '{}'", name);
            ctx.trace
                .morphological_rule_applied(name, Some(&sr.subrule.id), input, &output);
            return Ok(vec![output]);
        }
        ctx.trace.morphological_rule_not_applied(name, input, FailureReason::Pattern);
        Ok(Vec::new())
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Debug)]
struct AnalysisSubrule {
    head_lhs: Vec<PatternPart>,
    non_head_lhs: Vec<PatternPart>,
    layout: AnalysisLayout,
    matcher: Matcher,
}

/// A compounding rule compiled for analysis.
///
/// Every split of the surface shape into head and non-head material is
/// tried; a split survives only when the non-head is a listed root of the
/// word's stratum.
#[derive(Debug)]
pub struct AnalysisCompoundingRule {
    id: RuleId,
    rule: CompoundingRule,
    subrules: Vec<AnalysisSubrule>,
}

impl AnalysisCompoundingRule {
    /// Compile `rule`.
    pub fn new(rule: &CompoundingRule) -> Result<Self> {
        let mut subrules = Vec::with_capacity(rule.subrules.len());
        for sr in &rule.subrules {
            let parts: Vec<PatternPart> = sr.head_lhs.iter().chain(&sr.non_head_lhs).cloned().collect();
            let layout = AnalysisLayout::new(&parts, &sr.rhs);
            let repeats = layout.repeated_groups();
            let head_groups: Vec<String> = sr.head_lhs.iter().flat_map(|p| layout.groups_of(&p.name)).collect();
            let head_captured = acceptable(move |shape: &Shape, m: &Match| {
                copies_agree(&repeats, shape, m) && head_groups.iter().any(|g| m.group(g).is_some())
            });
            let settings = MatcherSettings {
                filter: NodeFilter::SEGMENTS,
                anchored_to_start: true,
                anchored_to_end: true,
                all_submatches: true,
                acceptable: Some(head_captured),
                ..MatcherSettings::default()
            };
            subrules.push(AnalysisSubrule {
                matcher: Matcher::new(layout.pattern(), settings)?,
                head_lhs: sr.head_lhs.clone(),
                non_head_lhs: sr.non_head_lhs.clone(),
                layout,
            });
        }
        Ok(Self {
            id: RuleId::new(&rule.name),
            rule: rule.clone(),
            subrules,
        })
    }
}

impl Rule for AnalysisCompoundingRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        ctx.is_selected(&self.rule.name)
            && input.non_head_count() + 1 < ctx.config.max_stem_count
            && input.unapplication_count(&self.id) < self.rule.max_application_count
            && self.rule.out_syntactic.is_unifiable(input.syntactic())
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut outputs = Vec::new();
        for sr in &self.subrules {
            let mut found: Vec<(Word, AllomorphId)> = Vec::new();
            for m in sr.matcher.all_matches(input.shape()) {
                let mut head = Shape::new();
                sr.layout.generate_shape(&sr.head_lhs, input.shape(), &m, &mut head)?;
                let mut non_head = Shape::new();
                sr.layout.generate_shape(&sr.non_head_lhs, input.shape(), &m, &mut non_head)?;

                for (entry, allomorph) in ctx.search_root_allomorphs(input.stratum(), &non_head)? {
                    let mut add = true;
                    if let Some(i) = found
                        .iter()
                        .position(|(w, id)| id == allomorph.id() && w.shape().duplicates(&head))
                    {
                        // Keep the analysis with the longer head.
                        if head.len() > found[i].0.shape().len() {
                            found.remove(i);
                        } else {
                            add = false;
                        }
                    }
                    if add {
                        let mut non_head_word = Word::from_root(entry, allomorph, input.stratum())?;
                        non_head_word.freeze();
                        let mut output = input.deep_clone();
                        output.set_shape(head.clone())?;
                        output.non_head_unapplied(non_head_word)?;
                        found.push((output, allomorph.id().clone()));
                    }
                }
            }

            for (mut output, _) in found {
                if !self.rule.head_required_syntactic.is_empty() {
                    output.syntactic_mut()?.add(&self.rule.head_required_syntactic)?;
                } else if self.rule.out_syntactic.is_empty() {
                    output.syntactic_mut()?.clear()?;
                }
                output.morphological_rule_unapplied(&self.id)?;
                output.freeze();
                ctx.trace.morphological_rule_unapplied(&self.rule.name, input, &output);
                outputs.push(output);
            }
        }
        trace!("unapplied compounding rule '{}': {} analyses", self.rule.name, outputs.len());
        Ok(outputs)
    }
}
