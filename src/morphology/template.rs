//! Slot-based affix templates.

use std::sync::Arc;

use log::trace;

use crate::error::Result;
use crate::feature::FeatureStruct;
use crate::morphology::{AnalysisMorphRule, MorphologicalRule, SynthesisMorphRule};
use crate::rule::{CascadeOrder, Rule, RuleCascade, RuleContext};
use crate::word::Word;

/// One position of an affix template.
#[derive(Debug, Clone)]
pub struct AffixTemplateSlot {
    name: String,
    rules: Vec<MorphologicalRule>,
    optional: bool,
}

impl AffixTemplateSlot {
    /// Obligatory slot filled by one of `rules`.
    pub fn new(name: &str, rules: Vec<MorphologicalRule>) -> Self {
        Self {
            name: name.to_string(),
            rules,
            optional: false,
        }
    }

    /// Whether the slot may stay empty.
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules that may fill the slot.
    pub fn rules(&self) -> &[MorphologicalRule] {
        &self.rules
    }

    /// Whether the slot may stay empty.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// An ordered list of slots, typically an inflectional paradigm.
///
/// # Example
///
/// ```rust,ignore
/// let verb = AffixTemplate::new("verb")
///     .slot(AffixTemplateSlot::new("tense", vec![past, present]))
///     .slot(AffixTemplateSlot::new("person", vec![first, second]).optional(true))
///     .required_syntactic(verb_fs);
/// ```
#[derive(Debug, Clone)]
pub struct AffixTemplate {
    name: String,
    slots: Vec<AffixTemplateSlot>,
    required_syntactic: FeatureStruct,
}

impl AffixTemplate {
    /// Empty template.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            slots: Vec::new(),
            required_syntactic: FeatureStruct::new(),
        }
    }

    /// Append a slot; slots apply innermost first.
    pub fn slot(mut self, slot: AffixTemplateSlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Syntactic features a word must be unifiable with to use the template.
    pub fn required_syntactic(mut self, fs: FeatureStruct) -> Self {
        self.required_syntactic = fs;
        self
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slots in application order.
    pub fn slots(&self) -> &[AffixTemplateSlot] {
        &self.slots
    }

    /// Required syntactic features.
    pub fn required_syntactic_fs(&self) -> &FeatureStruct {
        &self.required_syntactic
    }
}

// ============================================================================
// Compiled forms
// ============================================================================

/// A template compiled for analysis.
///
/// Slots are unapplied outermost first; the rules of one slot are
/// alternatives. Any slot order is explored, and an obligatory slot stops
/// the exploration of the slots behind it until it has been unapplied.
#[derive(Debug)]
pub struct AnalysisAffixTemplateRule {
    name: String,
    required_syntactic: FeatureStruct,
    cascade: RuleCascade<RuleCascade<AnalysisMorphRule>>,
}

impl AnalysisAffixTemplateRule {
    /// Compile `template`.
    pub fn new(template: &AffixTemplate) -> Result<Self> {
        let mut slots = Vec::with_capacity(template.slots.len());
        for slot in template.slots.iter().rev() {
            let rules = slot
                .rules
                .iter()
                .map(MorphologicalRule::compile_analysis)
                .collect::<Result<Vec<_>>>()?;
            slots.push(RuleCascade::new(rules, CascadeOrder::Simultaneous));
        }
        let optional: Vec<bool> = template.slots.iter().rev().map(|s| s.optional).collect();
        let cascade = RuleCascade::new(slots, CascadeOrder::Permutation)
            .with_continue(Arc::new(move |i, _: &Word| optional[i]));
        Ok(Self {
            name: template.name.clone(),
            required_syntactic: template.required_syntactic.clone(),
            cascade,
        })
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Rule for AnalysisAffixTemplateRule {
    fn is_applicable(&self, _input: &Word, ctx: &RuleContext<'_>) -> bool {
        ctx.is_selected(&self.name)
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let Some(syntactic) = input.syntactic().unify(&self.required_syntactic) else {
            return Ok(Vec::new());
        };
        ctx.trace.template_analysis_input(&self.name, input);
        let mut outputs = Vec::new();
        for result in self.cascade.apply(input, ctx)? {
            let mut output = result.deep_clone();
            output.set_syntactic(syntactic.deep_clone())?;
            output.freeze();
            ctx.trace.template_analysis_output(&self.name, &output);
            outputs.push(output);
        }
        trace!("unapplied template '{}': {} analyses", self.name, outputs.len());
        Ok(outputs)
    }
}

/// A template compiled for synthesis.
///
/// The rules of a slot may combine in any order; which of them actually
/// fire is decided by the morphological rules recorded on the word.
#[derive(Debug)]
pub struct SynthesisAffixTemplateRule {
    name: String,
    required_syntactic: FeatureStruct,
    cascade: RuleCascade<RuleCascade<SynthesisMorphRule>>,
}

impl SynthesisAffixTemplateRule {
    /// Compile `template`.
    pub fn new(template: &AffixTemplate) -> Result<Self> {
        let mut slots = Vec::with_capacity(template.slots.len());
        for slot in &template.slots {
            let rules = slot
                .rules
                .iter()
                .map(MorphologicalRule::compile_synthesis)
                .collect::<Result<Vec<_>>>()?;
            slots.push(RuleCascade::new(rules, CascadeOrder::Permutation));
        }
        let optional: Vec<bool> = template.slots.iter().map(|s| s.optional).collect();
        let cascade = RuleCascade::new(slots, CascadeOrder::Permutation)
            .with_continue(Arc::new(move |i, _: &Word| optional[i]));
        Ok(Self {
            name: template.name.clone(),
            required_syntactic: template.required_syntactic.clone(),
            cascade,
        })
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Rule for SynthesisAffixTemplateRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        ctx.is_selected(&self.name) && input.syntactic().is_unifiable(&self.required_syntactic)
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        ctx.trace.template_synthesis_input(&self.name, input);
        let outputs = self.cascade.apply(input, ctx)?;
        for output in &outputs {
            ctx.trace.template_synthesis_output(&self.name, output);
        }
        trace!("applied template '{}': {} words", self.name, outputs.len());
        Ok(outputs)
    }
}
