//! Word formation rules.
//!
//! Two rule kinds exist, both described by [`MorphologicalRule`]:
//!
//! - [`AffixProcessRule`]: prefixes, suffixes, infixes, reduplication and
//!   feature-changing processes, realized by one of several allomorphs.
//! - [`CompoundingRule`]: joins a head word with a non-head root.
//!
//! [`AffixTemplate`]s group rules into ordered slots. Every rule compiles to
//! an analysis form, which undoes it on a surface shape and pushes it on the
//! word's rule stack, and a synthesis form, which pops and applies it.

pub mod affix_process;
pub mod compounding;
pub mod output;
pub mod template;

pub use affix_process::{
    AffixProcessAllomorph, AffixProcessRule, AnalysisAffixProcessRule, ReduplicationHint, SynthesisAffixProcessRule,
};
pub use compounding::{AnalysisCompoundingRule, CompoundingRule, CompoundingSubrule, SynthesisCompoundingRule};
pub use output::{MorphologicalOutput, PatternPart};
pub use template::{AffixTemplate, AffixTemplateSlot, AnalysisAffixTemplateRule, SynthesisAffixTemplateRule};

use crate::error::Result;
use crate::rule::{Rule, RuleContext, RuleId};
use crate::shape::{AllomorphId, MorphId, NodeId};
use crate::word::Word;

/// A morphological rule of either kind.
#[derive(Debug, Clone)]
pub enum MorphologicalRule {
    /// Affixation and other processes.
    AffixProcess(AffixProcessRule),
    /// Compounding.
    Compounding(CompoundingRule),
}

impl MorphologicalRule {
    /// Rule name.
    pub fn name(&self) -> &str {
        match self {
            MorphologicalRule::AffixProcess(r) => r.name(),
            MorphologicalRule::Compounding(r) => r.name(),
        }
    }

    /// Id recorded on a word's rule stack.
    pub fn id(&self) -> RuleId {
        RuleId::new(self.name())
    }

    /// Compile for analysis.
    pub fn compile_analysis(&self) -> Result<AnalysisMorphRule> {
        Ok(match self {
            MorphologicalRule::AffixProcess(r) => AnalysisMorphRule::AffixProcess(AnalysisAffixProcessRule::new(r)?),
            MorphologicalRule::Compounding(r) => AnalysisMorphRule::Compounding(AnalysisCompoundingRule::new(r)?),
        })
    }

    /// Compile for synthesis.
    pub fn compile_synthesis(&self) -> Result<SynthesisMorphRule> {
        Ok(match self {
            MorphologicalRule::AffixProcess(r) => SynthesisMorphRule::AffixProcess(SynthesisAffixProcessRule::new(r)?),
            MorphologicalRule::Compounding(r) => SynthesisMorphRule::Compounding(SynthesisCompoundingRule::new(r)?),
        })
    }
}

impl From<AffixProcessRule> for MorphologicalRule {
    fn from(rule: AffixProcessRule) -> Self {
        MorphologicalRule::AffixProcess(rule)
    }
}

impl From<CompoundingRule> for MorphologicalRule {
    fn from(rule: CompoundingRule) -> Self {
        MorphologicalRule::Compounding(rule)
    }
}

/// A morphological rule compiled for analysis.
#[derive(Debug)]
#[allow(missing_docs)]
pub enum AnalysisMorphRule {
    AffixProcess(AnalysisAffixProcessRule),
    Compounding(AnalysisCompoundingRule),
}

impl Rule for AnalysisMorphRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        match self {
            AnalysisMorphRule::AffixProcess(r) => r.is_applicable(input, ctx),
            AnalysisMorphRule::Compounding(r) => r.is_applicable(input, ctx),
        }
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        match self {
            AnalysisMorphRule::AffixProcess(r) => r.apply(input, ctx),
            AnalysisMorphRule::Compounding(r) => r.apply(input, ctx),
        }
    }
}

/// A morphological rule compiled for synthesis.
#[derive(Debug)]
#[allow(missing_docs)]
pub enum SynthesisMorphRule {
    AffixProcess(SynthesisAffixProcessRule),
    Compounding(SynthesisCompoundingRule),
}

impl Rule for SynthesisMorphRule {
    fn is_applicable(&self, input: &Word, ctx: &RuleContext<'_>) -> bool {
        match self {
            SynthesisMorphRule::AffixProcess(r) => r.is_applicable(input, ctx),
            SynthesisMorphRule::Compounding(r) => r.is_applicable(input, ctx),
        }
    }

    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        match self {
            SynthesisMorphRule::AffixProcess(r) => r.apply(input, ctx),
            SynthesisMorphRule::Compounding(r) => r.apply(input, ctx),
        }
    }
}

// ============================================================================
// Morph bookkeeping shared by the rule kinds
// ============================================================================

/// Mark each contiguous run of `nodes` as a morph of `allomorph`.
///
/// Without a label the word's next affix label is used. Returns the morph
/// covering the longest run.
pub(crate) fn mark_morphs(
    word: &mut Word,
    nodes: &[NodeId],
    allomorph: &AllomorphId,
    label: Option<&str>,
) -> Result<Option<MorphId>> {
    let label = label.map_or_else(|| word.next_morph_label(), str::to_string);
    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    for &node in nodes {
        let extends = runs
            .last()
            .and_then(|run| run.last())
            .and_then(|&last| word.shape().next(last))
            == Some(node);
        match runs.last_mut() {
            Some(run) if extends => run.push(node),
            _ => runs.push(vec![node]),
        }
    }
    let mut longest: Option<(MorphId, usize)> = None;
    for run in runs {
        if let Some(id) = word.mark_labelled_morph(&run, allomorph, &label)? {
            if longest.map_or(true, |(_, len)| run.len() > len) {
                longest = Some((id, run.len()));
            }
        }
    }
    Ok(longest.map(|(id, _)| id))
}

/// Copy the morphs subsumed by `source_morph` of `source` below `out_morph`.
pub(crate) fn mark_subsumed_morphs(source: &Word, output: &mut Word, source_morph: MorphId, out_morph: MorphId) -> Result<()> {
    for &child in source.shape().morph(source_morph).children() {
        let morph = source.shape().morph(child);
        let out = output.mark_subsumed_morph(out_morph, morph.allomorph(), morph.label())?;
        mark_subsumed_morphs(source, output, child, out)?;
    }
    Ok(())
}

/// The listed word that blocks `word`, if any.
///
/// Another member of the root's family on the same stratum blocks a derived
/// word when the derived syntactic features subsume the member's own.
pub(crate) fn check_blocking(word: &Word, ctx: &RuleContext<'_>) -> Result<Option<Word>> {
    let Some(entry_id) = word.entry() else {
        return Ok(None);
    };
    let (_, entry) = ctx.index.entry(ctx.language, entry_id)?;
    let Some(family) = entry.family() else {
        return Ok(None);
    };
    for (stratum, member) in ctx.index.family_members(ctx.language, family) {
        if member.id() == entry.id() || stratum != word.stratum() {
            continue;
        }
        if !word.syntactic().subsumes(member.syntactic()) {
            continue;
        }
        let Some(allomorph) = member.allomorphs().first() else {
            continue;
        };
        let mut blocked = Word::from_root(member, allomorph, stratum)?;
        blocked.set_realizational(word.realizational().deep_clone())?;
        ctx.trace.blocking(member.id(), &blocked);
        return Ok(Some(blocked));
    }
    Ok(None)
}
