//! Strata and their compiled analysis and synthesis rules.
//!
//! A stratum owns its phonological rules, morphological rules, affix
//! templates and lexical entries, plus the character table its surface
//! forms are written with. Synthesis runs a stratum's morphology first and
//! its phonology second; analysis undoes the two in the opposite order.

use std::collections::VecDeque;
use std::sync::Arc;

use log::trace;

use crate::chardef::CharacterDefinitionTable;
use crate::error::Result;
use crate::lexicon::LexEntry;
use crate::morphology::{
    AffixTemplate, AnalysisAffixTemplateRule, AnalysisMorphRule, MorphologicalRule, SynthesisAffixTemplateRule,
    SynthesisMorphRule,
};
use crate::phonology::{AnalysisRewriteRule, RewriteRule, SynthesisRewriteRule};
use crate::rule::{CascadeOrder, Rule, RuleCascade, RuleContext, WordSet};
use crate::word::Word;

/// One level of the grammar.
///
/// # Example
///
/// ```rust,ignore
/// let surface = Stratum::new("surface", table)
///     .phonological_rule(voicing)
///     .morphological_rule(plural)
///     .entry(cat);
/// ```
#[derive(Debug, Clone)]
pub struct Stratum {
    name: String,
    table: Arc<CharacterDefinitionTable>,
    phonological_rules: Vec<RewriteRule>,
    morphological_rules: Vec<MorphologicalRule>,
    templates: Vec<AffixTemplate>,
    entries: Vec<LexEntry>,
}

impl Stratum {
    /// Empty stratum written with `table`.
    pub fn new(name: &str, table: Arc<CharacterDefinitionTable>) -> Self {
        Self {
            name: name.to_string(),
            table,
            phonological_rules: Vec::new(),
            morphological_rules: Vec::new(),
            templates: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Append a phonological rule; rules apply in insertion order.
    pub fn phonological_rule(mut self, rule: RewriteRule) -> Self {
        self.phonological_rules.push(rule);
        self
    }

    /// Add a morphological rule that applies outside any template.
    pub fn morphological_rule(mut self, rule: impl Into<MorphologicalRule>) -> Self {
        self.morphological_rules.push(rule.into());
        self
    }

    /// Add an affix template.
    pub fn template(mut self, template: AffixTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Add a lexical entry.
    pub fn entry(mut self, entry: LexEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Stratum name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Character table.
    pub fn table(&self) -> &CharacterDefinitionTable {
        &self.table
    }

    /// Phonological rules in application order.
    pub fn phonological_rules(&self) -> &[RewriteRule] {
        &self.phonological_rules
    }

    /// Morphological rules outside templates.
    pub fn morphological_rules(&self) -> &[MorphologicalRule] {
        &self.morphological_rules
    }

    /// Affix templates.
    pub fn templates(&self) -> &[AffixTemplate] {
        &self.templates
    }

    /// Lexical entries.
    pub fn entries(&self) -> &[LexEntry] {
        &self.entries
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// A stratum compiled for analysis.
#[derive(Debug)]
pub struct AnalysisStratumRule {
    name: String,
    depth: usize,
    phonological_rules: Vec<AnalysisRewriteRule>,
    templates: Vec<AnalysisAffixTemplateRule>,
    morphological_rules: RuleCascade<AnalysisMorphRule>,
}

impl AnalysisStratumRule {
    /// Compile `stratum` found at `depth`.
    pub fn new(stratum: &Stratum, depth: usize) -> Result<Self> {
        let phonological_rules = stratum
            .phonological_rules
            .iter()
            .rev()
            .map(AnalysisRewriteRule::new)
            .collect::<Result<Vec<_>>>()?;
        let templates = stratum
            .templates
            .iter()
            .map(AnalysisAffixTemplateRule::new)
            .collect::<Result<Vec<_>>>()?;
        let mrules = stratum
            .morphological_rules
            .iter()
            .map(MorphologicalRule::compile_analysis)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: stratum.name.clone(),
            depth,
            phonological_rules,
            templates,
            morphological_rules: RuleCascade::new(mrules, CascadeOrder::Simultaneous),
        })
    }

    fn unapply_phonology(&self, input: Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut words = vec![input];
        for prule in &self.phonological_rules {
            let mut next = WordSet::new();
            for word in &words {
                if prule.is_applicable(word, ctx) {
                    next.extend(prule.apply(word, ctx)?);
                } else {
                    next.insert(word.clone());
                }
            }
            words = next.into_vec();
        }
        Ok(words)
    }

    fn unapply_morphology_once(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut out = Vec::new();
        for template in &self.templates {
            if template.is_applicable(input, ctx) {
                out.extend(template.apply(input, ctx)?);
            }
        }
        if self.morphological_rules.is_applicable(input, ctx) {
            out.extend(self.morphological_rules.apply(input, ctx)?);
        }
        Ok(out)
    }
}

impl Rule for AnalysisStratumRule {
    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        let mut word = input.deep_clone();
        word.set_stratum(self.depth)?;
        word.freeze();
        ctx.trace.analysis_stratum_input(&self.name, &word);

        let mut results = WordSet::new();
        let mut queue = VecDeque::new();
        for word in self.unapply_phonology(word, ctx)? {
            if results.insert(word.clone()) {
                queue.push_back(word);
            }
        }
        // Morphological rules are unapplied until nothing new turns up.
        while let Some(word) = queue.pop_front() {
            for output in self.unapply_morphology_once(&word, ctx)? {
                if results.insert(output.clone()) {
                    queue.push_back(output);
                }
            }
        }

        for output in results.iter() {
            ctx.trace.analysis_stratum_output(&self.name, output);
        }
        trace!("analysis of stratum '{}': {} words", self.name, results.len());
        Ok(results.into_vec())
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// A stratum compiled for synthesis.
#[derive(Debug)]
pub struct SynthesisStratumRule {
    name: String,
    depth: usize,
    phonological_rules: Vec<SynthesisRewriteRule>,
    templates: Vec<SynthesisAffixTemplateRule>,
    morphological_rules: RuleCascade<SynthesisMorphRule>,
}

impl SynthesisStratumRule {
    /// Compile `stratum` found at `depth`.
    pub fn new(stratum: &Stratum, depth: usize) -> Result<Self> {
        let phonological_rules = stratum
            .phonological_rules
            .iter()
            .map(SynthesisRewriteRule::new)
            .collect::<Result<Vec<_>>>()?;
        let templates = stratum
            .templates
            .iter()
            .map(SynthesisAffixTemplateRule::new)
            .collect::<Result<Vec<_>>>()?;
        let mrules = stratum
            .morphological_rules
            .iter()
            .map(MorphologicalRule::compile_synthesis)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: stratum.name.clone(),
            depth,
            phonological_rules,
            templates,
            morphological_rules: RuleCascade::new(mrules, CascadeOrder::Simultaneous),
        })
    }

    /// Apply morphology until no rule of this stratum fires.
    fn apply_morphology(&self, input: Word, ctx: &RuleContext<'_>) -> Result<WordSet> {
        let mut done = WordSet::new();
        let mut stack = vec![input];
        while let Some(word) = stack.pop() {
            let mut outputs = Vec::new();
            for template in &self.templates {
                if template.is_applicable(&word, ctx) {
                    outputs.extend(template.apply(&word, ctx)?);
                }
            }
            if self.morphological_rules.is_applicable(&word, ctx) {
                outputs.extend(self.morphological_rules.apply(&word, ctx)?);
            }
            if outputs.is_empty() {
                done.insert(word);
            } else {
                stack.extend(outputs);
            }
        }
        Ok(done)
    }

    fn apply_phonology(&self, input: Word, ctx: &RuleContext<'_>) -> Result<Word> {
        let mut word = input;
        for prule in &self.phonological_rules {
            if prule.is_applicable(&word, ctx) {
                if let Some(output) = prule.apply(&word, ctx)?.into_iter().next() {
                    word = output;
                }
            }
        }
        Ok(word)
    }
}

impl Rule for SynthesisStratumRule {
    fn apply(&self, input: &Word, ctx: &RuleContext<'_>) -> Result<Vec<Word>> {
        // Words rooted deeper than this stratum skip it.
        if input.stratum() > self.depth {
            return Ok(vec![input.clone()]);
        }
        let mut word = input.deep_clone();
        word.set_stratum(self.depth)?;
        word.freeze();
        ctx.trace.synthesis_stratum_input(&self.name, &word);

        let mut outputs = WordSet::new();
        for word in self.apply_morphology(word, ctx)?.into_vec() {
            let output = self.apply_phonology(word, ctx)?;
            ctx.trace.synthesis_stratum_output(&self.name, &output);
            outputs.insert(output);
        }
        trace!("synthesis of stratum '{}': {} words", self.name, outputs.len());
        Ok(outputs.into_vec())
    }
}
