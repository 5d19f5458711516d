//! Parse tracing.
//!
//! Every stage of analysis and synthesis reports to a [`TraceManager`]. The
//! default [`NullTraceManager`] ignores everything; [`RecordingTraceManager`]
//! keeps an ordered event log that tests and debugging front ends can read
//! back. Candidates that are discarded are reported with a
//! [`FailureReason`]; they are never errors.

use parking_lot::Mutex;

use crate::shape::AllomorphId;
use crate::word::Word;

/// Why a candidate was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(serde::Serialize, serde::Deserialize))]
pub enum FailureReason {
    /// Synthesis ended with morphological rules left on the stack.
    PartialParse,
    /// A required syntactic feature has no value.
    ObligatorySyntacticFeatures,
    /// An allomorph's environment does not hold.
    Environment,
    /// A higher-precedence allomorph of the same morpheme also applied.
    DisjunctiveAllomorph,
    /// The synthesized form does not match the surface input.
    SurfaceFormMismatch,
    /// The rule's required syntactic features do not unify with the word's.
    RequiredSyntacticFeatureStruct,
    /// A required MPR feature is missing.
    RequiredMprFeatures,
    /// An excluded MPR feature is present.
    ExcludedMprFeatures,
    /// The rule has already been applied as often as allowed.
    MaxApplicationCount,
    /// No allomorph's input pattern matched.
    Pattern,
    /// The compound non-head does not meet the rule's requirements.
    NonHead,
}

/// Observer of a parse.
///
/// All methods default to no-ops so implementations only override what they
/// care about. Implementations must be thread-safe: synthesis may run on
/// several threads at once.
pub trait TraceManager: Send + Sync {
    /// Whether events are being recorded.
    fn is_tracing(&self) -> bool {
        false
    }

    /// Analysis starts from `input`.
    fn analyze_word(&self, _input: &Word) {}

    /// A word enters analysis of a stratum.
    fn analysis_stratum_input(&self, _stratum: &str, _word: &Word) {}

    /// A word leaves analysis of a stratum.
    fn analysis_stratum_output(&self, _stratum: &str, _word: &Word) {}

    /// A root was found for an analysis.
    fn lexical_lookup(&self, _stratum: &str, _word: &Word) {}

    /// Synthesis starts from `word`.
    fn synthesize_word(&self, _word: &Word) {}

    /// A word enters synthesis of a stratum.
    fn synthesis_stratum_input(&self, _stratum: &str, _word: &Word) {}

    /// A word leaves synthesis of a stratum.
    fn synthesis_stratum_output(&self, _stratum: &str, _word: &Word) {}

    /// A phonological rule was unapplied.
    fn phonological_rule_unapplied(&self, _rule: &str, _input: &Word, _output: &Word) {}

    /// A phonological rule was applied.
    fn phonological_rule_applied(&self, _rule: &str, _input: &Word, _output: &Word) {}

    /// A morphological rule was unapplied.
    fn morphological_rule_unapplied(&self, _rule: &str, _input: &Word, _output: &Word) {}

    /// A morphological rule was applied using `allomorph`.
    fn morphological_rule_applied(&self, _rule: &str, _allomorph: Option<&AllomorphId>, _input: &Word, _output: &Word) {}

    /// A morphological rule did not apply.
    fn morphological_rule_not_applied(&self, _rule: &str, _input: &Word, _reason: FailureReason) {}

    /// A template is about to be unapplied.
    fn template_analysis_input(&self, _template: &str, _word: &Word) {}

    /// A template produced an analysis.
    fn template_analysis_output(&self, _template: &str, _word: &Word) {}

    /// A template is about to be applied.
    fn template_synthesis_input(&self, _template: &str, _word: &Word) {}

    /// A template produced a synthesized word.
    fn template_synthesis_output(&self, _template: &str, _word: &Word) {}

    /// A listed entry blocked a derived word.
    fn blocking(&self, _entry: &str, _word: &Word) {}

    /// A candidate was discarded.
    fn parse_failed(&self, _word: &Word, _reason: FailureReason, _detail: Option<&str>) {}

    /// A candidate survived every filter.
    fn parse_successful(&self, _word: &Word) {}
}

/// Trace manager that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTraceManager;

impl TraceManager for NullTraceManager {}

/// One recorded trace event.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum TraceEvent {
    AnalyzeWord { word: Word },
    AnalysisStratumInput { stratum: String, word: Word },
    AnalysisStratumOutput { stratum: String, word: Word },
    LexicalLookup { stratum: String, word: Word },
    SynthesizeWord { word: Word },
    SynthesisStratumInput { stratum: String, word: Word },
    SynthesisStratumOutput { stratum: String, word: Word },
    PhonologicalRuleUnapplied { rule: String, input: Word, output: Word },
    PhonologicalRuleApplied { rule: String, input: Word, output: Word },
    MorphologicalRuleUnapplied { rule: String, input: Word, output: Word },
    MorphologicalRuleApplied { rule: String, allomorph: Option<AllomorphId>, input: Word, output: Word },
    MorphologicalRuleNotApplied { rule: String, input: Word, reason: FailureReason },
    TemplateAnalysisInput { template: String, word: Word },
    TemplateAnalysisOutput { template: String, word: Word },
    TemplateSynthesisInput { template: String, word: Word },
    TemplateSynthesisOutput { template: String, word: Word },
    Blocking { entry: String, word: Word },
    ParseFailed { word: Word, reason: FailureReason, detail: Option<String> },
    ParseSuccessful { word: Word },
}

/// Trace manager that keeps every event in order.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = Arc::new(RecordingTraceManager::new());
/// let morpher = MorpherBuilder::new(language)
///     .trace_manager(recorder.clone())
///     .build()?;
///
/// morpher.parse_word("taktak")?;
/// for reason in recorder.failures() {
///     println!("{:?}", reason);
/// }
/// ```
#[derive(Debug, Default)]
pub struct RecordingTraceManager {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingTraceManager {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Take the recorded events, leaving the log empty.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Reasons of every discarded candidate, in order.
    pub fn failures(&self) -> Vec<FailureReason> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::ParseFailed { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect()
    }
}

impl TraceManager for RecordingTraceManager {
    fn is_tracing(&self) -> bool {
        true
    }

    fn analyze_word(&self, input: &Word) {
        self.record(TraceEvent::AnalyzeWord { word: input.clone() });
    }

    fn analysis_stratum_input(&self, stratum: &str, word: &Word) {
        self.record(TraceEvent::AnalysisStratumInput {
            stratum: stratum.to_string(),
            word: word.clone(),
        });
    }

    fn analysis_stratum_output(&self, stratum: &str, word: &Word) {
        self.record(TraceEvent::AnalysisStratumOutput {
            stratum: stratum.to_string(),
            word: word.clone(),
        });
    }

    fn lexical_lookup(&self, stratum: &str, word: &Word) {
        self.record(TraceEvent::LexicalLookup {
            stratum: stratum.to_string(),
            word: word.clone(),
        });
    }

    fn synthesize_word(&self, word: &Word) {
        self.record(TraceEvent::SynthesizeWord { word: word.clone() });
    }

    fn synthesis_stratum_input(&self, stratum: &str, word: &Word) {
        self.record(TraceEvent::SynthesisStratumInput {
            stratum: stratum.to_string(),
            word: word.clone(),
        });
    }

    fn synthesis_stratum_output(&self, stratum: &str, word: &Word) {
        self.record(TraceEvent::SynthesisStratumOutput {
            stratum: stratum.to_string(),
            word: word.clone(),
        });
    }

    fn phonological_rule_unapplied(&self, rule: &str, input: &Word, output: &Word) {
        self.record(TraceEvent::PhonologicalRuleUnapplied {
            rule: rule.to_string(),
            input: input.clone(),
            output: output.clone(),
        });
    }

    fn phonological_rule_applied(&self, rule: &str, input: &Word, output: &Word) {
        self.record(TraceEvent::PhonologicalRuleApplied {
            rule: rule.to_string(),
            input: input.clone(),
            output: output.clone(),
        });
    }

    fn morphological_rule_unapplied(&self, rule: &str, input: &Word, output: &Word) {
        self.record(TraceEvent::MorphologicalRuleUnapplied {
            rule: rule.to_string(),
            input: input.clone(),
            output: output.clone(),
        });
    }

    fn morphological_rule_applied(&self, rule: &str, allomorph: Option<&AllomorphId>, input: &Word, output: &Word) {
        self.record(TraceEvent::MorphologicalRuleApplied {
            rule: rule.to_string(),
            allomorph: allomorph.cloned(),
            input: input.clone(),
            output: output.clone(),
        });
    }

    fn morphological_rule_not_applied(&self, rule: &str, input: &Word, reason: FailureReason) {
        self.record(TraceEvent::MorphologicalRuleNotApplied {
            rule: rule.to_string(),
            input: input.clone(),
            reason,
        });
    }

    fn template_analysis_input(&self, template: &str, word: &Word) {
        self.record(TraceEvent::TemplateAnalysisInput {
            template: template.to_string(),
            word: word.clone(),
        });
    }

    fn template_analysis_output(&self, template: &str, word: &Word) {
        self.record(TraceEvent::TemplateAnalysisOutput {
            template: template.to_string(),
            word: word.clone(),
        });
    }

    fn template_synthesis_input(&self, template: &str, word: &Word) {
        self.record(TraceEvent::TemplateSynthesisInput {
            template: template.to_string(),
            word: word.clone(),
        });
    }

    fn template_synthesis_output(&self, template: &str, word: &Word) {
        self.record(TraceEvent::TemplateSynthesisOutput {
            template: template.to_string(),
            word: word.clone(),
        });
    }

    fn blocking(&self, entry: &str, word: &Word) {
        self.record(TraceEvent::Blocking {
            entry: entry.to_string(),
            word: word.clone(),
        });
    }

    fn parse_failed(&self, word: &Word, reason: FailureReason, detail: Option<&str>) {
        self.record(TraceEvent::ParseFailed {
            word: word.clone(),
            reason,
            detail: detail.map(str::to_string),
        });
    }

    fn parse_successful(&self, word: &Word) {
        self.record(TraceEvent::ParseSuccessful { word: word.clone() });
    }
}
