// src/core/exception_analyzer.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParsingConfig;
use super::catalogue::ExceptionCatalogue;
use super::correlator::{LineCorrelation, LineCorrelator};
use super::diff::FileDiff;
use super::findings::{Confidence, Severity};
use super::stack_trace::ParsedTrace;

/// Number of catalogue causes/fixes surfaced per exception
const TOP_ENTRIES: usize = 3;

/// One owned frame in call-flow order (step 1 is the root frame)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFlowStep {
    pub step_number: usize,
    pub class_name: String,
    pub method_name: String,
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    pub is_root_cause: bool,

    /// Source path derived from the frame
    pub source_path: String,

    /// Present when a diff for this frame's file was available
    pub line_correlation: Option<LineCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub description: String,
    pub code_example: Option<String>,
    pub risk_level: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionAnalysis {
    /// Short exception type
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub call_flow: Vec<CallFlowStep>,
    pub root_cause_explanation: String,
    pub suggested_fixes: Vec<FixSuggestion>,

    /// Frames whose line was changed or fell inside a change range
    pub changed_frames_count: usize,

    pub confidence: Confidence,
}

/// Correlates an exception's call flow with code changes
pub struct ExceptionAnalyzer {
    catalogue: ExceptionCatalogue,
    correlator: LineCorrelator,
    layout: ParsingConfig,
}

impl ExceptionAnalyzer {
    pub fn new(catalogue: &ExceptionCatalogue, correlator: LineCorrelator, layout: &ParsingConfig) -> Self {
        Self {
            catalogue: catalogue.clone(),
            correlator,
            layout: layout.clone(),
        }
    }

    pub fn analyze(&self, trace: &ParsedTrace, diffs: &[FileDiff]) -> ExceptionAnalysis {
        debug!(
            "Analyzing exception: {:?}, owned frames: {}",
            trace.exception_short_type,
            trace.owned_frames.len()
        );

        let mut call_flow = self.build_call_flow(trace);
        let mut changed_frames_count = 0;

        for (step, frame) in call_flow.iter_mut().zip(&trace.owned_frames) {
            if frame.line_number.is_none() {
                continue;
            }
            let class_path = frame.class_path();
            if let Some(diff) = diffs.iter().find(|d| d.matches_class_path(&class_path)) {
                let correlation = self.correlator.correlate(step.line_number, &diff.changes);
                if correlation.touches_change() {
                    changed_frames_count += 1;
                }
                step.line_correlation = Some(correlation);
            }
        }

        ExceptionAnalysis {
            exception_type: trace.exception_short_type.clone(),
            exception_message: trace.exception_message.clone(),
            root_cause_explanation: self.explain(trace),
            suggested_fixes: self.suggest_fixes(trace),
            confidence: self.analysis_confidence(trace, changed_frames_count),
            call_flow,
            changed_frames_count,
        }
    }

    /// HIGH needs a known signature, a root frame and at least one frame on
    /// or inside a change; MEDIUM drops the change requirement.
    pub fn analysis_confidence(&self, trace: &ParsedTrace, changed_frames_count: usize) -> Confidence {
        let has_known_type = trace
            .exception_short_type
            .as_deref()
            .map_or(false, |t| self.catalogue.is_known(t));
        let has_root_frame = trace.root_frame().is_some();

        match (has_known_type, has_root_frame, changed_frames_count > 0) {
            (true, true, true) => Confidence::High,
            (true, true, false) => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    fn build_call_flow(&self, trace: &ParsedTrace) -> Vec<CallFlowStep> {
        trace
            .owned_frames
            .iter()
            .enumerate()
            .map(|(i, frame)| CallFlowStep {
                step_number: i + 1,
                class_name: frame.class_name.clone(),
                method_name: frame.method_name.clone(),
                file_name: frame.file_name.clone(),
                line_number: frame.line_number,
                is_root_cause: frame.is_root_frame,
                source_path: frame.to_file_path(&self.layout),
                line_correlation: None,
            })
            .collect()
    }

    fn explain(&self, trace: &ParsedTrace) -> String {
        let exc_type = trace.exception_short_type.as_deref().unwrap_or("Unknown Exception");
        let mut parts = Vec::new();

        match trace.exception_message.as_deref() {
            Some(message) => parts.push(format!("A {} occurred with message: \"{}\"", exc_type, message)),
            None => parts.push(format!("A {} occurred", exc_type)),
        }

        if let Some(root) = trace.root_frame() {
            let line = root
                .line_number
                .map(|l| format!("line {}", l))
                .unwrap_or_else(|| "an unknown line".to_string());
            parts.push(format!(
                "The error originated in {}.{}() at {}",
                root.short_class_name(),
                root.method_name,
                line
            ));
        }

        if let Some(signature) = self.catalogue.lookup(exc_type) {
            if !signature.common_causes.is_empty() {
                parts.push(format!("Common causes for {}:", signature.name));
                for cause in signature.common_causes.iter().take(TOP_ENTRIES) {
                    parts.push(format!("- {}", cause));
                }
            }
        }

        parts.join("\n")
    }

    fn suggest_fixes(&self, trace: &ParsedTrace) -> Vec<FixSuggestion> {
        let signature = trace
            .exception_short_type
            .as_deref()
            .and_then(|t| self.catalogue.lookup(t));

        match signature {
            Some(signature) => signature
                .fix_patterns
                .iter()
                .take(TOP_ENTRIES)
                .map(|fix| FixSuggestion {
                    description: fix.clone(),
                    code_example: signature.code_example.clone(),
                    risk_level: Severity::Low,
                })
                .collect(),
            None => vec![
                FixSuggestion {
                    description: "Review the stack trace and add appropriate error handling".to_string(),
                    code_example: None,
                    risk_level: Severity::Medium,
                },
                FixSuggestion {
                    description: "Add logging to understand the context of the error".to_string(),
                    code_example: None,
                    risk_level: Severity::Low,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorrelationConfig;
    use crate::core::diff::DiffParser;
    use crate::core::stack_trace::StackTraceParser;

    const TRACE: &str = "java.lang.NullPointerException: Customer not found
\tat com.example.card.Handler.handleEvent(Handler.kt:44)
\tat com.example.card.Dispatcher.dispatch(Dispatcher.kt:12)
\tat org.springframework.Container.invoke(Container.java:99)";

    const DIFF: &str = "--- a/src/main/kotlin/com/example/card/Handler.kt
+++ b/src/main/kotlin/com/example/card/Handler.kt
@@ -42,7 +42,8 @@
 fun handleEvent(event: Event) {
     val customer = repository.find(event.customerId)
+    val account = customer!!.account
 }";

    fn analyzer(catalogue: &ExceptionCatalogue) -> ExceptionAnalyzer {
        ExceptionAnalyzer::new(catalogue, LineCorrelator::default(), &ParsingConfig::default())
    }

    fn diffs() -> Vec<FileDiff> {
        DiffParser::new(&CorrelationConfig::default()).parse_files(DIFF)
    }

    #[test]
    fn test_high_confidence_with_changed_root_line() {
        let trace = StackTraceParser::default().parse(Some(TRACE));
        let analysis = analyzer(&ExceptionCatalogue::default()).analyze(&trace, &diffs());

        assert_eq!(analysis.exception_type.as_deref(), Some("NullPointerException"));
        assert_eq!(analysis.call_flow.len(), 2);
        assert!(analysis.call_flow[0].is_root_cause);
        assert_eq!(analysis.call_flow[0].step_number, 1);

        let correlation = analysis.call_flow[0].line_correlation.as_ref().unwrap();
        assert!(correlation.is_changed);
        // No diff for Dispatcher
        assert!(analysis.call_flow[1].line_correlation.is_none());

        assert_eq!(analysis.changed_frames_count, 1);
        assert_eq!(analysis.confidence, Confidence::High);
    }

    #[test]
    fn test_medium_confidence_without_diffs() {
        let trace = StackTraceParser::default().parse(Some(TRACE));
        let analysis = analyzer(&ExceptionCatalogue::default()).analyze(&trace, &[]);

        assert_eq!(analysis.changed_frames_count, 0);
        assert_eq!(analysis.confidence, Confidence::Medium);
    }

    #[test]
    fn test_low_confidence_for_unknown_signature() {
        let trace = StackTraceParser::default().parse(Some(TRACE));
        let analysis = analyzer(&ExceptionCatalogue::empty()).analyze(&trace, &diffs());

        assert_eq!(analysis.changed_frames_count, 1);
        assert_eq!(analysis.confidence, Confidence::Low);
        assert_eq!(analysis.suggested_fixes.len(), 2);
        assert_eq!(analysis.suggested_fixes[0].risk_level, Severity::Medium);
    }

    #[test]
    fn test_low_confidence_without_root_frame() {
        let trace = StackTraceParser::default()
            .parse(Some("java.lang.NullPointerException\n\tat org.lib.Thing.run(Thing.java:1)"));
        let analysis = analyzer(&ExceptionCatalogue::default()).analyze(&trace, &diffs());

        assert!(analysis.call_flow.is_empty());
        assert_eq!(analysis.confidence, Confidence::Low);
    }

    #[test]
    fn test_explanation_and_fixes() {
        let trace = StackTraceParser::default().parse(Some(TRACE));
        let analysis = analyzer(&ExceptionCatalogue::default()).analyze(&trace, &[]);

        let explanation = &analysis.root_cause_explanation;
        assert!(explanation.starts_with("A NullPointerException occurred with message: \"Customer not found\""));
        assert!(explanation.contains("The error originated in Handler.handleEvent() at line 44"));
        assert!(explanation.contains("Common causes for NullPointerException:"));
        assert_eq!(explanation.matches("\n- ").count(), 3);

        assert_eq!(analysis.suggested_fixes.len(), 3);
        assert!(analysis.suggested_fixes.iter().all(|f| f.risk_level == Severity::Low));
        assert!(analysis.suggested_fixes[0].code_example.is_some());
    }

    #[test]
    fn test_empty_trace() {
        let analysis = analyzer(&ExceptionCatalogue::default()).analyze(&ParsedTrace::default(), &[]);

        assert_eq!(analysis.root_cause_explanation, "A Unknown Exception occurred");
        assert_eq!(analysis.confidence, Confidence::Low);
    }
}
