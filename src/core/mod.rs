// src/core/mod.rs
mod catalogue;
mod classifier;
mod correlator;
mod diff;
mod engine;
mod exception_analyzer;
mod findings;
mod resolver;
mod stack_trace;

pub use catalogue::{short_type, ExceptionCatalogue, ExceptionSignature, GuardVocabulary};
pub use classifier::{IssueClassifier, BUSINESS_LOGIC_THRESHOLD, PASS_ORDER};
pub use correlator::{LineCorrelation, LineCorrelator};
pub use diff::{ChangeKind, ChangeSet, DiffLine, DiffParser, FileDiff, HunkExtent, HunkRange};
pub use exception_analyzer::{CallFlowStep, ExceptionAnalysis, ExceptionAnalyzer, FixSuggestion};
pub use findings::{Confidence, Issue, IssueCategory, Severity};
pub use resolver::{
    Deployment, FileFindings, Resolution, RootCauseCandidate, RootCauseResolver, ServiceFindings,
    UNDETERMINED_CAUSE,
};
pub use stack_trace::{ParsedTrace, StackFrame, StackTraceParser};

// Export the main engine
pub use engine::{
    Engine, FileDiffInput, FileReport, IncidentInput, Investigation, ServiceAnalysis, ServiceInput,
    ServicesInput,
};
