// src/core/findings.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// How severe a heuristic finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// How strongly the evidence supports a conclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category tag attached to every [`Issue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    #[serde(rename = "error-handling-removed")]
    ErrorHandlingRemoved,
    #[serde(rename = "new-exception-introduced")]
    NewExceptionIntroduced,
    #[serde(rename = "data-access-changed")]
    DataAccessChanged,
    #[serde(rename = "external-call-changed")]
    ExternalCallChanged,
    #[serde(rename = "concurrency-timing-changed")]
    ConcurrencyTimingChanged,
    #[serde(rename = "security-concern")]
    SecurityConcern,
    #[serde(rename = "business-logic-changed")]
    BusinessLogicChanged,
    // Exception-specific refinements
    #[serde(rename = "null_check_removed")]
    NullCheckRemoved,
    #[serde(rename = "state_check_removed")]
    StateCheckRemoved,
    #[serde(rename = "validation_removed")]
    ValidationRemoved,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::ErrorHandlingRemoved => "error-handling-removed",
            IssueCategory::NewExceptionIntroduced => "new-exception-introduced",
            IssueCategory::DataAccessChanged => "data-access-changed",
            IssueCategory::ExternalCallChanged => "external-call-changed",
            IssueCategory::ConcurrencyTimingChanged => "concurrency-timing-changed",
            IssueCategory::SecurityConcern => "security-concern",
            IssueCategory::BusinessLogicChanged => "business-logic-changed",
            IssueCategory::NullCheckRemoved => "null_check_removed",
            IssueCategory::StateCheckRemoved => "state_check_removed",
            IssueCategory::ValidationRemoved => "validation_removed",
        }
    }

    /// Short phrase used when summarizing a file's findings
    pub fn summary_phrase(&self) -> &'static str {
        match self {
            IssueCategory::ErrorHandlingRemoved => "error handling changes",
            IssueCategory::NewExceptionIntroduced => "new exceptions",
            IssueCategory::DataAccessChanged => "database changes",
            IssueCategory::ExternalCallChanged => "API call changes",
            IssueCategory::ConcurrencyTimingChanged => "async/timing changes",
            IssueCategory::SecurityConcern => "security concerns",
            IssueCategory::BusinessLogicChanged => "business logic changes",
            IssueCategory::NullCheckRemoved => "removed null checks",
            IssueCategory::StateCheckRemoved => "removed state checks",
            IssueCategory::ValidationRemoved => "removed input validation",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One heuristic finding over a file's diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub severity: Severity,

    /// Human-readable description of what was found
    pub description: String,

    /// Affected line numbers (post-change for added lines, pre-change for removed)
    pub line_numbers: Vec<u32>,

    /// Illustrative snippet, lines prefixed with `-` or `+`
    pub code_snippet: Option<String>,
}

impl Issue {
    pub fn new(category: IssueCategory, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            description: description.into(),
            line_numbers: Vec::new(),
            code_snippet: None,
        }
    }

    pub fn with_lines(mut self, line_numbers: Vec<u32>) -> Self {
        self.line_numbers = line_numbers;
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.code_snippet = Some(snippet.into());
        self
    }
}
