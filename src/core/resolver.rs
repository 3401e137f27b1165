// src/core/resolver.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::findings::{Confidence, Issue, IssueCategory, Severity};

/// Reported when no rule produces a candidate
pub const UNDETERMINED_CAUSE: &str = "Unable to determine root cause from available data";

/// A deployment of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub commit_hash: String,
    pub deployed_at: DateTime<Utc>,
    #[serde(default)]
    pub build_number: Option<String>,
}

impl Deployment {
    pub fn short_commit(&self) -> String {
        self.commit_hash.chars().take(8).collect()
    }
}

/// Issues found in one changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFindings {
    pub file_path: String,
    pub issues: Vec<Issue>,
}

/// Everything the resolver knows about one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFindings {
    pub service_name: String,
    pub files: Vec<FileFindings>,
    pub deployments: Vec<Deployment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCauseCandidate {
    pub service: String,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,

    /// Category of the issue behind this candidate; `None` for deployment-only candidates
    pub category: Option<IssueCategory>,

    pub confidence: Confidence,
    pub primary_cause: String,
    pub code_snippet: Option<String>,
    pub contributing_factors: Vec<String>,
    pub fix_available: bool,
}

/// Outcome of one resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub candidate: Option<RootCauseCandidate>,
}

impl Resolution {
    pub fn is_identified(&self) -> bool {
        self.candidate.is_some()
    }

    pub fn contributing_factors(&self) -> &[String] {
        self.candidate
            .as_ref()
            .map(|c| c.contributing_factors.as_slice())
            .unwrap_or(&[])
    }

    pub fn primary_cause(&self) -> &str {
        self.candidate
            .as_ref()
            .map(|c| c.primary_cause.as_str())
            .unwrap_or(UNDETERMINED_CAUSE)
    }
}

/// An issue together with where it was found
struct LocatedIssue<'a> {
    service: &'a str,
    file_path: &'a str,
    issue: &'a Issue,
}

impl LocatedIssue<'_> {
    fn factor(&self) -> String {
        format!("{}: {}", self.service, self.issue.description)
    }

    fn into_candidate(self, confidence: Confidence) -> RootCauseCandidate {
        RootCauseCandidate {
            service: self.service.to_string(),
            file_path: Some(self.file_path.to_string()),
            line_number: self.issue.line_numbers.first().copied(),
            category: Some(self.issue.category),
            confidence,
            primary_cause: self.issue.description.clone(),
            code_snippet: self.issue.code_snippet.clone(),
            contributing_factors: Vec::new(),
            fix_available: true,
        }
    }
}

/// Ranks findings across services into at most one primary candidate.
///
/// Rules, first match wins:
/// 1. any HIGH issue: the first one, HIGH confidence if it is the only one, else MEDIUM
/// 2. any MEDIUM issue: the first one, MEDIUM confidence
/// 3. a deployment inside the lookback window: the first one, LOW confidence
/// 4. nothing
///
/// "First" follows service order, then file order, then classifier pass order.
pub struct RootCauseResolver {
    lookback: Duration,
}

impl RootCauseResolver {
    pub fn new(lookback_hours: u32) -> Self {
        Self {
            lookback: Duration::hours(i64::from(lookback_hours)),
        }
    }

    pub fn resolve(&self, findings: &[ServiceFindings], incident_time: DateTime<Utc>) -> Resolution {
        let located: Vec<LocatedIssue<'_>> = findings
            .iter()
            .flat_map(|service| {
                service.files.iter().flat_map(move |file| {
                    file.issues.iter().map(move |issue| LocatedIssue {
                        service: &service.service_name,
                        file_path: &file.file_path,
                        issue,
                    })
                })
            })
            .collect();

        let (highs, rest): (Vec<_>, Vec<_>) = located
            .into_iter()
            .partition(|l| l.issue.severity == Severity::High);
        let mediums: Vec<_> = rest
            .into_iter()
            .filter(|l| l.issue.severity == Severity::Medium)
            .collect();

        let mut candidate = if !highs.is_empty() {
            let confidence = if highs.len() == 1 { Confidence::High } else { Confidence::Medium };
            Self::promote_first(highs, confidence)
        } else if !mediums.is_empty() {
            Self::promote_first(mediums, Confidence::Medium)
        } else {
            None
        };

        for service in findings {
            for deployment in service.deployments.iter().filter(|d| self.in_window(d, incident_time)) {
                match candidate.as_mut() {
                    Some(existing) => existing.contributing_factors.push(format!(
                        "Recent deployment to {} (commit: {})",
                        service.service_name,
                        deployment.short_commit()
                    )),
                    None => {
                        candidate = Some(RootCauseCandidate {
                            service: service.service_name.clone(),
                            file_path: None,
                            line_number: None,
                            category: None,
                            confidence: Confidence::Low,
                            primary_cause: format!(
                                "Recent deployment to {} may be related (commit: {})",
                                service.service_name,
                                deployment.short_commit()
                            ),
                            code_snippet: None,
                            contributing_factors: Vec::new(),
                            fix_available: false,
                        })
                    }
                }
            }
        }

        debug!(
            "Root cause analysis: identified={}, confidence={:?}",
            candidate.is_some(),
            candidate.as_ref().map(|c| c.confidence)
        );

        Resolution { candidate }
    }

    fn in_window(&self, deployment: &Deployment, incident_time: DateTime<Utc>) -> bool {
        // A window reaching past the earliest representable time has no lower bound
        let after_start = incident_time
            .checked_sub_signed(self.lookback)
            .map_or(true, |start| deployment.deployed_at >= start);
        deployment.deployed_at <= incident_time && after_start
    }

    fn promote_first(issues: Vec<LocatedIssue<'_>>, confidence: Confidence) -> Option<RootCauseCandidate> {
        let mut iter = issues.into_iter();
        let primary = iter.next()?;
        let factors: Vec<String> = iter.map(|other| other.factor()).collect();

        let mut candidate = primary.into_candidate(confidence);
        candidate.contributing_factors = factors;
        Some(candidate)
    }
}

impl Default for RootCauseResolver {
    fn default() -> Self {
        Self::new(72)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn incident_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn issue(category: IssueCategory, severity: Severity, description: &str) -> Issue {
        Issue::new(category, severity, description).with_lines(vec![42])
    }

    fn service(name: &str, issues: Vec<Issue>, deployments: Vec<Deployment>) -> ServiceFindings {
        ServiceFindings {
            service_name: name.to_string(),
            files: vec![FileFindings {
                file_path: format!("{}/src/main/kotlin/Handler.kt", name),
                issues,
            }],
            deployments,
        }
    }

    fn deployment(commit: &str, hours_before: i64) -> Deployment {
        Deployment {
            commit_hash: commit.to_string(),
            deployed_at: incident_time() - Duration::hours(hours_before),
            build_number: None,
        }
    }

    #[test]
    fn test_single_high_issue_is_high_confidence() {
        let findings = vec![service(
            "card-service",
            vec![
                issue(IssueCategory::NewExceptionIntroduced, Severity::Medium, "New exception throwing code was added"),
                issue(IssueCategory::ErrorHandlingRemoved, Severity::High, "Error handling code was removed or modified"),
            ],
            vec![],
        )];
        let resolution = RootCauseResolver::default().resolve(&findings, incident_time());
        let candidate = resolution.candidate.unwrap();

        assert_eq!(candidate.confidence, Confidence::High);
        assert_eq!(candidate.category, Some(IssueCategory::ErrorHandlingRemoved));
        assert_eq!(candidate.service, "card-service");
        assert_eq!(candidate.line_number, Some(42));
        assert!(candidate.fix_available);
        // Medium issues are not factors once a HIGH issue wins
        assert!(candidate.contributing_factors.is_empty());
    }

    #[test]
    fn test_multiple_high_issues_drop_to_medium() {
        let findings = vec![
            service("card-service", vec![issue(IssueCategory::ErrorHandlingRemoved, Severity::High, "first")], vec![]),
            service("payment-service", vec![issue(IssueCategory::SecurityConcern, Severity::High, "second")], vec![]),
        ];
        let resolution = RootCauseResolver::default().resolve(&findings, incident_time());

        assert_eq!(resolution.primary_cause(), "first");
        assert_eq!(resolution.candidate.as_ref().unwrap().confidence, Confidence::Medium);
        assert_eq!(resolution.contributing_factors(), ["payment-service: second".to_string()]);
    }

    #[test]
    fn test_medium_issues_when_no_high() {
        let findings = vec![service(
            "card-service",
            vec![
                issue(IssueCategory::DataAccessChanged, Severity::Medium, "db"),
                issue(IssueCategory::ExternalCallChanged, Severity::Medium, "api"),
            ],
            vec![deployment("abcdef1234567890", 2)],
        )];
        let resolution = RootCauseResolver::default().resolve(&findings, incident_time());
        let candidate = resolution.candidate.unwrap();

        assert_eq!(candidate.confidence, Confidence::Medium);
        assert_eq!(candidate.primary_cause, "db");
        assert_eq!(
            candidate.contributing_factors,
            vec![
                "card-service: api".to_string(),
                "Recent deployment to card-service (commit: abcdef12)".to_string(),
            ]
        );
    }

    #[test]
    fn test_deployment_fallback() {
        let findings = vec![
            service("card-service", vec![], vec![deployment("1111111111", 5), deployment("2222222222", 6)]),
            service("payment-service", vec![], vec![deployment("3333333333", 1)]),
        ];
        let resolution = RootCauseResolver::default().resolve(&findings, incident_time());
        let candidate = resolution.candidate.unwrap();

        assert_eq!(candidate.confidence, Confidence::Low);
        assert_eq!(candidate.primary_cause, "Recent deployment to card-service may be related (commit: 11111111)");
        assert!(!candidate.fix_available);
        assert!(candidate.file_path.is_none());
        assert_eq!(
            candidate.contributing_factors,
            vec![
                "Recent deployment to card-service (commit: 22222222)".to_string(),
                "Recent deployment to payment-service (commit: 33333333)".to_string(),
            ]
        );
    }

    #[test]
    fn test_deployments_outside_window_are_ignored() {
        let findings = vec![service(
            "card-service",
            vec![],
            vec![deployment("old", 100), deployment("future", -1)],
        )];
        let resolution = RootCauseResolver::new(72).resolve(&findings, incident_time());

        assert!(!resolution.is_identified());
        assert_eq!(resolution.primary_cause(), UNDETERMINED_CAUSE);
        assert!(resolution.contributing_factors().is_empty());
    }

    #[test]
    fn test_huge_lookback_has_no_lower_bound() {
        let findings = vec![service(
            "card-service",
            vec![],
            vec![deployment("future", -1), deployment("abcdef1234", 1)],
        )];
        let resolution = RootCauseResolver::new(u32::MAX).resolve(&findings, incident_time());

        assert_eq!(
            resolution.primary_cause(),
            "Recent deployment to card-service may be related (commit: abcdef12)"
        );
        assert!(resolution.contributing_factors().is_empty());
    }

    #[test]
    fn test_nothing_to_go_on() {
        let resolution = RootCauseResolver::default().resolve(&[], incident_time());
        assert!(resolution.candidate.is_none());
    }

    #[test]
    fn test_high_issue_never_below_medium() {
        for extra_highs in 0..4 {
            let mut issues = vec![issue(IssueCategory::ConcurrencyTimingChanged, Severity::High, "timing")];
            issues.extend((0..extra_highs).map(|_| issue(IssueCategory::SecurityConcern, Severity::High, "sec")));
            let findings = vec![service("svc", issues, vec![])];

            let confidence = RootCauseResolver::default()
                .resolve(&findings, incident_time())
                .candidate
                .map(|c| c.confidence);
            assert!(confidence >= Some(Confidence::Medium));
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let findings = vec![
            service("a", vec![issue(IssueCategory::ErrorHandlingRemoved, Severity::High, "x")], vec![deployment("c1", 1)]),
            service("b", vec![issue(IssueCategory::SecurityConcern, Severity::High, "y")], vec![]),
        ];
        let resolver = RootCauseResolver::default();
        assert_eq!(resolver.resolve(&findings, incident_time()), resolver.resolve(&findings, incident_time()));
    }
}
