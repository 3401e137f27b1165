// src/core/engine.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CulpritError, Result};
use super::classifier::IssueClassifier;
use super::correlator::LineCorrelator;
use super::diff::{DiffParser, FileDiff};
use super::exception_analyzer::{ExceptionAnalysis, ExceptionAnalyzer};
use super::findings::Issue;
use super::resolver::{Deployment, FileFindings, Resolution, RootCauseResolver, ServiceFindings};
use super::stack_trace::{ParsedTrace, StackTraceParser};

/// Diff text for one changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiffInput {
    pub file_path: String,
    pub diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInput {
    /// Filled from the map key when services arrive keyed by name and the body has none
    #[serde(default)]
    pub service_name: String,

    #[serde(default)]
    pub diffs: Vec<FileDiffInput>,

    /// A multi-file unified diff, split on its file headers
    #[serde(default)]
    pub unified_diff: Option<String>,

    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

/// Services keyed by name (in document order), or an ordered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServicesInput {
    List(Vec<ServiceInput>),
    Map(IndexMap<String, ServiceInput>),
}

impl Default for ServicesInput {
    fn default() -> Self {
        ServicesInput::List(Vec::new())
    }
}

impl ServicesInput {
    /// Flatten into an ordered list. Map entries keep their document order;
    /// an unnamed entry takes its name from the key.
    pub fn into_ordered(self) -> Vec<ServiceInput> {
        match self {
            ServicesInput::List(services) => services,
            ServicesInput::Map(services) => services
                .into_iter()
                .map(|(name, mut service)| {
                    if service.service_name.trim().is_empty() {
                        service.service_name = name;
                    }
                    service
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentInput {
    #[serde(default)]
    pub stack_trace: Option<String>,

    /// Log message, which may embed a trace
    #[serde(default)]
    pub message: Option<String>,

    pub incident_time: DateTime<Utc>,

    #[serde(default)]
    pub services: ServicesInput,
}

impl IncidentInput {
    /// Decode an incident description. Services given as a list must be named.
    pub fn from_json(json: &str) -> Result<Self> {
        let incident: IncidentInput = serde_json::from_str(json)?;
        if let ServicesInput::List(services) = &incident.services {
            if let Some(position) = services.iter().position(|s| s.service_name.trim().is_empty()) {
                return Err(CulpritError::InvalidInput(format!(
                    "service at position {} has no service_name",
                    position
                )));
            }
        }
        Ok(incident)
    }
}

/// Findings for one changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub service: String,
    pub file_path: String,
    pub additions: usize,
    pub deletions: usize,
    pub issues: Vec<Issue>,
    pub summary: String,
}

/// Everything derived from one service's diffs
#[derive(Debug, Clone)]
pub struct ServiceAnalysis {
    pub findings: ServiceFindings,
    pub reports: Vec<FileReport>,
    pub diffs: Vec<FileDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigation {
    pub trace: ParsedTrace,

    /// Owned source paths from the trace and the log message
    pub implicated_files: BTreeSet<String>,

    /// Absent when neither a trace nor an exception header was found
    pub exception_analysis: Option<ExceptionAnalysis>,

    pub file_reports: Vec<FileReport>,
    pub resolution: Resolution,
}

/// Runs a full investigation: parse, classify per file, resolve across services
pub struct Engine {
    trace_parser: StackTraceParser,
    diff_parser: DiffParser,
    classifier: IssueClassifier,
    analyzer: ExceptionAnalyzer,
    resolver: RootCauseResolver,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Self> {
        debug!("Building engine from configuration: {:?}", config);

        Ok(Self {
            trace_parser: StackTraceParser::new(&config.parsing),
            diff_parser: DiffParser::new(&config.correlation),
            classifier: IssueClassifier::new(&config.exceptions)?,
            analyzer: ExceptionAnalyzer::new(
                &config.exceptions,
                LineCorrelator::new(config.correlation.proximity),
                &config.parsing,
            ),
            resolver: RootCauseResolver::new(config.resolution.deployment_lookback_hours),
        })
    }

    pub fn parse_trace(&self, stack_trace: Option<&str>) -> ParsedTrace {
        self.trace_parser.parse(stack_trace)
    }

    /// Parse and classify every diff of one service
    pub fn analyze_service(&self, service: &ServiceInput, exception_type: Option<&str>) -> ServiceAnalysis {
        let mut diffs: Vec<FileDiff> = service
            .diffs
            .iter()
            .map(|input| FileDiff {
                file_path: input.file_path.clone(),
                changes: self.diff_parser.parse(Some(&input.diff)),
            })
            .collect();
        if let Some(unified) = service.unified_diff.as_deref() {
            diffs.extend(self.diff_parser.parse_files(unified));
        }

        let mut files = Vec::with_capacity(diffs.len());
        let mut reports = Vec::with_capacity(diffs.len());

        for diff in &diffs {
            if diff.changes.is_empty() {
                warn!("{}: diff for {} contains no changes", service.service_name, diff.file_path);
            }

            let mut issues = self.classifier.classify(&diff.changes);
            if let Some(exception_type) = exception_type {
                issues.extend(self.classifier.classify_for_exception(exception_type, &diff.changes));
            }

            reports.push(FileReport {
                service: service.service_name.clone(),
                file_path: diff.file_path.clone(),
                additions: diff.changes.additions(),
                deletions: diff.changes.deletions(),
                summary: self.classifier.summarize(&diff.changes, &issues),
                issues: issues.clone(),
            });
            files.push(FileFindings {
                file_path: diff.file_path.clone(),
                issues,
            });
        }

        debug!(
            "{}: analyzed {} files, {} deployments",
            service.service_name,
            files.len(),
            service.deployments.len()
        );

        ServiceAnalysis {
            findings: ServiceFindings {
                service_name: service.service_name.clone(),
                files,
                deployments: service.deployments.clone(),
            },
            reports,
            diffs,
        }
    }

    /// Sequential investigation
    pub fn investigate(&self, incident: IncidentInput) -> Investigation {
        let trace = self.parse_incident_trace(&incident);
        let exception_type = trace.exception_type.clone();

        let analyses: Vec<ServiceAnalysis> = incident
            .services
            .into_ordered()
            .iter()
            .map(|service| self.analyze_service(service, exception_type.as_deref()))
            .collect();

        self.conclude(
            trace,
            incident.stack_trace.as_deref(),
            incident.message.as_deref(),
            incident.incident_time,
            analyses,
        )
    }

    /// Same result as [`Engine::investigate`], with one blocking task per service.
    pub async fn investigate_concurrent(self: Arc<Self>, incident: IncidentInput) -> anyhow::Result<Investigation> {
        let trace = self.parse_incident_trace(&incident);
        let exception_type = trace.exception_type.clone();

        let handles: Vec<_> = incident
            .services
            .into_ordered()
            .into_iter()
            .map(|service| {
                let engine = Arc::clone(&self);
                let exception_type = exception_type.clone();
                tokio::task::spawn_blocking(move || engine.analyze_service(&service, exception_type.as_deref()))
            })
            .collect();

        // Awaited in submission order so the resolver sees services in input order
        let mut analyses = Vec::with_capacity(handles.len());
        for handle in handles {
            analyses.push(handle.await?);
        }

        Ok(self.conclude(
            trace,
            incident.stack_trace.as_deref(),
            incident.message.as_deref(),
            incident.incident_time,
            analyses,
        ))
    }

    fn parse_incident_trace(&self, incident: &IncidentInput) -> ParsedTrace {
        let trace = self.trace_parser.parse(incident.stack_trace.as_deref());
        if trace.is_empty() && incident.message.is_some() {
            debug!("No usable stack trace field, falling back to the log message");
            return self.trace_parser.parse(incident.message.as_deref());
        }
        trace
    }

    fn conclude(
        &self,
        trace: ParsedTrace,
        stack_trace: Option<&str>,
        message: Option<&str>,
        incident_time: DateTime<Utc>,
        analyses: Vec<ServiceAnalysis>,
    ) -> Investigation {
        let implicated_files = self
            .trace_parser
            .extract_file_paths(stack_trace, message);

        let mut findings = Vec::with_capacity(analyses.len());
        let mut file_reports = Vec::new();
        let mut diffs = Vec::new();
        for analysis in analyses {
            findings.push(analysis.findings);
            file_reports.extend(analysis.reports);
            diffs.extend(analysis.diffs);
        }

        let exception_analysis = if trace.is_empty() {
            None
        } else {
            Some(self.analyzer.analyze(&trace, &diffs))
        };

        let resolution = self.resolver.resolve(&findings, incident_time);

        info!(
            "Investigation complete: {} services, {} files, root cause identified: {}",
            findings.len(),
            file_reports.len(),
            resolution.is_identified()
        );

        Investigation {
            trace,
            implicated_files,
            exception_analysis,
            file_reports,
            resolution,
        }
    }
}
