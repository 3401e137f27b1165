// src/core/classifier.rs
use regex::{RegexSet, RegexSetBuilder};
use tracing::debug;

use crate::error::Result;
use super::catalogue::{short_type, ExceptionCatalogue};
use super::diff::{ChangeKind, ChangeSet, DiffLine};
use super::findings::{Issue, IssueCategory, Severity};

/// Order in which the general passes run. Issues are emitted in this order,
/// which decides the resolver's "first issue wins" tie-break.
pub const PASS_ORDER: [IssueCategory; 7] = [
    IssueCategory::ErrorHandlingRemoved,
    IssueCategory::NewExceptionIntroduced,
    IssueCategory::DataAccessChanged,
    IssueCategory::ExternalCallChanged,
    IssueCategory::ConcurrencyTimingChanged,
    IssueCategory::SecurityConcern,
    IssueCategory::BusinessLogicChanged,
];

/// Matching lines needed on either side before logic churn is reported
pub const BUSINESS_LOGIC_THRESHOLD: usize = 3;

const SNIPPET_LINES: usize = 5;

const ERROR_HANDLING_PATTERNS: &[&str] = &[
    r"\btry\s*\{",
    r"\bcatch\s*\(",
    r"\.catch\s*\{",
    r"\.catch\s*\(",
    r"\bfinally\s*\{",
    r"\.onErrorReturn",
    r"\.onErrorResume",
    r"runCatching",
    r"\.getOrElse",
    r"\.getOrNull",
];

const NEW_EXCEPTION_PATTERNS: &[&str] = &[
    r"\bthrow\s+",
    r"\.orElseThrow\s*\{",
    // Kotlin's error(...), but not logger.error(...)
    r"(?:^|[^.\w])error\s*\(",
    r"IllegalArgumentException",
    r"IllegalStateException",
    r"RuntimeException",
    r"NoSuchElementException",
];

// Matched case-insensitively
const DATA_ACCESS_PATTERNS: &[&str] = &[
    r"\bSELECT\b",
    r"\bINSERT\b",
    r"\bUPDATE\b",
    r"\bDELETE\b",
    r"\bJOIN\b",
    r"\bWHERE\b",
    r"@Query\s*\(",
    r"\.query\s*\(",
    r"\.execute\s*\(",
    r"jdbcTemplate",
    r"entityManager",
    r"\.findBy",
    r"\.save\s*\(",
    r"\.delete\s*\(",
];

const EXTERNAL_CALL_PATTERNS: &[&str] = &[
    r"\.get\s*\(",
    r"\.post\s*\(",
    r"\.put\s*\(",
    r"\.delete\s*\(",
    r"\.exchange\s*\(",
    r"RestTemplate",
    r"WebClient",
    r"\.retrieve\s*\(",
    r"\.bodyTo",
    r"HttpClient",
    r"\.send\s*\(",
    r"FeignClient",
    r"\.call\s*\(",
];

const CONCURRENCY_PATTERNS: &[&str] = &[
    r"\basync\b",
    r"\bawait\b",
    r"\.await\s*\(",
    r"runBlocking",
    r"launch\s*\{",
    r"async\s*\{",
    r"\.delay\s*\(",
    r"\.timeout\s*\(",
    r"CompletableFuture",
    r"\.thenApply",
    r"\.thenCompose",
    r"Mono\.",
    r"Flux\.",
    r"\.subscribe\s*\(",
    r"\.block\s*\(",
    r"@Async",
    r"@Scheduled",
    r"Thread\.",
    r"ExecutorService",
];

// Matched case-insensitively; the first matching pattern names the finding
const SECURITY_PATTERNS: &[(&str, &str)] = &[
    (r#"password\s*=\s*["']"#, "Hardcoded password detected"),
    (r#"secret\s*=\s*["']"#, "Hardcoded secret detected"),
    (r#"api[_-]?key\s*=\s*["']"#, "Hardcoded API key detected"),
    (r#"token\s*=\s*["']"#, "Hardcoded token detected"),
    (r"\$\{.*\}.*\+.*SQL", "Potential SQL injection"),
    (r"\.format\s*\(.*\).*SQL", "Potential SQL injection via string formatting"),
    (r"exec\s*\(", "Dynamic code execution"),
    (r"eval\s*\(", "Dynamic code evaluation"),
];

const BUSINESS_LOGIC_PATTERNS: &[&str] = &[
    r"\bif\s*\(",
    r"\belse\s*\{",
    r"\bwhen\s*\(",
    r"\bswitch\s*\(",
    r"\breturn\b",
    r"&&|\|\|",
    r"[<>=!]=",
    r"\.filter\s*\{",
    r"\.map\s*\{",
    r"\.let\s*\{",
    r"\.also\s*\{",
];

struct CompiledGuard {
    exception: String,
    category: IssueCategory,
    description: String,
    patterns: RegexSet,
}

/// Heuristic classifier for risky changes in a diff
pub struct IssueClassifier {
    error_handling: RegexSet,
    new_exception: RegexSet,
    data_access: RegexSet,
    external_call: RegexSet,
    concurrency: RegexSet,
    security: RegexSet,
    business_logic: RegexSet,
    guards: Vec<CompiledGuard>,
}

impl IssueClassifier {
    /// Compile the built-in passes plus the catalogue's guard vocabularies.
    /// Fails only if a catalogue pattern is not a valid regular expression.
    pub fn new(catalogue: &ExceptionCatalogue) -> Result<Self> {
        let guards = catalogue
            .signatures
            .iter()
            .filter_map(|signature| signature.guard.as_ref().map(|guard| (signature, guard)))
            .map(|(signature, guard)| -> Result<CompiledGuard> {
                Ok(CompiledGuard {
                    exception: signature.name.clone(),
                    category: guard.category,
                    description: guard.description.clone(),
                    patterns: RegexSet::new(&guard.patterns)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            error_handling: RegexSet::new(ERROR_HANDLING_PATTERNS)?,
            new_exception: RegexSet::new(NEW_EXCEPTION_PATTERNS)?,
            data_access: RegexSetBuilder::new(DATA_ACCESS_PATTERNS)
                .case_insensitive(true)
                .build()?,
            external_call: RegexSet::new(EXTERNAL_CALL_PATTERNS)?,
            concurrency: RegexSet::new(CONCURRENCY_PATTERNS)?,
            security: RegexSetBuilder::new(SECURITY_PATTERNS.iter().map(|(pattern, _)| *pattern))
                .case_insensitive(true)
                .build()?,
            business_logic: RegexSet::new(BUSINESS_LOGIC_PATTERNS)?,
            guards,
        })
    }

    /// Run every general pass, in [`PASS_ORDER`], over one file's changes.
    pub fn classify(&self, change_set: &ChangeSet) -> Vec<Issue> {
        let removed = significant(&change_set.removed);
        let added = significant(&change_set.added);
        let changed: Vec<(ChangeKind, &DiffLine)> = change_set
            .all_changes()
            .filter(|(_, line)| is_significant(&line.content))
            .collect();

        let mut issues = Vec::new();
        for pass in PASS_ORDER {
            match pass {
                IssueCategory::ErrorHandlingRemoved => issues.extend(batched(
                    pass,
                    Severity::High,
                    "Error handling code was removed or modified",
                    tagged(ChangeKind::Removed, &removed, &self.error_handling),
                )),
                IssueCategory::NewExceptionIntroduced => issues.extend(batched(
                    pass,
                    Severity::Medium,
                    "New exception throwing code was added",
                    tagged(ChangeKind::Added, &added, &self.new_exception),
                )),
                IssueCategory::DataAccessChanged => issues.extend(batched(
                    pass,
                    Severity::Medium,
                    "Database query or persistence code was modified",
                    matching(&changed, &self.data_access),
                )),
                IssueCategory::ExternalCallChanged => issues.extend(batched(
                    pass,
                    Severity::Medium,
                    "External API call code was modified",
                    matching(&changed, &self.external_call),
                )),
                IssueCategory::ConcurrencyTimingChanged => issues.extend(batched(
                    pass,
                    Severity::High,
                    "Asynchronous or timing-related code was modified",
                    matching(&changed, &self.concurrency),
                )),
                IssueCategory::SecurityConcern => issues.extend(self.security_issues(&added)),
                IssueCategory::BusinessLogicChanged => issues.extend(self.business_logic_issue(&removed, &added)),
                _ => {}
            }
        }

        debug!("Classified diff: {} issues", issues.len());
        issues
    }

    /// Narrow the search for a known exception type: flag removed lines that
    /// match the guard vocabulary registered for it. Unknown types, and types
    /// without a guard vocabulary, yield nothing.
    pub fn classify_for_exception(&self, exception_type: &str, change_set: &ChangeSet) -> Vec<Issue> {
        let short = short_type(exception_type);
        let Some(guard) = self.guards.iter().find(|g| g.exception == short) else {
            return Vec::new();
        };

        significant(&change_set.removed)
            .into_iter()
            .filter(|line| guard.patterns.is_match(&line.content))
            .map(|line| {
                Issue::new(guard.category, Severity::High, guard.description.clone())
                    .with_lines(vec![line.line_number])
                    .with_snippet(format!("-{}", line.content))
            })
            .collect()
    }

    /// One-line summary of a file's changes and findings
    pub fn summarize(&self, change_set: &ChangeSet, issues: &[Issue]) -> String {
        if issues.is_empty() {
            return format!(
                "File changed ({} additions, {} deletions) but no obvious issues detected",
                change_set.additions(),
                change_set.deletions()
            );
        }

        let mut counts = Vec::new();
        for severity in [Severity::High, Severity::Medium, Severity::Low] {
            let count = issues.iter().filter(|i| i.severity == severity).count();
            if count > 0 {
                counts.push(format!("{} {} severity", count, severity));
            }
        }

        let mut phrases: Vec<&str> = Vec::new();
        for issue in issues {
            let phrase = issue.category.summary_phrase();
            if !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }

        format!(
            "Found {} potential issues ({}): {}",
            issues.len(),
            counts.join(", "),
            phrases.join(", ")
        )
    }

    fn security_issues(&self, added: &[&DiffLine]) -> Vec<Issue> {
        added
            .iter()
            .filter_map(|line| {
                let first = self.security.matches(&line.content).iter().next()?;
                Some(
                    Issue::new(IssueCategory::SecurityConcern, Severity::High, SECURITY_PATTERNS[first].1)
                        .with_lines(vec![line.line_number])
                        .with_snippet(format!("+{}", line.content.trim())),
                )
            })
            .collect()
    }

    fn business_logic_issue(&self, removed: &[&DiffLine], added: &[&DiffLine]) -> Option<Issue> {
        let count = |lines: &[&DiffLine]| {
            lines
                .iter()
                .filter(|line| self.business_logic.is_match(&line.content))
                .count()
        };
        let removed_count = count(removed);
        let added_count = count(added);

        if removed_count < BUSINESS_LOGIC_THRESHOLD && added_count < BUSINESS_LOGIC_THRESHOLD {
            return None;
        }

        Some(Issue::new(
            IssueCategory::BusinessLogicChanged,
            Severity::Medium,
            format!(
                "Significant business logic changes detected ({} logic statements removed, {} added)",
                removed_count, added_count
            ),
        ))
    }
}

/// Blank and comment-only lines carry no behavior
fn is_significant(content: &str) -> bool {
    let trimmed = content.trim();
    !(trimmed.is_empty()
        || trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*'))
}

fn significant(lines: &[DiffLine]) -> Vec<&DiffLine> {
    lines.iter().filter(|line| is_significant(&line.content)).collect()
}

fn tagged<'a>(kind: ChangeKind, lines: &[&'a DiffLine], patterns: &RegexSet) -> Vec<(ChangeKind, &'a DiffLine)> {
    lines
        .iter()
        .filter(|line| patterns.is_match(&line.content))
        .map(|line| (kind, *line))
        .collect()
}

fn matching<'a>(lines: &[(ChangeKind, &'a DiffLine)], patterns: &RegexSet) -> Vec<(ChangeKind, &'a DiffLine)> {
    lines
        .iter()
        .filter(|(_, line)| patterns.is_match(&line.content))
        .copied()
        .collect()
}

/// One issue covering every matching line, or none
fn batched(
    category: IssueCategory,
    severity: Severity,
    description: &str,
    hits: Vec<(ChangeKind, &DiffLine)>,
) -> Option<Issue> {
    if hits.is_empty() {
        return None;
    }

    let snippet = hits
        .iter()
        .take(SNIPPET_LINES)
        .map(|(kind, line)| format!("{}{}", kind.marker(), line.content.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    Some(
        Issue::new(category, severity, description)
            .with_lines(hits.iter().map(|(_, line)| line.line_number).collect())
            .with_snippet(snippet),
    )
}
