// src/core/diff.rs
use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CorrelationConfig;

/// How a hunk's end line is estimated from its header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkExtent {
    /// `start + hunk_window`, regardless of the header's line count
    Fixed,
    /// `start + new_count - 1`, from the header's new-side count
    Declared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
}

/// One added or removed line with its content (without the `+`/`-` marker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Post-change number for added lines, pre-change number for removed lines
    pub line_number: u32,
    pub content: String,
}

/// Inclusive post-change line range attributed to one hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkRange {
    pub start: u32,
    pub end: u32,
}

impl HunkRange {
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Line-indexed change model for one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Post-change line number -> change kind. Only added lines have a
    /// post-change position, so removals never appear here.
    pub changed_lines: BTreeMap<u32, ChangeKind>,

    /// One range per hunk header, in diff order
    pub hunks: Vec<HunkRange>,

    /// Added lines in diff order
    pub added: Vec<DiffLine>,

    /// Removed lines in diff order
    pub removed: Vec<DiffLine>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.added.len()
    }

    pub fn deletions(&self) -> usize {
        self.removed.len()
    }

    pub fn change_at(&self, line: u32) -> Option<ChangeKind> {
        self.changed_lines.get(&line).copied()
    }

    /// Removed lines followed by added lines, each tagged with its kind
    pub fn all_changes(&self) -> impl Iterator<Item = (ChangeKind, &DiffLine)> {
        self.removed
            .iter()
            .map(|l| (ChangeKind::Removed, l))
            .chain(self.added.iter().map(|l| (ChangeKind::Added, l)))
    }
}

impl ChangeKind {
    /// Unified-diff marker for this kind of line
    pub fn marker(&self) -> char {
        match self {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        }
    }
}

/// A parsed section of a multi-file diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file_path: String,
    pub changes: ChangeSet,
}

impl FileDiff {
    /// True when this diff applies to the type at `class_path`
    /// (e.g. `com/example/card/Handler`), whatever the source root or extension.
    pub fn matches_class_path(&self, class_path: &str) -> bool {
        let ours = strip_extension(&self.file_path);
        ours == class_path || ours.ends_with(&format!("/{}", class_path))
    }
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    }
}

/// Unified-diff parser
pub struct DiffParser {
    hunk_extent: HunkExtent,
    hunk_window: u32,
    hunk_regex: Regex,
    new_file_regex: Regex,
    old_file_regex: Regex,
}

impl DiffParser {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            hunk_extent: config.hunk_extent,
            hunk_window: config.hunk_window,
            hunk_regex: Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
                .expect("Invalid hunk header regex"),
            new_file_regex: Regex::new(r"^\+\+\+ (?:b/)?(\S+)").expect("Invalid new-file header regex"),
            old_file_regex: Regex::new(r"^--- (?:a/)?(\S+)").expect("Invalid old-file header regex"),
        }
    }

    /// Parse a single-file unified diff. Lines outside a hunk, and lines
    /// that cannot be placed, contribute nothing.
    pub fn parse(&self, diff: Option<&str>) -> ChangeSet {
        let mut change_set = ChangeSet::default();
        let Some(diff) = diff else {
            return change_set;
        };

        // (old line, new line) of the next line in the current hunk
        let mut cursor: Option<(u32, u32)> = None;

        for line in diff.lines() {
            if let Some(caps) = self.hunk_regex.captures(line) {
                let old_start = caps[1].parse::<u32>().ok();
                let new_start = caps[3].parse::<u32>().ok();
                let new_count = caps.get(4).and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(1);

                cursor = match (old_start, new_start) {
                    (Some(old), Some(new)) => {
                        change_set.hunks.push(self.hunk_range(new, new_count));
                        Some((old, new))
                    }
                    _ => None,
                };
                continue;
            }

            if line.starts_with("+++") || line.starts_with("---") {
                continue;
            }

            let Some((old_line, new_line)) = cursor else {
                continue;
            };

            let next = if let Some(content) = line.strip_prefix('+') {
                change_set.changed_lines.insert(new_line, ChangeKind::Added);
                change_set.added.push(DiffLine {
                    line_number: new_line,
                    content: content.to_string(),
                });
                new_line.checked_add(1).map(|new| (old_line, new))
            } else if let Some(content) = line.strip_prefix('-') {
                change_set.removed.push(DiffLine {
                    line_number: old_line,
                    content: content.to_string(),
                });
                old_line.checked_add(1).map(|old| (old, new_line))
            } else if line.starts_with('\\') {
                // "\ No newline at end of file"
                Some((old_line, new_line))
            } else {
                old_line.checked_add(1).zip(new_line.checked_add(1))
            };

            if next.is_none() {
                warn!("Line numbers overflow in hunk starting near {}; skipping the rest of it", new_line);
            }
            cursor = next;
        }

        debug!(
            "Parsed diff: {} hunks, {} additions, {} deletions",
            change_set.hunks.len(),
            change_set.additions(),
            change_set.deletions()
        );

        change_set
    }

    /// Split a multi-file diff on its file headers and parse each section.
    pub fn parse_files(&self, diff: &str) -> Vec<FileDiff> {
        let mut sections: Vec<(Option<String>, Vec<&str>)> = Vec::new();
        let mut old_path: Option<String> = None;

        for line in diff.lines() {
            if line.starts_with("diff --git ") {
                sections.push((None, Vec::new()));
                old_path = None;
                continue;
            }

            if let Some(caps) = self.old_file_regex.captures(line) {
                old_path = Some(caps[1].to_string()).filter(|p| p != "/dev/null");
                continue;
            }

            if let Some(caps) = self.new_file_regex.captures(line) {
                let path = Some(caps[1].to_string())
                    .filter(|p| p != "/dev/null")
                    .or_else(|| old_path.take());
                match sections.last_mut() {
                    Some((current, lines)) if current.is_none() && !lines.iter().any(|l| l.starts_with("@@")) => {
                        *current = path;
                    }
                    _ => sections.push((path, Vec::new())),
                }
                continue;
            }

            match sections.last_mut() {
                Some((_, lines)) => lines.push(line),
                None => sections.push((None, vec![line])),
            }
        }

        let mut files = Vec::new();
        for (path, lines) in sections {
            match path {
                Some(file_path) => {
                    let text = lines.join("\n");
                    files.push(FileDiff {
                        file_path,
                        changes: self.parse(Some(&text)),
                    });
                }
                None if lines.iter().any(|l| l.starts_with("@@")) => {
                    warn!("Skipping diff section without a file header ({} lines)", lines.len());
                }
                None => {}
            }
        }

        files
    }

    fn hunk_range(&self, start: u32, new_count: u32) -> HunkRange {
        let end = match self.hunk_extent {
            HunkExtent::Fixed => start.saturating_add(self.hunk_window),
            HunkExtent::Declared => start.saturating_add(new_count.saturating_sub(1)),
        };
        HunkRange { start, end }
    }
}

impl Default for DiffParser {
    fn default() -> Self {
        Self::new(&CorrelationConfig::default())
    }
}
