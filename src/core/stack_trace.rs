// src/core/stack_trace.rs
use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParsingConfig;

/// A single call-site in a stack trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Fully qualified owning type, e.g. `com.example.card.Handler$Companion`
    pub class_name: String,

    pub method_name: String,

    /// Source file token, e.g. `Handler.kt`
    pub file_name: Option<String>,

    pub line_number: Option<u32>,

    /// Position in the original trace (0 = top of stack)
    pub index: usize,

    /// True only for the first application-owned frame
    pub is_root_frame: bool,
}

impl StackFrame {
    /// Map this frame to the source file that declares its owning type.
    ///
    /// Inner-class suffixes (`$...`) are dropped and the extension follows the
    /// frame's file token; frames without a recognizable token default to Kotlin.
    pub fn to_file_path(&self, layout: &ParsingConfig) -> String {
        let path_part = self.class_path();

        match self.file_name.as_deref() {
            Some(name) if name.ends_with(".java") => {
                format!("{}/{}.java", layout.java_source_root, path_part)
            }
            _ => format!("{}/{}.kt", layout.kotlin_source_root, path_part),
        }
    }

    /// Owning outer type as a path, e.g. `com/example/card/Handler`
    pub fn class_path(&self) -> String {
        let base_class = self
            .class_name
            .split('$')
            .next()
            .unwrap_or(&self.class_name);
        base_class.replace('.', "/")
    }

    /// Last segment of the owning type, e.g. `Handler`
    pub fn short_class_name(&self) -> &str {
        self.class_name.rsplit('.').next().unwrap_or(&self.class_name)
    }
}

/// Result of parsing one stack trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTrace {
    /// Every frame, library frames included
    pub frames: Vec<StackFrame>,

    /// Application-owned frames in trace order
    pub owned_frames: Vec<StackFrame>,

    /// Fully qualified exception type, e.g. `java.lang.NullPointerException`
    pub exception_type: Option<String>,

    /// Short exception type, e.g. `NullPointerException`
    pub exception_short_type: Option<String>,

    pub exception_message: Option<String>,

    /// A nested "Caused by:" trace was present
    pub has_chained_cause: bool,

    /// Source paths derived from `owned_frames`
    pub unique_file_paths: BTreeSet<String>,
}

impl ParsedTrace {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.exception_type.is_none()
    }

    pub fn root_frame(&self) -> Option<&StackFrame> {
        self.owned_frames.iter().find(|f| f.is_root_frame)
    }
}

/// Line-oriented parser for JVM-style stack traces
pub struct StackTraceParser {
    config: ParsingConfig,
    frame_regex: Regex,
    exception_regex: Regex,
    caused_by_regex: Regex,
}

impl StackTraceParser {
    pub fn new(config: &ParsingConfig) -> Self {
        Self {
            config: config.clone(),
            // at com.example.card.Handler.handleEvent(Handler.kt:45)
            frame_regex: Regex::new(r"^\s*at\s+([\w.$]+)\.([\w$<>]+)\(([^:)]+)?(?::(\d+))?\)")
                .expect("Invalid frame regex"),
            exception_regex: Regex::new(
                r"(?m)^(?:Caused by:\s+)?([\w.$]+(?:Exception|Error))(?::[ \t]*(.*?))?\s*$",
            )
            .expect("Invalid exception header regex"),
            caused_by_regex: Regex::new(r"(?m)^\s*Caused by:").expect("Invalid caused-by regex"),
        }
    }

    /// Parse a stack trace. Empty or absent input yields an empty result.
    pub fn parse(&self, stack_trace: Option<&str>) -> ParsedTrace {
        let text = match stack_trace {
            Some(text) if !text.trim().is_empty() => text,
            _ => return ParsedTrace::default(),
        };

        let mut frames: Vec<StackFrame> = Vec::new();
        let mut owned_frames: Vec<StackFrame> = Vec::new();
        let mut unique_file_paths = BTreeSet::new();

        for line in text.lines() {
            let Some(mut frame) = self.parse_frame(line, frames.len()) else {
                continue;
            };

            if frame.class_name.starts_with(&self.config.owned_package_prefix) {
                if owned_frames.is_empty() {
                    frame.is_root_frame = true;
                }
                unique_file_paths.insert(frame.to_file_path(&self.config));
                owned_frames.push(frame.clone());
            }
            frames.push(frame);
        }

        let (exception_type, exception_message) = self.extract_exception_header(text);
        let exception_short_type = exception_type
            .as_deref()
            .and_then(|t| t.rsplit('.').next())
            .map(str::to_string);

        if !frames.is_empty() {
            debug!(
                "Parsed stack trace: {} frames, {} owned frames, {} unique files",
                frames.len(),
                owned_frames.len(),
                unique_file_paths.len()
            );
        }

        ParsedTrace {
            frames,
            owned_frames,
            exception_type,
            exception_short_type,
            exception_message,
            has_chained_cause: self.caused_by_regex.is_match(text),
            unique_file_paths,
        }
    }

    /// Owned source paths found in a dedicated trace field and/or a log
    /// message that may embed a trace.
    pub fn extract_file_paths(&self, stack_trace: Option<&str>, message: Option<&str>) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        for text in [stack_trace, message].into_iter().flatten() {
            paths.extend(self.parse(Some(text)).unique_file_paths);
        }
        paths
    }

    fn parse_frame(&self, line: &str, index: usize) -> Option<StackFrame> {
        let caps = self.frame_regex.captures(line)?;

        let file_name = caps
            .get(3)
            .map(|m| m.as_str().trim())
            .filter(|name| {
                let lowered = name.to_lowercase();
                !name.is_empty() && lowered != "native method" && lowered != "unknown source"
            })
            .map(str::to_string);

        // Out-of-range line numbers are treated as absent
        let line_number = caps.get(4).and_then(|m| m.as_str().parse::<u32>().ok());

        Some(StackFrame {
            class_name: caps[1].to_string(),
            method_name: caps[2].to_string(),
            file_name,
            line_number,
            index,
            is_root_frame: false,
        })
    }

    fn extract_exception_header(&self, text: &str) -> (Option<String>, Option<String>) {
        match self.exception_regex.captures(text) {
            Some(caps) => {
                let message = caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|m| !m.is_empty());
                (Some(caps[1].to_string()), message)
            }
            None => (None, None),
        }
    }
}

impl Default for StackTraceParser {
    fn default() -> Self {
        Self::new(&ParsingConfig::default())
    }
}
