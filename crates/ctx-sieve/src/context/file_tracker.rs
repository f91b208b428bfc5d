//! Per-file access history and file-path resolution.
//!
//! Every tool call that resolves to a file path is recorded in the
//! session's [`FileHistory`] (turns of reads, writes, and edits). The same
//! module owns the path heuristics shared by the dependency graph and the
//! strategies: path extraction from tool arguments and glob-based file
//! protection.

use crate::tools::args::ToolArgs;
use crate::tools::names::{self, ToolKind};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static COMMAND_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:cat|head|tail|less|more|vim|nano|code)\s+["']?([^\s"'|>]+)"#).unwrap()
});

/// Extract the file a shell command operates on, e.g. `cat src/lib.rs`.
pub fn command_target(command: &str) -> Option<&str> {
    COMMAND_TARGET
        .captures(command)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Resolve the file path a tool invocation touches, if any.
pub fn extract_file_path(tool: &str, input: &Value) -> Option<String> {
    ToolArgs::parse(tool, input).file_path().map(str::to_string)
}

/// Whether `path` matches any of the protected glob patterns.
///
/// Invalid patterns are ignored.
pub fn is_protected_file(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| {
        glob::Pattern::new(p)
            .map(|pat| pat.matches(path))
            .unwrap_or(false)
    })
}

/// Last path component, for human-readable reasons and summaries.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// The type of file access recorded by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessType {
    Read,
    Write,
    Edit,
}

impl FileAccessType {
    /// Classify a tool; `None` for tools that don't access files.
    pub fn of(tool: &str) -> Option<Self> {
        match ToolKind::of(tool) {
            ToolKind::FileRead => Some(FileAccessType::Read),
            ToolKind::FileWrite if tool == names::EDIT => Some(FileAccessType::Edit),
            ToolKind::FileWrite => Some(FileAccessType::Write),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileAccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileAccessType::Read => write!(f, "read"),
            FileAccessType::Write => write!(f, "write"),
            FileAccessType::Edit => write!(f, "edit"),
        }
    }
}

/// Turns at which one file was read, written, and edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAccess {
    pub reads: Vec<u32>,
    pub writes: Vec<u32>,
    pub edits: Vec<u32>,
}

impl FileAccess {
    pub fn total(&self) -> usize {
        self.reads.len() + self.writes.len() + self.edits.len()
    }
}

/// Session-scoped map from file path to its access history.
///
/// Ordered by path so reports and persisted memory are deterministic.
#[derive(Debug, Clone, Default)]
pub struct FileHistory {
    files: BTreeMap<String, FileAccess>,
}

impl FileHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file access from a tool call. Tools that don't touch files,
    /// or whose path can't be resolved, are ignored.
    pub fn record_tool_access(&mut self, tool: &str, input: &Value, turn: u32) {
        let Some(access_type) = FileAccessType::of(tool) else {
            return;
        };
        let Some(path) = extract_file_path(tool, input) else {
            return;
        };
        self.record(&path, access_type, turn);
    }

    pub fn record(&mut self, path: &str, access_type: FileAccessType, turn: u32) {
        let entry = self.files.entry(path.to_string()).or_default();
        match access_type {
            FileAccessType::Read => entry.reads.push(turn),
            FileAccessType::Write => entry.writes.push(turn),
            FileAccessType::Edit => entry.edits.push(turn),
        }
    }

    pub fn get(&self, path: &str) -> Option<&FileAccess> {
        self.files.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileAccess)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}
