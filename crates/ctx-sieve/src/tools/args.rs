//! Typed view over loosely-typed tool arguments.
//!
//! Hosts hand tool arguments over as arbitrary JSON objects. [`ToolArgs`]
//! recognizes the shapes this crate reasons about (file reads, writes,
//! edits, searches, shell commands) and keeps everything else in an open
//! [`ToolArgs::Other`] variant. The raw JSON stays on the tool part, so
//! exact-duplicate signatures are always computed from what the host sent.

use crate::context::file_tracker::command_target;
use crate::tools::names::{self, ToolKind};
use serde_json::{Map, Value};

/// Argument keys that may carry a file path, checked in order.
pub const PATH_KEYS: &[&str] = &["filePath", "file_path", "file", "path"];

#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    Read {
        file_path: String,
    },
    Write {
        file_path: String,
        content: String,
    },
    Edit {
        file_path: String,
        old_string: String,
        new_string: String,
    },
    Search {
        path: Option<String>,
        pattern: String,
    },
    Command {
        command: String,
    },
    Other(Map<String, Value>),
}

impl ToolArgs {
    /// Interpret `input` according to the tool it was sent to.
    ///
    /// Missing required fields demote the arguments to [`ToolArgs::Other`]
    /// rather than failing.
    pub fn parse(tool: &str, input: &Value) -> Self {
        let map = match input.as_object() {
            Some(m) => m,
            None => return ToolArgs::Other(Map::new()),
        };

        let parsed = match ToolKind::of(tool) {
            ToolKind::FileRead if tool == names::READ => {
                first_str(map, PATH_KEYS).map(|file_path| ToolArgs::Read {
                    file_path: file_path.to_string(),
                })
            }
            ToolKind::FileRead => Some(ToolArgs::Search {
                path: first_str(map, PATH_KEYS).map(str::to_string),
                pattern: first_str(map, &["pattern", "query"])
                    .unwrap_or_default()
                    .to_string(),
            }),
            ToolKind::FileWrite if tool == names::WRITE => {
                first_str(map, PATH_KEYS).map(|file_path| ToolArgs::Write {
                    file_path: file_path.to_string(),
                    content: first_str(map, &["content"]).unwrap_or_default().to_string(),
                })
            }
            ToolKind::FileWrite => first_str(map, PATH_KEYS).map(|file_path| ToolArgs::Edit {
                file_path: file_path.to_string(),
                old_string: first_str(map, &["oldString", "old_string"])
                    .unwrap_or_default()
                    .to_string(),
                new_string: first_str(map, &["newString", "new_string"])
                    .unwrap_or_default()
                    .to_string(),
            }),
            ToolKind::Command => first_str(map, &["command"]).map(|command| ToolArgs::Command {
                command: command.to_string(),
            }),
            _ => None,
        };

        parsed.unwrap_or_else(|| ToolArgs::Other(map.clone()))
    }

    /// The file this invocation touches, if one can be resolved.
    ///
    /// Shell commands are inspected heuristically (`cat <path>`, `vim <path>`
    /// and similar).
    pub fn file_path(&self) -> Option<&str> {
        match self {
            ToolArgs::Read { file_path }
            | ToolArgs::Write { file_path, .. }
            | ToolArgs::Edit { file_path, .. } => Some(file_path),
            ToolArgs::Search { path, .. } => path.as_deref(),
            ToolArgs::Command { command } => command_target(command),
            ToolArgs::Other(map) => first_str(map, PATH_KEYS),
        }
    }

    /// Shell command text, for command invocations.
    pub fn command(&self) -> Option<&str> {
        match self {
            ToolArgs::Command { command } => Some(command),
            _ => None,
        }
    }
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .find(|v| !v.is_empty())
}
