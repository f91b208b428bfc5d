//! Structural summaries for smart compression.
//!
//! A summary replaces a large tool output with its shape: imports and
//! declarations for code, top-level keys for JSON, headings for Markdown,
//! head and tail for shell output, a prefix for anything else. These are
//! line-pattern heuristics, not parsers. Every summary ends by telling the
//! model how to get the full content back.

use crate::context::budget::estimate_tokens;
use crate::context::file_tracker::{basename, extract_file_path};
use crate::tools::args::ToolArgs;
use crate::tools::names;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Marker at the start of every summary.
pub const SUMMARY_TAG: &str = "[Smart Summary]";

const REREAD_NOTICE: &str = "[Full content available on re-read]";
const RERUN_NOTICE: &str = "[Full output pruned - re-run command if needed]";

/// Characters of raw output kept by the generic summary.
const GENERIC_PREFIX_CHARS: usize = 500;

static EXPORT_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"export\s+(?:default\s+)?(?:async\s+)?function\s+(\w+)").unwrap()
});
static EXPORT_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s+(?:default\s+)?class\s+(\w+)").unwrap());
static EXPORT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export\s+(?:type|interface)\s+(\w+)").unwrap());
static LOCAL_FN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?function\s+(\w+)").unwrap());
static LOCAL_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:public|private|protected|abstract|final|static)\s+)*class\s+(\w+)").unwrap()
});
// Rust, Python and Go function declarations.
static DECL_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|const|unsafe)\s+)*(?:fn|def|func)\s+(?:\([^)]*\)\s*)?(\w+)")
        .unwrap()
});
static DECL_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|type|interface)\s+(\w+)").unwrap()
});
static IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:import\s|from\s+\S+\s+import\s|use\s|#include\s)").unwrap());

/// The first `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s.get(..idx).unwrap_or(s),
        None => s,
    }
}

/// Summarize `output` according to the tool that produced it.
pub fn structural_summary(tool: &str, output: &str, input: &Value) -> String {
    match tool {
        names::READ | names::GLOB => {
            let path = extract_file_path(tool, input).unwrap_or_else(|| "unknown".to_string());
            let ext = path
                .rsplit('.')
                .next()
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            match ext.as_str() {
                "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" | "rs" | "py" | "go" | "java"
                | "kt" | "c" | "h" | "cc" | "cpp" | "hpp" | "cs" | "swift" => {
                    code_summary(output, &path)
                }
                "json" | "jsonc" => json_summary(output, &path),
                "md" => markdown_summary(output, &path),
                _ => file_preview(output, &path),
            }
        }
        names::BASH => {
            let args = ToolArgs::parse(tool, input);
            command_summary(output, args.command().unwrap_or_default())
        }
        _ => generic_summary(tool, output),
    }
}

/// Prefix-only summary, used for unknown tools and when structure
/// preservation is turned off.
pub fn generic_summary(tool: &str, output: &str) -> String {
    let chars = output.chars().count();
    let mut lines = vec![
        format!(
            "{SUMMARY_TAG} Tool: {tool} ({chars} chars, ~{} tokens)",
            estimate_tokens(output)
        ),
        truncate_chars(output, GENERIC_PREFIX_CHARS).to_string(),
    ];
    if chars > GENERIC_PREFIX_CHARS {
        lines.push(format!(
            "... ({} chars truncated)",
            chars - GENERIC_PREFIX_CHARS
        ));
    }
    join_non_empty(lines)
}

fn file_preview(output: &str, path: &str) -> String {
    let lines: Vec<&str> = output.split('\n').collect();
    let mut out = vec![
        format!(
            "{SUMMARY_TAG} File: {} ({} lines, ~{} tokens)",
            basename(path),
            lines.len(),
            estimate_tokens(output)
        ),
        "First 10 lines preview:".to_string(),
        lines.iter().take(10).copied().collect::<Vec<_>>().join("\n"),
    ];
    if lines.len() > 10 {
        out.push(format!("... ({} more lines)", lines.len() - 10));
    }
    out.push(REREAD_NOTICE.to_string());
    out.join("\n")
}

fn command_summary(output: &str, command: &str) -> String {
    let lines: Vec<&str> = output.split('\n').collect();
    let mut out = vec![
        format!("{SUMMARY_TAG} Command: {}", truncate_chars(command, 100)),
        format!(
            "Output: {} lines, {} chars",
            lines.len(),
            output.chars().count()
        ),
        "First 5 lines:".to_string(),
        lines.iter().take(5).copied().collect::<Vec<_>>().join("\n"),
    ];
    if lines.len() > 10 {
        out.push("Last 5 lines:".to_string());
        out.push(lines[lines.len() - 5..].join("\n"));
    }
    out.push(RERUN_NOTICE.to_string());
    join_non_empty(out)
}

fn code_summary(code: &str, path: &str) -> String {
    let mut imports = Vec::new();
    let mut exports = Vec::new();
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    let mut types = Vec::new();

    let lines: Vec<&str> = code.split('\n').collect();
    for line in &lines {
        let trimmed = line.trim();
        if IMPORT.is_match(trimmed) {
            imports.push(trimmed);
            continue;
        }
        if trimmed.starts_with("export ") {
            if trimmed.contains("function ") {
                if let Some(m) = EXPORT_FN.find(trimmed) {
                    functions.push(format!("{}(...)", m.as_str()));
                }
            } else if trimmed.contains("class ") {
                if let Some(m) = EXPORT_CLASS.find(trimmed) {
                    classes.push(m.as_str().to_string());
                }
            } else if trimmed.contains("type ") || trimmed.contains("interface ") {
                if let Some(m) = EXPORT_TYPE.find(trimmed) {
                    types.push(m.as_str().to_string());
                }
            } else {
                exports.push(truncate_chars(trimmed, 80));
            }
        } else if !trimmed.starts_with("export") {
            if let Some(m) = LOCAL_FN.find(trimmed).or_else(|| DECL_FN.find(trimmed)) {
                functions.push(format!("{}(...)", m.as_str()));
            } else if let Some(m) = LOCAL_CLASS.find(trimmed) {
                classes.push(m.as_str().to_string());
            } else if let Some(m) = DECL_TYPE.find(trimmed) {
                types.push(m.as_str().to_string());
            }
        }
    }

    let mut out = vec![format!(
        "{SUMMARY_TAG} File: {} ({} lines, ~{} tokens)",
        basename(path),
        lines.len(),
        estimate_tokens(code)
    )];
    if !imports.is_empty() {
        out.push(format!(
            "Imports ({}): {}{}",
            imports.len(),
            imports[..imports.len().min(5)].join("; "),
            ellipsis(imports.len(), 5)
        ));
    }
    if !types.is_empty() {
        out.push(format!("Types: {}", types.join(", ")));
    }
    if !classes.is_empty() {
        out.push(format!("Classes: {}", classes.join(", ")));
    }
    if !functions.is_empty() {
        out.push(format!("Functions: {}", functions.join(", ")));
    }
    if !exports.is_empty() {
        out.push(format!(
            "Exports: {}{}",
            exports[..exports.len().min(5)].join("; "),
            ellipsis(exports.len(), 5)
        ));
    }
    out.push(REREAD_NOTICE.to_string());
    out.join("\n")
}

fn json_summary(raw: &str, path: &str) -> String {
    let keys: Vec<String> = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map.keys().cloned().collect(),
        Ok(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        Ok(_) => Vec::new(),
        Err(_) => {
            return format!(
                "{SUMMARY_TAG} JSON: {} (~{} tokens) [parse error - full content available on re-read]",
                basename(path),
                estimate_tokens(raw)
            );
        }
    };
    [
        format!(
            "{SUMMARY_TAG} JSON: {} ({} top-level keys)",
            basename(path),
            keys.len()
        ),
        format!(
            "Keys: {}{}",
            keys[..keys.len().min(20)].join(", "),
            ellipsis(keys.len(), 20)
        ),
        REREAD_NOTICE.to_string(),
    ]
    .join("\n")
}

fn markdown_summary(md: &str, path: &str) -> String {
    let headings: Vec<&str> = md
        .split('\n')
        .filter(|l| l.starts_with('#'))
        .map(str::trim)
        .collect();
    let mut out = vec![format!(
        "{SUMMARY_TAG} Markdown: {} ({} lines)",
        basename(path),
        md.split('\n').count()
    )];
    if !headings.is_empty() {
        out.push(format!(
            "Headings: {}{}",
            headings[..headings.len().min(10)].join(" | "),
            ellipsis(headings.len(), 10)
        ));
    }
    out.push(REREAD_NOTICE.to_string());
    out.join("\n")
}

fn ellipsis(len: usize, shown: usize) -> &'static str {
    if len > shown { "..." } else { "" }
}

fn join_non_empty(lines: Vec<String>) -> String {
    lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
