//! LLM-facing manual context operations.
//!
//! The model can ask for content to be removed through three tools:
//!
//! | Tool | Effect |
//! |------|--------|
//! | `sieve_distill` | Keep a summary of key findings, prune the raw outputs |
//! | `sieve_compress` | Collapse a range of parts into one summary |
//! | `sieve_prune` | Drop outputs that are no longer needed |
//!
//! Requests are validated against the session (already-pruned and
//! protected content is skipped) and queued on
//! [`SessionState::pending_manual`]. The orchestrator applies the queue at
//! the start of its next pass, ahead of automatic proposals and outside the
//! cache-awareness filter.

use crate::context::file_tracker::is_protected_file;
use crate::engine::config::{SieveConfig, ToolPermission};
use crate::engine::session::SessionState;
use crate::json_schema_for;
use crate::strategies::{PruneResult, StrategyKind};
use crate::tools::names;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const UNKNOWN_TOOL: &str = "unknown";

// ── Arguments ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DistillArgs {
    /// Concise summary of the key findings to preserve.
    pub summary: String,
    /// IDs of the tool call parts to prune after distillation.
    pub ids: Vec<String>,
    /// Optional focus area for the distillation.
    #[serde(default)]
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompressArgs {
    /// Concise summary of the compressed conversation range.
    pub summary: String,
    /// IDs of the message parts to compress.
    pub ids: Vec<String>,
    /// Optional focus area for the compression.
    #[serde(default)]
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PruneArgs {
    /// IDs of the tool call parts to prune.
    pub ids: Vec<String>,
    /// Brief reason for pruning.
    #[serde(default)]
    pub reason: Option<String>,
}

// ── Definitions ────────────────────────────────────────────────────

/// Name, description, and JSON Schema parameters of one manual tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualToolDef {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Definitions of the manual tools `config` offers, in a fixed order.
pub fn definitions(config: &SieveConfig) -> Vec<ManualToolDef> {
    let mut defs = Vec::new();
    if config.offers(config.tools.distill) {
        defs.push(ManualToolDef {
            name: names::SIEVE_DISTILL,
            description: "Distill key findings from tool outputs into a concise summary, then mark \
                          the original content for pruning. Provide the summary and the tool call \
                          IDs to prune.",
            parameters: json_schema_for::<DistillArgs>(),
        });
    }
    if config.offers(config.tools.compress) {
        defs.push(ManualToolDef {
            name: names::SIEVE_COMPRESS,
            description: "Compress a range of conversation content into a single summary. Use when \
                          a series of exploratory steps can be condensed into what was learned.",
            parameters: json_schema_for::<CompressArgs>(),
        });
    }
    if config.offers(config.tools.prune) {
        defs.push(ManualToolDef {
            name: names::SIEVE_PRUNE,
            description: "Remove completed or noisy tool content from context. Use for tool outputs \
                          that are no longer needed.",
            parameters: json_schema_for::<PruneArgs>(),
        });
    }
    defs
}

/// Parse raw JSON arguments into a typed struct. The error is phrased for
/// the model, which sees it as the tool result.
pub fn parse_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

/// Dispatch a manual tool call by name. Always returns the text the model
/// should see; failures come back as `"Error: ..."` strings.
pub fn execute(
    name: &str,
    arguments: &str,
    state: &mut SessionState,
    config: &SieveConfig,
) -> String {
    let permission = match name {
        names::SIEVE_DISTILL => config.tools.distill,
        names::SIEVE_COMPRESS => config.tools.compress,
        names::SIEVE_PRUNE => config.tools.prune,
        _ => return format!("Error: unknown tool '{name}'"),
    };
    if permission == ToolPermission::Deny {
        return format!("Error: {name} is disabled");
    }
    let result = match name {
        names::SIEVE_DISTILL => parse_args(arguments).map(|a| distill(state, config, a)),
        names::SIEVE_COMPRESS => parse_args(arguments).map(|a| compress(state, config, a)),
        _ => parse_args(arguments).map(|a| prune(state, config, a)),
    };
    result.unwrap_or_else(|e| e)
}

// ── Operations ─────────────────────────────────────────────────────

pub fn distill(state: &mut SessionState, config: &SieveConfig, args: DistillArgs) -> String {
    let reason = match &args.focus {
        Some(focus) => format!("Distilled by the model (focus: {focus})"),
        None => "Distilled by the model".to_string(),
    };
    let (count, tokens) = enqueue(state, config, &args.ids, StrategyKind::Distill, &reason);
    info!("Distill queued {count} item(s), ~{tokens} tokens");
    format!(
        "Distilled {count} tool outputs (~{tokens} tokens freed). Summary preserved:\n{}",
        args.summary
    )
}

pub fn compress(state: &mut SessionState, config: &SieveConfig, args: CompressArgs) -> String {
    let reason = match &args.focus {
        Some(focus) => format!("Compressed by the model (focus: {focus})"),
        None => "Compressed by the model".to_string(),
    };
    let (count, tokens) = enqueue(state, config, &args.ids, StrategyKind::Compress, &reason);
    info!("Compress queued {count} item(s), ~{tokens} tokens");
    format!(
        "Compressed {count} items (~{tokens} tokens freed). Summary:\n{}",
        args.summary
    )
}

pub fn prune(state: &mut SessionState, config: &SieveConfig, args: PruneArgs) -> String {
    let reason = args
        .reason
        .clone()
        .unwrap_or_else(|| "Pruned by the model".to_string());
    let (count, tokens) = enqueue(state, config, &args.ids, StrategyKind::Prune, &reason);
    info!("Prune queued {count} item(s), ~{tokens} tokens");
    match &args.reason {
        Some(r) => format!("Pruned {count} items (~{tokens} tokens freed). Reason: {r}"),
        None => format!("Pruned {count} items (~{tokens} tokens freed)"),
    }
}

/// Queue a manual prune for each acceptable id. Returns the number queued
/// and their estimated tokens.
fn enqueue(
    state: &mut SessionState,
    config: &SieveConfig,
    ids: &[String],
    strategy: StrategyKind,
    reason: &str,
) -> (usize, usize) {
    let mut count = 0;
    let mut tokens = 0;
    for id in ids {
        let queued = state.pending_manual.iter().any(|r| &r.target == id);
        if state.pruned.contains(id) || queued {
            debug!("{strategy}: {id} already pruned or queued");
            continue;
        }
        let record = state.tool_calls.get(id);
        let tool = record.map_or(UNKNOWN_TOOL, |r| r.tool.as_str());
        if config.is_protected_tool(tool) {
            debug!("{strategy}: {id} is a protected tool ({tool})");
            continue;
        }
        let protected_file = record
            .and_then(|r| r.file_path.as_deref())
            .is_some_and(|p| is_protected_file(p, &config.protected_file_patterns));
        if protected_file {
            debug!("{strategy}: {id} touches a protected file");
            continue;
        }

        let estimate = state.graph.get(id).map_or(0, |n| n.estimated_tokens);
        let result = PruneResult::new(id, tool, strategy, reason, estimate);
        state.pending_manual.push(result);
        count += 1;
        tokens += estimate;
    }
    (count, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::ToolExecution;
    use serde_json::json;

    fn session() -> (SessionState, SieveConfig) {
        let config = SieveConfig::default().protect_files(["**/*.env"]);
        let mut state = SessionState::new();
        state.turn = 1;
        for (id, tool, path) in [
            ("r1", "read", "src/a.ts"),
            ("r2", "read", "config/.prod.env"),
            ("t1", "todowrite", ""),
        ] {
            state.record_tool_call(
                &ToolExecution::completed(id, tool, json!({"filePath": path}), "x".repeat(400)),
                &config,
            );
        }
        (state, config)
    }

    #[test]
    fn prune_queues_and_reports() {
        let (mut state, config) = session();
        let text = prune(
            &mut state,
            &config,
            PruneArgs {
                ids: vec!["r1".into()],
                reason: Some("done".into()),
            },
        );
        assert_eq!(text, "Pruned 1 items (~100 tokens freed). Reason: done");
        assert_eq!(state.pending_manual.len(), 1);
        assert_eq!(state.pending_manual[0].strategy, StrategyKind::Prune);
        assert_eq!(state.pending_manual[0].tool, "read");
        // Queued, not yet applied.
        assert!(state.pruned.is_empty());
    }

    #[test]
    fn protected_pruned_and_queued_ids_are_skipped() {
        let (mut state, config) = session();
        state.pruned.insert("gone".into());
        let args = DistillArgs {
            summary: "a.ts exports foo".into(),
            ids: vec![
                "r1".into(),
                "r1".into(),
                "r2".into(),
                "t1".into(),
                "gone".into(),
            ],
            focus: None,
        };
        let text = distill(&mut state, &config, args);
        assert_eq!(
            text,
            "Distilled 1 tool outputs (~100 tokens freed). Summary preserved:\na.ts exports foo"
        );
        assert_eq!(state.pending_manual.len(), 1);
    }

    #[test]
    fn unknown_ids_are_queued_with_no_estimate() {
        let (mut state, config) = session();
        let text = compress(
            &mut state,
            &config,
            CompressArgs {
                summary: "explored".into(),
                ids: vec!["m3:text0".into()],
                focus: Some("setup".into()),
            },
        );
        assert_eq!(text, "Compressed 1 items (~0 tokens freed). Summary:\nexplored");
        assert_eq!(state.pending_manual[0].tool, UNKNOWN_TOOL);
        assert!(state.pending_manual[0].reason.contains("setup"));
    }

    #[test]
    fn execute_dispatches_and_reports_errors() {
        let (mut state, config) = session();
        let out = execute(
            names::SIEVE_PRUNE,
            r#"{"ids": ["r1"]}"#,
            &mut state,
            &config,
        );
        assert_eq!(out, "Pruned 1 items (~100 tokens freed)");

        let out = execute(names::SIEVE_PRUNE, "{", &mut state, &config);
        assert!(out.starts_with("Error: invalid tool arguments"));

        // Compress is denied by default.
        let out = execute(
            names::SIEVE_COMPRESS,
            r#"{"summary": "s", "ids": []}"#,
            &mut state,
            &config,
        );
        assert_eq!(out, "Error: sieve_compress is disabled");

        assert!(execute("bash", "{}", &mut state, &config).starts_with("Error: unknown tool"));
    }

    #[test]
    fn definitions_follow_permissions() {
        let config = SieveConfig::default();
        let offered: Vec<_> = definitions(&config).iter().map(|d| d.name).collect();
        assert_eq!(offered, [names::SIEVE_DISTILL, names::SIEVE_PRUNE]);
        let prune_def = &definitions(&config)[1];
        assert_eq!(prune_def.parameters["type"], "object");
        assert!(prune_def.parameters["properties"]["ids"].is_object());
    }
}
