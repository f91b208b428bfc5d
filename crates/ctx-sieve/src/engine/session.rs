//! Per-conversation session state.
//!
//! [`SessionState`] is owned by exactly one conversation. It is populated
//! from tool-execution and lifecycle notifications, read by every strategy,
//! and mutated only by the manager and the orchestrator's apply step.

use crate::context::budget::{ContextUsage, ModelInfo, resolve_context_limit};
use crate::context::file_tracker::{FileHistory, extract_file_path};
use crate::context::graph::{DependencyGraph, NewNode};
use crate::engine::config::SieveConfig;
use crate::strategies::{PruneResult, StrategyKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

// ── ToolExecution ──────────────────────────────────────────────────

/// Notification that a tool finished running.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    /// Call identity; the content identity of the matching tool part.
    pub call_id: String,
    pub tool: String,
    pub input: Value,
    /// Output on success, error text on failure.
    pub result: Result<String, String>,
}

impl ToolExecution {
    pub fn completed(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        input: Value,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            input,
            result: Ok(output.into()),
        }
    }

    pub fn errored(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        input: Value,
        error: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool: tool.into(),
            input,
            result: Err(error.into()),
        }
    }
}

/// What the session remembers about one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub tool: String,
    pub input: Value,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Turn the call was made at.
    pub turn: u32,
    pub file_path: Option<String>,
}

// ── SessionStats ───────────────────────────────────────────────────

/// Running statistics for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub total_tokens_saved: usize,
    pub prune_count: usize,
    pub deduplication_count: usize,
    pub supersede_count: usize,
    pub error_purge_count: usize,
    pub smart_compression_count: usize,
    pub distill_count: usize,
    pub compress_count: usize,
    /// Explicit `prune` requests.
    pub manual_count: usize,
    pub nudges_sent: usize,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            total_tokens_saved: 0,
            prune_count: 0,
            deduplication_count: 0,
            supersede_count: 0,
            error_purge_count: 0,
            smart_compression_count: 0,
            distill_count: 0,
            compress_count: 0,
            manual_count: 0,
            nudges_sent: 0,
        }
    }
}

impl SessionStats {
    /// Account for one applied prune.
    pub fn record(&mut self, strategy: StrategyKind, tokens_saved: usize) {
        self.total_tokens_saved += tokens_saved;
        self.prune_count += 1;
        match strategy {
            StrategyKind::Deduplication => self.deduplication_count += 1,
            StrategyKind::Supersede => self.supersede_count += 1,
            StrategyKind::ErrorPurge => self.error_purge_count += 1,
            StrategyKind::SmartCompression => self.smart_compression_count += 1,
            StrategyKind::Distill => self.distill_count += 1,
            StrategyKind::Compress => self.compress_count += 1,
            StrategyKind::Manual | StrategyKind::Prune => self.manual_count += 1,
        }
    }

    /// Applied prunes for one strategy tag.
    pub fn count_for(&self, strategy: StrategyKind) -> usize {
        match strategy {
            StrategyKind::Deduplication => self.deduplication_count,
            StrategyKind::Supersede => self.supersede_count,
            StrategyKind::ErrorPurge => self.error_purge_count,
            StrategyKind::SmartCompression => self.smart_compression_count,
            StrategyKind::Distill => self.distill_count,
            StrategyKind::Compress => self.compress_count,
            StrategyKind::Manual | StrategyKind::Prune => self.manual_count,
        }
    }

    /// Elapsed time since the session started.
    pub fn duration(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.started_at)
    }
}

// ── SessionState ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub session_id: Option<String>,
    /// Logical step counter, advanced once per new message.
    pub turn: u32,
    /// Tool calls by call identity.
    pub tool_calls: HashMap<String, ToolCallRecord>,
    pub graph: DependencyGraph,
    /// Content identities already pruned. Never re-proposed.
    pub pruned: HashSet<String>,
    pub stats: SessionStats,
    pub file_history: FileHistory,
    /// Manual mode switched on at runtime, on top of the configured flag.
    pub manual_mode: bool,
    pub model: Option<ModelInfo>,
    pub tool_results_since_nudge: u32,
    /// Manual prune requests waiting for the next pass.
    pub pending_manual: Vec<PruneResult>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session under `id`.
    pub fn start(&mut self, id: impl Into<String>) {
        *self = Self {
            session_id: Some(id.into()),
            ..Self::default()
        };
    }

    /// Whether automatic pruning is held back for explicit requests.
    pub fn is_manual(&self, config: &SieveConfig) -> bool {
        config.manual_mode.enabled || self.manual_mode
    }

    /// Record an executed tool call at the current turn: the call record,
    /// file access history, and a dependency-graph node.
    pub fn record_tool_call(&mut self, exec: &ToolExecution, config: &SieveConfig) {
        let (output, error) = match &exec.result {
            Ok(out) => (Some(out.clone()), None),
            Err(err) => (None, Some(err.clone())),
        };
        let file_path = extract_file_path(&exec.tool, &exec.input);

        self.tool_results_since_nudge += 1;
        self.file_history
            .record_tool_access(&exec.tool, &exec.input, self.turn);
        self.graph.add_node(
            NewNode {
                id: &exec.call_id,
                tool: &exec.tool,
                input: &exec.input,
                output: output.as_deref(),
                error: error.as_deref(),
                turn: self.turn,
            },
            config,
        );
        self.tool_calls.insert(
            exec.call_id.clone(),
            ToolCallRecord {
                tool: exec.tool.clone(),
                input: exec.input.clone(),
                output,
                error,
                turn: self.turn,
                file_path,
            },
        );
    }

    /// The host replaced the history: start over under the same session id.
    pub fn reset_for_compaction(&mut self) {
        let session_id = self.session_id.take();
        *self = Self {
            session_id,
            ..Self::default()
        };
    }

    /// Estimated usage of live tracked content against the resolved limit.
    pub fn usage(&self, config: &SieveConfig) -> ContextUsage {
        ContextUsage::new(
            self.graph.live_tokens(),
            resolve_context_limit(config, self.model.as_ref()),
        )
    }

    /// Number of live outputs whose importance decayed below the floor.
    pub fn stale_count(&self, config: &SieveConfig) -> usize {
        self.graph.stale_count(
            self.turn,
            config.semantic.decay_rate,
            config.semantic.min_importance_to_keep,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_populates_every_index() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state.turn = 2;
        state.record_tool_call(
            &ToolExecution::completed("c1", "read", json!({"filePath": "a.ts"}), "abcd"),
            &config,
        );

        let record = &state.tool_calls["c1"];
        assert_eq!(record.turn, 2);
        assert_eq!(record.file_path.as_deref(), Some("a.ts"));
        assert_eq!(record.output.as_deref(), Some("abcd"));
        assert!(state.graph.contains("c1"));
        assert_eq!(state.file_history.get("a.ts").unwrap().reads, vec![2]);
        assert_eq!(state.tool_results_since_nudge, 1);
    }

    #[test]
    fn errors_are_recorded_as_errors() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state.record_tool_call(
            &ToolExecution::errored("c1", "bash", json!({"command": "make"}), "exit 2"),
            &config,
        );
        let record = &state.tool_calls["c1"];
        assert_eq!(record.output, None);
        assert_eq!(record.error.as_deref(), Some("exit 2"));
    }

    #[test]
    fn compaction_resets_everything_but_identity() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state.start("s1");
        state.turn = 7;
        state.manual_mode = true;
        state.record_tool_call(
            &ToolExecution::completed("c1", "read", json!({"filePath": "a.ts"}), "x"),
            &config,
        );
        state.pruned.insert("c1".into());
        state.stats.record(StrategyKind::Supersede, 10);

        state.reset_for_compaction();
        assert!(state.tool_calls.is_empty());
        assert!(state.graph.is_empty());
        assert!(state.pruned.is_empty());
        assert!(state.file_history.is_empty());
        assert_eq!(state.tool_results_since_nudge, 0);
        assert_eq!(state.turn, 0);
        assert!(!state.manual_mode);
        assert_eq!(state.stats.total_tokens_saved, 0);
        assert_eq!(state.stats.prune_count, 0);
        assert_eq!(state.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn stats_count_per_strategy() {
        let mut stats = SessionStats::default();
        stats.record(StrategyKind::Deduplication, 5);
        stats.record(StrategyKind::Deduplication, 5);
        stats.record(StrategyKind::Prune, 1);
        assert_eq!(stats.prune_count, 3);
        assert_eq!(stats.total_tokens_saved, 11);
        assert_eq!(stats.count_for(StrategyKind::Deduplication), 2);
        assert_eq!(stats.count_for(StrategyKind::Manual), 1);
        assert!(stats.duration() >= chrono::Duration::zero());
    }

    #[test]
    fn manual_mode_is_either_flag() {
        let mut state = SessionState::new();
        assert!(!state.is_manual(&SieveConfig::default()));
        state.manual_mode = true;
        assert!(state.is_manual(&SieveConfig::default()));
        let state = SessionState::new();
        assert!(state.is_manual(&SieveConfig::default().with_manual_mode(true)));
    }
}
