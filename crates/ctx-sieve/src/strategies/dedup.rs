//! Exact deduplication: identical tool calls keep only their latest output.

use super::{PruneResult, ScanContext, Strategy, StrategyKind};
use crate::context::budget::estimate_tokens;
use crate::engine::config::SieveConfig;
use std::collections::HashMap;

pub const DUPLICATE_REASON: &str = "Duplicate tool call with identical arguments";

/// Groups completed calls by `tool::arguments` and proposes every instance
/// but the last.
pub struct ExactDedup;

/// Signature of a call: tool name plus its compact serialized arguments.
pub fn signature(tool: &str, input: &serde_json::Value) -> String {
    format!("{tool}::{input}")
}

/// Tools exempt from both exact and fuzzy deduplication.
pub(crate) fn is_dedup_exempt(cx: &ScanContext<'_>, tool: &str) -> bool {
    cx.config.is_protected_tool(tool)
        || cx
            .config
            .strategies
            .deduplication
            .config
            .protected_tools
            .iter()
            .any(|t| t == tool)
}

impl Strategy for ExactDedup {
    fn name(&self) -> &'static str {
        "exact-dedup"
    }

    fn enabled(&self, config: &SieveConfig) -> bool {
        config.strategies.deduplication.enabled
    }

    fn scan(&self, cx: &ScanContext<'_>) -> Vec<PruneResult> {
        // Signature → instances in conversation order. The Vec keeps groups
        // in first-seen order so output is deterministic.
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<(&crate::ToolPart, &str)>> = Vec::new();

        for (_, tp, output) in cx.completed() {
            if is_dedup_exempt(cx, &tp.tool) || cx.is_pruned(&tp.id) {
                continue;
            }
            let sig = signature(&tp.tool, tp.input());
            let slot = *index.entry(sig).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push((tp, output));
        }

        let mut results = Vec::new();
        for group in &groups {
            let Some((_latest, earlier)) = group.split_last() else {
                continue;
            };
            for (tp, output) in earlier {
                if cx.is_turn_protected(&tp.id) {
                    continue;
                }
                results.push(PruneResult::new(
                    &tp.id,
                    &tp.tool,
                    StrategyKind::Deduplication,
                    DUPLICATE_REASON,
                    estimate_tokens(output),
                ));
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::similarity::SimilarityEngine;
    use crate::engine::session::{SessionState, ToolExecution};
    use crate::{Message, ToolPart};
    use serde_json::json;

    fn scan(messages: &[Message], state: &SessionState, config: &SieveConfig) -> Vec<PruneResult> {
        let similarity = SimilarityEngine::new();
        ExactDedup.scan(&ScanContext {
            messages,
            state,
            config,
            similarity: &similarity,
        })
    }

    fn grep(id: &str, pattern: &str) -> ToolPart {
        ToolPart::completed(id, "grep", json!({"pattern": pattern}), "x".repeat(40))
    }

    #[test]
    fn keeps_only_the_latest_instance() {
        let messages = vec![
            Message::assistant("m1").with_tool(grep("c1", "foo")),
            Message::assistant("m2").with_tool(grep("c2", "foo")),
            Message::assistant("m3").with_tool(grep("c3", "bar")),
            Message::assistant("m4").with_tool(grep("c4", "foo")),
        ];
        let results = scan(&messages, &SessionState::new(), &SieveConfig::default());
        let targets: Vec<_> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["c1", "c2"]);
        assert_eq!(results[0].reason, DUPLICATE_REASON);
        assert_eq!(results[0].tokens_saved, 10);
        assert_eq!(results[0].strategy, StrategyKind::Deduplication);
    }

    #[test]
    fn argument_order_matters_only_through_serialization() {
        assert_eq!(
            signature("read", &json!({"filePath": "a"})),
            "read::{\"filePath\":\"a\"}"
        );
    }

    #[test]
    fn skips_pruned_and_protected() {
        let config = SieveConfig::default().protect_tool("grep");
        let messages = vec![Message::assistant("m1")
            .with_tool(grep("c1", "foo"))
            .with_tool(grep("c2", "foo"))];
        assert!(scan(&messages, &SessionState::new(), &config).is_empty());

        let mut state = SessionState::new();
        state.pruned.insert("c1".into());
        assert!(scan(&messages, &state, &SieveConfig::default()).is_empty());
    }

    #[test]
    fn dedup_protected_list_is_honored() {
        let mut config = SieveConfig::default();
        config
            .strategies
            .deduplication
            .config
            .protected_tools
            .push("grep".into());
        let messages = vec![Message::assistant("m1")
            .with_tool(grep("c1", "foo"))
            .with_tool(grep("c2", "foo"))];
        assert!(scan(&messages, &SessionState::new(), &config).is_empty());
    }

    #[test]
    fn turn_protection_uses_recorded_turn() {
        let config = SieveConfig::default().with_turn_protection(2);
        let mut state = SessionState::new();
        for (id, turn) in [("c1", 1), ("c2", 4), ("c3", 5)] {
            state.turn = turn;
            state.record_tool_call(
                &ToolExecution::completed(id, "grep", json!({"pattern": "foo"}), "x"),
                &config,
            );
        }
        state.turn = 5;
        let messages = vec![Message::assistant("m1")
            .with_tool(grep("c1", "foo"))
            .with_tool(grep("c2", "foo"))
            .with_tool(grep("c3", "foo"))];
        let results = scan(&messages, &state, &config);
        let targets: Vec<_> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["c1"]);
    }

    #[test]
    fn errors_and_pending_are_ignored() {
        let messages = vec![Message::assistant("m1")
            .with_tool(ToolPart::errored("c1", "grep", json!({"pattern": "foo"}), "e"))
            .with_tool(ToolPart::pending("c2", "grep", json!({"pattern": "foo"})))
            .with_tool(grep("c3", "foo"))];
        assert!(scan(&messages, &SessionState::new(), &SieveConfig::default()).is_empty());
    }
}
