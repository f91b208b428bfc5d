//! Smart compression: replace large, no-longer-important outputs with a
//! structural summary.

use super::{PruneResult, ScanContext, Strategy, StrategyKind};
use crate::context::budget::estimate_tokens;
use crate::context::file_tracker::{extract_file_path, is_protected_file};
use crate::context::scoring::{ScoreInput, score_content};
use crate::context::summarizer::{generic_summary, structural_summary};
use crate::engine::config::SieveConfig;
use crate::tools::args::ToolArgs;

/// Content still scoring at least this much is kept verbatim.
pub const KEEP_SCORE: u32 = 60;

/// Summaries must save more than this many tokens to be proposed.
pub const MIN_SAVINGS: usize = 100;

pub struct SmartCompression;

impl Strategy for SmartCompression {
    fn name(&self) -> &'static str {
        "smart-compression"
    }

    fn enabled(&self, config: &SieveConfig) -> bool {
        config.strategies.smart_compression.enabled
    }

    fn scan(&self, cx: &ScanContext<'_>) -> Vec<PruneResult> {
        let settings = &cx.config.strategies.smart_compression.config;
        let mut results = Vec::new();

        for (_, tp, output) in cx.completed() {
            if cx.config.is_protected_tool(&tp.tool) || cx.is_pruned(&tp.id) {
                continue;
            }
            if output.chars().count() < settings.min_length {
                continue;
            }
            if cx.is_turn_protected(&tp.id) {
                continue;
            }
            if cx.config.tracks_dependencies() && !cx.state.graph.can_safely_prune(&tp.id) {
                continue;
            }
            if let Some(path) = extract_file_path(&tp.tool, tp.input())
                && is_protected_file(&path, &cx.config.protected_file_patterns)
            {
                continue;
            }

            // Unrecorded content counts as produced this turn.
            let args = ToolArgs::parse(&tp.tool, tp.input());
            let importance = score_content(
                ScoreInput {
                    tool: &tp.tool,
                    args: &args,
                    output: Some(output),
                    error: None,
                    content_turn: cx.content_turn(&tp.id),
                    current_turn: cx.state.turn,
                },
                cx.config.semantic.decay_rate,
            );
            if importance.score >= KEEP_SCORE {
                continue;
            }

            let summary = if settings.preserve_structure {
                structural_summary(&tp.tool, output, tp.input())
            } else {
                generic_summary(&tp.tool, output)
            };
            let current = estimate_tokens(output);
            let compressed = estimate_tokens(&summary);
            let savings = current.saturating_sub(compressed);
            if savings <= MIN_SAVINGS {
                continue;
            }
            results.push(
                PruneResult::new(
                    &tp.id,
                    &tp.tool,
                    StrategyKind::SmartCompression,
                    format!("Smart compression: {current} -> {compressed} tokens"),
                    savings,
                )
                .with_summary(summary),
            );
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::similarity::SimilarityEngine;
    use crate::context::summarizer::SUMMARY_TAG;
    use crate::engine::session::{SessionState, ToolExecution};
    use crate::{Message, ToolPart};
    use serde_json::json;

    fn scan(messages: &[Message], state: &SessionState, config: &SieveConfig) -> Vec<PruneResult> {
        let similarity = SimilarityEngine::new();
        SmartCompression.scan(&ScanContext {
            messages,
            state,
            config,
            similarity: &similarity,
        })
    }

    fn big_listing() -> String {
        (0..400).map(|i| format!("drwxr-xr-x  file_{i:04}.txt\n")).collect()
    }

    #[test]
    fn large_command_output_is_summarized() {
        let output = big_listing();
        let messages = vec![Message::assistant("m1").with_tool(ToolPart::completed(
            "c1",
            "bash",
            json!({"command": "ls -la"}),
            output.clone(),
        ))];
        let results = scan(&messages, &SessionState::new(), &SieveConfig::default());
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.strategy, StrategyKind::SmartCompression);
        let summary = r.summary.as_deref().unwrap();
        assert!(summary.starts_with(SUMMARY_TAG));
        assert_eq!(
            r.tokens_saved,
            estimate_tokens(&output) - estimate_tokens(summary)
        );
        assert!(r.reason.starts_with("Smart compression: "));
    }

    #[test]
    fn short_outputs_are_skipped() {
        let messages = vec![Message::assistant("m1").with_tool(ToolPart::completed(
            "c1",
            "bash",
            json!({"command": "ls"}),
            "x".repeat(1999),
        ))];
        assert!(scan(&messages, &SessionState::new(), &SieveConfig::default()).is_empty());
    }

    #[test]
    fn important_content_is_kept() {
        let config = SieveConfig::default();
        let output = big_listing();
        let input = json!({"filePath": "src/lib.rs"});
        let mut state = SessionState::new();
        state.turn = 3;
        state.record_tool_call(
            &ToolExecution::completed("c1", "write", input.clone(), output.clone()),
            &config,
        );
        let messages =
            vec![Message::assistant("m1").with_tool(ToolPart::completed("c1", "write", input, output))];
        // A fresh write scores 70.
        assert!(scan(&messages, &state, &config).is_empty());

        // Twenty turns later it has decayed to nothing.
        state.turn = 23;
        assert_eq!(scan(&messages, &state, &config).len(), 1);
    }

    #[test]
    fn content_still_depended_on_is_kept() {
        let config = SieveConfig::default();
        let output = big_listing();
        let input = json!({"filePath": "notes.txt"});
        let mut state = SessionState::new();
        state.turn = 1;
        state.record_tool_call(
            &ToolExecution::completed("w1", "write", input.clone(), output.clone()),
            &config,
        );
        state.record_tool_call(
            &ToolExecution::completed("r1", "read", input.clone(), "short"),
            &config,
        );
        state.turn = 30;
        let messages =
            vec![Message::assistant("m1").with_tool(ToolPart::completed("w1", "write", input, output))];
        // The later read depends on the write.
        assert!(scan(&messages, &state, &config).is_empty());
    }

    #[test]
    fn old_read_followed_by_an_edit_is_compressed() {
        let config = SieveConfig::default();
        let output = big_listing();
        let mut state = SessionState::new();
        state.turn = 1;
        state.record_tool_call(
            &ToolExecution::completed("r1", "read", json!({"filePath": "a.txt"}), output.clone()),
            &config,
        );
        state.record_tool_call(
            &ToolExecution::completed(
                "e1",
                "edit",
                json!({"filePath": "a.txt", "oldString": "a", "newString": "b"}),
                "ok",
            ),
            &config,
        );
        state.turn = 30;
        assert!(state.graph.get("r1").unwrap().score.has_forward_references);

        let messages = vec![Message::assistant("m1").with_tool(ToolPart::completed(
            "r1",
            "read",
            json!({"filePath": "a.txt"}),
            output,
        ))];
        let results = scan(&messages, &state, &config);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, "r1");
    }

    #[test]
    fn unrecorded_content_is_still_scored() {
        let output = big_listing();
        let input = json!({"filePath": "src/lib.rs"});
        let messages = vec![Message::assistant("m1").with_tool(ToolPart::completed(
            "w1",
            "write",
            input,
            output,
        ))];
        // Scored as a fresh write: 70.
        assert!(scan(&messages, &SessionState::new(), &SieveConfig::default()).is_empty());
    }

    #[test]
    fn plain_summaries_when_structure_is_off() {
        let mut config = SieveConfig::default();
        config.strategies.smart_compression.config.preserve_structure = false;
        let messages = vec![Message::assistant("m1").with_tool(ToolPart::completed(
            "c1",
            "bash",
            json!({"command": "ls -la"}),
            big_listing(),
        ))];
        let results = scan(&messages, &SessionState::new(), &config);
        let summary = results[0].summary.as_deref().unwrap();
        assert!(summary.contains("Tool: bash"));
    }
}
