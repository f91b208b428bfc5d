//! Fuzzy deduplication: near-identical outputs of the same tool.
//!
//! Outputs are grouped by tool and compared pairwise with the trigram
//! similarity engine. Any pair at or above the threshold marks its earlier
//! member for removal. Pairwise comparison is quadratic per tool; the
//! similarity cache keeps repeated passes cheap.

use super::dedup::is_dedup_exempt;
use super::{PruneResult, ScanContext, Strategy, StrategyKind};
use crate::ToolPart;
use crate::context::budget::estimate_tokens;
use crate::engine::config::SieveConfig;
use std::collections::{HashMap, HashSet};

pub struct FuzzyDedup;

impl Strategy for FuzzyDedup {
    fn name(&self) -> &'static str {
        "fuzzy-dedup"
    }

    /// Thresholds of 1.0 or more turn fuzzy matching off.
    fn enabled(&self, config: &SieveConfig) -> bool {
        let dedup = &config.strategies.deduplication;
        dedup.enabled && dedup.config.fuzzy_threshold < 1.0
    }

    fn scan(&self, cx: &ScanContext<'_>) -> Vec<PruneResult> {
        let threshold = cx.config.strategies.deduplication.config.fuzzy_threshold;
        if threshold >= 1.0 {
            return Vec::new();
        }

        let mut order: Vec<&str> = Vec::new();
        let mut by_tool: HashMap<&str, Vec<(&ToolPart, &str)>> = HashMap::new();
        for (_, tp, output) in cx.completed() {
            if is_dedup_exempt(cx, &tp.tool) || cx.is_pruned(&tp.id) {
                continue;
            }
            let entry = by_tool.entry(tp.tool.as_str()).or_insert_with(|| {
                order.push(tp.tool.as_str());
                Vec::new()
            });
            entry.push((tp, output));
        }

        let mut results = Vec::new();
        let mut proposed: HashSet<&str> = HashSet::new();
        for tool in order {
            let outputs = &by_tool[tool];
            for (i, (older, older_out)) in outputs.iter().enumerate() {
                if proposed.contains(older.id.as_str()) || cx.is_turn_protected(&older.id) {
                    continue;
                }
                for (_, newer_out) in &outputs[i + 1..] {
                    let similarity = cx.similarity.similarity(older_out, newer_out);
                    if similarity >= threshold {
                        proposed.insert(older.id.as_str());
                        results.push(PruneResult::new(
                            &older.id,
                            &older.tool,
                            StrategyKind::Deduplication,
                            format!("Near-duplicate output ({:.0}% similar)", similarity * 100.0),
                            estimate_tokens(older_out),
                        ));
                        break;
                    }
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use crate::context::similarity::SimilarityEngine;
    use crate::engine::session::SessionState;
    use serde_json::json;

    fn scan(messages: &[Message], config: &SieveConfig) -> Vec<PruneResult> {
        let similarity = SimilarityEngine::new();
        FuzzyDedup.scan(&ScanContext {
            messages,
            state: &SessionState::new(),
            config,
            similarity: &similarity,
        })
    }

    fn bash(id: &str, cmd: &str, output: &str) -> ToolPart {
        ToolPart::completed(id, "bash", json!({"command": cmd}), output)
    }

    #[test]
    fn threshold_is_inclusive() {
        // "abcd" vs "abce" share one of two trigrams each: exactly 0.5.
        let messages = vec![Message::assistant("m1")
            .with_tool(bash("c1", "one", "abcd"))
            .with_tool(bash("c2", "two", "abce"))];

        let at = scan(&messages, &SieveConfig::default().with_fuzzy_threshold(0.5));
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].target, "c1");
        assert_eq!(at[0].reason, "Near-duplicate output (50% similar)");

        let above = scan(&messages, &SieveConfig::default().with_fuzzy_threshold(0.51));
        assert!(above.is_empty());
    }

    #[test]
    fn disabled_at_one() {
        let messages = vec![Message::assistant("m1")
            .with_tool(bash("c1", "one", "same output"))
            .with_tool(bash("c2", "two", "same output"))];
        let config = SieveConfig::default().with_fuzzy_threshold(1.0);
        assert!(!FuzzyDedup.enabled(&config));
        assert!(scan(&messages, &config).is_empty());
    }

    #[test]
    fn only_compares_within_a_tool() {
        let messages = vec![Message::assistant("m1")
            .with_tool(bash("c1", "one", "identical text here"))
            .with_tool(ToolPart::completed(
                "c2",
                "webfetch",
                json!({}),
                "identical text here",
            ))];
        assert!(scan(&messages, &SieveConfig::default()).is_empty());
    }

    #[test]
    fn each_older_output_is_proposed_once() {
        let out = "test result: ok. 42 passed; 0 failed";
        let messages = vec![Message::assistant("m1")
            .with_tool(bash("c1", "a", out))
            .with_tool(bash("c2", "b", out))
            .with_tool(bash("c3", "c", out))];
        let results = scan(&messages, &SieveConfig::default());
        let targets: Vec<_> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["c1", "c2"]);
        assert!(results.iter().all(|r| r.reason.contains("100% similar")));
    }
}
