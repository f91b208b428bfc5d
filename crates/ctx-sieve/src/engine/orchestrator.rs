//! Arbitration and application of prune proposals.
//!
//! Strategies only propose. The [`Orchestrator`] is the one place that
//! mutates the conversation and the session:
//!
//! 1. Queued manual requests are taken first, then every enabled strategy
//!    scans in priority order. Proposals are deduplicated by content
//!    identity; the first one wins.
//! 2. When cache awareness is active, automatic proposals saving less than
//!    the minimum net savings are dropped, and the rest are ordered latest
//!    position first so the cached conversation prefix stays stable.
//!    Manual requests bypass this filter.
//! 3. Each surviving proposal is re-checked against the pruned set, the
//!    protection rules and the dependency graph, then applied in place:
//!    the part is rewritten, the id joins the pruned set, the graph node is
//!    marked, and the statistics are updated together.
//!
//! Scanning reads an unmutated snapshot, so a pass either commits in the
//! apply step or changes nothing.

use crate::Message;
use crate::context::eviction::evict_part;
use crate::context::similarity::SimilarityEngine;
use crate::engine::config::SieveConfig;
use crate::engine::events::{EventHandler, SieveEvent};
use crate::engine::session::SessionState;
use crate::strategies::{PruneResult, ScanContext, Strategy, StrategyKind, default_pipeline};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct Orchestrator {
    strategies: Vec<Box<dyn Strategy>>,
    similarity: SimilarityEngine,
}

impl Orchestrator {
    /// The default strategy pipeline with a fresh similarity cache.
    pub fn new() -> Self {
        Self::with_strategies(default_pipeline())
    }

    /// A custom pipeline, run in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self {
            strategies,
            similarity: SimilarityEngine::new(),
        }
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    /// Run every applicable strategy against an unmutated snapshot and
    /// merge the results, first proposal per content identity wins.
    pub fn propose(
        &self,
        messages: &[Message],
        state: &SessionState,
        config: &SieveConfig,
    ) -> Vec<PruneResult> {
        if !config.enabled {
            return Vec::new();
        }
        let manual = state.is_manual(config);
        if manual && !config.manual_mode.automatic_strategies {
            return Vec::new();
        }

        let cx = ScanContext {
            messages,
            state,
            config,
            similarity: &self.similarity,
        };
        let mut proposals = Vec::new();
        for strategy in &self.strategies {
            if !strategy.enabled(config) {
                continue;
            }
            // Compression rewrites content; in manual mode only the model asks for that.
            if manual && strategy.name() == "smart-compression" {
                continue;
            }
            let found = strategy.scan(&cx);
            if !found.is_empty() {
                debug!("{} proposed {} prune(s)", strategy.name(), found.len());
            }
            proposals.extend(found);
        }
        dedupe_by_target(proposals)
    }

    /// One full pass: take queued manual requests, propose, filter, apply.
    ///
    /// Returns the prunes that were applied, in application order.
    pub fn run(
        &self,
        messages: &mut [Message],
        state: &mut SessionState,
        config: &SieveConfig,
        handler: &dyn EventHandler,
    ) -> Vec<PruneResult> {
        let manual = std::mem::take(&mut state.pending_manual);
        let manual_ids: HashSet<&str> = manual.iter().map(|r| r.target.as_str()).collect();

        let automatic: Vec<PruneResult> = self
            .propose(messages, state, config)
            .into_iter()
            .filter(|r| !manual_ids.contains(r.target.as_str()))
            .collect();
        let proposed = manual.len() + automatic.len();

        let automatic = if config.cache_awareness.is_active() {
            cache_filter(automatic, messages, config.cache_awareness.min_net_savings)
        } else {
            automatic
        };

        let mut queue = dedupe_by_target(manual);
        queue.extend(automatic);
        handler.on_event(&SieveEvent::ProposalsReady {
            proposed,
            after_filter: queue.len(),
        });

        apply(queue, messages, state, config, handler)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the first proposal for each content identity.
pub fn dedupe_by_target(proposals: Vec<PruneResult>) -> Vec<PruneResult> {
    let mut seen = HashSet::new();
    proposals
        .into_iter()
        .filter(|r| seen.insert(r.target.clone()))
        .collect()
}

/// Position of every part in the flattened conversation.
fn part_positions(messages: &[Message]) -> HashMap<&str, usize> {
    messages
        .iter()
        .flat_map(|m| m.parts.iter())
        .enumerate()
        .map(|(pos, part)| (part.id(), pos))
        .collect()
}

/// Drop proposals below `min_net_savings` and order the rest latest
/// position first. Unknown targets sort as position 0.
pub fn cache_filter(
    proposals: Vec<PruneResult>,
    messages: &[Message],
    min_net_savings: usize,
) -> Vec<PruneResult> {
    let positions = part_positions(messages);
    let mut kept: Vec<PruneResult> = proposals
        .into_iter()
        .filter(|r| r.tokens_saved >= min_net_savings)
        .collect();
    kept.sort_by_key(|r| std::cmp::Reverse(positions.get(r.target.as_str()).copied().unwrap_or(0)));
    kept
}

/// Apply `results` in order. Each one is re-checked against the current
/// state first; failures are reported and skipped.
///
/// Proposals blocked only by live dependents are retried once the rest of
/// the queue has been applied, since a later prune in the same pass may
/// release them.
pub fn apply(
    results: Vec<PruneResult>,
    messages: &mut [Message],
    state: &mut SessionState,
    config: &SieveConfig,
    handler: &dyn EventHandler,
) -> Vec<PruneResult> {
    // Content identity → (message index, part index).
    let mut locations: HashMap<String, (usize, usize)> = HashMap::new();
    for (mi, msg) in messages.iter().enumerate() {
        for (pi, part) in msg.parts.iter().enumerate() {
            locations.entry(part.id().to_string()).or_insert((mi, pi));
        }
    }

    let mut applied = Vec::new();
    let mut queue = results;
    loop {
        let before = applied.len();
        let mut blocked = Vec::new();
        for result in queue {
            match apply_one(&result, &locations, messages, state, config) {
                Ok(()) => {
                    handler.on_event(&SieveEvent::Applied { result: &result });
                    applied.push(result);
                }
                Err(Rejection::Blocked) => blocked.push(result),
                Err(Rejection::Skip(why)) => {
                    handler.on_event(&SieveEvent::Skipped { result: &result, why });
                }
            }
        }
        if blocked.is_empty() || applied.len() == before {
            for result in &blocked {
                handler.on_event(&SieveEvent::Skipped {
                    result,
                    why: "still referenced by live content",
                });
            }
            return applied;
        }
        queue = blocked;
    }
}

enum Rejection {
    /// Live content still depends on the target.
    Blocked,
    Skip(&'static str),
}

fn apply_one(
    result: &PruneResult,
    locations: &HashMap<String, (usize, usize)>,
    messages: &mut [Message],
    state: &mut SessionState,
    config: &SieveConfig,
) -> Result<(), Rejection> {
    rejection(result, state, config)?;
    let &(mi, pi) = locations
        .get(&result.target)
        .ok_or(Rejection::Skip("not present in the conversation"))?;
    let crate::Part::Tool(part) = &mut messages[mi].parts[pi] else {
        return Err(Rejection::Skip("not a tool part"));
    };
    if config.is_protected_tool(&part.tool) {
        return Err(Rejection::Skip("protected tool"));
    }
    if !evict_part(part, result) {
        return Err(Rejection::Skip("tool call has not finished"));
    }

    state.pruned.insert(result.target.clone());
    state.graph.mark_pruned(&result.target);
    state.stats.record(result.strategy, result.tokens_saved);
    Ok(())
}

/// Why `result` can't be applied right now, if it can't.
fn rejection(
    result: &PruneResult,
    state: &SessionState,
    config: &SieveConfig,
) -> Result<(), Rejection> {
    if state.pruned.contains(&result.target) {
        return Err(Rejection::Skip("already pruned"));
    }
    if config.is_protected_tool(&result.tool) {
        return Err(Rejection::Skip("protected tool"));
    }
    let graph = &state.graph;
    let safe = graph.can_safely_prune(&result.target)
        || (result.strategy == StrategyKind::Supersede
            && graph.is_superseded_by_reads(&result.target));
    if !safe {
        return Err(Rejection::Blocked);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::eviction::{DEDUP_PLACEHOLDER, PRUNE_PLACEHOLDER};
    use crate::engine::events::NoopHandler;
    use crate::engine::session::ToolExecution;
    use crate::{Message, ToolPart};
    use serde_json::json;

    fn result(target: &str, tokens: usize) -> PruneResult {
        PruneResult::new(target, "bash", StrategyKind::Deduplication, "dup", tokens)
    }

    fn three_parts() -> Vec<Message> {
        vec![
            Message::assistant("m1").with_tool(ToolPart::completed("a", "bash", json!({}), "1")),
            Message::assistant("m2").with_tool(ToolPart::completed("b", "bash", json!({}), "2")),
            Message::assistant("m3").with_tool(ToolPart::completed("c", "bash", json!({}), "3")),
        ]
    }

    #[test]
    fn first_proposal_per_target_wins() {
        let merged = dedupe_by_target(vec![
            result("a", 1),
            PruneResult::new("a", "bash", StrategyKind::SmartCompression, "later", 99),
            result("b", 2),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].strategy, StrategyKind::Deduplication);
    }

    #[test]
    fn cache_filter_drops_small_and_orders_latest_first() {
        let messages = three_parts();
        let kept = cache_filter(
            vec![result("a", 1000), result("b", 50), result("c", 600)],
            &messages,
            500,
        );
        let targets: Vec<_> = kept.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, ["c", "a"]);
    }

    #[test]
    fn apply_mutates_and_accounts_together() {
        let mut messages = three_parts();
        let mut state = SessionState::new();
        let applied = apply(
            vec![result("b", 7)],
            &mut messages,
            &mut state,
            &SieveConfig::default(),
            &NoopHandler,
        );
        assert_eq!(applied.len(), 1);
        assert_eq!(messages[1].tool_parts().next().unwrap().output(), Some(DEDUP_PLACEHOLDER));
        assert!(state.pruned.contains("b"));
        assert_eq!(state.stats.total_tokens_saved, 7);
        assert_eq!(state.stats.deduplication_count, 1);
    }

    #[test]
    fn blocked_prune_is_retried_after_its_dependent_goes() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        let mut messages = Vec::new();
        for (id, tool) in [("w", "write"), ("r", "read")] {
            let input = json!({"filePath": "a.ts"});
            state.record_tool_call(&ToolExecution::completed(id, tool, input.clone(), "x"), &config);
            messages.push(Message::assistant(id).with_tool(ToolPart::completed(id, tool, input, "x")));
        }
        assert!(!state.graph.can_safely_prune("w"));

        // The read depends on the write; once the read goes, so can the write.
        let applied = apply(
            vec![
                PruneResult::new("w", "write", StrategyKind::Prune, "x", 1),
                PruneResult::new("r", "read", StrategyKind::Deduplication, "dup", 1),
            ],
            &mut messages,
            &mut state,
            &config,
            &NoopHandler,
        );
        let order: Vec<_> = applied.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(order, ["r", "w"]);
        assert!(state.graph.is_pruned("w"));
    }

    #[test]
    fn apply_rejects_unsafe_protected_and_repeated() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state.record_tool_call(
            &ToolExecution::completed("w", "write", json!({"filePath": "a.ts"}), "x"),
            &config,
        );
        state.record_tool_call(
            &ToolExecution::completed("r", "read", json!({"filePath": "a.ts"}), "contents"),
            &config,
        );
        state.pruned.insert("c".into());
        let mut messages = vec![
            Message::assistant("m1")
                .with_tool(ToolPart::completed("w", "write", json!({"filePath": "a.ts"}), "x"))
                .with_tool(ToolPart::completed("t", "todowrite", json!({}), "[]"))
                .with_tool(ToolPart::completed("c", "bash", json!({}), "3")),
        ];
        let applied = apply(
            vec![
                PruneResult::new("w", "write", StrategyKind::Prune, "x", 1),
                PruneResult::new("t", "bash", StrategyKind::Prune, "x", 1),
                PruneResult::new("c", "bash", StrategyKind::Prune, "x", 1),
                PruneResult::new("gone", "bash", StrategyKind::Prune, "x", 1),
            ],
            &mut messages,
            &mut state,
            &config,
            &NoopHandler,
        );
        assert!(applied.is_empty());
        assert_eq!(messages[0].tool_parts().next().unwrap().output(), Some("x"));
        assert_eq!(state.stats.prune_count, 0);
    }

    #[test]
    fn second_pass_proposes_nothing_new() {
        let config = SieveConfig::default().with_cache_provider(crate::engine::config::CacheProvider::None);
        let mut state = SessionState::new();
        let mut messages = vec![Message::assistant("m1")
            .with_tool(ToolPart::completed("a", "grep", json!({"pattern": "x"}), "same"))
            .with_tool(ToolPart::completed("b", "grep", json!({"pattern": "x"}), "same"))];
        let orchestrator = Orchestrator::new();

        let first = orchestrator.run(&mut messages, &mut state, &config, &NoopHandler);
        assert_eq!(first.len(), 1);
        assert!(orchestrator.propose(&messages, &state, &config).is_empty());
        let second = orchestrator.run(&mut messages, &mut state, &config, &NoopHandler);
        assert!(second.is_empty());
    }

    #[test]
    fn manual_requests_bypass_the_cache_filter() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state
            .pending_manual
            .push(PruneResult::new("a", "bash", StrategyKind::Prune, "done with it", 1));
        let mut messages = three_parts();
        let applied = Orchestrator::new().run(&mut messages, &mut state, &config, &NoopHandler);
        assert_eq!(applied.len(), 1);
        assert_eq!(messages[0].tool_parts().next().unwrap().output(), Some(PRUNE_PLACEHOLDER));
        assert!(state.pending_manual.is_empty());
        assert_eq!(state.stats.manual_count, 1);
    }

    #[test]
    fn manual_mode_without_automatic_strategies_proposes_nothing() {
        let config = SieveConfig::default().with_manual_mode(false);
        let messages = vec![Message::assistant("m1")
            .with_tool(ToolPart::completed("a", "grep", json!({"pattern": "x"}), "same"))
            .with_tool(ToolPart::completed("b", "grep", json!({"pattern": "x"}), "same"))];
        let proposals = Orchestrator::new().propose(&messages, &SessionState::new(), &config);
        assert!(proposals.is_empty());

        let automatic = SieveConfig::default().with_manual_mode(true);
        let proposals = Orchestrator::new().propose(&messages, &SessionState::new(), &automatic);
        assert_eq!(proposals.len(), 1);
    }
}
