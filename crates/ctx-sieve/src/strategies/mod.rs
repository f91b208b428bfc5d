//! Pruning strategies.
//!
//! Each strategy scans the conversation and session state and proposes
//! [`PruneResult`]s. Strategies never mutate anything; the
//! [orchestrator](crate::engine::orchestrator) arbitrates and applies.
//!
//! The default pipeline runs in a fixed priority order:
//!
//! 1. [`dedup::ExactDedup`]: identical tool + arguments, keep the latest.
//! 2. [`fuzzy::FuzzyDedup`]: near-identical outputs of the same tool.
//! 3. [`supersede::SupersedeWrites`]: writes followed by a fresh read.
//! 4. [`error_purge::ErrorPurge`]: verbose inputs of old failed calls.
//! 5. [`smart_compression::SmartCompression`]: structural summaries of
//!    large, low-importance outputs.
//!
//! An item proposed by an earlier strategy wins over later proposals for
//! the same content.

pub mod dedup;
pub mod error_purge;
pub mod fuzzy;
pub mod smart_compression;
pub mod supersede;

use crate::context::similarity::SimilarityEngine;
use crate::engine::config::SieveConfig;
use crate::engine::session::SessionState;
use crate::{Message, ToolPart};
use serde::{Deserialize, Serialize};

/// Which strategy (or manual operation) produced a prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Deduplication,
    Supersede,
    ErrorPurge,
    SmartCompression,
    Manual,
    Distill,
    Compress,
    Prune,
}

impl StrategyKind {
    /// Explicit requests made through the manual tools.
    pub fn is_manual(self) -> bool {
        matches!(
            self,
            StrategyKind::Manual | StrategyKind::Distill | StrategyKind::Compress | StrategyKind::Prune
        )
    }

    /// Human-readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Deduplication => "Deduplication",
            StrategyKind::Supersede => "Supersede writes",
            StrategyKind::ErrorPurge => "Error purges",
            StrategyKind::SmartCompression => "Smart compression",
            StrategyKind::Manual => "Manual",
            StrategyKind::Distill => "Distill",
            StrategyKind::Compress => "Compress",
            StrategyKind::Prune => "Prune",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyKind::Deduplication => "deduplication",
            StrategyKind::Supersede => "supersede",
            StrategyKind::ErrorPurge => "error-purge",
            StrategyKind::SmartCompression => "smart-compression",
            StrategyKind::Manual => "manual",
            StrategyKind::Distill => "distill",
            StrategyKind::Compress => "compress",
            StrategyKind::Prune => "prune",
        };
        f.write_str(s)
    }
}

/// A proposed or applied prune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneResult {
    /// Content identity of the target part.
    pub target: String,
    pub tool: String,
    pub reason: String,
    pub tokens_saved: usize,
    pub strategy: StrategyKind,
    /// Replacement text for summarizing strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl PruneResult {
    pub fn new(
        target: impl Into<String>,
        tool: impl Into<String>,
        strategy: StrategyKind,
        reason: impl Into<String>,
        tokens_saved: usize,
    ) -> Self {
        Self {
            target: target.into(),
            tool: tool.into(),
            reason: reason.into(),
            tokens_saved,
            strategy,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Read-only view handed to every strategy during one pass.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub messages: &'a [Message],
    pub state: &'a SessionState,
    pub config: &'a SieveConfig,
    pub similarity: &'a SimilarityEngine,
}

impl<'a> ScanContext<'a> {
    /// Tool parts in conversation order, with the index of their message.
    pub fn tool_parts(&self) -> impl Iterator<Item = (usize, &'a ToolPart)> + 'a {
        self.messages
            .iter()
            .enumerate()
            .flat_map(|(mi, msg)| msg.tool_parts().map(move |tp| (mi, tp)))
    }

    /// Completed tool parts with their output.
    pub fn completed(&self) -> impl Iterator<Item = (usize, &'a ToolPart, &'a str)> + 'a {
        self.tool_parts()
            .filter_map(|(mi, tp)| tp.output().map(|out| (mi, tp, out)))
    }

    pub fn is_pruned(&self, id: &str) -> bool {
        self.state.pruned.contains(id)
    }

    /// Turn a piece of content was produced at. Content the session has no
    /// record of counts as produced now.
    pub fn content_turn(&self, id: &str) -> u32 {
        self.state
            .tool_calls
            .get(id)
            .map_or(self.state.turn, |r| r.turn)
    }

    pub fn is_turn_protected(&self, id: &str) -> bool {
        self.config
            .is_turn_protected(self.content_turn(id), self.state.turn)
    }
}

/// One pruning analyzer.
pub trait Strategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether the strategy runs under `config`.
    fn enabled(&self, config: &SieveConfig) -> bool;

    /// Propose prunes. Must not propose already-pruned or protected content.
    fn scan(&self, cx: &ScanContext<'_>) -> Vec<PruneResult>;
}

/// The automatic strategies in priority order.
pub fn default_pipeline() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(dedup::ExactDedup),
        Box::new(fuzzy::FuzzyDedup),
        Box::new(supersede::SupersedeWrites),
        Box::new(error_purge::ErrorPurge),
        Box::new(smart_compression::SmartCompression),
    ]
}
