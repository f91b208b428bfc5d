//! Leaf engines the strategies are built on.
//!
//! Nothing in here mutates a conversation except [`eviction`], and only
//! when the orchestrator asks it to.
//!
//! 1. **[`budget`]**: character-based token estimates, context limit
//!    resolution, usage breakdowns and nudge advisories.
//!
//! 2. **[`similarity`]**: trigram Dice similarity with a bounded FIFO cache.
//!
//! 3. **[`scoring`]**: importance score and category of a content unit.
//!
//! 4. **[`graph`]**: dependency graph over tool calls touching the same
//!    file, with the safety predicate strategies consult before removal.
//!
//! 5. **[`file_tracker`]**: per-file access history, path extraction,
//!    protected-file globs.
//!
//! 6. **[`summarizer`]**: structural summaries for smart compression.
//!
//! 7. **[`eviction`]**: placeholders and in-place replacement of pruned
//!    tool content.

pub mod budget;
pub mod eviction;
pub mod file_tracker;
pub mod graph;
pub mod scoring;
pub mod similarity;
pub mod summarizer;

pub use budget::{CHARS_PER_TOKEN, ContextBreakdown, ContextUsage, ModelInfo, estimate_tokens};
pub use graph::{DependencyGraph, DependencyNode};
pub use scoring::{ContentCategory, ContentScore};
pub use similarity::SimilarityEngine;
