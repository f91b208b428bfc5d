//! In-place replacement of pruned tool content.
//!
//! Completed outputs are swapped for a strategy-specific placeholder (or
//! the smart-compression summary). Failed calls keep their error text and
//! lose their input instead. The placeholders are plain strings the model
//! can read; none of them carry the removed content.

use crate::strategies::{PruneResult, StrategyKind};
use crate::{ToolPart, ToolState};
use serde_json::json;

pub const PRUNE_PLACEHOLDER: &str = "[Content pruned - context optimization]";
pub const DEDUP_PLACEHOLDER: &str = "[Duplicate content removed - see latest instance]";
pub const SUPERSEDE_PLACEHOLDER: &str = "[Superseded by later file read - current state captured]";
pub const ERROR_PURGE_PLACEHOLDER: &str = "[Error input pruned after resolution]";

/// Output replacement for a completed part pruned by `result`.
pub fn replacement_for(result: &PruneResult) -> &str {
    match result.strategy {
        StrategyKind::Deduplication => DEDUP_PLACEHOLDER,
        StrategyKind::Supersede => SUPERSEDE_PLACEHOLDER,
        StrategyKind::SmartCompression => result.summary.as_deref().unwrap_or(PRUNE_PLACEHOLDER),
        _ => PRUNE_PLACEHOLDER,
    }
}

/// The marker an errored part's input is replaced with.
pub fn suppressed_input() -> serde_json::Value {
    json!({"_pruned": true, "_reason": ERROR_PURGE_PLACEHOLDER})
}

/// Apply `result` to `part`. Returns false (and leaves the part alone) for
/// pending parts.
pub fn evict_part(part: &mut ToolPart, result: &PruneResult) -> bool {
    match &mut part.state {
        ToolState::Completed { output, .. } => {
            *output = replacement_for(result).to_string();
            true
        }
        ToolState::Error { input, .. } => {
            *input = suppressed_input();
            true
        }
        ToolState::Pending { .. } => false,
    }
}
