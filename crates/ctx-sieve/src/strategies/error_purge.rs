//! Error purge: once a failed call is old enough, its verbose input is
//! dropped. The error text itself stays.

use super::{PruneResult, ScanContext, Strategy, StrategyKind};
use crate::context::budget::estimate_json_tokens;
use crate::engine::config::SieveConfig;

/// Inputs at or below this estimate aren't worth purging.
pub const MIN_INPUT_TOKENS: usize = 50;

pub struct ErrorPurge;

impl Strategy for ErrorPurge {
    fn name(&self) -> &'static str {
        "error-purge"
    }

    fn enabled(&self, config: &SieveConfig) -> bool {
        config.strategies.purge_errors.enabled
    }

    fn scan(&self, cx: &ScanContext<'_>) -> Vec<PruneResult> {
        let purge = &cx.config.strategies.purge_errors.config;
        let mut results = Vec::new();

        for (_, tp) in cx.tool_parts() {
            if tp.error().is_none()
                || cx.config.is_protected_tool(&tp.tool)
                || purge.protected_tools.iter().any(|t| *t == tp.tool)
                || cx.is_pruned(&tp.id)
            {
                continue;
            }
            // Age is only known for calls the session saw execute.
            let Some(record) = cx.state.tool_calls.get(&tp.id) else {
                continue;
            };
            let age = cx.state.turn.saturating_sub(record.turn);
            if age < purge.turns {
                continue;
            }
            let input_tokens = estimate_json_tokens(tp.input());
            if input_tokens <= MIN_INPUT_TOKENS {
                continue;
            }
            results.push(PruneResult::new(
                &tp.id,
                &tp.tool,
                StrategyKind::ErrorPurge,
                format!("Error input pruned after {age} turns"),
                input_tokens,
            ));
        }
        results
    }
}
