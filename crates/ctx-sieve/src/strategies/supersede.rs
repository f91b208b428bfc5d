//! Supersede writes: a fresh read of a file makes earlier write output
//! redundant, since the read captured the file's current state.

use super::{PruneResult, ScanContext, Strategy, StrategyKind};
use crate::context::budget::estimate_tokens;
use crate::context::file_tracker::{basename, extract_file_path, is_protected_file};
use crate::engine::config::SieveConfig;
use crate::tools::names::ToolKind;
use std::collections::HashMap;

pub struct SupersedeWrites;

impl Strategy for SupersedeWrites {
    fn name(&self) -> &'static str {
        "supersede"
    }

    fn enabled(&self, config: &SieveConfig) -> bool {
        config.strategies.supersede_writes.enabled
    }

    fn scan(&self, cx: &ScanContext<'_>) -> Vec<PruneResult> {
        // Path → index of the last message holding a completed read of it.
        let mut latest_read: HashMap<String, usize> = HashMap::new();
        for (mi, tp, _) in cx.completed() {
            if ToolKind::of(&tp.tool) != ToolKind::FileRead {
                continue;
            }
            if let Some(path) = extract_file_path(&tp.tool, tp.input()) {
                latest_read.insert(path, mi);
            }
        }

        let mut results = Vec::new();
        for (mi, tp, output) in cx.completed() {
            if ToolKind::of(&tp.tool) != ToolKind::FileWrite
                || cx.config.is_protected_tool(&tp.tool)
                || cx.is_pruned(&tp.id)
            {
                continue;
            }
            let Some(path) = extract_file_path(&tp.tool, tp.input()) else {
                continue;
            };
            if is_protected_file(&path, &cx.config.protected_file_patterns) {
                continue;
            }
            if !latest_read.get(&path).is_some_and(|&ri| ri > mi) {
                continue;
            }
            if cx.is_turn_protected(&tp.id) {
                continue;
            }
            // Anything other than later reads of the same file still needs
            // this write.
            if cx.config.tracks_dependencies() && !cx.state.graph.is_superseded_by_reads(&tp.id) {
                continue;
            }
            results.push(PruneResult::new(
                &tp.id,
                &tp.tool,
                StrategyKind::Supersede,
                format!("File {} was subsequently re-read", basename(&path)),
                estimate_tokens(output),
            ));
        }
        results
    }
}
