//! Cross-session memory.
//!
//! At idle time the manager folds the finished session into a
//! [`SessionMemory`] and hands it to a [`MemorySink`]. The file-backed sink
//! writes `memory.json` atomically (temp file + rename), so a crash mid-write
//! leaves the previous memory intact.

use crate::engine::SinkFuture;
use crate::engine::config::SieveConfig;
use crate::engine::session::SessionState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What the engine learned across sessions of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionMemory {
    /// Accesses per file path, summed over sessions.
    pub hot_files: BTreeMap<String, u64>,
    /// Prunes per tool name, summed over sessions.
    pub frequently_pruned: BTreeMap<String, u64>,
    pub session_count: u64,
    /// Running mean of tokens saved per session.
    pub avg_tokens_saved: f64,
    /// Running mean of applied prunes per session.
    pub avg_prune_count: f64,
    /// RFC 3339 timestamp of the last update.
    pub last_updated: String,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self {
            hot_files: BTreeMap::new(),
            frequently_pruned: BTreeMap::new(),
            session_count: 0,
            avg_tokens_saved: 0.0,
            avg_prune_count: 0.0,
            last_updated: Utc::now().to_rfc3339(),
        }
    }
}

impl SessionMemory {
    /// Fold one session into the running totals.
    pub fn absorb(&mut self, state: &SessionState, config: &SieveConfig) {
        let n = self.session_count as f64;
        self.avg_tokens_saved =
            (self.avg_tokens_saved * n + state.stats.total_tokens_saved as f64) / (n + 1.0);
        self.avg_prune_count =
            (self.avg_prune_count * n + state.stats.prune_count as f64) / (n + 1.0);
        self.session_count += 1;

        for (path, access) in state.file_history.iter() {
            *self.hot_files.entry(path.to_string()).or_default() += access.total() as u64;
        }

        if config.memory.learn_prune_patterns {
            for node in state.graph.nodes().filter(|n| n.pruned) {
                if let Some(tool) = &node.tool {
                    *self.frequently_pruned.entry(tool.clone()).or_default() += 1;
                }
            }
        }

        self.last_updated = Utc::now().to_rfc3339();
    }

    /// The `limit` most accessed files, most accessed first.
    pub fn hottest_files(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut files: Vec<(&str, u64)> = self
            .hot_files
            .iter()
            .map(|(path, count)| (path.as_str(), *count))
            .collect();
        files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        files.truncate(limit);
        files
    }
}

// ── Sinks ──────────────────────────────────────────────────────────

/// Where cross-session memory is loaded from and persisted to.
pub trait MemorySink: Send + Sync {
    /// Previously persisted memory, or `None` when there is none yet.
    fn load(&self) -> SinkFuture<'_, Option<SessionMemory>>;

    fn persist<'a>(&'a self, memory: &'a SessionMemory) -> SinkFuture<'a, ()>;
}

/// Stores memory as pretty-printed JSON at a fixed path.
pub struct FileMemorySink {
    path: PathBuf,
}

impl FileMemorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The memory file configured for the project at `root`.
    pub fn for_project(config: &SieveConfig, root: &Path) -> Self {
        Self::new(config.memory_file(root))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MemorySink for FileMemorySink {
    fn load(&self) -> SinkFuture<'_, Option<SessionMemory>> {
        Box::pin(async move {
            let raw = match tokio::fs::read_to_string(&self.path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(format!("Failed to read memory: {e}")),
            };
            serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| format!("Failed to parse memory: {e}"))
        })
    }

    fn persist<'a>(&'a self, memory: &'a SessionMemory) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| format!("Failed to create memory dir: {e}"))?;

            let tmp_path = dir.join(".memory.json.tmp");
            let json = serde_json::to_string_pretty(memory)
                .map_err(|e| format!("Failed to serialize memory: {e}"))?;
            tokio::fs::write(&tmp_path, json)
                .await
                .map_err(|e| format!("Failed to write temp memory: {e}"))?;
            tokio::fs::rename(&tmp_path, &self.path)
                .await
                .map_err(|e| format!("Failed to rename memory: {e}"))?;

            debug!("Persisted memory to {}", self.path.display());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::ToolExecution;
    use crate::strategies::StrategyKind;
    use serde_json::json;

    fn session_with_prunes() -> (SessionState, SieveConfig) {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state.turn = 1;
        for id in ["r1", "r2"] {
            state.record_tool_call(
                &ToolExecution::completed(id, "read", json!({"filePath": "src/a.ts"}), "x"),
                &config,
            );
        }
        state.record_tool_call(
            &ToolExecution::completed("b1", "bash", json!({"command": "ls"}), "x"),
            &config,
        );
        state.graph.mark_pruned("r1");
        state.stats.record(StrategyKind::Deduplication, 300);
        (state, config)
    }

    #[test]
    fn absorb_keeps_running_means() {
        let (state, config) = session_with_prunes();
        let mut memory = SessionMemory {
            session_count: 1,
            avg_tokens_saved: 100.0,
            avg_prune_count: 3.0,
            ..SessionMemory::default()
        };
        memory.absorb(&state, &config);
        assert_eq!(memory.session_count, 2);
        assert_eq!(memory.avg_tokens_saved, 200.0);
        assert_eq!(memory.avg_prune_count, 2.0);
        assert_eq!(memory.hot_files.get("src/a.ts"), Some(&2));
        assert_eq!(memory.frequently_pruned.get("read"), Some(&1));
        assert!(memory.frequently_pruned.get("bash").is_none());
    }

    #[test]
    fn prune_patterns_respect_the_switch() {
        let (state, mut config) = session_with_prunes();
        config.memory.learn_prune_patterns = false;
        let mut memory = SessionMemory::default();
        memory.absorb(&state, &config);
        assert!(memory.frequently_pruned.is_empty());
        assert_eq!(memory.hot_files.get("src/a.ts"), Some(&2));
    }

    #[test]
    fn hottest_files_are_ranked() {
        let mut memory = SessionMemory::default();
        memory.hot_files.insert("a".into(), 1);
        memory.hot_files.insert("b".into(), 5);
        memory.hot_files.insert("c".into(), 5);
        assert_eq!(memory.hottest_files(2), vec![("b", 5), ("c", 5)]);
    }

    #[tokio::test]
    async fn file_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileMemorySink::new(dir.path().join("nested/data/memory.json"));
        assert_eq!(sink.load().await.unwrap(), None);

        let (state, config) = session_with_prunes();
        let mut memory = SessionMemory::default();
        memory.absorb(&state, &config);
        sink.persist(&memory).await.unwrap();

        assert!(!dir.path().join("nested/data/.memory.json.tmp").exists());
        assert_eq!(sink.load().await.unwrap(), Some(memory));
    }

    #[tokio::test]
    async fn corrupt_memory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = FileMemorySink::new(&path).load().await.unwrap_err();
        assert!(err.contains("Failed to parse memory"));
    }

    #[test]
    fn sink_for_project_uses_config_path() {
        let sink = FileMemorySink::for_project(&SieveConfig::default(), Path::new("/proj"));
        assert_eq!(sink.path(), Path::new("/proj/.sieve/data/memory.json"));
    }
}
