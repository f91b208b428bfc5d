//! Configuration for the pruning engine.
//!
//! Every strategy is **enabled by default** with conservative thresholds.
//! Configuration is an immutable snapshot handed to every component; build
//! it in code with the builder methods, or load a partial JSON override with
//! [`SieveConfig::load()`]. Omitted keys keep their defaults at every level
//! of nesting, so an override file only needs the values it changes.
//!
//! # Examples
//!
//! Defaults:
//!
//! ```
//! use ctx_sieve::engine::config::SieveConfig;
//!
//! let config = SieveConfig::default();
//! assert!(config.strategies.deduplication.enabled);
//! ```
//!
//! Partial JSON override:
//!
//! ```
//! use ctx_sieve::engine::config::SieveConfig;
//!
//! let config = SieveConfig::from_json_str(
//!     r#"{ "strategies": { "deduplication": { "fuzzy_threshold": 0.8 } } }"#,
//! ).unwrap();
//! assert_eq!(config.strategies.deduplication.config.fuzzy_threshold, 0.8);
//! assert!(config.strategies.purge_errors.enabled);
//! ```
//!
//! Builder methods:
//!
//! ```
//! use ctx_sieve::engine::config::SieveConfig;
//!
//! let config = SieveConfig::default()
//!     .with_turn_protection(3)
//!     .protect_tool("webfetch")
//!     .protect_files(["**/*.env"]);
//! assert!(config.is_protected_tool("webfetch"));
//! ```

use crate::context::budget::DEFAULT_CONTEXT_LIMIT;
use crate::tools::names;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ── Generic toggle ────────────────────────────────────────────────

/// Generic enabled/disabled wrapper for strategy configurations.
///
/// Captures the common pattern of `{ enabled: bool, config: T }`. When
/// `enabled` is `false`, the strategy is skipped regardless of the inner
/// config values. In JSON the inner fields sit next to `enabled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Toggle<T: Default> {
    /// Whether this strategy is active.
    pub enabled: bool,
    /// Strategy-specific configuration.
    #[serde(flatten)]
    pub config: T,
}

impl<T: Default> Toggle<T> {
    /// Create a disabled instance with default inner config.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            config: T::default(),
        }
    }
}

impl<T: Default> Default for Toggle<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            config: T::default(),
        }
    }
}

// ── Strategy configs ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Similarity (0–1) at or above which two outputs of the same tool are
    /// near-duplicates. `1.0` or more disables fuzzy matching.
    pub fuzzy_threshold: f64,
    /// Tools exempt from exact and fuzzy deduplication.
    pub protected_tools: Vec<String>,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.92,
            protected_tools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SupersedeConfig {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ErrorPurgeConfig {
    /// Age in turns at which an errored call's input is purged.
    pub turns: u32,
    /// Tools exempt from error purging.
    pub protected_tools: Vec<String>,
}

impl Default for ErrorPurgeConfig {
    fn default() -> Self {
        Self {
            turns: 4,
            protected_tools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SmartCompressionConfig {
    /// Minimum output length in characters before compression is considered.
    pub min_length: usize,
    /// Summarize code, JSON, and Markdown structurally. When `false`, every
    /// output gets the generic prefix summary.
    pub preserve_structure: bool,
}

impl Default for SmartCompressionConfig {
    fn default() -> Self {
        Self {
            min_length: 2000,
            preserve_structure: true,
        }
    }
}

/// Per-strategy switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct StrategiesConfig {
    pub deduplication: Toggle<DeduplicationConfig>,
    pub supersede_writes: Toggle<SupersedeConfig>,
    pub purge_errors: Toggle<ErrorPurgeConfig>,
    pub smart_compression: Toggle<SmartCompressionConfig>,
}

// ── Protection, manual mode ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TurnProtectionConfig {
    pub enabled: bool,
    /// Content at most this many turns old is never pruned.
    pub turns: u32,
}

impl Default for TurnProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            turns: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ManualModeConfig {
    /// Start sessions in manual mode.
    pub enabled: bool,
    /// In manual mode, still run the cheap automatic strategies (everything
    /// except smart compression). When `false`, manual mode disables all of
    /// them.
    pub automatic_strategies: bool,
}

impl Default for ManualModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            automatic_strategies: true,
        }
    }
}

// ── Manual tools and nudges ───────────────────────────────────────

/// Whether an LLM-facing manual tool is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolPermission {
    Allow,
    Ask,
    Deny,
}

/// A context limit: an absolute token count or a percentage of the model's
/// window such as `"80%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ContextLimit {
    Tokens(usize),
    Relative(String),
}

impl Default for ContextLimit {
    fn default() -> Self {
        ContextLimit::Tokens(DEFAULT_CONTEXT_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ToolsConfig {
    pub nudge_enabled: bool,
    /// Tool results between nudges.
    pub nudge_frequency: u32,
    /// Context window used for the high-usage nudge.
    pub context_limit: ContextLimit,
    /// Per-model overrides keyed by `provider/model`.
    pub model_limits: BTreeMap<String, ContextLimit>,
    pub distill: ToolPermission,
    pub compress: ToolPermission,
    pub prune: ToolPermission,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            nudge_enabled: true,
            nudge_frequency: 10,
            context_limit: ContextLimit::default(),
            model_limits: BTreeMap::new(),
            distill: ToolPermission::Allow,
            compress: ToolPermission::Deny,
            prune: ToolPermission::Allow,
        }
    }
}

// ── Scoring, memory, cache awareness ──────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SemanticConfig {
    /// Master switch for dependency analysis.
    pub enabled: bool,
    /// Build write→read and read→write edges between calls on the same file.
    pub track_dependencies: bool,
    /// Importance lost per turn of age, as a fraction of 100.
    pub decay_rate: f64,
    /// Live content scoring below this floor is reported as prunable in nudges.
    pub min_importance_to_keep: u32,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_dependencies: true,
            decay_rate: 0.05,
            min_importance_to_keep: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MemoryConfig {
    pub enabled: bool,
    /// Directory holding `memory.json`, relative to the project root.
    pub persist_path: PathBuf,
    /// Count pruned tools into the cross-session memory.
    pub learn_prune_patterns: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist_path: PathBuf::from(".sieve/data"),
            learn_prune_patterns: true,
        }
    }
}

/// Prompt-caching behavior of the model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CacheProvider {
    /// Assume the provider caches prompt prefixes.
    Auto,
    Anthropic,
    Openai,
    /// No prefix caching; the cache-awareness filter is skipped.
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CacheAwarenessConfig {
    pub enabled: bool,
    pub provider: CacheProvider,
    /// Proposals saving fewer estimated tokens than this are dropped.
    pub min_net_savings: usize,
}

impl Default for CacheAwarenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: CacheProvider::Auto,
            min_net_savings: 500,
        }
    }
}

impl CacheAwarenessConfig {
    /// Whether the net-savings filter and prefix-preserving sort apply.
    pub fn is_active(&self) -> bool {
        self.enabled && self.provider != CacheProvider::None
    }
}

// ── Notifications ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Off,
    Minimal,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Chat,
    Toast,
}

// ── Main config ───────────────────────────────────────────────────

/// Merged configuration snapshot for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SieveConfig {
    /// Master switch. When `false`, transforms are no-ops.
    pub enabled: bool,
    /// Raise the CLI log level to `debug`.
    pub debug: bool,
    pub prune_notification: NotificationLevel,
    pub notification_channel: NotificationChannel,
    pub manual_mode: ManualModeConfig,
    pub turn_protection: TurnProtectionConfig,
    /// Glob patterns for files whose content is never pruned.
    pub protected_file_patterns: Vec<String>,
    /// Tool names protected from every strategy, on top of the built-in list.
    pub protected_tools: Vec<String>,
    pub tools: ToolsConfig,
    pub strategies: StrategiesConfig,
    pub semantic: SemanticConfig,
    pub memory: MemoryConfig,
    pub cache_awareness: CacheAwarenessConfig,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            prune_notification: NotificationLevel::Detailed,
            notification_channel: NotificationChannel::Chat,
            manual_mode: ManualModeConfig::default(),
            turn_protection: TurnProtectionConfig::default(),
            protected_file_patterns: Vec::new(),
            protected_tools: Vec::new(),
            tools: ToolsConfig::default(),
            strategies: StrategiesConfig::default(),
            semantic: SemanticConfig::default(),
            memory: MemoryConfig::default(),
            cache_awareness: CacheAwarenessConfig::default(),
        }
    }
}

impl SieveConfig {
    // ── Loading ───────────────────────────────────────────────────

    /// Parse a (possibly partial) JSON override onto the defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("Failed to parse config: {e}"))
    }

    /// Load a config file. A missing file yields the defaults; an unreadable
    /// or unparsable one logs a warning and yields the defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read config {}: {e}; using defaults", path.display());
                return Self::default();
            }
        };
        match Self::from_json_str(&raw) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{e} ({}); using defaults", path.display());
                Self::default()
            }
        }
    }

    /// JSON Schema describing the config file format.
    pub fn json_schema() -> serde_json::Value {
        crate::json_schema_for::<Self>()
    }

    /// Validate a raw config document against [`json_schema()`](Self::json_schema).
    ///
    /// Returns one human-readable line per violation; empty means valid.
    pub fn validate_json(value: &serde_json::Value) -> Vec<String> {
        let schema = Self::json_schema();
        let validator = match jsonschema::validator_for(&schema) {
            Ok(v) => v,
            Err(e) => return vec![format!("invalid config schema: {e}")],
        };
        validator
            .iter_errors(value)
            .map(|e| format!("{}: {e}", e.instance_path()))
            .collect()
    }

    // ── Builder methods ───────────────────────────────────────────
    //
    // Only the settings callers routinely customise get builder methods.
    // Everything else is a public field.

    /// Set the fuzzy deduplication threshold. `1.0` disables fuzzy matching.
    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.strategies.deduplication.config.fuzzy_threshold = threshold;
        self
    }

    /// Enable turn protection for content at most `turns` turns old.
    pub fn with_turn_protection(mut self, turns: u32) -> Self {
        self.turn_protection = TurnProtectionConfig {
            enabled: true,
            turns,
        };
        self
    }

    /// Protect a tool name from every strategy.
    pub fn protect_tool(mut self, name: impl Into<String>) -> Self {
        self.protected_tools.push(name.into());
        self
    }

    /// Protect files matching the given glob patterns.
    pub fn protect_files<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_file_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Start sessions in manual mode.
    pub fn with_manual_mode(mut self, automatic_strategies: bool) -> Self {
        self.manual_mode = ManualModeConfig {
            enabled: true,
            automatic_strategies,
        };
        self
    }

    pub fn with_cache_provider(mut self, provider: CacheProvider) -> Self {
        self.cache_awareness.provider = provider;
        self
    }

    pub fn with_min_net_savings(mut self, tokens: usize) -> Self {
        self.cache_awareness.min_net_savings = tokens;
        self
    }

    /// Set the minimum output length considered by smart compression.
    pub fn with_min_compress_length(mut self, chars: usize) -> Self {
        self.strategies.smart_compression.config.min_length = chars;
        self
    }

    // ── Queries ───────────────────────────────────────────────────

    /// Whether `tool` is protected from every strategy: the built-in list
    /// plus the configured global list.
    pub fn is_protected_tool(&self, tool: &str) -> bool {
        names::is_builtin_protected(tool) || self.protected_tools.iter().any(|t| t == tool)
    }

    /// Whether content produced at `content_turn` is inside the
    /// turn-protection window at `current_turn`.
    pub fn is_turn_protected(&self, content_turn: u32, current_turn: u32) -> bool {
        self.turn_protection.enabled
            && current_turn.saturating_sub(content_turn) <= self.turn_protection.turns
    }

    /// Whether file-based dependency edges are built.
    pub fn tracks_dependencies(&self) -> bool {
        self.semantic.enabled && self.semantic.track_dependencies
    }

    /// Whether a manual tool is offered to the model.
    pub fn offers(&self, permission: ToolPermission) -> bool {
        permission != ToolPermission::Deny
    }

    /// Path of the persisted cross-session memory under `root`.
    pub fn memory_file(&self, root: &Path) -> PathBuf {
        root.join(&self.memory.persist_path).join("memory.json")
    }
}
