//! Convenience re-exports for common `ctx-sieve` types.
//!
//! Meant to be glob-imported by hosts embedding the engine:
//!
//! ```ignore
//! use ctx_sieve::prelude::*;
//! ```
//!
//! Strategy internals, the dependency graph, and the summarizer are left
//! out; import those from their modules when needed.

// ── Conversation model ──────────────────────────────────────────────
pub use crate::{Message, Part, Role, TextPart, ToolPart, ToolState, json_schema_for};

// ── Engine ──────────────────────────────────────────────────────────
pub use crate::engine::{
    CompositeEventHandler, ContextManager, EventHandler, FileMemorySink, FnEventHandler,
    LogNotifier, LoggingHandler, MemorySink, NoopHandler, NotificationSink, SessionMemory,
    SessionStats, SieveConfig, SieveEvent, ToolExecution, TransformOutcome,
};

// ── Context ─────────────────────────────────────────────────────────
pub use crate::context::{ContextBreakdown, ContextUsage, ModelInfo};

// ── Strategies ──────────────────────────────────────────────────────
pub use crate::strategies::{PruneResult, Strategy, StrategyKind};
