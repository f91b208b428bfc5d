//! The decision engine: configuration, session state, arbitration, and the
//! host-facing facade.
//!
//! - [`manager::ContextManager`]: one per conversation. Start here.
//! - [`config::SieveConfig`]: thresholds, switches, protection lists.
//! - [`session`]: [`SessionState`](session::SessionState) and running
//!   [`SessionStats`](session::SessionStats).
//! - [`orchestrator`]: merges strategy proposals, applies the
//!   cache-awareness filter, and mutates the conversation.
//! - [`events`]: [`EventHandler`](events::EventHandler) and [`SieveEvent`](events::SieveEvent)
//!   for observing decisions. Includes [`LoggingHandler`](events::LoggingHandler).
//! - [`memory`]: cross-session memory and its file-backed sink.
//! - [`notify`]: notification sinks.
//! - [`report`]: statistics, context breakdown, notification and
//!   system-prompt text.
//! - [`commands`]: the `/sieve` slash command.

pub mod commands;
pub mod config;
pub mod events;
pub mod manager;
pub mod memory;
pub mod notify;
pub mod orchestrator;
pub mod report;
pub mod session;

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by the best-effort collaborator sinks.
///
/// Keeps [`MemorySink`](memory::MemorySink) and
/// [`NotificationSink`](notify::NotificationSink) dyn-compatible.
pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

pub use config::SieveConfig;
pub use events::{CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, SieveEvent};
pub use manager::{ContextManager, TransformOutcome};
pub use memory::{FileMemorySink, MemorySink, SessionMemory};
pub use notify::{CollectingNotifier, LogNotifier, NotificationSink};
pub use orchestrator::Orchestrator;
pub use session::{SessionState, SessionStats, ToolExecution};
