//! Engine events and handlers.
//!
//! The [`ContextManager`](super::manager::ContextManager) and the
//! orchestrator report what they do through [`SieveEvent`] variants.
//! Handlers observe; nothing they do feeds back into a pruning decision.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or silent embedding |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::context::ContextUsage;
use crate::strategies::PruneResult;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SieveEvent<'a> {
    /// A session was created or restarted.
    SessionStarted { session_id: &'a str },
    /// A new message advanced the turn counter.
    TurnStarted { turn: u32 },
    /// A finished tool call was recorded.
    ToolRecorded {
        tool: &'a str,
        call_id: &'a str,
        estimated_tokens: usize,
    },
    /// Strategies finished scanning.
    ProposalsReady { proposed: usize, after_filter: usize },
    /// A proposal was dropped at apply time.
    Skipped {
        result: &'a PruneResult,
        why: &'a str,
    },
    /// A prune was applied to the conversation.
    Applied { result: &'a PruneResult },
    /// A transform pass finished.
    PassCompleted {
        turn: u32,
        applied: usize,
        tokens_saved: usize,
        usage: &'a ContextUsage,
    },
    /// An advisory was produced for the model.
    Nudge { message: &'a str },
    /// History was replaced; derived state was reset.
    Compacted,
    /// A best-effort collaborator failed. The failure is not propagated.
    CollaboratorFailed { collaborator: &'a str, error: &'a str },
}

/// Observer for engine events.
///
/// # Example
///
/// ```ignore
/// struct Counter(AtomicUsize);
///
/// impl EventHandler for Counter {
///     fn on_event(&self, event: &SieveEvent<'_>) {
///         if let SieveEvent::Applied { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &SieveEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&SieveEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&SieveEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&SieveEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &SieveEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, DebugHandler::new())
///     .with_opt(metrics.map(MetricsHandler::new));
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &SieveEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Renders every event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &SieveEvent<'_>) {
        match event {
            SieveEvent::SessionStarted { session_id } => {
                info!("Session {session_id} started");
            }
            SieveEvent::TurnStarted { turn } => {
                trace!("Turn {turn}");
            }
            SieveEvent::ToolRecorded {
                tool,
                call_id,
                estimated_tokens,
            } => {
                debug!("Recorded {tool} ({call_id}): ~{estimated_tokens} tokens");
            }
            SieveEvent::ProposalsReady {
                proposed,
                after_filter,
            } => {
                debug!("{proposed} proposal(s), {after_filter} after cache filter");
            }
            SieveEvent::Skipped { result, why } => {
                warn!("Skipped {} on {}: {why}", result.strategy, result.target);
            }
            SieveEvent::Applied { result } => {
                debug!(
                    "Pruned {} ({}) via {}: {} (~{} tokens)",
                    result.target, result.tool, result.strategy, result.reason, result.tokens_saved
                );
            }
            SieveEvent::PassCompleted {
                turn,
                applied,
                tokens_saved,
                usage,
            } => {
                if *applied > 0 {
                    info!(
                        "[turn {turn}] pruned {applied} item(s), saved ~{tokens_saved} tokens; {}",
                        usage.to_log_string()
                    );
                } else {
                    debug!("[turn {turn}] nothing to prune; {}", usage.to_log_string());
                }
            }
            SieveEvent::Nudge { message } => {
                debug!("Nudge: {message}");
            }
            SieveEvent::Compacted => {
                info!("History compacted; session state reset");
            }
            SieveEvent::CollaboratorFailed {
                collaborator,
                error,
            } => {
                warn!("{collaborator} failed: {error}");
            }
        }
    }
}
