//! The [`ContextManager`] facade.
//!
//! One manager serves one conversation. The host forwards lifecycle and
//! tool-execution notifications, calls [`ContextManager::transform`] with
//! the conversation before every model call, and dispatches the manual
//! tools and the `/sieve` command through it.
//!
//! ```ignore
//! let mut manager = ContextManager::new(config)
//!     .with_handler(LoggingHandler)
//!     .with_memory_sink(FileMemorySink::for_project(&config, &root))
//!     .with_notification_sink(LogNotifier);
//! manager.load_memory().await;
//!
//! manager.on_session_created("s1");
//! manager.on_message(Some(model));
//! manager.on_tool_executed(exec);
//! let outcome = manager.transform(&mut messages);
//! manager.on_idle().await;
//! ```

use crate::Message;
use crate::Role;
use crate::ToolState;
use crate::context::budget::{ContextBreakdown, ContextUsage, ModelInfo, nudge_message};
use crate::engine::commands::{self, SieveCommand};
use crate::engine::config::{NotificationChannel, SieveConfig};
use crate::engine::events::{EventHandler, LoggingHandler, SieveEvent};
use crate::engine::memory::{MemorySink, SessionMemory};
use crate::engine::notify::NotificationSink;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::report;
use crate::engine::session::{SessionState, SessionStats, ToolExecution};
use crate::strategies::PruneResult;
use crate::tools::manual::{self, ManualToolDef};
use tracing::debug;

/// What one [`transform`](ContextManager::transform) pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    /// Prunes applied to the conversation, in application order.
    pub applied: Vec<PruneResult>,
    /// Advisory for the model, when one is due.
    pub nudge: Option<String>,
    /// Prune notification at the configured level.
    pub notification: Option<String>,
    /// Estimated usage after the pass.
    pub usage: ContextUsage,
}

impl TransformOutcome {
    pub fn tokens_saved(&self) -> usize {
        self.applied.iter().map(|r| r.tokens_saved).sum()
    }
}

pub struct ContextManager {
    config: SieveConfig,
    state: SessionState,
    orchestrator: Orchestrator,
    handler: Box<dyn EventHandler>,
    memory_sink: Option<Box<dyn MemorySink>>,
    notifier: Option<Box<dyn NotificationSink>>,
    /// Memory as loaded at startup; each idle persists it plus this session.
    memory: SessionMemory,
    /// Notifications waiting for the next idle.
    outbox: Vec<String>,
}

impl ContextManager {
    /// A manager with the default pipeline that logs through `tracing`.
    pub fn new(config: SieveConfig) -> Self {
        Self {
            config,
            state: SessionState::new(),
            orchestrator: Orchestrator::new(),
            handler: Box::new(LoggingHandler),
            memory_sink: None,
            notifier: None,
            memory: SessionMemory::default(),
            outbox: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_memory_sink(mut self, sink: impl MemorySink + 'static) -> Self {
        self.memory_sink = Some(Box::new(sink));
        self
    }

    pub fn with_notification_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.notifier = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &SieveConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.state.stats
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn is_manual(&self) -> bool {
        self.state.is_manual(&self.config)
    }

    /// Switch manual mode on or off, or toggle it with `None`. Returns the
    /// new setting.
    pub fn set_manual_mode(&mut self, on: Option<bool>) -> bool {
        self.state.manual_mode = on.unwrap_or(!self.state.manual_mode);
        self.state.manual_mode
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Load cross-session memory from the sink. Failures are reported and
    /// leave the empty memory in place.
    pub async fn load_memory(&mut self) {
        if !self.config.memory.enabled {
            return;
        }
        let Some(sink) = self.memory_sink.as_deref() else {
            return;
        };
        match sink.load().await {
            Ok(Some(memory)) => {
                debug!("Loaded memory of {} session(s)", memory.session_count);
                self.memory = memory;
            }
            Ok(None) => {}
            Err(e) => self.handler.on_event(&SieveEvent::CollaboratorFailed {
                collaborator: "memory",
                error: &e,
            }),
        }
    }

    pub fn on_session_created(&mut self, session_id: &str) {
        self.state.start(session_id);
        self.outbox.clear();
        self.handler
            .on_event(&SieveEvent::SessionStarted { session_id });
    }

    /// A new message arrived: advance the turn and remember the model.
    pub fn on_message(&mut self, model: Option<ModelInfo>) {
        self.state.turn += 1;
        if let Some(model) = model {
            self.state.model = Some(model);
        }
        self.handler.on_event(&SieveEvent::TurnStarted {
            turn: self.state.turn,
        });
    }

    pub fn on_tool_executed(&mut self, exec: ToolExecution) {
        self.state.record_tool_call(&exec, &self.config);
        let estimated_tokens = self
            .state
            .graph
            .get(&exec.call_id)
            .map_or(0, |n| n.estimated_tokens);
        self.handler.on_event(&SieveEvent::ToolRecorded {
            tool: &exec.tool,
            call_id: &exec.call_id,
            estimated_tokens,
        });
    }

    /// The host replaced the history. Session state starts over; the final
    /// statistics are logged first.
    pub fn on_compacted(&mut self) {
        debug!("{}", report::format_stats(&self.state));
        self.state.reset_for_compaction();
        self.outbox.clear();
        self.handler.on_event(&SieveEvent::Compacted);
    }

    /// Persist memory and deliver pending notifications. Both run
    /// concurrently and are best effort: failures are reported as
    /// [`SieveEvent::CollaboratorFailed`] and otherwise ignored.
    pub async fn on_idle(&mut self) {
        debug!("{}", report::format_stats(&self.state));

        let snapshot = (self.config.memory.enabled && self.memory_sink.is_some()).then(|| {
            let mut memory = self.memory.clone();
            memory.absorb(&self.state, &self.config);
            memory
        });
        let text = self.idle_notification();

        let persist = async {
            match (self.memory_sink.as_deref(), snapshot.as_ref()) {
                (Some(sink), Some(memory)) => sink.persist(memory).await,
                _ => Ok(()),
            }
        };
        let notify = async {
            match (self.notifier.as_deref(), text.as_deref()) {
                (Some(sink), Some(text)) => sink.notify(text).await,
                _ => Ok(()),
            }
        };
        let (persisted, notified) = futures::future::join(persist, notify).await;

        if let Err(e) = persisted {
            self.handler.on_event(&SieveEvent::CollaboratorFailed {
                collaborator: "memory",
                error: &e,
            });
        }
        if let Err(e) = notified {
            self.handler.on_event(&SieveEvent::CollaboratorFailed {
                collaborator: "notifications",
                error: &e,
            });
        }
    }

    /// Chat: every queued pass notification. Toast: one session summary.
    fn idle_notification(&mut self) -> Option<String> {
        let queued = std::mem::take(&mut self.outbox);
        match self.config.notification_channel {
            NotificationChannel::Chat => (!queued.is_empty()).then(|| queued.join("\n\n")),
            NotificationChannel::Toast => {
                let stats = &self.state.stats;
                (stats.prune_count > 0).then(|| {
                    format!(
                        "sieve: {} prunes, ~{} tokens saved",
                        stats.prune_count, stats.total_tokens_saved
                    )
                })
            }
        }
    }

    /// Rebuild session state from a recorded transcript: each user message
    /// advances the turn, each finished tool part is recorded at the
    /// current turn. Parts already recorded are skipped.
    pub fn replay(&mut self, messages: &[Message]) {
        for msg in messages {
            if msg.role == Role::User {
                self.on_message(None);
            }
            for part in msg.tool_parts() {
                if self.state.tool_calls.contains_key(&part.id) {
                    continue;
                }
                let exec = match &part.state {
                    ToolState::Completed { input, output } => {
                        ToolExecution::completed(&part.id, &part.tool, input.clone(), output)
                    }
                    ToolState::Error { input, error } => {
                        ToolExecution::errored(&part.id, &part.tool, input.clone(), error)
                    }
                    ToolState::Pending { .. } => continue,
                };
                self.on_tool_executed(exec);
            }
        }
    }

    // ── Pruning ────────────────────────────────────────────────────

    /// Run one pruning pass over `messages`, mutating pruned parts in place.
    pub fn transform(&mut self, messages: &mut [Message]) -> TransformOutcome {
        let applied = if self.config.enabled {
            self.orchestrator.run(
                messages,
                &mut self.state,
                &self.config,
                self.handler.as_ref(),
            )
        } else {
            Vec::new()
        };

        let nudge = self.take_nudge();
        if let Some(message) = &nudge {
            self.handler.on_event(&SieveEvent::Nudge { message });
        }

        let notification = report::prune_notification(self.config.prune_notification, &applied);
        if let Some(text) = &notification {
            self.outbox.push(text.clone());
        }

        let usage = self.state.usage(&self.config);
        let outcome = TransformOutcome {
            applied,
            nudge,
            notification,
            usage,
        };
        self.handler.on_event(&SieveEvent::PassCompleted {
            turn: self.state.turn,
            applied: outcome.applied.len(),
            tokens_saved: outcome.tokens_saved(),
            usage: &outcome.usage,
        });
        outcome
    }

    /// An advisory once `nudge_frequency` tool results arrived since the
    /// last one. Never in manual mode.
    fn take_nudge(&mut self) -> Option<String> {
        let tools = &self.config.tools;
        if !tools.nudge_enabled
            || self.is_manual()
            || self.state.tool_results_since_nudge < tools.nudge_frequency
        {
            return None;
        }
        self.state.tool_results_since_nudge = 0;
        self.state.stats.nudges_sent += 1;
        Some(nudge_message(
            &self.state.usage(&self.config),
            self.state.stale_count(&self.config),
        ))
    }

    // ── Model-facing surface ───────────────────────────────────────

    /// System-prompt addition advertising the manual tools.
    pub fn system_prompt(&self) -> Option<String> {
        report::system_prompt_addition(&self.state, &self.config)
    }

    pub fn tool_definitions(&self) -> Vec<ManualToolDef> {
        manual::definitions(&self.config)
    }

    /// Execute a manual tool call. The request is applied on the next
    /// [`transform`](Self::transform).
    pub fn execute_tool(&mut self, name: &str, arguments: &str) -> String {
        let result = manual::execute(name, arguments, &mut self.state, &self.config);
        debug!("{name}: {result}");
        result
    }

    // ── Reports and commands ───────────────────────────────────────

    pub fn format_stats(&self) -> String {
        report::format_stats(&self.state)
    }

    pub fn context_breakdown(&self, messages: &[Message]) -> ContextBreakdown {
        ContextBreakdown::measure(messages, self.state.stats.total_tokens_saved)
    }

    /// Handle `/sieve <args>`.
    pub fn command(&mut self, args: &str, messages: &[Message]) -> String {
        match SieveCommand::parse(args) {
            SieveCommand::Context => format!(
                "{}\n\n{}",
                report::format_context_breakdown(&self.context_breakdown(messages)),
                self.format_stats()
            ),
            SieveCommand::Stats => self.format_stats(),
            SieveCommand::Sweep(count) => commands::sweep_prompt(count),
            SieveCommand::Manual(on) => {
                let on = self.set_manual_mode(on);
                commands::manual_mode_notice(on)
            }
            SieveCommand::Prune(focus) => commands::prune_prompt(focus.as_deref()),
            SieveCommand::Distill(focus) => commands::distill_prompt(focus.as_deref()),
            SieveCommand::Compress(focus) => commands::compress_prompt(focus.as_deref()),
            SieveCommand::Help => commands::help_text(
                self.is_manual(),
                self.state.stats.prune_count,
                self.state.stats.total_tokens_saved,
            ),
        }
    }
}
