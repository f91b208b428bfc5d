//! Context-pruning decision engine for conversational coding agents.
//!
//! `ctx-sieve` decides, turn by turn, which previously produced content in an
//! agent conversation (tool outputs, command results, file reads and writes)
//! can be removed, summarized, or deduplicated without losing information the
//! agent still needs. The entry point is the
//! [`ContextManager`](engine::manager::ContextManager): feed it lifecycle and
//! tool-execution notifications, then call
//! [`transform()`](engine::manager::ContextManager::transform) with the
//! conversation before each model call.
//!
//! # Getting started
//!
//! ```ignore
//! use ctx_sieve::prelude::*;
//! use serde_json::json;
//!
//! let mut manager = ContextManager::new(SieveConfig::default());
//! manager.on_session_created("session-1");
//! manager.on_message(None);
//! manager.on_tool_executed(ToolExecution::completed(
//!     "call_1", "read", json!({"filePath": "src/main.rs"}), contents,
//! ));
//!
//! let outcome = manager.transform(&mut messages);
//! for applied in &outcome.applied {
//!     println!("{}: {}", applied.target, applied.reason);
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Estimate tokens or resolve the context window:** [`context::budget`].
//! - **Compare outputs for near-duplicates:** [`SimilarityEngine`](context::similarity::SimilarityEngine).
//! - **Score content importance:** [`score_content`](context::scoring::score_content).
//! - **Track which content depends on which:** [`DependencyGraph`](context::graph::DependencyGraph).
//! - **Add or tune a pruning strategy:** the [`Strategy`](strategies::Strategy)
//!   trait and the analyzers in [`strategies`].
//! - **Arbitrate and apply proposals:** [`engine::orchestrator`].
//! - **Observe decisions:** implement [`EventHandler`](engine::events::EventHandler)
//!   or use [`LoggingHandler`](engine::events::LoggingHandler).
//! - **Configure everything:** [`SieveConfig`](engine::config::SieveConfig).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Token estimator, similarity engine, scorer, dependency graph, file tracking, summaries, placeholders |
//! | [`strategies`] | Exact/fuzzy dedup, supersede writes, error purge, smart compression |
//! | [`engine`] | Config, session state, orchestrator, events, cross-session memory, reports, the manager facade |
//! | [`tools`] | Tool-name constants, typed tool arguments, manual prune/distill/compress operations |

pub mod context;
pub mod engine;
pub mod prelude;
pub mod strategies;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use ctx_sieve::json_schema_for;
/// use ctx_sieve::engine::config::SieveConfig;
///
/// let schema = json_schema_for::<SieveConfig>();
/// assert_eq!(schema["type"], "object");
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Conversation model ─────────────────────────────────────────────

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One conversation message: an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// A user message with a single text part.
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            parts: vec![Part::Text(TextPart {
                id: format!("{id}:text"),
                text: text.into(),
            })],
            id,
            role: Role::User,
        }
    }

    /// An empty assistant message. Chain [`with_text`](Self::with_text) and
    /// [`with_tool`](Self::with_tool) to fill it.
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            parts: Vec::new(),
        }
    }

    /// Append a text part.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let id = format!("{}:text{}", self.id, self.parts.len());
        self.parts.push(Part::Text(TextPart {
            id,
            text: text.into(),
        }));
        self
    }

    /// Append a tool part.
    pub fn with_tool(mut self, part: ToolPart) -> Self {
        self.parts.push(Part::Tool(part));
        self
    }

    /// Iterate over the tool parts of this message.
    pub fn tool_parts(&self) -> impl Iterator<Item = &ToolPart> {
        self.parts.iter().filter_map(|p| match p {
            Part::Tool(tp) => Some(tp),
            Part::Text(_) => None,
        })
    }
}

/// A content unit inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text(TextPart),
    Tool(ToolPart),
}

impl Part {
    /// Stable content identity of this part.
    pub fn id(&self) -> &str {
        match self {
            Part::Text(t) => &t.id,
            Part::Tool(t) => &t.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextPart {
    pub id: String,
    pub text: String,
}

/// A tool invocation and its result.
///
/// `id` is the content identity of the part and doubles as the tool-call
/// identity reported to [`ContextManager::on_tool_executed`](engine::manager::ContextManager::on_tool_executed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolPart {
    pub id: String,
    pub tool: String,
    pub state: ToolState,
}

impl ToolPart {
    pub fn completed(
        id: impl Into<String>,
        tool: impl Into<String>,
        input: Value,
        output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            state: ToolState::Completed {
                input,
                output: output.into(),
            },
        }
    }

    pub fn errored(
        id: impl Into<String>,
        tool: impl Into<String>,
        input: Value,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            state: ToolState::Error {
                input,
                error: error.into(),
            },
        }
    }

    pub fn pending(id: impl Into<String>, tool: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            state: ToolState::Pending { input },
        }
    }

    /// The arguments the tool was invoked with.
    pub fn input(&self) -> &Value {
        match &self.state {
            ToolState::Pending { input }
            | ToolState::Completed { input, .. }
            | ToolState::Error { input, .. } => input,
        }
    }

    /// The output text, for completed calls only.
    pub fn output(&self) -> Option<&str> {
        match &self.state {
            ToolState::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    /// The error text, for failed calls only.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ToolState::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Completion state of a tool part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolState {
    Pending {
        #[serde(default)]
        input: Value,
    },
    Completed {
        #[serde(default)]
        input: Value,
        output: String,
    },
    Error {
        #[serde(default)]
        input: Value,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_roundtrips_through_tagged_json() {
        let msg = Message::assistant("m1")
            .with_text("reading")
            .with_tool(ToolPart::completed(
                "c1",
                "read",
                json!({"filePath": "a.ts"}),
                "contents",
            ));
        let raw = serde_json::to_value(&msg).unwrap();
        assert_eq!(raw["parts"][0]["type"], "text");
        assert_eq!(raw["parts"][1]["type"], "tool");
        assert_eq!(raw["parts"][1]["state"]["status"], "completed");

        let back: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn tool_part_accessors() {
        let ok = ToolPart::completed("c1", "bash", json!({"command": "ls"}), "a\nb");
        assert_eq!(ok.output(), Some("a\nb"));
        assert_eq!(ok.error(), None);
        assert_eq!(ok.input()["command"], "ls");

        let failed = ToolPart::errored("c2", "bash", json!({}), "boom");
        assert_eq!(failed.output(), None);
        assert_eq!(failed.error(), Some("boom"));
    }

    #[test]
    fn user_message_has_single_text_part() {
        let msg = Message::user("u1", "hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.parts.len(), 1);
        assert_eq!(msg.parts[0].id(), "u1:text");
        assert_eq!(msg.tool_parts().count(), 0);
    }

    #[test]
    fn json_schema_for_produces_object_schema() {
        let schema = json_schema_for::<Message>();
        assert_eq!(schema["type"], "object");
    }
}
