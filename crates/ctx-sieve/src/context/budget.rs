//! Token estimation and context budget tracking.
//!
//! All counts in this crate are character-based estimates: `ceil(chars / 4)`.
//! That is an approximation, not a tokenizer, and it is applied uniformly so
//! savings computed by different strategies stay comparable.
//!
//! Besides the estimator this module resolves the effective context window
//! for the active model and produces the advisory nudge that tells the model
//! to prune when the live content it has produced approaches that window.

use crate::Message;
use crate::Part;
use crate::engine::config::{ContextLimit, SieveConfig};
use tracing::warn;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Context window used when nothing better can be resolved.
pub const DEFAULT_CONTEXT_LIMIT: usize = 100_000;

/// Window assumed for a model that doesn't report its own.
pub const DEFAULT_MODEL_WINDOW: usize = 200_000;

/// Fraction of the context limit above which usage counts as high.
const HIGH_USAGE_THRESHOLD: f64 = 0.80;

/// Estimate the token count of `text`. Empty input yields 0.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the token count of a JSON value in its compact serialization.
pub fn estimate_json_tokens(value: &serde_json::Value) -> usize {
    estimate_tokens(&value.to_string())
}

/// The model currently driving the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider_id: String,
    pub model_id: String,
    /// The model's own context window in tokens.
    pub context_window: usize,
}

impl ModelInfo {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            context_window: DEFAULT_MODEL_WINDOW,
        }
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    /// Key used for per-model overrides: `provider/model`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider_id, self.model_id)
    }
}

/// Resolve the context limit in tokens for the active model.
///
/// Per-model overrides win over the global limit. Percentage limits are
/// taken of the model's own window; without a known model they can't be
/// resolved and fall back to [`DEFAULT_CONTEXT_LIMIT`], as do malformed
/// values.
pub fn resolve_context_limit(config: &SieveConfig, model: Option<&ModelInfo>) -> usize {
    let settings = &config.tools;
    let Some(model) = model else {
        return match &settings.context_limit {
            ContextLimit::Tokens(n) => *n,
            ContextLimit::Relative(_) => DEFAULT_CONTEXT_LIMIT,
        };
    };

    let limit = settings
        .model_limits
        .get(&model.key())
        .unwrap_or(&settings.context_limit);

    match limit {
        ContextLimit::Tokens(n) => *n,
        ContextLimit::Relative(raw) => match parse_percentage(raw) {
            Some(fraction) => (model.context_window as f64 * fraction).floor() as usize,
            None => {
                warn!("Ignoring malformed context limit {raw:?}");
                DEFAULT_CONTEXT_LIMIT
            }
        },
    }
}

fn parse_percentage(raw: &str) -> Option<f64> {
    let number = raw.trim().strip_suffix('%')?;
    let pct: f64 = number.trim().parse().ok()?;
    (pct.is_finite() && pct >= 0.0).then_some(pct / 100.0)
}

/// Snapshot of estimated usage against the resolved limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    /// Estimated tokens of live (unpruned) tracked content.
    pub estimated_tokens: usize,
    /// Resolved context limit.
    pub limit: usize,
    /// Usage as a fraction (0.0 to 1.0+).
    pub usage_pct: f64,
}

impl ContextUsage {
    pub fn new(estimated_tokens: usize, limit: usize) -> Self {
        let usage_pct = if limit > 0 {
            estimated_tokens as f64 / limit as f64
        } else {
            1.0
        };
        Self {
            estimated_tokens,
            limit,
            usage_pct,
        }
    }

    pub fn is_high(&self) -> bool {
        self.usage_pct > HIGH_USAGE_THRESHOLD
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.0}% of {})",
            self.estimated_tokens,
            self.usage_pct * 100.0,
            self.limit,
        )
    }
}

/// Build the nudge text for the given usage.
///
/// `stale` is the number of live outputs whose importance decayed below
/// the configured floor.
pub fn nudge_message(usage: &ContextUsage, stale: usize) -> String {
    let stale_note = if stale > 0 {
        format!(" {stale} tracked output(s) have decayed below the importance floor.")
    } else {
        String::new()
    };
    if usage.is_high() {
        format!(
            "[sieve] Context usage is high (~{}k tokens).{stale_note} Consider using \
             sieve_distill or sieve_prune to free up context for better response quality.",
            (usage.estimated_tokens as f64 / 1000.0).round() as usize,
        )
    } else {
        format!(
            "[sieve] Consider pruning completed tool outputs to maintain context quality.\
             {stale_note} Use sieve_prune for outputs no longer needed, or sieve_distill to \
             preserve key findings."
        )
    }
}

/// Estimated token split of a conversation by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextBreakdown {
    pub user_tokens: usize,
    pub assistant_tokens: usize,
    /// Tool inputs and outputs (errors for failed calls).
    pub tool_tokens: usize,
    /// Tokens already saved by pruning this session.
    pub saved_tokens: usize,
}

impl ContextBreakdown {
    pub fn measure(messages: &[Message], saved_tokens: usize) -> Self {
        let mut bd = Self {
            saved_tokens,
            ..Self::default()
        };
        for msg in messages {
            for part in &msg.parts {
                match part {
                    Part::Text(t) => {
                        let tokens = estimate_tokens(&t.text);
                        if msg.role == crate::Role::User {
                            bd.user_tokens += tokens;
                        } else {
                            bd.assistant_tokens += tokens;
                        }
                    }
                    Part::Tool(tp) => {
                        if let Some(output) = tp.output() {
                            bd.tool_tokens += estimate_tokens(output);
                            bd.tool_tokens += estimate_json_tokens(tp.input());
                        } else if let Some(error) = tp.error() {
                            bd.tool_tokens += estimate_tokens(error);
                        }
                    }
                }
            }
        }
        bd
    }

    pub fn active_tokens(&self) -> usize {
        self.user_tokens + self.assistant_tokens + self.tool_tokens
    }

    pub fn original_tokens(&self) -> usize {
        self.active_tokens() + self.saved_tokens
    }
}
