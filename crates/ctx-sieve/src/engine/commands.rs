//! The `/sieve` slash command.
//!
//! Hosts forward the argument string of `/sieve ...` to
//! [`ContextManager::command`](super::manager::ContextManager::command);
//! the returned text is shown to the user or injected as a prompt.

use crate::tools::names;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SieveCommand {
    /// Token breakdown of the current conversation.
    Context,
    /// Session statistics.
    Stats,
    /// Ask the model to prune the last N tool outputs (all when `None`).
    Sweep(Option<usize>),
    /// Switch manual mode on, off, or toggle it (`None`).
    Manual(Option<bool>),
    Prune(Option<String>),
    Distill(Option<String>),
    Compress(Option<String>),
    Help,
}

impl SieveCommand {
    /// Parse the arguments following `/sieve`. Unknown subcommands show help.
    pub fn parse(args: &str) -> Self {
        let mut words = args.split_whitespace();
        let sub = words.next().map(str::to_lowercase).unwrap_or_default();
        let rest: Vec<&str> = words.collect();
        let focus = (!rest.is_empty()).then(|| rest.join(" "));

        match sub.as_str() {
            "context" => SieveCommand::Context,
            "stats" => SieveCommand::Stats,
            "sweep" => SieveCommand::Sweep(rest.first().and_then(|n| n.parse().ok())),
            "manual" => SieveCommand::Manual(match rest.first().map(|s| s.to_lowercase()) {
                Some(s) if s == "on" => Some(true),
                Some(s) if s == "off" => Some(false),
                _ => None,
            }),
            "prune" => SieveCommand::Prune(focus),
            "distill" => SieveCommand::Distill(focus),
            "compress" => SieveCommand::Compress(focus),
            _ => SieveCommand::Help,
        }
    }
}

fn protected_list() -> String {
    names::BUILTIN_PROTECTED.join(", ")
}

fn focus_note(focus: Option<&str>) -> String {
    focus.map(|f| format!(" Focus: {f}")).unwrap_or_default()
}

pub fn sweep_prompt(count: Option<usize>) -> String {
    let scope = match count {
        Some(n) => format!("the last {n}"),
        None => "all".to_string(),
    };
    format!(
        "Use {} to prune {scope} completed tool outputs since the last user message. \
         Skip any tools named: {}",
        names::SIEVE_PRUNE,
        protected_list()
    )
}

pub fn prune_prompt(focus: Option<&str>) -> String {
    format!(
        "Use {} to remove completed tool outputs that are no longer needed.{} Skip protected tools: {}",
        names::SIEVE_PRUNE,
        focus_note(focus),
        protected_list()
    )
}

pub fn distill_prompt(focus: Option<&str>) -> String {
    format!(
        "Use {} to extract key findings from tool outputs.{} Summarize important information before pruning.",
        names::SIEVE_DISTILL,
        focus_note(focus)
    )
}

pub fn compress_prompt(focus: Option<&str>) -> String {
    format!(
        "Use {} to collapse a range of conversation into a summary.{} Preserve key decisions and findings.",
        names::SIEVE_COMPRESS,
        focus_note(focus)
    )
}

pub fn manual_mode_notice(on: bool) -> String {
    if on {
        "Sieve manual mode: ON. Automatic pruning tools disabled. \
         Use /sieve sweep or /sieve prune to manually trigger."
            .to_string()
    } else {
        "Sieve manual mode: OFF. Automatic context management re-enabled.".to_string()
    }
}

pub fn help_text(manual: bool, prune_count: usize, tokens_saved: usize) -> String {
    let mode = if manual { "Manual mode" } else { "Automatic" };
    [
        "Sieve - context pruning".to_string(),
        String::new(),
        "Available commands:".to_string(),
        "  /sieve context          Show context token breakdown".to_string(),
        "  /sieve stats            Show pruning statistics".to_string(),
        "  /sieve sweep [N]        Prune last N tool outputs (or all since last user msg)".to_string(),
        "  /sieve manual [on|off]  Toggle manual mode".to_string(),
        "  /sieve prune [focus]    Trigger a prune with optional focus".to_string(),
        "  /sieve distill [focus]  Trigger a distill with optional focus".to_string(),
        "  /sieve compress [focus] Trigger a compress with optional focus".to_string(),
        String::new(),
        format!("Status: {mode} | {prune_count} prunes | ~{tokens_saved} tokens saved"),
    ]
    .join("\n")
}
