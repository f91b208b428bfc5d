//! Human-readable reports: session statistics, context breakdown, prune
//! notifications, and the system-prompt addition advertising the manual
//! tools.

use crate::context::budget::ContextBreakdown;
use crate::engine::config::{NotificationLevel, SieveConfig};
use crate::engine::session::SessionState;
use crate::strategies::{PruneResult, StrategyKind};
use crate::tools::names;

/// Strategies listed in the statistics block, in display order.
const REPORTED_STRATEGIES: [StrategyKind; 6] = [
    StrategyKind::Deduplication,
    StrategyKind::Supersede,
    StrategyKind::ErrorPurge,
    StrategyKind::SmartCompression,
    StrategyKind::Distill,
    StrategyKind::Compress,
];

/// `1234567` → `1,234,567`.
pub fn thousands(n: usize) -> String {
    let digits: Vec<char> = n.to_string().chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(*c);
    }
    out
}

pub fn format_stats(state: &SessionState) -> String {
    let stats = &state.stats;
    let secs = stats.duration().num_seconds().max(0);
    let mut lines = vec![
        "Sieve session statistics:".to_string(),
        format!("  Session duration:      {}m {}s", secs / 60, secs % 60),
        format!("  Total tokens saved:    ~{}", thousands(stats.total_tokens_saved)),
        format!("  Total prunes:          {}", stats.prune_count),
    ];
    for kind in REPORTED_STRATEGIES {
        let label = format!("{}:", kind.label());
        lines.push(format!("    {label:<21}{}", stats.count_for(kind)));
    }
    lines.extend([
        format!("    {:<21}{}", "Prune:", stats.manual_count),
        format!("  Nudges sent:           {}", stats.nudges_sent),
        format!("  Tracked tool calls:    {}", state.tool_calls.len()),
        format!("  Dependency nodes:      {}", state.graph.len()),
        format!("  Files tracked:         {}", state.file_history.len()),
    ]);
    lines.join("\n")
}

pub fn format_context_breakdown(breakdown: &ContextBreakdown) -> String {
    [
        "Context breakdown (estimated):".to_string(),
        format!("  User messages:       ~{} tokens", thousands(breakdown.user_tokens)),
        format!("  Assistant messages:  ~{} tokens", thousands(breakdown.assistant_tokens)),
        format!("  Tool I/O:            ~{} tokens", thousands(breakdown.tool_tokens)),
        "  ─────────────────────────────".to_string(),
        format!("  Total active:        ~{} tokens", thousands(breakdown.active_tokens())),
        format!("  Tokens saved:        ~{} tokens", thousands(breakdown.saved_tokens)),
        format!("  Total original:      ~{} tokens", thousands(breakdown.original_tokens())),
    ]
    .join("\n")
}

/// Summary of one pass's applied prunes at `level`. `None` when the level
/// is `Off` or nothing was applied.
pub fn prune_notification(level: NotificationLevel, applied: &[PruneResult]) -> Option<String> {
    if level == NotificationLevel::Off || applied.is_empty() {
        return None;
    }
    let total: usize = applied.iter().map(|r| r.tokens_saved).sum();
    let head = format!("[sieve] Pruned {} items, saved ~{total} tokens", applied.len());
    if level == NotificationLevel::Minimal {
        return Some(head);
    }

    // Per strategy, in first-applied order.
    let mut groups: Vec<(StrategyKind, usize, usize)> = Vec::new();
    for r in applied {
        match groups.iter_mut().find(|(kind, ..)| *kind == r.strategy) {
            Some((_, count, tokens)) => {
                *count += 1;
                *tokens += r.tokens_saved;
            }
            None => groups.push((r.strategy, 1, r.tokens_saved)),
        }
    }
    let mut lines = vec![format!("{head}:")];
    for (kind, count, tokens) in groups {
        lines.push(format!("  {kind}: {count} items (~{tokens} tokens)"));
    }
    Some(lines.join("\n"))
}

/// Text appended to the system prompt advertising the offered manual
/// tools. `None` in manual mode.
pub fn system_prompt_addition(state: &SessionState, config: &SieveConfig) -> Option<String> {
    if state.is_manual(config) {
        return None;
    }
    let mut lines = vec![
        "<sieve-context-management>".to_string(),
        "You have context management tools available to optimize token usage:".to_string(),
    ];
    if config.offers(config.tools.distill) {
        lines.push(format!(
            "- **{}**: Extract key findings from tool outputs before removing the raw content. \
             Use when tool output contains important information that should be preserved in summary form.",
            names::SIEVE_DISTILL
        ));
    }
    if config.offers(config.tools.compress) {
        lines.push(format!(
            "- **{}**: Collapse a range of conversation into a concise summary. \
             Use when a series of exploration steps can be condensed.",
            names::SIEVE_COMPRESS
        ));
    }
    if config.offers(config.tools.prune) {
        lines.push(format!(
            "- **{}**: Remove completed or noisy tool content from context. \
             Use for tool outputs no longer needed.",
            names::SIEVE_PRUNE
        ));
    }
    lines.extend(
        [
            "",
            "Guidelines:",
            "- Proactively manage context when working on long tasks",
            "- Distill important findings before they get pruned",
            "- Prune exploratory tool calls once you have the information you need",
            "- Never prune tool outputs that contain information you still need",
            "</sieve-context-management>",
        ]
        .map(String::from),
    );
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ToolPermission;
    use crate::engine::session::ToolExecution;
    use serde_json::json;

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn stats_block_lists_every_counter() {
        let config = SieveConfig::default();
        let mut state = SessionState::new();
        state.record_tool_call(
            &ToolExecution::completed("r1", "read", json!({"filePath": "a.ts"}), "x"),
            &config,
        );
        state.stats.record(StrategyKind::Supersede, 1500);
        state.stats.record(StrategyKind::Distill, 10);

        let text = format_stats(&state);
        assert!(text.starts_with("Sieve session statistics:"));
        assert!(text.contains("Total tokens saved:    ~1,510"));
        assert!(text.contains("Total prunes:          2"));
        assert!(text.contains("    Supersede writes:    1"));
        assert!(text.contains("    Distill:             1"));
        assert!(text.contains("    Error purges:        0"));
        assert!(text.contains("Tracked tool calls:    1"));
        assert!(text.contains("Dependency nodes:      1"));
        assert!(text.contains("Files tracked:         1"));
    }

    #[test]
    fn breakdown_totals() {
        let text = format_context_breakdown(&ContextBreakdown {
            user_tokens: 10,
            assistant_tokens: 20,
            tool_tokens: 1000,
            saved_tokens: 500,
        });
        assert!(text.contains("Total active:        ~1,030 tokens"));
        assert!(text.contains("Total original:      ~1,530 tokens"));
    }

    #[test]
    fn notification_levels() {
        let applied = vec![
            PruneResult::new("a", "read", StrategyKind::Deduplication, "r", 100),
            PruneResult::new("b", "write", StrategyKind::Supersede, "r", 500),
            PruneResult::new("c", "read", StrategyKind::Deduplication, "r", 50),
        ];
        assert_eq!(prune_notification(NotificationLevel::Off, &applied), None);
        assert_eq!(prune_notification(NotificationLevel::Detailed, &[]), None);
        assert_eq!(
            prune_notification(NotificationLevel::Minimal, &applied).unwrap(),
            "[sieve] Pruned 3 items, saved ~650 tokens"
        );
        assert_eq!(
            prune_notification(NotificationLevel::Detailed, &applied).unwrap(),
            "[sieve] Pruned 3 items, saved ~650 tokens:\n  \
             deduplication: 2 items (~150 tokens)\n  \
             supersede: 1 items (~500 tokens)"
        );
    }

    #[test]
    fn system_prompt_lists_offered_tools_only() {
        let config = SieveConfig::default();
        let text = system_prompt_addition(&SessionState::new(), &config).unwrap();
        assert!(text.starts_with("<sieve-context-management>"));
        assert!(text.ends_with("</sieve-context-management>"));
        assert!(text.contains("**sieve_distill**"));
        assert!(text.contains("**sieve_prune**"));
        assert!(!text.contains("**sieve_compress**"));

        let mut all = SieveConfig::default();
        all.tools.compress = ToolPermission::Ask;
        assert!(system_prompt_addition(&SessionState::new(), &all)
            .unwrap()
            .contains("**sieve_compress**"));
    }

    #[test]
    fn system_prompt_omitted_in_manual_mode() {
        let config = SieveConfig::default().with_manual_mode(true);
        assert_eq!(system_prompt_addition(&SessionState::new(), &config), None);

        let mut state = SessionState::new();
        state.manual_mode = true;
        assert_eq!(system_prompt_addition(&state, &SieveConfig::default()), None);
    }
}
