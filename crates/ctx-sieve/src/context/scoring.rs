//! Content importance scoring.
//!
//! [`score_content`] rates one unit of produced content from 0 to 100 and
//! assigns it a [`ContentCategory`]. Categories form a priority chain (the
//! first match wins); a size penalty and age decay then apply uniformly.
//!
//! Scores are derived values: callers recompute them at the turn they care
//! about. Only the forward-reference fields are updated in place, by the
//! dependency graph, as later content starts depending on earlier content.

use crate::tools::args::ToolArgs;
use crate::tools::names::ToolKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Score assigned before any category matches.
pub const BASE_SCORE: u32 = 50;

/// Outputs longer than this many characters are penalized.
const LARGE_OUTPUT_CHARS: usize = 5000;

/// Largest size penalty.
const MAX_SIZE_PENALTY: u32 = 15;

static TEST_OR_BUILD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(npm|bun|yarn|pnpm|cargo)\s+(test|run|build)").unwrap());

static INFRA_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(git|docker|kubectl)").unwrap());

/// What a piece of content represents to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Definition,
    Decision,
    Output,
    Error,
    Navigation,
    Routine,
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentCategory::Definition => "definition",
            ContentCategory::Decision => "decision",
            ContentCategory::Output => "output",
            ContentCategory::Error => "error",
            ContentCategory::Navigation => "navigation",
            ContentCategory::Routine => "routine",
        };
        f.write_str(s)
    }
}

/// Importance of one content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentScore {
    /// 0 to 100.
    pub score: u32,
    pub category: ContentCategory,
    /// Later content depends on this one.
    pub has_forward_references: bool,
    /// Turn the content was produced at.
    pub turn: u32,
    pub reference_count: u32,
}

impl ContentScore {
    /// Record a newly discovered dependent.
    pub fn add_reference(&mut self) {
        self.has_forward_references = true;
        self.reference_count += 1;
    }
}

/// Input to [`score_content`].
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub tool: &'a str,
    pub args: &'a ToolArgs,
    pub output: Option<&'a str>,
    pub error: Option<&'a str>,
    pub content_turn: u32,
    pub current_turn: u32,
}

/// Score a content unit at `current_turn`.
///
/// `decay_rate` is the fraction of 100 lost per turn of age.
pub fn score_content(input: ScoreInput<'_>, decay_rate: f64) -> ContentScore {
    let (category, base) = categorize(input.tool, input.args, input.error.is_some());

    let mut score = base;

    let len = input.output.map_or(0, |o| o.chars().count());
    if len > LARGE_OUTPUT_CHARS {
        let penalty = u32::try_from(len / LARGE_OUTPUT_CHARS).unwrap_or(u32::MAX);
        score = score.saturating_sub(penalty.min(MAX_SIZE_PENALTY));
    }

    let age = input.current_turn.saturating_sub(input.content_turn);
    let decay = (decay_rate * f64::from(age) * 100.0).floor();
    if decay > 0.0 {
        score = (f64::from(score) - decay).max(0.0) as u32;
    }

    ContentScore {
        score,
        category,
        has_forward_references: false,
        turn: input.content_turn,
        reference_count: 0,
    }
}

fn categorize(tool: &str, args: &ToolArgs, failed: bool) -> (ContentCategory, u32) {
    if failed {
        return (ContentCategory::Error, 30);
    }
    match ToolKind::of(tool) {
        ToolKind::FileWrite => (ContentCategory::Definition, 70),
        ToolKind::FileRead => (ContentCategory::Navigation, 40),
        ToolKind::Command => {
            let command = args.command().unwrap_or_default().trim_start();
            if TEST_OR_BUILD.is_match(command) {
                (ContentCategory::Output, 55)
            } else if INFRA_COMMAND.is_match(command) {
                (ContentCategory::Routine, 35)
            } else {
                (ContentCategory::Output, 45)
            }
        }
        ToolKind::Delegation => (ContentCategory::Decision, 80),
        ToolKind::Todo => (ContentCategory::Decision, 85),
        ToolKind::Other => (ContentCategory::Routine, BASE_SCORE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn score(tool: &str, args: serde_json::Value, output: &str, age: u32) -> ContentScore {
        let args = ToolArgs::parse(tool, &args);
        score_content(
            ScoreInput {
                tool,
                args: &args,
                output: Some(output),
                error: None,
                content_turn: 1,
                current_turn: 1 + age,
            },
            0.05,
        )
    }

    #[test]
    fn categories_by_tool_kind() {
        let write = score("write", json!({"filePath": "a.ts"}), "ok", 0);
        assert_eq!((write.category, write.score), (ContentCategory::Definition, 70));

        let read = score("read", json!({"filePath": "a.ts"}), "x", 0);
        assert_eq!((read.category, read.score), (ContentCategory::Navigation, 40));

        let task = score("task", json!({}), "done", 0);
        assert_eq!((task.category, task.score), (ContentCategory::Decision, 80));

        let todo = score("todowrite", json!({}), "[]", 0);
        assert_eq!((todo.category, todo.score), (ContentCategory::Decision, 85));

        let other = score("webfetch", json!({}), "<html>", 0);
        assert_eq!((other.category, other.score), (ContentCategory::Routine, 50));
    }

    #[test]
    fn commands_are_classified_by_text() {
        let test = score("bash", json!({"command": "cargo test --all"}), "ok", 0);
        assert_eq!((test.category, test.score), (ContentCategory::Output, 55));

        let npm = score("bash", json!({"command": "npm run build"}), "ok", 0);
        assert_eq!(npm.score, 55);

        let git = score("bash", json!({"command": "git status"}), "clean", 0);
        assert_eq!((git.category, git.score), (ContentCategory::Routine, 35));

        let ls = score("bash", json!({"command": "ls -la"}), "a b", 0);
        assert_eq!((ls.category, ls.score), (ContentCategory::Output, 45));
    }

    #[test]
    fn error_wins_over_tool_kind() {
        let args = ToolArgs::parse("write", &json!({"filePath": "a.ts"}));
        let s = score_content(
            ScoreInput {
                tool: "write",
                args: &args,
                output: None,
                error: Some("permission denied"),
                content_turn: 2,
                current_turn: 2,
            },
            0.05,
        );
        assert_eq!((s.category, s.score), (ContentCategory::Error, 30));
        assert_eq!(s.turn, 2);
    }

    #[test]
    fn size_penalty_is_capped() {
        let medium = score("webfetch", json!({}), &"x".repeat(12_000), 0);
        assert_eq!(medium.score, 48);

        let huge = score("webfetch", json!({}), &"x".repeat(200_000), 0);
        assert_eq!(huge.score, 35);
    }

    #[test]
    fn decay_reduces_and_clamps() {
        assert_eq!(score("read", json!({"filePath": "a"}), "x", 4).score, 20);
        assert_eq!(score("read", json!({"filePath": "a"}), "x", 30).score, 0);
    }

    #[test]
    fn references_accumulate() {
        let mut s = score("read", json!({"filePath": "a"}), "x", 0);
        assert!(!s.has_forward_references);
        s.add_reference();
        s.add_reference();
        assert!(s.has_forward_references);
        assert_eq!(s.reference_count, 2);
    }
}
