//! Canonical tool name constants.
//!
//! All tool-name string literals should reference these constants to avoid
//! scattered magic strings. When the host renames a tool, only this file
//! needs to change.

pub const READ: &str = "read";
pub const GLOB: &str = "glob";
pub const GREP: &str = "grep";
pub const WRITE: &str = "write";
pub const EDIT: &str = "edit";
pub const BASH: &str = "bash";
pub const TASK: &str = "task";
pub const TODO_WRITE: &str = "todowrite";
pub const TODO_READ: &str = "todoread";
pub const BATCH: &str = "batch";
pub const PLAN_ENTER: &str = "plan_enter";
pub const PLAN_EXIT: &str = "plan_exit";
pub const DISTILL: &str = "distill";
pub const COMPRESS: &str = "compress";
pub const PRUNE: &str = "prune";

// LLM-facing manual operations exposed by this crate.
pub const SIEVE_DISTILL: &str = "sieve_distill";
pub const SIEVE_COMPRESS: &str = "sieve_compress";
pub const SIEVE_PRUNE: &str = "sieve_prune";

/// Tools whose content is never pruned, regardless of configuration.
pub const BUILTIN_PROTECTED: &[&str] = &[
    TASK,
    TODO_WRITE,
    TODO_READ,
    DISTILL,
    COMPRESS,
    PRUNE,
    BATCH,
    PLAN_ENTER,
    PLAN_EXIT,
    SIEVE_DISTILL,
    SIEVE_COMPRESS,
    SIEVE_PRUNE,
];

/// Coarse classification of a tool by what its content represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    FileRead,
    FileWrite,
    Command,
    Delegation,
    Todo,
    Other,
}

impl ToolKind {
    pub fn of(tool: &str) -> Self {
        match tool {
            READ | GLOB | GREP => ToolKind::FileRead,
            WRITE | EDIT => ToolKind::FileWrite,
            BASH => ToolKind::Command,
            TASK => ToolKind::Delegation,
            TODO_WRITE | TODO_READ => ToolKind::Todo,
            _ => ToolKind::Other,
        }
    }
}

pub fn is_builtin_protected(tool: &str) -> bool {
    BUILTIN_PROTECTED.contains(&tool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_tools() {
        assert_eq!(ToolKind::of("read"), ToolKind::FileRead);
        assert_eq!(ToolKind::of("grep"), ToolKind::FileRead);
        assert_eq!(ToolKind::of("edit"), ToolKind::FileWrite);
        assert_eq!(ToolKind::of("bash"), ToolKind::Command);
        assert_eq!(ToolKind::of("task"), ToolKind::Delegation);
        assert_eq!(ToolKind::of("todoread"), ToolKind::Todo);
        assert_eq!(ToolKind::of("webfetch"), ToolKind::Other);
    }

    #[test]
    fn builtin_protection_covers_manual_tools() {
        assert!(is_builtin_protected(SIEVE_PRUNE));
        assert!(is_builtin_protected("todowrite"));
        assert!(!is_builtin_protected(READ));
    }
}
