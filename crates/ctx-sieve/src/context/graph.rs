//! Dependency graph over produced content.
//!
//! Each executed tool call becomes a [`DependencyNode`]. When dependency
//! tracking is enabled, calls that resolve to the same file path are linked:
//!
//! - a read made after a write or edit of that file depends on the write;
//! - a write made after a read of that file marks the read as having a
//!   forward reference. No edge is added, so the read stays prunable.
//!
//! Failed calls never take part in edges: a failed write changed nothing.
//!
//! Every `depends_on` edge is mirrored by a `depended_by` entry on the other
//! node. Edges are never removed; pruned nodes are simply ignored by the
//! safety predicates. The graph is cleared in bulk on compaction.

use crate::context::budget::estimate_tokens;
use crate::context::scoring::{ContentScore, ScoreInput, score_content};
use crate::engine::config::SieveConfig;
use crate::tools::args::ToolArgs;
use crate::tools::names::ToolKind;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// What a node's content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    FileRead,
    FileWrite,
    Command,
    Tool,
}

impl NodeKind {
    pub fn of(tool: &str) -> Self {
        match ToolKind::of(tool) {
            ToolKind::FileRead => NodeKind::FileRead,
            ToolKind::FileWrite => NodeKind::FileWrite,
            ToolKind::Command => NodeKind::Command,
            _ => NodeKind::Tool,
        }
    }
}

/// One content unit in the graph.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub id: String,
    pub kind: NodeKind,
    pub tool: Option<String>,
    pub file_path: Option<String>,
    /// Nodes this one depends on.
    pub depends_on: BTreeSet<String>,
    /// Nodes that depend on this one.
    pub depended_by: BTreeSet<String>,
    pub turn: u32,
    /// Output characters plus serialized-argument characters.
    pub content_length: usize,
    pub estimated_tokens: usize,
    pub pruned: bool,
    /// The call failed.
    pub failed: bool,
    pub score: ContentScore,
}

impl DependencyNode {
    /// Importance after decaying the insertion-time score to `current_turn`.
    pub fn importance_at(&self, current_turn: u32, decay_rate: f64) -> u32 {
        let age = current_turn.saturating_sub(self.turn);
        let decay = (decay_rate * f64::from(age) * 100.0).floor();
        (f64::from(self.score.score) - decay).max(0.0) as u32
    }
}

/// A tool call about to be added to the graph.
#[derive(Debug, Clone, Copy)]
pub struct NewNode<'a> {
    pub id: &'a str,
    pub tool: &'a str,
    pub input: &'a Value,
    pub output: Option<&'a str>,
    pub error: Option<&'a str>,
    /// Turn the call was made at.
    pub turn: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
    /// Node ids in insertion order.
    order: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for an executed tool call, scored at its own turn, and
    /// link it to earlier nodes touching the same file.
    ///
    /// Adding an id that is already present is a no-op.
    pub fn add_node(&mut self, node: NewNode<'_>, config: &SieveConfig) {
        if self.nodes.contains_key(node.id) {
            return;
        }

        let args = ToolArgs::parse(node.tool, node.input);
        let kind = NodeKind::of(node.tool);
        let file_path = args.file_path().map(str::to_string);
        let body = node.output.or(node.error).unwrap_or_default();

        let score = score_content(
            ScoreInput {
                tool: node.tool,
                args: &args,
                output: node.output,
                error: node.error,
                content_turn: node.turn,
                current_turn: node.turn,
            },
            config.semantic.decay_rate,
        );

        let mut new = DependencyNode {
            id: node.id.to_string(),
            kind,
            tool: Some(node.tool.to_string()),
            file_path,
            depends_on: BTreeSet::new(),
            depended_by: BTreeSet::new(),
            turn: node.turn,
            content_length: body.chars().count() + node.input.to_string().chars().count(),
            estimated_tokens: estimate_tokens(body),
            pruned: false,
            failed: node.error.is_some(),
            score,
        };

        if config.tracks_dependencies()
            && !new.failed
            && let Some(path) = new.file_path.clone()
        {
            self.link(&mut new, &path);
        }

        trace!(
            "Graph node {} ({:?}, {} tokens, score {})",
            new.id, new.kind, new.estimated_tokens, new.score.score
        );
        self.order.push(new.id.clone());
        self.nodes.insert(new.id.clone(), new);
    }

    fn link(&mut self, new: &mut DependencyNode, path: &str) {
        for id in &self.order {
            let Some(existing) = self.nodes.get_mut(id) else {
                continue;
            };
            if existing.failed || existing.file_path.as_deref() != Some(path) {
                continue;
            }
            match (new.kind, existing.kind) {
                (NodeKind::FileRead, NodeKind::FileWrite) => {
                    new.depends_on.insert(existing.id.clone());
                    existing.depended_by.insert(new.id.clone());
                }
                (NodeKind::FileWrite, NodeKind::FileRead) => existing.score.add_reference(),
                _ => {}
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Mark a node pruned. Returns false for unknown ids.
    pub fn mark_pruned(&mut self, id: &str) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.pruned = true;
                true
            }
            None => false,
        }
    }

    pub fn is_pruned(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(|n| n.pruned)
    }

    /// Whether removing `id` leaves no live content depending on it.
    ///
    /// True for unknown ids, and for nodes whose every dependent is unknown
    /// or already pruned.
    pub fn can_safely_prune(&self, id: &str) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return true;
        };
        node.depended_by.iter().all(|dep| self.is_absent_or_pruned(dep))
    }

    /// Whether every live dependent of `id` is a later read of the same file.
    ///
    /// Those reads captured the file's current state, so they don't need the
    /// content of the write they depend on. Used when a write is superseded.
    pub fn is_superseded_by_reads(&self, id: &str) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return true;
        };
        node.depended_by.iter().all(|dep| match self.nodes.get(dep) {
            None => true,
            Some(d) if d.pruned => true,
            Some(d) => d.kind == NodeKind::FileRead && d.file_path == node.file_path,
        })
    }

    fn is_absent_or_pruned(&self, id: &str) -> bool {
        self.nodes.get(id).is_none_or(|n| n.pruned)
    }

    /// Estimated tokens of all unpruned nodes.
    pub fn live_tokens(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| !n.pruned)
            .map(|n| n.estimated_tokens)
            .sum()
    }

    /// Unpruned nodes whose decayed importance fell below `floor`.
    pub fn stale_count(&self, current_turn: u32, decay_rate: f64, floor: u32) -> usize {
        self.nodes
            .values()
            .filter(|n| !n.pruned && n.importance_at(current_turn, decay_rate) < floor)
            .count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
    }
}
