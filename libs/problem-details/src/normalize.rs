//! Bounded failure trees.
//!
//! [`normalize`] turns a [`FailureGraph`] into a [`FailureNode`] tree that
//! respects the configured depth and breadth. Whatever does not fit is
//! replaced by a single synthetic `truncated` node that says how much was cut.
//! The walk is total: cycles, shared causes and unresolved indices become
//! markers as well, and every raw failure is emitted at most once.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::failure::{FailureGraph, FailureId};
use crate::options::{MAX_BREADTH_LIMIT, MAX_DEPTH_LIMIT, ProblemDetailsOptions};

/// `type` of synthetic nodes standing in for omitted failures.
pub const TRUNCATED_KIND: &str = "truncated";

/// Why a marker node was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationReason {
    /// The parent sits at the maximum depth.
    Depth,
    /// The parent has more children than the maximum breadth.
    Breadth,
    /// The cause is already an ancestor.
    Cycle,
    /// The cause was already emitted on another branch.
    Shared,
    /// The tree reached its node limit (`max_depth * max_breadth`).
    Limit,
    /// The cause index does not exist in the graph.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub reason: TruncationReason,
    /// Raw failures not represented in the tree because of this marker.
    pub omitted: usize,
}

/// Serializable node of a bounded failure tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    /// Server-side diagnostic only; never read back from the wire.
    #[serde(default, skip_serializing_if = "Option::is_none", skip_deserializing)]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated: Option<Truncation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "innerErrors")]
    pub children: Vec<FailureNode>,
}

impl FailureNode {
    /// Synthetic node replacing failures that were cut from the tree.
    #[must_use]
    pub fn truncation(reason: TruncationReason, omitted: usize) -> Self {
        let message = match reason {
            TruncationReason::Depth => format!("{omitted} nested failures truncated"),
            TruncationReason::Breadth => format!("{omitted} more omitted"),
            TruncationReason::Cycle => "cyclic cause reference".to_owned(),
            TruncationReason::Shared => "shared cause reference".to_owned(),
            TruncationReason::Limit => format!("{omitted} more omitted, node limit reached"),
            TruncationReason::Unresolved => "unresolved cause reference".to_owned(),
        };
        Self {
            kind: TRUNCATED_KIND.to_owned(),
            message,
            source_context: None,
            stack_trace: None,
            truncated: Some(Truncation { reason, omitted }),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_truncation(&self) -> bool {
        self.truncated.is_some()
    }

    /// Calls `f` for every node with its level (root is 1), depth first.
    pub fn walk(&self, f: &mut impl FnMut(&FailureNode, usize)) {
        self.walk_at(1, f);
    }

    fn walk_at(&self, level: usize, f: &mut impl FnMut(&FailureNode, usize)) {
        f(self, level);
        for child in &self.children {
            child.walk_at(level + 1, f);
        }
    }
}

/// Builds the bounded tree for `graph`.
///
/// Real failures never appear below level `max_depth`. A node keeps at most
/// `max_breadth` causes, followed by one "N more omitted" marker when it had more.
/// Limits are clamped to `1..=MAX_DEPTH_LIMIT` and `1..=MAX_BREADTH_LIMIT`, and
/// the whole tree holds at most `max_depth * max_breadth` real failures.
#[must_use]
pub fn normalize(graph: &FailureGraph, options: &ProblemDetailsOptions) -> FailureNode {
    let max_depth = options.max_depth.clamp(1, MAX_DEPTH_LIMIT);
    let max_breadth = options.max_breadth.clamp(1, MAX_BREADTH_LIMIT);
    let mut normalizer = Normalizer {
        graph,
        options,
        max_depth,
        max_breadth,
        budget: max_depth * max_breadth,
        path: Vec::with_capacity(max_depth),
        emitted: HashSet::new(),
    };
    normalizer.node(graph.root(), 1)
}

struct Normalizer<'a> {
    graph: &'a FailureGraph,
    options: &'a ProblemDetailsOptions,
    max_depth: usize,
    max_breadth: usize,
    /// Real nodes still allowed in the tree.
    budget: usize,
    path: Vec<FailureId>,
    emitted: HashSet<FailureId>,
}

impl Normalizer<'_> {
    fn node(&mut self, id: FailureId, depth: usize) -> FailureNode {
        let graph = self.graph;
        let Some(raw) = graph.get(id) else {
            return FailureNode::truncation(TruncationReason::Unresolved, 0);
        };
        // path holds at most max_depth ids
        if self.path.contains(&id) {
            return FailureNode::truncation(TruncationReason::Cycle, 0);
        }
        if !self.emitted.insert(id) {
            return FailureNode::truncation(TruncationReason::Shared, 0);
        }
        self.budget = self.budget.saturating_sub(1);

        let mut node = FailureNode {
            kind: raw.kind.clone(),
            message: raw.message.clone(),
            source_context: raw
                .source_context
                .clone()
                .filter(|_| self.options.include_source_context),
            stack_trace: raw
                .stack_trace
                .clone()
                .filter(|_| self.options.include_stack_trace),
            truncated: None,
            children: Vec::new(),
        };

        let causes = raw.causes.as_slice();
        if causes.is_empty() {
            return node;
        }

        self.path.push(id);
        if depth >= self.max_depth {
            node.children.push(self.depth_marker(causes));
        } else {
            let kept = causes.len().min(self.max_breadth);
            node.children.reserve(kept + 1);
            let mut limited = false;
            for (i, cause) in causes[..kept].iter().enumerate() {
                if self.budget == 0 {
                    node.children.push(FailureNode::truncation(
                        TruncationReason::Limit,
                        causes.len() - i,
                    ));
                    limited = true;
                    break;
                }
                node.children.push(self.node(*cause, depth + 1));
            }
            if !limited && causes.len() > kept {
                node.children.push(FailureNode::truncation(
                    TruncationReason::Breadth,
                    causes.len() - kept,
                ));
            }
        }
        self.path.pop();
        node
    }

    fn depth_marker(&self, causes: &[FailureId]) -> FailureNode {
        let omitted = self
            .graph
            .reachable_from(causes)
            .into_iter()
            .filter(|id| !self.path.contains(id) && !self.emitted.contains(id))
            .count();
        if omitted > 0 {
            FailureNode::truncation(TruncationReason::Depth, omitted)
        } else if causes.iter().all(|id| self.path.contains(id)) {
            // every cause loops back to an ancestor
            FailureNode::truncation(TruncationReason::Cycle, 0)
        } else if causes.iter().any(|id| self.emitted.contains(id)) {
            FailureNode::truncation(TruncationReason::Shared, 0)
        } else {
            FailureNode::truncation(TruncationReason::Unresolved, 0)
        }
    }
}
