//! The operation model.
//!
//! The target tree is built only by applying operations. Each operation checks
//! that its target belongs to the target revision, mutates the arena, and
//! appends itself to the run log kept in the [`MergeContext`].

use std::fmt;

use tracing::debug;

use crate::artifact::{Arena, Variant};
use crate::context::MergeContext;
use crate::error::{MergeError, Result};
use crate::merge::{levelwise, ordered, unordered};
use crate::types::{MergeScenario, MergeStrategy, NodeId, Revision};

/// Append a deep copy of `node` to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOperation {
    pub node: NodeId,
    pub target: NodeId,
    pub source: Revision,
}

/// Record that `node` is intentionally left out of `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOperation {
    pub node: NodeId,
    pub target: NodeId,
    pub source: Revision,
}

/// Attach a conflict node, or a choice node under conditional merging, to
/// `target`. Either side may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictOperation {
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub base: Option<NodeId>,
    pub target: NodeId,
    pub left_condition: Option<String>,
    pub right_condition: Option<String>,
    /// Set on the recorded copy when the conflict was resolved into a choice
    /// node.
    pub as_choice: bool,
}

/// Recursive merge of a left/base/right scenario into `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOperation {
    pub scenario: MergeScenario,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add(AddOperation),
    Delete(DeleteOperation),
    Conflict(ConflictOperation),
    Merge(MergeOperation),
}

impl Operation {
    pub fn apply(&self, arena: &mut Arena, ctx: &mut MergeContext) -> Result<()> {
        match self {
            Operation::Add(op) => op.apply(arena, ctx),
            Operation::Delete(op) => op.apply(arena, ctx),
            Operation::Conflict(op) => op.apply(arena, ctx),
            Operation::Merge(op) => op.apply(arena, ctx),
        }
    }
}

impl AddOperation {
    pub fn new(node: NodeId, target: NodeId, source: Revision) -> Self {
        Self { node, target, source }
    }

    pub fn apply(&self, arena: &mut Arena, ctx: &mut MergeContext) -> Result<()> {
        arena.expect_revision(self.target, Revision::Target)?;
        debug!("Apply: {}", self);

        let copy = arena.deep_copy(self.node, Revision::Target)?;
        arena.add_child(self.target, copy)?;
        ctx.record(Operation::Add(self.clone()));
        Ok(())
    }
}

impl DeleteOperation {
    pub fn new(node: NodeId, target: NodeId, source: Revision) -> Self {
        Self { node, target, source }
    }

    pub fn apply(&self, arena: &mut Arena, ctx: &mut MergeContext) -> Result<()> {
        arena.expect_revision(self.target, Revision::Target)?;
        debug!("Apply: {} ({})", self, arena.show(self.node));
        ctx.record(Operation::Delete(self.clone()));
        Ok(())
    }
}

impl ConflictOperation {
    /// `node` and `condition` belong to the side being merged; when `is_left`
    /// is false they are placed on the right.
    pub fn new(
        node: Option<NodeId>,
        other: Option<NodeId>,
        target: NodeId,
        condition: Option<String>,
        other_condition: Option<String>,
        base: Option<NodeId>,
        is_left: bool,
    ) -> Self {
        let (left, right, left_condition, right_condition) = if is_left {
            (node, other, condition, other_condition)
        } else {
            (other, node, other_condition, condition)
        };
        Self {
            left,
            right,
            base,
            target,
            left_condition,
            right_condition,
            as_choice: false,
        }
    }

    pub fn apply(&self, arena: &mut Arena, ctx: &mut MergeContext) -> Result<()> {
        arena.expect_revision(self.target, Revision::Target)?;
        debug!("Apply: {}", self);

        let choice_conditions = match (&self.left_condition, &self.right_condition) {
            (Some(left_cond), Some(right_cond)) if ctx.is_conditional_merge() => Some((left_cond, right_cond)),
            _ => None,
        };
        let as_choice = choice_conditions.is_some();
        let node = match choice_conditions {
            Some((left_cond, right_cond)) => self.build_choice(arena, left_cond, right_cond)?,
            None => {
                let left = adopt_optional(arena, self.left)?;
                let right = adopt_optional(arena, self.right)?;
                let base = match self.base {
                    Some(b) if !arena.node(b)?.is_empty_placeholder() => Some(adopt(arena, b)?),
                    _ => None,
                };
                arena.create_conflict(left, right, base)
            }
        };
        arena.add_child(self.target, node)?;
        ctx.record(Operation::Conflict(ConflictOperation {
            as_choice,
            ..self.clone()
        }));
        Ok(())
    }

    fn build_choice(&self, arena: &mut Arena, left_cond: &str, right_cond: &str) -> Result<NodeId> {
        let choice = match self.left {
            Some(left) if arena.node(left)?.is_choice() => adopt(arena, left)?,
            Some(left) => {
                let alternative = adopt(arena, left)?;
                arena.create_choice(vec![Variant {
                    condition: left_cond.to_string(),
                    node: alternative,
                }])
            }
            None => arena.create_choice(Vec::new()),
        };
        if let Some(right) = self.right {
            let alternative = adopt(arena, right)?;
            arena.add_variant(choice, right_cond, alternative)?;
        }
        Ok(choice)
    }
}

impl MergeOperation {
    pub fn new(scenario: MergeScenario, target: NodeId) -> Self {
        Self { scenario, target }
    }

    pub fn apply(&self, arena: &mut Arena, ctx: &mut MergeContext) -> Result<()> {
        arena.expect_revision(self.target, Revision::Target)?;
        let MergeScenario { left, right, .. } = self.scenario;
        let left_rev = arena.revision(left)?;
        let right_rev = arena.revision(right)?;
        if !arena.has_matching(left, right_rev) || !arena.has_matching(right, left_rev) {
            return Err(MergeError::NotMutuallyMatched { left, right });
        }

        debug!("Apply: {}", self);
        ctx.record(Operation::Merge(self.clone()));

        let strategy = arena.node(left)?.merge_strategy(ctx.strategies());
        match strategy {
            MergeStrategy::Ordered => ordered::merge(arena, ctx, &self.scenario, self.target),
            MergeStrategy::Unordered => unordered::merge(arena, ctx, &self.scenario, self.target),
            MergeStrategy::Levelwise => levelwise::merge(arena, ctx, &self.scenario, self.target),
        }
    }
}

/// Take ownership of a detached target node, or copy anything else into the
/// target revision.
fn adopt(arena: &mut Arena, id: NodeId) -> Result<NodeId> {
    let node = arena.node(id)?;
    if node.revision == Revision::Target && node.parent().is_none() {
        Ok(id)
    } else {
        arena.deep_copy(id, Revision::Target)
    }
}

fn adopt_optional(arena: &mut Arena, id: Option<NodeId>) -> Result<Option<NodeId>> {
    id.map(|n| adopt(arena, n)).transpose()
}

fn show_opt(id: Option<NodeId>) -> String {
    id.map_or_else(|| "-".to_string(), |n| n.to_string())
}

impl fmt::Display for AddOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADD {} TO {} FROM {}", self.node, self.target, self.source)
    }
}

impl fmt::Display for DeleteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE {} UNDER {} FROM {}", self.node, self.target, self.source)
    }
}

impl fmt::Display for ConflictOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CONFLICT BETWEEN {} AND {} BASE {} UNDER {}",
            show_opt(self.left),
            show_opt(self.right),
            show_opt(self.base),
            self.target
        )
    }
}

impl fmt::Display for MergeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.scenario;
        write!(
            f,
            "MERGE ({}) {} / {} / {} INTO {}",
            s.merge_type, s.left, s.base, s.right, self.target
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add(op) => op.fmt(f),
            Operation::Delete(op) => op.fmt(f),
            Operation::Conflict(op) => op.fmt(f),
            Operation::Merge(op) => op.fmt(f),
        }
    }
}
