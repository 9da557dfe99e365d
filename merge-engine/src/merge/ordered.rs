//! Merge of position-sensitive child lists.
//!
//! Two cursors walk the left and right children. Children without a partner
//! are suspended until the next resolved pair (the anchor) is reached, then
//! flushed together: one-sided runs are merged node by node, runs from both
//! sides become a single ordering conflict.

use tracing::{debug, error};

use crate::artifact::Arena;
use crate::context::MergeContext;
use crate::error::Result;
use crate::merge::basic::{pair, simple_merge, two_or_three_way_merge};
use crate::operations::ConflictOperation;
use crate::types::{MergeScenario, NodeId, Revision};

pub fn merge(arena: &mut Arena, ctx: &mut MergeContext, scenario: &MergeScenario, target: NodeId) -> Result<()> {
    let left = arena.children(scenario.left)?.to_vec();
    let right = arena.children(scenario.right)?.to_vec();
    let left_rev = arena.revision(scenario.left)?;
    let right_rev = arena.revision(scenario.right)?;

    pair(arena, ctx, &left, &right)?;

    let mut suspended = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() || j < right.len() {
        let l = left.get(i).copied();
        let r = right.get(j).copied();

        if let Some(l) = l {
            if arena.is_merged(l)? {
                debug!("Ordered: skip merged {}", arena.show(l));
                i += 1;
                continue;
            }
        }
        if let Some(r) = r {
            if arena.is_merged(r)? {
                debug!("Ordered: skip merged {}", arena.show(r));
                j += 1;
                continue;
            }
        }
        if let Some(l) = l {
            if arena.pair(l)?.partner().is_none() {
                debug!("Ordered: suspend {}", arena.show(l));
                suspended.push(l);
                i += 1;
                continue;
            }
        }
        if let Some(r) = r {
            if arena.pair(r)?.partner().is_none() {
                debug!("Ordered: suspend {}", arena.show(r));
                suspended.push(r);
                j += 1;
                continue;
            }
        }

        match (l, r) {
            (Some(l), Some(r)) if arena.pair(l)?.partner() == Some(r) => {
                flush(arena, ctx, &mut suspended, target, left_rev, right_rev)?;
                two_or_three_way_merge(arena, ctx, l, r, target)?;
                i += 1;
                j += 1;
            }
            (Some(l), Some(r)) => {
                error!(
                    "Ordered: {} is paired but does not match {}, skipping both",
                    arena.show(l),
                    arena.show(r)
                );
                i += 1;
                j += 1;
            }
            (Some(l), None) => {
                error!("Ordered: partner of {} is out of reach, skipping", arena.show(l));
                i += 1;
            }
            (None, Some(r)) => {
                error!("Ordered: partner of {} is out of reach, skipping", arena.show(r));
                j += 1;
            }
            (None, None) => break,
        }
    }
    flush(arena, ctx, &mut suspended, target, left_rev, right_rev)
}

/// Resolve and empty the suspended buffer.
fn flush(
    arena: &mut Arena,
    ctx: &mut MergeContext,
    suspended: &mut Vec<NodeId>,
    target: NodeId,
    left_rev: Revision,
    right_rev: Revision,
) -> Result<()> {
    if suspended.is_empty() {
        return Ok(());
    }

    let mut left_nodes = Vec::new();
    let mut right_nodes = Vec::new();
    for &node in suspended.iter() {
        let rev = arena.revision(node)?;
        if rev == left_rev {
            left_nodes.push(node);
        } else if rev == right_rev {
            right_nodes.push(node);
        } else {
            error!("Ordered: suspended {} belongs to neither side", arena.show(node));
        }
    }
    suspended.clear();

    if left_nodes.is_empty() || right_nodes.is_empty() {
        for node in left_nodes {
            simple_merge(arena, ctx, node, target, true)?;
        }
        for node in right_nodes {
            simple_merge(arena, ctx, node, target, false)?;
        }
        return Ok(());
    }

    debug!(
        "Ordered: {} left and {} right suspended nodes conflict",
        left_nodes.len(),
        right_nodes.len()
    );
    let left_group = group(arena, target, &left_nodes)?;
    let right_group = group(arena, target, &right_nodes)?;
    ConflictOperation::new(
        Some(left_group),
        Some(right_group),
        target,
        Some(left_rev.name().to_string()),
        Some(right_rev.name().to_string()),
        None,
        true,
    )
    .apply(arena, ctx)
}

/// Container shaped like `target` holding copies of `nodes`, in order. The
/// originals are consumed.
fn group(arena: &mut Arena, target: NodeId, nodes: &[NodeId]) -> Result<NodeId> {
    let container = arena.shallow_copy(target, Revision::Target)?;
    arena.set_group(container)?;
    for &node in nodes {
        let copy = arena.deep_copy(node, Revision::Target)?;
        arena.add_child(container, copy)?;
        arena.set_merged(node)?;
    }
    Ok(container)
}
