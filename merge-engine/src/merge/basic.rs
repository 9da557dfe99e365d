//! Primitives shared by the merge strategies: pairing of sibling lists, the
//! simple merge of a node without a partner, and the two/three-way merge of a
//! resolved pair.

use tracing::{debug, warn};

use crate::artifact::{Arena, PairState};
use crate::context::MergeContext;
use crate::error::Result;
use crate::operations::{AddOperation, ConflictOperation, DeleteOperation, MergeOperation};
use crate::types::{MergeScenario, MergeType, NodeId, Revision};

/// Resolve partners for every not yet paired node of `left` against `right`,
/// then the other way round.
///
/// Greedy and one pass: a mutual best match becomes a strong pair, a forward
/// match whose back-match is weaker or absent becomes a weak pair, anything
/// else stays unpaired.
pub fn pair(arena: &mut Arena, ctx: &MergeContext, left: &[NodeId], right: &[NodeId]) -> Result<()> {
    for &node in left {
        if !arena.node(node)?.is_paired() {
            find_best_pair_of(arena, ctx, node, right)?;
        }
    }
    for &node in right {
        if !arena.node(node)?.is_paired() {
            find_best_pair_of(arena, ctx, node, left)?;
        }
    }
    Ok(())
}

fn find_best_pair_of(arena: &mut Arena, ctx: &MergeContext, node: NodeId, candidates: &[NodeId]) -> Result<()> {
    let own = arena.revision(node)?;
    let Some(&first) = candidates.first() else {
        return arena.set_pair(node, PairState::Nothing);
    };
    let other = arena.revision(first)?;

    let candidate = arena
        .matching(node, other)
        .copied()
        .filter(|m| m.percentage() >= ctx.threshold() && candidates.contains(&m.partner));
    let Some(forward) = candidate else {
        debug!("Pair: {} has no partner", arena.show(node));
        return arena.set_pair(node, PairState::Nothing);
    };
    let matched = forward.partner;

    match arena.matching(matched, own).copied() {
        Some(back) if back.partner == node => {
            debug!("Pair: {} <-> {}", arena.show(node), arena.show(matched));
            arena.set_pair(node, PairState::Strong(matched))?;
            arena.set_pair(matched, PairState::Strong(node))?;
        }
        back if back.is_none_or(|b| b.percentage() < forward.percentage()) => {
            warn!(
                "Pair: weak pair {} -> {}",
                arena.show(node),
                arena.show(matched)
            );
            arena.set_pair(node, PairState::Weak(matched))?;
            arena.set_pair(matched, PairState::Weak(node))?;
        }
        _ => {
            debug!(
                "Pair: {} prefers another partner, leaving {} unpaired",
                arena.show(matched),
                arena.show(node)
            );
        }
    }
    Ok(())
}

/// Merge `node` of one side that has no partner on the other side.
///
/// A node that existed in base is deleted when unchanged and conflicts with
/// its base counterpart when changed. A node without a base counterpart is a
/// genuine addition.
pub fn simple_merge(
    arena: &mut Arena,
    ctx: &mut MergeContext,
    node: NodeId,
    target: NodeId,
    is_left: bool,
) -> Result<()> {
    let own = arena.revision(node)?;
    let other = if is_left { Revision::Right } else { Revision::Left };

    match arena.matching(node, Revision::Base).copied() {
        Some(base) if base.percentage() > ctx.threshold() => {
            if arena.has_changes(node, Revision::Base) {
                debug!("Simple merge: {} changed but deleted on {}", arena.show(node), other);
                ConflictOperation::new(
                    Some(node),
                    None,
                    target,
                    Some(own.name().to_string()),
                    Some(other.name().to_string()),
                    Some(base.partner),
                    is_left,
                )
                .apply(arena, ctx)
            } else {
                DeleteOperation::new(node, target, own).apply(arena, ctx)
            }
        }
        _ => {
            AddOperation::new(node, target, own).apply(arena, ctx)?;
            arena.set_merged(node)
        }
    }
}

/// Merge a resolved pair into a fresh child of `target`.
///
/// The pair is three-way when `left` matches a base node, two-way against an
/// empty base placeholder otherwise.
pub fn two_or_three_way_merge(
    arena: &mut Arena,
    ctx: &mut MergeContext,
    left: NodeId,
    right: NodeId,
    target: NodeId,
) -> Result<()> {
    let base_partner = arena.matching(left, Revision::Base).map(|m| m.partner);
    let (merge_type, base) = match base_partner {
        Some(b) => (MergeType::ThreeWay, b),
        None => (MergeType::TwoWay, arena.create_empty(left, Revision::Base)?),
    };

    let child = arena.shallow_copy(left, Revision::Target)?;
    arena.add_child(target, child)?;

    arena.set_merged(left)?;
    arena.set_merged(right)?;

    let scenario = MergeScenario::new(merge_type, left, base, right);
    MergeOperation::new(scenario, child).apply(arena, ctx)
}
