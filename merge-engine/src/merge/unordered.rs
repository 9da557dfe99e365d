//! Merge of order-insensitive child collections.

use tracing::debug;

use crate::artifact::Arena;
use crate::context::MergeContext;
use crate::error::Result;
use crate::merge::basic::{pair, simple_merge, two_or_three_way_merge};
use crate::types::{MergeScenario, NodeId};

pub fn merge(arena: &mut Arena, ctx: &mut MergeContext, scenario: &MergeScenario, target: NodeId) -> Result<()> {
    let left = arena.children(scenario.left)?.to_vec();
    let right = arena.children(scenario.right)?.to_vec();

    pair(arena, ctx, &left, &right)?;

    for node in left {
        merge_one(arena, ctx, node, target, true)?;
    }
    for node in right {
        merge_one(arena, ctx, node, target, false)?;
    }
    Ok(())
}

fn merge_one(arena: &mut Arena, ctx: &mut MergeContext, node: NodeId, target: NodeId, is_left: bool) -> Result<()> {
    if arena.is_merged(node)? {
        debug!("Unordered: skip merged {}", arena.show(node));
        return Ok(());
    }
    match arena.pair(node)?.partner() {
        Some(partner) if !arena.is_merged(partner)? => {
            let (l, r) = if is_left { (node, partner) } else { (partner, node) };
            two_or_three_way_merge(arena, ctx, l, r, target)
        }
        _ => simple_merge(arena, ctx, node, target, is_left),
    }
}
