//! Merge of fixed-arity children aligned by position.

use tracing::warn;

use crate::artifact::Arena;
use crate::context::MergeContext;
use crate::error::{MergeError, Result};
use crate::merge::basic::two_or_three_way_merge;
use crate::operations::{AddOperation, ConflictOperation};
use crate::types::{MergeScenario, NodeId, Revision};

pub fn merge(arena: &mut Arena, ctx: &mut MergeContext, scenario: &MergeScenario, target: NodeId) -> Result<()> {
    let left = arena.children(scenario.left)?.to_vec();
    let right = arena.children(scenario.right)?.to_vec();
    if left.len() != right.len() {
        return Err(MergeError::ChildCountMismatch {
            left: scenario.left,
            right: scenario.right,
            left_count: left.len(),
            right_count: right.len(),
        });
    }

    for (&l, &r) in left.iter().zip(&right) {
        if arena.mutually_matched(l, r)? {
            two_or_three_way_merge(arena, ctx, l, r, target)?;
            continue;
        }

        warn!(
            "Levelwise: slots {} and {} do not correspond",
            arena.show(l),
            arena.show(r)
        );
        let left_rev = arena.revision(l)?;
        let right_rev = arena.revision(r)?;
        arena.set_merged(l)?;
        arena.set_merged(r)?;

        if unchanged_from_base(arena, l) {
            AddOperation::new(r, target, right_rev).apply(arena, ctx)?;
        } else if unchanged_from_base(arena, r) {
            AddOperation::new(l, target, left_rev).apply(arena, ctx)?;
        } else {
            // anchored on the left slot only
            let base = match arena.matching(l, Revision::Base).map(|m| m.partner) {
                Some(b) => b,
                None => arena.create_empty(l, Revision::Base)?,
            };
            ConflictOperation::new(
                Some(l),
                Some(r),
                target,
                Some(left_rev.name().to_string()),
                Some(right_rev.name().to_string()),
                Some(base),
                true,
            )
            .apply(arena, ctx)?;
        }
    }
    Ok(())
}

fn unchanged_from_base(arena: &Arena, node: NodeId) -> bool {
    arena.has_matching(node, Revision::Base) && !arena.has_changes(node, Revision::Base)
}
