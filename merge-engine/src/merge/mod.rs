//! Merge strategies and the whole-tree entry point.
//!
//! [`merge_trees`] matches the input revisions, creates the target root and
//! applies the root [`MergeOperation`]. From there the strategy of each node
//! (ordered, unordered or level-wise) walks its matched children and issues
//! further operations.

pub mod basic;
pub mod levelwise;
pub mod ordered;
pub mod unordered;

use tracing::{debug, info};

use crate::artifact::Arena;
use crate::context::{MergeContext, MergeStats};
use crate::error::{MergeError, Result};
use crate::matcher::match_revisions;
use crate::operations::MergeOperation;
use crate::types::{MergeScenario, MergeType, NodeId, Revision};

/// Roots of the input revisions. Without a base the merge is two-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeInput {
    pub left: NodeId,
    pub base: Option<NodeId>,
    pub right: NodeId,
}

impl MergeInput {
    pub fn three_way(left: NodeId, base: NodeId, right: NodeId) -> Self {
        Self {
            left,
            base: Some(base),
            right,
        }
    }

    pub fn two_way(left: NodeId, right: NodeId) -> Self {
        Self {
            left,
            base: None,
            right,
        }
    }
}

/// Result of one merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Root of the merged tree, in the target revision.
    pub target: NodeId,
    pub merge_type: MergeType,
    pub stats: MergeStats,
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        self.stats.has_conflicts()
    }
}

/// Merge the input trees into a new target tree.
///
/// The input trees are consumed by the run: their `merged` and pair flags are
/// set as nodes are visited, so a second run needs fresh inputs. Any error
/// aborts the run and the partially built target must be discarded.
pub fn merge_trees(arena: &mut Arena, input: MergeInput, ctx: &mut MergeContext) -> Result<MergeOutcome> {
    ctx.config().validate()?;
    arena.expect_revision(input.left, Revision::Left)?;
    arena.expect_revision(input.right, Revision::Right)?;
    if let Some(base) = input.base {
        arena.expect_revision(base, Revision::Base)?;
    }
    let first_op = ctx.operations().len();

    let (merge_type, base) = match input.base {
        Some(base) => {
            match_revisions(arena, input.left, base, ctx.strategies(), ctx.similarity())?;
            match_revisions(arena, input.right, base, ctx.strategies(), ctx.similarity())?;
            (MergeType::ThreeWay, base)
        }
        None => (MergeType::TwoWay, arena.create_empty(input.left, Revision::Base)?),
    };

    let root = match_revisions(arena, input.left, input.right, ctx.strategies(), ctx.similarity())?;
    if root.is_none_or(|m| m.partner != input.right) {
        let left = arena.node(input.left)?;
        let right = arena.node(input.right)?;
        return Err(MergeError::RootsDoNotMatch {
            left: input.left,
            left_kind: left.kind.clone(),
            right: input.right,
            right_kind: right.kind.clone(),
        });
    }

    let target = arena.shallow_copy(input.left, Revision::Target)?;
    arena.set_merged(input.left)?;
    arena.set_merged(input.right)?;
    debug!("Merge: {} run into target root {}", merge_type, target);

    let scenario = MergeScenario::new(merge_type, input.left, base, input.right);
    MergeOperation::new(scenario, target).apply(arena, ctx)?;

    let stats = MergeStats::from_operations(&ctx.operations()[first_op..]);
    info!(
        "Merge finished: {} adds, {} deletes, {} conflicts, {} choices, {} merges",
        stats.adds, stats.deletes, stats.conflicts, stats.choices, stats.merges
    );
    Ok(MergeOutcome {
        target,
        merge_type,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::NodeContent;
    use crate::context::MergeConfig;
    use crate::operations::Operation;
    use crate::types::{MergeStrategy, StrategyTable};

    fn list(arena: &mut Arena, rev: Revision, kind: &str, labels: &[&str]) -> NodeId {
        let root = arena.new_node(rev, kind, "");
        for l in labels {
            let c = arena.new_node(rev, "stmt", *l);
            arena.add_child(root, c).unwrap();
        }
        root
    }

    fn labels(arena: &Arena, id: NodeId) -> Vec<String> {
        arena
            .children(id)
            .unwrap()
            .iter()
            .map(|&c| arena.node(c).unwrap().label.clone())
            .collect()
    }

    fn three_way(kind: &str, base: &[&str], left: &[&str], right: &[&str], config: MergeConfig) -> (Arena, MergeOutcome, MergeContext) {
        let mut arena = Arena::new();
        let b = list(&mut arena, Revision::Base, kind, base);
        let l = list(&mut arena, Revision::Left, kind, left);
        let r = list(&mut arena, Revision::Right, kind, right);
        let mut ctx = MergeContext::new(config);
        let outcome = merge_trees(&mut arena, MergeInput::three_way(l, b, r), &mut ctx).unwrap();
        (arena, outcome, ctx)
    }

    #[test]
    fn test_identical_revisions_merge_cleanly() {
        let (arena, outcome, _) = three_way("block", &["a", "b"], &["a", "b"], &["a", "b"], MergeConfig::default());
        assert_eq!(labels(&arena, outcome.target), vec!["a", "b"]);
        assert_eq!(outcome.merge_type, MergeType::ThreeWay);
        assert!(!outcome.has_conflicts());
        assert_eq!(outcome.stats.adds, 0);
    }

    #[test]
    fn test_left_insertion_keeps_order() {
        let (arena, outcome, _) = three_way("block", &["p", "q"], &["p", "n", "q"], &["p", "q"], MergeConfig::default());
        assert_eq!(labels(&arena, outcome.target), vec!["p", "n", "q"]);
        assert_eq!(outcome.stats.adds, 1);
    }

    #[test]
    fn test_run_of_insertions_yields_adds_only() {
        let (arena, outcome, _) = three_way(
            "block",
            &["p", "q"],
            &["p", "x", "y", "z", "q"],
            &["p", "q"],
            MergeConfig::default(),
        );
        assert_eq!(labels(&arena, outcome.target), vec!["p", "x", "y", "z", "q"]);
        assert_eq!(outcome.stats.adds, 3);
        assert_eq!(outcome.stats.conflicts, 0);
    }

    #[test]
    fn test_unchanged_node_deleted_on_other_side() {
        let (arena, outcome, _) = three_way("block", &["a", "b", "c"], &["a", "b", "c"], &["a", "c"], MergeConfig::default());
        assert_eq!(labels(&arena, outcome.target), vec!["a", "c"]);
        assert_eq!(outcome.stats.deletes, 1);
    }

    #[test]
    fn test_concurrent_insertions_yield_one_conflict() {
        let (arena, outcome, ctx) = three_way("block", &["a"], &["a", "x"], &["a", "y"], MergeConfig::default());
        assert_eq!(outcome.stats.conflicts, 1);
        let conflict = arena.children(outcome.target).unwrap()[1];
        match arena.node(conflict).unwrap().content {
            NodeContent::Conflict {
                left: Some(l),
                right: Some(r),
                base: None,
            } => {
                assert_eq!(labels(&arena, l), vec!["x"]);
                assert_eq!(labels(&arena, r), vec!["y"]);
            }
            ref other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(
            ctx.operations()
                .iter()
                .filter(|op| matches!(op, Operation::Conflict(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_unordered_merge_accepts_both_additions() {
        let config = MergeConfig {
            strategies: StrategyTable::new().with("members", MergeStrategy::Unordered),
            ..MergeConfig::default()
        };
        let (arena, outcome, _) = three_way("members", &["a", "b"], &["b", "a", "x"], &["a", "b", "y"], config);
        let mut merged = labels(&arena, outcome.target);
        merged.sort();
        assert_eq!(merged, vec!["a", "b", "x", "y"]);
        assert!(!outcome.has_conflicts());
    }

    #[test]
    fn test_unordered_merge_drops_deleted_member() {
        let config = MergeConfig {
            strategies: StrategyTable::new().with("members", MergeStrategy::Unordered),
            ..MergeConfig::default()
        };
        let (arena, outcome, _) = three_way("members", &["a", "b"], &["b", "a"], &["a"], config);
        assert_eq!(labels(&arena, outcome.target), vec!["a"]);
        assert_eq!(outcome.stats.deletes, 1);
    }

    #[test]
    fn test_levelwise_takes_changed_slot() {
        let config = MergeConfig {
            strategies: StrategyTable::new().with("if", MergeStrategy::Levelwise),
            ..MergeConfig::default()
        };
        let (arena, outcome, _) = three_way("if", &["c", "t", "e"], &["c", "t2", "e"], &["c", "t", "e"], config);
        assert_eq!(labels(&arena, outcome.target), vec!["c", "t2", "e"]);
        assert!(!outcome.has_conflicts());
    }

    #[test]
    fn test_levelwise_both_changed_conflicts() {
        let config = MergeConfig {
            strategies: StrategyTable::new().with("if", MergeStrategy::Levelwise),
            ..MergeConfig::default()
        };
        let (_, outcome, _) = three_way("if", &["c", "t", "e"], &["c", "t1", "e"], &["c", "t2", "e"], config);
        assert_eq!(outcome.stats.conflicts, 1);
    }

    #[test]
    fn test_levelwise_arity_mismatch_is_fatal() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "if", &["c", "t", "e"]);
        let r = list(&mut arena, Revision::Right, "if", &["c", "t"]);
        let mut ctx = MergeContext::new(MergeConfig {
            strategies: StrategyTable::new().with("if", MergeStrategy::Levelwise),
            ..MergeConfig::default()
        });
        let err = merge_trees(&mut arena, MergeInput::two_way(l, r), &mut ctx).unwrap_err();
        assert!(matches!(err, MergeError::ChildCountMismatch { left_count: 3, right_count: 2, .. }));
    }

    #[test]
    fn test_two_way_merge() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "block", &["a", "x"]);
        let r = list(&mut arena, Revision::Right, "block", &["a"]);
        let mut ctx = MergeContext::default();
        let outcome = merge_trees(&mut arena, MergeInput::two_way(l, r), &mut ctx).unwrap();
        assert_eq!(outcome.merge_type, MergeType::TwoWay);
        assert_eq!(labels(&arena, outcome.target), vec!["a", "x"]);
    }

    #[test]
    fn test_roots_must_match() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "block", &["a"]);
        let r = list(&mut arena, Revision::Right, "body", &["a"]);
        let mut ctx = MergeContext::default();
        let err = merge_trees(&mut arena, MergeInput::two_way(l, r), &mut ctx).unwrap_err();
        assert!(matches!(err, MergeError::RootsDoNotMatch { .. }));
    }

    #[test]
    fn test_inputs_must_carry_their_revision() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Right, "block", &[]);
        let r = list(&mut arena, Revision::Right, "block", &[]);
        let mut ctx = MergeContext::default();
        let err = merge_trees(&mut arena, MergeInput::two_way(l, r), &mut ctx).unwrap_err();
        assert!(matches!(err, MergeError::WrongRevision { expected: Revision::Left, .. }));
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "block", &[]);
        let r = list(&mut arena, Revision::Right, "block", &[]);
        let mut ctx = MergeContext::new(MergeConfig {
            threshold: -0.1,
            ..MergeConfig::default()
        });
        let err = merge_trees(&mut arena, MergeInput::two_way(l, r), &mut ctx).unwrap_err();
        assert_eq!(err, MergeError::InvalidThreshold(-0.1));
    }
}
