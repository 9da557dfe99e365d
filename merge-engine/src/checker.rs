//! Verification oracle comparing an expected tree with an actual one.
//!
//! The comparison re-runs the matcher between the two trees without touching
//! the matching table, so it can be used on a finished target tree.
//!
//! Conflict and choice alternatives are not part of the tree structure the
//! matcher walks. When the actual tree carries any, it is resolved twice
//! (every conflict replaced by its left alternative, then by its right one),
//! both resolutions are scored, and the worse one is reported. Such a tree is
//! never fully matched.

use serde::Serialize;
use tracing::debug;

use crate::artifact::{Arena, NodeContent};
use crate::error::Result;
use crate::matcher::{Matcher, NodeSimilarity};
use crate::types::{NodeId, Revision, StrategyTable};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckReport {
    /// Matched node pairs between the two trees.
    pub score: usize,
    /// `size(expected) + size(actual)`.
    pub combined_size: usize,
    /// Nodes of either tree without a counterpart.
    pub unmatched: usize,
    pub unmatched_rate: f64,
    pub fully_matched: bool,
    /// The actual tree holds conflict or choice nodes.
    pub has_conflicts: bool,
}

pub fn check<S: NodeSimilarity + ?Sized>(
    arena: &Arena,
    expected: NodeId,
    actual: NodeId,
    strategies: &StrategyTable,
    similarity: &S,
) -> Result<CheckReport> {
    if !has_alternatives(arena, actual)? {
        return score(arena, expected, actual, strategies, similarity);
    }

    let mut scratch = arena.clone();
    let left = resolve_root(&mut scratch, actual, Revision::Left)?;
    let right = resolve_root(&mut scratch, actual, Revision::Right)?;
    let left_report = score(&scratch, expected, left, strategies, similarity)?;
    let right_report = score(&scratch, expected, right, strategies, similarity)?;
    debug!(
        "Check: left resolution {} unmatched, right resolution {} unmatched",
        left_report.unmatched, right_report.unmatched
    );

    let worse = if left_report.unmatched_rate > right_report.unmatched_rate {
        left_report
    } else {
        right_report
    };
    Ok(CheckReport {
        fully_matched: false,
        has_conflicts: true,
        ..worse
    })
}

/// Whether the two trees match completely.
pub fn trees_equal<S: NodeSimilarity + ?Sized>(
    arena: &Arena,
    expected: NodeId,
    actual: NodeId,
    strategies: &StrategyTable,
    similarity: &S,
) -> Result<bool> {
    Ok(check(arena, expected, actual, strategies, similarity)?.fully_matched)
}

fn score<S: NodeSimilarity + ?Sized>(
    arena: &Arena,
    expected: NodeId,
    actual: NodeId,
    strategies: &StrategyTable,
    similarity: &S,
) -> Result<CheckReport> {
    let score = Matcher::new(arena, strategies, similarity).score(expected, actual)?;
    let combined_size = arena.tree_size(expected)? + arena.tree_size(actual)?;
    let unmatched = combined_size.saturating_sub(2 * score);
    Ok(CheckReport {
        score,
        combined_size,
        unmatched,
        unmatched_rate: unmatched as f64 / combined_size as f64,
        fully_matched: unmatched == 0,
        has_conflicts: false,
    })
}

fn has_alternatives(arena: &Arena, id: NodeId) -> Result<bool> {
    let node = arena.node(id)?;
    if node.is_conflict() || node.is_choice() {
        return Ok(true);
    }
    for &child in node.children() {
        if has_alternatives(arena, child)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Resolved copy of the tree at `actual`. A root that resolves to several
/// nodes (or none) is wrapped in a fresh node of the root's kind.
fn resolve_root(arena: &mut Arena, actual: NodeId, side: Revision) -> Result<NodeId> {
    let mut nodes = resolve(arena, actual, side)?;
    if nodes.len() == 1 {
        return Ok(nodes.remove(0));
    }
    let kind = arena.node(actual)?.kind.clone();
    let root = arena.new_node(Revision::Target, kind, "");
    for node in nodes {
        arena.add_child(root, node)?;
    }
    Ok(root)
}

/// Plain nodes standing in for `id` once every conflict below it takes the
/// `side` alternative. Grouped alternatives contribute their children.
fn resolve(arena: &mut Arena, id: NodeId, side: Revision) -> Result<Vec<NodeId>> {
    let alternative = match arena.node(id)?.content.clone() {
        NodeContent::Plain => {
            let copy = arena.shallow_copy(id, Revision::Target)?;
            let children = arena.children(id)?.to_vec();
            for child in children {
                for resolved in resolve(arena, child, side)? {
                    arena.add_child(copy, resolved)?;
                }
            }
            return Ok(vec![copy]);
        }
        NodeContent::Conflict { left, right, .. } => {
            if side == Revision::Left {
                left
            } else {
                right
            }
        }
        NodeContent::Choice { variants } => {
            let fallback = if side == Revision::Left {
                variants.first()
            } else {
                variants.last()
            };
            variants
                .iter()
                .find(|v| v.condition == side.name())
                .or(fallback)
                .map(|v| v.node)
        }
    };

    let Some(alternative) = alternative else {
        return Ok(Vec::new());
    };
    if !arena.node(alternative)?.is_group() {
        return resolve(arena, alternative, side);
    }
    let mut spliced = Vec::new();
    for child in arena.children(alternative)?.to_vec() {
        spliced.extend(resolve(arena, child, side)?);
    }
    Ok(spliced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ExportedNode, TreeDoc};
    use crate::matcher::LabelSimilarity;

    fn block(labels: &[&str]) -> TreeDoc {
        TreeDoc::new("block", "").children(labels.iter().map(|l| TreeDoc::new("stmt", *l)))
    }

    fn exported(json: &str) -> ExportedNode {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_identical_trees_fully_match() {
        let mut arena = Arena::new();
        let e = arena.load(&block(&["a", "b"]), Revision::Expected).unwrap();
        let a = arena.load(&block(&["a", "b"]), Revision::Target).unwrap();
        let report = check(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap();
        assert!(report.fully_matched);
        assert!(!report.has_conflicts);
        assert_eq!(report.unmatched, 0);
        assert!(report.unmatched_rate.abs() < f64::EPSILON);
        // oracle runs leave no matchings behind
        assert!(arena.matchings().is_empty());
    }

    #[test]
    fn test_missing_node_is_reported() {
        let mut arena = Arena::new();
        let e = arena.load(&block(&["a", "b"]), Revision::Expected).unwrap();
        let a = arena.load(&block(&["a"]), Revision::Target).unwrap();
        let report = check(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap();
        assert_eq!(report.score, 2);
        assert_eq!(report.unmatched, 1);
        assert!((report.unmatched_rate - 0.2).abs() < 1e-9);
        assert!(!trees_equal(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap());
    }

    #[test]
    fn test_conflict_reports_the_worse_resolution() {
        let mut arena = Arena::new();
        let e = arena.load(&block(&["x"]), Revision::Expected).unwrap();
        let actual = exported(
            r#"{"kind":"block","children":[{"conflict":{"left":{"kind":"stmt","label":"x"},"right":{"kind":"stmt","label":"y"}}}]}"#,
        );
        let a = arena.load_exported(&actual, Revision::Target).unwrap();
        let before = arena.len();

        let report = check(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap();
        // the left resolution equals the expected tree, the right one does not
        assert!(report.has_conflicts);
        assert!(!report.fully_matched);
        assert_eq!(report.score, 1);
        assert_eq!(report.combined_size, 4);
        assert_eq!(report.unmatched, 2);
        assert_eq!(arena.len(), before);
    }

    #[test]
    fn test_differing_conflicts_do_not_match() {
        let mut arena = Arena::new();
        let e = arena
            .load_exported(
                &exported(
                    r#"{"kind":"block","children":[{"conflict":{"left":{"kind":"stmt","label":"x"},"right":{"kind":"stmt","label":"y"}}}]}"#,
                ),
                Revision::Expected,
            )
            .unwrap();
        let a = arena
            .load_exported(
                &exported(
                    r#"{"kind":"block","children":[{"conflict":{"left":{"kind":"stmt","label":"p"},"right":{"kind":"stmt","label":"q"}}}]}"#,
                ),
                Revision::Target,
            )
            .unwrap();
        let report = check(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap();
        assert!(!report.fully_matched);
        assert_eq!(report.unmatched, 2);
        assert!(!trees_equal(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap());
    }

    #[test]
    fn test_grouped_alternatives_are_spliced() {
        let mut arena = Arena::new();
        let e = arena.load(&block(&["a", "x1", "x2"]), Revision::Expected).unwrap();
        let actual = exported(
            r#"{"kind":"block","children":[
                {"kind":"stmt","label":"a"},
                {"conflict":{
                    "left":{"kind":"block","group":true,"children":[{"kind":"stmt","label":"x1"},{"kind":"stmt","label":"x2"}]},
                    "right":{"kind":"block","group":true,"children":[{"kind":"stmt","label":"y"}]}
                }}
            ]}"#,
        );
        let a = arena.load_exported(&actual, Revision::Target).unwrap();

        let report = check(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap();
        // right resolution: block[a, y] against block[a, x1, x2]
        assert_eq!(report.combined_size, 7);
        assert_eq!(report.score, 2);
        assert_eq!(report.unmatched, 3);
        assert!(!report.fully_matched);
    }

    #[test]
    fn test_choice_resolves_by_condition() {
        let mut arena = Arena::new();
        let e = arena.load(&block(&["y"]), Revision::Expected).unwrap();
        let actual = exported(
            r#"{"kind":"block","children":[{"choice":[
                {"condition":"right","node":{"kind":"stmt","label":"y"}},
                {"condition":"left","node":{"kind":"stmt","label":"x"}}
            ]}]}"#,
        );
        let a = arena.load_exported(&actual, Revision::Target).unwrap();

        let report = check(&arena, e, a, &StrategyTable::new(), &LabelSimilarity).unwrap();
        // the left variant is the mismatching one even though it is listed last
        assert!(report.has_conflicts);
        assert_eq!(report.unmatched, 2);
        assert!(!report.fully_matched);
    }
}
