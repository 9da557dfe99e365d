//! Tree matching between two revisions.
//!
//! Computes the best structural alignment of two trees and records a
//! [`Matching`](crate::matching::Matching) for every aligned node pair:
//! - **Ordered** children: Yang's algorithm (weighted LCS, O(n·m)), which
//!   preserves relative order.
//! - **Unordered** children: maximum weight bipartite matching via the
//!   Hungarian algorithm (O(n³)).
//! - **Level-wise** children of equal arity: aligned strictly by position.
//!
//! The score of a pair is the similarity of the two roots plus the scores of
//! their aligned children, i.e. the number of equivalent node pairs found
//! when every node similarity is 0 or 1.

use std::collections::HashMap;

use tracing::debug;

use crate::artifact::{Arena, Artifact};
use crate::error::Result;
use crate::matching::Matching;
use crate::types::{MergeStrategy, NodeId, StrategyTable};

/// The injected per-node similarity primitive. A score of 0 means the two
/// nodes can never correspond.
pub trait NodeSimilarity {
    fn similarity(&self, left: &Artifact, right: &Artifact) -> usize;
}

/// Nodes are equivalent when kind and label are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelSimilarity;

impl NodeSimilarity for LabelSimilarity {
    fn similarity(&self, left: &Artifact, right: &Artifact) -> usize {
        usize::from(left.kind == right.kind && left.label == right.label)
    }
}

impl<F> NodeSimilarity for F
where
    F: Fn(&Artifact, &Artifact) -> usize,
{
    fn similarity(&self, left: &Artifact, right: &Artifact) -> usize {
        self(left, right)
    }
}

/// A matched pair of nodes across two revisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPair {
    pub left: NodeId,
    pub right: NodeId,
    pub score: usize,
    pub combined_size: usize,
}

#[derive(Debug, Clone, Default)]
struct Alignment {
    score: usize,
    children: Vec<(usize, usize)>,
}

/// Memoizing matcher over one arena.
pub struct Matcher<'a, S: ?Sized> {
    arena: &'a Arena,
    strategies: &'a StrategyTable,
    similarity: &'a S,
    memo: HashMap<(NodeId, NodeId), Alignment>,
}

impl<'a, S: NodeSimilarity + ?Sized> Matcher<'a, S> {
    pub fn new(arena: &'a Arena, strategies: &'a StrategyTable, similarity: &'a S) -> Self {
        Self {
            arena,
            strategies,
            similarity,
            memo: HashMap::new(),
        }
    }

    /// Similarity score of the subtrees rooted at `left` and `right`.
    pub fn score(&mut self, left: NodeId, right: NodeId) -> Result<usize> {
        Ok(self.align(left, right)?.score)
    }

    /// Compute matches between two trees, returning every matched pair of the
    /// best alignment, roots first. Empty when the roots cannot correspond.
    pub fn match_trees(&mut self, left: NodeId, right: NodeId) -> Result<Vec<MatchPair>> {
        let mut pairs = Vec::new();
        self.collect(left, right, &mut pairs)?;
        Ok(pairs)
    }

    fn collect(&mut self, left: NodeId, right: NodeId, pairs: &mut Vec<MatchPair>) -> Result<()> {
        let alignment = self.align(left, right)?;
        if alignment.score == 0 {
            return Ok(());
        }
        let arena = self.arena;
        pairs.push(MatchPair {
            left,
            right,
            score: alignment.score,
            combined_size: arena.tree_size(left)? + arena.tree_size(right)?,
        });

        let left_children = arena.children(left)?;
        let right_children = arena.children(right)?;
        for (i, j) in alignment.children {
            self.collect(left_children[i], right_children[j], pairs)?;
        }
        Ok(())
    }

    fn align(&mut self, left: NodeId, right: NodeId) -> Result<Alignment> {
        if let Some(done) = self.memo.get(&(left, right)) {
            return Ok(done.clone());
        }

        let arena = self.arena;
        let l = arena.node(left)?;
        let r = arena.node(right)?;
        let root = self.similarity.similarity(l, r);
        if root == 0 {
            self.memo.insert((left, right), Alignment::default());
            return Ok(Alignment::default());
        }

        let strategy = l.merge_strategy(self.strategies);
        let left_children = l.children();
        let right_children = r.children();

        let mut weights = vec![vec![0usize; right_children.len()]; left_children.len()];
        for (i, &lc) in left_children.iter().enumerate() {
            for (j, &rc) in right_children.iter().enumerate() {
                weights[i][j] = self.score(lc, rc)?;
            }
        }

        let children = match strategy {
            MergeStrategy::Unordered => bipartite_match(&weights),
            MergeStrategy::Levelwise if left_children.len() == right_children.len() => {
                positional_match(&weights)
            }
            MergeStrategy::Ordered | MergeStrategy::Levelwise => yang_match(&weights),
        };
        let score = root + children.iter().map(|&(i, j)| weights[i][j]).sum::<usize>();

        let alignment = Alignment { score, children };
        self.memo.insert((left, right), alignment.clone());
        Ok(alignment)
    }
}

/// Match two whole trees and store the resulting matchings in the arena,
/// replacing any earlier matchings between the two revisions. Returns the
/// matching of `left` into the revision of `right`, if the roots correspond.
pub fn match_revisions<S: NodeSimilarity + ?Sized>(
    arena: &mut Arena,
    left: NodeId,
    right: NodeId,
    strategies: &StrategyTable,
    similarity: &S,
) -> Result<Option<Matching>> {
    let rev_left = arena.revision(left)?;
    let rev_right = arena.revision(right)?;

    let pairs = Matcher::new(arena, strategies, similarity).match_trees(left, right)?;

    let revisions: Vec<_> = (0..arena.len())
        .map(|id| arena.node(id).map(|n| n.revision))
        .collect::<Result<_>>()?;
    arena
        .matchings_mut()
        .clear_between(rev_left, rev_right, |id| revisions[id]);

    for pair in &pairs {
        arena.matchings_mut().insert(
            pair.left,
            rev_left,
            pair.right,
            rev_right,
            pair.score,
            pair.combined_size,
        );
    }
    debug!(
        "Match: {} <-> {}: {} pairs",
        rev_left,
        rev_right,
        pairs.len()
    );

    Ok(arena.matching(left, rev_right).copied())
}

/// Yang's algorithm for ordered sequence matching.
///
/// Dynamic programming over the weight matrix finds the maximum weight
/// order-preserving matching. Returns `(left index, right index)` pairs in
/// order.
///
/// Reference: Yang (1991), "Identifying Syntactic Differences Between Two Programs"
fn yang_match(weights: &[Vec<usize>]) -> Vec<(usize, usize)> {
    let n = weights.len();
    let m = weights.first().map_or(0, Vec::len);
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    let mut choice = vec![vec![0u8; m + 1]; n + 1]; // 1=match, 2=skip-left, 3=skip-right

    for i in 1..=n {
        for j in 1..=m {
            let w = weights[i - 1][j - 1];
            let match_score = if w > 0 { dp[i - 1][j - 1] + w } else { 0 };
            let skip_left = dp[i - 1][j];
            let skip_right = dp[i][j - 1];

            if match_score >= skip_left && match_score >= skip_right && match_score > 0 {
                dp[i][j] = match_score;
                choice[i][j] = 1;
            } else if skip_left >= skip_right {
                dp[i][j] = skip_left;
                choice[i][j] = 2;
            } else {
                dp[i][j] = skip_right;
                choice[i][j] = 3;
            }
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        match choice[i][j] {
            1 => {
                pairs.push((i - 1, j - 1));
                i -= 1;
                j -= 1;
            }
            2 => i -= 1,
            3 => j -= 1,
            _ => break,
        }
    }
    pairs.reverse();
    pairs
}

/// Slot `i` on the left corresponds to slot `i` on the right, when they match
/// at all.
fn positional_match(weights: &[Vec<usize>]) -> Vec<(usize, usize)> {
    (0..weights.len())
        .filter(|&i| weights[i].get(i).is_some_and(|&w| w > 0))
        .map(|i| (i, i))
        .collect()
}

/// Bipartite maximum weight matching for unordered children.
///
/// Reference: JDime (Apel et al.), LASTMERGE (2025)
fn bipartite_match(weights: &[Vec<usize>]) -> Vec<(usize, usize)> {
    let n = weights.len();
    let m = weights.first().map_or(0, Vec::len);
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let size = n.max(m);
    let mut square = vec![vec![0i64; size]; size];
    for (i, row) in weights.iter().enumerate() {
        for (j, &w) in row.iter().enumerate() {
            square[i][j] = w as i64;
        }
    }

    let assignment = hungarian_max(&square, size);
    let mut pairs: Vec<(usize, usize)> = assignment
        .iter()
        .enumerate()
        .filter(|&(i, &j)| i < n && j < m && square[i][j] > 0)
        .map(|(i, &j)| (i, j))
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Hungarian algorithm for maximum weight matching.
/// Converts to minimum cost by subtracting from the maximum weight.
fn hungarian_max(weights: &[Vec<i64>], n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }

    let max_w = weights
        .iter()
        .flat_map(|row| row.iter())
        .copied()
        .max()
        .unwrap_or(0);

    let mut cost = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..n {
            cost[i][j] = max_w - weights[i][j];
        }
    }

    // Kuhn-Munkres
    let mut u = vec![0i64; n + 1];
    let mut v = vec![0i64; n + 1];
    let mut p = vec![0usize; n + 1]; // p[j] = row assigned to col j
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![i64::MAX; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = i64::MAX;
            let mut j1 = 0usize;

            for j in 1..=n {
                if !used[j] {
                    let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    // result[i] = column assigned to row i
    let mut result = vec![0usize; n];
    for j in 1..=n {
        if p[j] > 0 {
            result[p[j] - 1] = j - 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Revision;

    fn leaf(arena: &mut Arena, rev: Revision, val: &str) -> NodeId {
        arena.new_node(rev, "ident", val)
    }

    fn list(arena: &mut Arena, rev: Revision, kind: &str, vals: &[&str]) -> NodeId {
        let root = arena.new_node(rev, kind, "");
        for v in vals {
            let c = leaf(arena, rev, v);
            arena.add_child(root, c).unwrap();
        }
        root
    }

    #[test]
    fn test_yang_match_identical() {
        let w = vec![vec![1, 0, 0], vec![0, 1, 0], vec![0, 0, 1]];
        assert_eq!(yang_match(&w), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_yang_match_partial() {
        // left a b c, right a c
        let w = vec![vec![1, 0], vec![0, 0], vec![0, 1]];
        assert_eq!(yang_match(&w), vec![(0, 0), (2, 1)]);
    }

    #[test]
    fn test_yang_match_never_crosses() {
        // left a b, right b a
        let w = vec![vec![0, 1], vec![1, 0]];
        assert_eq!(yang_match(&w).len(), 1);
    }

    #[test]
    fn test_bipartite_match_swapped() {
        let w = vec![vec![0, 1], vec![1, 0]];
        assert_eq!(bipartite_match(&w), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_hungarian_simple() {
        let weights = vec![vec![3, 1], vec![1, 3]];
        let assignment = hungarian_max(&weights, 2);
        assert_eq!(assignment[0], 0);
        assert_eq!(assignment[1], 1);
    }

    #[test]
    fn test_positional_match_skips_mismatched_slots() {
        let w = vec![vec![1, 0, 0], vec![0, 0, 1], vec![0, 0, 1]];
        assert_eq!(positional_match(&w), vec![(0, 0), (2, 2)]);
    }

    #[test]
    fn test_score_counts_equivalent_nodes() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "block", &["a", "b", "c"]);
        let r = list(&mut arena, Revision::Right, "block", &["a", "c"]);
        let table = StrategyTable::new();
        let mut matcher = Matcher::new(&arena, &table, &LabelSimilarity);
        assert_eq!(matcher.score(l, r).unwrap(), 3);
    }

    #[test]
    fn test_match_revisions_stores_symmetric_matchings() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "block", &["a", "b"]);
        let r = list(&mut arena, Revision::Right, "block", &["a", "b"]);
        let table = StrategyTable::new();
        let m = match_revisions(&mut arena, l, r, &table, &LabelSimilarity)
            .unwrap()
            .unwrap();
        assert_eq!(m.partner, r);
        assert!(m.has_fully_matched());

        let lb = arena.children(l).unwrap()[1];
        let rb = arena.children(r).unwrap()[1];
        assert!(arena.mutually_matched(lb, rb).unwrap());
        assert_eq!(
            arena.matching(lb, Revision::Right).unwrap().score,
            arena.matching(rb, Revision::Left).unwrap().score
        );
    }

    #[test]
    fn test_unordered_kind_matches_permutation() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "members", &["a", "b"]);
        let r = list(&mut arena, Revision::Right, "members", &["b", "a"]);
        let table = StrategyTable::new().with("members", MergeStrategy::Unordered);
        let m = match_revisions(&mut arena, l, r, &table, &LabelSimilarity)
            .unwrap()
            .unwrap();
        assert!(m.has_fully_matched());
    }

    #[test]
    fn test_different_roots_do_not_match() {
        let mut arena = Arena::new();
        let l = list(&mut arena, Revision::Left, "block", &["a"]);
        let r = list(&mut arena, Revision::Right, "body", &["a"]);
        let table = StrategyTable::new();
        assert!(match_revisions(&mut arena, l, r, &table, &LabelSimilarity)
            .unwrap()
            .is_none());
        let a = arena.children(l).unwrap()[0];
        assert!(!arena.has_matching(a, Revision::Right));
    }

    #[test]
    fn test_custom_similarity_closure() {
        let mut arena = Arena::new();
        let l = leaf(&mut arena, Revision::Left, "Foo");
        let r = leaf(&mut arena, Revision::Right, "foo");
        let table = StrategyTable::new();
        let ignore_case =
            |a: &Artifact, b: &Artifact| usize::from(a.label.eq_ignore_ascii_case(&b.label));
        let m = match_revisions(&mut arena, l, r, &table, &ignore_case)
            .unwrap()
            .unwrap();
        assert_eq!(m.score, 1);
    }
}
