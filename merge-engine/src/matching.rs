//! Cross-revision correspondences between nodes.
//!
//! A [`Matching`] records that a node corresponds to a partner node in another
//! revision, together with the number of structurally equivalent node pairs
//! found between their subtrees. Matchings are never owning references: they
//! live in a side table keyed by `(node, other revision)`, and every insert is
//! stored in both directions so that lookups are symmetric.

use std::collections::HashMap;

use crate::types::{NodeId, Revision};

/// One side of a correspondence between two nodes of different revisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matching {
    /// The matched node in the other revision.
    pub partner: NodeId,
    /// Number of matched node pairs in the two subtrees.
    pub score: usize,
    /// `size(a) + size(b)` for the two subtrees at matching time.
    pub combined_size: usize,
}

impl Matching {
    /// Fraction of both subtrees covered by the matching, in `[0, 1]`.
    pub fn percentage(&self) -> f64 {
        if self.combined_size == 0 {
            return 0.0;
        }
        (2 * self.score) as f64 / self.combined_size as f64
    }

    /// Nodes of either subtree that found no counterpart.
    pub fn unmatched(&self) -> usize {
        self.combined_size.saturating_sub(2 * self.score)
    }

    pub fn has_fully_matched(&self) -> bool {
        self.unmatched() == 0
    }
}

/// Side table of matchings, keyed by node and the revision of its partner.
#[derive(Debug, Default, Clone)]
pub struct MatchingTable {
    entries: HashMap<(NodeId, Revision), Matching>,
}

impl MatchingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `a` (in `rev_a`) matches `b` (in `rev_b`). Both directions
    /// are stored with the same score, replacing earlier matchings of either
    /// node into the other revision.
    pub fn insert(
        &mut self,
        a: NodeId,
        rev_a: Revision,
        b: NodeId,
        rev_b: Revision,
        score: usize,
        combined_size: usize,
    ) {
        self.entries.insert(
            (a, rev_b),
            Matching {
                partner: b,
                score,
                combined_size,
            },
        );
        self.entries.insert(
            (b, rev_a),
            Matching {
                partner: a,
                score,
                combined_size,
            },
        );
    }

    pub fn get(&self, node: NodeId, other: Revision) -> Option<&Matching> {
        self.entries.get(&(node, other))
    }

    pub fn contains(&self, node: NodeId, other: Revision) -> bool {
        self.entries.contains_key(&(node, other))
    }

    /// Drop every matching from nodes of `rev` into `other` and back.
    pub fn clear_between(&mut self, rev: Revision, other: Revision, revision_of: impl Fn(NodeId) -> Revision) {
        self.entries.retain(|&(node, into), _| {
            let from = revision_of(node);
            !((from == rev && into == other) || (from == other && into == rev))
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_symmetric() {
        let mut table = MatchingTable::new();
        table.insert(1, Revision::Left, 7, Revision::Base, 3, 8);

        let forward = table.get(1, Revision::Base).unwrap();
        let backward = table.get(7, Revision::Left).unwrap();
        assert_eq!(forward.partner, 7);
        assert_eq!(backward.partner, 1);
        assert_eq!(forward.score, backward.score);
        assert!(table.get(1, Revision::Right).is_none());
    }

    #[test]
    fn test_percentage_and_full_match() {
        let full = Matching {
            partner: 0,
            score: 4,
            combined_size: 8,
        };
        assert!(full.has_fully_matched());
        assert!((full.percentage() - 1.0).abs() < f64::EPSILON);

        let partial = Matching {
            partner: 0,
            score: 1,
            combined_size: 4,
        };
        assert!(!partial.has_fully_matched());
        assert_eq!(partial.unmatched(), 2);
        assert!((partial.percentage() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clear_between_keeps_other_revisions() {
        let mut table = MatchingTable::new();
        table.insert(1, Revision::Left, 2, Revision::Right, 1, 2);
        table.insert(1, Revision::Left, 3, Revision::Base, 1, 2);
        let rev = |id: NodeId| match id {
            1 => Revision::Left,
            2 => Revision::Right,
            _ => Revision::Base,
        };
        table.clear_between(Revision::Left, Revision::Right, rev);
        assert!(!table.contains(1, Revision::Right));
        assert!(!table.contains(2, Revision::Left));
        assert!(table.contains(1, Revision::Base));
    }
}
