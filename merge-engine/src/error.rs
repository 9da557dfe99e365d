//! Error types for the merge engine.
//!
//! Structural conflicts are never errors: they become conflict or choice
//! nodes in the target tree. [`MergeError`] is reserved for broken invariants
//! and missing inputs, which abort the whole merge run.

use thiserror::Error;

use crate::types::{NodeId, Revision};

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    /// A node id does not refer to a node of the arena.
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),

    /// The roots handed to a merge do not correspond to each other.
    #[error("roots do not match: {left} ({left_kind}) vs {right} ({right_kind})")]
    RootsDoNotMatch {
        left: NodeId,
        left_kind: String,
        right: NodeId,
        right_kind: String,
    },

    /// A pair that was assumed to be mutually matched is not.
    #[error("nodes {left} and {right} are not mutually matched")]
    NotMutuallyMatched { left: NodeId, right: NodeId },

    /// Level-wise merge requires equal arity on both sides.
    #[error("level-wise merge of {left} and {right}: child count {left_count} != {right_count}")]
    ChildCountMismatch {
        left: NodeId,
        right: NodeId,
        left_count: usize,
        right_count: usize,
    },

    /// A node is not in the revision its role requires, e.g. an operation
    /// writing into a tree other than the merge target.
    #[error("node {node} is in revision {found}, expected {expected}")]
    WrongRevision {
        node: NodeId,
        expected: Revision,
        found: Revision,
    },

    /// A variant was added to a node that is not a choice node.
    #[error("node {0} is not a choice node")]
    NotAChoice(NodeId),

    /// The similarity threshold must be a fraction.
    #[error("similarity threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

pub type Result<T> = std::result::Result<T, MergeError>;
