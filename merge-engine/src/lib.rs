//! # merge-engine
//!
//! Structured three-way merge of program trees, driven by cross-revision
//! node matchings rather than text lines.
//!
//! ## Approach
//!
//! 1. **Matching**: every pair of input revisions is aligned by a tree
//!    matcher (Yang's algorithm for ordered children, Hungarian assignment
//!    for unordered ones) and the correspondences are stored in a side table
//!    of the [`Arena`].
//!    *Based on: Yang, "Identifying Syntactic Differences Between Two
//!    Programs", SPE 1991*
//!
//! 2. **Pairing and merging**: sibling lists are paired greedily from the
//!    matchings and merged by the strategy their parent declares: ordered
//!    (with suspension of unanchored runs), unordered, or level-wise.
//!    *Based on: Apel, Leßenich, Lengauer, "Structured Merge with
//!    Auto-Tuning: Balancing Precision and Performance", ASE 2012 (JDime)*
//!
//! 3. **Operations**: the target tree is built only through add, delete,
//!    conflict and merge operations, which are logged in the
//!    [`MergeContext`]. Incompatible changes become conflict nodes, or choice
//!    nodes when conditional merging is enabled.
//!
//! ## Example
//!
//! ```rust
//! use merge_engine::{merge_trees, Arena, MergeContext, MergeInput, Revision, TreeDoc};
//!
//! fn block(labels: &[&str]) -> TreeDoc {
//!     TreeDoc::new("block", "").children(labels.iter().map(|l| TreeDoc::new("stmt", *l)))
//! }
//!
//! let mut arena = Arena::new();
//! let base = arena.load(&block(&["a", "b"]), Revision::Base).unwrap();
//! let left = arena.load(&block(&["a", "x", "b"]), Revision::Left).unwrap();
//! let right = arena.load(&block(&["a", "b", "y"]), Revision::Right).unwrap();
//!
//! let mut ctx = MergeContext::default();
//! let outcome = merge_trees(&mut arena, MergeInput::three_way(left, base, right), &mut ctx).unwrap();
//!
//! assert!(!outcome.has_conflicts());
//! assert_eq!(arena.tree_size(outcome.target).unwrap(), 5);
//! ```

pub mod artifact;
pub mod checker;
pub mod context;
pub mod document;
pub mod error;
pub mod matcher;
pub mod matching;
pub mod merge;
pub mod operations;
pub mod types;

// Re-export primary public API
pub use artifact::{Arena, Artifact, NodeContent, PairState, Variant};
pub use checker::{check, trees_equal, CheckReport};
pub use context::{MergeConfig, MergeContext, MergeStats};
pub use document::{ExportedNode, TreeDoc};
pub use error::{MergeError, Result};
pub use matcher::{match_revisions, LabelSimilarity, NodeSimilarity};
pub use matching::Matching;
pub use merge::{merge_trees, MergeInput, MergeOutcome};
pub use operations::Operation;
pub use types::{MergeScenario, MergeStrategy, MergeType, NodeId, Revision, StrategyTable};
