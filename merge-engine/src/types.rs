//! Core types for the merge engine.
//!
//! Following JDime-style structured merge, every input tree is tagged with the
//! [`Revision`] it came from, and each node kind declares how its children are
//! merged:
//! - **Ordered**: position matters (statement lists, argument lists)
//! - **Unordered**: a set of members whose order carries no meaning
//! - **Levelwise**: fixed-arity slots aligned by position (an `if`'s
//!   condition / then / else)

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a node within one [`Arena`](crate::artifact::Arena).
pub type NodeId = usize;

/// Which input a node belongs to. Equality is by identity of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Revision {
    Left,
    Base,
    Right,
    /// The tree under construction.
    Target,
    /// The expected tree handed to the verification oracle.
    Expected,
}

impl Revision {
    pub fn name(self) -> &'static str {
        match self {
            Revision::Left => "left",
            Revision::Base => "base",
            Revision::Right => "right",
            Revision::Target => "merge",
            Revision::Expected => "expected",
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the children of a node are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Ordered,
    Unordered,
    Levelwise,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Ordered => write!(f, "ordered"),
            MergeStrategy::Unordered => write!(f, "unordered"),
            MergeStrategy::Levelwise => write!(f, "levelwise"),
        }
    }
}

/// Per-node-kind lookup of merge strategies. Kinds not listed merge ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyTable {
    by_kind: HashMap<String, MergeStrategy>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `strategy` for every node of `kind`.
    pub fn with(mut self, kind: impl Into<String>, strategy: MergeStrategy) -> Self {
        self.insert(kind, strategy);
        self
    }

    pub fn insert(&mut self, kind: impl Into<String>, strategy: MergeStrategy) {
        self.by_kind.insert(kind.into(), strategy);
    }

    pub fn get(&self, kind: &str) -> MergeStrategy {
        self.by_kind.get(kind).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MergeStrategy)> {
        self.by_kind.iter().map(|(k, s)| (k.as_str(), *s))
    }
}

/// Whether a scenario has a real common ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeType {
    TwoWay,
    ThreeWay,
}

impl fmt::Display for MergeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeType::TwoWay => write!(f, "2-way"),
            MergeType::ThreeWay => write!(f, "3-way"),
        }
    }
}

/// The merge scenario for one node: left, base and right counterparts.
///
/// In a two-way scenario `base` is an empty placeholder node of the base
/// revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeScenario {
    pub merge_type: MergeType,
    pub left: NodeId,
    pub base: NodeId,
    pub right: NodeId,
}

impl MergeScenario {
    pub fn new(merge_type: MergeType, left: NodeId, base: NodeId, right: NodeId) -> Self {
        Self {
            merge_type,
            left,
            base,
            right,
        }
    }
}
