//! Arena-backed artifact trees.
//!
//! All nodes of one merge run (left, base, right, the target under
//! construction, and any expected tree handed to the oracle) live in one
//! [`Arena`] and refer to each other by [`NodeId`]. A node owns its children;
//! cross-revision links (matchings, pair partners) are plain ids looked up in
//! side tables, never ownership.

use std::fmt;

use crate::error::{MergeError, Result};
use crate::matching::{Matching, MatchingTable};
use crate::types::{MergeStrategy, NodeId, Revision, StrategyTable};

/// One alternative of a choice node, active under `condition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub condition: String,
    pub node: NodeId,
}

/// Capability of a node beyond being a plain labeled tree node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeContent {
    #[default]
    Plain,
    /// Condition-tagged alternatives, produced by conditional merging.
    Choice { variants: Vec<Variant> },
    /// An unreconciled left/right/base triple. Any side may be absent.
    Conflict {
        left: Option<NodeId>,
        right: Option<NodeId>,
        base: Option<NodeId>,
    },
}

/// Pairing state of a node for the sibling-list merge it takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairState {
    /// Not examined yet, or examined without a decision.
    #[default]
    Unpaired,
    /// Examined and resolved as having no partner.
    Nothing,
    /// Mutual best match.
    Strong(NodeId),
    /// Tie-break fallback; the partner's own pair may point elsewhere.
    Weak(NodeId),
}

impl PairState {
    pub fn partner(self) -> Option<NodeId> {
        match self {
            PairState::Strong(p) | PairState::Weak(p) => Some(p),
            PairState::Unpaired | PairState::Nothing => None,
        }
    }
}

/// A node record in the arena.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: NodeId,
    pub revision: Revision,
    pub kind: String,
    pub label: String,
    /// Strategy declared by the node itself; overrides the per-kind table.
    pub strategy: Option<MergeStrategy>,
    pub content: NodeContent,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    /// Placeholder standing in for a missing base node.
    empty: bool,
    /// Synthetic container holding one side of a grouped conflict. Only its
    /// children belong to that side's alternative.
    group: bool,
    merged: bool,
    pair: PairState,
}

impl Artifact {
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_empty_placeholder(&self) -> bool {
        self.empty
    }

    pub fn is_group(&self) -> bool {
        self.group
    }

    pub fn is_merged(&self) -> bool {
        self.merged
    }

    pub fn pair(&self) -> PairState {
        self.pair
    }

    pub fn is_paired(&self) -> bool {
        self.pair != PairState::Unpaired
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.content, NodeContent::Choice { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.content, NodeContent::Conflict { .. })
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The strategy for merging this node's children: its own declaration,
    /// else the per-kind table.
    pub fn merge_strategy(&self, table: &StrategyTable) -> MergeStrategy {
        self.strategy.unwrap_or_else(|| table.get(&self.kind))
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "({}) {}@{}", self.id, self.kind, self.revision)
        } else {
            write!(f, "({}) {} {:?}@{}", self.id, self.kind, self.label, self.revision)
        }
    }
}

/// Node kind given to conflict nodes.
pub const CONFLICT_KIND: &str = "conflict";
/// Node kind given to choice nodes.
pub const CHOICE_KIND: &str = "choice";

#[derive(Debug, Default, Clone)]
pub struct Arena {
    nodes: Vec<Artifact>,
    matchings: MatchingTable,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&Artifact> {
        self.nodes.get(id).ok_or(MergeError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Artifact> {
        self.nodes.get_mut(id).ok_or(MergeError::UnknownNode(id))
    }

    /// Create a detached plain node.
    pub fn new_node(
        &mut self,
        revision: Revision,
        kind: impl Into<String>,
        label: impl Into<String>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Artifact {
            id,
            revision,
            kind: kind.into(),
            label: label.into(),
            strategy: None,
            content: NodeContent::Plain,
            children: Vec::new(),
            parent: None,
            empty: false,
            group: false,
            merged: false,
            pair: PairState::Unpaired,
        });
        id
    }

    pub fn set_strategy(&mut self, id: NodeId, strategy: MergeStrategy) -> Result<()> {
        self.node_mut(id)?.strategy = Some(strategy);
        Ok(())
    }

    pub(crate) fn set_content(&mut self, id: NodeId, content: NodeContent) -> Result<()> {
        self.node_mut(id)?.content = content;
        Ok(())
    }

    /// Append `child` to `parent`. A node has at most one parent; a child that
    /// is still attached elsewhere is detached first.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        if let Some(old) = self.node(child)?.parent {
            self.node_mut(old)?.children.retain(|&c| c != child);
        }
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    pub fn revision(&self, id: NodeId) -> Result<Revision> {
        Ok(self.node(id)?.revision)
    }

    /// Fail unless `id` belongs to `expected`.
    pub fn expect_revision(&self, id: NodeId, expected: Revision) -> Result<()> {
        let found = self.revision(id)?;
        if found == expected {
            Ok(())
        } else {
            Err(MergeError::WrongRevision {
                node: id,
                expected,
                found,
            })
        }
    }

    /// Number of nodes in the subtree rooted at `id`.
    pub fn tree_size(&self, id: NodeId) -> Result<usize> {
        let mut size = 1;
        for &child in self.children(id)? {
            size += self.tree_size(child)?;
        }
        Ok(size)
    }

    /// Copy of `id` with the same kind, label and strategy, placed in
    /// `revision`. The copy has no children and plain content.
    pub fn shallow_copy(&mut self, id: NodeId, revision: Revision) -> Result<NodeId> {
        let source = self.node(id)?;
        let (kind, label, strategy) = (source.kind.clone(), source.label.clone(), source.strategy);
        let copy = self.new_node(revision, kind, label);
        self.node_mut(copy)?.strategy = strategy;
        Ok(copy)
    }

    /// Recursive copy of the subtree at `id`, placed in `revision`. Conflict
    /// alternatives and choice variants are copied as well, so the copy
    /// shares no node with the source.
    pub fn deep_copy(&mut self, id: NodeId, revision: Revision) -> Result<NodeId> {
        let copy = self.shallow_copy(id, revision)?;
        let content = match self.node(id)?.content.clone() {
            NodeContent::Plain => NodeContent::Plain,
            NodeContent::Choice { variants } => {
                let mut copied = Vec::with_capacity(variants.len());
                for v in variants {
                    copied.push(Variant {
                        condition: v.condition,
                        node: self.deep_copy(v.node, revision)?,
                    });
                }
                NodeContent::Choice { variants: copied }
            }
            NodeContent::Conflict { left, right, base } => NodeContent::Conflict {
                left: self.copy_optional(left, revision)?,
                right: self.copy_optional(right, revision)?,
                base: self.copy_optional(base, revision)?,
            },
        };
        let (empty, group) = {
            let source = self.node(id)?;
            (source.empty, source.group)
        };
        let node = self.node_mut(copy)?;
        node.content = content;
        node.empty = empty;
        node.group = group;

        let children = self.children(id)?.to_vec();
        for child in children {
            let child_copy = self.deep_copy(child, revision)?;
            self.add_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    fn copy_optional(&mut self, id: Option<NodeId>, revision: Revision) -> Result<Option<NodeId>> {
        id.map(|n| self.deep_copy(n, revision)).transpose()
    }

    /// Empty placeholder of the same kind as `like`, standing in for a node
    /// that does not exist in `revision`.
    pub fn create_empty(&mut self, like: NodeId, revision: Revision) -> Result<NodeId> {
        let kind = self.node(like)?.kind.clone();
        let id = self.new_node(revision, kind, "");
        self.node_mut(id)?.empty = true;
        Ok(id)
    }

    /// Mark `id` as the container of a grouped conflict alternative.
    pub fn set_group(&mut self, id: NodeId) -> Result<()> {
        self.node_mut(id)?.group = true;
        Ok(())
    }

    /// Choice node in the target holding the given variants.
    pub fn create_choice(&mut self, variants: Vec<Variant>) -> NodeId {
        let id = self.new_node(Revision::Target, CHOICE_KIND, "");
        self.nodes[id].content = NodeContent::Choice { variants };
        id
    }

    /// Add another alternative to a choice node. A variant whose condition is
    /// already present is replaced.
    pub fn add_variant(&mut self, choice: NodeId, condition: &str, alternative: NodeId) -> Result<()> {
        match &mut self.node_mut(choice)?.content {
            NodeContent::Choice { variants } => {
                if let Some(existing) = variants.iter_mut().find(|v| v.condition == condition) {
                    existing.node = alternative;
                } else {
                    variants.push(Variant {
                        condition: condition.to_string(),
                        node: alternative,
                    });
                }
                Ok(())
            }
            _ => Err(MergeError::NotAChoice(choice)),
        }
    }

    /// Conflict node in the target carrying the given alternatives.
    pub fn create_conflict(
        &mut self,
        left: Option<NodeId>,
        right: Option<NodeId>,
        base: Option<NodeId>,
    ) -> NodeId {
        let id = self.new_node(Revision::Target, CONFLICT_KIND, "");
        self.nodes[id].content = NodeContent::Conflict { left, right, base };
        id
    }

    pub fn is_merged(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.merged)
    }

    /// Flag `id` as consumed by the merge. The flag is never cleared.
    pub fn set_merged(&mut self, id: NodeId) -> Result<()> {
        self.node_mut(id)?.merged = true;
        Ok(())
    }

    pub fn pair(&self, id: NodeId) -> Result<PairState> {
        Ok(self.node(id)?.pair)
    }

    pub fn set_pair(&mut self, id: NodeId, state: PairState) -> Result<()> {
        self.node_mut(id)?.pair = state;
        Ok(())
    }

    pub fn matchings(&self) -> &MatchingTable {
        &self.matchings
    }

    pub fn matchings_mut(&mut self) -> &mut MatchingTable {
        &mut self.matchings
    }

    /// Matching of `id` into `other`, if any.
    pub fn matching(&self, id: NodeId, other: Revision) -> Option<&Matching> {
        self.matchings.get(id, other)
    }

    pub fn has_matching(&self, id: NodeId, other: Revision) -> bool {
        self.matchings.contains(id, other)
    }

    /// True unless `id` has a fully matched counterpart in `other`.
    pub fn has_changes(&self, id: NodeId, other: Revision) -> bool {
        self.matching(id, other)
            .is_none_or(|m| !m.has_fully_matched())
    }

    /// Whether `a` and `b` point at each other through their matchings.
    pub fn mutually_matched(&self, a: NodeId, b: NodeId) -> Result<bool> {
        let rev_a = self.revision(a)?;
        let rev_b = self.revision(b)?;
        let forward = self.matching(a, rev_b).is_some_and(|m| m.partner == b);
        let backward = self.matching(b, rev_a).is_some_and(|m| m.partner == a);
        Ok(forward && backward)
    }

    /// Short human readable form for log events.
    pub fn show(&self, id: NodeId) -> String {
        match self.node(id) {
            Ok(node) => node.to_string(),
            Err(_) => format!("({id}) <unknown>"),
        }
    }
}
