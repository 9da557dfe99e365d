//! JSON tree documents.
//!
//! A [`TreeDoc`] is a generic labeled tree as produced by a language front
//! end. [`ExportedNode`] is the serialized form of a merged tree: plain nodes
//! have the same shape as a `TreeDoc`, conflict and choice nodes carry their
//! alternatives under a `conflict` or `choice` key.

use serde::{Deserialize, Serialize};

use crate::artifact::{Arena, NodeContent, Variant, CHOICE_KIND, CONFLICT_KIND};
use crate::error::Result;
use crate::types::{MergeStrategy, NodeId, Revision};

/// Input tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDoc {
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MergeStrategy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeDoc>,
}

impl TreeDoc {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            strategy: None,
            children: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn child(mut self, child: TreeDoc) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = TreeDoc>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Alternatives of an exported conflict node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportedConflict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<ExportedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<ExportedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Box<ExportedNode>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedVariant {
    pub condition: String,
    pub node: ExportedNode,
}

/// Serialized form of a tree that may contain conflict and choice nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportedNode {
    Conflict {
        conflict: ExportedConflict,
    },
    Choice {
        choice: Vec<ExportedVariant>,
    },
    Node {
        kind: String,
        #[serde(default)]
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strategy: Option<MergeStrategy>,
        /// Set on the container of a grouped conflict alternative.
        #[serde(default, skip_serializing_if = "is_false")]
        group: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<ExportedNode>,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ExportedNode {
    /// Number of conflict nodes in this tree, alternatives included.
    pub fn conflict_count(&self) -> usize {
        match self {
            ExportedNode::Conflict { conflict } => {
                1 + [&conflict.left, &conflict.right, &conflict.base]
                    .into_iter()
                    .flatten()
                    .map(|n| n.conflict_count())
                    .sum::<usize>()
            }
            ExportedNode::Choice { choice } => choice.iter().map(|v| v.node.conflict_count()).sum(),
            ExportedNode::Node { children, .. } => children.iter().map(ExportedNode::conflict_count).sum(),
        }
    }
}

impl From<&TreeDoc> for ExportedNode {
    fn from(doc: &TreeDoc) -> Self {
        ExportedNode::Node {
            kind: doc.kind.clone(),
            label: doc.label.clone(),
            strategy: doc.strategy,
            group: false,
            children: doc.children.iter().map(ExportedNode::from).collect(),
        }
    }
}

impl Arena {
    /// Build the subtree described by `doc` in `revision` and return its root.
    pub fn load(&mut self, doc: &TreeDoc, revision: Revision) -> Result<NodeId> {
        let id = self.new_node(revision, doc.kind.as_str(), doc.label.as_str());
        if let Some(strategy) = doc.strategy {
            self.set_strategy(id, strategy)?;
        }
        for child in &doc.children {
            let child_id = self.load(child, revision)?;
            self.add_child(id, child_id)?;
        }
        Ok(id)
    }

    /// Like [`Arena::load`], also rebuilding conflict and choice nodes.
    pub fn load_exported(&mut self, node: &ExportedNode, revision: Revision) -> Result<NodeId> {
        match node {
            ExportedNode::Node {
                kind,
                label,
                strategy,
                group,
                children,
            } => {
                let id = self.new_node(revision, kind.as_str(), label.as_str());
                if let Some(strategy) = strategy {
                    self.set_strategy(id, *strategy)?;
                }
                if *group {
                    self.set_group(id)?;
                }
                for child in children {
                    let child_id = self.load_exported(child, revision)?;
                    self.add_child(id, child_id)?;
                }
                Ok(id)
            }
            ExportedNode::Conflict { conflict } => {
                let mut load_side = |side: &Option<Box<ExportedNode>>| {
                    side.as_deref()
                        .map(|n| self.load_exported(n, revision))
                        .transpose()
                };
                let left = load_side(&conflict.left)?;
                let right = load_side(&conflict.right)?;
                let base = load_side(&conflict.base)?;
                let id = self.new_node(revision, CONFLICT_KIND, "");
                self.set_content(id, NodeContent::Conflict { left, right, base })?;
                Ok(id)
            }
            ExportedNode::Choice { choice } => {
                let mut variants = Vec::with_capacity(choice.len());
                for v in choice {
                    variants.push(Variant {
                        condition: v.condition.clone(),
                        node: self.load_exported(&v.node, revision)?,
                    });
                }
                let id = self.new_node(revision, CHOICE_KIND, "");
                self.set_content(id, NodeContent::Choice { variants })?;
                Ok(id)
            }
        }
    }

    /// Serializable form of the subtree at `id`. Empty base placeholders are
    /// left out of conflicts.
    pub fn export(&self, id: NodeId) -> Result<ExportedNode> {
        let node = self.node(id)?;
        match &node.content {
            NodeContent::Plain => Ok(ExportedNode::Node {
                kind: node.kind.clone(),
                label: node.label.clone(),
                strategy: node.strategy,
                group: node.is_group(),
                children: node
                    .children()
                    .iter()
                    .map(|&c| self.export(c))
                    .collect::<Result<_>>()?,
            }),
            NodeContent::Conflict { left, right, base } => Ok(ExportedNode::Conflict {
                conflict: ExportedConflict {
                    left: self.export_side(*left)?,
                    right: self.export_side(*right)?,
                    base: self.export_side(*base)?,
                },
            }),
            NodeContent::Choice { variants } => Ok(ExportedNode::Choice {
                choice: variants
                    .iter()
                    .map(|v| {
                        Ok(ExportedVariant {
                            condition: v.condition.clone(),
                            node: self.export(v.node)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            }),
        }
    }

    fn export_side(&self, id: Option<NodeId>) -> Result<Option<Box<ExportedNode>>> {
        match id {
            Some(n) if !self.node(n)?.is_empty_placeholder() => Ok(Some(Box::new(self.export(n)?))),
            _ => Ok(None),
        }
    }
}
