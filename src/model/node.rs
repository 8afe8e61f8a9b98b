//! Node type - one position in the member tree

use super::{StorageKey, Timestamp};
use crate::tree::index;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Synthetic, stable identity of a node inside one loaded tree
///
/// Unlike names (intermediate names are regenerated) and level-order
/// indices (recomputed after every mutation), a `NodeId` never changes for
/// the lifetime of the in-memory node. It is not persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a node in the group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A group member
    Leaf,
    /// A combination point of two subtrees
    Intermediate,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Leaf => "leaf",
            NodeKind::Intermediate => "intermediate",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the member tree
///
/// Children are referenced by [`NodeId`] into the owning tree's arena; each
/// node is owned by exactly one parent slot (or is the root).
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) kind: NodeKind,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) left_count: usize,
    pub(crate) right_count: usize,
    pub(crate) leaf_index: Option<u32>,
    pub(crate) index: usize,
    pub(crate) last_modified: Timestamp,
    pub(crate) last_checked: Timestamp,
}

impl Node {
    /// Create a fresh member node, stamped as modified and never checked
    pub(crate) fn leaf(id: NodeId, name: String, payload: Vec<u8>, leaf_index: u32) -> Self {
        Node {
            id,
            name,
            payload,
            kind: NodeKind::Leaf,
            left: None,
            right: None,
            left_count: 0,
            right_count: 0,
            leaf_index: Some(leaf_index),
            index: 0,
            last_modified: Timestamp::now(),
            last_checked: Timestamp::NEVER,
        }
    }

    /// Create an intermediate placeholder with an empty payload
    pub(crate) fn intermediate(id: NodeId, name: String) -> Self {
        Node {
            id,
            name,
            payload: Vec::new(),
            kind: NodeKind::Intermediate,
            left: None,
            right: None,
            left_count: 0,
            right_count: 0,
            leaf_index: None,
            index: 0,
            last_modified: Timestamp::now(),
            last_checked: Timestamp::NEVER,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque payload (a public key in the intended use)
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn is_intermediate(&self) -> bool {
        self.kind == NodeKind::Intermediate
    }

    /// True if the node has no children
    pub fn is_childless(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn left_count(&self) -> usize {
        self.left_count
    }

    pub fn right_count(&self) -> usize {
        self.right_count
    }

    /// Number of nodes in the subtree rooted here, this node included
    pub fn subtree_size(&self) -> usize {
        self.left_count + self.right_count + 1
    }

    pub fn leaf_index(&self) -> Option<u32> {
        self.leaf_index
    }

    /// Current level-order index (root = 0)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn storage_key(&self) -> StorageKey {
        StorageKey::for_name(&self.name)
    }

    // === Index arithmetic ===

    pub fn parent_index(&self) -> Option<usize> {
        index::parent(self.index)
    }

    pub fn left_child_index(&self) -> usize {
        index::left_child(self.index)
    }

    pub fn right_child_index(&self) -> usize {
        index::right_child(self.index)
    }

    pub fn sibling_index(&self) -> Option<usize> {
        index::sibling(self.index)
    }

    pub fn is_left_child(&self) -> bool {
        index::is_left_child(self.index)
    }

    pub fn is_right_child(&self) -> bool {
        index::is_right_child(self.index)
    }

    // === Change tracking ===

    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    pub fn last_checked(&self) -> Timestamp {
        self.last_checked
    }

    pub(crate) fn mark_modified(&mut self) {
        self.last_modified = Timestamp::now();
    }

    pub(crate) fn mark_checked(&mut self) {
        self.last_checked = Timestamp::now();
    }

    pub fn was_modified_since(&self, since: Timestamp) -> bool {
        self.last_modified > since
    }

    /// Modified after the last check
    pub fn needs_update(&self) -> bool {
        self.last_modified > self.last_checked
    }
}
