//! Member tree: the in-memory arena of nodes and its structural operations

use super::index;
use crate::model::{Node, NodeId, NodeInfo, NodeKind, StorageKey, Timestamp};
use crate::store::{NodeRecord, NodeStore};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Which child slot of a parent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Records touched by one structural mutation
///
/// `touched` nodes must be rewritten; `removed` keys belong to records that
/// no longer correspond to any live node.
#[derive(Debug, Default)]
pub struct Mutation {
    pub touched: BTreeSet<NodeId>,
    pub removed: Vec<StorageKey>,
}

/// A binary tree of named nodes with level-order indices
///
/// Nodes live in an arena keyed by [`NodeId`]; every node is owned by
/// exactly one parent slot or is the root. Leaves are only ever added by
/// splitting an existing leaf into an intermediate placeholder, and indices
/// are recomputed over the whole tree after every structural change.
pub struct MemberTree {
    nodes: HashMap<NodeId, Node>,
    root: Option<NodeId>,
    next_id: u64,
}

impl MemberTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        MemberTree {
            nodes: HashMap::new(),
            root: None,
            next_id: 0,
        }
    }

    /// Load a tree by following child names from `root_name`
    pub fn load(store: &NodeStore, root_name: &str) -> Result<Self> {
        let mut tree = MemberTree::new();
        let mut seen = HashSet::new();
        let root = tree.load_subtree(store, root_name, &mut seen)?;
        tree.root = Some(root);
        index::assign(&mut tree.nodes, tree.root);
        debug!(nodes = tree.len(), root = root_name, "loaded member tree");
        Ok(tree)
    }

    // === Queries ===

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.and_then(|id| self.nodes.get(&id))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn left_child(&self, node: &Node) -> Option<&Node> {
        node.left.and_then(|id| self.nodes.get(&id))
    }

    pub fn right_child(&self, node: &Node) -> Option<&Node> {
        node.right.and_then(|id| self.nodes.get(&id))
    }

    /// Breadth-first search by name
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.breadth_first().find(|node| node.name == name)
    }

    /// Breadth-first search by level-order index
    pub fn node_by_index(&self, target: usize) -> Option<&Node> {
        self.breadth_first().find(|node| node.index == target)
    }

    /// The structural parent of a node
    pub fn parent_of(&self, id: NodeId) -> Option<&Node> {
        self.breadth_first()
            .find(|node| node.left == Some(id) || node.right == Some(id))
    }

    /// Root-to-target sequence of nodes
    pub fn path(&self, name: &str) -> Result<Vec<&Node>> {
        let target = self
            .find(name)
            .map(|node| node.id)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(self
            .path_ids(target)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect())
    }

    /// All member nodes, left to right
    pub fn leaves(&self) -> Vec<&Node> {
        self.pre_order()
            .into_iter()
            .filter(|node| node.is_leaf())
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.values().filter(|node| node.is_leaf()).count()
    }

    /// Snapshot of every node, keyed by name
    pub fn structure(&self) -> HashMap<String, NodeInfo> {
        let mut structure = HashMap::with_capacity(self.nodes.len());
        let mut queue: VecDeque<(NodeId, Option<usize>)> =
            self.root.map(|id| (id, None)).into_iter().collect();

        while let Some((id, parent_index)) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if let Some(left) = node.left {
                queue.push_back((left, Some(node.index)));
            }
            if let Some(right) = node.right {
                queue.push_back((right, Some(node.index)));
            }

            structure.insert(
                node.name.clone(),
                NodeInfo {
                    name: node.name.clone(),
                    payload: node.payload.clone(),
                    kind: node.kind,
                    leaf_index: node.leaf_index,
                    node_index: node.index,
                    parent_index,
                    left_child: self.left_child(node).map(|c| c.name.clone()),
                    right_child: self.right_child(node).map(|c| c.name.clone()),
                },
            );
        }

        structure
    }

    /// Nodes in breadth-first order
    pub fn breadth_first(&self) -> impl Iterator<Item = &Node> + '_ {
        let mut queue: VecDeque<NodeId> = self.root.into_iter().collect();
        std::iter::from_fn(move || {
            let id = queue.pop_front()?;
            let node = self.nodes.get(&id)?;
            queue.extend(node.left);
            queue.extend(node.right);
            Some(node)
        })
    }

    /// Nodes in depth-first pre-order, left before right
    pub fn pre_order(&self) -> Vec<&Node> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push(node);
            stack.extend(node.right);
            stack.extend(node.left);
        }
        out
    }

    // === Mutation ===

    /// Insert a new member
    ///
    /// Descends toward the subtree with fewer members (ties go left) and
    /// splits the first childless node it reaches into an intermediate
    /// placeholder whose children are the existing node and the new one.
    pub fn insert(&mut self, name: String, payload: Vec<u8>) -> Result<Mutation> {
        if self.find(&name).is_some() {
            return Err(Error::DuplicateName(name));
        }

        let mut mutation = Mutation::default();
        let leaf_index = self.next_leaf_index();
        let leaf_id = self.alloc_id();
        self.nodes.insert(
            leaf_id,
            Node::leaf(leaf_id, name.clone(), payload, leaf_index),
        );
        mutation.touched.insert(leaf_id);

        let Some(root) = self.root else {
            self.root = Some(leaf_id);
            index::assign(&mut self.nodes, self.root);
            debug!(name = %name, "inserted root member");
            return Ok(mutation);
        };

        let mut descent: Vec<(NodeId, Side)> = Vec::new();
        let mut current = root;
        let mut attached = false;

        loop {
            let node = &self.nodes[&current];
            if node.is_childless() {
                break;
            }

            let side = if self.count_leaves(node.left) <= self.count_leaves(node.right) {
                Side::Left
            } else {
                Side::Right
            };
            let child = match side {
                Side::Left => node.left,
                Side::Right => node.right,
            };
            descent.push((current, side));

            match child {
                Some(next) => current = next,
                None => {
                    self.set_child(current, side, Some(leaf_id));
                    attached = true;
                    break;
                }
            }
        }

        if !attached {
            let existing = &self.nodes[&current];
            let base = format!("intermediate_{}_{}", existing.name, name);
            let existing_size = existing.subtree_size();

            let split_id = self.alloc_id();
            let split_name = self.unique_name(base, split_id);
            let mut split = Node::intermediate(split_id, split_name);
            split.left = Some(current);
            split.right = Some(leaf_id);
            split.left_count = existing_size;
            split.right_count = 1;
            self.nodes.insert(split_id, split);
            mutation.touched.insert(split_id);

            match descent.last() {
                Some(&(parent, side)) => self.set_child(parent, side, Some(split_id)),
                None => self.root = Some(split_id),
            }
        }

        for &(id, _) in descent.iter().rev() {
            self.refresh_counts(id);
            mutation.touched.insert(id);
        }

        index::assign(&mut self.nodes, self.root);
        debug!(name = %name, size = self.len(), "inserted member");
        Ok(mutation)
    }

    /// Delete a node by name
    ///
    /// A childless node whose parent is an intermediate takes the parent
    /// with it; the sibling subtree moves up into the parent's slot. A node
    /// with one child is replaced by that child. A node with two children is
    /// replaced by its left child, and the right subtree is re-attached as
    /// the rightmost descendant of the promoted left subtree. Afterwards all
    /// intermediate names are regenerated and the tree is re-indexed.
    pub fn delete(&mut self, name: &str) -> Result<Mutation> {
        if self.root.is_none() {
            return Err(Error::EmptyTree);
        }
        let target = self
            .find(name)
            .map(|node| node.id)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        let mut mutation = Mutation::default();
        let path = self.path_ids(target);
        let parent = path.len().checked_sub(2).map(|i| path[i]);

        let removed = self
            .nodes
            .remove(&target)
            .ok_or_else(|| Error::Corruption(format!("node {} vanished", target)))?;
        mutation.removed.push(removed.storage_key());

        // (node whose slot is replaced, its owner, replacement)
        let mut vacated = target;
        let mut owner = parent;
        let replacement = match (removed.left, removed.right) {
            (None, None) => match parent {
                Some(p) if self.nodes[&p].is_intermediate() => {
                    let p_node = &self.nodes[&p];
                    let sibling = if p_node.left == Some(target) {
                        p_node.right
                    } else {
                        p_node.left
                    };
                    if let Some(collapsed) = self.nodes.remove(&p) {
                        mutation.removed.push(collapsed.storage_key());
                    }
                    vacated = p;
                    owner = path.len().checked_sub(3).map(|i| path[i]);
                    sibling
                }
                _ => None,
            },
            (Some(child), None) | (None, Some(child)) => Some(child),
            (Some(left), Some(right)) => {
                let mut chain = vec![left];
                let mut tail = left;
                while let Some(next) = self.nodes[&tail].right {
                    chain.push(next);
                    tail = next;
                }
                self.set_child(tail, Side::Right, Some(right));
                if let Some(node) = self.nodes.get_mut(&tail) {
                    node.mark_modified();
                }
                for &id in chain.iter().rev() {
                    self.refresh_counts(id);
                    mutation.touched.insert(id);
                }
                Some(left)
            }
        };

        if let Some(moved) = replacement {
            if let Some(node) = self.nodes.get_mut(&moved) {
                node.mark_modified();
            }
            mutation.touched.insert(moved);
        }

        match owner {
            Some(owner_id) => {
                let side = if self.nodes[&owner_id].left == Some(vacated) {
                    Side::Left
                } else {
                    Side::Right
                };
                self.set_child(owner_id, side, replacement);
                let upto = path.iter().position(|&id| id == owner_id).unwrap_or(0);
                for &id in path[..=upto].iter().rev() {
                    self.refresh_counts(id);
                    mutation.touched.insert(id);
                }
            }
            None => self.root = replacement,
        }

        self.rename_intermediates(&mut mutation);
        index::assign(&mut self.nodes, self.root);

        let live: HashSet<StorageKey> = self.nodes.values().map(Node::storage_key).collect();
        mutation.removed.retain(|key| !live.contains(key));
        mutation.touched.retain(|id| self.nodes.contains_key(id));

        debug!(
            name = %name,
            size = self.len(),
            stale = mutation.removed.len(),
            "deleted node"
        );
        Ok(mutation)
    }

    /// Replace an intermediate node's payload
    pub fn set_intermediate_payload(&mut self, name: &str, payload: Vec<u8>) -> Result<NodeId> {
        let node = self.find_mut(name)?;
        if node.kind != NodeKind::Intermediate {
            return Err(Error::NotIntermediate(name.to_string()));
        }
        node.payload = payload;
        node.mark_modified();
        Ok(node.id)
    }

    /// Replace a member's payload
    pub fn set_leaf_payload(&mut self, name: &str, payload: Vec<u8>) -> Result<NodeId> {
        let node = self.find_mut(name)?;
        if node.kind != NodeKind::Leaf {
            return Err(Error::NotLeaf(name.to_string()));
        }
        node.payload = payload;
        node.mark_modified();
        Ok(node.id)
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Result<&mut Node> {
        let id = self
            .find(name)
            .map(|node| node.id)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// The persisted form of a node; children are referenced by name
    pub fn record(&self, id: NodeId) -> Option<NodeRecord> {
        let node = self.nodes.get(&id)?;
        Some(NodeRecord {
            name: node.name.clone(),
            payload: node.payload.clone(),
            left_count: node.left_count as u64,
            right_count: node.right_count as u64,
            left_child: self.left_child(node).map(|c| c.name.clone()),
            right_child: self.right_child(node).map(|c| c.name.clone()),
            kind: node.kind,
            leaf_index: node.leaf_index,
            last_modified: node.last_modified,
            last_checked: node.last_checked,
        })
    }

    // === Internal helpers ===

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn next_leaf_index(&self) -> u32 {
        self.nodes
            .values()
            .filter_map(|node| node.leaf_index)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// `base`, or `base~<id>` if another live node already uses `base`
    fn unique_name(&self, base: String, id: NodeId) -> String {
        let taken = self
            .nodes
            .values()
            .any(|node| node.id != id && node.name == base);
        if taken {
            format!("{}~{}", base, id.0)
        } else {
            base
        }
    }

    fn set_child(&mut self, parent: NodeId, side: Side, child: Option<NodeId>) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            match side {
                Side::Left => node.left = child,
                Side::Right => node.right = child,
            }
        }
    }

    /// Recompute a node's subtree counts from its children's counts
    fn refresh_counts(&mut self, id: NodeId) {
        let (left, right) = match self.nodes.get(&id) {
            Some(node) => (node.left, node.right),
            None => return,
        };
        let size = |child: Option<NodeId>| {
            child
                .and_then(|c| self.nodes.get(&c))
                .map_or(0, Node::subtree_size)
        };
        let (left_count, right_count) = (size(left), size(right));
        if let Some(node) = self.nodes.get_mut(&id) {
            node.left_count = left_count;
            node.right_count = right_count;
        }
    }

    fn count_leaves(&self, id: Option<NodeId>) -> usize {
        let Some(node) = id.and_then(|id| self.nodes.get(&id)) else {
            return 0;
        };
        let own = usize::from(node.is_leaf());
        own + self.count_leaves(node.left) + self.count_leaves(node.right)
    }

    fn first_leaf_name(&self, id: Option<NodeId>) -> Option<String> {
        let node = self.nodes.get(&id?)?;
        if node.is_leaf() {
            return Some(node.name.clone());
        }
        self.first_leaf_name(node.left)
            .or_else(|| self.first_leaf_name(node.right))
    }

    /// Ids from the root down to `target`, inclusive
    fn path_ids(&self, target: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        if let Some(root) = self.root {
            self.collect_path(root, target, &mut path);
        }
        path
    }

    fn collect_path(&self, current: NodeId, target: NodeId, path: &mut Vec<NodeId>) -> bool {
        let Some(node) = self.nodes.get(&current) else {
            return false;
        };
        path.push(current);
        if current == target {
            return true;
        }
        let found = node
            .left
            .is_some_and(|left| self.collect_path(left, target, path))
            || node
                .right
                .is_some_and(|right| self.collect_path(right, target, path));
        if !found {
            path.pop();
        }
        found
    }

    fn rename_intermediates(&mut self, mutation: &mut Mutation) {
        if let Some(root) = self.root {
            self.rename_subtree(root, None, mutation);
        }
    }

    fn rename_subtree(&mut self, id: NodeId, parent: Option<NodeId>, mutation: &mut Mutation) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let (left, right, kind) = (node.left, node.right, node.kind);

        if let Some(left) = left {
            self.rename_subtree(left, Some(id), mutation);
        }
        if let Some(right) = right {
            self.rename_subtree(right, Some(id), mutation);
        }

        if kind != NodeKind::Intermediate {
            return;
        }
        let (Some(first_left), Some(first_right)) =
            (self.first_leaf_name(left), self.first_leaf_name(right))
        else {
            return;
        };

        let base = format!("intermediate_{}_{}", first_left, first_right);
        let current = &self.nodes[&id].name;
        if *current == base {
            return;
        }
        let new_name = self.unique_name(base, id);
        if *current == new_name {
            return;
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            debug!(from = %node.name, to = %new_name, "renaming intermediate");
            mutation.removed.push(node.storage_key());
            node.name = new_name;
            node.mark_modified();
        }
        mutation.touched.insert(id);
        if let Some(parent) = parent {
            mutation.touched.insert(parent);
        }
    }

    fn load_subtree(
        &mut self,
        store: &NodeStore,
        name: &str,
        seen: &mut HashSet<String>,
    ) -> Result<NodeId> {
        if !seen.insert(name.to_string()) {
            return Err(Error::Corruption(format!(
                "node {} is referenced more than once",
                name
            )));
        }

        let record = store.get(name).map_err(|e| match e {
            Error::NotFound(_) => Error::Corruption(format!("referenced node {} is missing", name)),
            other => other,
        })?;
        Timestamp::observe(record.last_modified.max(record.last_checked));
        let left = match &record.left_child {
            Some(child) => Some(self.load_subtree(store, child, seen)?),
            None => None,
        };
        let right = match &record.right_child {
            Some(child) => Some(self.load_subtree(store, child, seen)?),
            None => None,
        };

        let id = self.alloc_id();
        self.nodes.insert(
            id,
            Node {
                id,
                name: record.name,
                payload: record.payload,
                kind: record.kind,
                left,
                right,
                left_count: 0,
                right_count: 0,
                leaf_index: record.leaf_index,
                index: 0,
                last_modified: record.last_modified,
                last_checked: record.last_checked,
            },
        );
        self.refresh_counts(id);

        let node = &self.nodes[&id];
        if node.left_count as u64 != record.left_count
            || node.right_count as u64 != record.right_count
        {
            warn!(
                name = %node.name,
                stored_left = record.left_count,
                stored_right = record.right_count,
                actual_left = node.left_count,
                actual_right = node.right_count,
                "stored subtree counts disagree with structure; using structure"
            );
        }

        Ok(id)
    }
}

impl Default for MemberTree {
    fn default() -> Self {
        MemberTree::new()
    }
}
