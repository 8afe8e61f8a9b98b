//! Change tracking over the member tree
//!
//! Every query is a full traversal comparing two timestamps per node; the
//! result is small when few nodes changed, the cost is always O(size).

use super::MemberTree;
use crate::model::{Node, NodeId, Timestamp};
use crate::{Error, Result};
use std::collections::HashMap;

impl MemberTree {
    /// Nodes modified strictly after `since`
    pub fn modified_since(&self, since: Timestamp) -> Vec<&Node> {
        self.pre_order()
            .into_iter()
            .filter(|node| node.was_modified_since(since))
            .collect()
    }

    /// Nodes modified after their last check
    pub fn needing_update(&self) -> Vec<&Node> {
        self.pre_order()
            .into_iter()
            .filter(|node| node.needs_update())
            .collect()
    }

    /// Name -> last-modified for nodes modified strictly after `since`
    pub fn changes_since(&self, since: Timestamp) -> HashMap<String, Timestamp> {
        self.modified_since(since)
            .into_iter()
            .map(|node| (node.name.clone(), node.last_modified))
            .collect()
    }

    /// Stamp every node as checked; returns the ids to persist
    pub fn mark_all_checked(&mut self) -> Vec<NodeId> {
        let ids = self.ids();
        for id in &ids {
            if let Some(node) = self.node_mut(*id) {
                node.mark_checked();
            }
        }
        ids
    }

    pub fn mark_checked(&mut self, name: &str) -> Result<NodeId> {
        let node = self.find_mut(name)?;
        node.mark_checked();
        Ok(node.id)
    }

    pub fn mark_modified(&mut self, name: &str) -> Result<NodeId> {
        let node = self.find_mut(name)?;
        node.mark_modified();
        Ok(node.id)
    }

    /// The newest modification anywhere in the tree
    pub fn latest_modification(&self) -> Result<Timestamp> {
        self.pre_order()
            .into_iter()
            .map(Node::last_modified)
            .max()
            .ok_or(Error::EmptyTree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tree_with(names: &[&str]) -> MemberTree {
        let mut tree = MemberTree::new();
        for name in names {
            tree.insert(name.to_string(), name.as_bytes().to_vec())
                .unwrap();
        }
        tree
    }

    fn names(nodes: Vec<&Node>) -> HashSet<String> {
        nodes.into_iter().map(|n| n.name().to_string()).collect()
    }

    #[test]
    fn test_everything_dirty_after_inserts() {
        let start = Timestamp::now();
        let tree = tree_with(&["alice", "bob", "charlie"]);
        assert_eq!(tree.modified_since(start).len(), 5);
        assert_eq!(tree.needing_update().len(), 5);
    }

    #[test]
    fn test_mark_all_checked_clears() {
        let mut tree = tree_with(&["alice", "bob", "charlie"]);
        let ids = tree.mark_all_checked();
        assert_eq!(ids.len(), 5);
        assert!(tree.needing_update().is_empty());
    }

    #[test]
    fn test_single_modification_detected() {
        let mut tree = tree_with(&["a", "b", "c", "d", "e", "f", "g"]);
        tree.mark_all_checked();
        let checkpoint = Timestamp::now();

        for name in ["c", "g"] {
            tree.set_leaf_payload(name, b"rotated".to_vec()).unwrap();
        }

        let expected: HashSet<String> = ["c", "g"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names(tree.needing_update()), expected);
        assert_eq!(names(tree.modified_since(checkpoint)), expected);

        let changes = tree.changes_since(checkpoint);
        assert_eq!(changes.len(), 2);
        assert!(changes["c"] > checkpoint);
    }

    #[test]
    fn test_mark_checked_single() {
        let mut tree = tree_with(&["alice", "bob"]);
        tree.mark_all_checked();
        tree.mark_modified("alice").unwrap();
        assert_eq!(names(tree.needing_update()), names(vec![tree.find("alice").unwrap()]));

        tree.mark_checked("alice").unwrap();
        assert!(tree.needing_update().is_empty());
        assert!(matches!(tree.mark_checked("zed"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_latest_modification() {
        let mut tree = MemberTree::new();
        assert!(matches!(tree.latest_modification(), Err(Error::EmptyTree)));
        tree.insert("alice".into(), vec![]).unwrap();
        let alice = tree.find("alice").unwrap().last_modified();
        assert_eq!(tree.latest_modification().unwrap(), alice);
    }
}
