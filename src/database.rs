//! High-level tree store API
//!
//! This module provides the main entry point: an in-memory [`MemberTree`]
//! kept in sync with a [`NodeStore`] directory, one record per node.

use crate::config::StoreConfig;
use crate::model::{Node, NodeId, NodeInfo, Timestamp};
use crate::store::{Journal, Manifest, NodeStore};
use crate::tree::{MemberTree, Mutation};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// The main tree store interface
///
/// Provides:
/// - Member insertion and deletion with level-order re-indexing
/// - Lookup by name, by index, and root-to-node paths
/// - Structure snapshots and the single write path for intermediate keys
/// - Change tracking (what changed since T, what needs reprocessing)
///
/// Mutating calls take `&mut self`; wrap the store in a [`SharedTreeStore`]
/// to share it between threads.
///
/// If a record write fails, the error is returned but the in-memory change
/// is kept; reopen the store to return to the last persisted state.
pub struct TreeStore {
    store: NodeStore,
    tree: MemberTree,
    config: StoreConfig,
}

impl TreeStore {
    /// Open (or create) the tree stored in `config.data_dir`
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = NodeStore::open(&config)?;
        store.recover()?;

        let manifest = store.read_manifest()?.unwrap_or_default();
        let tree = match &manifest.root {
            Some(root) => MemberTree::load(&store, root)?,
            None => MemberTree::new(),
        };
        if manifest.node_count != tree.len() as u64 {
            warn!(
                stored = manifest.node_count,
                actual = tree.len(),
                "manifest node count disagrees with loaded tree; using tree"
            );
        }
        info!(
            dir = %config.data_dir.display(),
            nodes = tree.len(),
            "opened tree store"
        );
        Ok(TreeStore {
            store,
            tree,
            config,
        })
    }

    /// Open (or create) a tree in `path` with default settings
    pub fn open_dir(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::with_data_dir(path.as_ref()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying record store
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// The in-memory tree
    pub fn tree(&self) -> &MemberTree {
        &self.tree
    }

    // === Structural operations ===

    /// Add a member with the given payload
    pub fn insert(&mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<()> {
        let mutation = self.tree.insert(name.into(), payload.into())?;
        self.commit(mutation)
    }

    /// Remove a node by name
    ///
    /// Removing the old record files is best-effort: failures are logged
    /// and leave an orphan file behind.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let mutation = self.tree.delete(name)?;
        self.commit(mutation)
    }

    /// Set the payload of an intermediate node
    pub fn set_intermediate_key(&mut self, name: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        let id = self.tree.set_intermediate_payload(name, payload.into())?;
        self.persist(&[id])
    }

    /// Set the payload of a member
    pub fn update_leaf_key(&mut self, name: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        let id = self.tree.set_leaf_payload(name, payload.into())?;
        self.persist(&[id])
    }

    // === Queries ===

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.tree.find(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tree.find(name).is_some()
    }

    /// Root-to-node path, every intermediate ancestor included
    pub fn path(&self, name: &str) -> Result<Vec<&Node>> {
        self.tree.path(name)
    }

    pub fn node_by_index(&self, index: usize) -> Option<&Node> {
        self.tree.node_by_index(index)
    }

    pub fn tree_structure(&self) -> HashMap<String, NodeInfo> {
        self.tree.structure()
    }

    pub fn head(&self) -> Option<&Node> {
        self.tree.root()
    }

    /// The root payload (the group key in the intended use)
    pub fn group_key(&self) -> Result<&[u8]> {
        self.tree.root().map(Node::payload).ok_or(Error::EmptyTree)
    }

    pub fn leaves(&self) -> Vec<&Node> {
        self.tree.leaves()
    }

    pub fn parent_of(&self, name: &str) -> Result<Option<&Node>> {
        let node = self
            .tree
            .find(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(self.tree.parent_of(node.id()))
    }

    pub fn children_of(&self, name: &str) -> Result<(Option<&Node>, Option<&Node>)> {
        let node = self
            .tree
            .find(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok((self.tree.left_child(node), self.tree.right_child(node)))
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    // === Change tracking ===

    pub fn modified_since(&self, since: Timestamp) -> Vec<&Node> {
        self.tree.modified_since(since)
    }

    pub fn needing_update(&self) -> Vec<&Node> {
        self.tree.needing_update()
    }

    pub fn changes_since(&self, since: Timestamp) -> HashMap<String, Timestamp> {
        self.tree.changes_since(since)
    }

    pub fn latest_modification(&self) -> Result<Timestamp> {
        self.tree.latest_modification()
    }

    /// Stamp every node as checked and persist the stamps
    pub fn mark_all_checked(&mut self) -> Result<()> {
        let ids = self.tree.mark_all_checked();
        self.persist(&ids)
    }

    pub fn mark_checked(&mut self, name: &str) -> Result<()> {
        let id = self.tree.mark_checked(name)?;
        self.persist(&[id])
    }

    pub fn mark_modified(&mut self, name: &str) -> Result<()> {
        let id = self.tree.mark_modified(name)?;
        self.persist(&[id])
    }

    // === Persistence ===

    fn persist(&self, ids: &[NodeId]) -> Result<()> {
        for id in ids {
            if let Some(record) = self.tree.record(*id) {
                self.store.put(&record)?;
            }
        }
        Ok(())
    }

    /// Everything the store must write for a mutation of the in-memory tree
    fn journal(&self, mutation: Mutation) -> Journal {
        Journal {
            records: mutation
                .touched
                .iter()
                .filter_map(|id| self.tree.record(*id))
                .collect(),
            manifest: Manifest {
                root: self.tree.root().map(|root| root.name().to_string()),
                node_count: self.tree.len() as u64,
            },
            removed: mutation.removed,
        }
    }

    /// Journal the mutation, then apply it
    fn commit(&self, mutation: Mutation) -> Result<()> {
        let journal = self.journal(mutation);
        self.store.write_journal(&journal)?;
        self.store.apply_journal(&journal)
    }
}

/// A [`TreeStore`] shared between threads behind one reader-writer lock
///
/// Queries take the read lock and may run concurrently; mutations take the
/// write lock and exclude every other caller for their whole duration.
#[derive(Clone)]
pub struct SharedTreeStore {
    inner: Arc<RwLock<TreeStore>>,
}

impl SharedTreeStore {
    pub fn new(store: TreeStore) -> Self {
        SharedTreeStore {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run a query under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&TreeStore) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run a mutation under the write lock
    pub fn write<R>(&self, f: impl FnOnce(&mut TreeStore) -> R) -> R {
        f(&mut self.inner.write())
    }
}
