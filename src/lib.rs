//! # kemtree
//!
//! A persisted, level-order indexed, change-tracked binary tree for
//! TreeKEM-style groups.
//!
//! kemtree keeps group members as leaves of a binary tree, stores every node
//! as its own record file, and stamps each node with modification and check
//! times so callers can find the few nodes that need reprocessing after a
//! change.
//!
//! ## Core Concepts
//!
//! - **Leaves**: group members carrying an opaque payload (a public key)
//! - **Intermediate nodes**: placeholders combining two subtrees; their
//!   payloads are set from outside, never derived here
//! - **Level-order indices**: root = 0, recomputed after every mutation
//! - **Change tracking**: `last_modified` vs `last_checked` per node
//!
//! ## Example
//!
//! ```ignore
//! use kemtree::TreeStore;
//!
//! let mut tree = TreeStore::open_dir("./data")?;
//! tree.insert("alice", b"alice public key".to_vec())?;
//! tree.insert("bob", b"bob public key".to_vec())?;
//! for info in tree.tree_structure().values().filter(|i| i.awaits_key()) {
//!     // compute the shared key for `info.name` ...
//! }
//! ```

pub mod config;
pub mod model;
pub mod store;
pub mod tree;

mod database;
mod error;

pub use config::StoreConfig;
pub use database::{SharedTreeStore, TreeStore};
pub use error::{Error, Result};
pub use model::{Node, NodeId, NodeInfo, NodeKind, StorageKey, Timestamp};
pub use store::NodeStore;
pub use tree::{index, MemberTree};

/// Record format version
pub const VERSION: u32 = 1;

/// Magic bytes at the start of every record file
pub const MAGIC: &[u8; 8] = b"KEMTREE\0";
