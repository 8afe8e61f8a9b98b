//! Core data model types for kemtree

mod info;
mod key;
mod node;
mod timestamp;

pub use info::NodeInfo;
pub use key::StorageKey;
pub use node::{Node, NodeId, NodeKind};
pub use timestamp::Timestamp;
