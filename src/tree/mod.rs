//! Level-order indexed member tree
//!
//! This implements a TreeKEM-shaped binary tree where:
//! - Members are leaves; intermediate nodes combine two subtrees
//! - Every node carries a level-order index recomputed after each mutation
//! - Each node carries modification/check timestamps for change tracking

pub mod index;
mod tracker;
#[allow(clippy::module_inception)]
mod tree;

pub use tree::{MemberTree, Mutation};
