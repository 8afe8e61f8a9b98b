//! Error types for kemtree

use thiserror::Error;

/// Result type alias for kemtree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in kemtree operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Name already present in tree: {0}")]
    DuplicateName(String),

    #[error("Node is not an intermediate node: {0}")]
    NotIntermediate(String),

    #[error("Node is not a leaf: {0}")]
    NotLeaf(String),

    #[error("Tree is empty")]
    EmptyTree,

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid record file: {0}")]
    InvalidRecord(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config error: {0}")]
    Config(String),
}
