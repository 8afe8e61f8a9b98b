//! Storage keys: the on-disk identity of a node record

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte BLAKE3 digest of a node name
///
/// Names are arbitrary strings, so they are never used as file names directly.
/// The key is a pure function of the name: renaming a node changes its key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey([u8; 32]);

impl StorageKey {
    /// Derive the storage key for a node name
    pub fn for_name(name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"kemtree-node:");
        hasher.update(name.as_bytes());
        StorageKey(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(StorageKey(arr))
    }

    /// Short prefix for log output
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.short())
    }
}
