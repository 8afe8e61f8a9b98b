//! Structure snapshot handed to key-agreement collaborators

use super::NodeKind;
use serde::{Deserialize, Serialize};

/// One node of a [`crate::TreeStore::tree_structure`] snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub leaf_index: Option<u32>,
    pub node_index: usize,
    /// Level-order index of the actual parent; `None` for the root
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub left_child: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub right_child: Option<String>,
}

impl NodeInfo {
    /// An intermediate slot still waiting for its key
    pub fn awaits_key(&self) -> bool {
        self.kind == NodeKind::Intermediate && self.payload.is_empty()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
