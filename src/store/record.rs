//! Record framing - the unit of on-disk storage

use crate::model::{NodeKind, StorageKey, Timestamp};
use crate::{Error, Result, MAGIC, VERSION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Length of the fixed frame header: magic + version + type byte
const HEADER_LEN: usize = 8 + 4 + 1;

/// Type tag for record files
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordType {
    /// One tree node
    Node,
    /// The tree manifest (root reference)
    Manifest,
    /// A committed mutation not yet fully applied
    Journal,
}

impl RecordType {
    pub fn as_byte(&self) -> u8 {
        match self {
            RecordType::Node => 0,
            RecordType::Manifest => 1,
            RecordType::Journal => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordType::Node),
            1 => Some(RecordType::Manifest),
            2 => Some(RecordType::Journal),
            _ => None,
        }
    }
}

/// A typed, compressed chunk of data with a versioned header
#[derive(Clone, Debug)]
pub struct Frame {
    pub record_type: RecordType,
    /// Raw data (uncompressed)
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(record_type: RecordType, data: Vec<u8>) -> Self {
        Frame { record_type, data }
    }

    /// Encode the frame for storage
    pub fn encode(&self, level: i32) -> Result<Vec<u8>> {
        let compressed = zstd::encode_all(self.data.as_slice(), level)?;
        let mut output = Vec::with_capacity(HEADER_LEN + compressed.len());
        output.extend_from_slice(MAGIC);
        output.extend_from_slice(&VERSION.to_le_bytes());
        output.push(self.record_type.as_byte());
        output.extend(compressed);
        Ok(output)
    }

    /// Decode a frame from storage
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidRecord(format!(
                "record too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..8] != MAGIC {
            return Err(Error::InvalidRecord("Invalid magic bytes".into()));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[8..12]);
        let version = u32::from_le_bytes(version);
        if version != VERSION {
            return Err(Error::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }

        let record_type = RecordType::from_byte(bytes[12])
            .ok_or_else(|| Error::Corruption(format!("Invalid record type: {}", bytes[12])))?;
        let data = zstd::decode_all(&bytes[HEADER_LEN..])?;

        Ok(Frame { record_type, data })
    }
}

fn encode_body<T: Serialize>(record_type: RecordType, value: &T, level: i32) -> Result<Vec<u8>> {
    Frame::new(record_type, bincode::serialize(value)?).encode(level)
}

fn decode_body<T: DeserializeOwned>(expected: RecordType, bytes: &[u8]) -> Result<T> {
    let frame = Frame::decode(bytes)?;
    if frame.record_type != expected {
        return Err(Error::Corruption(format!(
            "Expected {:?}, got {:?}",
            expected, frame.record_type
        )));
    }
    Ok(bincode::deserialize(&frame.data)?)
}

/// The persisted form of one node
///
/// Children are referenced by name so a tree can be reloaded lazily by
/// following references from the manifest root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub payload: Vec<u8>,
    pub left_count: u64,
    pub right_count: u64,
    pub left_child: Option<String>,
    pub right_child: Option<String>,
    pub kind: NodeKind,
    pub leaf_index: Option<u32>,
    pub last_modified: Timestamp,
    pub last_checked: Timestamp,
}

impl NodeRecord {
    pub fn to_bytes(&self, level: i32) -> Result<Vec<u8>> {
        encode_body(RecordType::Node, self, level)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_body(RecordType::Node, bytes)
    }
}

/// Tree-level metadata stored next to the node records
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Name of the root node; `None` for an empty tree
    pub root: Option<String>,
    /// Number of live nodes when the manifest was written
    pub node_count: u64,
}

impl Manifest {
    pub fn to_bytes(&self, level: i32) -> Result<Vec<u8>> {
        encode_body(RecordType::Manifest, self, level)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_body(RecordType::Manifest, bytes)
    }
}

/// Everything one structural mutation writes, stored ahead of the writes
///
/// A mutation is committed once its journal file is in place. Applying it
/// is idempotent, so an interrupted apply is finished by replaying it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    /// Records to (re)write
    pub records: Vec<NodeRecord>,
    /// Manifest describing the tree after the mutation
    pub manifest: Manifest,
    /// Records no live node refers to any more
    pub removed: Vec<StorageKey>,
}

impl Journal {
    pub fn to_bytes(&self, level: i32) -> Result<Vec<u8>> {
        encode_body(RecordType::Journal, self, level)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_body(RecordType::Journal, bytes)
    }
}
