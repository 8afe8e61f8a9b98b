//! Record storage
//!
//! Each node is stored as its own framed record file, keyed by the BLAKE3
//! digest of its name, with bodies encoded by bincode and compressed with zstd.

mod node_store;
mod record;

pub use node_store::NodeStore;
pub use record::{Frame, Journal, Manifest, NodeRecord, RecordType};
