//! Directory-backed record store, one file per node
//!
//! Layout:
//! ```text
//! <data_dir>/
//!   MANIFEST              root reference (framed, type 1)
//!   JOURNAL               mutation being applied, if any (framed, type 2)
//!   <storage_key>.node    one framed record per node (type 0)
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed over the
//! target, so a reader never observes a half-written record.
//!
//! Structural mutations touch several files. They are committed by writing
//! a [`Journal`] first; records, manifest, and stale removals follow, and
//! the journal is deleted last. [`NodeStore::recover`] replays a journal
//! left behind by a crash, so the directory always holds either the tree
//! before the mutation or the tree after it.

use crate::config::StoreConfig;
use crate::model::StorageKey;
use crate::store::record::{Journal, Manifest, NodeRecord};
use crate::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RECORD_EXTENSION: &str = "node";
const MANIFEST_FILE: &str = "MANIFEST";
const JOURNAL_FILE: &str = "JOURNAL";

/// A store of node records backed by a directory
#[derive(Debug)]
pub struct NodeStore {
    /// Directory holding the records
    dir: PathBuf,
    /// zstd level for record bodies
    compression_level: i32,
    /// fsync each file before renaming it into place
    sync_writes: bool,
}

impl NodeStore {
    /// Open a store, creating the directory if needed
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        info!(dir = %config.data_dir.display(), "opened node store");
        Ok(NodeStore {
            dir: config.data_dir.clone(),
            compression_level: config.compression_level,
            sync_writes: config.sync_writes,
        })
    }

    /// Path of the record file for a key
    pub fn record_path(&self, key: &StorageKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.to_hex(), RECORD_EXTENSION))
    }

    /// Store a node record under its name's key
    pub fn put(&self, record: &NodeRecord) -> Result<StorageKey> {
        let key = StorageKey::for_name(&record.name);
        let bytes = record.to_bytes(self.compression_level)?;
        self.write_atomic(&self.record_path(&key), &bytes)?;
        debug!(name = %record.name, key = %key.short(), "wrote node record");
        Ok(key)
    }

    /// Retrieve a node record by name
    pub fn get(&self, name: &str) -> Result<NodeRecord> {
        let key = StorageKey::for_name(name);
        let record = self.get_by_key(&key)?;
        if record.name != name {
            return Err(Error::Corruption(format!(
                "record {} holds node {}, expected {}",
                key.short(),
                record.name,
                name
            )));
        }
        Ok(record)
    }

    /// Retrieve a node record by storage key
    pub fn get_by_key(&self, key: &StorageKey) -> Result<NodeRecord> {
        let bytes = match fs::read(self.record_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(key.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };
        NodeRecord::from_bytes(&bytes)
    }

    /// Check if a record exists for a name
    pub fn contains(&self, name: &str) -> bool {
        self.record_path(&StorageKey::for_name(name)).exists()
    }

    /// Remove a record; returns false if it was already absent
    pub fn remove(&self, key: &StorageKey) -> Result<bool> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the manifest; `None` for a store that has never been written
    pub fn read_manifest(&self) -> Result<Option<Manifest>> {
        match fs::read(self.dir.join(MANIFEST_FILE)) {
            Ok(bytes) => Ok(Some(Manifest::from_bytes(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let bytes = manifest.to_bytes(self.compression_level)?;
        self.write_atomic(&self.dir.join(MANIFEST_FILE), &bytes)
    }

    /// Commit a mutation by writing its journal
    pub fn write_journal(&self, journal: &Journal) -> Result<()> {
        let bytes = journal.to_bytes(self.compression_level)?;
        self.write_atomic(&self.dir.join(JOURNAL_FILE), &bytes)?;
        debug!(
            records = journal.records.len(),
            removed = journal.removed.len(),
            "wrote journal"
        );
        Ok(())
    }

    /// Read the pending journal, if a commit was interrupted
    pub fn read_journal(&self) -> Result<Option<Journal>> {
        match fs::read(self.dir.join(JOURNAL_FILE)) {
            Ok(bytes) => Ok(Some(Journal::from_bytes(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a committed journal, then delete it
    ///
    /// Records go first, then the manifest. Removing stale records is
    /// best-effort: a failure is logged and leaves an orphan file that no
    /// live node references.
    pub fn apply_journal(&self, journal: &Journal) -> Result<()> {
        for record in &journal.records {
            self.put(record)?;
        }
        self.write_manifest(&journal.manifest)?;

        for key in &journal.removed {
            match self.remove(key) {
                Ok(_) => debug!(key = %key.short(), "removed stale record"),
                Err(e) => warn!(key = %key.short(), error = %e, "failed to remove stale record"),
            }
        }

        match fs::remove_file(self.dir.join(JOURNAL_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Finish a commit interrupted by a crash; returns true if one was found
    pub fn recover(&self) -> Result<bool> {
        let Some(journal) = self.read_journal()? else {
            return Ok(false);
        };
        info!(
            dir = %self.dir.display(),
            records = journal.records.len(),
            "replaying interrupted commit"
        );
        self.apply_journal(&journal)?;
        Ok(true)
    }

    /// Keys of every record file present in the directory
    pub fn record_keys(&self) -> Result<Vec<StorageKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(key) = StorageKey::from_hex(stem) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Number of record files present in the directory
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.record_keys()?.len())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut file: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(bytes)?;
            if self.sync_writes {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
