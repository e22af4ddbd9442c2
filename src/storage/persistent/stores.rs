//! Durable word store.
//!
//! The store wraps:
//! - An in-memory record index for reads and transaction staging
//! - WAL integration for durable commits
//! - An exclusive directory lock held for the store's lifetime

use std::fs;
use std::path::Path;

use crate::storage::state::{SharedState, WordState};
use crate::storage::traits::{StorageError, StoreTransaction, WordStore};
use crate::word::WordRecord;

use super::lock::StoreLock;
use super::wal::{WalEntryKind, WriteAheadLog};
use super::PersistentConfig;

/// File name of the journal inside a store directory.
pub const WAL_FILE: &str = "wordbank.wal";

/// Word store persisted to a directory.
///
/// Opening replays the journal; each committed transaction appends exactly
/// one journal entry before it becomes visible.
pub struct PersistentWordStore {
    _lock: StoreLock,
    wal: WriteAheadLog,
    state: SharedState,
}

impl PersistentWordStore {
    /// Open or create a store in `dir`.
    ///
    /// # Errors
    /// - If the directory cannot be created or is locked by another handle
    /// - If the journal is corrupt (a torn final entry is not corruption)
    /// - If a journal entry cannot be replayed onto the recovered state
    pub fn open(dir: &Path, config: PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|e| {
            StorageError::BackendError(format!("failed to create store directory: {e}"))
        })?;

        let lock = StoreLock::acquire(dir)?;

        let (wal, recovered) = WriteAheadLog::open(&dir.join(WAL_FILE), config.sync_on_write)
            .map_err(|e| StorageError::BackendError(format!("failed to open WAL: {e}")))?;

        let mut state = WordState::default();
        for entry in &recovered.entries {
            let WalEntryKind::Commit { ops } = &entry.kind;
            for op in ops {
                state.apply(op).map_err(|e| {
                    StorageError::BackendError(format!(
                        "failed to replay WAL entry {}: {e}",
                        entry.sequence
                    ))
                })?;
            }
        }

        tracing::debug!(
            dir = %dir.display(),
            entries = recovered.entries.len(),
            records = state.records().len(),
            "word store opened"
        );

        Ok(Self {
            _lock: lock,
            wal,
            state: SharedState::new(state),
        })
    }

    /// Number of committed transactions in the journal.
    ///
    /// # Errors
    /// Returns an error if the journal lock is poisoned.
    pub fn committed_transactions(&self) -> Result<u64, StorageError> {
        self.wal.current_sequence()
    }
}

impl WordStore for PersistentWordStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        Ok(Box::new(self.state.begin(&self.wal)?))
    }

    fn records(&self) -> Result<Vec<WordRecord>, StorageError> {
        Ok(self.state.read("persistent.records")?.records())
    }

    fn assigned(&self) -> Result<Vec<WordRecord>, StorageError> {
        Ok(self.state.read("persistent.assigned")?.assigned())
    }
}
