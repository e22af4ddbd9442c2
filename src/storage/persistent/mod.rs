//! Persistent storage backend for the word store.
//!
//! This module provides durable, crash-safe storage with:
//! - Write-Ahead Logging (WAL) with one entry per committed transaction
//! - File locking for single-process access
//! - CRC32 checksums for corruption detection
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              PersistentWordStore             │
//! ├──────────────────────────────────────────────┤
//! │  ┌──────────────────┐  ┌──────────────────┐  │
//! │  │ WriteAheadLog    │  │ SharedState      │  │
//! │  │ (append-only)    │  │ (replayed index) │  │
//! │  └────────┬─────────┘  └────────┬─────────┘  │
//! │           └───────────┬─────────┘            │
//! │                       ↓                      │
//! │            ┌─────────────────────┐           │
//! │            │  StoreLock (flock)  │           │
//! │            └─────────────────────┘           │
//! └──────────────────────────────────────────────┘
//! ```

mod codec;
mod lock;
mod stores;
mod wal;

pub use stores::{PersistentWordStore, WAL_FILE};
pub use wal::{Recovered, WalEntry, WalEntryKind, WriteAheadLog};

use std::path::Path;

use crate::storage::traits::StorageError;

/// Configuration for persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentConfig {
    /// Whether to fsync after every commit (slower but safer).
    pub sync_on_write: bool,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
        }
    }
}

/// Open or create a persistent word store at the given path.
///
/// # Errors
/// - If the path cannot be created or accessed
/// - If another handle holds the lock
/// - If WAL replay fails due to corruption
///
/// # Example
/// ```rust,ignore
/// use std::sync::Arc;
/// use wordbank::{open_store, MigrationEngine};
///
/// let store = Arc::new(open_store("./words.db", None)?);
/// let report = MigrationEngine::new(store).reconcile(entries)?;
/// ```
pub fn open_store(
    path: impl AsRef<Path>,
    config: Option<PersistentConfig>,
) -> Result<PersistentWordStore, StorageError> {
    PersistentWordStore::open(path.as_ref(), config.unwrap_or_default())
}
