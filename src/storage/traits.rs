//! Abstract storage traits for the word store.
//!
//! A backend exposes a [`WordStore`] that hands out one [`StoreTransaction`]
//! at a time. Every mutation the migration engine performs goes through that
//! transaction; nothing is visible outside it until `commit`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::word::{NewWord, Slot, WordId, WordRecord};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("Word record not found: {0}")]
    NotFound(WordId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Another transaction is open on this store.
    #[error("Store is busy: another transaction is in progress")]
    Busy,

    /// The store directory is held open by another handle.
    #[error("Word store at {} is open elsewhere", .0.display())]
    Locked(std::path::PathBuf),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns true if the operation may succeed when retried later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Outcome of a natural-key lookup.
///
/// Not finding a word is a normal outcome and never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A record with exactly this word exists.
    Found(WordRecord),
    /// No record carries this word.
    NotFound,
}

impl Lookup {
    /// Converts to an `Option`, dropping the distinction from errors.
    #[must_use]
    pub fn into_option(self) -> Option<WordRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound => None,
        }
    }
}

impl From<Option<WordRecord>> for Lookup {
    fn from(record: Option<WordRecord>) -> Self {
        record.map_or(Self::NotFound, Self::Found)
    }
}

/// Storage trait for the word store.
///
/// # Safety Considerations
/// - At most one transaction may be open at a time; `begin` must fail with
///   `StorageError::Busy` rather than block when one already is.
/// - Reads outside a transaction observe committed state only.
pub trait WordStore: Send + Sync {
    /// Open a transaction.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError>;

    /// All committed records, ascending by id.
    fn records(&self) -> Result<Vec<WordRecord>, StorageError>;

    /// Committed records holding a slot, ascending by slot.
    fn assigned(&self) -> Result<Vec<WordRecord>, StorageError>;
}

/// A single-writer unit of work on a [`WordStore`].
///
/// Reads inside the transaction see its own uncommitted writes. Dropping a
/// transaction without committing discards its writes.
pub trait StoreTransaction {
    /// Delete every record that shares its word with a lower-id record.
    ///
    /// Returns the number of records removed.
    fn delete_duplicate_words(&mut self) -> Result<usize, StorageError>;

    /// Count records holding a slot.
    fn count_assigned(&mut self) -> Result<usize, StorageError>;

    /// Clear the slot of every assigned record and stamp `updated_at`.
    ///
    /// Returns the ids of the records cleared.
    fn reset_slots(&mut self, now: DateTime<Utc>) -> Result<Vec<WordId>, StorageError>;

    /// Exact, case-sensitive lookup by word.
    fn find_by_word(&mut self, word: &str) -> Result<Lookup, StorageError>;

    /// Set the slot and `updated_at` of an existing record. No other field changes.
    fn update_slot(
        &mut self,
        id: WordId,
        slot: Option<Slot>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Insert a new record under a freshly assigned id.
    fn insert(&mut self, word: NewWord) -> Result<WordId, StorageError>;

    /// Make every write of this transaction durable and visible.
    ///
    /// A failed commit leaves the committed state untouched.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discard every write of this transaction.
    fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_word_store_object_safe(_: &dyn WordStore) {}
    fn _assert_transaction_object_safe(_: &dyn StoreTransaction) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotFound(WordId::new(42));
        assert!(err.to_string().contains("not found"));

        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_only_busy_is_retryable() {
        assert!(StorageError::Busy.is_retryable());
        assert!(!StorageError::DuplicateKey("x".to_string()).is_retryable());
        assert!(!StorageError::Locked("/tmp/words".into()).is_retryable());
    }

    #[test]
    fn test_lookup_from_option() {
        assert_eq!(Lookup::from(None), Lookup::NotFound);
        assert!(Lookup::NotFound.into_option().is_none());
    }
}
