//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory implementation of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation.

use crate::storage::state::{NoJournal, SharedState, WordOp, WordState};
use crate::storage::traits::{StorageError, StoreTransaction, WordStore};
use crate::word::{NewWord, WordId, WordRecord};

/// Thread-safe in-memory word store.
#[derive(Debug, Default)]
pub struct InMemoryWordStore {
    state: SharedState,
}

impl InMemoryWordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `words`, inserted in order.
    ///
    /// Ids are assigned in iteration order, so the first word gets the lowest id.
    ///
    /// # Errors
    /// Returns an error if a seeded record cannot be applied.
    pub fn seeded(words: impl IntoIterator<Item = NewWord>) -> Result<Self, StorageError> {
        let mut state = WordState::default();
        for word in words {
            let id = state.next_id();
            state.apply(&WordOp::Insert(word.into_record(id)))?;
        }
        Ok(Self {
            state: SharedState::new(state),
        })
    }

    /// Insert a record outside of any migration run.
    ///
    /// # Errors
    /// Returns `StorageError::Busy` while a transaction is open.
    pub fn insert(&self, word: NewWord) -> Result<WordId, StorageError> {
        let mut tx = self.begin()?;
        let id = tx.insert(word)?;
        tx.commit()?;
        Ok(id)
    }

    /// Look up a committed record by id.
    ///
    /// # Errors
    /// Returns `StorageError::Busy` while a transaction is open.
    pub fn get(&self, id: WordId) -> Result<Option<WordRecord>, StorageError> {
        let state = self.state.read("memory.get")?;
        Ok(state.records().into_iter().find(|r| r.id == id))
    }

    /// Look up a committed record by exact word.
    ///
    /// # Errors
    /// Returns `StorageError::Busy` while a transaction is open.
    pub fn find_by_word(&self, word: &str) -> Result<Option<WordRecord>, StorageError> {
        let state = self.state.read("memory.find_by_word")?;
        Ok(state.find_by_word(word).cloned())
    }
}

impl WordStore for InMemoryWordStore {
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        Ok(Box::new(self.state.begin(&NoJournal)?))
    }

    fn records(&self) -> Result<Vec<WordRecord>, StorageError> {
        Ok(self.state.read("memory.records")?.records())
    }

    fn assigned(&self) -> Result<Vec<WordRecord>, StorageError> {
        Ok(self.state.read("memory.assigned")?.assigned())
    }
}
