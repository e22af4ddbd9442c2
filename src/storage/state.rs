//! Shared record state and the staged transaction used by every backend.
//!
//! Key invariants:
//! - A transaction works on a private copy of the committed state.
//! - Every mutation is expressed as a [`WordOp`]; the same ops are replayed
//!   from the journal on recovery, so `apply` must be deterministic.
//! - The committed state is replaced only after the journal accepted the batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::traits::{Lookup, StorageError, StoreTransaction};
use crate::word::{NewWord, Slot, WordId, WordRecord};

pub(crate) fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// A single mutation of the record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordOp {
    /// Remove records by id.
    Delete {
        /// Records to remove; an unknown id fails the op.
        ids: Vec<WordId>,
    },
    /// Clear the slot of every currently assigned record.
    ClearSlots {
        /// New `updated_at` for the cleared records.
        at: DateTime<Utc>,
    },
    /// Move one record to a slot (or to the word bank).
    SetSlot {
        /// Record to move.
        id: WordId,
        /// Target slot; `None` is the word bank.
        slot: Option<Slot>,
        /// New `updated_at`.
        at: DateTime<Utc>,
    },
    /// Add a fully formed record.
    Insert(WordRecord),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WordState {
    records: BTreeMap<WordId, WordRecord>,
    by_word: HashMap<String, BTreeSet<WordId>>,
    next_id: u64,
}

impl WordState {
    pub(crate) fn apply(&mut self, op: &WordOp) -> Result<(), StorageError> {
        match op {
            WordOp::Delete { ids } => {
                for id in ids {
                    let record = self.records.remove(id).ok_or(StorageError::NotFound(*id))?;
                    if let Some(set) = self.by_word.get_mut(&record.word) {
                        set.remove(id);
                        if set.is_empty() {
                            self.by_word.remove(&record.word);
                        }
                    }
                }
            }
            WordOp::ClearSlots { at } => {
                for record in self.records.values_mut().filter(|r| r.slot.is_some()) {
                    record.slot = None;
                    record.updated_at = *at;
                }
            }
            WordOp::SetSlot { id, slot, at } => {
                let record = self.records.get_mut(id).ok_or(StorageError::NotFound(*id))?;
                record.slot = *slot;
                record.updated_at = *at;
            }
            WordOp::Insert(record) => {
                if self.records.contains_key(&record.id) {
                    return Err(StorageError::DuplicateKey(record.id.to_string()));
                }
                self.next_id = self.next_id.max(record.id.get());
                self.by_word
                    .entry(record.word.clone())
                    .or_default()
                    .insert(record.id);
                self.records.insert(record.id, record.clone());
            }
        }
        Ok(())
    }

    /// Ids that lose to a lower id carrying the same word.
    pub(crate) fn duplicate_ids(&self) -> Vec<WordId> {
        let mut ids: Vec<WordId> = self
            .by_word
            .values()
            .filter(|set| set.len() > 1)
            .flat_map(|set| set.iter().skip(1).copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn assigned_ids(&self) -> Vec<WordId> {
        self.records
            .values()
            .filter(|r| r.slot.is_some())
            .map(|r| r.id)
            .collect()
    }

    pub(crate) fn assigned_count(&self) -> usize {
        self.records.values().filter(|r| r.slot.is_some()).count()
    }

    pub(crate) fn find_by_word(&self, word: &str) -> Option<&WordRecord> {
        self.by_word
            .get(word)
            .and_then(|set| set.first())
            .and_then(|id| self.records.get(id))
    }

    pub(crate) fn next_id(&self) -> WordId {
        WordId::new(self.next_id + 1)
    }

    pub(crate) fn records(&self) -> Vec<WordRecord> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn assigned(&self) -> Vec<WordRecord> {
        let mut out: Vec<WordRecord> = self
            .records
            .values()
            .filter(|r| r.slot.is_some())
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.slot, r.id));
        out
    }
}

/// Where committed batches go before they become visible.
pub(crate) trait Journal {
    fn persist(&self, ops: &[WordOp]) -> Result<(), StorageError>;
}

/// Journal for backends without durability.
pub(crate) struct NoJournal;

impl Journal for NoJournal {
    fn persist(&self, _ops: &[WordOp]) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Committed state guarded for a single writer.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    inner: RwLock<WordState>,
}

impl SharedState {
    pub(crate) fn new(state: WordState) -> Self {
        Self {
            inner: RwLock::new(state),
        }
    }

    pub(crate) fn read(&self, context: &'static str) -> Result<RwLockReadGuard<'_, WordState>, StorageError> {
        match self.inner.try_read() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(StorageError::Busy),
            Err(TryLockError::Poisoned(_)) => Err(lock_err(context)),
        }
    }

    pub(crate) fn begin<'a, J: Journal>(
        &'a self,
        journal: &'a J,
    ) -> Result<StagedTransaction<'a, J>, StorageError> {
        let guard = match self.inner.try_write() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(StorageError::Busy),
            Err(TryLockError::Poisoned(_)) => return Err(lock_err("state.begin")),
        };
        let working = guard.clone();
        Ok(StagedTransaction {
            committed: guard,
            working,
            ops: Vec::new(),
            journal,
        })
    }
}

/// A transaction over a private copy of the state.
pub(crate) struct StagedTransaction<'a, J: Journal> {
    committed: RwLockWriteGuard<'a, WordState>,
    working: WordState,
    ops: Vec<WordOp>,
    journal: &'a J,
}

impl<J: Journal> StagedTransaction<'_, J> {
    fn stage(&mut self, op: WordOp) -> Result<(), StorageError> {
        self.working.apply(&op)?;
        self.ops.push(op);
        Ok(())
    }
}

impl<J: Journal> StoreTransaction for StagedTransaction<'_, J> {
    fn delete_duplicate_words(&mut self) -> Result<usize, StorageError> {
        let ids = self.working.duplicate_ids();
        let removed = ids.len();
        if removed > 0 {
            self.stage(WordOp::Delete { ids })?;
        }
        Ok(removed)
    }

    fn count_assigned(&mut self) -> Result<usize, StorageError> {
        Ok(self.working.assigned_count())
    }

    fn reset_slots(&mut self, now: DateTime<Utc>) -> Result<Vec<WordId>, StorageError> {
        let cleared = self.working.assigned_ids();
        self.stage(WordOp::ClearSlots { at: now })?;
        Ok(cleared)
    }

    fn find_by_word(&mut self, word: &str) -> Result<Lookup, StorageError> {
        Ok(self.working.find_by_word(word).cloned().into())
    }

    fn update_slot(
        &mut self,
        id: WordId,
        slot: Option<Slot>,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.stage(WordOp::SetSlot { id, slot, at: now })
    }

    fn insert(&mut self, word: NewWord) -> Result<WordId, StorageError> {
        let id = self.working.next_id();
        self.stage(WordOp::Insert(word.into_record(id)))?;
        Ok(id)
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut this = *self;
        if !this.ops.is_empty() {
            this.journal.persist(&this.ops)?;
        }
        *this.committed = this.working;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(words: &[&str]) -> WordState {
        let now = Utc::now();
        let mut state = WordState::default();
        for word in words {
            let id = state.next_id();
            state
                .apply(&WordOp::Insert(NewWord::unassigned(*word, now).into_record(id)))
                .unwrap();
        }
        state
    }

    #[test]
    fn test_ids_increase_on_insert() {
        let state = seeded(&["a", "b", "c"]);
        let ids: Vec<u64> = state.records().iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(state.next_id(), WordId::new(4));
    }

    #[test]
    fn test_duplicate_ids_keep_lowest() {
        let state = seeded(&["a", "b", "a", "a", "b"]);
        assert_eq!(
            state.duplicate_ids(),
            vec![WordId::new(3), WordId::new(4), WordId::new(5)]
        );
        assert_eq!(state.find_by_word("a").unwrap().id, WordId::new(1));
    }

    #[test]
    fn test_find_by_word_is_case_sensitive() {
        let state = seeded(&["Aroha"]);
        assert!(state.find_by_word("aroha").is_none());
        assert!(state.find_by_word("Aroha").is_some());
    }

    #[test]
    fn test_clear_slots_touches_only_assigned() {
        let mut state = seeded(&["a", "b"]);
        let t0 = Utc::now();
        state
            .apply(&WordOp::SetSlot {
                id: WordId::new(1),
                slot: Some(Slot::new(1)),
                at: t0,
            })
            .unwrap();
        let before_b = state.find_by_word("b").unwrap().clone();

        let t1 = t0 + chrono::Duration::seconds(5);
        state.apply(&WordOp::ClearSlots { at: t1 }).unwrap();

        let a = state.find_by_word("a").unwrap();
        assert_eq!(a.slot, None);
        assert_eq!(a.updated_at, t1);
        assert_eq!(state.find_by_word("b").unwrap(), &before_b);
    }

    #[test]
    fn test_delete_missing_id_fails() {
        let mut state = seeded(&["a"]);
        let err = state
            .apply(&WordOp::Delete {
                ids: vec![WordId::new(7)],
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_second_begin_is_busy() {
        let shared = SharedState::default();
        let _tx = shared.begin(&NoJournal).unwrap();
        assert!(matches!(shared.begin(&NoJournal), Err(StorageError::Busy)));
        assert!(matches!(shared.read("test"), Err(StorageError::Busy)));
    }
}
