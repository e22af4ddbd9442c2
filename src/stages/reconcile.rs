//! Update-or-insert by natural key.
//!
//! For every incoming entry the store is asked for a record with exactly the
//! same word. A hit moves that record's slot; a miss creates a record. A hit
//! never touches identity or payload.

use chrono::{DateTime, Utc};

use crate::error::{MigrationError, MigrationResult};
use crate::storage::{Lookup, StoreTransaction};
use crate::word::{NewWord, SourceEntry, WordId};

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// An existing record took the entry's slot.
    Updated(WordId),
    /// A new record was created from the entry.
    Inserted(WordId),
}

/// Running totals for a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    /// Entries handled so far.
    pub processed: usize,
    /// Entries that moved an existing record.
    pub updated: usize,
    /// Entries that created a record.
    pub inserted: usize,
    /// Ids that took a slot through the update path.
    pub updated_ids: Vec<WordId>,
}

impl ReconcileCounts {
    fn record(&mut self, outcome: EntryOutcome) {
        self.processed += 1;
        match outcome {
            EntryOutcome::Updated(id) => {
                self.updated += 1;
                self.updated_ids.push(id);
            }
            EntryOutcome::Inserted(_) => self.inserted += 1,
        }
    }
}

/// Reconcile a single entry inside the transaction.
pub fn reconcile_entry(
    tx: &mut dyn StoreTransaction,
    entry: &SourceEntry,
    now: DateTime<Utc>,
) -> MigrationResult<EntryOutcome> {
    let lookup = tx
        .find_by_word(&entry.word)
        .map_err(|source| MigrationError::Lookup {
            word: entry.word.clone(),
            slot: entry.slot,
            source,
        })?;

    match lookup {
        Lookup::Found(record) => {
            tx.update_slot(record.id, Some(entry.slot), now)
                .map_err(|source| MigrationError::Update {
                    word: entry.word.clone(),
                    slot: entry.slot,
                    source,
                })?;
            Ok(EntryOutcome::Updated(record.id))
        }
        Lookup::NotFound => {
            let id = tx
                .insert(NewWord::from_entry(entry, now))
                .map_err(|source| MigrationError::Insert {
                    word: entry.word.clone(),
                    slot: entry.slot,
                    source,
                })?;
            Ok(EntryOutcome::Inserted(id))
        }
    }
}

/// Reconcile entries in order, stopping at the first failure.
///
/// `on_progress` is called after every `progress_interval` processed entries.
pub fn reconcile(
    tx: &mut dyn StoreTransaction,
    entries: &[SourceEntry],
    now: DateTime<Utc>,
    progress_interval: usize,
    mut on_progress: impl FnMut(&ReconcileCounts),
) -> MigrationResult<ReconcileCounts> {
    let mut counts = ReconcileCounts::default();

    for entry in entries {
        let outcome = reconcile_entry(tx, entry, now)?;
        counts.record(outcome);
        if progress_interval > 0 && counts.processed % progress_interval == 0 {
            on_progress(&counts);
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryWordStore, WordStore};
    use crate::word::{Slot, WordPayload};

    #[test]
    fn test_found_updates_slot_only() {
        let created = Utc::now() - chrono::Duration::days(3);
        let store = InMemoryWordStore::seeded([NewWord {
            word: "kia ora".to_string(),
            slot: None,
            payload: WordPayload {
                meaning: "hello".to_string(),
                links: vec!["https://example.org/kia-ora".to_string()],
                media: None,
            },
            created_at: created,
            active: true,
        }])
        .unwrap();
        let before = store.records().unwrap().remove(0);

        let now = Utc::now();
        let entry = SourceEntry::new(3, "kia ora").with_meaning("a different meaning");
        let mut tx = store.begin().unwrap();
        let outcome = reconcile_entry(tx.as_mut(), &entry, now).unwrap();
        tx.commit().unwrap();

        assert_eq!(outcome, EntryOutcome::Updated(before.id));
        let after = store.records().unwrap().remove(0);
        assert_eq!(after.slot, Some(Slot::new(3)));
        assert_eq!(after.updated_at, now);
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.payload, before.payload);
        assert_eq!(after.active, before.active);
    }

    #[test]
    fn test_not_found_inserts_copy_of_entry() {
        let store = InMemoryWordStore::new();
        let now = Utc::now();
        let entry = SourceEntry::new(4, "tēnā koe")
            .with_meaning("hello (to one person)")
            .with_media("tena-koe.mp3");

        let mut tx = store.begin().unwrap();
        let outcome = reconcile_entry(tx.as_mut(), &entry, now).unwrap();
        tx.commit().unwrap();

        let EntryOutcome::Inserted(id) = outcome else {
            panic!("expected insert, got {outcome:?}");
        };
        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.slot, Some(Slot::new(4)));
        assert_eq!(record.payload, entry.payload);
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
        assert!(record.active);
    }

    #[test]
    fn test_progress_fires_every_interval() {
        let store = InMemoryWordStore::new();
        let entries: Vec<SourceEntry> = (1..=120).map(|i| SourceEntry::new(i, format!("w{i}"))).collect();

        let mut ticks = Vec::new();
        let mut tx = store.begin().unwrap();
        let counts = reconcile(tx.as_mut(), &entries, Utc::now(), 50, |c| ticks.push(c.processed)).unwrap();

        assert_eq!(ticks, vec![50, 100]);
        assert_eq!(counts.inserted, 120);
        assert_eq!(counts.updated, 0);
    }

    #[test]
    fn test_inserted_word_is_found_by_later_entry() {
        let store = InMemoryWordStore::new();
        let entries = [SourceEntry::new(1, "a"), SourceEntry::new(2, "a")];
        let mut tx = store.begin().unwrap();
        let counts = reconcile(tx.as_mut(), &entries, Utc::now(), 50, |_| {}).unwrap();
        assert_eq!((counts.inserted, counts.updated), (1, 1));
    }
}
