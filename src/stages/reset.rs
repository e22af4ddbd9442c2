//! Assignment reset.

use chrono::{DateTime, Utc};

use crate::error::{MigrationError, MigrationResult};
use crate::storage::StoreTransaction;
use crate::word::WordId;

/// Count records currently holding a slot.
pub fn count_assigned(tx: &mut dyn StoreTransaction) -> MigrationResult<usize> {
    tx.count_assigned()
        .map_err(|source| MigrationError::Reset { source })
}

/// Move every assigned record to the word bank in one bulk call.
///
/// Returns the ids of the records cleared.
pub fn reset_assignments(
    tx: &mut dyn StoreTransaction,
    now: DateTime<Utc>,
) -> MigrationResult<Vec<WordId>> {
    tx.reset_slots(now)
        .map_err(|source| MigrationError::Reset { source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryWordStore, WordStore};
    use crate::word::NewWord;

    #[test]
    fn test_reset_clears_and_stamps() {
        let seeded_at = Utc::now() - chrono::Duration::days(30);
        let store = InMemoryWordStore::seeded([
            NewWord::unassigned("kia ora", seeded_at).with_slot(1),
            NewWord::unassigned("aroha", seeded_at).with_slot(2),
            NewWord::unassigned("whānau", seeded_at),
        ])
        .unwrap();

        let now = Utc::now();
        let mut tx = store.begin().unwrap();
        assert_eq!(count_assigned(tx.as_mut()).unwrap(), 2);
        assert_eq!(reset_assignments(tx.as_mut(), now).unwrap().len(), 2);
        assert_eq!(count_assigned(tx.as_mut()).unwrap(), 0);
        tx.commit().unwrap();

        for record in store.records().unwrap() {
            assert_eq!(record.slot, None);
            let expected = if record.word == "whānau" { seeded_at } else { now };
            assert_eq!(record.updated_at, expected, "{}", record.word);
        }
    }
}
