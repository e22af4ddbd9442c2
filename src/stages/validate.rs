//! Pre-flight checks on the incoming list.
//!
//! Runs before the transaction opens, so a rejected list never touches the store.

use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::word::{Slot, SlotRange, SourceEntry};

/// Reject entries with an empty word or an out-of-range slot, and lists where
/// two distinct surviving words claim the same slot.
///
/// Slot uniqueness is checked on first occurrences only, matching
/// [`dedup_source`](super::dedup_source): a repeated word never claims a slot.
pub fn validate_entries(entries: &[SourceEntry], range: SlotRange) -> Result<(), ValidationError> {
    let mut seen_words: HashSet<&str> = HashSet::with_capacity(entries.len());
    let mut slot_owner: HashMap<Slot, &str> = HashMap::with_capacity(entries.len());

    for (position, entry) in entries.iter().enumerate() {
        if entry.word.trim().is_empty() {
            return Err(ValidationError::EmptyWord { position });
        }
        if !range.contains(entry.slot) {
            return Err(ValidationError::SlotOutOfRange {
                word: entry.word.clone(),
                slot: entry.slot,
                min: range.min,
                max: range.max,
            });
        }
        if !seen_words.insert(entry.word.as_str()) {
            continue;
        }
        if let Some(first) = slot_owner.insert(entry.slot, entry.word.as_str()) {
            return Err(ValidationError::DuplicateSlot {
                slot: entry.slot,
                first: first.to_string(),
                second: entry.word.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_repeated_word_with_other_slot() {
        let entries = [SourceEntry::new(5, "a"), SourceEntry::new(1, "a")];
        assert!(validate_entries(&entries, SlotRange::default()).is_ok());
    }

    #[test]
    fn test_rejects_shared_slot() {
        let entries = [SourceEntry::new(5, "a"), SourceEntry::new(5, "b")];
        let err = validate_entries(&entries, SlotRange::default()).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateSlot { slot, .. } if slot == Slot::new(5)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let entries = [SourceEntry::new(0, "a")];
        assert!(matches!(
            validate_entries(&entries, SlotRange::default()),
            Err(ValidationError::SlotOutOfRange { .. })
        ));

        let range = SlotRange::new(1, 31).unwrap();
        let entries = [SourceEntry::new(32, "b")];
        assert!(validate_entries(&entries, range).is_err());
    }

    #[test]
    fn test_rejects_blank_word() {
        let entries = [SourceEntry::new(1, "a"), SourceEntry::new(2, "  ")];
        assert!(matches!(
            validate_entries(&entries, SlotRange::default()),
            Err(ValidationError::EmptyWord { position: 1 })
        ));
    }
}
