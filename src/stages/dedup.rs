//! Duplicate resolution on both sides of a run.
//!
//! Store side: for each word, the lowest id survives. Source side: for each
//! word, the first entry in source order survives, whatever its slot.

use std::collections::HashMap;

use crate::error::{MigrationError, MigrationResult};
use crate::storage::StoreTransaction;
use crate::word::{Slot, SourceEntry};

/// Delete store records whose word is already held by a lower id.
///
/// Must run before the assignment reset so the reset only has to consider
/// the surviving record per word.
pub fn dedup_store(tx: &mut dyn StoreTransaction) -> MigrationResult<usize> {
    tx.delete_duplicate_words()
        .map_err(|source| MigrationError::Deduplication { source })
}

/// An incoming entry dropped because its word appeared earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position in the original source list.
    pub position: usize,
    /// The dropped entry.
    pub entry: SourceEntry,
    /// Slot of the earlier entry that won.
    pub kept_slot: Slot,
}

/// Incoming entries with repeated words removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupedSource {
    /// Surviving entries, in source order.
    pub entries: Vec<SourceEntry>,
    /// Dropped entries, in source order.
    pub skipped: Vec<SkippedEntry>,
}

impl DedupedSource {
    /// Number of entries dropped.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Keep the first occurrence of each word, preserving order.
#[must_use]
pub fn dedup_source(entries: Vec<SourceEntry>) -> DedupedSource {
    let mut seen: HashMap<String, Slot> = HashMap::with_capacity(entries.len());
    let mut out = DedupedSource {
        entries: Vec::with_capacity(entries.len()),
        skipped: Vec::new(),
    };

    for (position, entry) in entries.into_iter().enumerate() {
        if let Some(&kept_slot) = seen.get(&entry.word) {
            out.skipped.push(SkippedEntry {
                position,
                entry,
                kept_slot,
            });
            continue;
        }
        seen.insert(entry.word.clone(), entry.slot);
        out.entries.push(entry);
    }

    out
}
