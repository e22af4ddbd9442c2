//! Run identity and outcome.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::word::SourceEntry;

/// Identifier of one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a committed reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Identity of the run.
    pub run_id: RunId,

    /// Timestamp written to every record touched by the run.
    pub started_at: DateTime<Utc>,

    /// Existing records that received a slot.
    pub updated: usize,

    /// Records created by the run.
    pub inserted: usize,

    /// Previously assigned records that ended the run in the word bank.
    pub preserved: usize,

    /// Records that held a slot before the reset.
    pub assigned_before: usize,

    /// Store records deleted as duplicates of a lower id.
    pub removed_duplicates: usize,

    /// Source entries skipped as repeats of an earlier word.
    pub skipped_duplicates: usize,

    /// blake3 digest of the final `(slot, word)` assignments.
    pub assignment_digest: String,
}

/// Digest of the assignment set a successful run leaves behind.
///
/// Order-independent: entries are sorted by slot, then word, before hashing.
#[must_use]
pub fn assignment_digest(entries: &[SourceEntry]) -> String {
    let mut pairs: Vec<(u16, &str)> = entries.iter().map(|e| (e.slot.get(), e.word.as_str())).collect();
    pairs.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for (slot, word) in pairs {
        hasher.update(&slot.to_le_bytes());
        hasher.update(&(word.len() as u64).to_le_bytes());
        hasher.update(word.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_ignores_order() {
        let a = [SourceEntry::new(1, "kia ora"), SourceEntry::new(2, "aroha")];
        let b = [SourceEntry::new(2, "aroha"), SourceEntry::new(1, "kia ora")];
        assert_eq!(assignment_digest(&a), assignment_digest(&b));
    }

    #[test]
    fn test_digest_tracks_slot_changes() {
        let a = [SourceEntry::new(1, "kia ora")];
        let b = [SourceEntry::new(2, "kia ora")];
        assert_ne!(assignment_digest(&a), assignment_digest(&b));
    }

    #[test]
    fn test_digest_ignores_payload() {
        let a = [SourceEntry::new(1, "kia ora").with_meaning("hello")];
        let b = [SourceEntry::new(1, "kia ora")];
        assert_eq!(assignment_digest(&a), assignment_digest(&b));
    }
}
