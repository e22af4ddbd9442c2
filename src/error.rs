//! Error types for the word-bank migration engine.
//!
//! All errors are strongly typed using thiserror. A failed run always reports
//! the stage it failed in and, where one was in flight, the word and slot.

use thiserror::Error;

use crate::engine::MigrationState;
use crate::storage::StorageError;
use crate::word::Slot;

/// Validation errors raised before any store mutation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid slot range: min ({min}) must be non-zero and not exceed max ({max})")]
    InvalidSlotRange {
        min: u16,
        max: u16,
    },

    #[error("Slot {slot} for '{word}' is outside the valid range [{min}, {max}]")]
    SlotOutOfRange {
        word: String,
        slot: Slot,
        min: Slot,
        max: Slot,
    },

    #[error("Source entry at position {position} has an empty word")]
    EmptyWord {
        position: usize,
    },

    #[error("Slot {slot} is claimed by both '{first}' and '{second}'")]
    DuplicateSlot {
        slot: Slot,
        first: String,
        second: String,
    },

    #[error("Progress interval must be non-zero")]
    ZeroProgressInterval,
}

/// A failed reconciliation run.
///
/// Variants other than `Validation` and `Begin` are only produced after the
/// transaction was rolled back; if the rollback itself fails the original
/// error is wrapped in `RollbackFailed`.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Source rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to open transaction: {source}")]
    Begin {
        #[source]
        source: StorageError,
    },

    #[error("Duplicate removal failed: {source}")]
    Deduplication {
        #[source]
        source: StorageError,
    },

    #[error("Slot reset failed: {source}")]
    Reset {
        #[source]
        source: StorageError,
    },

    #[error("Lookup failed for '{word}' (slot {slot}): {source}")]
    Lookup {
        word: String,
        slot: Slot,
        #[source]
        source: StorageError,
    },

    #[error("Update failed for '{word}' (slot {slot}): {source}")]
    Update {
        word: String,
        slot: Slot,
        #[source]
        source: StorageError,
    },

    #[error("Insert failed for '{word}' (slot {slot}): {source}")]
    Insert {
        word: String,
        slot: Slot,
        #[source]
        source: StorageError,
    },

    #[error("Commit failed: {source}")]
    Commit {
        #[source]
        source: StorageError,
    },

    #[error("{cause}; rollback also failed: {rollback}")]
    RollbackFailed {
        cause: Box<MigrationError>,
        rollback: StorageError,
    },
}

impl MigrationError {
    /// The engine state the run was in when it failed.
    ///
    /// `Validation` and `Begin` failures happen before a transaction exists
    /// and report `NotStarted`.
    #[must_use]
    pub fn stage(&self) -> MigrationState {
        match self {
            Self::Validation(_) | Self::Begin { .. } => MigrationState::NotStarted,
            Self::Deduplication { .. } => MigrationState::Deduplicating,
            Self::Reset { .. } => MigrationState::Resetting,
            Self::Lookup { .. } | Self::Update { .. } | Self::Insert { .. } => {
                MigrationState::Reconciling
            }
            Self::Commit { .. } => MigrationState::Committing,
            Self::RollbackFailed { cause, .. } => cause.stage(),
        }
    }

    /// The word in flight when the run failed, if any.
    #[must_use]
    pub fn word(&self) -> Option<&str> {
        match self {
            Self::Lookup { word, .. }
            | Self::Update { word, .. }
            | Self::Insert { word, .. }
            | Self::Validation(ValidationError::SlotOutOfRange { word, .. }) => Some(word.as_str()),
            Self::RollbackFailed { cause, .. } => cause.word(),
            _ => None,
        }
    }

    /// The slot in flight when the run failed, if any.
    #[must_use]
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Self::Lookup { slot, .. } | Self::Update { slot, .. } | Self::Insert { slot, .. } => {
                Some(*slot)
            }
            Self::Validation(
                ValidationError::SlotOutOfRange { slot, .. }
                | ValidationError::DuplicateSlot { slot, .. },
            ) => Some(*slot),
            Self::RollbackFailed { cause, .. } => cause.slot(),
            _ => None,
        }
    }

    /// Returns true if the source was rejected before the store was touched.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if the rollback after the failure also failed.
    #[must_use]
    pub const fn is_rollback_failure(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }

    /// Returns true if running again unchanged may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        // Everything past `Begin` was rolled back on a store that was reachable;
        // retrying the same input against the same store fails the same way.
        matches!(self, Self::Begin { source } if source.is_retryable())
    }
}

/// Result type alias for migration runs.
pub type MigrationResult<T> = Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_slot_out_of_range() {
        let err = ValidationError::SlotOutOfRange {
            word: "kia ora".to_string(),
            slot: Slot::new(400),
            min: Slot::new(1),
            max: Slot::new(366),
        };
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("kia ora"));
    }

    #[test]
    fn test_lookup_error_carries_context() {
        let err = MigrationError::Lookup {
            word: "aroha".to_string(),
            slot: Slot::new(2),
            source: StorageError::BackendError("disk gone".to_string()),
        };
        assert_eq!(err.stage(), MigrationState::Reconciling);
        assert_eq!(err.word(), Some("aroha"));
        assert_eq!(err.slot(), Some(Slot::new(2)));
        let msg = err.to_string();
        assert!(msg.contains("aroha"));
        assert!(msg.contains("disk gone"));
    }

    #[test]
    fn test_rollback_failure_keeps_cause() {
        let err = MigrationError::RollbackFailed {
            cause: Box::new(MigrationError::Insert {
                word: "tēnā koe".to_string(),
                slot: Slot::new(4),
                source: StorageError::BackendError("insert refused".to_string()),
            }),
            rollback: StorageError::BackendError("rollback refused".to_string()),
        };
        assert!(err.is_rollback_failure());
        assert_eq!(err.stage(), MigrationState::Reconciling);
        assert_eq!(err.word(), Some("tēnā koe"));
        let msg = err.to_string();
        assert!(msg.contains("insert refused"));
        assert!(msg.contains("rollback refused"));
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err: MigrationError = ValidationError::EmptyWord { position: 0 }.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
        assert_eq!(err.stage(), MigrationState::NotStarted);
    }

    #[test]
    fn test_busy_begin_is_retryable() {
        let err = MigrationError::Begin {
            source: StorageError::Busy,
        };
        assert!(err.is_retryable());
        assert_eq!(err.stage(), MigrationState::NotStarted);
    }
}
