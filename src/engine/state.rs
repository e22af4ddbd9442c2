//! Run lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a reconciliation run is in its lifecycle.
///
/// ```text
/// NotStarted → TransactionOpen → Deduplicating → Resetting → Reconciling → Committing → Committed
///                     └──────────────┴──────────────┴────────────┴─────────────┴──────→ RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// No run in progress; the store has not been touched.
    NotStarted,
    /// The transaction is open.
    TransactionOpen,
    /// Deleting store-side duplicate words.
    Deduplicating,
    /// Returning assigned records to the word bank.
    Resetting,
    /// Updating or inserting incoming entries.
    Reconciling,
    /// Committing the transaction.
    Committing,
    /// Every write is durable and visible.
    Committed,
    /// The transaction was discarded.
    RolledBack,
}

impl MigrationState {
    /// Returns true once the run can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Returns true if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::TransactionOpen)
            | (Self::TransactionOpen, Self::Deduplicating)
            | (Self::Deduplicating, Self::Resetting)
            | (Self::Resetting, Self::Reconciling)
            | (Self::Reconciling, Self::Committing)
            | (Self::Committing, Self::Committed) => true,
            // A failure anywhere between opening and committing rolls back.
            (
                Self::TransactionOpen
                | Self::Deduplicating
                | Self::Resetting
                | Self::Reconciling
                | Self::Committing,
                Self::RolledBack,
            ) => true,
            // Terminal states restart on the next run.
            (Self::Committed | Self::RolledBack, Self::NotStarted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not_started",
            Self::TransactionOpen => "transaction_open",
            Self::Deduplicating => "deduplicating",
            Self::Resetting => "resetting",
            Self::Reconciling => "reconciling",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_allowed() {
        let path = [
            MigrationState::NotStarted,
            MigrationState::TransactionOpen,
            MigrationState::Deduplicating,
            MigrationState::Resetting,
            MigrationState::Reconciling,
            MigrationState::Committing,
            MigrationState::Committed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping_stages() {
        assert!(!MigrationState::TransactionOpen.can_transition_to(MigrationState::Reconciling));
        assert!(!MigrationState::NotStarted.can_transition_to(MigrationState::RolledBack));
        assert!(!MigrationState::Committed.can_transition_to(MigrationState::RolledBack));
    }

    #[test]
    fn test_terminal_states() {
        assert!(MigrationState::Committed.is_terminal());
        assert!(MigrationState::RolledBack.is_terminal());
        assert!(!MigrationState::Committing.is_terminal());
    }
}
