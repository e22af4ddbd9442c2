//! Reconciling migration engine.
//!
//! The engine applies an incoming word list to a [`WordStore`] inside one
//! transaction:
//!
//! 1. validate the list (no transaction yet)
//! 2. open the transaction
//! 3. delete store-side duplicate words
//! 4. clear existing slot assignments (skipped if none)
//! 5. drop repeated words from the incoming list
//! 6. update-or-insert each remaining entry by word
//! 7. commit
//!
//! Any failure after step 2 rolls the transaction back, so a failed run
//! leaves the store exactly as it found it.

mod report;
mod state;

pub use report::{assignment_digest, MigrationReport, RunId};
pub use state::MigrationState;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{MigrationError, MigrationResult, ValidationError};
use crate::events::{EventSink, MigrationEvent, TracingSink};
use crate::stages::{
    count_assigned, dedup_source, dedup_store, reconcile, reset_assignments, validate_entries,
};
use crate::storage::{StoreTransaction, WordStore};
use crate::word::{SlotRange, SourceEntry, WordId};

/// Default number of processed entries between progress events.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Valid slot values.
    pub slot_range: SlotRange,
    /// Processed entries between progress events.
    pub progress_interval: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            slot_range: SlotRange::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl MigrationConfig {
    /// Check the configuration.
    ///
    /// # Errors
    /// Returns `ValidationError::ZeroProgressInterval` for a zero interval.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.progress_interval == 0 {
            return Err(ValidationError::ZeroProgressInterval);
        }
        Ok(self)
    }
}

struct StageOutcome {
    removed_duplicates: usize,
    assigned_before: usize,
    skipped_duplicates: usize,
    updated: usize,
    inserted: usize,
    preserved: usize,
    assignment_digest: String,
}

/// Runs reconciliations against one store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use wordbank::{InMemoryWordStore, MigrationEngine, SourceEntry};
///
/// let store = Arc::new(InMemoryWordStore::new());
/// let mut engine = MigrationEngine::new(store);
/// let report = engine
///     .reconcile(vec![SourceEntry::new(1, "kia ora")])
///     .unwrap();
/// assert_eq!(report.inserted, 1);
/// ```
pub struct MigrationEngine {
    store: Arc<dyn WordStore>,
    sink: Arc<dyn EventSink>,
    config: MigrationConfig,
    state: MigrationState,
    history: Vec<MigrationState>,
}

impl MigrationEngine {
    /// Create an engine with default configuration, logging through `tracing`.
    #[must_use]
    pub fn new(store: Arc<dyn WordStore>) -> Self {
        Self {
            store,
            sink: Arc::new(TracingSink),
            config: MigrationConfig::default(),
            state: MigrationState::NotStarted,
            history: vec![MigrationState::NotStarted],
        }
    }

    /// Replace the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_config(mut self, config: MigrationConfig) -> Result<Self, ValidationError> {
        self.config = config.validate()?;
        Ok(self)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// States visited by the most recent run, in order.
    pub fn history(&self) -> &[MigrationState] {
        &self.history
    }

    /// Reconcile `entries` against the store.
    ///
    /// # Errors
    /// - `Validation` if the list is rejected; the store is not touched
    /// - `Begin` if no transaction could be opened
    /// - any stage error, after the transaction was rolled back
    /// - `RollbackFailed` if the rollback after a stage error also failed
    pub fn reconcile(&mut self, entries: Vec<SourceEntry>) -> MigrationResult<MigrationReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        self.state = MigrationState::NotStarted;
        self.history = vec![MigrationState::NotStarted];

        let span = tracing::info_span!("reconcile", %run_id, entries = entries.len());
        let _guard = span.enter();

        validate_entries(&entries, self.config.slot_range)?;
        self.sink.emit(&MigrationEvent::RunStarted {
            run_id,
            entries: entries.len(),
        });

        let store = Arc::clone(&self.store);
        let mut tx = store
            .begin()
            .map_err(|source| MigrationError::Begin { source })?;
        self.transition(run_id, MigrationState::TransactionOpen);

        let outcome = match self.run_stages(run_id, tx.as_mut(), entries, started_at) {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = match tx.rollback() {
                    Ok(()) => err,
                    Err(rollback) => MigrationError::RollbackFailed {
                        cause: Box::new(err),
                        rollback,
                    },
                };
                return Err(self.rolled_back(run_id, err));
            }
        };

        self.transition(run_id, MigrationState::Committing);
        if let Err(source) = tx.commit() {
            return Err(self.rolled_back(run_id, MigrationError::Commit { source }));
        }
        self.transition(run_id, MigrationState::Committed);

        self.sink.emit(&MigrationEvent::Committed {
            run_id,
            updated: outcome.updated,
            inserted: outcome.inserted,
            preserved: outcome.preserved,
        });

        Ok(MigrationReport {
            run_id,
            started_at,
            updated: outcome.updated,
            inserted: outcome.inserted,
            preserved: outcome.preserved,
            assigned_before: outcome.assigned_before,
            removed_duplicates: outcome.removed_duplicates,
            skipped_duplicates: outcome.skipped_duplicates,
            assignment_digest: outcome.assignment_digest,
        })
    }

    fn run_stages(
        &mut self,
        run_id: RunId,
        tx: &mut dyn StoreTransaction,
        entries: Vec<SourceEntry>,
        now: DateTime<Utc>,
    ) -> MigrationResult<StageOutcome> {
        self.transition(run_id, MigrationState::Deduplicating);
        let removed_duplicates = dedup_store(tx)?;
        if removed_duplicates > 0 {
            self.sink.emit(&MigrationEvent::StoreDuplicatesRemoved {
                run_id,
                removed: removed_duplicates,
            });
        }

        self.transition(run_id, MigrationState::Resetting);
        let assigned_before = count_assigned(tx)?;
        let cleared: HashSet<WordId> = if assigned_before > 0 {
            let cleared = reset_assignments(tx, now)?;
            self.sink.emit(&MigrationEvent::SlotsReset {
                run_id,
                cleared: cleared.len(),
            });
            cleared.into_iter().collect()
        } else {
            self.sink.emit(&MigrationEvent::ResetSkipped { run_id });
            HashSet::new()
        };

        self.transition(run_id, MigrationState::Reconciling);
        let deduped = dedup_source(entries);
        for skipped in &deduped.skipped {
            self.sink.emit(&MigrationEvent::SourceDuplicateSkipped {
                run_id,
                word: skipped.entry.word.clone(),
                slot: skipped.entry.slot,
                kept_slot: skipped.kept_slot,
            });
        }

        let total = deduped.entries.len();
        let sink = Arc::clone(&self.sink);
        let counts = reconcile(tx, &deduped.entries, now, self.config.progress_interval, |c| {
            sink.emit(&MigrationEvent::Progress {
                run_id,
                processed: c.processed,
                total,
                updated: c.updated,
                inserted: c.inserted,
            });
        })?;

        let reassigned = counts
            .updated_ids
            .iter()
            .filter(|id| cleared.contains(id))
            .count();

        Ok(StageOutcome {
            removed_duplicates,
            assigned_before,
            skipped_duplicates: deduped.skipped_count(),
            updated: counts.updated,
            inserted: counts.inserted,
            preserved: cleared.len() - reassigned,
            assignment_digest: assignment_digest(&deduped.entries),
        })
    }

    fn transition(&mut self, run_id: RunId, to: MigrationState) {
        let from = self.state;
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        self.state = to;
        self.history.push(to);
        self.sink.emit(&MigrationEvent::StateChanged { run_id, from, to });
    }

    fn rolled_back(&mut self, run_id: RunId, err: MigrationError) -> MigrationError {
        self.transition(run_id, MigrationState::RolledBack);
        self.sink.emit(&MigrationEvent::RolledBack {
            run_id,
            stage: err.stage(),
            error: err.to_string(),
        });
        err
    }
}
