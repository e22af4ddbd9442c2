//! Migration events and the sinks that receive them.
//!
//! The engine never logs directly. It emits [`MigrationEvent`]s to an
//! injected [`EventSink`]; emitting is infallible by signature, so a sink
//! that cannot deliver an event drops it and the run carries on.

use std::sync::Mutex;

use crossbeam_channel::{Sender, TrySendError};

use crate::engine::{MigrationState, RunId};
use crate::word::Slot;

/// Something observable that happened during a reconciliation run.
///
/// Every event carries the `run_id` of the run that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    /// The run was accepted and is about to open its transaction.
    RunStarted {
        /// Emitting run.
        run_id: RunId,
        /// Entries in the incoming list, before dedup.
        entries: usize,
    },

    /// The engine moved between states.
    StateChanged {
        /// Emitting run.
        run_id: RunId,
        /// State left.
        from: MigrationState,
        /// State entered.
        to: MigrationState,
    },

    /// Store-side duplicates were deleted.
    StoreDuplicatesRemoved {
        /// Emitting run.
        run_id: RunId,
        /// Records deleted.
        removed: usize,
    },

    /// An incoming entry repeated an earlier word and was skipped.
    SourceDuplicateSkipped {
        /// Emitting run.
        run_id: RunId,
        /// The repeated word.
        word: String,
        /// Slot the skipped entry asked for.
        slot: Slot,
        /// Slot of the earlier entry that won.
        kept_slot: Slot,
    },

    /// Existing assignments were cleared.
    SlotsReset {
        /// Emitting run.
        run_id: RunId,
        /// Records moved to the word bank.
        cleared: usize,
    },

    /// No record held a slot, so the reset was skipped.
    ResetSkipped {
        /// Emitting run.
        run_id: RunId,
    },

    /// Periodic reconciliation progress.
    Progress {
        /// Emitting run.
        run_id: RunId,
        /// Entries reconciled so far.
        processed: usize,
        /// Entries to reconcile after dedup.
        total: usize,
        /// Updates so far.
        updated: usize,
        /// Inserts so far.
        inserted: usize,
    },

    /// The transaction committed.
    Committed {
        /// Emitting run.
        run_id: RunId,
        /// Existing records that took a slot.
        updated: usize,
        /// Records created.
        inserted: usize,
        /// Previously assigned records left in the word bank.
        preserved: usize,
    },

    /// The transaction was rolled back after a failure.
    RolledBack {
        /// Emitting run.
        run_id: RunId,
        /// State the run failed in.
        stage: MigrationState,
        /// Rendered failure.
        error: String,
    },
}

impl MigrationEvent {
    /// The run this event belongs to.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StateChanged { run_id, .. }
            | Self::StoreDuplicatesRemoved { run_id, .. }
            | Self::SourceDuplicateSkipped { run_id, .. }
            | Self::SlotsReset { run_id, .. }
            | Self::ResetSkipped { run_id }
            | Self::Progress { run_id, .. }
            | Self::Committed { run_id, .. }
            | Self::RolledBack { run_id, .. } => *run_id,
        }
    }
}

/// Receiver of migration events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not panic and must not block for long.
    fn emit(&self, event: &MigrationEvent);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &MigrationEvent) {}
}

/// Sink that turns events into leveled `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::RunStarted { run_id, entries } => {
                tracing::info!(%run_id, entries, "reconciliation started");
            }
            MigrationEvent::StateChanged { run_id, from, to } => {
                tracing::debug!(%run_id, %from, %to, "state changed");
            }
            MigrationEvent::StoreDuplicatesRemoved { run_id, removed } => {
                tracing::warn!(%run_id, removed, "removed duplicate words from store");
            }
            MigrationEvent::SourceDuplicateSkipped {
                run_id,
                word,
                slot,
                kept_slot,
            } => {
                tracing::warn!(%run_id, %word, %slot, %kept_slot, "skipping duplicate source word");
            }
            MigrationEvent::SlotsReset { run_id, cleared } => {
                tracing::info!(%run_id, cleared, "cleared existing slot assignments");
            }
            MigrationEvent::ResetSkipped { run_id } => {
                tracing::debug!(%run_id, "no assigned records; reset skipped");
            }
            MigrationEvent::Progress {
                run_id,
                processed,
                total,
                updated,
                inserted,
            } => {
                tracing::info!(target: "progress", %run_id, processed, total, updated, inserted, "progress");
            }
            MigrationEvent::Committed {
                run_id,
                updated,
                inserted,
                preserved,
            } => {
                tracing::info!(%run_id, updated, inserted, preserved, "reconciliation committed");
            }
            MigrationEvent::RolledBack { run_id, stage, error } => {
                tracing::error!(%run_id, %stage, %error, "reconciliation rolled back");
            }
        }
    }
}

/// Sink forwarding events to a bounded channel.
///
/// A full or disconnected channel drops the event.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<MigrationEvent>,
}

impl ChannelSink {
    /// Wrap an existing sender.
    #[must_use]
    pub const fn new(tx: Sender<MigrationEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &MigrationEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("event channel full; dropping migration event");
            }
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MigrationEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &MigrationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
