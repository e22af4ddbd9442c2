//! The individual steps of a reconciliation run.
//!
//! Each stage operates on the engine's transaction and maps storage failures
//! to its own [`MigrationError`](crate::error::MigrationError) variant.

mod dedup;
mod reconcile;
mod reset;
mod validate;

pub use dedup::{dedup_source, dedup_store, DedupedSource, SkippedEntry};
pub use reconcile::{reconcile, reconcile_entry, EntryOutcome, ReconcileCounts};
pub use reset::{count_assigned, reset_assignments};
pub use validate::validate_entries;
