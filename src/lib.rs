//! # wordbank - Transactional reconciliation of daily word lists
//!
//! A word store holds one record per word. Some records are assigned to a
//! slot (a day of the year); the rest sit in the word bank. A reconciliation
//! run takes a new ordered word list and, inside a single transaction:
//!
//! - removes duplicate words already in the store (lowest id survives)
//! - moves every assigned record back to the word bank
//! - drops repeated words from the incoming list (first occurrence wins)
//! - updates the slot of records whose word already exists, inserting the rest
//!
//! Either every step is committed or the store is left untouched.
//!
//! ## Core Concepts
//!
//! - **Word record**: persistent, identified by [`WordId`], keyed naturally by its word
//! - **Slot**: a position in the schedule, validated against a [`SlotRange`]
//! - **Source entry**: one line of the incoming list
//! - **Migration engine**: the state machine that drives a run
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use wordbank::{InMemoryWordStore, MigrationEngine, SourceEntry, WordStore};
//!
//! let store = Arc::new(InMemoryWordStore::new());
//! let mut engine = MigrationEngine::new(store.clone());
//!
//! let report = engine.reconcile(vec![
//!     SourceEntry::new(1, "kia ora").with_meaning("hello"),
//!     SourceEntry::new(2, "aroha").with_meaning("love"),
//! ])?;
//!
//! assert_eq!(report.inserted, 2);
//! assert_eq!(store.assigned()?.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod word;

// Storage, stages and orchestration
pub mod engine;
pub mod events;
pub mod source;
pub mod stages;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use engine::{
    assignment_digest, MigrationConfig, MigrationEngine, MigrationReport, MigrationState, RunId,
    DEFAULT_PROGRESS_INTERVAL,
};
pub use error::{MigrationError, MigrationResult, ValidationError};
pub use events::{ChannelSink, EventSink, MemorySink, MigrationEvent, NullSink, TracingSink};
pub use source::{JsonSourceReader, SourceError, SourceReader};
pub use storage::{InMemoryWordStore, Lookup, StorageError, StoreTransaction, WordStore};
pub use word::{NewWord, Slot, SlotRange, SourceEntry, WordId, WordPayload, WordRecord};

#[cfg(feature = "persistent")]
pub use storage::{open_store, PersistentConfig, PersistentWordStore};
