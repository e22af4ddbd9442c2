//! Storage layer for word records.
//!
//! [`WordStore`] and [`StoreTransaction`] define the contract the migration
//! engine relies on. Two backends are provided: [`InMemoryWordStore`] and,
//! with the `persistent` feature, [`PersistentWordStore`].

mod memory;
mod state;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryWordStore;
pub use state::WordOp;
pub use traits::{Lookup, StorageError, StoreTransaction, WordStore};

#[cfg(feature = "persistent")]
pub use persistent::{open_store, PersistentConfig, PersistentWordStore};
