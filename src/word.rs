//! Word records, source entries and slot assignments.
//!
//! A [`WordRecord`] is the persisted unit of the word store. Its natural key is
//! the word text; its slot is the (nullable) position it currently holds in the
//! published list. Records whose slot is `None` sit in the word bank: they are
//! kept, just not assigned.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Store-assigned record identifier.
///
/// Identifiers are handed out in increasing order, so a lower id always means
/// an earlier-created record. Deduplication relies on that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordId(u64);

impl WordId {
    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for WordId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A slot assignment, e.g. a day-of-year index.
///
/// A `Slot` on its own is just a number; range checking happens against a
/// [`SlotRange`] because the valid range is configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(u16);

impl Slot {
    /// Creates a slot from its raw value.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Slot {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Inclusive bounds for valid slot values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    /// Lowest valid slot.
    pub min: Slot,
    /// Highest valid slot.
    pub max: Slot,
}

impl SlotRange {
    /// Day-of-year range, leap day included.
    pub const DAY_OF_YEAR: Self = Self {
        min: Slot(1),
        max: Slot(366),
    };

    /// Creates a range from two bounds.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSlotRange` if `min > max` or `min` is zero.
    pub fn new(min: u16, max: u16) -> Result<Self, ValidationError> {
        if min == 0 || min > max {
            return Err(ValidationError::InvalidSlotRange { min, max });
        }
        Ok(Self {
            min: Slot(min),
            max: Slot(max),
        })
    }

    /// Returns true if `slot` lies within the range.
    #[must_use]
    pub fn contains(&self, slot: Slot) -> bool {
        self.min <= slot && slot <= self.max
    }

    /// Returns the range as raw bounds.
    #[must_use]
    pub const fn as_raw(&self) -> RangeInclusive<u16> {
        self.min.0..=self.max.0
    }
}

impl Default for SlotRange {
    fn default() -> Self {
        Self::DAY_OF_YEAR
    }
}

/// Descriptive fields carried by both source entries and records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPayload {
    /// Meaning or translation.
    #[serde(default)]
    pub meaning: String,

    /// Supplementary links (dictionary pages, references).
    #[serde(default)]
    pub links: Vec<String>,

    /// Optional media reference (audio pronunciation, image).
    #[serde(default)]
    pub media: Option<String>,
}

/// One entry of an incoming dictionary list.
///
/// Entries are transient: they live for one reconciliation run and are either
/// copied into a new record or used to move an existing record's slot.
///
/// # Examples
///
/// ```
/// use wordbank::{Slot, SourceEntry};
///
/// let entry = SourceEntry::new(3, "kia ora").with_meaning("hello");
/// assert_eq!(entry.slot, Slot::new(3));
/// assert_eq!(entry.payload.meaning, "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Target slot for this word.
    pub slot: Slot,

    /// Natural key.
    pub word: String,

    /// Descriptive payload, copied on insert only.
    #[serde(flatten)]
    pub payload: WordPayload,
}

impl SourceEntry {
    /// Creates an entry with an empty payload.
    #[must_use]
    pub fn new(slot: u16, word: impl Into<String>) -> Self {
        Self {
            slot: Slot(slot),
            word: word.into(),
            payload: WordPayload::default(),
        }
    }

    /// Sets the meaning.
    #[must_use]
    pub fn with_meaning(mut self, meaning: impl Into<String>) -> Self {
        self.payload.meaning = meaning.into();
        self
    }

    /// Adds a supplementary link.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.payload.links.push(link.into());
        self
    }

    /// Sets the media reference.
    #[must_use]
    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.payload.media = Some(media.into());
        self
    }
}

/// A record that has not been assigned an id yet.
///
/// The store turns this into a [`WordRecord`] on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWord {
    /// Natural key.
    pub word: String,
    /// Initial slot; `None` puts the record in the word bank.
    pub slot: Option<Slot>,
    /// Descriptive payload.
    pub payload: WordPayload,
    /// Creation time, also used as the first `updated_at`.
    pub created_at: DateTime<Utc>,
    /// Whether the record is live.
    pub active: bool,
}

impl NewWord {
    /// Builds an active record from a source entry, stamped at `now`.
    #[must_use]
    pub fn from_entry(entry: &SourceEntry, now: DateTime<Utc>) -> Self {
        Self {
            word: entry.word.clone(),
            slot: Some(entry.slot),
            payload: entry.payload.clone(),
            created_at: now,
            active: true,
        }
    }

    /// Builds an unassigned record, mostly useful for seeding a store.
    #[must_use]
    pub fn unassigned(word: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            word: word.into(),
            slot: None,
            payload: WordPayload::default(),
            created_at: now,
            active: true,
        }
    }

    /// Sets the slot.
    #[must_use]
    pub fn with_slot(mut self, slot: u16) -> Self {
        self.slot = Some(Slot(slot));
        self
    }

    /// Finalizes the record under a store-assigned id.
    #[must_use]
    pub fn into_record(self, id: WordId) -> WordRecord {
        WordRecord {
            id,
            word: self.word,
            slot: self.slot,
            payload: self.payload,
            created_at: self.created_at,
            updated_at: self.created_at,
            active: self.active,
        }
    }
}

/// A persisted word.
///
/// Only `slot` and `updated_at` change after creation. Identity (`id`,
/// `created_at`) is fixed for the record's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    /// Store-assigned identity.
    pub id: WordId,

    /// Natural key. Expected unique, may transiently collide.
    pub word: String,

    /// `None` means the record sits in the word bank.
    pub slot: Option<Slot>,

    /// Descriptive payload, fixed at insert.
    #[serde(default)]
    pub payload: WordPayload,

    /// Insert time.
    pub created_at: DateTime<Utc>,

    /// Time of the last slot change.
    pub updated_at: DateTime<Utc>,

    /// Whether the record is live.
    pub active: bool,
}

impl WordRecord {
    /// Returns true if the record currently holds a slot.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.slot.is_some()
    }

    /// Converts the record back into a source entry, if assigned.
    #[must_use]
    pub fn to_entry(&self) -> Option<SourceEntry> {
        self.slot.map(|slot| SourceEntry {
            slot,
            word: self.word.clone(),
            payload: self.payload.clone(),
        })
    }
}
