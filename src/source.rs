//! Incoming word lists.
//!
//! A source is a JSON array of entries:
//!
//! ```json
//! [
//!   { "slot": 1, "word": "kia ora", "meaning": "hello", "links": [], "media": null },
//!   { "slot": 2, "word": "aroha" }
//! ]
//! ```
//!
//! Order matters: when a word repeats, the first occurrence wins.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::word::SourceEntry;

/// Errors raised while reading a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed source: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Something that yields the ordered list of incoming entries.
pub trait SourceReader {
    /// Read every entry, preserving source order.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or parsed.
    fn read_entries(self) -> Result<Vec<SourceEntry>, SourceError>;
}

impl SourceReader for Vec<SourceEntry> {
    fn read_entries(self) -> Result<Vec<SourceEntry>, SourceError> {
        Ok(self)
    }
}

/// Reads a JSON array of entries.
#[derive(Debug)]
pub struct JsonSourceReader<R> {
    reader: R,
}

impl<R: Read> JsonSourceReader<R> {
    /// Wrap any reader.
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl JsonSourceReader<BufReader<File>> {
    /// Open a JSON file.
    ///
    /// # Errors
    /// Returns `SourceError::Io` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> SourceReader for JsonSourceReader<R> {
    fn read_entries(self) -> Result<Vec<SourceEntry>, SourceError> {
        Ok(serde_json::from_reader(self.reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::Slot;
    use std::io::Write;

    #[test]
    fn test_reads_entries_in_order() {
        let json = r#"[
            {"slot": 3, "word": "kia ora", "meaning": "hello", "links": ["https://example.org"]},
            {"slot": 1, "word": "aroha"}
        ]"#;
        let entries = JsonSourceReader::new(json.as_bytes()).read_entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].word, "kia ora");
        assert_eq!(entries[0].slot, Slot::new(3));
        assert_eq!(entries[0].payload.meaning, "hello");
        assert_eq!(entries[0].payload.links, vec!["https://example.org".to_string()]);
        assert_eq!(entries[1].word, "aroha");
        assert!(entries[1].payload.media.is_none());
    }

    #[test]
    fn test_empty_array_is_valid() {
        let entries = JsonSourceReader::new(&b"[]"[..]).read_entries().unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_missing_slot_is_rejected() {
        let err = JsonSourceReader::new(&br#"[{"word": "a"}]"#[..])
            .read_entries()
            .unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"slot": 7, "word": "whānau"}}]"#).unwrap();

        let entries = JsonSourceReader::open(file.path()).unwrap().read_entries().unwrap();
        assert_eq!(entries, vec![SourceEntry::new(7, "whānau")]);
    }

    #[test]
    fn test_open_missing_file() {
        let err = JsonSourceReader::open("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
