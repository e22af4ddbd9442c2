//! Write-Ahead Log (WAL) for crash recovery.
//!
//! Each committed transaction is one WAL entry holding its whole op batch, so
//! a transaction is either fully replayed or not at all:
//! 1. The batch is framed and appended in a single write
//! 2. fsync makes it durable before the in-memory state is swapped
//! 3. A failed append is cut back off the file before the error is returned
//! 4. On open, entries are replayed in sequence; a torn tail is cut off
//!
//! See [`codec`](super::codec) for the file layout.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Error as IoError, ErrorKind, Result as IoResult, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::state::{lock_err, Journal, WordOp};
use crate::storage::traits::StorageError;

use super::codec::{self, FrameReader, ReadFrame};

/// A single entry in the write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// When this entry was written.
    pub timestamp: DateTime<Utc>,
    /// The logged payload.
    pub kind: WalEntryKind,
}

/// The type of WAL entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntryKind {
    /// All ops of one committed transaction.
    Commit {
        /// Ops in application order.
        ops: Vec<WordOp>,
    },
}

/// Entries recovered from an existing log.
#[derive(Debug, Default)]
pub struct Recovered {
    /// Intact entries, in file order.
    pub entries: Vec<WalEntry>,
    /// Bytes dropped from a torn tail.
    pub discarded_bytes: u64,
}

struct WalWriter {
    file: File,
    sequence: u64,
    /// Set when a failed append could not be undone; the file tail is unknown.
    wedged: bool,
}

impl WalWriter {
    /// Run `write` for one frame. On failure the file is truncated back to
    /// its length before the call, so no partial or unacknowledged frame
    /// survives.
    fn write_frame(
        &mut self,
        frame: &[u8],
        write: impl FnOnce(&mut File, &[u8]) -> IoResult<()>,
    ) -> Result<(), StorageError> {
        if self.wedged {
            return Err(StorageError::BackendError(
                "WAL refused append: an earlier failed append could not be undone".to_string(),
            ));
        }

        let len = self.file.metadata()?.len();
        let Err(err) = write(&mut self.file, frame) else {
            return Ok(());
        };

        if let Err(undo) = self.file.set_len(len).and_then(|()| self.file.sync_all()) {
            self.wedged = true;
            tracing::error!(error = %err, undo = %undo, "failed WAL append could not be undone");
            return Err(StorageError::BackendError(format!(
                "WAL append failed ({err}) and truncating it back failed ({undo})"
            )));
        }
        tracing::warn!(error = %err, "WAL append failed; tail truncated");
        Err(err.into())
    }
}

/// Write-Ahead Log for crash recovery.
///
/// Thread-safe via internal mutex.
pub struct WriteAheadLog {
    writer: Mutex<WalWriter>,
    sync_on_write: bool,
}

impl WriteAheadLog {
    /// Open or create a WAL file and recover its entries.
    ///
    /// A truncated final entry (crash mid-append) is cut off so new appends
    /// follow the last intact entry. A checksum failure or a sequence gap
    /// anywhere else is an error: the log is corrupt, not torn.
    pub fn open(path: &Path, sync_on_write: bool) -> IoResult<(Self, Recovered)> {
        let exists = path.exists() && std::fs::metadata(path)?.len() > 0;

        let recovered = if exists {
            let (recovered, valid_len) = Self::recover(path)?;
            if recovered.discarded_bytes > 0 {
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
            recovered
        } else {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            codec::write_header(&mut file)?;
            if sync_on_write {
                file.sync_all()?;
            }
            Recovered::default()
        };

        let sequence = recovered.entries.last().map_or(0, |e| e.sequence);
        let file = OpenOptions::new().append(true).open(path)?;

        let wal = Self {
            writer: Mutex::new(WalWriter {
                file,
                sequence,
                wedged: false,
            }),
            sync_on_write,
        };
        Ok((wal, recovered))
    }

    /// Append an entry to the WAL.
    ///
    /// Returns the sequence number assigned to this entry. On error nothing
    /// of the entry remains in the file and the sequence does not advance.
    pub fn append(&self, kind: WalEntryKind) -> Result<u64, StorageError> {
        let mut writer = self.writer.lock().map_err(|_| lock_err("wal.append"))?;

        let candidate = writer.sequence + 1;
        let entry = WalEntry {
            sequence: candidate,
            timestamp: Utc::now(),
            kind,
        };
        let frame = codec::frame(&entry).map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let sync = self.sync_on_write;
        writer.write_frame(&frame, |file, frame| {
            file.write_all(frame)?;
            file.flush()?;
            if sync {
                file.sync_all()?;
            }
            Ok(())
        })?;

        writer.sequence = candidate;
        Ok(candidate)
    }

    /// Get the current sequence number.
    pub fn current_sequence(&self) -> Result<u64, StorageError> {
        Ok(self.writer.lock().map_err(|_| lock_err("wal.sequence"))?.sequence)
    }

    fn recover(path: &Path) -> IoResult<(Recovered, u64)> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        codec::check_header(&mut reader)?;

        let mut frames = FrameReader::new(reader, codec::HEADER_LEN);
        let mut recovered = Recovered::default();

        loop {
            match frames.next_frame::<WalEntry>()? {
                ReadFrame::Entry(entry) => {
                    let expected = recovered.entries.last().map_or(1, |e| e.sequence + 1);
                    if entry.sequence != expected {
                        return Err(IoError::new(
                            ErrorKind::InvalidData,
                            format!("WAL sequence gap: expected {expected}, found {}", entry.sequence),
                        ));
                    }
                    recovered.entries.push(entry);
                }
                ReadFrame::End => break,
                ReadFrame::Torn => {
                    recovered.discarded_bytes = file_size - frames.offset();
                    tracing::warn!(
                        path = %path.display(),
                        discarded_bytes = recovered.discarded_bytes,
                        "discarding torn WAL tail"
                    );
                    break;
                }
            }
        }

        Ok((recovered, frames.offset()))
    }
}

impl Journal for WriteAheadLog {
    fn persist(&self, ops: &[WordOp]) -> Result<(), StorageError> {
        self.append(WalEntryKind::Commit { ops: ops.to_vec() })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::{NewWord, WordId};
    use tempfile::tempdir;

    fn insert_op(word: &str, id: u64) -> WordOp {
        WordOp::Insert(NewWord::unassigned(word, Utc::now()).into_record(WordId::new(id)))
    }

    fn disk_full() -> IoError {
        IoError::new(ErrorKind::Other, "no space left on device")
    }

    #[test]
    fn test_wal_append_and_recover() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        {
            let (wal, recovered) = WriteAheadLog::open(&wal_path, false).unwrap();
            assert!(recovered.entries.is_empty());
            wal.persist(&[insert_op("kia ora", 1)]).unwrap();
            wal.persist(&[insert_op("aroha", 2), insert_op("whānau", 3)]).unwrap();
            assert_eq!(wal.current_sequence().unwrap(), 2);
        }

        let (wal, recovered) = WriteAheadLog::open(&wal_path, false).unwrap();
        assert_eq!(recovered.entries.len(), 2);
        assert_eq!(recovered.discarded_bytes, 0);
        assert_eq!(wal.current_sequence().unwrap(), 2);

        let WalEntryKind::Commit { ops } = &recovered.entries[1].kind;
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_torn_tail_is_cut() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("torn.wal");

        {
            let (wal, _) = WriteAheadLog::open(&wal_path, true).unwrap();
            wal.persist(&[insert_op("a", 1)]).unwrap();
            wal.persist(&[insert_op("b", 2)]).unwrap();
        }

        let size = std::fs::metadata(&wal_path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&wal_path).unwrap();
        file.set_len(size - 3).unwrap();
        drop(file);

        {
            let (wal, recovered) = WriteAheadLog::open(&wal_path, true).unwrap();
            assert_eq!(recovered.entries.len(), 1);
            assert!(recovered.discarded_bytes > 0);
            wal.persist(&[insert_op("c", 2)]).unwrap();
        }

        let (_, recovered) = WriteAheadLog::open(&wal_path, true).unwrap();
        assert_eq!(recovered.entries.len(), 2);
        assert_eq!(recovered.entries[1].sequence, 2);
    }

    #[test]
    fn test_partial_append_is_truncated_before_next_commit() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("partial.wal");

        {
            let (wal, _) = WriteAheadLog::open(&wal_path, true).unwrap();
            wal.persist(&[insert_op("kia ora", 1)]).unwrap();
            let size = std::fs::metadata(&wal_path).unwrap().len();

            let err = wal
                .writer
                .lock()
                .unwrap()
                .write_frame(&[1, 200, 0, 0, 0, b'{'], |file, frame| {
                    file.write_all(&frame[..4])?;
                    Err(disk_full())
                })
                .unwrap_err();
            assert!(matches!(err, StorageError::Io(_)));
            assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), size);
            assert_eq!(wal.current_sequence().unwrap(), 1);

            wal.persist(&[insert_op("aroha", 2)]).unwrap();
        }

        let (wal, recovered) = WriteAheadLog::open(&wal_path, true).unwrap();
        assert_eq!(recovered.entries.len(), 2);
        assert_eq!(recovered.discarded_bytes, 0);
        assert_eq!(wal.current_sequence().unwrap(), 2);
    }

    #[test]
    fn test_unsynced_append_is_not_replayed() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("unsynced.wal");

        {
            let (wal, _) = WriteAheadLog::open(&wal_path, true).unwrap();
            wal.persist(&[insert_op("kia ora", 1)]).unwrap();

            // Whole frame written, then the sync fails.
            let entry = WalEntry {
                sequence: 2,
                timestamp: Utc::now(),
                kind: WalEntryKind::Commit {
                    ops: vec![insert_op("aroha", 2)],
                },
            };
            let frame = codec::frame(&entry).unwrap();
            let result = wal.writer.lock().unwrap().write_frame(&frame, |file, frame| {
                file.write_all(frame)?;
                Err(disk_full())
            });
            assert!(result.is_err());
        }

        let (_, recovered) = WriteAheadLog::open(&wal_path, true).unwrap();
        assert_eq!(recovered.entries.len(), 1);
        let WalEntryKind::Commit { ops } = &recovered.entries[0].kind;
        assert!(matches!(&ops[..], [WordOp::Insert(record)] if record.word == "kia ora"));
    }

    #[test]
    fn test_sequence_gap_is_corruption() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("gap.wal");

        {
            let (wal, _) = WriteAheadLog::open(&wal_path, false).unwrap();
            wal.persist(&[insert_op("a", 1)]).unwrap();
        }
        let entry = WalEntry {
            sequence: 5,
            timestamp: Utc::now(),
            kind: WalEntryKind::Commit { ops: Vec::new() },
        };
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&codec::frame(&entry).unwrap()).unwrap();
        drop(file);

        let err = WriteAheadLog::open(&wal_path, false).err().unwrap();
        assert!(err.to_string().contains("sequence gap"));
    }
}
