//! Journal framing.
//!
//! A journal file is the `WBNK` magic and a format byte, followed by frames
//! laid back to back:
//!
//! ```text
//! [len: u32 LE][crc32(len ++ body): u32 LE][body: len bytes of JSON]
//! ```
//!
//! The checksum covers the length prefix, so a damaged length reads as
//! corruption instead of as a torn tail of some other size.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Magic bytes opening every journal file.
pub const MAGIC: [u8; 4] = *b"WBNK";

/// Journal format written by this build.
pub const FORMAT: u8 = 1;

/// Bytes before the first frame.
pub const HEADER_LEN: u64 = 5;

const PREFIX_LEN: usize = 8;

/// Bodies larger than this are treated as corruption.
const MAX_BODY_LEN: u32 = 64 * 1024 * 1024;

fn frame_crc(len: [u8; 4], body: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&len);
    hasher.update(body);
    hasher.finalize()
}

fn invalid(msg: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, msg)
}

/// Serialize `value` into one self-checking frame.
pub fn frame<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let body = serde_json::to_vec(value)
        .map_err(|e| IoError::new(ErrorKind::InvalidInput, format!("cannot serialize frame: {e}")))?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_BODY_LEN)
        .ok_or_else(|| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("frame body of {} bytes exceeds {MAX_BODY_LEN}", body.len()),
            )
        })?
        .to_le_bytes();

    let mut out = Vec::with_capacity(PREFIX_LEN + body.len());
    out.extend_from_slice(&len);
    out.extend_from_slice(&frame_crc(len, &body).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Write the journal file header.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FORMAT])
}

/// Check the journal file header.
///
/// # Errors
/// `InvalidData` for foreign files and formats this build cannot read.
pub fn check_header(reader: &mut impl Read) -> IoResult<()> {
    let mut header = [0u8; 5];
    reader.read_exact(&mut header)?;
    if header[..4] != MAGIC {
        return Err(invalid(format!("not a word-bank journal (magic {:?})", &header[..4])));
    }
    if header[4] != FORMAT {
        return Err(invalid(format!("unsupported journal format {}", header[4])));
    }
    Ok(())
}

/// Outcome of reading the next frame.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadFrame<T> {
    /// A complete frame with a valid checksum.
    Entry(T),
    /// The input ended partway through a frame.
    Torn,
    /// The input ended cleanly on a frame boundary.
    End,
}

/// Sequential frame reader that tracks the offset of the last complete frame.
pub struct FrameReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> FrameReader<R> {
    /// Read frames from `inner`, which is positioned at `offset`.
    pub const fn new(inner: R, offset: u64) -> Self {
        Self { inner, offset }
    }

    /// Offset just past the last complete frame.
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next frame.
    ///
    /// # Errors
    /// `InvalidData` on a checksum mismatch, an oversized length, or a body
    /// that is not valid JSON for `T`.
    pub fn next_frame<T: DeserializeOwned>(&mut self) -> IoResult<ReadFrame<T>> {
        let mut prefix = [0u8; PREFIX_LEN];
        match fill(&mut self.inner, &mut prefix)? {
            0 => return Ok(ReadFrame::End),
            n if n < PREFIX_LEN => return Ok(ReadFrame::Torn),
            _ => {}
        }

        let len = [prefix[0], prefix[1], prefix[2], prefix[3]];
        let stored = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
        let body_len = u32::from_le_bytes(len);
        if body_len > MAX_BODY_LEN {
            return Err(invalid(format!(
                "frame at offset {} claims {body_len} bytes",
                self.offset
            )));
        }

        let mut body = vec![0u8; body_len as usize];
        if fill(&mut self.inner, &mut body)? < body.len() {
            return Ok(ReadFrame::Torn);
        }
        if frame_crc(len, &body) != stored {
            return Err(invalid(format!("checksum mismatch in frame at offset {}", self.offset)));
        }

        let value = serde_json::from_slice(&body)
            .map_err(|e| invalid(format!("undecodable frame at offset {}: {e}", self.offset)))?;
        self.offset += PREFIX_LEN as u64 + u64::from(body_len);
        Ok(ReadFrame::Entry(value))
    }
}

/// Read until `buf` is full or the input ends; returns the bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> IoResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
