//! # WAL — Write-Ahead Log
//!
//! Provides crash-safe durability for the SiltKV storage engine.
//!
//! Every mutation (`PUT` or `DELETE`) is serialized as a [`Record`] and
//! appended here **before** the corresponding memtable update. On restart
//! the log is replayed to rebuild the memtable ring, guaranteeing that no
//! acknowledged write is lost.
//!
//! ## Segments
//!
//! The log is a directory of fixed-size files, `wal_1.log, wal_2.log, …`,
//! always numbered contiguously from 1. Every segment begins with an 8-byte
//! little-endian *spill header*: the number of bytes immediately after it
//! that belong to a record whose first half lives in the previous segment
//! (0 when there is no carry-over).
//!
//! ```text
//! [spill_len: u64 LE][records ...]
//! ```
//!
//! A record that does not fit in the tail segment is split: the bytes that
//! fit finish the current segment, and a fresh segment is created whose
//! spill header holds the remainder length, followed by the remainder. The
//! remainder is written whole even when it exceeds the nominal segment
//! size; the next append rotates past such an oversized segment first.
//!
//! ## Truncation
//!
//! Once a memtable is flushed to an SSTable, the segments that fed it are
//! dead weight. [`Wal::delete_lwm`] removes the first `k` segments and
//! renames the survivors so the `wal_1..` naming invariant holds.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use record::{size_from_header, CodecError, Record, HEADER_LEN, MAX_ENCODED_LEN};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Byte length of the per-segment spill header.
pub const SEGMENT_HEADER_LEN: u64 = 8;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A replayed record failed CRC validation or could not be decoded.
    #[error("corrupt wal record")]
    Corrupt,

    /// A truncation request would delete the tail segment.
    #[error("invalid low watermark {lwm} for {segments} segments")]
    BadWatermark { lwm: usize, segments: usize },
}

impl From<CodecError> for WalError {
    fn from(_: CodecError) -> Self {
        WalError::Corrupt
    }
}

/// A position inside the log: 0-based segment index plus byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalPosition {
    pub segment: usize,
    pub offset: u64,
}

/// The segmented write-ahead log.
///
/// Holds the ordered segment list and a replay cursor. Appends open the
/// tail segment per call; no file handle outlives an operation, so segment
/// deletion and renaming never race an open descriptor.
pub struct Wal {
    dir: PathBuf,
    segment_size: u64,
    sync: bool,
    segments: Vec<PathBuf>,
    replay_segment: usize,
    replay_offset: u64,
}

impl Wal {
    /// Opens (or creates) the log in `dir`.
    ///
    /// * `segment_size` — nominal byte size of one segment file, header
    ///   included.
    /// * `sync` — if true, every append ends with `sync_all` (fsync).
    pub fn open<P: AsRef<Path>>(dir: P, segment_size: u64, sync: bool) -> Result<Self, WalError> {
        let dir = dir.as_ref().to_path_buf();
        // A segment must at least hold its own header plus one byte.
        let segment_size = segment_size.max(2 * SEGMENT_HEADER_LEN);
        std::fs::create_dir_all(&dir)?;

        let mut indexed: Vec<(usize, PathBuf)> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|p| segment_index(&p).map(|i| (i, p)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        let mut segments: Vec<PathBuf> = indexed.into_iter().map(|(_, p)| p).collect();

        if segments.is_empty() {
            let first = dir.join("wal_1.log");
            write_segment_header(&first, 0)?;
            segments.push(first);
        }

        Ok(Self {
            dir,
            segment_size,
            sync,
            segments,
            replay_segment: 0,
            replay_offset: SEGMENT_HEADER_LEN,
        })
    }

    /// Nominal segment size in bytes.
    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_paths(&self) -> &[PathBuf] {
        &self.segments
    }

    /// The position at which the next appended record will begin.
    pub fn tail_position(&self) -> Result<WalPosition, WalError> {
        let segment = self.segments.len() - 1;
        let offset = file_len(&self.segments[segment])?;
        Ok(WalPosition { segment, offset })
    }

    /// Serializes `rec` and appends it to the log, splitting across a fresh
    /// segment when the tail cannot hold it. Returns the position where the
    /// *next* record will begin.
    pub fn append(&mut self, rec: &Record) -> Result<WalPosition, WalError> {
        let bytes = rec.encode();
        self.append_bytes(&bytes)?;
        self.tail_position()
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), WalError> {
        loop {
            let tail = self.segments.last().expect("segment list never empty");
            let len = file_len(tail)?;

            // An earlier spill may have left the tail oversized.
            if len >= self.segment_size {
                self.create_segment(0)?;
                continue;
            }

            if len + bytes.len() as u64 <= self.segment_size {
                return self.write_tail(bytes);
            }

            // Split: fill the current segment, carry the rest over.
            let fit = (self.segment_size - len) as usize;
            self.write_tail(&bytes[..fit])?;
            self.create_segment((bytes.len() - fit) as u64)?;
            return self.write_tail(&bytes[fit..]);
        }
    }

    fn write_tail(&self, bytes: &[u8]) -> Result<(), WalError> {
        let tail = self.segments.last().expect("segment list never empty");
        let mut file = OpenOptions::new().append(true).open(tail)?;
        file.write_all(bytes)?;
        file.flush()?;
        if self.sync {
            file.sync_all()?;
        }
        Ok(())
    }

    fn create_segment(&mut self, spill_len: u64) -> Result<(), WalError> {
        let path = self.dir.join(format!("wal_{}.log", self.segments.len() + 1));
        write_segment_header(&path, spill_len)?;
        self.segments.push(path);
        Ok(())
    }

    /// Positions the replay cursor. Offsets below the spill header are
    /// clamped onto the first record boundary.
    pub fn seek(&mut self, segment: usize, offset: u64) {
        self.replay_segment = segment.min(self.segments.len().saturating_sub(1));
        self.replay_offset = offset.max(SEGMENT_HEADER_LEN);
    }

    /// The current replay cursor.
    pub fn replay_position(&self) -> WalPosition {
        WalPosition {
            segment: self.replay_segment,
            offset: self.replay_offset,
        }
    }

    /// Reads the next record at the replay cursor, reassembling spillovers
    /// through the following segment's spill header.
    ///
    /// Returns `Ok(None)` at end-of-log. A fragment at the tail with no
    /// continuation segment is also a clean end: the write it belonged to
    /// was never acknowledged. A CRC or decode failure is fatal.
    pub fn restore_next(&mut self) -> Result<Option<Record>, WalError> {
        loop {
            let seg_path = &self.segments[self.replay_segment];
            let len = file_len(seg_path)?;

            if self.replay_offset >= len {
                if self.replay_segment + 1 < self.segments.len() {
                    self.replay_segment += 1;
                    self.replay_offset = SEGMENT_HEADER_LEN;
                    continue;
                }
                return Ok(None);
            }

            let avail = (len - self.replay_offset) as usize;
            let mut file = File::open(seg_path)?;
            file.seek(SeekFrom::Start(self.replay_offset))?;

            if avail >= HEADER_LEN {
                let mut header = [0u8; HEADER_LEN];
                file.read_exact(&mut header)?;
                let total = size_from_header(&header)?;
                if total <= avail {
                    // Whole record lives in this segment.
                    let mut body = vec![0u8; total - HEADER_LEN];
                    file.read_exact(&mut body)?;
                    let mut bytes = header.to_vec();
                    bytes.extend_from_slice(&body);
                    self.replay_offset += total as u64;
                    return Ok(Some(decode_verified(&bytes)?));
                }
                file.seek(SeekFrom::Start(self.replay_offset))?;
            }

            // The record straddles into the next segment.
            let mut fragment = vec![0u8; avail];
            file.read_exact(&mut fragment)?;

            if self.replay_segment + 1 >= self.segments.len() {
                // Torn tail from an unacknowledged write.
                return Ok(None);
            }

            let next_path = &self.segments[self.replay_segment + 1];
            let mut next = File::open(next_path)?;
            let spill_len = match next.read_u64::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(WalError::Corrupt)
                }
                Err(e) => return Err(WalError::Io(e)),
            };
            // The spill is the tail of one record; reject absurd sizes
            // before allocating.
            if spill_len > MAX_ENCODED_LEN as u64 {
                return Err(WalError::Corrupt);
            }

            let mut spill = vec![0u8; spill_len as usize];
            match next.read_exact(&mut spill) {
                Ok(()) => {}
                Err(e)
                    if e.kind() == std::io::ErrorKind::UnexpectedEof
                        && self.replay_segment + 2 >= self.segments.len() =>
                {
                    // Crash landed between the two halves of the write.
                    return Ok(None);
                }
                Err(e) => return Err(WalError::Io(e)),
            }

            fragment.extend_from_slice(&spill);
            self.replay_segment += 1;
            self.replay_offset = SEGMENT_HEADER_LEN + spill_len;
            return Ok(Some(decode_verified(&fragment)?));
        }
    }

    /// Removes the first `lwm` segments and renames the survivors back to
    /// `wal_1.log, wal_2.log, …`.
    ///
    /// Callers invoke this only once the memwal index proves that no
    /// unflushed memtable still starts inside the removed segments.
    pub fn delete_lwm(&mut self, lwm: usize) -> Result<(), WalError> {
        if lwm == 0 {
            return Ok(());
        }
        if lwm >= self.segments.len() {
            return Err(WalError::BadWatermark {
                lwm,
                segments: self.segments.len(),
            });
        }

        for path in self.segments.drain(..lwm) {
            std::fs::remove_file(&path)?;
        }

        let dir = self.dir.clone();
        for (i, path) in self.segments.iter_mut().enumerate() {
            let renamed = dir.join(format!("wal_{}.log", i + 1));
            if *path != renamed {
                std::fs::rename(&*path, &renamed)?;
                *path = renamed;
            }
        }

        self.replay_segment = self.replay_segment.saturating_sub(lwm);
        debug!(removed = lwm, remaining = self.segments.len(), "wal truncated");
        Ok(())
    }
}

/// Parses the 1-based index out of a `wal_{i}.log` file name.
pub fn segment_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix("wal_")?.strip_suffix(".log")?;
    rest.parse().ok()
}

fn decode_verified(bytes: &[u8]) -> Result<Record, WalError> {
    let rec = Record::decode(bytes)?;
    if rec.verify_crc().is_err() {
        return Err(WalError::Corrupt);
    }
    Ok(rec)
}

fn write_segment_header(path: &Path, spill_len: u64) -> Result<(), WalError> {
    let mut file = File::create(path)?;
    file.write_u64::<LittleEndian>(spill_len)?;
    file.sync_all()?;
    Ok(())
}

fn file_len(path: &Path) -> Result<u64, WalError> {
    Ok(std::fs::metadata(path)?.len())
}
