//! # Record — the atomic unit of the SiltKV engine
//!
//! A [`Record`] is what flows through every layer: it is appended to the WAL,
//! staged in memtables, laid out in SSTable data regions, and held by the
//! read cache. Deletions are records too — a *tombstone* marks a key as
//! removed so that older copies in deeper SSTables stay shadowed.
//!
//! ## Binary Record Format (full form)
//!
//! ```text
//! [crc: u32 LE][timestamp: u64 LE][tombstone: u8][key_len: u64 LE][val_len: u64 LE][key][value]
//! ```
//!
//! The CRC32 (IEEE) covers the **value bytes only**. Tombstones keep
//! `val_len = 0` and omit the trailing value bytes entirely.
//!
//! A second, varint-based form exists for dictionary-compressed SSTable data
//! regions; see [`Record::encode_compressed`].

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

mod iter;
mod varint;

pub use iter::{RecordIterator, VecIterator};
pub use varint::{read_uvarint, write_uvarint};

/// Byte length of the fixed record header (crc + timestamp + tombstone +
/// key_len + val_len).
pub const HEADER_LEN: usize = 4 + 8 + 1 + 8 + 8;

/// Maximum key size accepted when decoding (64 KiB). Prevents OOM on
/// corrupt headers.
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size accepted when decoding (10 MiB). Prevents OOM on
/// corrupt headers.
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;
/// Largest possible full-form encoding of an accepted record.
pub const MAX_ENCODED_LEN: usize = HEADER_LEN + MAX_KEY_BYTES + MAX_VALUE_BYTES;

/// Errors produced while encoding or decoding records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The buffer ended before the full record (or header) was read.
    #[error("short buffer: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },

    /// A varint field was malformed or did not terminate.
    #[error("malformed varint")]
    BadVarint,

    /// A header declared sizes no valid record can have.
    #[error("corrupt record header: key_len {key_len}, val_len {val_len}")]
    CorruptHeader { key_len: u64, val_len: u64 },

    /// The stored CRC does not match the checksum of the value bytes.
    #[error("crc mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch { stored: u32, computed: u32 },
}

/// A single key-value entry with checksum, timestamp, and tombstone flag.
///
/// Keys and values are opaque byte strings; keys are ordered
/// lexicographically and must be non-empty (enforced by the engine, not
/// here — the codec is total over well-formed byte input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    crc: u32,
    timestamp: u64,
    tombstone: bool,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Record {
    /// Creates a live record stamped with the current wall-clock second.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        let crc = crc_of(&value);
        Self {
            crc,
            timestamp: now_secs(),
            tombstone: false,
            key,
            value,
        }
    }

    /// Creates a tombstone for `key`, stamped with the current second.
    pub fn tombstone(key: Vec<u8>) -> Self {
        Self {
            crc: crc_of(&[]),
            timestamp: now_secs(),
            tombstone: true,
            key,
            value: Vec::new(),
        }
    }

    /// Rebuilds a record from raw parts (used by decoders and tests).
    pub fn from_parts(
        crc: u32,
        timestamp: u64,
        tombstone: bool,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> Self {
        Self {
            crc,
            timestamp,
            tombstone,
            key,
            value,
        }
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_tombstone(&self) -> bool {
        self.tombstone
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consumes the record, returning its key and value buffers.
    pub fn into_key_value(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.value)
    }

    /// Total encoded length of the full form.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.key.len() + if self.tombstone { 0 } else { self.value.len() }
    }

    /// Serializes the record in the full (fixed-header) form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.write_u32::<LittleEndian>(self.crc).unwrap();
        buf.write_u64::<LittleEndian>(self.timestamp).unwrap();
        buf.write_u8(self.tombstone as u8).unwrap();
        buf.write_u64::<LittleEndian>(self.key.len() as u64).unwrap();
        let val_len = if self.tombstone { 0 } else { self.value.len() };
        buf.write_u64::<LittleEndian>(val_len as u64).unwrap();
        buf.extend_from_slice(&self.key);
        if !self.tombstone {
            buf.extend_from_slice(&self.value);
        }
        buf
    }

    /// Decodes a record from the full form. The slice may be longer than the
    /// record; trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let total = size_from_header(bytes)?;
        if bytes.len() < total {
            return Err(CodecError::ShortBuffer {
                need: total,
                have: bytes.len(),
            });
        }

        let mut rd = bytes;
        let crc = rd.read_u32::<LittleEndian>().unwrap();
        let timestamp = rd.read_u64::<LittleEndian>().unwrap();
        let tombstone = rd.read_u8().unwrap() == 1;
        let key_len = rd.read_u64::<LittleEndian>().unwrap() as usize;
        let val_len = rd.read_u64::<LittleEndian>().unwrap() as usize;

        let key = rd[..key_len].to_vec();
        let value = rd[key_len..key_len + val_len].to_vec();

        Ok(Self {
            crc,
            timestamp,
            tombstone,
            key,
            value,
        })
    }

    /// Checks the stored CRC against the checksum of the value bytes.
    pub fn verify_crc(&self) -> Result<(), CodecError> {
        let computed = crc_of(&self.value);
        if computed != self.crc {
            return Err(CodecError::CrcMismatch {
                stored: self.crc,
                computed,
            });
        }
        Ok(())
    }

    /// Serializes the record in the compressed (varint) form used inside
    /// dictionary-compressed SSTable data regions. The key is replaced by
    /// `key_id`, an index into the table's key dictionary. Tombstones omit
    /// the value length and value bytes entirely.
    ///
    /// Layout: `crc | ts | tomb:u8 | key_id | [val_len | value]`, all
    /// integers uvarint. The caller prepends the length prefix.
    pub fn encode_compressed(&self, key_id: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.value.len());
        write_uvarint(&mut buf, self.crc as u64);
        write_uvarint(&mut buf, self.timestamp);
        buf.push(self.tombstone as u8);
        write_uvarint(&mut buf, key_id);
        if !self.tombstone {
            write_uvarint(&mut buf, self.value.len() as u64);
            buf.extend_from_slice(&self.value);
        }
        buf
    }

    /// Decodes a compressed record body (without its length prefix).
    /// `resolve` maps a dictionary id back to the key bytes.
    pub fn decode_compressed<F>(bytes: &[u8], resolve: F) -> Result<Self, CodecError>
    where
        F: FnOnce(u64) -> Option<Vec<u8>>,
    {
        let mut pos = 0usize;
        let (crc, n) = read_uvarint(&bytes[pos..]).ok_or(CodecError::BadVarint)?;
        pos += n;
        let (timestamp, n) = read_uvarint(&bytes[pos..]).ok_or(CodecError::BadVarint)?;
        pos += n;
        let tombstone = *bytes.get(pos).ok_or(CodecError::ShortBuffer {
            need: pos + 1,
            have: bytes.len(),
        })? == 1;
        pos += 1;
        let (key_id, n) = read_uvarint(&bytes[pos..]).ok_or(CodecError::BadVarint)?;
        pos += n;

        let key = resolve(key_id).ok_or(CodecError::BadVarint)?;

        if tombstone {
            return Ok(Self {
                crc: crc as u32,
                timestamp,
                tombstone,
                key,
                value: Vec::new(),
            });
        }

        let (val_len, n) = read_uvarint(&bytes[pos..]).ok_or(CodecError::BadVarint)?;
        pos += n;
        if val_len > MAX_VALUE_BYTES as u64 {
            return Err(CodecError::CorruptHeader {
                key_len: key.len() as u64,
                val_len,
            });
        }
        let val_len = val_len as usize;
        if bytes.len() < pos + val_len {
            return Err(CodecError::ShortBuffer {
                need: pos + val_len,
                have: bytes.len(),
            });
        }
        let value = bytes[pos..pos + val_len].to_vec();

        Ok(Self {
            crc: crc as u32,
            timestamp,
            tombstone,
            key,
            value,
        })
    }
}

/// Computes the CRC32 (IEEE) checksum of a value byte slice.
pub fn crc_of(value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(value);
    hasher.finalize()
}

/// Returns the total encoded length of a full-form record given at least
/// its fixed header.
///
/// Rejects absurd sizes as corruption: the lengths are untrusted input,
/// and an unchecked sum would overflow or drive an unbounded allocation.
pub fn size_from_header(header: &[u8]) -> Result<usize, CodecError> {
    if header.len() < HEADER_LEN {
        return Err(CodecError::ShortBuffer {
            need: HEADER_LEN,
            have: header.len(),
        });
    }
    let key_len = u64::from_le_bytes(header[13..21].try_into().unwrap());
    let val_len = u64::from_le_bytes(header[21..29].try_into().unwrap());
    if key_len > MAX_KEY_BYTES as u64 || val_len > MAX_VALUE_BYTES as u64 {
        return Err(CodecError::CorruptHeader { key_len, val_len });
    }
    Ok(HEADER_LEN + key_len as usize + val_len as usize)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
