//! # Bloom Filter
//!
//! A space-efficient probabilistic membership test. The filter can say with
//! certainty that a key is **not** present (no false negatives) but may
//! occasionally claim presence for a key that was never added.
//!
//! Each SSTable stores one filter built over all of its keys; point lookups
//! consult it before touching the summary, index, or data regions, so a
//! negative answer skips the table with a single small read.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1000, 0.01);
//! bf.add(b"hello");
//! assert!(bf.contains(b"hello"));
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

/// Errors produced while deserializing a filter.
#[derive(Debug, Error)]
pub enum BloomError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The serialized form declared impossible sizes.
    #[error("corrupt bloom filter")]
    Corrupt,
}

/// Upper bound on a deserialized slot array (guards against corrupt sizes).
const MAX_SLOT_BYTES: u64 = 128 * 1024 * 1024;

/// A Bloom filter with `k` seeded hash functions over a byte-per-slot array.
///
/// The slot array spends a full byte per bit, matching the serialized
/// layout the rest of the engine expects.
///
/// Hashing is MD5 over `seed ‖ key`, taking the first eight digest bytes as
/// a little-endian `u64` modulo the slot count. Seeds are fixed at
/// construction and preserved by serialization, so a filter read back from
/// disk answers exactly as the one that was written.
pub struct BloomFilter {
    expected: u64,
    seeds: Vec<[u8; 16]>,
    slots: Vec<u8>,
}

impl BloomFilter {
    /// Creates a filter sized for `expected` elements at the given target
    /// false-positive probability.
    ///
    /// Slot count `m = ⌈-n·ln p / (ln 2)²⌉`, hash count `k = ⌈(m/n)·ln 2⌉`,
    /// both clamped to at least one.
    pub fn new(expected: usize, fp_rate: f64) -> Self {
        let n = expected.max(1) as f64;
        let p = fp_rate.clamp(1e-9, 0.999);

        let m = (-n * p.ln() / std::f64::consts::LN_2.powi(2)).ceil() as u64;
        let m = m.max(1);
        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u64;
        let k = k.max(1);

        Self {
            expected: expected as u64,
            seeds: (0..k).map(seed_for).collect(),
            slots: vec![0u8; m as usize],
        }
    }

    /// Marks `key` as present.
    pub fn add(&mut self, key: &[u8]) {
        let len = self.slots.len() as u64;
        for i in 0..self.seeds.len() {
            let slot = (self.position(i, key) % len) as usize;
            self.slots[slot] = 1;
        }
    }

    /// Returns `false` if `key` was definitely never added, `true` if it
    /// *might* have been.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        let len = self.slots.len() as u64;
        (0..self.seeds.len()).all(|i| self.slots[(self.position(i, key) % len) as usize] == 1)
    }

    /// Number of hash functions.
    #[must_use]
    pub fn hash_count(&self) -> usize {
        self.seeds.len()
    }

    /// Number of slots in the filter.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Serializes the filter.
    ///
    /// Wire format (all little-endian):
    /// ```text
    /// [el_num: u64][hash_num: u64][size: u64]
    /// [per hash: seed_len: u64, seed bytes]
    /// [slots: size bytes]
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24 + self.seeds.len() * 24 + self.slots.len());
        buf.write_u64::<LittleEndian>(self.expected).unwrap();
        buf.write_u64::<LittleEndian>(self.seeds.len() as u64).unwrap();
        buf.write_u64::<LittleEndian>(self.slots.len() as u64).unwrap();
        for seed in &self.seeds {
            buf.write_u64::<LittleEndian>(seed.len() as u64).unwrap();
            buf.extend_from_slice(seed);
        }
        buf.extend_from_slice(&self.slots);
        buf
    }

    /// Deserializes a filter previously written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BloomError> {
        let mut rd = bytes;
        let expected = rd.read_u64::<LittleEndian>()?;
        let hash_num = rd.read_u64::<LittleEndian>()?;
        let size = rd.read_u64::<LittleEndian>()?;

        if size == 0 || size > MAX_SLOT_BYTES || hash_num == 0 || hash_num > 64 {
            return Err(BloomError::Corrupt);
        }

        let mut seeds = Vec::with_capacity(hash_num as usize);
        for _ in 0..hash_num {
            let seed_len = rd.read_u64::<LittleEndian>()?;
            if seed_len != 16 {
                return Err(BloomError::Corrupt);
            }
            let mut seed = [0u8; 16];
            std::io::Read::read_exact(&mut rd, &mut seed)?;
            seeds.push(seed);
        }

        let mut slots = vec![0u8; size as usize];
        std::io::Read::read_exact(&mut rd, &mut slots)?;

        Ok(Self {
            expected,
            seeds,
            slots,
        })
    }

    fn position(&self, hash_index: usize, key: &[u8]) -> u64 {
        let mut input = Vec::with_capacity(16 + key.len());
        input.extend_from_slice(&self.seeds[hash_index]);
        input.extend_from_slice(key);
        let digest = md5::compute(&input);
        u64::from_le_bytes(digest.0[..8].try_into().unwrap())
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("expected", &self.expected)
            .field("hashes", &self.seeds.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// Derives the seed for hash function `i`: the MD5 digest of the index.
fn seed_for(i: u64) -> [u8; 16] {
    md5::compute(i.to_le_bytes()).0
}
