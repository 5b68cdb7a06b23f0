//! Point lookups against one SSTable directory.
//!
//! The lookup narrows in four steps — Filter, Summary, Index, Data — so a
//! miss usually costs one small region read, and a hit seeks directly to
//! its record. Every record that leaves the data region is checked against
//! its CRC and the table's Merkle validator; a mismatch is corruption, not
//! a miss, and the error carries that distinction to the caller.

use crate::dict::KeyDictionary;
use crate::layout::{self, Region, RegionHandle, Shape, TableName};
use anyhow::{bail, Context, Result};
use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt};
use merkle::MerkleTree;
use record::{size_from_header, Record, HEADER_LEN};
use std::io::Read;
use std::path::{Path, PathBuf};

/// One published SSTable directory, opened for reading.
pub struct Table {
    dir: PathBuf,
    name: TableName,
    shape: Shape,
    summary_factor: usize,
    /// Present iff the data region is dictionary-compressed.
    dict: Option<KeyDictionary>,
}

impl Table {
    /// Opens a published table directory.
    ///
    /// The physical shape comes from the TOC and compression from the
    /// presence of a key dictionary, so a table stays readable even after
    /// the configuration that wrote it changes.
    pub fn open(dir: &Path, summary_factor: usize) -> Result<Self> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(TableName::parse)
            .with_context(|| format!("not an sstable directory: {}", dir.display()))?;
        let shape = layout::read_toc(dir)?;
        let dict = if KeyDictionary::exists(dir) {
            Some(KeyDictionary::load(dir)?)
        } else {
            None
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            name,
            shape,
            summary_factor: summary_factor.max(1),
            dict,
        })
    }

    pub fn name(&self) -> TableName {
        self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Low and high keys from the summary header.
    pub fn key_range(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut summary = self.open_region(Region::Summary)?;
        summary.seek_to(0)?;
        let low = read_length_prefixed(&mut summary.file)?;
        let high = read_length_prefixed(&mut summary.file)?;
        Ok((low, high))
    }

    /// Point lookup. Returns the record (tombstones included) or `None`
    /// when this table does not hold the key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Record>> {
        if !self.filter_may_contain(key)? {
            return Ok(None);
        }

        let Some(index_offset) = self.summary_block_for(key)? else {
            return Ok(None);
        };

        let Some(data_offset) = self.index_lookup(key, index_offset)? else {
            return Ok(None);
        };

        let (record, payload) = self.read_record_at(data_offset)?;
        self.verify(&record, &payload, data_offset)?;
        Ok(Some(record))
    }

    fn filter_may_contain(&self, key: &[u8]) -> Result<bool> {
        let bytes = self.open_region(Region::Filter)?.read_all()?;
        let filter = BloomFilter::from_bytes(&bytes)
            .with_context(|| format!("filter region of {}", self.name))?;
        Ok(filter.contains(key))
    }

    /// Walks the summary: rejects keys outside `[low, high]`, otherwise
    /// returns the index offset of the block that may hold `key` (the last
    /// sampled entry with `entry.key <= key`).
    fn summary_block_for(&self, key: &[u8]) -> Result<Option<u64>> {
        let mut summary = self.open_region(Region::Summary)?;
        summary.seek_to(0)?;

        let low = read_length_prefixed(&mut summary.file)?;
        let high = read_length_prefixed(&mut summary.file)?;
        if key < low.as_slice() || key > high.as_slice() {
            return Ok(None);
        }

        let len = summary.len();
        let mut block_offset = 0u64;
        while summary.position()? < len {
            let entry_key = read_length_prefixed(&mut summary.file)?;
            let offset = summary.file.read_u64::<LittleEndian>()?;
            if entry_key.as_slice() > key {
                break;
            }
            block_offset = offset;
        }
        Ok(Some(block_offset))
    }

    /// Scans at most `summary_factor` index entries from `index_offset`
    /// looking for an exact key match.
    fn index_lookup(&self, key: &[u8], index_offset: u64) -> Result<Option<u64>> {
        let mut index = self.open_region(Region::Index)?;
        index.seek_to(index_offset)?;
        let len = index.len();

        for _ in 0..self.summary_factor {
            if index.position()? >= len {
                break;
            }
            let entry_key = read_length_prefixed(&mut index.file)?;
            let offset = index.file.read_u64::<LittleEndian>()?;
            if entry_key.as_slice() > key {
                return Ok(None);
            }
            if entry_key.as_slice() == key {
                return Ok(Some(offset));
            }
        }
        Ok(None)
    }

    /// Reads the record starting at `offset` in the data region.
    ///
    /// Returns the decoded record plus the payload bytes the Merkle tree
    /// hashed (for compressed records this excludes the length prefix).
    ///
    /// Declared lengths are untrusted: anything that does not fit inside
    /// the data region is corruption, reported before a byte of it is
    /// allocated.
    pub(crate) fn read_record_at(&self, offset: u64) -> Result<(Record, Vec<u8>)> {
        let mut data = self.open_region(Region::Data)?;
        if offset >= data.len() {
            bail!(
                "data corruption in {}: record offset {} past region end {}",
                self.name,
                offset,
                data.len()
            );
        }
        data.seek_to(offset)?;
        let remaining = data.len() - offset;

        match &self.dict {
            Some(dict) => {
                let (body_len, prefix_len) = read_uvarint_from(&mut data.file)?;
                if body_len > remaining.saturating_sub(prefix_len as u64) {
                    bail!(
                        "data corruption in {} at offset {}: record length {} exceeds region",
                        self.name,
                        offset,
                        body_len
                    );
                }
                let mut payload = vec![0u8; body_len as usize];
                data.file.read_exact(&mut payload)?;
                let record = Record::decode_compressed(&payload, |id| dict.key_for(id))
                    .with_context(|| format!("decoding record in {}", self.name))?;
                Ok((record, payload))
            }
            None => {
                let mut header = [0u8; HEADER_LEN];
                data.file.read_exact(&mut header)?;
                let total = size_from_header(&header)
                    .with_context(|| format!("decoding record in {}", self.name))?;
                if total as u64 > remaining {
                    bail!(
                        "data corruption in {} at offset {}: record length {} exceeds region",
                        self.name,
                        offset,
                        total
                    );
                }
                let mut payload = header.to_vec();
                payload.resize(total, 0);
                data.file.read_exact(&mut payload[HEADER_LEN..])?;
                let record = Record::decode(&payload)
                    .with_context(|| format!("decoding record in {}", self.name))?;
                Ok((record, payload))
            }
        }
    }

    /// Bytes consumed by the record at `offset`, including any length
    /// prefix — how far a sequential cursor advances.
    pub(crate) fn record_span(&self, payload_len: usize) -> usize {
        match &self.dict {
            Some(_) => {
                let mut prefix = Vec::new();
                record::write_uvarint(&mut prefix, payload_len as u64);
                prefix.len() + payload_len
            }
            None => payload_len,
        }
    }

    /// Length of the data region, for sequential compaction cursors.
    pub(crate) fn data_len(&self) -> Result<u64> {
        Ok(self.open_region(Region::Data)?.len())
    }

    /// The whole index region, for iterators.
    pub(crate) fn index_bytes(&self) -> Result<Vec<u8>> {
        self.open_region(Region::Index)?.read_all()
    }

    pub(crate) fn open_region(&self, region: Region) -> Result<RegionHandle> {
        layout::open_region(&self.dir, self.shape, region)
    }

    /// CRC plus Merkle validation of a decoded record.
    pub(crate) fn verify(&self, record: &Record, payload: &[u8], offset: u64) -> Result<()> {
        if record.verify_crc().is_err() {
            bail!(
                "data corruption in {} at offset {}: crc mismatch",
                self.name,
                offset
            );
        }

        let merkle_bytes = self.open_region(Region::Merkle)?.read_all()?;
        let tree = MerkleTree::from_bytes(&merkle_bytes)
            .with_context(|| format!("merkle region of {}", self.name))?;
        if !tree.verify(payload) {
            bail!(
                "data corruption in {} at offset {}: merkle mismatch",
                self.name,
                offset
            );
        }
        Ok(())
    }
}

/// Reads `len:u64 | bytes` from the current position.
fn read_length_prefixed(file: &mut std::fs::File) -> Result<Vec<u8>> {
    let len = file.read_u64::<LittleEndian>()? as usize;
    if len > 1 << 20 {
        bail!("corrupt key length {}", len);
    }
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads one LEB128 varint byte-by-byte from the current position.
pub(crate) fn read_uvarint_from(file: &mut std::fs::File) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for i in 0..10 {
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte)?;
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    bail!("malformed varint in data region");
}
