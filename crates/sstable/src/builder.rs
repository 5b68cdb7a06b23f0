//! Building one SSTable from a sorted record stream.
//!
//! Both the memtable flush and the compaction merge feed records through a
//! [`TableBuilder`]: `add` them in ascending key order, then `finish` into
//! a target directory. The builder accumulates the regions in memory —
//! tables are bounded by the memtable capacity or a compaction input set,
//! so the buffers stay modest — and publishes the TOC only after every
//! region (and the key dictionary, when compressing) has hit disk.

use crate::dict::KeyDictionary;
use crate::layout::{self, Region, Shape, TableName, SINGLE_HEADER_LEN};
use anyhow::{bail, Context, Result};
use bloom::BloomFilter;
use byteorder::{LittleEndian, WriteBytesExt};
use merkle::MerkleTree;
use record::{write_uvarint, Record};
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// Serializes one index entry: `key_len:u64 | key | offset:u64`.
pub(crate) fn index_entry(key: &[u8], offset: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + key.len());
    buf.write_u64::<LittleEndian>(key.len() as u64).unwrap();
    buf.extend_from_slice(key);
    buf.write_u64::<LittleEndian>(offset).unwrap();
    buf
}

/// Accumulates records and writes the finished table.
pub struct TableBuilder {
    summary_factor: usize,
    shape: Shape,
    fp_rate: f64,
    dict: Option<KeyDictionary>,
    data: Vec<u8>,
    /// Key and data-region offset of every record, in add order.
    entries: Vec<(Vec<u8>, u64)>,
    /// Byte range of each record's Merkle-hashed payload within `data`
    /// (excludes the varint length prefix of compressed records).
    payloads: Vec<Range<usize>>,
}

impl TableBuilder {
    pub fn new(summary_factor: usize, shape: Shape, compression: bool, fp_rate: f64) -> Self {
        Self {
            summary_factor: summary_factor.max(1),
            shape,
            fp_rate,
            dict: compression.then(KeyDictionary::new),
            data: Vec::new(),
            entries: Vec::new(),
            payloads: Vec::new(),
        }
    }

    /// Appends a record. Callers feed records in ascending key order.
    pub fn add(&mut self, rec: &Record) {
        let offset = self.data.len() as u64;

        match &mut self.dict {
            Some(dict) => {
                let id = dict.id_for(rec.key());
                let body = rec.encode_compressed(id);
                write_uvarint(&mut self.data, body.len() as u64);
                let start = self.data.len();
                self.data.extend_from_slice(&body);
                self.payloads.push(start..self.data.len());
            }
            None => {
                let start = self.data.len();
                self.data.extend_from_slice(&rec.encode());
                self.payloads.push(start..self.data.len());
            }
        }

        self.entries.push((rec.key().to_vec(), offset));
    }

    pub fn record_count(&self) -> usize {
        self.entries.len()
    }

    /// Writes every region into `dir` and publishes the TOC.
    pub fn finish(self, dir: &Path) -> Result<()> {
        if self.entries.is_empty() {
            bail!("refusing to write an empty sstable");
        }

        // INDEX: one entry per record, offsets into DATA.
        let mut index = Vec::new();
        for (key, offset) in &self.entries {
            index.extend_from_slice(&index_entry(key, *offset));
        }

        // SUMMARY: low/high header, then every summary_factor-th index
        // entry with its offset into INDEX.
        let low = &self.entries[0].0;
        let high = &self.entries[self.entries.len() - 1].0;
        let mut summary = Vec::new();
        summary.write_u64::<LittleEndian>(low.len() as u64).unwrap();
        summary.extend_from_slice(low);
        summary.write_u64::<LittleEndian>(high.len() as u64).unwrap();
        summary.extend_from_slice(high);

        let mut index_offset = 0u64;
        for (i, (key, _)) in self.entries.iter().enumerate() {
            if i % self.summary_factor == 0 {
                summary.extend_from_slice(&index_entry(key, index_offset));
            }
            index_offset += 16 + key.len() as u64;
        }

        // FILTER: sized by the exact record count.
        let mut filter = BloomFilter::new(self.entries.len(), self.fp_rate);
        for (key, _) in &self.entries {
            filter.add(key);
        }
        let filter_bytes = filter.to_bytes();

        // MERKLE: leaves are the serialized record payloads, in write order.
        let blocks: Vec<&[u8]> = self.payloads.iter().map(|r| &self.data[r.clone()]).collect();
        let merkle_bytes = MerkleTree::build(&blocks).to_bytes();

        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating table dir {}", dir.display()))?;

        match self.shape {
            Shape::MultiFile => {
                write_file(dir, Region::Data.file_name(), &self.data)?;
                write_file(dir, Region::Index.file_name(), &index)?;
                write_file(dir, Region::Summary.file_name(), &summary)?;
                write_file(dir, Region::Filter.file_name(), &filter_bytes)?;
                write_file(dir, Region::Merkle.file_name(), &merkle_bytes)?;
            }
            Shape::SingleFile => {
                let mut header = Vec::with_capacity(SINGLE_HEADER_LEN as usize);
                let mut offset = SINGLE_HEADER_LEN;
                for region in [&self.data, &index, &summary, &filter_bytes, &merkle_bytes] {
                    header.write_u64::<LittleEndian>(offset).unwrap();
                    offset += region.len() as u64;
                }

                let mut body =
                    Vec::with_capacity(SINGLE_HEADER_LEN as usize + offset as usize);
                body.extend_from_slice(&header);
                for region in [&self.data, &index, &summary, &filter_bytes, &merkle_bytes] {
                    body.extend_from_slice(region);
                }
                write_file(dir, layout::SINGLE_NAME, &body)?;
            }
        }

        if let Some(dict) = &self.dict {
            dict.save(dir)?;
        }

        // Publication point: the TOC goes last, so a crash before this line
        // leaves an orphan directory that the sweep removes.
        layout::write_toc(dir, self.shape)?;
        debug!(dir = %dir.display(), records = self.entries.len(), "sstable published");
        Ok(())
    }

    /// Convenience: builds a whole table from sorted records.
    pub fn write_table(
        dir: &Path,
        name: TableName,
        records: &[Record],
        summary_factor: usize,
        shape: Shape,
        compression: bool,
        fp_rate: f64,
    ) -> Result<()> {
        let mut builder = Self::new(summary_factor, shape, compression, fp_rate);
        for rec in records {
            builder.add(rec);
        }
        builder.finish(&dir.join(name.dir_name()))
    }
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
