//! Ordered scans within one SSTable.
//!
//! A [`TableIterator`] walks the table's index — loaded whole at
//! construction, it is the smallest region that orders every record — and
//! pulls qualifying records out of the data region one `advance` at a
//! time. Range iterators consult the summary first: a table whose key span
//! misses the requested range finishes before reading anything else.

use crate::reader::Table;
use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use record::{Record, RecordIterator};
use std::io;

enum ScanBounds {
    Range { low: Vec<u8>, high: Vec<u8> },
    Prefix(Vec<u8>),
}

/// Cursor over one table's records inside a key range or prefix.
pub struct TableIterator {
    table: Table,
    index: Vec<u8>,
    pos: usize,
    bounds: ScanBounds,
    current: Option<Record>,
    /// Prefix mode: a match has been seen, so the first non-match ends the
    /// scan (index keys are sorted, the prefix block is contiguous).
    matched: bool,
    finished: bool,
}

impl TableIterator {
    /// Builds a range iterator over `[low, high]`, both inclusive.
    pub fn new_range(table: Table, low: &[u8], high: &[u8]) -> Result<Self> {
        let (table_low, table_high) = table.key_range()?;
        let disjoint = high < table_low.as_slice() || low > table_high.as_slice();

        let mut it = Self {
            index: if disjoint { Vec::new() } else { table.index_bytes()? },
            table,
            pos: 0,
            bounds: ScanBounds::Range {
                low: low.to_vec(),
                high: high.to_vec(),
            },
            current: None,
            matched: false,
            finished: disjoint,
        };
        it.step()?;
        Ok(it)
    }

    /// Builds a prefix iterator.
    pub fn new_prefix(table: Table, prefix: &[u8]) -> Result<Self> {
        let mut it = Self {
            index: table.index_bytes()?,
            table,
            pos: 0,
            bounds: ScanBounds::Prefix(prefix.to_vec()),
            current: None,
            matched: false,
            finished: false,
        };
        it.step()?;
        Ok(it)
    }

    fn step(&mut self) -> Result<()> {
        if self.finished {
            self.current = None;
            return Ok(());
        }

        while self.pos < self.index.len() {
            let (key, offset) = self.next_index_entry()?;

            let qualifies = match &self.bounds {
                ScanBounds::Range { low, high } => {
                    if key.as_slice() > high.as_slice() {
                        break;
                    }
                    key.as_slice() >= low.as_slice()
                }
                ScanBounds::Prefix(prefix) => {
                    let hit = key.starts_with(prefix);
                    if !hit && self.matched {
                        break;
                    }
                    hit
                }
            };

            if qualifies {
                self.matched = true;
                let (record, _) = self.table.read_record_at(offset)?;
                self.current = Some(record);
                return Ok(());
            }
        }

        self.finished = true;
        self.current = None;
        Ok(())
    }

    fn next_index_entry(&mut self) -> Result<(Vec<u8>, u64)> {
        let mut rd = &self.index[self.pos..];
        let key_len = rd.read_u64::<LittleEndian>()? as usize;
        let key = rd[..key_len].to_vec();
        rd = &rd[key_len..];
        let offset = rd.read_u64::<LittleEndian>()?;
        self.pos += 16 + key_len;
        Ok((key, offset))
    }
}

impl RecordIterator for TableIterator {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn get(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    fn advance(&mut self) -> io::Result<()> {
        self.step()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}
