//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage for the SiltKV engine.
//!
//! When the memtable ring overflows, the engine flushes the oldest table
//! here as a level-1 SSTable. Tables are *write-once, read-many* — once
//! published they are never modified, only replaced by compaction.
//!
//! ## Directory layout
//!
//! ```text
//! data/sstable/
//! ├── C1_SST_4/               level 1, id 4 (ids monotonic across levels)
//! │   ├── SST_Data.db         records in key order
//! │   ├── SST_Index.db        key_len | key | data_offset, per record
//! │   ├── SST_Summary.db      low/high keys + every Nth index entry
//! │   ├── SST_Filter.db       serialized bloom filter over all keys
//! │   ├── SST_Merkle.db       serialized merkle validator over records
//! │   └── TOC.csv             written last — the publication point
//! └── C2_SST_7/
//!     ├── SST.db              single-file shape: 40-byte offset header,
//!     │                       then the same five regions back to back
//!     └── TOC.csv
//! ```
//!
//! With compression enabled a table also carries `SST_Dictionary.json`,
//! and its data region stores varint records with dictionary key ids.
//!
//! ## Lookup path
//!
//! Filter → Summary → Index → Data, newest tables first (level ascending,
//! id descending). Every record read for a point lookup is validated
//! against its CRC and the table's Merkle tree; a mismatch surfaces as a
//! corruption error rather than falling through to older tables.

mod builder;
mod compaction;
mod dict;
mod iterator;
mod layout;
mod reader;

pub use builder::TableBuilder;
pub use dict::KeyDictionary;
pub use iterator::TableIterator;
pub use layout::{Shape, TableName};
pub use reader::Table;

use anyhow::{Context, Result};
use record::Record;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which compaction policy the set runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionPolicy {
    SizeTiered,
    Leveled,
}

impl CompactionPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "size-tiered" => Some(Self::SizeTiered),
            "leveled" => Some(Self::Leveled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SizeTiered => "size-tiered",
            Self::Leveled => "leveled",
        }
    }
}

/// Tuning for table writing and compaction.
#[derive(Debug, Clone)]
pub struct SstConfig {
    /// Every Nth index entry is sampled into the summary.
    pub summary_factor: usize,
    /// Write one `SST.db` instead of five region files.
    pub single_file: bool,
    /// Dictionary-compress data regions.
    pub compression: bool,
    /// Bloom filter false-positive rate.
    pub fp_rate: f64,
    pub policy: CompactionPolicy,
    /// Levels at or above this never compact further.
    pub max_lsm_levels: u32,
    /// Size-tiered: tables per level that trigger a merge.
    pub tables_to_compress: usize,
    /// Leveled: byte budget of level 1.
    pub first_leveled_size: u64,
    /// Leveled: budget multiplier per level.
    pub leveled_inc: u64,
}

impl SstConfig {
    fn shape(&self) -> Shape {
        if self.single_file {
            Shape::SingleFile
        } else {
            Shape::MultiFile
        }
    }
}

impl Default for SstConfig {
    fn default() -> Self {
        Self {
            summary_factor: 5,
            single_file: false,
            compression: false,
            fp_rate: 0.1,
            policy: CompactionPolicy::SizeTiered,
            max_lsm_levels: 4,
            tables_to_compress: 8,
            first_leveled_size: 1 << 20,
            leveled_inc: 10,
        }
    }
}

/// The on-disk table tree under `data/sstable/`.
///
/// Owns the directory namespace and the monotonic id counter; every flush
/// and compaction output draws its id here, so directory names sort by
/// age within a level.
pub struct TableSet {
    root: PathBuf,
    config: SstConfig,
    next_id: u64,
}

impl TableSet {
    /// Opens the table tree, creating the root directory and sweeping any
    /// unpublished leftovers from an interrupted flush or compaction.
    pub fn open<P: AsRef<Path>>(root: P, config: SstConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("creating sstable root {}", root.display()))?;

        let mut set = Self {
            root,
            config,
            next_id: 1,
        };
        set.sweep_orphans();

        let max_id = layout::list_tables(&set.root)?
            .iter()
            .map(|(name, _)| name.id)
            .max()
            .unwrap_or(0);
        set.next_id = max_id + 1;
        Ok(set)
    }

    pub fn config(&self) -> &SstConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes sorted memtable records as a fresh level-1 table.
    pub fn flush(&mut self, records: &[Record]) -> Result<TableName> {
        let name = TableName::new(1, self.take_next_id());
        TableBuilder::write_table(
            &self.root,
            name,
            records,
            self.config.summary_factor,
            self.config.shape(),
            self.config.compression,
            self.config.fp_rate,
        )?;
        debug!(table = %name, records = records.len(), "memtable flushed");
        Ok(name)
    }

    /// Point lookup across every published table, newest data first:
    /// level ascending, id descending within a level. The first table that
    /// holds the key answers — tombstones included. Corruption errors
    /// propagate; the key is ambiguous until the operator repairs the
    /// table, so older levels are *not* consulted.
    pub fn get(&self, key: &[u8]) -> Result<Option<Record>> {
        for (_, dir) in self.tables_newest_first()? {
            let table = Table::open(&dir, self.config.summary_factor)?;
            if let Some(rec) = table.get(key)? {
                return Ok(Some(rec));
            }
        }
        Ok(None)
    }

    /// Number of published tables at `level`.
    pub fn table_count_at(&self, level: u32) -> Result<usize> {
        Ok(self
            .levels()?
            .get(&level)
            .map(|tables| tables.len())
            .unwrap_or(0))
    }

    /// All published table names, sorted by (level, id).
    pub fn table_names(&self) -> Result<Vec<TableName>> {
        Ok(layout::list_tables(&self.root)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// One range iterator per published table, oldest data first (level
    /// descending, id ascending) so downstream tie-breaks favor fresher
    /// sources.
    pub fn range_iterators(&self, low: &[u8], high: &[u8]) -> Result<Vec<TableIterator>> {
        let mut iters = Vec::new();
        for (_, dir) in self.tables_oldest_first()? {
            let table = Table::open(&dir, self.config.summary_factor)?;
            iters.push(TableIterator::new_range(table, low, high)?);
        }
        Ok(iters)
    }

    /// One prefix iterator per published table, oldest data first.
    pub fn prefix_iterators(&self, prefix: &[u8]) -> Result<Vec<TableIterator>> {
        let mut iters = Vec::new();
        for (_, dir) in self.tables_oldest_first()? {
            let table = Table::open(&dir, self.config.summary_factor)?;
            iters.push(TableIterator::new_prefix(table, prefix)?);
        }
        Ok(iters)
    }

    /// Removes table directories that never got a TOC — leftovers of a
    /// crash between region writes and publication.
    pub fn sweep_orphans(&self) {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.is_dir() && TableName::parse(name).is_some() && !layout::is_published(&path) {
                warn!(dir = %path.display(), "sweeping unpublished sstable");
                let _ = std::fs::remove_dir_all(&path);
            }
        }
    }

    /// Published tables grouped by level, ids ascending (oldest first).
    pub(crate) fn levels(&self) -> Result<BTreeMap<u32, Vec<(TableName, PathBuf)>>> {
        let mut levels: BTreeMap<u32, Vec<(TableName, PathBuf)>> = BTreeMap::new();
        for (name, path) in layout::list_tables(&self.root)? {
            levels.entry(name.level).or_default().push((name, path));
        }
        Ok(levels)
    }

    fn tables_newest_first(&self) -> Result<Vec<(TableName, PathBuf)>> {
        let mut tables = layout::list_tables(&self.root)?;
        tables.sort_by(|(a, _), (b, _)| a.level.cmp(&b.level).then(b.id.cmp(&a.id)));
        Ok(tables)
    }

    fn tables_oldest_first(&self) -> Result<Vec<(TableName, PathBuf)>> {
        let mut tables = layout::list_tables(&self.root)?;
        tables.sort_by(|(a, _), (b, _)| b.level.cmp(&a.level).then(a.id.cmp(&b.id)));
        Ok(tables)
    }

    pub(crate) fn take_next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl std::fmt::Debug for TableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSet")
            .field("root", &self.root)
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests;
