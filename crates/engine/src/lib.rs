//! # Engine - SiltKV Storage Engine
//!
//! The central orchestrator tying the [`wal`], [`memtable`], [`sstable`],
//! and [`cache`] crates into a complete LSM-tree key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                    ENGINE                       │
//! │                                                 │
//! │ write.rs → WAL append → memtable ring insert    │
//! │               |                                 │
//! │               |  (ring overflowed?)             │
//! │               v          yes                    │
//! │        flush oldest → new C1 SSTable            │
//! │               |                                 │
//! │               v                                 │
//! │        compact() → deeper levels                │
//! │               |                                 │
//! │               v                                 │
//! │        memwal head drop → WAL LWM truncation    │
//! │                                                 │
//! │ read.rs → memtables → cache → tables            │
//! │            (first match wins)                   │
//! │                                                 │
//! │ scan.rs → k-way merge of every source           │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module       | Purpose                                            |
//! |--------------|----------------------------------------------------|
//! | `lib.rs`     | `Engine` struct, constructor, accessors            |
//! | [`config`]   | JSON config loading, clamping, defaults            |
//! | [`memwal`]   | memtable ↔ WAL position index, low watermark       |
//! | `recovery`   | WAL replay through the ring on startup             |
//! | `write.rs`   | `put()` / `delete()` and the flush pipeline        |
//! | `read.rs`    | `get()` across memtables, cache, tables            |
//! | `scan.rs`    | range/prefix iterators and paginated scans         |
//!
//! ## Crash safety
//!
//! Every write is appended (and fsynced) to the WAL **before** the
//! memtable insert; that pair is the durability boundary. WAL segments are
//! deleted only after the memwal index proves every memtable that started
//! inside them has flushed. SSTables publish by writing their TOC last,
//! and unpublished directories are swept on startup.

mod config;
mod memwal;
mod read;
mod recovery;
mod scan;
mod write;

pub use config::Config;
pub use memwal::MemwalIndex;
pub use scan::MergeIterator;

use anyhow::{Context, Result};
use cache::RecordCache;
use memtable::MemtableManager;
use sstable::TableSet;
use std::path::{Path, PathBuf};
use tracing::info;
use wal::Wal;

/// Maximum allowed key size in bytes (64 KiB). Matches the codec's decode
/// cap so every accepted write stays decodable.
pub const MAX_KEY_SIZE: usize = record::MAX_KEY_BYTES;
/// Maximum allowed value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = record::MAX_VALUE_BYTES;

/// Key prefixes owned by the probabilistic-structure commands. The core
/// stores such keys like any other; scans skip them so user-facing results
/// only contain user data.
pub const RESERVED_PREFIXES: [&[u8]; 5] =
    [b"bf ", b"cms ", b"hll ", b"fingerprint ", b"tokenLog "];

/// `true` for keys owned by the reserved command namespace.
pub fn is_reserved_key(key: &[u8]) -> bool {
    RESERVED_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// The storage engine: one owning handle over a data-root directory.
///
/// # Write path
///
/// 1. Append the record to the WAL (fsync — the durability point).
/// 2. Insert into the active memtable; rotate the ring when it fills.
/// 3. On ring overflow, flush the oldest table to a level-1 SSTable, run
///    compaction, and truncate the WAL below the new low watermark.
/// 4. Update the record cache.
///
/// # Read path
///
/// 1. Memtables, newest to oldest (tombstones answer "not found").
/// 2. The record cache.
/// 3. SSTables, level then recency; hits populate the cache.
///
/// # Recovery
///
/// [`Engine::open`] reads the memwal index, rebuilds the (empty) ring, and
/// replays the WAL from the oldest live memtable's position.
pub struct Engine {
    root: PathBuf,
    config: Config,
    wal: Wal,
    manager: MemtableManager,
    tables: TableSet,
    cache: RecordCache,
    memwal: MemwalIndex,
}

impl Engine {
    /// Opens the engine rooted at `root`, loading `conf/config.json` from
    /// under it (the file is created with defaults when missing).
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = Config::load(&root.join("conf").join("config.json"))?;
        Self::with_config(root, config)
    }

    /// Opens the engine with an explicit configuration, bypassing the
    /// config file. The configuration is clamped first.
    pub fn with_config<P: AsRef<Path>>(root: P, mut config: Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        config.clamp();

        let data_dir = root.join("data");
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let wal = Wal::open(data_dir.join("wal"), config.wal_segment_size, true)?;
        let tables = TableSet::open(data_dir.join("sstable"), config.sst_config())?;
        let manager = MemtableManager::new(
            config.memtable_count,
            config.memtable_capacity,
            config.backend(),
        );
        let cache = RecordCache::new(config.cache_capacity);
        let memwal = MemwalIndex::load(&data_dir.join("memwal.csv"))?;

        let mut engine = Self {
            root,
            config,
            wal,
            manager,
            tables,
            cache,
            memwal,
        };

        let replayed = engine.recover()?;
        info!(
            root = %engine.root.display(),
            replayed,
            segments = engine.wal.segment_count(),
            "engine opened"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records currently staged across the memtable ring.
    pub fn memtable_records(&self) -> usize {
        self.manager.len()
    }

    /// Number of published SSTables at `level`.
    pub fn table_count_at(&self, level: u32) -> Result<usize> {
        self.tables.table_count_at(level)
    }

    /// All published SSTable names, sorted by (level, id).
    pub fn table_names(&self) -> Result<Vec<sstable::TableName>> {
        self.tables.table_names()
    }

    pub fn wal_segment_count(&self) -> usize {
        self.wal.segment_count()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("root", &self.root)
            .field("memtable_records", &self.manager.len())
            .field("wal_segments", &self.wal.segment_count())
            .field("memwal_entries", &self.memwal.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
