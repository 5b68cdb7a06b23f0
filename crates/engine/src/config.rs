//! Engine configuration.
//!
//! Loaded from `conf/config.json`. A missing file is replaced with the
//! defaults; a malformed file falls back to the defaults; out-of-range
//! values are clamped field by field rather than rejected, so a hand-edited
//! config can never keep the engine from starting.

use anyhow::{Context, Result};
use memtable::BackendKind;
use serde::{Deserialize, Serialize};
use sstable::{CompactionPolicy, SstConfig};
use std::path::Path;
use tracing::warn;

/// All tunables, one flat struct mirroring the JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nominal byte size of one WAL segment file.
    pub wal_segment_size: u64,
    /// Records per memtable before it seals.
    pub memtable_capacity: usize,
    /// Tables in the memtable ring (2–10).
    pub memtable_count: usize,
    /// `btree` | `skiplist` | `hashmap`.
    pub memtable_structure: String,
    /// Record cache capacity (entries).
    pub cache_capacity: usize,
    /// Every Nth index entry is sampled into the SSTable summary.
    pub summary_factor: usize,
    /// Write each SSTable as one `SST.db` instead of five region files.
    pub single_file_sst: bool,
    /// Dictionary-compress SSTable data regions.
    pub compression: bool,
    /// `size-tiered` | `leveled`.
    pub compaction_policy: String,
    pub max_lsm_levels: u32,
    /// Size-tiered: tables per level that trigger a merge.
    pub tables_to_compress: usize,
    /// Leveled: byte budget of level 1.
    pub first_leveled_size: u64,
    /// Leveled: budget multiplier per deeper level.
    pub leveled_inc: u64,
    /// Bloom filter false-positive rate.
    pub filter_fp_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal_segment_size: 1 << 20,
            memtable_capacity: 1000,
            memtable_count: 3,
            memtable_structure: "btree".to_string(),
            cache_capacity: 128,
            summary_factor: 5,
            single_file_sst: false,
            compression: false,
            compaction_policy: "size-tiered".to_string(),
            max_lsm_levels: 4,
            tables_to_compress: 8,
            first_leveled_size: 1 << 20,
            leveled_inc: 10,
            filter_fp_rate: 0.1,
        }
    }
}

impl Config {
    /// Loads the configuration from `path`, writing the defaults back when
    /// the file is missing or unreadable, then clamps every field.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "malformed config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.clamp();
        config.save(path)?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config dir {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self).context("encoding config")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Forces every field into its valid range, falling back to the
    /// default for that field.
    pub fn clamp(&mut self) {
        let defaults = Self::default();

        if self.wal_segment_size < 200 {
            self.wal_segment_size = defaults.wal_segment_size;
        }
        if self.memtable_capacity < 5 {
            self.memtable_capacity = defaults.memtable_capacity;
        }
        if !(2..=10).contains(&self.memtable_count) {
            self.memtable_count = defaults.memtable_count;
        }
        if BackendKind::parse(&self.memtable_structure).is_none() {
            self.memtable_structure = defaults.memtable_structure;
        }
        if self.cache_capacity < 1 {
            self.cache_capacity = defaults.cache_capacity;
        }
        if self.summary_factor < 2 {
            self.summary_factor = defaults.summary_factor;
        }
        if CompactionPolicy::parse(&self.compaction_policy).is_none() {
            self.compaction_policy = defaults.compaction_policy;
        }
        if !(2..=50).contains(&self.max_lsm_levels) {
            self.max_lsm_levels = defaults.max_lsm_levels;
        }
        if !(2..=15).contains(&self.tables_to_compress) {
            self.tables_to_compress = defaults.tables_to_compress;
        }
        if self.first_leveled_size < 512 {
            self.first_leveled_size = defaults.first_leveled_size;
        }
        if self.leveled_inc < 2 {
            self.leveled_inc = defaults.leveled_inc;
        }
        if !(0.01..=0.5).contains(&self.filter_fp_rate) {
            self.filter_fp_rate = defaults.filter_fp_rate;
        }
    }

    pub fn backend(&self) -> BackendKind {
        BackendKind::parse(&self.memtable_structure).unwrap_or(BackendKind::BTree)
    }

    pub fn policy(&self) -> CompactionPolicy {
        CompactionPolicy::parse(&self.compaction_policy).unwrap_or(CompactionPolicy::SizeTiered)
    }

    pub fn sst_config(&self) -> SstConfig {
        SstConfig {
            summary_factor: self.summary_factor,
            single_file: self.single_file_sst,
            compression: self.compression,
            fp_rate: self.filter_fp_rate,
            policy: self.policy(),
            max_lsm_levels: self.max_lsm_levels,
            tables_to_compress: self.tables_to_compress,
            first_leveled_size: self.first_leveled_size,
            leveled_inc: self.leveled_inc,
        }
    }
}
