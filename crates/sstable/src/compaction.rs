//! LSM compaction: merging tables into deeper levels.
//!
//! Two policies share one k-way streaming merge:
//!
//! * **size-tiered** — when a level accumulates `tables_to_compress`
//!   tables, the oldest ones merge into a single table one level down.
//! * **leveled** — each level has a byte budget
//!   (`first_leveled_size × leveled_inc^(L-1)`); an over-budget level pushes
//!   its oldest table down, merging it with every next-level table whose
//!   key range overlaps.
//!
//! The merge keeps the newest copy of every key (largest timestamp, ties
//! to the newer input) and retains tombstones through the deepest level:
//! dropping them early would resurrect older values still sitting below.
//!
//! Inputs are deleted only after the output's TOC exists. A crash in
//! between leaves both visible — newest-wins reads stay correct — and the
//! orphan sweep plus the next pass clean up.

use crate::builder::TableBuilder;
use crate::layout::{self, TableName};
use crate::reader::Table;
use crate::{CompactionPolicy, TableSet};
use anyhow::{Context, Result};
use record::Record;
use std::path::PathBuf;
use tracing::info;

/// Sequential cursor over one input table's data region.
struct DataCursor {
    table: Table,
    pos: u64,
    end: u64,
    current: Option<Record>,
}

impl DataCursor {
    fn open(table: Table) -> Result<Self> {
        let end = table.data_len()?;
        let mut cursor = Self {
            table,
            pos: 0,
            end,
            current: None,
        };
        cursor.step()?;
        Ok(cursor)
    }

    fn step(&mut self) -> Result<()> {
        if self.pos >= self.end {
            self.current = None;
            return Ok(());
        }
        let (record, payload) = self.table.read_record_at(self.pos)?;
        self.pos += self.table.record_span(payload.len()) as u64;
        self.current = Some(record);
        Ok(())
    }
}

impl TableSet {
    /// Runs the configured compaction policy to fixpoint.
    pub fn compact(&mut self) -> Result<()> {
        self.sweep_orphans();
        match self.config.policy {
            CompactionPolicy::SizeTiered => self.compact_size_tiered(),
            CompactionPolicy::Leveled => self.compact_leveled(),
        }
    }

    fn compact_size_tiered(&mut self) -> Result<()> {
        'restart: loop {
            let levels = self.levels()?;
            for (level, tables) in &levels {
                if *level >= self.config.max_lsm_levels
                    || tables.len() < self.config.tables_to_compress
                {
                    continue;
                }

                let inputs: Vec<(TableName, PathBuf)> =
                    tables[..self.config.tables_to_compress].to_vec();
                let output = self.merge_tables(&inputs, level + 1)?;
                self.delete_inputs(&inputs)?;
                info!(
                    level,
                    inputs = inputs.len(),
                    output = %output,
                    "size-tiered compaction"
                );
                continue 'restart;
            }
            return Ok(());
        }
    }

    fn compact_leveled(&mut self) -> Result<()> {
        'restart: loop {
            let levels = self.levels()?;
            let deepest = levels.keys().copied().max().unwrap_or(0);

            for (level, tables) in &levels {
                if *level >= self.config.max_lsm_levels {
                    break;
                }

                let mut level_size = 0u64;
                for (_, dir) in tables {
                    level_size += layout::dir_size(dir)?;
                }
                if level_size <= self.leveled_target(*level) {
                    continue;
                }

                let oldest = tables[0].clone();
                let mut inputs = vec![oldest.clone()];

                if *level < deepest {
                    // Pull in every next-level table overlapping the
                    // oldest table's key span.
                    let (low, high) = Table::open(&oldest.1, self.config.summary_factor)?
                        .key_range()?;
                    if let Some(below) = levels.get(&(level + 1)) {
                        for entry in below {
                            let (b_low, b_high) =
                                Table::open(&entry.1, self.config.summary_factor)?.key_range()?;
                            if !(low > b_high || high < b_low) {
                                inputs.push(entry.clone());
                            }
                        }
                    }
                }

                let output = self.merge_tables(&inputs, level + 1)?;
                self.delete_inputs(&inputs)?;
                info!(
                    level,
                    inputs = inputs.len(),
                    output = %output,
                    "leveled compaction"
                );
                continue 'restart;
            }
            return Ok(());
        }
    }

    fn leveled_target(&self, level: u32) -> u64 {
        self.config.first_leveled_size * self.config.leveled_inc.pow(level.saturating_sub(1))
    }

    /// K-way merge of `inputs` (oldest first) into a fresh table at
    /// `target_level`. Returns the published output name.
    fn merge_tables(
        &mut self,
        inputs: &[(TableName, PathBuf)],
        target_level: u32,
    ) -> Result<TableName> {
        let mut cursors = Vec::with_capacity(inputs.len());
        for (name, dir) in inputs {
            let table = Table::open(dir, self.config.summary_factor)
                .with_context(|| format!("opening compaction input {name}"))?;
            cursors.push(DataCursor::open(table)?);
        }

        let mut builder = TableBuilder::new(
            self.config.summary_factor,
            self.config.shape(),
            self.config.compression,
            self.config.fp_rate,
        );

        loop {
            // Smallest key across the live cursors.
            let min_key: Option<Vec<u8>> = cursors
                .iter()
                .filter_map(|c| c.current.as_ref().map(|r| r.key().to_vec()))
                .min();
            let Some(min_key) = min_key else { break };

            // Among the holders of that key, the winner has the largest
            // timestamp; on a tie the later cursor wins — inputs arrive
            // oldest first, so later means fresher.
            let mut winner: Option<&Record> = None;
            for cursor in &cursors {
                if let Some(rec) = cursor.current.as_ref() {
                    if rec.key() == min_key.as_slice()
                        && winner.map_or(true, |w| rec.timestamp() >= w.timestamp())
                    {
                        winner = Some(rec);
                    }
                }
            }
            builder.add(winner.expect("at least one holder of min_key"));

            // Advance every cursor sitting on the emitted key.
            for cursor in &mut cursors {
                if cursor
                    .current
                    .as_ref()
                    .is_some_and(|r| r.key() == min_key.as_slice())
                {
                    cursor.step()?;
                }
            }
        }

        let name = TableName::new(target_level, self.take_next_id());
        builder.finish(&self.root.join(name.dir_name()))?;
        Ok(name)
    }

    fn delete_inputs(&self, inputs: &[(TableName, PathBuf)]) -> Result<()> {
        for (name, dir) in inputs {
            std::fs::remove_dir_all(dir)
                .with_context(|| format!("removing compacted input {name}"))?;
        }
        Ok(())
    }
}
