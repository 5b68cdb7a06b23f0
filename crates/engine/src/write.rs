//! Write path: `put()`, `delete()`, and the flush pipeline.
//!
//! All mutations flow through [`Engine::commit`]. Each write is appended
//! to the WAL first; only after the append succeeds does the record touch
//! the memtable ring, so an I/O failure aborts the operation with no
//! in-memory residue. A ring overflow drains the oldest memtable into a
//! new level-1 SSTable, runs compaction, and truncates the WAL to the new
//! low watermark — all synchronously, before the triggering call returns.

use anyhow::{ensure, Result};
use record::Record;
use tracing::debug;

use crate::{Engine, MAX_KEY_SIZE, MAX_VALUE_SIZE};

impl Engine {
    /// Inserts or updates a key.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");
        ensure!(
            key.len() <= MAX_KEY_SIZE,
            "key too large: {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        );
        ensure!(
            value.len() <= MAX_VALUE_SIZE,
            "value too large: {} bytes (max {})",
            value.len(),
            MAX_VALUE_SIZE
        );

        self.commit(Record::new(key, value))
    }

    /// Deletes a key by writing a tombstone. The tombstone shadows every
    /// older copy of the key down through the SSTable levels.
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        ensure!(!key.is_empty(), "key must not be empty");
        ensure!(
            key.len() <= MAX_KEY_SIZE,
            "key too large: {} bytes (max {})",
            key.len(),
            MAX_KEY_SIZE
        );

        self.commit(Record::tombstone(key))
    }

    fn commit(&mut self, rec: Record) -> Result<()> {
        // The very first write seeds the memwal index with the position
        // the first memtable starts at.
        if self.memwal.is_empty() {
            let pos = self.wal.tail_position()?;
            let segment = self.wal.segment_paths()[pos.segment].clone();
            self.memwal.push(&segment, pos.offset)?;
        }

        // Durability point. Failure here leaves the engine untouched.
        let pos = self.wal.append(&rec)?;

        let outcome = self.manager.put(rec.clone());

        if outcome.rotated {
            // The ring advanced: the new active memtable starts at the
            // position right after the record that filled the old one.
            let segment = self.wal.segment_paths()[pos.segment].clone();
            self.memwal.push(&segment, pos.offset)?;

            if let Some(records) = outcome.flushed {
                self.flush_records(&records)?;
            }
        }

        self.cache.put(&rec);
        Ok(())
    }

    /// Persists a drained memtable and reclaims the WAL behind it.
    fn flush_records(&mut self, records: &[Record]) -> Result<()> {
        let name = self.tables.flush(records)?;
        debug!(table = %name, records = records.len(), "flush complete");

        self.tables.compact()?;

        // Everything before the next-oldest memtable's segment is dead.
        let lwm = self.memwal.low_watermark();
        if lwm > 0 {
            self.wal.delete_lwm(lwm)?;
        }
        self.memwal.pop_front_and_shift(lwm)?;
        Ok(())
    }
}
