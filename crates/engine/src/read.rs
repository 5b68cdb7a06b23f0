//! Read path: point lookups.
//!
//! `get` consults the memtable ring first (freshest data, tombstones
//! included), then the record cache, then the SSTables in level-then-
//! recency order. The first source that knows the key answers; a tombstone
//! from any source means "not found". A CRC or Merkle failure surfaces as
//! an error — the read does **not** fall through to older tables, because
//! the key's true state is ambiguous until the corrupt table is repaired.

use anyhow::{bail, Result};
use record::Record;

use crate::Engine;

impl Engine {
    /// Looks up a key, returning its newest live value.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // 1. Memtable ring, newest table first.
        if let Some(rec) = self.manager.find(key) {
            return Self::interpret(rec);
        }

        // 2. Record cache. Tombstones are evicted on write, but a stale
        //    entry can still carry one after recovery; treat it as absent.
        if let Some(rec) = self.cache.get(key) {
            return Self::interpret(rec);
        }

        // 3. SSTables, newest data first. A hit warms the cache.
        if let Some(rec) = self.tables.get(key)? {
            self.cache.put(&rec);
            return Self::interpret(rec);
        }

        Ok(None)
    }

    /// Turns a record into the user-facing answer: tombstone means gone,
    /// a live record has its checksum verified one last time.
    fn interpret(rec: Record) -> Result<Option<Vec<u8>>> {
        if rec.is_tombstone() {
            return Ok(None);
        }
        if let Err(e) = rec.verify_crc() {
            bail!("data corruption reading key: {e}");
        }
        let (_, value) = rec.into_key_value();
        Ok(Some(value))
    }
}
