//! The memtable ring.
//!
//! `N` tables (2–10) take writes in rotation. One is *active*; the rest
//! hold sealed data awaiting flush. When the active table fills, the
//! pointer advances. Once the pointer has wrapped the ring one full time,
//! every further rotation lands on the oldest sealed table, whose contents
//! are drained for flushing before it becomes the new active table.

use crate::{BackendKind, Memtable};
use record::{Record, VecIterator};

/// What a [`MemtableManager::put`] did beyond inserting the record.
pub struct PutOutcome {
    /// The active table filled and the ring advanced.
    pub rotated: bool,
    /// The ring wrapped while already full: these are the sorted records of
    /// the evicted oldest table, which the caller must persist as a new
    /// SSTable. The table itself has already been cleared.
    pub flushed: Option<Vec<Record>>,
}

/// Ring of memtables with an active pointer.
pub struct MemtableManager {
    tables: Vec<Memtable>,
    active: usize,
    /// Set the first time the active pointer wraps back to slot 0.
    ring_filled: bool,
}

impl MemtableManager {
    /// Builds a ring of `count` tables, each holding up to `capacity`
    /// records in a `kind` backend.
    pub fn new(count: usize, capacity: usize, kind: BackendKind) -> Self {
        let tables = (0..count).map(|_| Memtable::new(kind, capacity)).collect();
        Self {
            tables,
            active: 0,
            ring_filled: false,
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Total records staged across the ring.
    pub fn len(&self) -> usize {
        self.tables.iter().map(Memtable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(Memtable::is_empty)
    }

    /// Inserts into the active table, rotating (and draining the oldest
    /// table) as the ring demands.
    pub fn put(&mut self, rec: Record) -> PutOutcome {
        self.tables[self.active].put(rec);

        if !self.tables[self.active].is_full() {
            return PutOutcome {
                rotated: false,
                flushed: None,
            };
        }

        self.active = (self.active + 1) % self.tables.len();
        if self.active == 0 {
            self.ring_filled = true;
        }

        // After the first full lap the slot we just rotated onto still
        // holds the oldest sealed data; it must flush before reuse.
        let flushed = if self.ring_filled && !self.tables[self.active].is_empty() {
            Some(self.tables[self.active].take_sorted())
        } else {
            None
        };

        PutOutcome {
            rotated: true,
            flushed,
        }
    }

    /// Finds `key` in the freshest table that holds it, newest to oldest.
    /// Tombstones are returned as-is; the caller interprets them.
    pub fn find(&self, key: &[u8]) -> Option<Record> {
        let n = self.tables.len();
        for back in 0..n {
            let idx = (self.active + n - back) % n;
            if let Some(rec) = self.tables[idx].find(key) {
                return Some(rec);
            }
        }
        None
    }

    /// One range iterator per table, ordered oldest to newest so that
    /// downstream tie-breaks favor fresher data.
    pub fn range_iterators(&self, lo: &[u8], hi: &[u8]) -> Vec<VecIterator> {
        self.ring_oldest_first()
            .map(|idx| self.tables[idx].range_iter(lo, hi))
            .collect()
    }

    /// One prefix iterator per table, oldest to newest.
    pub fn prefix_iterators(&self, prefix: &[u8]) -> Vec<VecIterator> {
        self.ring_oldest_first()
            .map(|idx| self.tables[idx].prefix_iter(prefix))
            .collect()
    }

    fn ring_oldest_first(&self) -> impl Iterator<Item = usize> + '_ {
        let n = self.tables.len();
        let active = self.active;
        (1..=n).map(move |step| (active + step) % n)
    }
}

impl std::fmt::Debug for MemtableManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemtableManager")
            .field("tables", &self.tables.len())
            .field("active", &self.active)
            .field("ring_filled", &self.ring_filled)
            .field("records", &self.len())
            .finish()
    }
}
