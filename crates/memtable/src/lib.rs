//! # Memtable — sorted in-memory staging
//!
//! Writes land here (after the WAL) and stay until the table is flushed to
//! an SSTable. Three interchangeable backends sit behind one capability
//! set, selected by configuration:
//!
//! * **B-tree** — `std::collections::BTreeMap`, keys kept sorted at all
//!   times.
//! * **Skip list** — `crossbeam_skiplist::SkipMap`, an ordered map with
//!   insert-or-replace semantics.
//! * **Hash map** — `HashMap` plus an insertion-order key vector; sorted
//!   views are produced by sorting the keys on demand.
//!
//! Capacity is measured in records. The table never refuses a `put`; it
//! reports fullness and lets the [`manager`](MemtableManager) rotate.

use crossbeam_skiplist::SkipMap;
use record::{Record, VecIterator};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

mod manager;

pub use manager::{MemtableManager, PutOutcome};

/// Which data structure backs a memtable. Parsed from the configuration
/// string (`btree` | `skiplist` | `hashmap`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    BTree,
    SkipList,
    HashMap,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "btree" => Some(Self::BTree),
            "skiplist" => Some(Self::SkipList),
            "hashmap" => Some(Self::HashMap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BTree => "btree",
            Self::SkipList => "skiplist",
            Self::HashMap => "hashmap",
        }
    }
}

enum Backend {
    BTree(BTreeMap<Vec<u8>, Record>),
    SkipList(SkipMap<Vec<u8>, Record>),
    HashMap {
        map: HashMap<Vec<u8>, Record>,
        /// Keys in first-insertion order; sorted lazily for ordered views.
        keys: Vec<Vec<u8>>,
    },
}

impl Backend {
    fn new(kind: BackendKind) -> Self {
        match kind {
            BackendKind::BTree => Self::BTree(BTreeMap::new()),
            BackendKind::SkipList => Self::SkipList(SkipMap::new()),
            BackendKind::HashMap => Self::HashMap {
                map: HashMap::new(),
                keys: Vec::new(),
            },
        }
    }
}

/// One sorted in-memory table of records.
pub struct Memtable {
    kind: BackendKind,
    backend: Backend,
    max_capacity: usize,
}

impl Memtable {
    pub fn new(kind: BackendKind, max_capacity: usize) -> Self {
        Self {
            kind,
            backend: Backend::new(kind),
            max_capacity,
        }
    }

    /// Inserts `rec`, replacing any existing record for the same key. The
    /// incoming record is always the newer one: writes reach a memtable in
    /// acknowledgement order.
    pub fn put(&mut self, rec: Record) {
        match &mut self.backend {
            Backend::BTree(map) => {
                map.insert(rec.key().to_vec(), rec);
            }
            Backend::SkipList(map) => {
                map.insert(rec.key().to_vec(), rec);
            }
            Backend::HashMap { map, keys } => {
                let key = rec.key().to_vec();
                if map.insert(key.clone(), rec).is_none() {
                    keys.push(key);
                }
            }
        }
    }

    /// Looks up the record for `key`, tombstones included.
    pub fn find(&self, key: &[u8]) -> Option<Record> {
        match &self.backend {
            Backend::BTree(map) => map.get(key).cloned(),
            Backend::SkipList(map) => map.get(key).map(|e| e.value().clone()),
            Backend::HashMap { map, .. } => map.get(key).cloned(),
        }
    }

    /// Number of records currently staged.
    pub fn len(&self) -> usize {
        match &self.backend {
            Backend::BTree(map) => map.len(),
            Backend::SkipList(map) => map.len(),
            Backend::HashMap { map, .. } => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the record count reached the configured capacity.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_capacity
    }

    /// Rebuilds the table empty, keeping kind and capacity.
    pub fn clear(&mut self) {
        self.backend = Backend::new(self.kind);
    }

    /// All records in ascending key order.
    pub fn sorted_records(&self) -> Vec<Record> {
        match &self.backend {
            Backend::BTree(map) => map.values().cloned().collect(),
            Backend::SkipList(map) => map.iter().map(|e| e.value().clone()).collect(),
            Backend::HashMap { map, keys } => {
                let mut sorted = keys.clone();
                sorted.sort();
                sorted.iter().map(|k| map[k].clone()).collect()
            }
        }
    }

    /// Drains the table: returns the sorted records and leaves it empty.
    pub fn take_sorted(&mut self) -> Vec<Record> {
        let records = self.sorted_records();
        self.clear();
        records
    }

    /// Records with `lo <= key <= hi`, ascending.
    pub fn range_records(&self, lo: &[u8], hi: &[u8]) -> Vec<Record> {
        let bounds = (Bound::Included(lo), Bound::Included(hi));
        match &self.backend {
            Backend::BTree(map) => map.range::<[u8], _>(bounds).map(|(_, r)| r.clone()).collect(),
            Backend::SkipList(map) => map
                .range::<[u8], _>(bounds)
                .map(|e| e.value().clone())
                .collect(),
            Backend::HashMap { map, keys } => {
                let mut sorted: Vec<&Vec<u8>> = keys
                    .iter()
                    .filter(|k| k.as_slice() >= lo && k.as_slice() <= hi)
                    .collect();
                sorted.sort();
                sorted.iter().map(|k| map[*k].clone()).collect()
            }
        }
    }

    /// Records whose key starts with `prefix`, ascending.
    pub fn prefix_records(&self, prefix: &[u8]) -> Vec<Record> {
        let from = (Bound::Included(prefix), Bound::Unbounded);
        match &self.backend {
            Backend::BTree(map) => map
                .range::<[u8], _>(from)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(_, r)| r.clone())
                .collect(),
            Backend::SkipList(map) => map
                .range::<[u8], _>(from)
                .take_while(|e| e.key().starts_with(prefix))
                .map(|e| e.value().clone())
                .collect(),
            Backend::HashMap { map, keys } => {
                let mut sorted: Vec<&Vec<u8>> =
                    keys.iter().filter(|k| k.starts_with(prefix)).collect();
                sorted.sort();
                sorted.iter().map(|k| map[*k].clone()).collect()
            }
        }
    }

    /// Iterator over a key range, for the scan merger.
    pub fn range_iter(&self, lo: &[u8], hi: &[u8]) -> VecIterator {
        VecIterator::new(self.range_records(lo, hi))
    }

    /// Iterator over a key prefix, for the scan merger.
    pub fn prefix_iter(&self, prefix: &[u8]) -> VecIterator {
        VecIterator::new(self.prefix_records(prefix))
    }
}

#[cfg(test)]
mod tests;
