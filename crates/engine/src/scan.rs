//! Range and prefix scans across every live source.
//!
//! A scan merges one iterator per memtable with one per published SSTable.
//! Each `next()` picks the smallest current key across the sources; equal
//! keys deduplicate to the copy with the largest timestamp (ties resolve
//! toward fresher sources), losers skip past the key, tombstones are
//! suppressed, and reserved system keys never surface. Paginated scans
//! drive the iterator `page × page_size` steps and keep the final page.

use anyhow::{anyhow, Result};
use record::{Record, RecordIterator};

use crate::{is_reserved_key, Engine};

/// K-way merge over record iterators, newest-wins.
///
/// Sources are ordered oldest to newest; when two sources sit on the same
/// key with the same timestamp, the later source wins.
pub struct MergeIterator {
    sources: Vec<Box<dyn RecordIterator>>,
}

impl MergeIterator {
    pub fn new(sources: Vec<Box<dyn RecordIterator>>) -> Self {
        Self { sources }
    }

    /// The next live, user-visible record in ascending key order, or
    /// `None` when every source is exhausted.
    pub fn next(&mut self) -> Result<Option<Record>> {
        loop {
            // Pick the smallest key; on equal keys the freshest copy.
            let mut best: Option<(usize, Vec<u8>, u64)> = None;
            for (i, source) in self.sources.iter().enumerate() {
                let Some(rec) = source.get() else { continue };
                let replace = match &best {
                    None => true,
                    Some((_, key, ts)) => match rec.key().cmp(key.as_slice()) {
                        std::cmp::Ordering::Less => true,
                        std::cmp::Ordering::Equal => rec.timestamp() >= *ts,
                        std::cmp::Ordering::Greater => false,
                    },
                };
                if replace {
                    best = Some((i, rec.key().to_vec(), rec.timestamp()));
                }
            }

            let Some((winner, key, _)) = best else {
                return Ok(None);
            };
            let rec = self.sources[winner]
                .get()
                .expect("winner is a valid source")
                .clone();

            // Move every source past the emitted key, duplicates included.
            for source in &mut self.sources {
                if source.get().is_some_and(|r| r.key() == key.as_slice()) {
                    source
                        .advance()
                        .map_err(|e| anyhow!("scan source failed: {e}"))?;
                }
            }

            if rec.is_tombstone() || is_reserved_key(rec.key()) {
                continue;
            }
            return Ok(Some(rec));
        }
    }
}

impl Engine {
    /// Merged iterator over `lo <= key <= hi`.
    pub fn range_iterate(&self, lo: &[u8], hi: &[u8]) -> Result<MergeIterator> {
        let mut sources: Vec<Box<dyn RecordIterator>> = Vec::new();
        for it in self.tables.range_iterators(lo, hi)? {
            sources.push(Box::new(it));
        }
        for it in self.manager.range_iterators(lo, hi) {
            sources.push(Box::new(it));
        }
        Ok(MergeIterator::new(sources))
    }

    /// Merged iterator over keys starting with `prefix`.
    pub fn prefix_iterate(&self, prefix: &[u8]) -> Result<MergeIterator> {
        let mut sources: Vec<Box<dyn RecordIterator>> = Vec::new();
        for it in self.tables.prefix_iterators(prefix)? {
            sources.push(Box::new(it));
        }
        for it in self.manager.prefix_iterators(prefix) {
            sources.push(Box::new(it));
        }
        Ok(MergeIterator::new(sources))
    }

    /// Page `page` (1-based) of the range scan, `page_size` records per
    /// page.
    pub fn range_scan(
        &self,
        lo: &[u8],
        hi: &[u8],
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Record>> {
        let iter = self.range_iterate(lo, hi)?;
        paginate(iter, page, page_size)
    }

    /// Page `page` (1-based) of the prefix scan.
    pub fn prefix_scan(&self, prefix: &[u8], page: usize, page_size: usize) -> Result<Vec<Record>> {
        let iter = self.prefix_iterate(prefix)?;
        paginate(iter, page, page_size)
    }
}

/// Walks `page × page_size` records and keeps the last `page_size`.
fn paginate(mut iter: MergeIterator, page: usize, page_size: usize) -> Result<Vec<Record>> {
    let page = page.max(1);
    let mut out = Vec::new();
    for i in 0..page * page_size {
        let Some(rec) = iter.next()? else { break };
        if i >= page_size * (page - 1) {
            out.push(rec);
        }
    }
    Ok(out)
}
