//! The memwal index: which WAL position each memtable started at.
//!
//! `data/memwal.csv` holds one `segment_path,offset` line per active
//! memtable, oldest first. Entry *i* is the position at which memtable *i*
//! began accepting writes, so after the oldest memtable flushes, every
//! segment strictly before the *second* entry's segment is dead and the
//! WAL can truncate to that low watermark. Truncation renames the
//! surviving segments back to `wal_1..`, so the remaining lines shift
//! their segment numbers down by the watermark.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// An ordered list of (segment path, byte offset) pairs backed by a CSV
/// file that is rewritten atomically on every mutation.
pub struct MemwalIndex {
    path: PathBuf,
    entries: Vec<(PathBuf, u64)>,
}

impl MemwalIndex {
    /// Loads the index, starting empty when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        if let Ok(content) = std::fs::read_to_string(path) {
            for (lineno, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let Some((segment, offset)) = line.rsplit_once(',') else {
                    bail!("memwal line {}: expected 'segment,offset'", lineno + 1);
                };
                let offset: u64 = offset
                    .parse()
                    .with_context(|| format!("memwal line {}: bad offset", lineno + 1))?;
                entries.push((PathBuf::from(segment), offset));
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The oldest live memtable's starting position.
    pub fn first(&self) -> Option<(&Path, u64)> {
        self.entries.first().map(|(p, o)| (p.as_path(), *o))
    }

    /// Appends an entry for a memtable that just started taking writes.
    pub fn push(&mut self, segment: &Path, offset: u64) -> Result<()> {
        self.entries.push((segment.to_path_buf(), offset));
        self.save()
    }

    /// Number of WAL segments safe to delete once the oldest memtable has
    /// flushed: everything before the second entry's segment.
    pub fn low_watermark(&self) -> usize {
        self.entries
            .get(1)
            .and_then(|(path, _)| wal::segment_index(path))
            .map(|index| index - 1)
            .unwrap_or(0)
    }

    /// Drops the flushed memtable's entry and shifts the remaining
    /// segment numbers down by `lwm`, mirroring the WAL's rename pass.
    pub fn pop_front_and_shift(&mut self, lwm: usize) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        self.entries.remove(0);

        if lwm > 0 {
            for (path, _) in &mut self.entries {
                let Some(index) = wal::segment_index(path) else {
                    bail!("memwal entry is not a wal segment: {}", path.display());
                };
                let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
                *path = parent.join(format!("wal_{}.log", index - lwm));
            }
        }
        self.save()
    }

    fn save(&self) -> Result<()> {
        let mut content = String::new();
        for (segment, offset) in &self.entries {
            content.push_str(&format!("{},{}\n", segment.display(), offset));
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

impl std::fmt::Debug for MemwalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemwalIndex")
            .field("entries", &self.entries.len())
            .finish()
    }
}
