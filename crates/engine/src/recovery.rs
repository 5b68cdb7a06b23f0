//! Cold-start recovery: replaying the WAL through the memtable ring.
//!
//! The memwal index names the position at which the oldest live memtable
//! began. Replay seeks there and pushes every surviving record through the
//! ring exactly as the original writes did — including ring rotations and
//! flushes, so a replay that overflows the ring produces the same SSTables
//! the crashed process would have. CRC failures during replay are fatal:
//! an acknowledged write that no longer checksums is real corruption, not
//! a torn tail.

use anyhow::{Context, Result};
use tracing::info;

use crate::Engine;

impl Engine {
    /// Replays the WAL from the oldest live memtable's position. Returns
    /// the number of records restored.
    pub(crate) fn recover(&mut self) -> Result<usize> {
        let Some((segment, offset)) = self.memwal.first() else {
            return Ok(0);
        };

        let segment_no = wal::segment_index(segment)
            .with_context(|| format!("memwal names no wal segment: {}", segment.display()))?;
        self.wal.seek(segment_no - 1, offset);

        let mut replayed = 0usize;
        loop {
            let rec = match self.wal.restore_next() {
                Ok(Some(rec)) => rec,
                Ok(None) => break,
                Err(e) => return Err(e).context("wal replay failed"),
            };

            let outcome = self.manager.put(rec);
            if let Some(records) = outcome.flushed {
                // The crashed process would have flushed here too.
                self.tables.flush(&records)?;
                self.tables.compact()?;
            }
            replayed += 1;
        }

        if replayed > 0 {
            info!(replayed, "wal replay complete");
        }
        Ok(replayed)
    }
}
