use crate::{CompactionPolicy, SstConfig, TableSet};
use record::{crc_of, Record};
use std::path::Path;

/// A live record with an explicit timestamp, so tie-breaks in tests are
/// deterministic.
pub fn rec_at(key: &str, value: &str, ts: u64) -> Record {
    let value = value.as_bytes().to_vec();
    Record::from_parts(crc_of(&value), ts, false, key.as_bytes().to_vec(), value)
}

pub fn rec(key: &str, value: &str) -> Record {
    rec_at(key, value, 100)
}

pub fn tomb_at(key: &str, ts: u64) -> Record {
    Record::from_parts(crc_of(&[]), ts, true, key.as_bytes().to_vec(), Vec::new())
}

/// Sorted records `k00..kNN` with value = index as text.
pub fn sorted_records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| rec(&format!("k{i:02}"), &i.to_string()))
        .collect()
}

pub fn small_config() -> SstConfig {
    SstConfig {
        summary_factor: 3,
        single_file: false,
        compression: false,
        fp_rate: 0.01,
        policy: CompactionPolicy::SizeTiered,
        max_lsm_levels: 4,
        tables_to_compress: 4,
        first_leveled_size: 1024,
        leveled_inc: 2,
    }
}

pub fn open_set(root: &Path, config: SstConfig) -> TableSet {
    TableSet::open(root, config).unwrap()
}
