use crate::{Config, Engine};
use std::path::Path;

/// A small configuration so a handful of writes exercises rotation,
/// flush, and truncation. Compaction is effectively disabled (high
/// trigger); tests that want it lower `tables_to_compress` themselves.
pub fn test_config() -> Config {
    Config {
        wal_segment_size: 512,
        memtable_capacity: 8,
        memtable_count: 3,
        memtable_structure: "btree".to_string(),
        cache_capacity: 16,
        summary_factor: 3,
        single_file_sst: false,
        compression: false,
        compaction_policy: "size-tiered".to_string(),
        max_lsm_levels: 4,
        tables_to_compress: 15,
        first_leveled_size: 4096,
        leveled_inc: 10,
        filter_fp_rate: 0.01,
    }
}

pub fn open_engine(root: &Path, config: Config) -> Engine {
    Engine::with_config(root, config).unwrap()
}

pub fn put_str(engine: &mut Engine, key: &str, value: &str) {
    engine
        .put(key.as_bytes().to_vec(), value.as_bytes().to_vec())
        .unwrap();
}

pub fn get_str(engine: &mut Engine, key: &str) -> Option<String> {
    engine
        .get(key.as_bytes())
        .unwrap()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
}
