use super::helpers::*;
use tempfile::tempdir;

#[test]
fn missing_key_is_none() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());
    assert_eq!(get_str(&mut engine, "nope"), None);
}

#[test]
fn delete_shadows_memtable_value() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    put_str(&mut engine, "k", "v");
    engine.delete(b"k".to_vec()).unwrap();
    assert_eq!(get_str(&mut engine, "k"), None);
}

#[test]
fn delete_shadows_flushed_value() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    // Push "victim" out to an SSTable, then delete it.
    put_str(&mut engine, "victim", "data");
    for i in 0..24u32 {
        put_str(&mut engine, &format!("pad{i:02}"), "x");
    }
    assert!(engine.table_count_at(1).unwrap() >= 1);

    engine.delete(b"victim".to_vec()).unwrap();
    assert_eq!(get_str(&mut engine, "victim"), None);
}

#[test]
fn delete_then_reinsert_resurrects_the_key() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    put_str(&mut engine, "k", "v1");
    engine.delete(b"k".to_vec()).unwrap();
    put_str(&mut engine, "k", "v2");
    assert_eq!(get_str(&mut engine, "k").as_deref(), Some("v2"));
}

#[test]
fn newest_copy_wins_across_memtable_and_tables() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    put_str(&mut engine, "dup", "old");
    for i in 0..24u32 {
        put_str(&mut engine, &format!("pad{i:02}"), "x");
    }
    // "old" now lives in an SSTable; the new copy stays in memory.
    put_str(&mut engine, "dup", "new");

    assert_eq!(get_str(&mut engine, "dup").as_deref(), Some("new"));
}

#[test]
fn reads_hit_through_the_cache() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    // Flush everything out of the memtables so a get must go to disk.
    for i in 0..24u32 {
        put_str(&mut engine, &format!("k{i:02}"), &i.to_string());
    }
    for _ in 0..3 {
        // Repeated reads answer identically whether served from the
        // tables or the now-warm cache.
        assert_eq!(get_str(&mut engine, "k03").as_deref(), Some("3"));
    }
}

#[test]
fn single_file_tables_answer_reads() {
    let dir = tempdir().unwrap();
    let mut config = test_config();
    config.single_file_sst = true;
    let mut engine = open_engine(dir.path(), config);

    for i in 0..30u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }
    for i in 0..30u32 {
        assert_eq!(
            get_str(&mut engine, &format!("k_{i:02}")).as_deref(),
            Some(i.to_string().as_str())
        );
    }
}

#[test]
fn compressed_tables_answer_reads() {
    let dir = tempdir().unwrap();
    let mut config = test_config();
    config.compression = true;
    let mut engine = open_engine(dir.path(), config);

    for i in 0..30u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }
    for i in 0..30u32 {
        assert_eq!(
            get_str(&mut engine, &format!("k_{i:02}")).as_deref(),
            Some(i.to_string().as_str())
        );
    }
}
