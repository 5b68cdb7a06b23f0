//! End-to-end scenarios exercising the whole pipeline with literal
//! inputs.

use super::helpers::*;
use tempfile::tempdir;

#[test]
fn put_delete_get_interleave() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    put_str(&mut engine, "a", "1");
    put_str(&mut engine, "b", "2");
    engine.delete(b"a".to_vec()).unwrap();

    assert_eq!(get_str(&mut engine, "a"), None);
    assert_eq!(get_str(&mut engine, "b").as_deref(), Some("2"));
}

#[test]
fn forty_writes_flush_multiple_tables() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config()); // capacity 8, ring of 3

    for i in 0..40u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }

    assert!(
        engine.table_count_at(1).unwrap() >= 2,
        "40 writes through an 8×3 ring must flush at least twice"
    );
    assert_eq!(get_str(&mut engine, "k_37").as_deref(), Some("37"));
}

#[test]
fn oversized_record_survives_cold_restart() {
    let dir = tempdir().unwrap();
    let mut config = test_config();
    // Smallest accepted segment: the record below is ~3x larger.
    config.wal_segment_size = 200;
    {
        let mut engine = open_engine(dir.path(), config.clone());
        engine.put(b"blob".to_vec(), vec![b'b'; 560]).unwrap();
    }

    let mut engine = open_engine(dir.path(), config);
    assert_eq!(engine.get(b"blob").unwrap().unwrap(), vec![b'b'; 560]);
}

#[test]
fn range_scan_first_page_after_forty_writes() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for i in 0..40u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }

    let page = engine.range_scan(b"k_05", b"k_10", 1, 3).unwrap();
    let got: Vec<(String, String)> = page
        .iter()
        .map(|r| {
            (
                String::from_utf8_lossy(r.key()).into_owned(),
                String::from_utf8_lossy(r.value()).into_owned(),
            )
        })
        .collect();
    assert_eq!(
        got,
        vec![
            ("k_05".to_string(), "5".to_string()),
            ("k_06".to_string(), "6".to_string()),
            ("k_07".to_string(), "7".to_string()),
        ]
    );
}

#[test]
fn prefix_scan_second_page_after_forty_writes() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for i in 0..40u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }

    // Keys with prefix `k_1`: k_10..k_19. Page 2 of 4 = the 5th..8th.
    let page = engine.prefix_scan(b"k_1", 2, 4).unwrap();
    let keys: Vec<String> = page
        .iter()
        .map(|r| String::from_utf8_lossy(r.key()).into_owned())
        .collect();
    assert_eq!(keys, vec!["k_14", "k_15", "k_16", "k_17"]);
}

#[test]
fn size_tiered_compaction_collapses_a_tier() {
    let dir = tempdir().unwrap();
    let mut config = test_config();
    config.tables_to_compress = 4;
    let mut engine = open_engine(dir.path(), config);

    // Four ring overflows -> four L1 flushes -> one compaction.
    for i in 0..48u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }

    assert_eq!(engine.table_count_at(1).unwrap(), 0, "L1 consumed");
    assert_eq!(engine.table_count_at(2).unwrap(), 1, "one merged L2 table");

    for i in 0..48u32 {
        assert_eq!(
            get_str(&mut engine, &format!("k_{i:02}")).as_deref(),
            Some(i.to_string().as_str()),
            "key {i} lost by compaction"
        );
    }
}
