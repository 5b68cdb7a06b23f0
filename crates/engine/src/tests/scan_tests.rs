use super::helpers::*;
use tempfile::tempdir;

fn keys_of(records: &[record::Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| String::from_utf8_lossy(r.key()).into_owned())
        .collect()
}

#[test]
fn range_scan_merges_memtables_and_tables() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    // 30 writes: some flushed, some still in memory.
    for i in 0..30u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }
    assert!(engine.table_count_at(1).unwrap() >= 1);

    let page = engine.range_scan(b"k_00", b"k_29", 1, 100).unwrap();
    assert_eq!(page.len(), 30);
    let keys = keys_of(&page);
    assert_eq!(keys[0], "k_00");
    assert_eq!(keys[29], "k_29");
    assert!(keys.windows(2).all(|w| w[0] < w[1]), "ascending, no dupes");
}

#[test]
fn scan_deduplicates_overwritten_keys() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    put_str(&mut engine, "dup", "old");
    for i in 0..24u32 {
        put_str(&mut engine, &format!("pad{i:02}"), "x");
    }
    put_str(&mut engine, "dup", "new");

    let page = engine.range_scan(b"dup", b"dup", 1, 10).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].value(), b"new");
}

#[test]
fn scan_suppresses_tombstones() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for key in ["a", "b", "c"] {
        put_str(&mut engine, key, "v");
    }
    engine.delete(b"b".to_vec()).unwrap();

    let page = engine.range_scan(b"a", b"c", 1, 10).unwrap();
    assert_eq!(keys_of(&page), vec!["a", "c"]);
}

#[test]
fn scan_skips_reserved_system_keys() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    put_str(&mut engine, "aa", "user");
    put_str(&mut engine, "bf my-filter", "system");
    put_str(&mut engine, "cms my-sketch", "system");
    put_str(&mut engine, "zz", "user");

    let page = engine.range_scan(b"a", b"zzz", 1, 10).unwrap();
    assert_eq!(keys_of(&page), vec!["aa", "zz"]);
}

#[test]
fn prefix_scan_matches_only_the_prefix() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for key in ["car", "care", "cat", "dog"] {
        put_str(&mut engine, key, "v");
    }

    let page = engine.prefix_scan(b"car", 1, 10).unwrap();
    assert_eq!(keys_of(&page), vec!["car", "care"]);
}

#[test]
fn pagination_returns_the_requested_page() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for i in 0..10u32 {
        put_str(&mut engine, &format!("k{i}"), &i.to_string());
    }

    let page1 = engine.range_scan(b"k0", b"k9", 1, 3).unwrap();
    assert_eq!(keys_of(&page1), vec!["k0", "k1", "k2"]);

    let page2 = engine.range_scan(b"k0", b"k9", 2, 3).unwrap();
    assert_eq!(keys_of(&page2), vec!["k3", "k4", "k5"]);

    // A page past the end is short or empty.
    let page4 = engine.range_scan(b"k0", b"k9", 4, 3).unwrap();
    assert_eq!(keys_of(&page4), vec!["k9"]);
}

#[test]
fn iterator_walks_until_exhaustion() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for i in 0..5u32 {
        put_str(&mut engine, &format!("k{i}"), &i.to_string());
    }

    let mut iter = engine.range_iterate(b"k0", b"k9").unwrap();
    let mut seen = Vec::new();
    while let Some(rec) = iter.next().unwrap() {
        seen.push(String::from_utf8_lossy(rec.key()).into_owned());
    }
    assert_eq!(seen, vec!["k0", "k1", "k2", "k3", "k4"]);
    // Exhausted iterators stay exhausted.
    assert!(iter.next().unwrap().is_none());
}

#[test]
fn scan_completeness_across_flushed_and_deleted_keys() {
    let dir = tempdir().unwrap();
    let mut engine = open_engine(dir.path(), test_config());

    for i in 0..40u32 {
        put_str(&mut engine, &format!("k_{i:02}"), &i.to_string());
    }
    // Delete every fourth key.
    for i in (0..40u32).step_by(4) {
        engine.delete(format!("k_{i:02}").into_bytes()).unwrap();
    }

    let page = engine.range_scan(b"k_00", b"k_99", 1, 100).unwrap();
    let expected: Vec<String> = (0..40u32)
        .filter(|i| i % 4 != 0)
        .map(|i| format!("k_{i:02}"))
        .collect();
    assert_eq!(keys_of(&page), expected);
}
