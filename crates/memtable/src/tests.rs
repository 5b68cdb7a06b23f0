use super::*;
use record::RecordIterator;

const BACKENDS: [BackendKind; 3] = [BackendKind::BTree, BackendKind::SkipList, BackendKind::HashMap];

fn rec(key: &str, value: &str) -> Record {
    Record::new(key.as_bytes().to_vec(), value.as_bytes().to_vec())
}

// -------------------- Single table, all backends --------------------

#[test]
fn put_find_replace() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 100);
        m.put(rec("k1", "v1"));
        assert_eq!(m.len(), 1);
        assert_eq!(m.find(b"k1").unwrap().value(), b"v1");

        m.put(rec("k1", "v2"));
        assert_eq!(m.len(), 1, "{kind:?}: replace must not grow");
        assert_eq!(m.find(b"k1").unwrap().value(), b"v2");

        assert!(m.find(b"missing").is_none());
    }
}

#[test]
fn tombstones_are_stored_and_returned() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 100);
        m.put(rec("k", "v"));
        m.put(Record::tombstone(b"k".to_vec()));

        let found = m.find(b"k").unwrap();
        assert!(found.is_tombstone(), "{kind:?}: tombstone should shadow");
        assert_eq!(m.len(), 1);
    }
}

#[test]
fn sorted_records_are_key_ordered() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 100);
        for key in ["pear", "apple", "zebra", "mango"] {
            m.put(rec(key, "x"));
        }

        let sorted: Vec<Vec<u8>> = m.sorted_records().iter().map(|r| r.key().to_vec()).collect();
        assert_eq!(
            sorted,
            vec![b"apple".to_vec(), b"mango".to_vec(), b"pear".to_vec(), b"zebra".to_vec()],
            "{kind:?}"
        );
    }
}

#[test]
fn clear_empties_the_table() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 10);
        m.put(rec("a", "1"));
        m.clear();
        assert!(m.is_empty());
        assert!(m.find(b"a").is_none());
    }
}

#[test]
fn fullness_tracks_record_count() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 3);
        m.put(rec("a", "1"));
        m.put(rec("b", "2"));
        assert!(!m.is_full());
        m.put(rec("c", "3"));
        assert!(m.is_full());

        // Replacement does not push past capacity accounting.
        m.put(rec("c", "3x"));
        assert_eq!(m.len(), 3);
    }
}

// -------------------- Range & prefix views --------------------

#[test]
fn range_records_are_inclusive_both_ends() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 100);
        for key in ["a", "b", "c", "d", "e"] {
            m.put(rec(key, "x"));
        }

        let keys: Vec<Vec<u8>> = m
            .range_records(b"b", b"d")
            .iter()
            .map(|r| r.key().to_vec())
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()], "{kind:?}");
    }
}

#[test]
fn prefix_records_match_only_the_prefix() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 100);
        for key in ["car", "care", "cat", "dog", "ca"] {
            m.put(rec(key, "x"));
        }

        let keys: Vec<Vec<u8>> = m
            .prefix_records(b"ca")
            .iter()
            .map(|r| r.key().to_vec())
            .collect();
        assert_eq!(
            keys,
            vec![b"ca".to_vec(), b"car".to_vec(), b"care".to_vec(), b"cat".to_vec()],
            "{kind:?}"
        );
    }
}

#[test]
fn iterators_walk_their_slice_in_order() {
    for kind in BACKENDS {
        let mut m = Memtable::new(kind, 100);
        for i in 0..10u32 {
            m.put(rec(&format!("k{i}"), "v"));
        }

        let mut it = m.range_iter(b"k2", b"k5");
        let mut seen = Vec::new();
        while let Some(r) = it.get() {
            seen.push(r.key().to_vec());
            it.advance().unwrap();
        }
        assert_eq!(seen, vec![b"k2".to_vec(), b"k3".to_vec(), b"k4".to_vec(), b"k5".to_vec()]);
    }
}

// -------------------- Ring manager --------------------

#[test]
fn ring_rotates_without_flushing_until_filled() {
    let mut mgr = MemtableManager::new(3, 2, BackendKind::BTree);

    // Two tables' worth of records: two rotations, no flush yet.
    let mut rotations = 0;
    for i in 0..4u32 {
        let outcome = mgr.put(rec(&format!("k{i}"), "v"));
        if outcome.rotated {
            rotations += 1;
        }
        assert!(outcome.flushed.is_none(), "no flush before the ring wraps");
    }
    assert_eq!(rotations, 2);
}

#[test]
fn ring_wrap_drains_the_oldest_table() {
    let mut mgr = MemtableManager::new(3, 2, BackendKind::BTree);

    for i in 0..5u32 {
        assert!(mgr.put(rec(&format!("k{i}"), "v")).flushed.is_none());
    }

    // Sixth record fills the last table; the wrap drains the oldest two.
    let outcome = mgr.put(rec("k5", "v"));
    assert!(outcome.rotated);
    let drained = outcome.flushed.expect("ring wrap must flush");
    let keys: Vec<Vec<u8>> = drained.iter().map(|r| r.key().to_vec()).collect();
    assert_eq!(keys, vec![b"k0".to_vec(), b"k1".to_vec()]);

    // The drained records are gone from the ring.
    assert!(mgr.find(b"k0").is_none());
    assert!(mgr.find(b"k4").is_some());
}

#[test]
fn find_prefers_the_newest_copy() {
    let mut mgr = MemtableManager::new(2, 2, BackendKind::SkipList);

    mgr.put(rec("dup", "old"));
    mgr.put(rec("pad1", "x")); // fills table 0, rotates
    mgr.put(rec("dup", "new"));

    assert_eq!(mgr.find(b"dup").unwrap().value(), b"new");
}

#[test]
fn find_returns_tombstones() {
    let mut mgr = MemtableManager::new(2, 10, BackendKind::HashMap);
    mgr.put(rec("k", "v"));
    mgr.put(Record::tombstone(b"k".to_vec()));
    assert!(mgr.find(b"k").unwrap().is_tombstone());
}

#[test]
fn manager_iterators_cover_every_table() {
    let mut mgr = MemtableManager::new(3, 2, BackendKind::BTree);
    for i in 0..5u32 {
        mgr.put(rec(&format!("k{i}"), "v"));
    }

    let mut keys = Vec::new();
    for mut it in mgr.range_iterators(b"k0", b"k9") {
        while let Some(r) = it.get() {
            keys.push(r.key().to_vec());
            it.advance().unwrap();
        }
    }
    keys.sort();
    assert_eq!(keys.len(), 5);
    assert_eq!(keys[0], b"k0".to_vec());
    assert_eq!(keys[4], b"k4".to_vec());
}
