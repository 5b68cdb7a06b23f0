use super::helpers::*;
use crate::layout::Shape;
use crate::{Table, TableBuilder, TableIterator, TableName};
use record::RecordIterator;
use tempfile::tempdir;

fn collect_keys(mut it: TableIterator) -> Vec<String> {
    let mut keys = Vec::new();
    while let Some(rec) = it.get() {
        keys.push(String::from_utf8_lossy(rec.key()).into_owned());
        it.advance().unwrap();
    }
    keys
}

fn open_table(dir: &std::path::Path, shape: Shape) -> Table {
    TableBuilder::write_table(dir, TableName::new(1, 1), &sorted_records(20), 3, shape, false, 0.01)
        .unwrap();
    Table::open(&dir.join("C1_SST_1"), 3).unwrap()
}

#[test]
fn range_iterator_is_inclusive_both_ends() {
    let dir = tempdir().unwrap();
    let table = open_table(dir.path(), Shape::MultiFile);

    let it = TableIterator::new_range(table, b"k05", b"k08").unwrap();
    assert_eq!(collect_keys(it), vec!["k05", "k06", "k07", "k08"]);
}

#[test]
fn range_iterator_works_on_single_file_tables() {
    let dir = tempdir().unwrap();
    let table = open_table(dir.path(), Shape::SingleFile);

    let it = TableIterator::new_range(table, b"k17", b"k99").unwrap();
    assert_eq!(collect_keys(it), vec!["k17", "k18", "k19"]);
}

#[test]
fn disjoint_range_finishes_immediately() {
    let dir = tempdir().unwrap();
    let table = open_table(dir.path(), Shape::MultiFile);

    let it = TableIterator::new_range(table, b"x", b"z").unwrap();
    assert!(!it.valid());
    assert!(it.get().is_none());
}

#[test]
fn prefix_iterator_yields_the_contiguous_block() {
    let dir = tempdir().unwrap();
    let records = vec![
        rec("apple", "1"),
        rec("apricot", "2"),
        rec("banana", "3"),
        rec("bandana", "4"),
        rec("cherry", "5"),
    ];
    TableBuilder::write_table(dir.path(), TableName::new(1, 1), &records, 3, Shape::MultiFile, false, 0.01)
        .unwrap();
    let table = Table::open(&dir.path().join("C1_SST_1"), 3).unwrap();

    let it = TableIterator::new_prefix(table, b"ban").unwrap();
    assert_eq!(collect_keys(it), vec!["banana", "bandana"]);
}

#[test]
fn prefix_iterator_with_no_matches_is_empty() {
    let dir = tempdir().unwrap();
    let table = open_table(dir.path(), Shape::MultiFile);

    let it = TableIterator::new_prefix(table, b"zzz").unwrap();
    assert!(!it.valid());
}

#[test]
fn iterator_reads_values_and_tombstones() {
    let dir = tempdir().unwrap();
    let records = vec![rec_at("a", "live", 5), tomb_at("b", 6), rec_at("c", "live", 7)];
    TableBuilder::write_table(dir.path(), TableName::new(1, 1), &records, 3, Shape::MultiFile, false, 0.01)
        .unwrap();
    let table = Table::open(&dir.path().join("C1_SST_1"), 3).unwrap();

    let mut it = TableIterator::new_range(table, b"a", b"z").unwrap();
    assert_eq!(it.get().unwrap().value(), b"live");
    it.advance().unwrap();
    assert!(it.get().unwrap().is_tombstone());
    it.advance().unwrap();
    assert_eq!(it.get().unwrap().key(), b"c");
    it.advance().unwrap();
    assert!(!it.valid());
}
