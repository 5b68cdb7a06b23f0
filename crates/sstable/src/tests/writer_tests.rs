use super::helpers::*;
use crate::layout::{self, Shape, SINGLE_HEADER_LEN};
use crate::{KeyDictionary, Table, TableBuilder, TableName};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use tempfile::tempdir;

#[test]
fn multi_file_table_has_five_regions_and_toc() {
    let dir = tempdir().unwrap();
    let name = TableName::new(1, 1);
    TableBuilder::write_table(dir.path(), name, &sorted_records(10), 3, Shape::MultiFile, false, 0.01)
        .unwrap();

    let table_dir = dir.path().join("C1_SST_1");
    for file in [
        "SST_Data.db",
        "SST_Index.db",
        "SST_Summary.db",
        "SST_Filter.db",
        "SST_Merkle.db",
        "TOC.csv",
    ] {
        assert!(table_dir.join(file).is_file(), "{file} missing");
    }
    assert_eq!(layout::read_toc(&table_dir).unwrap(), Shape::MultiFile);
}

#[test]
fn single_file_table_has_offset_header() {
    let dir = tempdir().unwrap();
    let name = TableName::new(1, 1);
    TableBuilder::write_table(dir.path(), name, &sorted_records(10), 3, Shape::SingleFile, false, 0.01)
        .unwrap();

    let table_dir = dir.path().join("C1_SST_1");
    assert!(table_dir.join("SST.db").is_file());
    assert!(!table_dir.join("SST_Data.db").exists());
    assert_eq!(layout::read_toc(&table_dir).unwrap(), Shape::SingleFile);

    // Five ascending offsets, the first right after the header.
    let mut file = File::open(table_dir.join("SST.db")).unwrap();
    let mut offsets = [0u64; 5];
    for slot in offsets.iter_mut() {
        *slot = file.read_u64::<LittleEndian>().unwrap();
    }
    assert_eq!(offsets[0], SINGLE_HEADER_LEN);
    for pair in offsets.windows(2) {
        assert!(pair[0] < pair[1], "offsets must ascend: {offsets:?}");
    }
    let len = file.metadata().unwrap().len();
    assert!(offsets[4] < len);
}

#[test]
fn compressed_table_carries_a_dictionary() {
    let dir = tempdir().unwrap();
    let name = TableName::new(1, 1);
    TableBuilder::write_table(dir.path(), name, &sorted_records(6), 3, Shape::MultiFile, true, 0.01)
        .unwrap();

    let table_dir = dir.path().join("C1_SST_1");
    assert!(KeyDictionary::exists(&table_dir));

    let dict = KeyDictionary::load(&table_dir).unwrap();
    assert_eq!(dict.len(), 6);
    // Ids are assigned 1.. in first-appearance (= key) order.
    assert_eq!(dict.key_for(1), Some(b"k00".to_vec()));
    assert_eq!(dict.key_for(6), Some(b"k05".to_vec()));
}

#[test]
fn empty_table_is_refused() {
    let dir = tempdir().unwrap();
    let builder = TableBuilder::new(3, Shape::MultiFile, false, 0.01);
    assert!(builder.finish(&dir.path().join("C1_SST_1")).is_err());
    // Nothing published.
    assert!(!dir.path().join("C1_SST_1").join("TOC.csv").exists());
}

#[test]
fn summary_header_spans_the_key_range() {
    let dir = tempdir().unwrap();
    let name = TableName::new(1, 1);
    TableBuilder::write_table(dir.path(), name, &sorted_records(20), 5, Shape::MultiFile, false, 0.01)
        .unwrap();

    let table = Table::open(&dir.path().join("C1_SST_1"), 5).unwrap();
    let (low, high) = table.key_range().unwrap();
    assert_eq!(low, b"k00".to_vec());
    assert_eq!(high, b"k19".to_vec());
}

#[test]
fn tombstones_are_written_and_read_back() {
    let dir = tempdir().unwrap();
    let records = vec![rec("a", "1"), tomb_at("b", 100), rec("c", "3")];
    TableBuilder::write_table(dir.path(), TableName::new(1, 1), &records, 3, Shape::MultiFile, false, 0.01)
        .unwrap();

    let table = Table::open(&dir.path().join("C1_SST_1"), 3).unwrap();
    let found = table.get(b"b").unwrap().unwrap();
    assert!(found.is_tombstone());
}
