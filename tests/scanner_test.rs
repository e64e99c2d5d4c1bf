//! Integration tests for the disaster-recovery scanner.
//!
//! Images are written to disk and read back through `FileSource`, so the
//! scanner sees the same positioned-read path the `dropscan` command uses.

use byteorder::{BigEndian, ByteOrder};
use std::io::Write;
use tempfile::NamedTempFile;

use pdu::heap::catalog::{SchemaFile, SchemaSource};
use pdu::heap::constants::*;
use pdu::heap::extract::TupleOutcome;
use pdu::heap::field_decode::FieldValue;
#[cfg(feature = "parallel")]
use pdu::heap::scanner::{scan_parallel, ScanConfig};
use pdu::heap::scanner::Scanner;
use pdu::heap::source::{ByteSource, FileSource, MemorySource};

const PS: usize = BLCKSZ;

/// Page with one `(id int4, qty int8)` row.
fn order_page(id: i32, qty: i64) -> Vec<u8> {
    let mut tuple = vec![0u8; 24];
    BigEndian::write_u32(&mut tuple[T_XMIN..], 500 + id as u32);
    BigEndian::write_u16(&mut tuple[T_INFOMASK2..], 2);
    tuple[T_HOFF] = 24;
    tuple.extend_from_slice(&id.to_be_bytes());
    tuple.extend_from_slice(&[0u8; 4]); // int8 alignment padding
    tuple.extend_from_slice(&qty.to_be_bytes());

    let upper = PS - tuple.len();
    let mut page = vec![0u8; PS];
    BigEndian::write_u16(&mut page[PD_LOWER..], 28);
    BigEndian::write_u16(&mut page[PD_UPPER..], upper as u16);
    BigEndian::write_u16(&mut page[PD_SPECIAL..], PS as u16);
    BigEndian::write_u16(&mut page[PD_PAGESIZE_VERSION..], (PS as u16) | 4);
    BigEndian::write_u16(&mut page[24..], upper as u16);
    BigEndian::write_u16(&mut page[26..], ((tuple.len() as u16) << LP_LEN_SHIFT) | LP_NORMAL);
    page[upper..].copy_from_slice(&tuple);
    page
}

/// Two pages displaced by 1536 bytes, then an aligned page at block 3.
fn damaged_image() -> Vec<u8> {
    let mut bytes = vec![0u8; 1536];
    bytes.extend_from_slice(&order_page(1, 10));
    bytes.extend_from_slice(&order_page(2, 20));
    bytes.resize(3 * PS, 0);
    bytes.extend_from_slice(&order_page(3, 30));
    bytes
}

fn write_image(bytes: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(bytes).unwrap();
    tmp.flush().unwrap();
    tmp
}

#[test]
fn test_scan_damaged_image_from_disk() {
    let tmp = write_image(&damaged_image());
    let source = FileSource::open(tmp.path()).unwrap();
    assert_eq!(source.len(), 4 * PS as u64);

    let found: Vec<(u64, bool)> = Scanner::new(&source, PS)
        .map(|p| (p.offset, p.aligned))
        .collect();
    assert_eq!(
        found,
        vec![(1536, false), (1536 + PS as u64, false), (3 * PS as u64, true)]
    );
}

#[test]
fn test_recovered_rows_decode_with_schema() {
    let schema = SchemaFile::from_json(
        r#"{"tables":[{"name":"orders","columns":[
            {"name":"id","type":"integer"},
            {"name":"qty","type":"bigint"}
        ]}]}"#,
    )
    .unwrap();
    let columns = schema.resolve_columns("orders").unwrap();
    let image = MemorySource::new(damaged_image());

    let mut rows = Vec::new();
    for page in Scanner::new(&image, PS).with_schema(&columns) {
        for outcome in &page.extraction.tuples {
            let TupleOutcome::Decoded(t) = outcome else {
                panic!("tuple at {} should decode", page.offset);
            };
            let values: Vec<FieldValue> = t.values().map(|(_, v)| v.clone()).collect();
            rows.push(values);
        }
    }
    assert_eq!(
        rows,
        vec![
            vec![FieldValue::Int(1), FieldValue::Int(10)],
            vec![FieldValue::Int(2), FieldValue::Int(20)],
            vec![FieldValue::Int(3), FieldValue::Int(30)],
        ]
    );
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_scan_of_file_matches_sequential() {
    let tmp = write_image(&damaged_image());
    let source = FileSource::open(tmp.path()).unwrap();
    let config = ScanConfig {
        region_size: 2 * PS as u64,
        ..ScanConfig::default()
    };

    let sequential: Vec<u64> = Scanner::with_config(&source, &config)
        .map(|p| p.offset)
        .collect();
    let parallel: Vec<u64> = scan_parallel(&source, &config, None, None)
        .into_iter()
        .map(|p| p.offset)
        .collect();
    assert_eq!(parallel, sequential);
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_scan_honours_start_and_stop() {
    let image = MemorySource::new(damaged_image());
    let config = ScanConfig {
        start: 2 * PS as u64,
        stop: Some(4 * PS as u64),
        region_size: PS as u64,
        ..ScanConfig::default()
    };
    let found: Vec<u64> = scan_parallel(&image, &config, None, None)
        .into_iter()
        .map(|p| p.offset)
        .collect();
    assert_eq!(found, vec![3 * PS as u64]);
}

#[cfg(feature = "parallel")]
#[test]
fn test_precancelled_scan_finds_nothing() {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    let image = MemorySource::new(damaged_image());
    let flag = Arc::new(AtomicBool::new(true));
    let pages = scan_parallel(&image, &ScanConfig::default(), None, Some(flag));
    assert!(pages.is_empty());
}

#[test]
fn test_garbage_image_yields_no_pages() {
    // a repeating pattern whose header words never satisfy the layout rules
    let bytes: Vec<u8> = (0..4 * PS).map(|i| 0xF0 | (i % 16) as u8).collect();
    let image = MemorySource::new(bytes);
    assert_eq!(Scanner::new(&image, PS).probe_step(64).count(), 0);
}
