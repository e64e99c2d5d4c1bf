//! Criterion benchmarks for pgheap-utils core operations.
//!
//! Benchmarks cover:
//! - Page decoding (decode_page)
//! - Page extraction with and without a column layout (extract_page)
//! - Attribute decoding of a single mixed tuple (decode_attributes)
//! - Recovery scanning of aligned and shifted images (Scanner, scan_parallel)

use byteorder::{BigEndian, ByteOrder};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use pdu::heap::attribute::{decode_attributes, Alignment, ColumnDescriptor};
use pdu::heap::constants::*;
use pdu::heap::extract::extract_page;
use pdu::heap::page::decode_page;
use pdu::heap::scanner::{scan_parallel, ScanConfig, Scanner};
use pdu::heap::source::MemorySource;

const PS: usize = BLCKSZ;

// ---------------------------------------------------------------------------
// Synthetic page builders (mirrors integration test helpers)
// ---------------------------------------------------------------------------

fn columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::fixed("id", 4, Alignment::Int, true).with_type("int4"),
        ColumnDescriptor::varlena("name", Alignment::Int).with_type("text"),
        ColumnDescriptor::fixed("balance", 8, Alignment::Double, true).with_type("int8"),
    ]
}

/// `(id int4, name text, balance int8)` row.
fn row(id: i32) -> Vec<u8> {
    let name = format!("customer-{id:05}");
    let mut t = vec![0u8; 24];
    BigEndian::write_u32(&mut t[T_XMIN..], 1000 + id as u32);
    BigEndian::write_u16(&mut t[T_INFOMASK2..], 3);
    BigEndian::write_u16(&mut t[T_INFOMASK..], HEAP_HASVARWIDTH);
    t[T_HOFF] = 24;
    t.extend_from_slice(&id.to_be_bytes());
    t.push(0x80 | (name.len() as u8 + 1));
    t.extend_from_slice(name.as_bytes());
    while t.len() % 8 != 0 {
        t.push(0);
    }
    t.extend_from_slice(&(id as i64 * 100).to_be_bytes());
    t
}

/// A page filled with rows until free space runs out.
fn full_page(first_id: i32) -> Vec<u8> {
    let mut page = vec![0u8; PS];
    let mut upper = PS;
    let mut lower = SIZE_PAGE_HEADER;
    let mut id = first_id;
    loop {
        let t = row(id);
        let start = (upper - t.len()) & !7;
        if start < lower + SIZE_ITEM_ID {
            break;
        }
        page[start..start + t.len()].copy_from_slice(&t);
        BigEndian::write_u16(&mut page[lower..], start as u16);
        BigEndian::write_u16(&mut page[lower + 2..], ((t.len() as u16) << LP_LEN_SHIFT) | LP_NORMAL);
        lower += SIZE_ITEM_ID;
        upper = start;
        id += 1;
    }
    BigEndian::write_u16(&mut page[PD_LOWER..], lower as u16);
    BigEndian::write_u16(&mut page[PD_UPPER..], upper as u16);
    BigEndian::write_u16(&mut page[PD_SPECIAL..], PS as u16);
    BigEndian::write_u16(&mut page[PD_PAGESIZE_VERSION..], (PS as u16) | 4);
    page
}

/// `num_pages` pages, optionally displaced from block boundaries by 512 bytes.
fn build_image(num_pages: usize, shifted: bool) -> Vec<u8> {
    let mut data = if shifted { vec![0u8; 512] } else { Vec::new() };
    for i in 0..num_pages {
        data.extend_from_slice(&full_page(i as i32 * 1000));
    }
    data
}

// ---------------------------------------------------------------------------
// Benchmark: page decoding and extraction
// ---------------------------------------------------------------------------

fn bench_decode_page(c: &mut Criterion) {
    let page = full_page(0);
    c.bench_function("decode_page", |b| {
        b.iter(|| black_box(decode_page(black_box(&page), PS).unwrap()));
    });
}

fn bench_extract_page(c: &mut Criterion) {
    let bytes = full_page(0);
    let page = decode_page(&bytes, PS).unwrap();
    let cols = columns();
    let mut group = c.benchmark_group("extract_page");
    group.throughput(Throughput::Elements(page.live_count() as u64));

    group.bench_function("headers_only", |b| {
        b.iter(|| black_box(extract_page(&page, None)));
    });
    group.bench_function("with_schema", |b| {
        b.iter(|| black_box(extract_page(&page, Some(&cols))));
    });
    group.finish();
}

fn bench_decode_attributes(c: &mut Criterion) {
    let tuple = row(42);
    let cols = columns();
    c.bench_function("decode_attributes", |b| {
        b.iter(|| black_box(decode_attributes(black_box(&tuple), 24, None, 3, &cols).unwrap()));
    });
}

// ---------------------------------------------------------------------------
// Benchmark: recovery scanning
// ---------------------------------------------------------------------------

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    for num_pages in [16usize, 256] {
        for shifted in [false, true] {
            let image = MemorySource::new(build_image(num_pages, shifted));
            group.throughput(Throughput::Bytes(image.as_bytes().len() as u64));
            let label = if shifted { "shifted" } else { "aligned" };

            group.bench_with_input(
                BenchmarkId::new(format!("sequential_{label}"), num_pages),
                &image,
                |b, image| {
                    b.iter(|| black_box(Scanner::new(image, PS).count()));
                },
            );

            let config = ScanConfig {
                region_size: 16 * PS as u64,
                ..ScanConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("parallel_{label}"), num_pages),
                &image,
                |b, image| {
                    b.iter(|| black_box(scan_parallel(image, &config, None, None).len()));
                },
            );
        }
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Group and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_decode_page,
    bench_extract_page,
    bench_decode_attributes,
    bench_scanner,
);
criterion_main!(benches);
