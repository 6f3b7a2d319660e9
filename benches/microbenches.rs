//! Criterion microbenches for mpdata record encoding and decoding.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - Example encoding (encode_record) and decoding (decode_entry)
//! - TFRecord framing and unframing
//! - CSV table to record conversion

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use mpdata::config::FeatureSchema;
use mpdata::convert::CsvRecordConverter;
use mpdata::record::codec::{decode_entry, encode_record};
use mpdata::record::container::{frame_record, read_tfrecord_slice};
use mpdata::record::LandmarkRecord;
use mpdata::tabular::from_csv_str;

// One full MediaPipe holistic frame: 543 points x 3 channels.
fn holistic_record() -> LandmarkRecord {
    let landmark = (0..543 * 3).map(|i| (i % 97) as f32 / 97.0).collect();
    LandmarkRecord::new(42, landmark, "the quick brown fox", "bench")
}

fn csv_fixture(rows: usize) -> String {
    let mut text = String::from("frame,phrase,context");
    for i in 0..543 {
        text.push_str(&format!(",x_{i},y_{i},z_{i}"));
    }
    text.push('\n');
    for r in 0..rows {
        text.push_str(&format!("{r},hello,ctx"));
        for i in 0..543 * 3 {
            text.push_str(&format!(",{:.4}", (i % 89) as f32 / 89.0));
        }
        text.push('\n');
    }
    text
}

/// Benchmark serializing one frame.
fn bench_encode(c: &mut Criterion) {
    let record = holistic_record();
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(record.landmark.len() as u64));

    group.bench_function("encode_record", |b| {
        b.iter(|| black_box(encode_record(black_box(&record))))
    });

    group.finish();
}

/// Benchmark decoding one frame into a dense (543, 3) tensor.
fn bench_decode(c: &mut Criterion) {
    let bytes = encode_record(&holistic_record());
    let schema = FeatureSchema::default();
    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("decode_entry", |b| {
        b.iter(|| {
            let entry = decode_entry(black_box(&bytes), &schema).unwrap();
            black_box(entry)
        })
    });

    group.finish();
}

/// Benchmark splitting a buffer of framed records.
fn bench_container(c: &mut Criterion) {
    let payload = encode_record(&holistic_record());
    let mut buffer = Vec::new();
    for _ in 0..64 {
        frame_record(&mut buffer, &payload);
    }

    let mut group = c.benchmark_group("container");
    group.throughput(Throughput::Bytes(buffer.len() as u64));

    group.bench_function("read_tfrecord_slice", |b| {
        b.iter(|| {
            let records = read_tfrecord_slice(black_box(&buffer)).unwrap();
            black_box(records)
        })
    });

    group.finish();
}

/// Benchmark converting parsed CSV rows to serialized records.
fn bench_convert(c: &mut Criterion) {
    // Parse once (outside the timed region)
    let table = from_csv_str(&csv_fixture(16)).expect("Failed to parse CSV fixture");
    let converter = CsvRecordConverter::default();

    let mut group = c.benchmark_group("convert");
    group.throughput(Throughput::Elements(table.len() as u64));

    group.bench_function("convert_table", |b| {
        b.iter(|| {
            let records = converter.convert_table(black_box(&table)).unwrap();
            black_box(records)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_container,
    bench_convert,
);
criterion_main!(benches);
