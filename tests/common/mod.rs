#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use mpdata::record::codec::encode_record;
use mpdata::record::container::write_tfrecord_file;
use mpdata::record::LandmarkRecord;

pub const CSV_HEADER: &str = "frame,phrase,context,x0,y0,z0,x1,y1,z1";

/// Writes a CSV landmark file with the two-point header.
pub fn write_csv(path: &Path, rows: &[&str]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    let mut text = String::from(CSV_HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(path, text).expect("write csv file");
    path.to_path_buf()
}

/// Writes records to a TFRecord file.
pub fn write_records(path: &Path, records: &[LandmarkRecord]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    write_tfrecord_file(path, records.iter().map(|r| Ok(encode_record(r))))
        .expect("write tfrecord file");
    path.to_path_buf()
}

pub fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-6, "value {i}: {a} != {e}");
    }
}
