//! Snapshot and restore through a reader session.

use std::fs;

use mpdata::config::FeatureSchema;
use mpdata::corpus::CorpusRequest;
use mpdata::reader::DatasetReader;
use mpdata::snapshot::{read_manifest, ENTRIES_FILE, MANIFEST_FILE};
use mpdata::tabular::TextEncoding;
use mpdata::MpdataError;

fn fixture_reader() -> DatasetReader {
    DatasetReader::open(
        &CorpusRequest::file("tests/fixtures/sample_landmarks.csv", "csv"),
        FeatureSchema::new(2, 3).with_feature_columns(["p0", "p1"]),
        TextEncoding::Latin1,
    )
    .expect("open reader")
}

#[test]
fn snapshot_restores_identical_dataset() {
    let reader = fixture_reader();
    let dataset = reader.load_dataset(reader.files()).expect("load");

    let dir = tempfile::tempdir().expect("tempdir");
    let snap = dir.path().join("snap");
    reader.snapshot(&dataset, &snap).expect("snapshot");

    assert!(snap.join(MANIFEST_FILE).is_file());
    assert!(snap.join(ENTRIES_FILE).is_file());

    let manifest = read_manifest(&snap).expect("manifest");
    assert_eq!(manifest.entry_count, 3);
    assert_eq!(manifest.shape, Some((2, 3)));

    let restored = reader.restore(&snap).expect("restore");
    assert_eq!(restored.len(), dataset.len());
    for (a, b) in dataset.iter().zip(&restored) {
        assert_eq!(a.frame, b.frame);
        assert_eq!(a.phrase, b.phrase);
        assert_eq!(a.context, b.context);
        // NaN cells must survive too, so compare bit patterns.
        let a_bits: Vec<u32> = a.landmarks.as_slice().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u32> = b.landmarks.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }
}

#[test]
fn empty_dataset_snapshot() {
    let reader = fixture_reader();
    let dir = tempfile::tempdir().expect("tempdir");

    reader.snapshot(&[], dir.path()).expect("snapshot");
    let manifest = read_manifest(dir.path()).expect("manifest");
    assert_eq!(manifest.entry_count, 0);
    assert_eq!(manifest.shape, None);
    assert!(reader.restore(dir.path()).expect("restore").is_empty());
}

#[test]
fn restore_without_manifest_fails() {
    let reader = fixture_reader();
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(ENTRIES_FILE), b"").expect("write");

    let err = reader.restore(dir.path()).unwrap_err();
    assert!(matches!(err, MpdataError::FileAccess { .. }));
}

#[test]
fn truncated_entries_file_fails_restore() {
    let reader = fixture_reader();
    let dataset = reader.load_dataset(reader.files()).expect("load");

    let dir = tempfile::tempdir().expect("tempdir");
    reader.snapshot(&dataset, dir.path()).expect("snapshot");

    let entries = dir.path().join(ENTRIES_FILE);
    let bytes = fs::read(&entries).expect("read");
    fs::write(&entries, &bytes[..bytes.len() - 5]).expect("truncate");

    let err = reader.restore(dir.path()).unwrap_err();
    assert!(matches!(err, MpdataError::Format { .. }));
}
