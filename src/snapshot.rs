//! Dataset snapshots.
//!
//! A snapshot stores a fully decoded dataset so it can be reloaded without
//! reading or converting the source corpus again. The snapshot directory
//! holds two files:
//!
//! - `entries.tfrecord`: one framed [`SnapshotEntry`] per dataset entry, in
//!   dataset order. Landmark values are stored as raw `f32`, so a restore
//!   is bit-exact.
//! - `manifest.json`: format version, entry count and the common landmark
//!   shape. It is written last, so a directory without a manifest is an
//!   incomplete snapshot.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MpdataError;
use crate::record::container::{open_tfrecord_file, write_tfrecord_file};
use crate::record::proto::SnapshotEntry;
use crate::record::{DecodedEntry, LandmarkMatrix};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ENTRIES_FILE: &str = "entries.tfrecord";
pub const SNAPSHOT_VERSION: u32 = 1;

/// Contents of `manifest.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub version: u32,
    pub entry_count: u64,
    /// Landmark shape shared by every entry; `None` for an empty dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<(usize, usize)>,
    pub created_by: String,
}

/// Writes `entries` to the snapshot directory `dir`, creating it if needed.
///
/// # Errors
/// [`MpdataError::Shape`] if the entries do not share one landmark shape;
/// I/O failures as [`MpdataError::FileAccess`].
pub fn write_snapshot(entries: &[DecodedEntry], dir: &Path) -> Result<SnapshotManifest, MpdataError> {
    let shape = common_shape(entries)?;

    fs::create_dir_all(dir).map_err(|source| MpdataError::FileAccess {
        path: dir.to_path_buf(),
        source,
    })?;

    let entries_path = dir.join(ENTRIES_FILE);
    let count = write_tfrecord_file(
        &entries_path,
        entries.iter().map(|entry| Ok(to_proto(entry).encode_to_vec())),
    )?;

    let manifest = SnapshotManifest {
        version: SNAPSHOT_VERSION,
        entry_count: count,
        shape,
        created_by: format!("mpdata {}", env!("CARGO_PKG_VERSION")),
    };

    let manifest_path = dir.join(MANIFEST_FILE);
    let file = File::create(&manifest_path).map_err(|source| MpdataError::FileAccess {
        path: manifest_path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &manifest).map_err(|source| {
        MpdataError::SnapshotManifest {
            path: manifest_path.clone(),
            source,
        }
    })?;
    writer.flush().map_err(|source| MpdataError::FileAccess {
        path: manifest_path.clone(),
        source,
    })?;

    info!(dir = %dir.display(), entries = count, "wrote dataset snapshot");
    Ok(manifest)
}

/// Reads the manifest of a snapshot directory.
pub fn read_manifest(dir: &Path) -> Result<SnapshotManifest, MpdataError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let file = File::open(&manifest_path).map_err(|source| MpdataError::FileAccess {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest: SnapshotManifest = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| MpdataError::SnapshotManifest {
            path: manifest_path.clone(),
            source,
        })?;

    if manifest.version != SNAPSHOT_VERSION {
        return Err(MpdataError::Format {
            path: manifest_path,
            offset: None,
            message: format!(
                "unsupported snapshot version {} (expected {})",
                manifest.version, SNAPSHOT_VERSION
            ),
        });
    }
    Ok(manifest)
}

/// Restores the dataset stored in `dir`.
///
/// # Errors
/// [`MpdataError::Format`] if the entries file is corrupt or disagrees with
/// the manifest.
pub fn read_snapshot(dir: &Path) -> Result<Vec<DecodedEntry>, MpdataError> {
    let manifest = read_manifest(dir)?;
    let entries_path = dir.join(ENTRIES_FILE);

    let mut entries = Vec::new();
    for record in open_tfrecord_file(&entries_path)? {
        let (offset, bytes) = record?;
        let entry = from_proto(&bytes, &entries_path, offset)?;
        if let Some(shape) = manifest.shape {
            if entry.landmarks.shape() != shape {
                return Err(mismatch(
                    &entries_path,
                    Some(offset),
                    format!(
                        "entry shape {:?} differs from manifest shape {:?}",
                        entry.landmarks.shape(),
                        shape
                    ),
                ));
            }
        }
        entries.push(entry);
    }

    if entries.len() as u64 != manifest.entry_count {
        return Err(mismatch(
            &entries_path,
            None,
            format!(
                "found {} entries, manifest lists {}",
                entries.len(),
                manifest.entry_count
            ),
        ));
    }

    info!(dir = %dir.display(), entries = entries.len(), "restored dataset snapshot");
    Ok(entries)
}

fn common_shape(entries: &[DecodedEntry]) -> Result<Option<(usize, usize)>, MpdataError> {
    let Some(first) = entries.first() else {
        return Ok(None);
    };
    let shape = first.landmarks.shape();
    if let Some((i, entry)) = entries
        .iter()
        .enumerate()
        .find(|(_, e)| e.landmarks.shape() != shape)
    {
        return Err(MpdataError::shape(format!(
            "entry {} has shape {:?}, entry 0 has {:?}",
            i,
            entry.landmarks.shape(),
            shape
        )));
    }
    Ok(Some(shape))
}

fn to_proto(entry: &DecodedEntry) -> SnapshotEntry {
    let (rows, cols) = entry.landmarks.shape();
    SnapshotEntry {
        frame: entry.frame,
        rows: rows as u64,
        cols: cols as u64,
        values: entry.landmarks.as_slice().to_vec(),
        phrase: entry.phrase.clone(),
        context: entry.context.clone(),
    }
}

fn from_proto(bytes: &[u8], path: &Path, offset: u64) -> Result<DecodedEntry, MpdataError> {
    let proto = SnapshotEntry::decode(bytes)
        .map_err(|e| mismatch(path, Some(offset), format!("not a snapshot entry: {e}")))?;

    let rows = usize::try_from(proto.rows)
        .map_err(|_| mismatch(path, Some(offset), "row count too large"))?;
    let cols = usize::try_from(proto.cols)
        .map_err(|_| mismatch(path, Some(offset), "column count too large"))?;
    let landmarks = LandmarkMatrix::from_row_major(rows, cols, proto.values)
        .map_err(|e| mismatch(path, Some(offset), e.to_string()))?;

    Ok(DecodedEntry {
        frame: proto.frame,
        landmarks,
        phrase: proto.phrase,
        context: proto.context,
    })
}

fn mismatch(path: &Path, offset: Option<u64>, message: impl Into<String>) -> MpdataError {
    MpdataError::Format {
        path: PathBuf::from(path),
        offset,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(frame: i64, values: Vec<f32>, phrase: &str) -> DecodedEntry {
        DecodedEntry {
            frame,
            landmarks: LandmarkMatrix::from_row_major(2, 2, values).expect("shape"),
            phrase: phrase.as_bytes().to_vec(),
            context: b"ctx".to_vec(),
        }
    }

    #[test]
    fn roundtrip_is_exact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let snap = dir.path().join("snap");
        let entries = vec![
            entry(0, vec![0.1, f32::MIN_POSITIVE, -0.0, 1e30], "a"),
            entry(1, vec![f32::NAN, 2.0, 3.0, 4.0], "b"),
        ];

        let manifest = write_snapshot(&entries, &snap).expect("write");
        assert_eq!(manifest.entry_count, 2);
        assert_eq!(manifest.shape, Some((2, 2)));

        let restored = read_snapshot(&snap).expect("read");
        assert_eq!(restored.len(), 2);
        for (a, b) in entries.iter().zip(&restored) {
            assert_eq!(a.frame, b.frame);
            assert_eq!(a.phrase, b.phrase);
            assert_eq!(a.context, b.context);
            assert_eq!(a.landmarks.shape(), b.landmarks.shape());
            let bits_a: Vec<u32> = a.landmarks.as_slice().iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u32> = b.landmarks.as_slice().iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn empty_dataset_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = write_snapshot(&[], dir.path()).expect("write");
        assert_eq!(manifest.shape, None);
        assert!(read_snapshot(dir.path()).expect("read").is_empty());
    }

    #[test]
    fn mixed_shapes_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut odd = entry(1, vec![0.0; 4], "b");
        odd.landmarks = LandmarkMatrix::from_row_major(1, 4, vec![0.0; 4]).expect("shape");
        let err = write_snapshot(&[entry(0, vec![0.0; 4], "a"), odd], dir.path()).unwrap_err();
        assert!(matches!(err, MpdataError::Shape { .. }));
    }

    #[test]
    fn missing_manifest_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_snapshot(dir.path()).unwrap_err();
        assert!(matches!(err, MpdataError::FileAccess { .. }));
    }

    #[test]
    fn count_mismatch_is_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_snapshot(&[entry(0, vec![0.0; 4], "a")], dir.path()).expect("write");

        let manifest_path = dir.path().join(MANIFEST_FILE);
        let text = fs::read_to_string(&manifest_path).expect("read manifest");
        fs::write(
            &manifest_path,
            text.replace("\"entry_count\": 1", "\"entry_count\": 2"),
        )
        .expect("rewrite manifest");

        let err = read_snapshot(dir.path()).unwrap_err();
        assert!(err.to_string().contains("manifest lists 2"));
    }

    #[test]
    fn huge_manifest_count_is_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_snapshot(&[], dir.path()).expect("write");

        let manifest_path = dir.path().join(MANIFEST_FILE);
        let text = fs::read_to_string(&manifest_path).expect("read manifest");
        fs::write(
            &manifest_path,
            text.replace(
                "\"entry_count\": 0",
                &format!("\"entry_count\": {}", u64::MAX),
            ),
        )
        .expect("rewrite manifest");

        let err = read_snapshot(dir.path()).unwrap_err();
        assert!(matches!(err, MpdataError::Format { .. }));
        assert!(err.to_string().contains("manifest lists"));
    }
}
