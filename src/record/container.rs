//! TFRecord container framing.
//!
//! A TFRecord file is a plain concatenation of frames:
//!
//! ```text
//! u64  length          (little endian)
//! u32  masked_crc32c(length bytes)
//! [u8] payload         (length bytes)
//! u32  masked_crc32c(payload)
//! ```
//!
//! Both checksums are verified on read. A clean end of input between two
//! frames ends the stream; anything else (short header, short payload, bad
//! checksum) is a [`MpdataError::Format`] carrying the byte offset of the
//! frame.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::MpdataError;

const MASK_DELTA: u32 = 0xa282_ead8;
const HEADER_LEN: usize = 12;
const FOOTER_LEN: usize = 4;

/// CRC32C rotated and offset the way TFRecord stores it.
pub fn masked_crc32c(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Appends one framed record to `out`.
pub fn frame_record(out: &mut Vec<u8>, payload: &[u8]) {
    let len = (payload.len() as u64).to_le_bytes();
    out.reserve(HEADER_LEN + payload.len() + FOOTER_LEN);
    out.extend_from_slice(&len);
    out.extend_from_slice(&masked_crc32c(&len).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&masked_crc32c(payload).to_le_bytes());
}

/// Writes framed records to any sink.
pub struct TfRecordWriter<W: Write> {
    inner: W,
    frame: Vec<u8>,
    written: u64,
}

impl<W: Write> TfRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frame: Vec::new(),
            written: 0,
        }
    }

    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        self.frame.clear();
        frame_record(&mut self.frame, payload);
        self.inner.write_all(&self.frame)?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads framed records from any source.
///
/// Iterating yields each payload together with the byte offset of its
/// frame. After the first error the reader is fused and yields nothing more.
pub struct TfRecordReader<R: Read> {
    inner: R,
    path: PathBuf,
    offset: u64,
    done: bool,
}

impl<R: Read> TfRecordReader<R> {
    /// `path` is only used to label errors.
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            offset: 0,
            done: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format_err(&self, offset: u64, message: impl Into<String>) -> MpdataError {
        MpdataError::Format {
            path: self.path.clone(),
            offset: Some(offset),
            message: message.into(),
        }
    }

    /// Reads the next payload, `Ok(None)` at a clean end of input.
    pub fn read_record(&mut self) -> Result<Option<(u64, Vec<u8>)>, MpdataError> {
        let start = self.offset;

        let mut header = [0u8; HEADER_LEN];
        let got = read_full(&mut self.inner, &mut header).map_err(|source| {
            MpdataError::FileAccess {
                path: self.path.clone(),
                source,
            }
        })?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(self.format_err(start, "truncated record header"));
        }

        let (len_bytes, crc_bytes) = header.split_at(8);
        let len_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if masked_crc32c(len_bytes) != len_crc {
            return Err(self.format_err(start, "length checksum mismatch"));
        }

        let mut len_arr = [0u8; 8];
        len_arr.copy_from_slice(len_bytes);
        let len = u64::from_le_bytes(len_arr);
        let len = usize::try_from(len)
            .map_err(|_| self.format_err(start, format!("record length {len} too large")))?;

        let mut payload = Vec::new();
        let got = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut payload)
            .map_err(|source| MpdataError::FileAccess {
                path: self.path.clone(),
                source,
            })?;
        if got < len {
            return Err(self.format_err(
                start,
                format!("truncated record payload ({got} of {len} bytes)"),
            ));
        }

        let mut footer = [0u8; FOOTER_LEN];
        let got = read_full(&mut self.inner, &mut footer).map_err(|source| {
            MpdataError::FileAccess {
                path: self.path.clone(),
                source,
            }
        })?;
        if got < FOOTER_LEN {
            return Err(self.format_err(start, "truncated record checksum"));
        }
        if masked_crc32c(&payload) != u32::from_le_bytes(footer) {
            return Err(self.format_err(start, "payload checksum mismatch"));
        }

        self.offset = start + (HEADER_LEN + len + FOOTER_LEN) as u64;
        Ok(Some((start, payload)))
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<(u64, Vec<u8>), MpdataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Opens a TFRecord file for streaming reads.
pub fn open_tfrecord_file(path: &Path) -> Result<TfRecordReader<BufReader<File>>, MpdataError> {
    let file = File::open(path).map_err(|source| MpdataError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(TfRecordReader::new(BufReader::new(file), path))
}

/// Writes every payload from `records` to a new TFRecord file.
///
/// Returns the number of records written. Stops at the first error coming
/// out of `records`; the partially written file is left in place.
pub fn write_tfrecord_file<I>(path: &Path, records: I) -> Result<u64, MpdataError>
where
    I: IntoIterator<Item = Result<Vec<u8>, MpdataError>>,
{
    let file = File::create(path).map_err(|source| MpdataError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = TfRecordWriter::new(BufWriter::new(file));

    for record in records {
        let payload = record?;
        writer
            .write_record(&payload)
            .map_err(|source| MpdataError::FileAccess {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let count = writer.records_written();
    writer.into_inner().map_err(|source| MpdataError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(count)
}

/// Splits an in-memory TFRecord buffer into payloads.
///
/// Useful for fuzzing and tests without file I/O.
pub fn read_tfrecord_slice(bytes: &[u8]) -> Result<Vec<Vec<u8>>, MpdataError> {
    TfRecordReader::new(bytes, "<bytes>")
        .map(|r| r.map(|(_, payload)| payload))
        .collect()
}

// Like read_exact, but reports how many bytes arrived before EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payloads: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for p in payloads {
            frame_record(&mut out, p);
        }
        out
    }

    #[test]
    fn known_masked_crc() {
        // crc32c("123456789") is 0xe3069283
        assert_eq!(masked_crc32c(b"123456789"), 0xc78a_b0e5);
        assert_eq!(masked_crc32c(&0u64.to_le_bytes()), 0x0798_0329);
        assert_eq!(masked_crc32c(b""), 0xa282_ead8);
    }

    #[test]
    fn reads_back_framed_records() {
        let bytes = framed(&[b"one", b"", b"three"]);
        let records = read_tfrecord_slice(&bytes).expect("read");
        assert_eq!(records, vec![b"one".to_vec(), vec![], b"three".to_vec()]);
    }

    #[test]
    fn reports_offsets() {
        let bytes = framed(&[b"ab", b"cde"]);
        let offsets: Vec<u64> = TfRecordReader::new(&bytes[..], "<bytes>")
            .map(|r| r.expect("record").0)
            .collect();
        assert_eq!(offsets, vec![0, 18]);
    }

    #[test]
    fn writer_matches_frame_record() {
        let mut writer = TfRecordWriter::new(Vec::new());
        writer.write_record(b"payload").expect("write");
        assert_eq!(writer.records_written(), 1);
        let out = writer.into_inner().expect("flush");
        assert_eq!(out, framed(&[b"payload"]));
    }

    #[test]
    fn corrupted_payload_is_format_error() {
        let mut bytes = framed(&[b"ok", b"bad"]);
        let last_payload_byte = bytes.len() - FOOTER_LEN - 1;
        bytes[last_payload_byte] ^= 0xff;

        let err = read_tfrecord_slice(&bytes).unwrap_err();
        match err {
            MpdataError::Format {
                offset, message, ..
            } => {
                assert_eq!(offset, Some(18));
                assert!(message.contains("payload checksum"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn truncated_input_is_format_error() {
        let bytes = framed(&[b"hello"]);
        for cut in [1, HEADER_LEN, HEADER_LEN + 2, bytes.len() - 1] {
            let err = read_tfrecord_slice(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, MpdataError::Format { .. }), "cut at {cut}");
        }
    }

    #[test]
    fn reader_is_fused_after_error() {
        let bytes = framed(&[b"x"]);
        let mut reader = TfRecordReader::new(&bytes[..5], "<bytes>");
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tfrecord");
        let payloads = vec![Ok(b"a".to_vec()), Ok(b"bb".to_vec())];

        let count = write_tfrecord_file(&path, payloads).expect("write");
        assert_eq!(count, 2);

        let records: Vec<_> = open_tfrecord_file(&path)
            .expect("open")
            .map(|r| r.expect("record").1)
            .collect();
        assert_eq!(records, vec![b"a".to_vec(), b"bb".to_vec()]);
    }
}
