//! Dataset reader session.
//!
//! [`DatasetReader`] is the one entry point visualization code needs: it
//! owns a resolved corpus, the active [`FeatureSchema`], and (for CSV
//! corpora) a [`CsvRecordConverter`]. Both input formats go through the
//! same decode path; CSV rows are converted to serialized records in memory
//! first, without writing a temporary file.
//!
//! Entries come out in file order then row order. File handles are opened
//! one at a time as iteration reaches each file and are closed when the
//! iterator moves past it, hits an error, or is dropped.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::FeatureSchema;
use crate::convert::{CsvRecordConverter, RecordStream};
use crate::corpus::{self, CorpusDescriptor, CorpusRequest, InputFormat};
use crate::error::MpdataError;
use crate::record::codec::{decode_entry_at, Origin};
use crate::record::container::{open_tfrecord_file, TfRecordReader};
use crate::record::DecodedEntry;
use crate::snapshot;
use crate::tabular::TextEncoding;

/// One serialized record and where it came from.
#[derive(Clone, Debug)]
pub struct RawRecord {
    pub path: PathBuf,
    /// Byte offset of the frame inside a TFRecord file; `None` for records
    /// converted from CSV.
    pub offset: Option<u64>,
    pub bytes: Vec<u8>,
}

/// A reader session over one corpus.
#[derive(Debug)]
pub struct DatasetReader {
    corpus: CorpusDescriptor,
    schema: FeatureSchema,
    encoding: TextEncoding,
    converter: Option<CsvRecordConverter>,
}

impl DatasetReader {
    /// Resolves `request` and opens a session on it.
    pub fn open(
        request: &CorpusRequest,
        schema: FeatureSchema,
        encoding: TextEncoding,
    ) -> Result<Self, MpdataError> {
        schema.validate()?;
        let corpus = corpus::resolve(request)?;
        Ok(Self::from_corpus(corpus, schema, encoding))
    }

    /// Opens a session on an already resolved corpus.
    pub fn from_corpus(
        corpus: CorpusDescriptor,
        schema: FeatureSchema,
        encoding: TextEncoding,
    ) -> Self {
        let converter = match corpus.format() {
            InputFormat::Csv => Some(CsvRecordConverter::new(encoding)),
            InputFormat::TfRecord => None,
        };
        Self {
            corpus,
            schema,
            encoding,
            converter,
        }
    }

    pub fn corpus(&self) -> &CorpusDescriptor {
        &self.corpus
    }

    /// Resolved input files.
    pub fn files(&self) -> &[PathBuf] {
        self.corpus.files()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Whether CSV input is converted on the fly.
    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Changes the landmark shape for subsequent reads. Iterators that were
    /// already created keep the shape they started with.
    ///
    /// # Errors
    /// [`MpdataError::Config`] for a zero-sized shape; the current shape is
    /// kept.
    pub fn set_shape(&mut self, num_features: usize, channels: usize) -> Result<(), MpdataError> {
        let schema = FeatureSchema {
            num_features,
            channels,
            feature_columns: self.schema.feature_columns.clone(),
        };
        schema.validate()?;
        self.schema = schema;
        Ok(())
    }

    /// Replaces the named feature columns for subsequent reads.
    pub fn set_feature_columns(&mut self, columns: Vec<String>) {
        self.schema.feature_columns = columns;
    }

    /// Points the session at one explicit file of the same format.
    pub fn set_input_file(&mut self, path: &Path) -> Result<(), MpdataError> {
        let request = CorpusRequest::file(path, self.corpus.format().extension());
        let corpus = corpus::resolve(&request)?;
        *self = Self::from_corpus(corpus, self.schema.clone(), self.encoding);
        Ok(())
    }

    /// Points the session at every file of the same format in `dir`.
    pub fn set_input_dir(&mut self, dir: &Path) -> Result<(), MpdataError> {
        let request = CorpusRequest::dir(dir, self.corpus.format().extension());
        let corpus = corpus::resolve(&request)?;
        *self = Self::from_corpus(corpus, self.schema.clone(), self.encoding);
        Ok(())
    }

    /// Serialized records from `files`, in order.
    pub fn raw_records(&self, files: &[PathBuf]) -> RawRecords {
        let source = match &self.converter {
            Some(converter) => RawSource::Converted(converter.record_stream(files)),
            None => RawSource::Files(TfRecordFiles {
                pending: files.to_vec().into_iter(),
                current: None,
            }),
        };
        RawRecords { source }
    }

    /// Lazily decodes every record in `files`.
    pub fn get_dataset(&self, files: &[PathBuf]) -> DatasetIter {
        DatasetIter {
            raw: self.raw_records(files),
            schema: self.schema.clone(),
            landmark_len: None,
            done: false,
        }
    }

    /// Lazily decodes the whole corpus.
    pub fn dataset(&self) -> DatasetIter {
        self.get_dataset(self.corpus.files())
    }

    /// Decodes every record in `files` into memory.
    ///
    /// Records are read sequentially and decoded in parallel; the result is
    /// in the same order [`DatasetReader::get_dataset`] would produce, and
    /// so is the error: the earliest failing record wins.
    pub fn load_dataset(&self, files: &[PathBuf]) -> Result<Vec<DecodedEntry>, MpdataError> {
        let mut raw = Vec::new();
        let mut read_error = None;
        for record in self.raw_records(files) {
            match record {
                Ok(record) => raw.push(record),
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }
        debug!(records = raw.len(), "decoding records in parallel");

        let schema = &self.schema;
        let decoded: Vec<Result<(DecodedEntry, Option<usize>), MpdataError>> = raw
            .par_iter()
            .map(|record| decode_entry_at(&record.bytes, schema, record.origin()))
            .collect();

        let mut landmark_len = None;
        let mut entries = Vec::with_capacity(decoded.len());
        for (result, record) in decoded.into_iter().zip(&raw) {
            let (entry, len) = result?;
            check_landmark_len(&mut landmark_len, len, record.origin())?;
            entries.push(entry);
        }
        if let Some(e) = read_error {
            return Err(e);
        }

        info!(entries = entries.len(), "loaded dataset");
        Ok(entries)
    }

    /// Writes a materialized dataset to `dir`.
    pub fn snapshot(&self, dataset: &[DecodedEntry], dir: &Path) -> Result<(), MpdataError> {
        snapshot::write_snapshot(dataset, dir).map(|_| ())
    }

    /// Reloads a dataset written by [`DatasetReader::snapshot`].
    pub fn restore(&self, dir: &Path) -> Result<Vec<DecodedEntry>, MpdataError> {
        snapshot::read_snapshot(dir)
    }

    /// Ends the session, releasing the converter.
    pub fn close(self) {
        debug!(files = self.corpus.files().len(), "closing reader session");
    }
}

impl RawRecord {
    fn origin(&self) -> Origin<'_> {
        Origin {
            path: &self.path,
            offset: self.offset,
        }
    }
}

/// Serialized records of one pass over a corpus.
pub struct RawRecords {
    source: RawSource,
}

enum RawSource {
    Converted(RecordStream),
    Files(TfRecordFiles),
}

impl Iterator for RawRecords {
    type Item = Result<RawRecord, MpdataError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            RawSource::Converted(stream) => Some(stream.next()?.map(|(path, bytes)| RawRecord {
                path,
                offset: None,
                bytes,
            })),
            RawSource::Files(files) => files.next(),
        }
    }
}

struct TfRecordFiles {
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<TfRecordReader<BufReader<File>>>,
}

impl Iterator for TfRecordFiles {
    type Item = Result<RawRecord, MpdataError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(reader) = self.current.as_mut() {
                match reader.next() {
                    Some(Ok((offset, bytes))) => {
                        return Some(Ok(RawRecord {
                            path: reader.path().to_path_buf(),
                            offset: Some(offset),
                            bytes,
                        }))
                    }
                    Some(Err(e)) => {
                        self.stop();
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }

            let path = self.pending.next()?;
            debug!(path = %path.display(), "opening TFRecord file");
            match open_tfrecord_file(&path) {
                Ok(reader) => self.current = Some(reader),
                Err(e) => {
                    self.stop();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl TfRecordFiles {
    fn stop(&mut self) {
        self.current = None;
        self.pending = Vec::new().into_iter();
    }
}

/// Decoded entries of one pass over a corpus.
///
/// The first error ends the pass.
pub struct DatasetIter {
    raw: RawRecords,
    schema: FeatureSchema,
    landmark_len: Option<usize>,
    done: bool,
}

impl DatasetIter {
    /// Shape every entry of this pass will have.
    pub fn entry_shape(&self) -> (usize, usize) {
        (self.schema.column_count(), self.schema.channels)
    }

    fn decode(&mut self, record: RawRecord) -> Result<DecodedEntry, MpdataError> {
        let (entry, len) = decode_entry_at(&record.bytes, &self.schema, record.origin())?;
        check_landmark_len(&mut self.landmark_len, len, record.origin())?;
        Ok(entry)
    }
}

impl Iterator for DatasetIter {
    type Item = Result<DecodedEntry, MpdataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.raw.next()? {
            Ok(record) => self.decode(record),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

fn check_landmark_len(
    expected: &mut Option<usize>,
    found: Option<usize>,
    origin: Origin<'_>,
) -> Result<(), MpdataError> {
    let Some(found) = found else {
        return Ok(());
    };
    match *expected {
        None => {
            *expected = Some(found);
            Ok(())
        }
        Some(len) if len == found => Ok(()),
        Some(len) => Err(MpdataError::shape(format!(
            "{}{}: landmark has {} values but earlier records have {}",
            origin.path.display(),
            origin
                .offset
                .map(|o| format!(" at byte {o}"))
                .unwrap_or_default(),
            found,
            len
        ))),
    }
}
