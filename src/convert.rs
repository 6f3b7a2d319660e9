//! CSV to binary record conversion.
//!
//! [`CsvRecordConverter`] turns tabular landmark exports into the serialized
//! record stream the reader decodes. Every row of every file becomes one
//! record, in file order then row order. The `frame`, `phrase` and `context`
//! columns are the record's metadata; every other column, in file order, is
//! a landmark value cast to `f32`.
//!
//! The stream is lazy: each CSV file is read when the stream reaches it and
//! dropped when its last row has been encoded. A stream can be consumed
//! once; convert the same file list again to restart.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::MpdataError;
use crate::record::codec::{self, LandmarkInput, CONTEXT_KEY, FRAME_KEY, PHRASE_KEY};
use crate::tabular::{read_table, CellValue, Table, TextEncoding};

/// Columns that are metadata rather than landmark values.
pub const METADATA_COLUMNS: [&str; 3] = [FRAME_KEY, PHRASE_KEY, CONTEXT_KEY];

/// Converts CSV landmark files to serialized records.
#[derive(Clone, Debug, Default)]
pub struct CsvRecordConverter {
    encoding: TextEncoding,
}

impl CsvRecordConverter {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Lazily converts `files`, in order.
    pub fn record_stream(&self, files: &[PathBuf]) -> RecordStream {
        RecordStream {
            encoding: self.encoding,
            pending: files.to_vec().into_iter(),
            current: None,
        }
    }

    /// Converts every row of one already-loaded table.
    pub fn convert_table(&self, table: &Table) -> Result<Vec<Vec<u8>>, MpdataError> {
        let layout = TableLayout::from_table(table)?;
        (0..table.len())
            .map(|row| layout.encode_row(table, row))
            .collect()
    }
}

/// Serialized records produced from a list of CSV files.
///
/// Yields `(source path, record bytes)`; the first error ends the stream.
pub struct RecordStream {
    encoding: TextEncoding,
    pending: std::vec::IntoIter<PathBuf>,
    current: Option<OpenTable>,
}

struct OpenTable {
    table: Table,
    layout: TableLayout,
    next_row: usize,
}

impl RecordStream {
    fn open_next(&mut self) -> Option<Result<(), MpdataError>> {
        let path = self.pending.next()?;
        debug!(path = %path.display(), "converting CSV file");
        let opened = read_table(&path, self.encoding).and_then(|table| {
            let layout = TableLayout::from_table(&table)?;
            if table.is_empty() {
                warn!(path = %path.display(), "CSV file has no data rows");
            }
            Ok(OpenTable {
                table,
                layout,
                next_row: 0,
            })
        });
        Some(opened.map(|open| {
            self.current = Some(open);
        }))
    }

    fn fail(&mut self, err: MpdataError) -> Option<Result<(PathBuf, Vec<u8>), MpdataError>> {
        self.pending = Vec::new().into_iter();
        self.current = None;
        Some(Err(err))
    }
}

impl Iterator for RecordStream {
    type Item = Result<(PathBuf, Vec<u8>), MpdataError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(open) = self.current.as_mut() {
                if open.next_row < open.table.len() {
                    let row = open.next_row;
                    open.next_row += 1;
                    let encoded = open.layout.encode_row(&open.table, row);
                    let path = open.table.path().to_path_buf();
                    return match encoded {
                        Ok(bytes) => Some(Ok((path, bytes))),
                        Err(e) => self.fail(e),
                    };
                }
                self.current = None;
            }

            match self.open_next()? {
                Ok(()) => continue,
                Err(e) => return self.fail(e),
            }
        }
    }
}

/// Column positions of one table.
struct TableLayout {
    frame: usize,
    phrase: usize,
    context: usize,
    landmarks: Vec<usize>,
}

impl TableLayout {
    fn from_table(table: &Table) -> Result<Self, MpdataError> {
        let require = |name: &str| {
            table.column_index(name).ok_or_else(|| MpdataError::Format {
                path: table.path().to_path_buf(),
                offset: None,
                message: format!("missing required column '{name}'"),
            })
        };

        let landmarks = table
            .headers()
            .iter()
            .enumerate()
            .filter(|(_, h)| !METADATA_COLUMNS.contains(&h.as_str()))
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            frame: require(FRAME_KEY)?,
            phrase: require(PHRASE_KEY)?,
            context: require(CONTEXT_KEY)?,
            landmarks,
        })
    }

    fn encode_row(&self, table: &Table, row: usize) -> Result<Vec<u8>, MpdataError> {
        let cells: Vec<&str> = table
            .row(row)
            .map(|r| r.iter().map(|(_, cell)| cell).collect())
            .unwrap_or_default();
        let raw = |i: usize| cells.get(i).copied().unwrap_or("");
        let cell = |i: usize| CellValue::parse(raw(i));

        let frame = match cell(self.frame) {
            CellValue::Integer(v) => v,
            other => {
                return Err(row_error(
                    table.path(),
                    row,
                    FRAME_KEY,
                    format!("expected an integer frame, found {}", other.type_name()),
                ))
            }
        };

        let landmark: Vec<CellValue<'_>> = self.landmarks.iter().map(|&i| cell(i)).collect();

        codec::encode(
            frame,
            LandmarkInput::Cells(&landmark),
            &label_cell(raw(self.phrase)),
            &label_cell(raw(self.context)),
        )
        .map_err(|e| match e {
            MpdataError::TypeConversion { field, message } => {
                row_error(table.path(), row, &field, message)
            }
            other => other,
        })
    }
}

// Label cells keep their CSV text verbatim. Only empty cells and NaN markers
// are passed on typed, so label coercion rejects them.
fn label_cell(raw: &str) -> CellValue<'_> {
    match CellValue::parse(raw) {
        CellValue::Empty => CellValue::Empty,
        CellValue::Float(v) if v.is_nan() => CellValue::Float(v),
        _ => CellValue::Text(raw),
    }
}

fn row_error(path: &Path, row: usize, field: &str, message: String) -> MpdataError {
    MpdataError::TypeConversion {
        field: field.to_string(),
        message: format!("{} row {}: {}", path.display(), row + 1, message),
    }
}
