//! Tabular source reader.
//!
//! Reads a delimited text file (header row + data rows) into an in-memory
//! [`Table`]. The file is decoded with an explicit [`TextEncoding`] before
//! CSV parsing, so Latin-1 exports from capture tools load without loss.
//!
//! No schema validation happens here: columns are taken as given. Cells are
//! kept as text and typed on access through [`CellValue`], which mirrors the
//! numeric inference a dataframe library would apply.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::MpdataError;

/// Character encodings accepted for tabular input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    #[default]
    Latin1,
}

impl TextEncoding {
    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "iso-8859-1",
        }
    }

    fn decode(&self, bytes: Vec<u8>, path: &Path) -> Result<String, MpdataError> {
        match self {
            TextEncoding::Utf8 => {
                let text = String::from_utf8(bytes).map_err(|e| MpdataError::Decode {
                    path: path.to_path_buf(),
                    encoding: self.name().to_string(),
                    message: e.to_string(),
                })?;
                Ok(match text.strip_prefix('\u{feff}') {
                    Some(stripped) => stripped.to_string(),
                    None => text,
                })
            }
            // Every byte maps to the code point of the same value.
            TextEncoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = MpdataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "" | "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => {
                Ok(TextEncoding::Latin1)
            }
            other => Err(MpdataError::config(format!(
                "unsupported encoding '{}' (supported: utf-8, iso-8859-1)",
                other
            ))),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed view of one cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue<'a> {
    Empty,
    Integer(i64),
    Float(f64),
    Text(&'a str),
}

impl<'a> CellValue<'a> {
    /// Infers the type of a raw cell.
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return CellValue::Integer(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            return CellValue::Float(v);
        }
        CellValue::Text(raw)
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::Text(_) => "text",
        }
    }
}

/// A fully materialized delimited text file.
#[derive(Clone, Debug)]
pub struct Table {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Source path (or a placeholder for in-memory tables).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Row `index`, if present.
    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            headers: &self.headers,
            cells,
        })
    }

    /// Rows in file order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row {
            headers: &self.headers,
            cells,
        })
    }
}

/// One row: an ordered mapping of column name to cell.
#[derive(Clone, Copy, Debug)]
pub struct Row<'a> {
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Raw cell text for a column.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.cells.get(idx).map(String::as_str)
    }

    /// Typed cell for a column.
    pub fn value(&self, column: &str) -> Option<CellValue<'a>> {
        self.get(column).map(CellValue::parse)
    }

    /// `(column, raw cell)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(String::as_str))
    }
}

/// Reads a delimited text file in the given encoding.
///
/// # Errors
/// [`MpdataError::FileAccess`] if the file cannot be opened,
/// [`MpdataError::Decode`] if it is not valid in `encoding`, and
/// [`MpdataError::CsvParse`] if the text is not well-formed CSV.
pub fn read_table(path: &Path, encoding: TextEncoding) -> Result<Table, MpdataError> {
    let bytes = fs::read(path).map_err(|source| MpdataError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let text = encoding.decode(bytes, path)?;
    parse_table(&text, path)
}

/// Parses CSV text that is already decoded.
///
/// Useful for testing without file I/O.
pub fn from_csv_str(text: &str) -> Result<Table, MpdataError> {
    parse_table(text, Path::new("<string>"))
}

/// Fuzz-only entrypoint for decoding raw bytes and parsing them as a table.
#[cfg(feature = "fuzzing")]
pub fn fuzz_read_table_bytes(bytes: &[u8], encoding: TextEncoding) -> Result<Table, MpdataError> {
    let path = Path::new("<fuzz>");
    let text = encoding.decode(bytes.to_vec(), path)?;
    parse_table(&text, path)
}

fn parse_table(text: &str, path: &Path) -> Result<Table, MpdataError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let csv_err = |source| MpdataError::CsvParse {
        path: path.to_path_buf(),
        source,
    };

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_rows_in_order() {
        let table = from_csv_str("frame,phrase,context,x0\n0,hello,ctx,0.5\n1,bye,ctx,0.25\n")
            .expect("parse failed");

        assert_eq!(table.headers(), ["frame", "phrase", "context", "x0"]);
        assert_eq!(table.len(), 2);

        let row = table.row(1).expect("second row");
        assert_eq!(row.get("phrase"), Some("bye"));
        assert_eq!(row.value("frame"), Some(CellValue::Integer(1)));
        assert_eq!(row.value("x0"), Some(CellValue::Float(0.25)));
        assert_eq!(row.get("missing"), None);

        let pairs: Vec<_> = row.iter().collect();
        assert_eq!(pairs[0], ("frame", "1"));
        assert_eq!(pairs[3], ("x0", "0.25"));
    }

    #[test]
    fn cell_type_inference() {
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(CellValue::parse("  "), CellValue::Empty);
        assert_eq!(CellValue::parse("42"), CellValue::Integer(42));
        assert_eq!(CellValue::parse("-1.5e2"), CellValue::Float(-150.0));
        assert_eq!(CellValue::parse("hello"), CellValue::Text("hello"));
    }

    #[test]
    fn latin1_decoding_keeps_accents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("latin.csv");
        // "café" with é as the single byte 0xE9
        fs::write(&path, b"frame,phrase,context\n0,caf\xe9,x\n").expect("write");

        let table = read_table(&path, TextEncoding::Latin1).expect("read latin1");
        assert_eq!(table.row(0).and_then(|r| r.get("phrase")), Some("café"));

        let err = read_table(&path, TextEncoding::Utf8).unwrap_err();
        assert!(matches!(err, MpdataError::Decode { .. }));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}frame,phrase\n3,hi\n").expect("write");

        let table = read_table(&path, TextEncoding::Utf8).expect("read utf8");
        assert_eq!(table.column_index("frame"), Some(0));
    }

    #[test]
    fn missing_file_is_file_access_error() {
        let err = read_table(Path::new("does/not/exist.csv"), TextEncoding::Latin1).unwrap_err();
        match err {
            MpdataError::FileAccess { path, .. } => {
                assert!(path.ends_with("exist.csv"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn encoding_names() {
        assert_eq!("ISO-8859-1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert_eq!("UTF8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert!("shift_jis".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn ragged_rows_are_csv_errors() {
        let err = from_csv_str("a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, MpdataError::CsvParse { .. }));
    }
}
