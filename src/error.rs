use std::path::PathBuf;
use thiserror::Error;

/// The main error type for mpdata operations.
#[derive(Debug, Error)]
pub enum MpdataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad or missing path, bad format string, empty corpus, bad index.
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path} as {encoding}: {message}")]
    Decode {
        path: PathBuf,
        encoding: String,
        message: String,
    },

    #[error("Failed to parse CSV from {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed record in {}{}: {message}", .path.display(), offset_suffix(.offset))]
    Format {
        path: PathBuf,
        offset: Option<u64>,
        message: String,
    },

    #[error("Shape error: {message}")]
    Shape { message: String },

    #[error("Cannot convert field '{field}': {message}")]
    TypeConversion { field: String, message: String },

    #[error("Failed to parse feature config {path}: {message}")]
    ConfigFileParse { path: PathBuf, message: String },

    #[error("Failed to read or write snapshot manifest {path}: {source}")]
    SnapshotManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl MpdataError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        MpdataError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        MpdataError::Shape {
            message: message.into(),
        }
    }
}

fn offset_suffix(offset: &Option<u64>) -> String {
    match offset {
        Some(offset) => format!(" at byte {offset}"),
        None => String::new(),
    }
}
