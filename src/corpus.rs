//! Corpus resolution.
//!
//! Turns the caller's input parameters (an explicit file, a directory, a
//! declared format and an optional index) into the concrete, immutable list
//! of files one reader session works on.
//!
//! # Resolution order
//!
//! 1. The format string must mention `csv` or `tfrecord`.
//! 2. An explicit file that exists is the whole corpus.
//! 3. Otherwise the directory is scanned (non-recursively) for `*.csv` or
//!    `*.tfrecord` files. The listing is sorted by path so the same
//!    directory always resolves to the same order.
//! 4. With an index, only the file at that position of the sorted listing
//!    is kept.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::MpdataError;

/// Declared on-disk format of a corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Delimited text, converted to records on the fly.
    Csv,
    /// TFRecord files of serialized examples.
    TfRecord,
}

impl InputFormat {
    /// Parses a format flag. Any string containing `csv` is CSV; otherwise
    /// any string containing `tfrecord` is TFRecord. ASCII case is ignored.
    pub fn parse(flag: &str) -> Result<Self, MpdataError> {
        let lowered = flag.to_ascii_lowercase();
        if lowered.contains("csv") {
            Ok(InputFormat::Csv)
        } else if lowered.contains("tfrecord") {
            Ok(InputFormat::TfRecord)
        } else {
            Err(MpdataError::config(format!(
                "provide valid file format: '{}' (supported: csv, tfrecord)",
                flag
            )))
        }
    }

    /// File extension matched when scanning a directory.
    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Csv => "csv",
            InputFormat::TfRecord => "tfrecord",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the file list was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    ExplicitFile,
    DirectoryAll,
    DirectoryIndexed(usize),
}

/// Caller-supplied corpus parameters.
#[derive(Clone, Debug, Default)]
pub struct CorpusRequest {
    pub input_file: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub format: String,
    pub index: Option<usize>,
}

impl CorpusRequest {
    pub fn file(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            input_file: Some(path.into()),
            format: format.into(),
            ..Default::default()
        }
    }

    pub fn dir(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            input_dir: Some(path.into()),
            format: format.into(),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// The resolved, immutable corpus of one reader session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusDescriptor {
    files: Vec<PathBuf>,
    format: InputFormat,
    selection: Selection,
    search_dir: PathBuf,
}

impl CorpusDescriptor {
    /// Resolved files, in read order. Never empty.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Directory the corpus was found in (the parent of an explicit file).
    pub fn search_dir(&self) -> &Path {
        &self.search_dir
    }
}

/// Resolves a request into a corpus.
///
/// # Errors
/// [`MpdataError::Config`] for an invalid format string, a missing path,
/// a directory without matching files, or an out-of-range index.
pub fn resolve(request: &CorpusRequest) -> Result<CorpusDescriptor, MpdataError> {
    let format = InputFormat::parse(&request.format)?;

    if let Some(file) = request.input_file.as_deref().filter(|p| p.is_file()) {
        let search_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        info!(path = %file.display(), %format, "resolved single-file corpus");
        return Ok(CorpusDescriptor {
            files: vec![file.to_path_buf()],
            format,
            selection: Selection::ExplicitFile,
            search_dir,
        });
    }

    let Some(dir) = request.input_dir.as_deref() else {
        return Err(match &request.input_file {
            Some(file) => MpdataError::config(format!("path {} does not exist", file.display())),
            None => MpdataError::config("no input file or directory provided"),
        });
    };

    if !dir.is_dir() {
        return Err(MpdataError::config(format!(
            "path {} does not exist",
            dir.display()
        )));
    }

    let mut files = list_files(dir, format.extension())?;
    if files.is_empty() {
        return Err(MpdataError::config(format!(
            "no files found matching *.{} in {}",
            format.extension(),
            dir.display()
        )));
    }
    files.sort();

    let selection = match request.index {
        Some(index) => {
            let count = files.len();
            if index >= count {
                return Err(MpdataError::config(format!(
                    "file index {} out of range ({} file(s) in {})",
                    index,
                    count,
                    dir.display()
                )));
            }
            files = vec![files.swap_remove(index)];
            Selection::DirectoryIndexed(index)
        }
        None => Selection::DirectoryAll,
    };

    info!(dir = %dir.display(), files = files.len(), %format, "resolved directory corpus");

    Ok(CorpusDescriptor {
        files,
        format,
        selection,
        search_dir: dir.to_path_buf(),
    })
}

fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, MpdataError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|source| MpdataError::FileAccess {
            path: dir.to_path_buf(),
            source: source.into(),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            files.push(entry.path().to_path_buf());
        }
    }

    debug!(dir = %dir.display(), count = files.len(), "listed corpus directory");
    Ok(files)
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == wanted)
}
