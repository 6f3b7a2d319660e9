//! Record and tensor types shared by the codec, the reader and snapshots.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::MpdataError;

/// One captured frame as stored in a binary record.
///
/// `landmark` is flattened feature-then-channel: point 0's channels come
/// first, then point 1's, and so on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub frame: i64,
    pub landmark: Vec<f32>,
    pub phrase: String,
    pub context: String,
}

impl LandmarkRecord {
    pub fn new(
        frame: i64,
        landmark: Vec<f32>,
        phrase: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            frame,
            landmark,
            phrase: phrase.into(),
            context: context.into(),
        }
    }
}

/// A dense row-major `f32` matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl LandmarkMatrix {
    /// Wraps row-major values.
    ///
    /// # Errors
    /// [`MpdataError::Shape`] if `values.len() != rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self, MpdataError> {
        if values.len() != rows * cols {
            return Err(MpdataError::shape(format!(
                "cannot shape {} values as ({}, {})",
                values.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Stacks equal-length vectors as the columns of a new matrix.
    ///
    /// `n` columns of height `h` give an `(h, n)` matrix.
    pub fn stack_columns(columns: &[Vec<f32>], height: usize) -> Result<Self, MpdataError> {
        let cols = columns.len();
        let mut values = vec![0.0; height * cols];
        for (c, column) in columns.iter().enumerate() {
            if column.len() != height {
                return Err(MpdataError::shape(format!(
                    "column {} has {} values, expected {}",
                    c,
                    column.len(),
                    height
                )));
            }
            for (r, v) in column.iter().enumerate() {
                values[r * cols + c] = *v;
            }
        }
        Ok(Self {
            rows: height,
            cols,
            values,
        })
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row < self.rows {
            Some(&self.values[row * self.cols..(row + 1) * self.cols])
        } else {
            None
        }
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn transposed(&self) -> Self {
        let mut values = Vec::with_capacity(self.values.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                values.push(self.values[r * self.cols + c]);
            }
        }
        Self {
            rows: self.cols,
            cols: self.rows,
            values,
        }
    }

    /// Rows as nested vectors.
    pub fn to_nested(&self) -> Vec<Vec<f32>> {
        (0..self.rows)
            .filter_map(|r| self.row(r).map(<[f32]>::to_vec))
            .collect()
    }
}

/// One decoded dataset entry as handed to visualization code.
///
/// Labels are kept as the raw bytes found in the record; use
/// [`DecodedEntry::phrase_text`] for display.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEntry {
    pub frame: i64,
    /// `(columns, channels)` landmark tensor.
    pub landmarks: LandmarkMatrix,
    pub phrase: Vec<u8>,
    pub context: Vec<u8>,
}

impl DecodedEntry {
    pub fn phrase_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.phrase)
    }

    pub fn context_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.context)
    }
}
