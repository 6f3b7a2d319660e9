//! Feature schema and external feature-column configuration.
//!
//! The schema is an explicit value handed to the codec and the reader
//! session. Nothing in this crate reads ambient global configuration; the
//! column list is loaded once by the caller (usually from a YAML or JSON
//! file via [`FeatureConfig::from_path`]) and passed in.

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MpdataError;

/// Landmark points per frame in a holistic MediaPipe capture
/// (468 face + 21 left hand + 33 pose + 21 right hand).
pub const DEFAULT_NUM_FEATURES: usize = 543;

/// Coordinates per landmark point (x, y, z).
pub const DEFAULT_CHANNELS: usize = 3;

/// Shape of the landmark vectors in one corpus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Number of landmark points.
    pub num_features: usize,

    /// Number of coordinates per point.
    pub channels: usize,

    /// Named per-point columns, in decode order. Empty means positional
    /// columns `0..num_features`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_columns: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_FEATURES, DEFAULT_CHANNELS)
    }
}

impl FeatureSchema {
    /// Creates a schema with positional columns.
    pub fn new(num_features: usize, channels: usize) -> Self {
        Self {
            num_features,
            channels,
            feature_columns: Vec::new(),
        }
    }

    /// Replaces the named feature columns.
    pub fn with_feature_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `num_features * channels`: the length of a flat landmark vector.
    pub fn total_num_features(&self) -> usize {
        self.num_features * self.channels
    }

    /// Number of rows in a decoded landmark matrix.
    pub fn column_count(&self) -> usize {
        if self.feature_columns.is_empty() {
            self.num_features
        } else {
            self.feature_columns.len()
        }
    }

    /// Column names in decode order, synthesizing positional names when no
    /// named columns are configured.
    pub fn column_names(&self) -> Vec<Cow<'_, str>> {
        if self.feature_columns.is_empty() {
            (0..self.num_features)
                .map(|i| Cow::Owned(format!("landmark_{i}")))
                .collect()
        } else {
            self.feature_columns
                .iter()
                .map(|name| Cow::Borrowed(name.as_str()))
                .collect()
        }
    }

    /// Rejects zero-sized shapes.
    pub fn validate(&self) -> Result<(), MpdataError> {
        if self.num_features == 0 || self.channels == 0 {
            return Err(MpdataError::config(format!(
                "num_features and channels must be positive (got {} x {})",
                self.num_features, self.channels
            )));
        }
        Ok(())
    }
}

/// On-disk feature configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default, alias = "ALL_FEATURE_COLUMNS")]
    pub all_feature_columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_features: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,
}

impl FeatureConfig {
    /// Loads a config from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self, MpdataError> {
        let file = File::open(path).map_err(|source| MpdataError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("json") => serde_json::from_reader(reader).map_err(|e| {
                MpdataError::ConfigFileParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }),
            Some("yaml") | Some("yml") => {
                serde_yaml::from_reader(reader).map_err(|e| MpdataError::ConfigFileParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            _ => Err(MpdataError::ConfigFileParse {
                path: path.to_path_buf(),
                message: "expected a .json, .yaml or .yml file".to_string(),
            }),
        }
    }

    /// Builds a schema, letting explicit values in the file override the
    /// given defaults.
    pub fn to_schema(&self, num_features: usize, channels: usize) -> FeatureSchema {
        FeatureSchema::new(
            self.num_features.unwrap_or(num_features),
            self.channels.unwrap_or(channels),
        )
        .with_feature_columns(self.all_feature_columns.iter().cloned())
    }
}
