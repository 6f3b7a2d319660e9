//! Landmark record codec.
//!
//! Encodes frames into serialized `tf.train.Example` messages with the
//! fixed schema
//!
//! | feature    | kind         | shape                         |
//! |------------|--------------|-------------------------------|
//! | `frame`    | `int64_list` | exactly one value             |
//! | `landmark` | `float_list` | `num_features * channels`     |
//! | `phrase`   | `bytes_list` | exactly one UTF-8 value       |
//! | `context`  | `bytes_list` | exactly one UTF-8 value       |
//!
//! and decodes them back, either losslessly into a [`LandmarkRecord`] or
//! into the dense `(columns, channels)` tensor of a [`DecodedEntry`].
//!
//! # Column decode
//!
//! Corpora written by other tools may store each landmark point as its own
//! named float feature instead of one flat `landmark` list. For every
//! configured column the decoder uses the feature of that name when the
//! record has one, and otherwise the column's `channels`-wide slice of the
//! flat `landmark` list. Each column is densified to `channels` values
//! (missing values are zero), the columns are stacked side by side into a
//! `(channels, columns)` matrix, and the result is transposed so the point
//! axis comes first.

use std::collections::BTreeMap;
use std::path::Path;

use prost::Message;
use tracing::debug;

use super::model::{DecodedEntry, LandmarkMatrix, LandmarkRecord};
use super::proto::{feature::Kind, Example, Feature, Features};
use crate::config::FeatureSchema;
use crate::error::MpdataError;
use crate::tabular::CellValue;

pub const FRAME_KEY: &str = "frame";
pub const LANDMARK_KEY: &str = "landmark";
pub const PHRASE_KEY: &str = "phrase";
pub const CONTEXT_KEY: &str = "context";

/// Landmark values as handed to [`encode`], before coercion to `f32`.
#[derive(Clone, Copy, Debug)]
pub enum LandmarkInput<'a> {
    /// Already flat.
    Flat(&'a [f32]),
    /// One inner vector per point; flattened row-major.
    Nested(&'a [Vec<f32>]),
    /// Raw tabular cells; numbers are cast, empty cells become NaN.
    Cells(&'a [CellValue<'a>]),
}

/// Where a record came from, for error messages.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Origin<'a> {
    pub path: &'a Path,
    pub offset: Option<u64>,
}

impl<'a> Origin<'a> {
    pub(crate) fn bytes() -> Self {
        Origin {
            path: Path::new("<bytes>"),
            offset: None,
        }
    }

    fn format_err(&self, message: impl Into<String>) -> MpdataError {
        MpdataError::Format {
            path: self.path.to_path_buf(),
            offset: self.offset,
            message: message.into(),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Serializes a typed record. Never fails.
pub fn encode_record(record: &LandmarkRecord) -> Vec<u8> {
    build_example(
        record.frame,
        record.landmark.clone(),
        record.phrase.as_bytes().to_vec(),
        record.context.as_bytes().to_vec(),
    )
}

/// Serializes a record from loosely typed parts.
///
/// Labels that arrive as numbers are written as their decimal string
/// (`7` becomes `"7"`, `1.5` becomes `"1.5"`, `2.0` becomes `"2.0"`). This
/// leniency matches what existing corpora contain; empty and non-finite
/// labels are rejected.
///
/// # Errors
/// [`MpdataError::TypeConversion`] if a label is empty or not finite, the nested
/// landmark input is ragged, or a landmark cell is not numeric.
pub fn encode(
    frame: i64,
    landmark: LandmarkInput<'_>,
    phrase: &CellValue<'_>,
    context: &CellValue<'_>,
) -> Result<Vec<u8>, MpdataError> {
    let landmark = flatten_landmark(landmark)?;
    let phrase = coerce_label(PHRASE_KEY, phrase)?;
    let context = coerce_label(CONTEXT_KEY, context)?;
    Ok(build_example(frame, landmark, phrase, context))
}

fn build_example(frame: i64, landmark: Vec<f32>, phrase: Vec<u8>, context: Vec<u8>) -> Vec<u8> {
    let mut feature = BTreeMap::new();
    feature.insert(FRAME_KEY.to_string(), Feature::int64(frame));
    feature.insert(LANDMARK_KEY.to_string(), Feature::floats(landmark));
    feature.insert(PHRASE_KEY.to_string(), Feature::bytes(phrase));
    feature.insert(CONTEXT_KEY.to_string(), Feature::bytes(context));

    Example {
        features: Some(Features { feature }),
    }
    .encode_to_vec()
}

/// Converts a label cell to the bytes stored in the record.
pub fn coerce_label(field: &str, value: &CellValue<'_>) -> Result<Vec<u8>, MpdataError> {
    match value {
        CellValue::Text(s) => Ok(s.as_bytes().to_vec()),
        CellValue::Integer(v) => Ok(v.to_string().into_bytes()),
        CellValue::Float(v) if v.is_finite() => Ok(float_label(*v).into_bytes()),
        CellValue::Float(v) => Err(MpdataError::TypeConversion {
            field: field.to_string(),
            message: format!("non-finite value {v} is not a label"),
        }),
        CellValue::Empty => Err(MpdataError::TypeConversion {
            field: field.to_string(),
            message: format!(
                "unsupported {} value; only text and numbers are supported",
                value.type_name()
            ),
        }),
    }
}

// Integral floats keep a trailing ".0" so 2.0 and 2 stay distinguishable.
fn float_label(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

/// Flattens landmark input to `f32` values.
pub fn flatten_landmark(input: LandmarkInput<'_>) -> Result<Vec<f32>, MpdataError> {
    match input {
        LandmarkInput::Flat(values) => Ok(values.to_vec()),
        LandmarkInput::Nested(points) => {
            let width = points.first().map(Vec::len).unwrap_or(0);
            if let Some((i, p)) = points.iter().enumerate().find(|(_, p)| p.len() != width) {
                return Err(MpdataError::TypeConversion {
                    field: LANDMARK_KEY.to_string(),
                    message: format!(
                        "point {} has {} values but point 0 has {}",
                        i,
                        p.len(),
                        width
                    ),
                });
            }
            let flat: Vec<f32> = points.iter().flatten().copied().collect();
            debug!(len = flat.len(), "flattened nested landmarks");
            Ok(flat)
        }
        LandmarkInput::Cells(cells) => cells
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                CellValue::Integer(v) => Ok(*v as f32),
                CellValue::Float(v) => Ok(*v as f32),
                CellValue::Empty => Ok(f32::NAN),
                CellValue::Text(s) => Err(MpdataError::TypeConversion {
                    field: LANDMARK_KEY.to_string(),
                    message: format!("value {} ('{}') is not numeric", i, s),
                }),
            })
            .collect(),
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a record written by [`encode_record`] or [`encode`].
///
/// # Errors
/// [`MpdataError::Format`] if the bytes are not an `Example`, a schema
/// feature is missing or has the wrong kind or arity, or a label is not
/// UTF-8.
pub fn decode_record(bytes: &[u8]) -> Result<LandmarkRecord, MpdataError> {
    let origin = Origin::bytes();
    let features = parse_features(bytes, origin)?;

    let frame = single_int64(&features, FRAME_KEY, origin)?
        .ok_or_else(|| origin.format_err("missing feature 'frame'"))?;
    let landmark = float_values(&features, LANDMARK_KEY, origin)?
        .ok_or_else(|| origin.format_err("missing feature 'landmark'"))?
        .to_vec();
    let phrase = utf8_label(&features, PHRASE_KEY, origin)?;
    let context = utf8_label(&features, CONTEXT_KEY, origin)?;

    Ok(LandmarkRecord {
        frame,
        landmark,
        phrase,
        context,
    })
}

/// Decodes a record into a dense landmark tensor using `schema`.
///
/// # Errors
/// [`MpdataError::Format`] for malformed records (including a missing
/// `phrase`), [`MpdataError::Shape`] if a column or the flat landmark list
/// is longer than the schema allows.
pub fn decode_entry(bytes: &[u8], schema: &FeatureSchema) -> Result<DecodedEntry, MpdataError> {
    decode_entry_at(bytes, schema, Origin::bytes()).map(|(entry, _)| entry)
}

/// Like [`decode_entry`], also returning the length of the flat `landmark`
/// list when the record has one.
pub(crate) fn decode_entry_at(
    bytes: &[u8],
    schema: &FeatureSchema,
    origin: Origin<'_>,
) -> Result<(DecodedEntry, Option<usize>), MpdataError> {
    let features = parse_features(bytes, origin)?;

    let phrase = single_bytes(&features, PHRASE_KEY, origin)?
        .ok_or_else(|| origin.format_err("missing feature 'phrase'"))?;
    let context = single_bytes(&features, CONTEXT_KEY, origin)?.unwrap_or_default();
    let frame = single_int64(&features, FRAME_KEY, origin)?.unwrap_or(0);

    let channels = schema.channels;
    let flat = float_values(&features, LANDMARK_KEY, origin)?;
    if let Some(flat) = flat {
        if flat.len() > schema.total_num_features() {
            return Err(MpdataError::shape(format!(
                "{}: landmark has {} values, schema allows {} ({} x {})",
                origin.path.display(),
                flat.len(),
                schema.total_num_features(),
                schema.num_features,
                channels
            )));
        }
    }

    let names = schema.column_names();
    let mut columns = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let sparse = match float_values(&features, name, origin)? {
            Some(values) => values,
            None => flat
                .map(|flat| {
                    let start = (i * channels).min(flat.len());
                    let end = ((i + 1) * channels).min(flat.len());
                    &flat[start..end]
                })
                .unwrap_or(&[]),
        };
        if sparse.len() > channels {
            return Err(MpdataError::shape(format!(
                "{}: column '{}' has {} values, expected at most {}",
                origin.path.display(),
                name,
                sparse.len(),
                channels
            )));
        }
        columns.push(densify(sparse, channels));
    }

    let landmarks = LandmarkMatrix::stack_columns(&columns, channels)?.transposed();

    Ok((
        DecodedEntry {
            frame,
            landmarks,
            phrase: phrase.to_vec(),
            context: context.to_vec(),
        },
        flat.map(<[f32]>::len),
    ))
}

/// Pads `values` with zeros up to `len`.
pub fn densify(values: &[f32], len: usize) -> Vec<f32> {
    let mut dense = vec![0.0; len];
    let n = values.len().min(len);
    dense[..n].copy_from_slice(&values[..n]);
    dense
}

fn parse_features(
    bytes: &[u8],
    origin: Origin<'_>,
) -> Result<BTreeMap<String, Feature>, MpdataError> {
    let example = Example::decode(bytes)
        .map_err(|e| origin.format_err(format!("not a tf.train.Example: {e}")))?;
    Ok(example.features.map(|f| f.feature).unwrap_or_default())
}

fn wrong_kind(origin: Origin<'_>, key: &str, expected: &str, feature: &Feature) -> MpdataError {
    origin.format_err(format!(
        "feature '{}' is {}, expected {}",
        key,
        feature.kind_name(),
        expected
    ))
}

fn float_values<'f>(
    features: &'f BTreeMap<String, Feature>,
    key: &str,
    origin: Origin<'_>,
) -> Result<Option<&'f [f32]>, MpdataError> {
    match features.get(key) {
        None => Ok(None),
        Some(Feature {
            kind: Some(Kind::FloatList(list)),
        }) => Ok(Some(&list.value)),
        // An unset kind is an empty list of any type.
        Some(Feature { kind: None }) => Ok(Some(&[])),
        Some(other) => Err(wrong_kind(origin, key, "float_list", other)),
    }
}

fn single_int64(
    features: &BTreeMap<String, Feature>,
    key: &str,
    origin: Origin<'_>,
) -> Result<Option<i64>, MpdataError> {
    match features.get(key) {
        None => Ok(None),
        Some(Feature {
            kind: Some(Kind::Int64List(list)),
        }) => match list.value.as_slice() {
            [v] => Ok(Some(*v)),
            values => Err(origin.format_err(format!(
                "feature '{}' has {} values, expected 1",
                key,
                values.len()
            ))),
        },
        Some(other) => Err(wrong_kind(origin, key, "int64_list", other)),
    }
}

fn single_bytes<'f>(
    features: &'f BTreeMap<String, Feature>,
    key: &str,
    origin: Origin<'_>,
) -> Result<Option<&'f [u8]>, MpdataError> {
    match features.get(key) {
        None => Ok(None),
        Some(Feature {
            kind: Some(Kind::BytesList(list)),
        }) => match list.value.as_slice() {
            [v] => Ok(Some(v.as_slice())),
            values => Err(origin.format_err(format!(
                "feature '{}' has {} values, expected 1",
                key,
                values.len()
            ))),
        },
        Some(other) => Err(wrong_kind(origin, key, "bytes_list", other)),
    }
}

fn utf8_label(
    features: &BTreeMap<String, Feature>,
    key: &str,
    origin: Origin<'_>,
) -> Result<String, MpdataError> {
    let bytes = single_bytes(features, key, origin)?
        .ok_or_else(|| origin.format_err(format!("missing feature '{key}'")))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| origin.format_err(format!("feature '{key}' is not UTF-8: {e}")))
}
