//! Binary landmark records.
//!
//! A landmark corpus on disk is a set of TFRecord files, each a sequence of
//! length-prefixed, checksummed `tf.train.Example` messages. This module
//! holds the record schema ([`proto`]), the per-record codec ([`codec`]) and
//! the file framing ([`container`]).
//!
//! # Example
//!
//! ```
//! use mpdata::config::FeatureSchema;
//! use mpdata::record::{codec, LandmarkRecord};
//!
//! let record = LandmarkRecord::new(0, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], "hello", "ctx");
//! let bytes = codec::encode_record(&record);
//!
//! let schema = FeatureSchema::new(2, 3).with_feature_columns(["p0", "p1"]);
//! let entry = codec::decode_entry(&bytes, &schema)?;
//! assert_eq!(entry.landmarks.shape(), (2, 3));
//! assert_eq!(entry.phrase_text(), "hello");
//! # Ok::<(), mpdata::MpdataError>(())
//! ```

pub mod codec;
pub mod container;
mod model;
pub mod proto;

pub use model::{DecodedEntry, LandmarkMatrix, LandmarkRecord};
