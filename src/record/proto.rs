//! Protobuf messages for the `tf.train.Example` record schema.
//!
//! Hand-written prost derives matching `tensorflow/core/example/example.proto`
//! and `feature.proto`, so records written here are readable by TensorFlow
//! and vice versa. Features are kept in a `BTreeMap` so encoding is
//! deterministic.

use std::collections::BTreeMap;

/// `tensorflow.Example`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

/// `tensorflow.Features`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Features {
    #[prost(btree_map = "string, message", tag = "1")]
    pub feature: BTreeMap<String, Feature>,
}

/// `tensorflow.Feature`
#[derive(Clone, PartialEq, prost::Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    /// The `oneof kind` of a feature.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

impl Feature {
    pub fn bytes(value: Vec<u8>) -> Self {
        Self {
            kind: Some(feature::Kind::BytesList(BytesList { value: vec![value] })),
        }
    }

    pub fn floats(value: Vec<f32>) -> Self {
        Self {
            kind: Some(feature::Kind::FloatList(FloatList { value })),
        }
    }

    pub fn int64(value: i64) -> Self {
        Self {
            kind: Some(feature::Kind::Int64List(Int64List { value: vec![value] })),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            Some(feature::Kind::BytesList(_)) => "bytes_list",
            Some(feature::Kind::FloatList(_)) => "float_list",
            Some(feature::Kind::Int64List(_)) => "int64_list",
            None => "empty",
        }
    }
}

/// One entry of a dataset snapshot.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SnapshotEntry {
    #[prost(int64, tag = "1")]
    pub frame: i64,
    #[prost(uint64, tag = "2")]
    pub rows: u64,
    #[prost(uint64, tag = "3")]
    pub cols: u64,
    #[prost(float, repeated, tag = "4")]
    pub values: Vec<f32>,
    #[prost(bytes = "vec", tag = "5")]
    pub phrase: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub context: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn float_list_is_packed() {
        let list = FloatList {
            value: vec![1.0, 2.0],
        };
        let bytes = list.encode_to_vec();
        // tag 1, wire type 2 (length-delimited), 8 payload bytes
        assert_eq!(&bytes[..2], &[0x0a, 0x08]);
        assert_eq!(bytes.len(), 10);
    }

    #[test]
    fn feature_kind_names() {
        assert_eq!(Feature::int64(3).kind_name(), "int64_list");
        assert_eq!(Feature::default().kind_name(), "empty");
    }
}
