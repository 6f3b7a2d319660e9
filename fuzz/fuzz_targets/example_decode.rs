//! Fuzz target for `tf.train.Example` decoding.
//!
//! Arbitrary bytes go straight to the record decoders, skipping the
//! checksum layer so the protobuf parser sees unfiltered input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mpdata::config::FeatureSchema;
use mpdata::record::codec::{decode_entry, decode_record};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = decode_record(data);

    let schema = FeatureSchema::new(2, 3).with_feature_columns(["landmark", "p1", "p2"]);
    if let Ok(entry) = decode_entry(data, &schema) {
        assert_eq!(entry.landmarks.shape(), (3, 3));
    }
});
