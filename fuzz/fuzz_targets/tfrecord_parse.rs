//! Fuzz target for TFRecord framing.
//!
//! This fuzzer feeds arbitrary byte sequences to the TFRecord splitter and
//! decodes every payload that passes the checksums.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mpdata::config::FeatureSchema;
use mpdata::record::codec::decode_entry;
use mpdata::record::container::read_tfrecord_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(payloads) = read_tfrecord_slice(data) else {
        return;
    };
    let schema = FeatureSchema::new(4, 3);
    for payload in payloads {
        let _ = decode_entry(&payload, &schema);
    }
});
