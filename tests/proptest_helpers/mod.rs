#![allow(dead_code)]

use mpdata::record::LandmarkRecord;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Finite coordinates in the range MediaPipe emits (roughly normalized,
/// with some out-of-frame overshoot).
pub fn coordinate_strategy() -> impl Strategy<Value = f32> {
    -2.0f32..2.0f32
}

pub fn label_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.'é-]{0,24}"
}

/// A record whose landmark has exactly `num_features * channels` values.
pub fn arb_record(num_features: usize, channels: usize) -> BoxedStrategy<LandmarkRecord> {
    (
        0i64..1_000_000,
        proptest::collection::vec(coordinate_strategy(), num_features * channels),
        label_strategy(),
        label_strategy(),
    )
        .prop_map(|(frame, landmark, phrase, context)| LandmarkRecord {
            frame,
            landmark,
            phrase,
            context,
        })
        .boxed()
}

/// Schema dimensions together with a batch of records of that shape.
pub fn arb_corpus(
    max_features: usize,
    max_channels: usize,
    max_records: usize,
) -> BoxedStrategy<(usize, usize, Vec<LandmarkRecord>)> {
    (1usize..=max_features, 1usize..=max_channels)
        .prop_flat_map(move |(num_features, channels)| {
            (
                Just(num_features),
                Just(channels),
                proptest::collection::vec(arb_record(num_features, channels), 0..=max_records),
            )
        })
        .boxed()
}
