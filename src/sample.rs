//! Random sampling of decoded entries for quick inspection.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::error::MpdataError;

/// Picks `n` distinct positions out of `0..len`, returned in ascending
/// order so sampled entries keep their dataset order.
///
/// With a seed the choice is reproducible.
pub fn sample_indices(len: usize, n: usize, seed: Option<u64>) -> Result<Vec<usize>, MpdataError> {
    if n == 0 {
        return Err(MpdataError::config("sample size must be greater than 0"));
    }

    let mut indices: Vec<usize> = (0..len).collect();
    if n >= len {
        return Ok(indices);
    }

    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        indices.shuffle(&mut rng);
    }

    indices.truncate(n);
    indices.sort_unstable();
    Ok(indices)
}
