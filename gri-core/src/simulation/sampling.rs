//! Semi-stochastic rounding of `p * N` into integer counts.

use rand::Rng;

use super::{normalize, SimulationError};
use crate::rng;

/// Integer counts summing to exactly `sample_size`.
///
/// Strata whose rounded expected count is at least 1 get that count; the
/// others get 1 with probability `p_i * N`. The residual is then fixed one
/// unit at a time at uniformly chosen strata: any stratum when adding, only
/// non-zero strata when removing.
///
/// The stream is seeded once and consumed in a fixed order: one `f64` per
/// sub-unit stratum in index order, then one index draw per correction step.
/// There are exactly `|residual|` correction steps.
pub fn generate_optimal_sample(
    proportions: &[f64],
    sample_size: u64,
    seed: u64,
) -> Result<Vec<u64>, SimulationError> {
    if proportions.is_empty() && sample_size == 0 {
        return Ok(Vec::new());
    }
    let proportions = normalize(proportions, sample_size)?;
    let n = sample_size as f64;
    let mut rng = rng::stream(seed);

    let mut counts: Vec<u64> = proportions
        .iter()
        .map(|&p| {
            let ideal = p * n;
            let rounded = ideal.round_ties_even();
            if rounded > 0.0 {
                rounded as u64
            } else if rng.gen::<f64>() < ideal {
                1
            } else {
                0
            }
        })
        .collect();

    let allocated: u64 = counts.iter().sum();
    if allocated < sample_size {
        for _ in 0..sample_size - allocated {
            let i = rng.gen_range(0..counts.len());
            counts[i] += 1;
        }
    } else if allocated > sample_size {
        let mut adjustable: Vec<usize> = (0..counts.len()).filter(|&i| counts[i] > 0).collect();
        for _ in 0..allocated - sample_size {
            // Σ counts > N ≥ 0 keeps at least one non-zero stratum here.
            let pos = rng.gen_range(0..adjustable.len());
            let i = adjustable[pos];
            counts[i] -= 1;
            if counts[i] == 0 {
                adjustable.remove(pos);
            }
        }
    }

    Ok(counts)
}
