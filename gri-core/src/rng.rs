//! Deterministic seeding for simulation trials.
//!
//! Trial `i` of a run with base seed `s` always uses seed `s + i` (wrapping),
//! so a trial's random stream depends only on its index, never on which
//! worker thread ran it or when.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seed for trial `trial_index` of a run started with `base_seed`.
pub fn trial_seed(base_seed: u64, trial_index: u64) -> u64 {
    base_seed.wrapping_add(trial_index)
}

/// The single RNG stream a generation call consumes.
pub fn stream(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
