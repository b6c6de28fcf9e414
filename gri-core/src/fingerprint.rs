//! Content hashes identifying benchmarks and simulation runs.
//!
//! The core does not cache. Callers that cache simulation results key them
//! by [`SimulationKey`]: benchmark identity, sample size, trial count, seed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Benchmark;
use crate::simulation::SimulationConfig;

/// BLAKE3 over the dimension columns and the strata sorted by key.
///
/// Proportions are hashed by their bit pattern, so two benchmarks share a
/// fingerprint only if they hold exactly the same values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchmarkFingerprint(pub String);

impl BenchmarkFingerprint {
    pub fn of(benchmark: &Benchmark) -> Self {
        let mut hasher = blake3::Hasher::new();
        for col in &benchmark.dimension().columns {
            hasher.update(col.as_bytes());
            hasher.update(&[0x1f]);
        }
        hasher.update(&[0x1e]);

        let mut strata: Vec<_> = benchmark.strata().iter().collect();
        strata.sort_by(|a, b| a.key.cmp(&b.key));
        for stratum in strata {
            for value in stratum.key.values() {
                hasher.update(value.as_bytes());
                hasher.update(&[0x1f]);
            }
            hasher.update(&stratum.population_proportion.to_bits().to_le_bytes());
            hasher.update(&[0x1e]);
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for BenchmarkFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationKey {
    pub benchmark: BenchmarkFingerprint,
    pub sample_size: u64,
    pub n_simulations: usize,
    pub seed: u64,
}

impl SimulationKey {
    pub fn new(benchmark: &Benchmark, sample_size: u64, config: &SimulationConfig) -> Self {
        Self {
            benchmark: benchmark.fingerprint(),
            sample_size,
            n_simulations: config.n_simulations,
            seed: config.seed,
        }
    }

    /// Short stable hash, suitable as a cache file name.
    pub fn hash(&self) -> String {
        let canonical = serde_json::json!({
            "benchmark": &self.benchmark.0,
            "sample_size": self.sample_size,
            "n_simulations": self.n_simulations,
            "seed": self.seed,
        });
        let hex = blake3::hash(canonical.to_string().as_bytes()).to_hex();
        hex.as_str()[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dimension;

    fn bench(pairs: &[(&str, f64)]) -> Benchmark {
        Benchmark::from_pairs(Dimension::new("Country", ["country"]), pairs.iter().copied())
            .unwrap()
    }

    #[test]
    fn fingerprint_ignores_stratum_order() {
        let a = bench(&[("A", 0.5), ("B", 0.5)]);
        let b = bench(&[("B", 0.5), ("A", 0.5)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_values() {
        let a = bench(&[("A", 0.5), ("B", 0.5)]);
        let b = bench(&[("A", 0.6), ("B", 0.4)]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn simulation_key_changes_with_seed() {
        let b = bench(&[("A", 1.0)]);
        let k1 = SimulationKey::new(&b, 100, &SimulationConfig::default());
        let k2 = SimulationKey::new(
            &b,
            100,
            &SimulationConfig {
                seed: 7,
                ..SimulationConfig::default()
            },
        );
        assert_eq!(k1.hash(), k1.clone().hash());
        assert_ne!(k1.hash(), k2.hash());
        assert_eq!(k1.hash().len(), 16);
    }
}
