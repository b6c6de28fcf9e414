use serde::{Deserialize, Serialize};

use super::monte_carlo::{build_thread_pool, monte_carlo_with_hooks, TrialHooks};
use super::{SimulationConfig, SimulationError};
use crate::domain::Benchmark;

/// Ceiling scores at one sample size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub sample_size: u64,
    pub max_gri_mean: f64,
    pub max_gri_std: f64,
    pub max_diversity_mean: f64,
    pub max_diversity_std: f64,
    pub total_strata: usize,
    pub relevant_strata: usize,
}

/// One [`CurvePoint`] per entry of `sizes`, in the order given.
///
/// Every size reuses `config.seed` as its base seed. With `threads > 1` one
/// pool serves every size.
pub fn generate_sample_size_curve(
    benchmark: &Benchmark,
    sizes: &[u64],
    config: &SimulationConfig,
) -> Result<Vec<CurvePoint>, SimulationError> {
    let pool = build_thread_pool(config.threads)
        .map_err(|e| e.in_dimension(&benchmark.dimension().name))?;
    let hooks = TrialHooks {
        pool: pool.as_ref(),
        ..TrialHooks::default()
    };
    sizes
        .iter()
        .map(|&n| {
            let r = monte_carlo_with_hooks(benchmark, n, config, hooks)?;
            Ok(CurvePoint {
                sample_size: n,
                max_gri_mean: r.max_gri.mean,
                max_gri_std: r.max_gri.std,
                max_diversity_mean: r.max_diversity.mean,
                max_diversity_std: r.max_diversity.std,
                total_strata: r.total_strata,
                relevant_strata: r.relevant_strata,
            })
        })
        .collect()
}
