//! SimulationEngine: Monte Carlo ceilings for GRI and Diversity.
//!
//! A synthetic "best effort" sample is drawn per trial with semi-stochastic
//! rounding; the spread of the resulting scores shows what is achievable at
//! a given sample size.

pub mod curve;
pub mod monte_carlo;
pub mod sampling;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use curve::{generate_sample_size_curve, CurvePoint};
pub use monte_carlo::{
    build_thread_pool, efficiency_ratio, max_diversity, max_gri, max_possible_gri,
    monte_carlo_max_scores, monte_carlo_with_hooks, simulation_threshold, SimulationResult,
    TrialHooks, TrialOutcome,
};
pub use sampling::generate_optimal_sample;

/// Tolerance on `Σ p` before proportions are renormalised.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("cannot draw {sample_size} units from zero strata")]
    NoStrata { sample_size: u64 },

    #[error("proportions carry no positive mass (sum = {total})")]
    ZeroMass { total: f64 },

    #[error("n_simulations must be at least 1")]
    NoTrials,

    #[error("simulation cancelled before any trial completed")]
    Cancelled,

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("dimension '{dimension}': {source}")]
    Dimension {
        dimension: String,
        #[source]
        source: Box<SimulationError>,
    },
}

impl SimulationError {
    /// Attach the dimension name. Already-attributed errors are returned as is.
    pub fn in_dimension(self, dimension: &str) -> Self {
        match self {
            Self::Dimension { .. } => self,
            other => Self::Dimension {
                dimension: dimension.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any dimension attribution stripped.
    pub fn cause(&self) -> &SimulationError {
        match self {
            Self::Dimension { source, .. } => source.cause(),
            other => other,
        }
    }
}

/// Trial count, base seed and worker threads for a Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub n_simulations: usize,
    pub seed: u64,
    /// Worker threads; 1 runs trials on the calling thread.
    pub threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_simulations: 1000,
            seed: 42,
            threads: 1,
        }
    }
}

/// Clamp negatives to zero and rescale to unit mass when `Σ p` drifts from 1.
pub(crate) fn normalize(proportions: &[f64], sample_size: u64) -> Result<Vec<f64>, SimulationError> {
    if proportions.is_empty() {
        return Err(SimulationError::NoStrata { sample_size });
    }
    let clamped: Vec<f64> = proportions.iter().map(|&p| p.max(0.0)).collect();
    let total: f64 = clamped.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(SimulationError::ZeroMass { total });
    }
    if (total - 1.0).abs() > NORMALIZATION_TOLERANCE {
        Ok(clamped.into_iter().map(|p| p / total).collect())
    } else {
        Ok(clamped)
    }
}
