//! MetricEngine: GRI, Diversity, SRI and VWRS over a sample/benchmark pair.
//!
//! Every metric evaluates the outer join of sample and benchmark strata:
//! a key missing on one side contributes zero on that side. The join is
//! walked in key order, so scores do not depend on the order strata were
//! supplied in.
//!
//! Degenerate inputs never error. Each metric returns a fixed sentinel:
//! - GRI: 0.0 for an empty sample
//! - Diversity: 0.0 for an empty sample, 1.0 when no stratum is relevant
//! - VWRS: 0.0 when the total weight is zero

pub mod analysis;
pub mod diversity;
pub mod gri;
pub mod sri;
pub mod vwrs;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::{Benchmark, Sample, StratumKey};

pub use analysis::{
    segment_deviations, top_contributors, Direction, Representation, SegmentDeviation,
};
pub use diversity::{calculate_diversity_score, diversity_breakdown, DiversityBreakdown, DiversityRow};
pub use gri::calculate_gri;
pub use sri::{calculate_sri, strategic_targets, SriBreakdown, SriRow};
pub use vwrs::{calculate_vwrs, VwrsBreakdown, VwrsRow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error(
        "dimension '{dimension}': sample columns {sample_columns:?} do not match benchmark columns {benchmark_columns:?}"
    )]
    DimensionMismatch {
        dimension: String,
        sample_columns: Vec<String>,
        benchmark_columns: Vec<String>,
    },
}

/// One row of the sample/benchmark outer join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedStratum {
    pub key: StratumKey,
    pub population_proportion: f64,
    pub sample_count: u64,
    pub sample_proportion: f64,
}

/// Fail loudly when the two sides are keyed by different columns.
pub(crate) fn check_dimensions(sample: &Sample, benchmark: &Benchmark) -> Result<(), MetricError> {
    if sample.dimension().columns != benchmark.dimension().columns {
        return Err(MetricError::DimensionMismatch {
            dimension: benchmark.dimension().name.clone(),
            sample_columns: sample.dimension().columns.clone(),
            benchmark_columns: benchmark.dimension().columns.clone(),
        });
    }
    Ok(())
}

/// Outer join of sample and benchmark strata, zero-filled, in key order.
pub fn join(sample: &Sample, benchmark: &Benchmark) -> Vec<JoinedStratum> {
    let mut keys: BTreeSet<&StratumKey> = benchmark.strata().iter().map(|s| &s.key).collect();
    keys.extend(sample.strata().map(|(key, _)| key));

    keys.into_iter()
        .map(|key| JoinedStratum {
            key: key.clone(),
            population_proportion: benchmark.proportion(key),
            sample_count: sample.count(key),
            sample_proportion: sample.proportion(key),
        })
        .collect()
}
