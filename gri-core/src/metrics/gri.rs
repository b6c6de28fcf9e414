use super::{check_dimensions, join, MetricError};
use crate::domain::{Benchmark, Sample};

/// Global Representativeness Index: `1 - TVD`, where
/// `TVD = 0.5 * Σ |s_i - q_i|` over the union of strata.
///
/// Returns 0.0 for an empty sample.
pub fn calculate_gri(sample: &Sample, benchmark: &Benchmark) -> Result<f64, MetricError> {
    check_dimensions(sample, benchmark)?;
    if sample.is_empty() {
        return Ok(0.0);
    }

    let tvd = 0.5
        * join(sample, benchmark)
            .iter()
            .map(|row| (row.sample_proportion - row.population_proportion).abs())
            .sum::<f64>();

    Ok(1.0 - tvd)
}
