//! Strategic Representativeness Index.
//!
//! The strategic target `t_i = sqrt(q_i) / Σ_j sqrt(q_j)` sits between
//! proportional and equal allocation. Under equal, unknown within-stratum
//! variance it minimizes aggregate estimator variance, so SRI measures the
//! distance from the allocation a survey designer should aim for rather than
//! from the population itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{check_dimensions, join, MetricError};
use crate::domain::{Benchmark, Sample, StratumKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SriRow {
    pub key: StratumKey,
    pub population_proportion: f64,
    pub strategic_target: f64,
    pub sample_proportion: f64,
    pub sample_count: u64,
    pub target_vs_population: f64,
    pub deviation_from_target: f64,
    pub deviation_from_population: f64,
    /// `0.5 * |s_i - t_i|`; the contributions sum to `1 - SRI`.
    pub sri_contribution: f64,
}

/// Per-stratum SRI table, largest population share first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SriBreakdown {
    pub rows: Vec<SriRow>,
}

/// Square-root targets for every benchmark stratum.
///
/// All-zero benchmarks have no meaningful target; every target is then 0.
pub fn strategic_targets(benchmark: &Benchmark) -> BTreeMap<StratumKey, f64> {
    let roots: BTreeMap<StratumKey, f64> = benchmark
        .strata()
        .iter()
        .map(|s| (s.key.clone(), s.population_proportion.max(0.0).sqrt()))
        .collect();
    let total: f64 = roots.values().sum();

    roots
        .into_iter()
        .map(|(key, root)| {
            let target = if total > 0.0 { root / total } else { 0.0 };
            (key, target)
        })
        .collect()
}

/// `SRI = 1 - 0.5 * Σ |s_i - t_i|` over the union of strata.
///
/// An empty sample scores 0.0 with an empty breakdown.
pub fn calculate_sri(
    sample: &Sample,
    benchmark: &Benchmark,
) -> Result<(f64, SriBreakdown), MetricError> {
    check_dimensions(sample, benchmark)?;
    if sample.is_empty() {
        return Ok((0.0, SriBreakdown::default()));
    }

    let targets = strategic_targets(benchmark);
    let mut rows: Vec<SriRow> = join(sample, benchmark)
        .into_iter()
        .map(|row| {
            let target = targets.get(&row.key).copied().unwrap_or(0.0);
            let deviation_from_target = (row.sample_proportion - target).abs();
            SriRow {
                population_proportion: row.population_proportion,
                strategic_target: target,
                sample_proportion: row.sample_proportion,
                sample_count: row.sample_count,
                target_vs_population: target - row.population_proportion,
                deviation_from_target,
                deviation_from_population: (row.sample_proportion - row.population_proportion)
                    .abs(),
                sri_contribution: 0.5 * deviation_from_target,
                key: row.key,
            }
        })
        .collect();

    let gap: f64 = rows.iter().map(|r| r.sri_contribution).sum();

    rows.sort_by(|a, b| {
        b.population_proportion
            .partial_cmp(&a.population_proportion)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok((1.0 - gap, SriBreakdown { rows }))
}
