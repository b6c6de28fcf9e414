//! Segment-level deviation analysis: which strata drive the GRI gap.

use serde::{Deserialize, Serialize};

use super::{check_dimensions, join, MetricError};
use crate::domain::{Benchmark, Sample, StratumKey};

/// Deviations inside this band count as balanced.
pub const BALANCED_BAND: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Representation {
    Under,
    Balanced,
    Over,
}

impl Representation {
    fn classify(deviation: f64) -> Self {
        if deviation < -BALANCED_BAND {
            Self::Under
        } else if deviation > BALANCED_BAND {
            Self::Over
        } else {
            Self::Balanced
        }
    }
}

/// Which side of the benchmark to report in [`top_contributors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Over,
    Under,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDeviation {
    pub key: StratumKey,
    pub sample_count: u64,
    pub sample_proportion: f64,
    pub benchmark_proportion: f64,
    /// `sample - benchmark`; positive means over-represented.
    pub deviation: f64,
    pub abs_deviation: f64,
    /// Deviation relative to the benchmark share; `None` when the benchmark share is 0.
    pub normalized_deviation: Option<f64>,
    pub tvd_contribution: f64,
    pub representation: Representation,
    /// Running TVD over the rows returned by [`top_contributors`]; 0 elsewhere.
    pub cumulative_tvd: f64,
}

/// Every stratum of the outer join, largest absolute deviation first.
pub fn segment_deviations(
    sample: &Sample,
    benchmark: &Benchmark,
) -> Result<Vec<SegmentDeviation>, MetricError> {
    check_dimensions(sample, benchmark)?;

    let mut rows: Vec<SegmentDeviation> = join(sample, benchmark)
        .into_iter()
        .map(|row| {
            let deviation = row.sample_proportion - row.population_proportion;
            SegmentDeviation {
                sample_count: row.sample_count,
                sample_proportion: row.sample_proportion,
                benchmark_proportion: row.population_proportion,
                deviation,
                abs_deviation: deviation.abs(),
                normalized_deviation: (row.population_proportion > 0.0)
                    .then(|| deviation / row.population_proportion),
                tvd_contribution: deviation.abs() / 2.0,
                representation: Representation::classify(deviation),
                cumulative_tvd: 0.0,
                key: row.key,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.abs_deviation
            .partial_cmp(&a.abs_deviation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}

/// The `n` strata with the largest absolute deviation, filtered by direction
/// and by a minimum benchmark share, with a running TVD total.
pub fn top_contributors(
    deviations: &[SegmentDeviation],
    n: usize,
    direction: Direction,
    min_benchmark_prop: f64,
) -> Vec<SegmentDeviation> {
    let mut picked: Vec<SegmentDeviation> = deviations
        .iter()
        .filter(|d| d.benchmark_proportion >= min_benchmark_prop)
        .filter(|d| match direction {
            Direction::Over => d.deviation > 0.0,
            Direction::Under => d.deviation < 0.0,
            Direction::Both => true,
        })
        .cloned()
        .collect();

    picked.sort_by(|a, b| {
        b.abs_deviation
            .partial_cmp(&a.abs_deviation)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    picked.truncate(n);

    let mut running = 0.0;
    for row in &mut picked {
        running += row.tvd_contribution;
        row.cumulative_tvd = running;
    }
    picked
}
