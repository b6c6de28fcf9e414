//! BenchmarkSimplifier: merge small strata into a single "Others" stratum.
//!
//! Under VWRS, many small unsampled strata each add a tiny error term whose
//! sum can undercut the one larger term of a merged stratum holding the same
//! missing mass. Finer benchmarks then score better for saying less about
//! what is missing. Simplifying first removes that artifact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::{Benchmark, BenchmarkError, Sample, Stratum, StratumKey};

pub const DEFAULT_OTHERS_LABEL: &str = "Others";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimplifyError {
    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),

    #[error("dimension '{dimension}': adaptive simplification needs a sample")]
    SampleRequired { dimension: String },

    #[error("dimension '{dimension}': sample columns {sample_columns:?} do not match benchmark columns {benchmark_columns:?}")]
    DimensionMismatch {
        dimension: String,
        sample_columns: Vec<String>,
        benchmark_columns: Vec<String>,
    },
}

/// Which strata survive a formulaic simplification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum SimplificationPolicy {
    /// Keep strata with proportion >= t.
    Threshold(f64),
    /// Keep the n largest strata.
    TopN(usize),
    /// Keep the largest strata until their running sum reaches c.
    MinCoverage(f64),
}

/// Benchmark treatment selected per dimension. A pure input, not state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum BenchmarkMode {
    #[default]
    None,
    Formulaic(SimplificationPolicy),
    /// Keep every sampled stratum plus the largest others up to the target.
    Adaptive(f64),
    /// Hand-curated list of strata to keep.
    FixedList(Vec<StratumKey>),
}

impl BenchmarkMode {
    pub fn apply(&self, benchmark: &Benchmark, sample: Option<&Sample>) -> Result<Benchmark, SimplifyError> {
        self.apply_with_label(benchmark, sample, DEFAULT_OTHERS_LABEL)
    }

    pub fn apply_with_label(
        &self,
        benchmark: &Benchmark,
        sample: Option<&Sample>,
        others_label: &str,
    ) -> Result<Benchmark, SimplifyError> {
        match self {
            BenchmarkMode::None => Ok(benchmark.clone()),
            BenchmarkMode::Formulaic(policy) => {
                Ok(simplify_benchmark(benchmark, *policy, others_label)?)
            }
            BenchmarkMode::Adaptive(target) => {
                let sample = sample.ok_or_else(|| SimplifyError::SampleRequired {
                    dimension: benchmark.dimension().name.clone(),
                })?;
                create_adaptive_simplification(benchmark, sample, *target, others_label)
            }
            BenchmarkMode::FixedList(keys) => {
                let wanted: BTreeSet<&StratumKey> = keys.iter().collect();
                let (kept, rest): (Vec<&Stratum>, Vec<&Stratum>) = benchmark
                    .sorted_descending()
                    .into_iter()
                    .partition(|s| wanted.contains(&s.key));
                Ok(merge(benchmark, kept, rest, others_label)?)
            }
        }
    }
}

/// Keep the strata selected by `policy` (largest first) and fold the rest
/// into `others_label`.
///
/// "Others" is appended only when the merged mass is positive. If a kept
/// stratum already carries the "Others" key the mass is added to it.
pub fn simplify_benchmark(
    benchmark: &Benchmark,
    policy: SimplificationPolicy,
    others_label: &str,
) -> Result<Benchmark, BenchmarkError> {
    let sorted = benchmark.sorted_descending();
    let keep = match policy {
        SimplificationPolicy::TopN(n) => n.min(sorted.len()),
        SimplificationPolicy::Threshold(t) => sorted
            .iter()
            .filter(|s| s.population_proportion >= t)
            .count(),
        SimplificationPolicy::MinCoverage(c) => {
            let mut running = 0.0;
            let below = sorted
                .iter()
                .filter(|s| {
                    running += s.population_proportion;
                    running < c
                })
                .count();
            (below + 1).min(sorted.len())
        }
    };
    let rest = sorted[keep..].to_vec();
    let kept = sorted[..keep].to_vec();
    merge(benchmark, kept, rest, others_label)
}

/// Keep every benchmark stratum the sample observes, then the largest of
/// the rest while the running sum stays within `coverage_target`, plus one
/// more if the target is still not met.
pub fn create_adaptive_simplification(
    benchmark: &Benchmark,
    sample: &Sample,
    coverage_target: f64,
    others_label: &str,
) -> Result<Benchmark, SimplifyError> {
    if sample.dimension().columns != benchmark.dimension().columns {
        return Err(SimplifyError::DimensionMismatch {
            dimension: benchmark.dimension().name.clone(),
            sample_columns: sample.dimension().columns.clone(),
            benchmark_columns: benchmark.dimension().columns.clone(),
        });
    }

    let mut ordered: Vec<(&Stratum, bool)> = benchmark
        .sorted_descending()
        .into_iter()
        .map(|s| (s, sample.contains(&s.key)))
        .collect();
    // Stable: proportion order is kept within each group.
    ordered.sort_by_key(|&(_, in_sample)| !in_sample);

    let mut running = 0.0;
    let cumulative: Vec<f64> = ordered
        .iter()
        .map(|(s, _)| {
            running += s.population_proportion;
            running
        })
        .collect();

    let mut keep: Vec<bool> = ordered
        .iter()
        .zip(&cumulative)
        .map(|(&(_, in_sample), &cum)| in_sample || cum <= coverage_target)
        .collect();
    let kept_count = keep.iter().filter(|&&k| k).count();
    if kept_count < ordered.len() && (kept_count == 0 || cumulative[kept_count - 1] < coverage_target) {
        keep[kept_count] = true;
    }

    let (kept, rest): (Vec<_>, Vec<_>) = ordered.into_iter().zip(keep).partition(|&(_, k)| k);
    Ok(merge(
        benchmark,
        kept.into_iter().map(|((s, _), _)| s).collect(),
        rest.into_iter().map(|((s, _), _)| s).collect(),
        others_label,
    )?)
}

fn merge(
    benchmark: &Benchmark,
    kept: Vec<&Stratum>,
    rest: Vec<&Stratum>,
    others_label: &str,
) -> Result<Benchmark, BenchmarkError> {
    let others_mass: f64 = rest.iter().map(|s| s.population_proportion).sum();
    let mut strata: Vec<Stratum> = kept.into_iter().cloned().collect();

    if others_mass > 0.0 {
        let key = StratumKey::uniform(benchmark.dimension().width(), others_label);
        match strata.iter_mut().find(|s| s.key == key) {
            Some(existing) => existing.population_proportion += others_mass,
            None => strata.push(Stratum::new(key, others_mass)),
        }
    }

    Benchmark::new(benchmark.dimension().clone(), strata)
}

/// How much a simplification collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplificationImpact {
    pub original_strata: usize,
    pub simplified_strata: usize,
    /// `(original - simplified) / original`; 0 for an empty original.
    pub reduction_ratio: f64,
    pub others_proportion: f64,
    /// Original strata now represented by "Others".
    pub others_strata_count: usize,
    pub major_strata_coverage: f64,
}

pub fn analyze_simplification_impact(
    original: &Benchmark,
    simplified: &Benchmark,
    others_label: &str,
) -> SimplificationImpact {
    let original_strata = original.len();
    let simplified_strata = simplified.len();
    let others_key = StratumKey::uniform(simplified.dimension().width(), others_label);
    let others_proportion = simplified.proportion(&others_key);
    let has_others = others_proportion > 0.0;

    let reduction_ratio = if original_strata == 0 {
        0.0
    } else {
        (original_strata as f64 - simplified_strata as f64) / original_strata as f64
    };

    SimplificationImpact {
        original_strata,
        simplified_strata,
        reduction_ratio,
        others_proportion,
        others_strata_count: (original_strata + usize::from(has_others)).saturating_sub(simplified_strata),
        major_strata_coverage: 1.0 - others_proportion,
    }
}
