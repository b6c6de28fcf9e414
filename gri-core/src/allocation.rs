//! AllocationOptimizer: Neyman allocation of a fixed sample size across strata.
//!
//! `n_i = round(N * q_i σ_i / Σ_j q_j σ_j)` with `σ_i = sqrt(variance_i)`,
//! variance defaulting to 0.25. Independent rounding can miss `N`; the
//! residual is applied in one step at the largest allocation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::variance::variance_or_default;
use crate::domain::{Benchmark, InternalVarianceMap, StratumKey};
use crate::metrics::strategic_targets;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("dimension '{dimension}': cannot allocate {total} units across zero strata")]
    NoStrata { dimension: String, total: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub key: StratumKey,
    pub count: u64,
}

/// Stratum → count, in benchmark order. Counts always sum to the requested total.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub rows: Vec<Allocation>,
}

impl AllocationPlan {
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn get(&self, key: &StratumKey) -> Option<u64> {
        self.rows.iter().find(|r| &r.key == key).map(|r| r.count)
    }

    pub fn counts(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.count).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Neyman allocation of `total_n` units.
///
/// Negative proportions are treated as zero weight. With zero total weight
/// every raw count is 0 and the whole of `total_n` lands on the first stratum.
pub fn optimal_allocation(
    benchmark: &Benchmark,
    total_n: u64,
    variances: Option<&InternalVarianceMap>,
) -> Result<AllocationPlan, AllocationError> {
    if benchmark.is_empty() {
        if total_n == 0 {
            return Ok(AllocationPlan::default());
        }
        return Err(AllocationError::NoStrata {
            dimension: benchmark.dimension().name.clone(),
            total: total_n,
        });
    }

    let weights: Vec<f64> = benchmark
        .strata()
        .iter()
        .map(|s| s.population_proportion.max(0.0) * variance_or_default(variances, &s.key).sqrt())
        .collect();
    let total_weight: f64 = weights.iter().sum();

    let mut counts: Vec<u64> = weights
        .iter()
        .map(|&w| {
            if total_weight > 0.0 {
                (total_n as f64 * w / total_weight).round_ties_even() as u64
            } else {
                0
            }
        })
        .collect();

    fix_residual(&mut counts, total_n);

    Ok(AllocationPlan {
        rows: benchmark
            .strata()
            .iter()
            .zip(counts)
            .map(|(s, count)| Allocation {
                key: s.key.clone(),
                count,
            })
            .collect(),
    })
}

/// Bring `counts` to sum exactly `target` by adjusting the largest entry
/// (first one on ties).
///
/// A shortfall is added there in full. An excess is removed there; if that
/// entry holds fewer units than the excess, the remainder comes off the
/// next-largest entries so no count goes negative.
fn fix_residual(counts: &mut [u64], target: u64) {
    let allocated: u64 = counts.iter().sum();
    if allocated == target || counts.is_empty() {
        return;
    }

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]));

    if allocated < target {
        counts[order[0]] += target - allocated;
        return;
    }

    let mut excess = allocated - target;
    for i in order {
        if excess == 0 {
            break;
        }
        let taken = excess.min(counts[i]);
        counts[i] -= taken;
        excess -= taken;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationComparison {
    pub key: StratumKey,
    pub population_proportion: f64,
    pub proportional_n: u64,
    pub strategic_n: u64,
    pub difference: i64,
    /// `strategic_target / population_proportion`; `None` for an empty stratum.
    pub strategic_boost: Option<f64>,
}

/// Proportional versus square-root (strategic) allocation of `total_n`,
/// largest population share first. Counts are rounded independently and are
/// not corrected to sum to `total_n`.
pub fn compare_allocation_methods(benchmark: &Benchmark, total_n: u64) -> Vec<AllocationComparison> {
    let targets = strategic_targets(benchmark);
    let n = total_n as f64;

    benchmark
        .sorted_descending()
        .into_iter()
        .map(|s| {
            let q = s.population_proportion.max(0.0);
            let t = targets.get(&s.key).copied().unwrap_or(0.0);
            let proportional_n = (n * q).round_ties_even() as u64;
            let strategic_n = (n * t).round_ties_even() as u64;
            AllocationComparison {
                key: s.key.clone(),
                population_proportion: s.population_proportion,
                proportional_n,
                strategic_n,
                difference: strategic_n as i64 - proportional_n as i64,
                strategic_boost: (q > 0.0).then(|| t / q),
            }
        })
        .collect()
}
