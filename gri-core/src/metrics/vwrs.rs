//! Variance-Weighted Representativeness Score.
//!
//! Each stratum's deviation `|s_i - q_i|` is weighted by
//! `w_i = q_i * se_i * r_i`:
//! - `se_i = sqrt(s_i (1 - s_i) / n_i)` for observed strata, 1.0 otherwise
//! - `r_i = 1 - internal_variance_i` (0.75 when no variance is measured)
//!
//! `VWRS = 1 - Σ w_i |s_i - q_i| / Σ w_i`. Rare strata and strata with
//! unreliable estimates carry less weight than they do under GRI.

use serde::{Deserialize, Serialize};

use super::{check_dimensions, join, MetricError};
use crate::domain::variance::variance_or_default;
use crate::domain::{Benchmark, InternalVarianceMap, Sample, StratumKey};

/// Standard error reported for a stratum with no observed units.
pub const UNSAMPLED_STANDARD_ERROR: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwrsRow {
    pub key: StratumKey,
    pub population_proportion: f64,
    pub sample_proportion: f64,
    pub sample_count: u64,
    pub standard_error: f64,
    pub reliability: f64,
    pub weight: f64,
    pub absolute_deviation: f64,
    pub gri_contribution: f64,
    /// `weight * absolute_deviation`.
    pub weighted_error: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VwrsBreakdown {
    pub total_weight: f64,
    pub weighted_error: f64,
    pub rows: Vec<VwrsRow>,
}

fn standard_error(p: f64, n: u64) -> f64 {
    if n == 0 {
        return UNSAMPLED_STANDARD_ERROR;
    }
    (p * (1.0 - p) / n as f64).max(0.0).sqrt()
}

/// Compute VWRS and its per-stratum table.
///
/// A zero total weight (e.g. every population proportion is 0) scores 0.0.
pub fn calculate_vwrs(
    sample: &Sample,
    benchmark: &Benchmark,
    internal_variance: Option<&InternalVarianceMap>,
) -> Result<(f64, VwrsBreakdown), MetricError> {
    check_dimensions(sample, benchmark)?;

    let rows: Vec<VwrsRow> = join(sample, benchmark)
        .into_iter()
        .map(|row| {
            let se = standard_error(row.sample_proportion, row.sample_count);
            let reliability = 1.0 - variance_or_default(internal_variance, &row.key);
            let weight = row.population_proportion * se * reliability;
            let absolute_deviation = (row.sample_proportion - row.population_proportion).abs();
            VwrsRow {
                population_proportion: row.population_proportion,
                sample_proportion: row.sample_proportion,
                sample_count: row.sample_count,
                standard_error: se,
                reliability,
                weight,
                absolute_deviation,
                gri_contribution: 0.5 * absolute_deviation,
                weighted_error: weight * absolute_deviation,
                key: row.key,
            }
        })
        .collect();

    let total_weight: f64 = rows.iter().map(|r| r.weight).sum();
    let weighted_error: f64 = rows.iter().map(|r| r.weighted_error).sum();

    let score = if total_weight > 0.0 {
        1.0 - weighted_error / total_weight
    } else {
        0.0
    };

    Ok((
        score,
        VwrsBreakdown {
            total_weight,
            weighted_error,
            rows,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn unsampled_stratum_has_max_uncertainty() {
        let b = benchmark(&[("A", 0.6), ("B", 0.4)]);
        let s = sample(&[("B", 100)]);
        let (score, breakdown) = calculate_vwrs(&s, &b, None).unwrap();
        let a = &breakdown.rows[0];
        assert_eq!(a.standard_error, 1.0);
        assert_eq!(a.reliability, 0.75);
        assert!((a.weight - 0.45).abs() < 1e-12);
        // B: s = 1.0 → se = 0 → zero weight; only A's deviation counts.
        assert!((score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn all_zero_population_scores_zero() {
        let b = benchmark(&[("A", 0.0), ("B", 0.0)]);
        let s = sample(&[("A", 5), ("B", 5)]);
        let (score, breakdown) = calculate_vwrs(&s, &b, None).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(breakdown.total_weight, 0.0);
    }

    #[test]
    fn perfect_match_scores_one() {
        let b = benchmark(&[("A", 0.5), ("B", 0.3), ("C", 0.2)]);
        let s = sample(&[("A", 50), ("B", 30), ("C", 20)]);
        let (score, _) = calculate_vwrs(&s, &b, None).unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn measured_variance_changes_reliability() {
        let b = benchmark(&[("A", 0.5), ("B", 0.5)]);
        let s = sample(&[("A", 70), ("B", 30)]);
        let variances = InternalVarianceMap::from_pairs([("A", 0.05)]).unwrap();
        let (_, breakdown) = calculate_vwrs(&s, &b, Some(&variances)).unwrap();
        assert!((breakdown.rows[0].reliability - 0.95).abs() < 1e-12);
        assert_eq!(breakdown.rows[1].reliability, 0.75);
    }

    #[test]
    fn uniform_reliability_cancels_out() {
        let b = benchmark(&[("A", 0.5), ("B", 0.5)]);
        let s = sample(&[("A", 70), ("B", 30)]);
        let (default_score, _) = calculate_vwrs(&s, &b, None).unwrap();
        let flat = InternalVarianceMap::from_pairs([("A", 0.1), ("B", 0.1)]).unwrap();
        let (flat_score, _) = calculate_vwrs(&s, &b, Some(&flat)).unwrap();
        assert!((default_score - flat_score).abs() < 1e-12);
    }

    #[test]
    fn many_small_missing_strata_score_better_than_one_merged() {
        // The same 20% of the population is missing in both benchmarks.
        let mut fine: Vec<(String, f64)> = (0..10).map(|i| (format!("S{i}"), 0.02)).collect();
        fine.push(("A".into(), 0.8));
        let fine_b =
            Benchmark::from_pairs(dim(), fine.iter().map(|(k, p)| (k.as_str(), *p))).unwrap();
        let coarse_b = benchmark(&[("A", 0.8), ("Others", 0.2)]);
        let s = sample(&[("A", 100)]);

        let (fine_score, _) = calculate_vwrs(&s, &fine_b, None).unwrap();
        let (coarse_score, _) = calculate_vwrs(&s, &coarse_b, None).unwrap();
        assert!((fine_score - 0.98).abs() < 1e-12);
        assert!((coarse_score - 0.8).abs() < 1e-12);
    }
}
