use serde::{Deserialize, Serialize};

use super::{check_dimensions, join, MetricError};
use crate::domain::{Benchmark, Sample, StratumKey};

/// Per-stratum coverage detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityRow {
    pub key: StratumKey,
    pub population_proportion: f64,
    pub sample_count: u64,
    pub sample_proportion: f64,
    /// Population proportion strictly above the threshold.
    pub relevant: bool,
    /// Relevant and observed at least once.
    pub covered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityBreakdown {
    pub score: f64,
    pub threshold: f64,
    pub relevant_strata: usize,
    pub covered_strata: usize,
    pub rows: Vec<DiversityRow>,
}

/// Default relevance threshold for a live sample of size `n`: `1 / (2n)`.
pub fn default_threshold(n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        1.0 / (2.0 * n as f64)
    }
}

/// Share of relevant benchmark strata observed at least once.
///
/// `threshold` defaults to `1/(2N)`. Returns 0.0 for an empty sample and
/// 1.0 when no stratum clears the threshold.
pub fn calculate_diversity_score(
    sample: &Sample,
    benchmark: &Benchmark,
    threshold: Option<f64>,
) -> Result<f64, MetricError> {
    diversity_breakdown(sample, benchmark, threshold).map(|b| b.score)
}

/// [`calculate_diversity_score`] with the per-stratum table.
pub fn diversity_breakdown(
    sample: &Sample,
    benchmark: &Benchmark,
    threshold: Option<f64>,
) -> Result<DiversityBreakdown, MetricError> {
    check_dimensions(sample, benchmark)?;
    let threshold = threshold.unwrap_or_else(|| default_threshold(sample.total()));

    let rows: Vec<DiversityRow> = join(sample, benchmark)
        .into_iter()
        .map(|row| {
            let relevant = row.population_proportion > threshold;
            DiversityRow {
                covered: relevant && row.sample_count > 0,
                relevant,
                key: row.key,
                population_proportion: row.population_proportion,
                sample_count: row.sample_count,
                sample_proportion: row.sample_proportion,
            }
        })
        .collect();

    let relevant_strata = rows.iter().filter(|r| r.relevant).count();
    let covered_strata = rows.iter().filter(|r| r.covered).count();

    let score = if sample.is_empty() {
        0.0
    } else if relevant_strata == 0 {
        1.0
    } else {
        covered_strata as f64 / relevant_strata as f64
    };

    Ok(DiversityBreakdown {
        score,
        threshold,
        relevant_strata,
        covered_strata,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn below_threshold_strata_are_ignored() {
        // N = 10 → threshold 0.05; B (0.04) is not relevant.
        let b = benchmark(&[("A", 0.5), ("B", 0.04)]);
        let s = sample(&[("A", 10)]);
        let out = diversity_breakdown(&s, &b, None).unwrap();
        assert_eq!(out.threshold, 0.05);
        assert_eq!(out.relevant_strata, 1);
        assert_eq!(out.score, 1.0);
    }

    #[test]
    fn partial_coverage() {
        let b = benchmark(&[("A", 0.4), ("B", 0.3), ("C", 0.2), ("D", 0.1)]);
        let s = sample(&[("A", 5), ("C", 5)]);
        assert_eq!(calculate_diversity_score(&s, &b, None).unwrap(), 0.5);
    }

    #[test]
    fn empty_sample_scores_zero_even_with_no_relevant_strata() {
        let b = benchmark(&[("A", 0.0)]);
        let s = sample(&[]);
        assert_eq!(calculate_diversity_score(&s, &b, Some(0.5)).unwrap(), 0.0);
    }

    #[test]
    fn no_relevant_strata_is_vacuous_coverage() {
        let b = benchmark(&[("A", 0.5), ("B", 0.5)]);
        let s = sample(&[("Z", 3)]);
        assert_eq!(calculate_diversity_score(&s, &b, Some(0.9)).unwrap(), 1.0);
    }

    #[test]
    fn sample_only_strata_are_never_relevant() {
        let b = benchmark(&[("A", 1.0)]);
        let s = sample(&[("A", 1), ("Z", 1)]);
        let out = diversity_breakdown(&s, &b, None).unwrap();
        assert_eq!(out.relevant_strata, 1);
        assert_eq!(out.covered_strata, 1);
    }
}
