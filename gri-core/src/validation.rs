//! Data-quality checks. Findings are warnings for the caller to report;
//! nothing here rejects input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Benchmark, Sample};

pub const TOTAL_TOLERANCE: f64 = 0.01;
pub const LARGE_PROPORTION: f64 = 0.5;
pub const MANY_STRATA: usize = 10_000;
/// Fraction of sampled strata that should be found in the benchmark.
pub const LOW_OVERLAP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BenchmarkIssue {
    Empty,
    TotalOutOfTolerance { total: f64 },
    NegativeProportion { key: String, value: f64 },
    LargeProportion { key: String, value: f64 },
    FewStrata { count: usize },
    ManyStrata { count: usize },
}

impl BenchmarkIssue {
    pub fn severity(&self) -> Severity {
        match self {
            BenchmarkIssue::LargeProportion { .. } | BenchmarkIssue::ManyStrata { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for BenchmarkIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkIssue::Empty => write!(f, "benchmark has no strata"),
            BenchmarkIssue::TotalOutOfTolerance { total } => {
                write!(f, "population proportions sum to {total:.4}, expected ~1.0")
            }
            BenchmarkIssue::NegativeProportion { key, value } => {
                write!(f, "stratum '{key}' has negative proportion {value}")
            }
            BenchmarkIssue::LargeProportion { key, value } => {
                write!(f, "stratum '{key}' holds an unusually large share ({value:.4})")
            }
            BenchmarkIssue::FewStrata { count } => write!(f, "benchmark has only {count} stratum"),
            BenchmarkIssue::ManyStrata { count } => {
                write!(f, "benchmark has {count} strata, scoring may be slow")
            }
        }
    }
}

pub fn validate_benchmark(benchmark: &Benchmark) -> Vec<BenchmarkIssue> {
    if benchmark.is_empty() {
        return vec![BenchmarkIssue::Empty];
    }
    let mut issues = Vec::new();

    let total = benchmark.total();
    if (total - 1.0).abs() > TOTAL_TOLERANCE {
        issues.push(BenchmarkIssue::TotalOutOfTolerance { total });
    }
    for s in benchmark.strata() {
        if s.population_proportion < 0.0 {
            issues.push(BenchmarkIssue::NegativeProportion {
                key: s.key.joined(),
                value: s.population_proportion,
            });
        } else if s.population_proportion > LARGE_PROPORTION {
            issues.push(BenchmarkIssue::LargeProportion {
                key: s.key.joined(),
                value: s.population_proportion,
            });
        }
    }
    match benchmark.len() {
        1 => issues.push(BenchmarkIssue::FewStrata { count: 1 }),
        n if n > MANY_STRATA => issues.push(BenchmarkIssue::ManyStrata { count: n }),
        _ => {}
    }
    issues
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleIssue {
    Empty,
    DimensionMismatch {
        sample_columns: Vec<String>,
        benchmark_columns: Vec<String>,
    },
    /// Sampled strata the benchmark does not list.
    UnknownStrata { keys: Vec<String> },
    NoCommonStrata,
    LowOverlap { overlap_pct: f64 },
}

impl fmt::Display for SampleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleIssue::Empty => write!(f, "sample is empty"),
            SampleIssue::DimensionMismatch {
                sample_columns,
                benchmark_columns,
            } => write!(
                f,
                "sample columns {sample_columns:?} do not match benchmark columns {benchmark_columns:?}"
            ),
            SampleIssue::UnknownStrata { keys } => {
                write!(f, "{} sampled strata missing from benchmark", keys.len())?;
                if let Some(first) = keys.first() {
                    write!(f, " (e.g. '{first}')")?;
                }
                Ok(())
            }
            SampleIssue::NoCommonStrata => write!(f, "no common strata between sample and benchmark"),
            SampleIssue::LowOverlap { overlap_pct } => {
                write!(f, "low strata overlap: {overlap_pct:.1}% of sampled strata found in benchmark")
            }
        }
    }
}

pub fn validate_sample(sample: &Sample, benchmark: &Benchmark) -> Vec<SampleIssue> {
    if sample.dimension().columns != benchmark.dimension().columns {
        return vec![SampleIssue::DimensionMismatch {
            sample_columns: sample.dimension().columns.clone(),
            benchmark_columns: benchmark.dimension().columns.clone(),
        }];
    }
    if sample.is_empty() {
        return vec![SampleIssue::Empty];
    }

    let unknown: Vec<String> = sample
        .strata()
        .filter(|(key, _)| !benchmark.contains(key))
        .map(|(key, _)| key.joined())
        .collect();
    let distinct = sample.distinct_strata();
    let overlap = distinct - unknown.len();

    let mut issues = Vec::new();
    if overlap == 0 {
        issues.push(SampleIssue::NoCommonStrata);
    } else if (overlap as f64) < distinct as f64 * LOW_OVERLAP {
        issues.push(SampleIssue::LowOverlap {
            overlap_pct: overlap as f64 / distinct as f64 * 100.0,
        });
    }
    if !unknown.is_empty() {
        issues.push(SampleIssue::UnknownStrata { keys: unknown });
    }
    issues
}
