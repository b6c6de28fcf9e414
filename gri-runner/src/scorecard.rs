//! Multi-dimension scorecards.
//!
//! For each configured dimension: load the benchmark, apply its
//! simplification, score the participant sample with all four metrics and
//! compare against the Monte Carlo ceiling at the sample's size. VWRS and SRI
//! read the simplified benchmark; GRI and Diversity read the full one.

use chrono::{DateTime, Utc};
use gri_core::metrics::{
    calculate_diversity_score, calculate_gri, calculate_sri, calculate_vwrs, MetricError,
    VwrsBreakdown,
};
use gri_core::simplify::SimplifyError;
use gri_core::simulation::{
    build_thread_pool, efficiency_ratio, monte_carlo_with_hooks, SimulationError, SimulationResult,
    TrialHooks,
};
use rayon::ThreadPool;
use gri_core::validation::{validate_benchmark, validate_sample};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::config::{ConfigError, DimensionConfig, ScorecardConfig};
use crate::data_loader::{load_benchmark, load_variances, LoadError, Table};

/// Bumped whenever the persisted scorecard layout changes.
pub const SCHEMA_VERSION: u32 = 1;

pub const OVERALL_LABEL: &str = "Overall (Average)";

#[derive(Debug, Error)]
pub enum ScorecardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Why a single dimension could not be scored.
#[derive(Debug, Error)]
pub enum DimensionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Simplify(#[from] SimplifyError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Scores for one dimension. Metric fields are `None` when the dimension
/// failed; `error` then says why.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub columns: Vec<String>,
    pub sample_size: u64,
    pub skipped_rows: usize,
    pub benchmark_strata: usize,
    pub simplified_strata: usize,
    pub gri: Option<f64>,
    pub diversity: Option<f64>,
    pub sri: Option<f64>,
    pub vwrs: Option<f64>,
    pub max_gri: Option<f64>,
    pub max_diversity: Option<f64>,
    /// Live GRI (raw benchmark) as a percentage of the ceiling. The ceiling
    /// is simulated on the benchmark rescaled to unit mass, so a benchmark
    /// whose total drifts from 1 compares against a slightly different base.
    pub gri_pct_of_max: Option<f64>,
    /// Live Diversity as a percentage of the simulated ceiling.
    pub diversity_pct_of_max: Option<f64>,
    pub gri_efficiency: Option<f64>,
    pub diversity_efficiency: Option<f64>,
    /// Data-quality warnings from validation.
    pub issues: Vec<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vwrs_breakdown: Option<VwrsBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationResult>,
}

impl DimensionScore {
    fn empty(dim: &DimensionConfig) -> Self {
        Self {
            dimension: dim.name.clone(),
            columns: dim.columns.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub participants_path: PathBuf,
    pub participants: usize,
    pub rows: Vec<DimensionScore>,
    /// Mean of each metric over the dimensions that produced it.
    pub overall: DimensionScore,
}

impl Scorecard {
    pub fn row(&self, dimension: &str) -> Option<&DimensionScore> {
        self.rows.iter().find(|r| r.dimension == dimension)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DimensionScore> {
        self.rows.iter().filter(|r| r.error.is_some())
    }
}

/// Score `participants_path` on every dimension of `config`.
///
/// Only an unreadable participant file or an invalid config aborts; any
/// per-dimension failure lands in that row's `error`.
pub fn build_scorecard(config: &ScorecardConfig, participants_path: &Path) -> Result<Scorecard, ScorecardError> {
    config.validate()?;
    let table = Table::read(participants_path)?;
    let pool = build_thread_pool(config.simulation.threads)?;
    info!(
        path = %participants_path.display(),
        participants = table.len(),
        dimensions = config.dimensions.len(),
        "building scorecard"
    );

    let rows: Vec<DimensionScore> = config
        .dimensions
        .iter()
        .map(|dim| {
            let _span = info_span!("dimension", name = %dim.name).entered();
            let mut row = DimensionScore::empty(dim);
            if let Err(e) = score_dimension(config, pool.as_ref(), dim, &table, &mut row) {
                warn!(error = %e, "dimension failed");
                row.error = Some(e.to_string());
            }
            row
        })
        .collect();

    let overall = overall_row(&rows, table.len());
    Ok(Scorecard {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        participants_path: participants_path.to_path_buf(),
        participants: table.len(),
        rows,
        overall,
    })
}

fn score_dimension(
    config: &ScorecardConfig,
    pool: Option<&ThreadPool>,
    dim: &DimensionConfig,
    table: &Table,
    row: &mut DimensionScore,
) -> Result<(), DimensionError> {
    let dimension = dim.dimension();
    let loaded = table.sample(&dimension)?;
    if loaded.skipped_rows > 0 {
        warn!(skipped = loaded.skipped_rows, "rows with empty dimension values skipped");
    }
    let sample = loaded.sample;
    row.sample_size = sample.total();
    row.skipped_rows = loaded.skipped_rows;

    let benchmark = load_benchmark(&dim.benchmark, &dimension)?;
    row.benchmark_strata = benchmark.len();

    for issue in validate_benchmark(&benchmark) {
        warn!(%issue, "benchmark issue");
        row.issues.push(issue.to_string());
    }
    for issue in validate_sample(&sample, &benchmark) {
        warn!(%issue, "sample issue");
        row.issues.push(issue.to_string());
    }

    let variances = dim
        .variance_file
        .as_deref()
        .map(|p| load_variances(p, &dimension))
        .transpose()?;

    let mode = dim.simplification.to_mode(dimension.width())?;
    let simplified = mode.apply_with_label(&benchmark, Some(&sample), dim.others_label())?;
    row.simplified_strata = simplified.len();

    let gri = calculate_gri(&sample, &benchmark)?;
    let diversity = calculate_diversity_score(&sample, &benchmark, None)?;
    let (sri, _) = calculate_sri(&sample, &simplified)?;
    let (vwrs, breakdown) = calculate_vwrs(&sample, &simplified, variances.as_ref())?;
    row.gri = Some(gri);
    row.diversity = Some(diversity);
    row.sri = Some(sri);
    row.vwrs = Some(vwrs);
    row.vwrs_breakdown = Some(breakdown);

    if sample.total() > 0 && !benchmark.is_empty() {
        let hooks = TrialHooks {
            pool,
            ..TrialHooks::default()
        };
        let sim = monte_carlo_with_hooks(&benchmark, sample.total(), &config.simulation, hooks)?;
        let (max_gri, max_div) = (sim.max_gri.mean, sim.max_diversity.mean);
        row.max_gri = Some(max_gri);
        row.max_diversity = Some(max_div);
        row.gri_pct_of_max = (max_gri > 0.0).then(|| gri / max_gri * 100.0);
        row.diversity_pct_of_max = (max_div > 0.0).then(|| diversity / max_div * 100.0);
        row.gri_efficiency = Some(efficiency_ratio(gri, max_gri));
        row.diversity_efficiency = Some(efficiency_ratio(diversity, max_div));
        row.simulation = Some(sim);
    }

    info!(
        n = row.sample_size,
        strata = row.benchmark_strata,
        simplified = row.simplified_strata,
        gri,
        diversity,
        sri,
        vwrs,
        "dimension scored"
    );
    Ok(())
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

fn overall_row(rows: &[DimensionScore], participants: usize) -> DimensionScore {
    DimensionScore {
        dimension: OVERALL_LABEL.to_string(),
        sample_size: participants as u64,
        gri: mean_of(rows.iter().map(|r| r.gri)),
        diversity: mean_of(rows.iter().map(|r| r.diversity)),
        sri: mean_of(rows.iter().map(|r| r.sri)),
        vwrs: mean_of(rows.iter().map(|r| r.vwrs)),
        max_gri: mean_of(rows.iter().map(|r| r.max_gri)),
        max_diversity: mean_of(rows.iter().map(|r| r.max_diversity)),
        ..DimensionScore::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gri: Option<f64>, vwrs: Option<f64>) -> DimensionScore {
        DimensionScore {
            gri,
            vwrs,
            ..DimensionScore::default()
        }
    }

    #[test]
    fn overall_averages_available_scores() {
        let rows = vec![row(Some(0.8), Some(0.9)), row(None, None), row(Some(0.6), None)];
        let overall = overall_row(&rows, 12);
        assert_eq!(overall.dimension, OVERALL_LABEL);
        assert!((overall.gri.unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(overall.vwrs, Some(0.9));
        assert_eq!(overall.sri, None);
        assert_eq!(overall.sample_size, 12);
    }

    #[test]
    fn missing_participants_file_is_fatal() {
        let config = ScorecardConfig::default();
        let err = build_scorecard(&config, Path::new("/nonexistent/participants.csv")).unwrap_err();
        assert!(matches!(err, ScorecardError::Load(LoadError::Csv { .. })));
    }
}
