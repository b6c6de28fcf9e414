//! Scorecard configuration loaded from TOML.
//!
//! ```toml
//! [simulation]
//! n_simulations = 1000
//! seed = 42
//! threads = 4
//!
//! [[dimensions]]
//! name = "Country"
//! columns = ["country"]
//! benchmark = "benchmarks/country.csv"
//! simplification = { mode = "formulaic", policy = "top_n", value = 30 }
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use gri_core::domain::{Dimension, StratumKey, KEY_SEPARATOR};
use gri_core::simplify::{BenchmarkMode, SimplificationPolicy, DEFAULT_OTHERS_LABEL};
use gri_core::simulation::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which formulaic rule a dimension uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Threshold,
    TopN,
    MinCoverage,
}

/// Benchmark simplification for one dimension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SimplificationConfig {
    #[default]
    None,
    Formulaic { policy: PolicyKind, value: f64 },
    Adaptive {
        #[serde(default = "default_coverage_target")]
        coverage_target: f64,
    },
    /// Strata to keep, multi-column keys joined with `" × "`.
    FixedList { strata: Vec<String> },
}

fn default_coverage_target() -> f64 {
    0.95
}

impl SimplificationConfig {
    /// Core mode for a dimension of `width` columns.
    pub fn to_mode(&self, width: usize) -> Result<BenchmarkMode, ConfigError> {
        Ok(match self {
            SimplificationConfig::None => BenchmarkMode::None,
            SimplificationConfig::Formulaic { policy, value } => {
                let policy = match policy {
                    PolicyKind::Threshold => SimplificationPolicy::Threshold(*value),
                    PolicyKind::MinCoverage => SimplificationPolicy::MinCoverage(*value),
                    PolicyKind::TopN => {
                        if *value < 1.0 || value.fract() != 0.0 {
                            return Err(ConfigError::Invalid(format!(
                                "top_n must be a positive integer, got {value}"
                            )));
                        }
                        SimplificationPolicy::TopN(*value as usize)
                    }
                };
                BenchmarkMode::Formulaic(policy)
            }
            SimplificationConfig::Adaptive { coverage_target } => {
                BenchmarkMode::Adaptive(*coverage_target)
            }
            SimplificationConfig::FixedList { strata } => {
                let keys = strata
                    .iter()
                    .map(|joined| {
                        let key = StratumKey::new(joined.split(KEY_SEPARATOR));
                        if key.width() == width {
                            Ok(key)
                        } else {
                            Err(ConfigError::Invalid(format!(
                                "fixed_list stratum '{joined}' has {} values, expected {width}",
                                key.width()
                            )))
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                BenchmarkMode::FixedList(keys)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    pub name: String,
    pub columns: Vec<String>,
    /// Benchmark CSV: the dimension columns plus `population_proportion`.
    pub benchmark: PathBuf,
    #[serde(default)]
    pub simplification: SimplificationConfig,
    /// Optional `stratum,variance` CSV.
    #[serde(default)]
    pub variance_file: Option<PathBuf>,
    #[serde(default)]
    pub others_label: Option<String>,
}

impl DimensionConfig {
    pub fn dimension(&self) -> Dimension {
        Dimension::new(self.name.clone(), self.columns.iter().cloned())
    }

    pub fn others_label(&self) -> &str {
        self.others_label.as_deref().unwrap_or(DEFAULT_OTHERS_LABEL)
    }
}

/// Everything a scorecard run needs. Passed explicitly; never global.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScorecardConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub dimensions: Vec<DimensionConfig>,
}

impl ScorecardConfig {
    /// Load and validate a config file; relative paths resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.n_simulations == 0 {
            return Err(ConfigError::Invalid("simulation.n_simulations must be at least 1".into()));
        }
        if self.simulation.threads == 0 {
            return Err(ConfigError::Invalid("simulation.threads must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if dim.columns.is_empty() {
                return Err(ConfigError::Invalid(format!("dimension '{}' has no columns", dim.name)));
            }
            if !seen.insert(dim.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate dimension '{}'", dim.name)));
            }
            match &dim.simplification {
                SimplificationConfig::Formulaic {
                    policy: PolicyKind::Threshold | PolicyKind::MinCoverage,
                    value,
                }
                | SimplificationConfig::Adaptive {
                    coverage_target: value,
                } if !(0.0..=1.0).contains(value) => {
                    return Err(ConfigError::Invalid(format!(
                        "dimension '{}': simplification value {value} outside [0, 1]",
                        dim.name
                    )));
                }
                other => {
                    other.to_mode(dim.columns.len())?;
                }
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for dim in &mut self.dimensions {
            if dim.benchmark.is_relative() {
                dim.benchmark = base.join(&dim.benchmark);
            }
            if let Some(v) = dim.variance_file.as_mut().filter(|v| v.is_relative()) {
                *v = base.join(&*v);
            }
        }
    }
}
