//! Reference population distribution over one dimension.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use super::dimension::Dimension;
use super::stratum::{Stratum, StratumKey};
use crate::fingerprint::BenchmarkFingerprint;

/// Errors raised while constructing or reshaping a benchmark.
///
/// Data-quality problems (negative proportions, totals far from 1.0) are not
/// errors; see [`crate::validation::validate_benchmark`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BenchmarkError {
    #[error("dimension '{dimension}': stratum '{key}' has {found} values, expected {expected}")]
    KeyWidth {
        dimension: String,
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("dimension '{dimension}': duplicate stratum '{key}'")]
    DuplicateKey { dimension: String, key: String },

    #[error("dimension '{dimension}': stratum '{key}' has non-finite proportion {value}")]
    NonFiniteProportion {
        dimension: String,
        key: String,
        value: f64,
    },

    #[error("dimension '{dimension}': missing strata columns {missing:?}")]
    MissingStrataColumns {
        dimension: String,
        missing: Vec<String>,
    },
}

/// Immutable set of strata with population proportions.
///
/// Strata keep the order they were supplied in; lookups by key go through an
/// index built at construction.
#[derive(Debug, Clone, Serialize)]
pub struct Benchmark {
    dimension: Dimension,
    strata: Vec<Stratum>,
    #[serde(skip)]
    index: HashMap<StratumKey, usize>,
}

impl PartialEq for Benchmark {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.strata == other.strata
    }
}

impl Benchmark {
    pub fn new(dimension: Dimension, strata: Vec<Stratum>) -> Result<Self, BenchmarkError> {
        let mut index = HashMap::with_capacity(strata.len());
        for (i, stratum) in strata.iter().enumerate() {
            if stratum.key.width() != dimension.width() {
                return Err(BenchmarkError::KeyWidth {
                    dimension: dimension.name.clone(),
                    key: stratum.key.joined(),
                    expected: dimension.width(),
                    found: stratum.key.width(),
                });
            }
            if !stratum.population_proportion.is_finite() {
                return Err(BenchmarkError::NonFiniteProportion {
                    dimension: dimension.name.clone(),
                    key: stratum.key.joined(),
                    value: stratum.population_proportion,
                });
            }
            if index.insert(stratum.key.clone(), i).is_some() {
                return Err(BenchmarkError::DuplicateKey {
                    dimension: dimension.name.clone(),
                    key: stratum.key.joined(),
                });
            }
        }
        Ok(Self {
            dimension,
            strata,
            index,
        })
    }

    /// Convenience constructor from `(key, proportion)` pairs.
    pub fn from_pairs<I, K>(dimension: Dimension, pairs: I) -> Result<Self, BenchmarkError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<StratumKey>,
    {
        let strata = pairs
            .into_iter()
            .map(|(key, p)| Stratum::new(key, p))
            .collect();
        Self::new(dimension, strata)
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    pub fn len(&self) -> usize {
        self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }

    pub fn contains(&self, key: &StratumKey) -> bool {
        self.index.contains_key(key)
    }

    /// Population proportion of `key`, zero when the benchmark has no such stratum.
    pub fn proportion(&self, key: &StratumKey) -> f64 {
        self.index
            .get(key)
            .map(|&i| self.strata[i].population_proportion)
            .unwrap_or(0.0)
    }

    /// Proportions in stratum order.
    pub fn proportions(&self) -> Vec<f64> {
        self.strata.iter().map(|s| s.population_proportion).collect()
    }

    pub fn total(&self) -> f64 {
        self.strata.iter().map(|s| s.population_proportion).sum()
    }

    /// Strata ordered by proportion, largest first. Ties keep input order.
    pub fn sorted_descending(&self) -> Vec<&Stratum> {
        let mut sorted: Vec<&Stratum> = self.strata.iter().collect();
        sorted.sort_by(|a, b| {
            b.population_proportion
                .partial_cmp(&a.population_proportion)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    /// Collapse onto a coarser dimension whose columns are a subset of this
    /// one's, summing proportions of strata that become identical.
    pub fn aggregate(&self, target: Dimension) -> Result<Self, BenchmarkError> {
        let indices = self.dimension.project(&target.columns).map_err(|missing| {
            BenchmarkError::MissingStrataColumns {
                dimension: target.name.clone(),
                missing,
            }
        })?;

        let mut order: Vec<StratumKey> = Vec::new();
        let mut sums: HashMap<StratumKey, f64> = HashMap::new();
        for stratum in &self.strata {
            let key = stratum.key.select(&indices);
            let entry = sums.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                0.0
            });
            *entry += stratum.population_proportion;
        }

        let strata = order
            .into_iter()
            .map(|key| {
                let p = sums[&key];
                Stratum::new(key, p)
            })
            .collect();
        Self::new(target, strata)
    }

    /// Content hash of the dimension and strata, stable across input order.
    pub fn fingerprint(&self) -> BenchmarkFingerprint {
        BenchmarkFingerprint::of(self)
    }
}
