//! Within-stratum response variance, used as a reliability discount.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::stratum::StratumKey;

/// Variance assumed for strata with no measurement: the maximum variance of a
/// Bernoulli variable (p = 0.5).
pub const DEFAULT_INTERNAL_VARIANCE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VarianceError {
    #[error("stratum '{key}': variance {value} outside [0, 1]")]
    OutOfRange { key: String, value: f64 },
}

/// Stratum key → variance in [0, 1]. Missing keys resolve to
/// [`DEFAULT_INTERNAL_VARIANCE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InternalVarianceMap {
    values: BTreeMap<String, f64>,
}

impl InternalVarianceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variance for a key. Keys are stored in joined form so that
    /// callers holding either representation resolve to the same entry.
    pub fn insert(&mut self, key: &StratumKey, variance: f64) -> Result<(), VarianceError> {
        self.insert_joined(&key.joined(), variance)
    }

    pub fn insert_joined(&mut self, joined: &str, variance: f64) -> Result<(), VarianceError> {
        if !(0.0..=1.0).contains(&variance) {
            return Err(VarianceError::OutOfRange {
                key: joined.to_string(),
                value: variance,
            });
        }
        self.values.insert(joined.to_string(), variance);
        Ok(())
    }

    pub fn from_pairs<I, K>(pairs: I) -> Result<Self, VarianceError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<StratumKey>,
    {
        let mut map = Self::new();
        for (key, v) in pairs {
            map.insert(&key.into(), v)?;
        }
        Ok(map)
    }

    /// Measured variance, if any.
    pub fn get(&self, key: &StratumKey) -> Option<f64> {
        self.values.get(&key.joined()).copied()
    }

    /// Measured variance or the default.
    pub fn variance(&self, key: &StratumKey) -> f64 {
        self.get(key).unwrap_or(DEFAULT_INTERNAL_VARIANCE)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.values().sum::<f64>() / self.values.len() as f64)
    }
}

/// Variance for `key` under an optional map.
pub(crate) fn variance_or_default(map: Option<&InternalVarianceMap>, key: &StratumKey) -> f64 {
    map.map(|m| m.variance(key))
        .unwrap_or(DEFAULT_INTERNAL_VARIANCE)
}
