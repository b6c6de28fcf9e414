//! Observed units aggregated to stratum counts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::dimension::Dimension;
use super::stratum::StratumKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("dimension '{dimension}': unit key '{key}' has {found} values, expected {expected}")]
    KeyWidth {
        dimension: String,
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("dimension '{dimension}': missing strata columns {missing:?}")]
    MissingStrataColumns {
        dimension: String,
        missing: Vec<String>,
    },
}

/// A multiset of observed units over one dimension, stored as per-stratum counts.
///
/// Only strata with at least one unit are stored. Iteration is in key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    dimension: Dimension,
    counts: BTreeMap<StratumKey, u64>,
    total: u64,
}

impl Sample {
    /// An empty sample (N = 0).
    pub fn empty(dimension: Dimension) -> Self {
        Self {
            dimension,
            counts: BTreeMap::new(),
            total: 0,
        }
    }

    /// Build from one key per observed unit.
    pub fn from_units<I, K>(dimension: Dimension, units: I) -> Result<Self, SampleError>
    where
        I: IntoIterator<Item = K>,
        K: Into<StratumKey>,
    {
        Self::from_counts(dimension, units.into_iter().map(|k| (k, 1)))
    }

    /// Build from `(key, count)` pairs. Repeated keys are summed.
    pub fn from_counts<I, K>(dimension: Dimension, pairs: I) -> Result<Self, SampleError>
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<StratumKey>,
    {
        let mut sample = Self::empty(dimension);
        for (key, count) in pairs {
            sample.add(key.into(), count)?;
        }
        Ok(sample)
    }

    fn add(&mut self, key: StratumKey, count: u64) -> Result<(), SampleError> {
        if key.width() != self.dimension.width() {
            return Err(SampleError::KeyWidth {
                dimension: self.dimension.name.clone(),
                key: key.joined(),
                expected: self.dimension.width(),
                found: key.width(),
            });
        }
        if count > 0 {
            *self.counts.entry(key).or_insert(0) += count;
            self.total += count;
        }
        Ok(())
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    /// N, the number of observed units.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, key: &StratumKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &StratumKey) -> bool {
        self.counts.contains_key(key)
    }

    /// `count / N`, zero for an empty sample.
    pub fn proportion(&self, key: &StratumKey) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.count(key) as f64 / self.total as f64
    }

    /// Observed strata with their counts, in key order.
    pub fn strata(&self) -> impl Iterator<Item = (&StratumKey, u64)> {
        self.counts.iter().map(|(k, &c)| (k, c))
    }

    /// Number of distinct observed strata.
    pub fn distinct_strata(&self) -> usize {
        self.counts.len()
    }

    /// Re-key onto a coarser dimension whose columns are a subset of this one's.
    pub fn aggregate(&self, target: Dimension) -> Result<Self, SampleError> {
        let indices = self.dimension.project(&target.columns).map_err(|missing| {
            SampleError::MissingStrataColumns {
                dimension: target.name.clone(),
                missing,
            }
        })?;
        let mut out = Self::empty(target);
        for (key, count) in &self.counts {
            out.add(key.select(&indices), *count)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country() -> Dimension {
        Dimension::new("Country", ["country"])
    }

    #[test]
    fn counts_units() {
        let s = Sample::from_units(country(), ["A", "B", "A", "A"]).unwrap();
        assert_eq!(s.total(), 4);
        assert_eq!(s.count(&"A".into()), 3);
        assert_eq!(s.proportion(&"B".into()), 0.25);
        assert_eq!(s.count(&"C".into()), 0);
        assert_eq!(s.distinct_strata(), 2);
    }

    #[test]
    fn zero_counts_are_not_stored() {
        let s = Sample::from_counts(country(), [("A", 0), ("B", 100)]).unwrap();
        assert_eq!(s.total(), 100);
        assert!(!s.contains(&"A".into()));
    }

    #[test]
    fn empty_sample_has_zero_proportions() {
        let s = Sample::empty(country());
        assert!(s.is_empty());
        assert_eq!(s.proportion(&"A".into()), 0.0);
    }

    #[test]
    fn key_width_checked() {
        let err = Sample::from_units(country(), [StratumKey::new(["A", "F"])]).unwrap_err();
        assert!(matches!(err, SampleError::KeyWidth { expected: 1, found: 2, .. }));
    }

    #[test]
    fn aggregate_collapses_columns() {
        let dim = Dimension::new("CG", ["country", "gender"]);
        let s = Sample::from_units(
            dim,
            [
                StratumKey::new(["A", "F"]),
                StratumKey::new(["A", "M"]),
                StratumKey::new(["B", "F"]),
            ],
        )
        .unwrap();
        let by_gender = s.aggregate(Dimension::new("Gender", ["gender"])).unwrap();
        assert_eq!(by_gender.count(&"F".into()), 2);
        assert_eq!(by_gender.total(), 3);
    }
}
