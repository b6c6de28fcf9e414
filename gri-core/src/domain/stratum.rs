use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when a multi-column key is rendered as a single string.
pub const KEY_SEPARATOR: &str = " × ";

/// Ordered tuple of categorical values identifying one stratum.
///
/// Ordering is lexicographic over the values, which gives every map keyed by
/// `StratumKey` a deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StratumKey(pub Vec<String>);

impl StratumKey {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// A key with the same label in every column (the merged "Others" stratum).
    pub fn uniform(width: usize, label: &str) -> Self {
        Self(vec![label.to_string(); width.max(1)])
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    /// Key restricted to the given column positions.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self(indices.iter().map(|&i| self.0[i].clone()).collect())
    }

    /// Joined representation, e.g. `"India × Female × 18-25"`.
    pub fn joined(&self) -> String {
        self.0.join(KEY_SEPARATOR)
    }
}

impl fmt::Display for StratumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

impl From<&str> for StratumKey {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

/// One benchmark cell: a key and its share of the reference population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stratum {
    pub key: StratumKey,
    pub population_proportion: f64,
}

impl Stratum {
    pub fn new(key: impl Into<StratumKey>, population_proportion: f64) -> Self {
        Self {
            key: key.into(),
            population_proportion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_uses_separator() {
        let key = StratumKey::new(["India", "Female", "18-25"]);
        assert_eq!(key.to_string(), "India × Female × 18-25");
        assert_eq!(key.width(), 3);
    }

    #[test]
    fn uniform_key_fills_every_column() {
        let key = StratumKey::uniform(2, "Others");
        assert_eq!(key, StratumKey::new(["Others", "Others"]));
        assert_eq!(StratumKey::uniform(0, "Others").width(), 1);
    }

    #[test]
    fn select_projects_columns() {
        let key = StratumKey::new(["India", "Female", "18-25"]);
        assert_eq!(key.select(&[0, 2]), StratumKey::new(["India", "18-25"]));
    }
}
