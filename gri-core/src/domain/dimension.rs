use serde::{Deserialize, Serialize};
use std::fmt;

use super::stratum::KEY_SEPARATOR;

/// A categorical dimension: a name plus the ordered columns whose values
/// identify a stratum (e.g. `Country × Gender × Age` over
/// `["country", "gender", "age_group"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub columns: Vec<String>,
}

impl Dimension {
    pub fn new<N, C, S>(name: N, columns: C) -> Self
    where
        N: Into<String>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of columns, i.e. the width every stratum key must have.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Columns joined with the key separator, used in reports.
    pub fn label(&self) -> String {
        self.columns.join(KEY_SEPARATOR)
    }

    /// Positions of `columns` within this dimension, or the names that are missing.
    pub fn project(&self, columns: &[String]) -> Result<Vec<usize>, Vec<String>> {
        let mut indices = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for col in columns {
            match self.columns.iter().position(|c| c == col) {
                Some(i) => indices.push(i),
                None => missing.push(col.clone()),
            }
        }
        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(missing)
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
