//! CSV loading for benchmarks, participant tables and variance maps.
//!
//! Benchmarks carry the dimension columns plus `population_proportion`.
//! Participant tables carry one row per respondent; any column may be used
//! by any dimension. Variance files carry `stratum,variance` with
//! multi-column keys joined by `" × "`.

use gri_core::domain::{
    Benchmark, BenchmarkError, Dimension, InternalVarianceMap, Sample, SampleError, Stratum,
    StratumKey, VarianceError, KEY_SEPARATOR,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PROPORTION_COLUMN: &str = "population_proportion";
pub const VARIANCE_KEY_COLUMN: &str = "stratum";
pub const VARIANCE_COLUMN: &str = "variance";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: missing columns {missing:?}", .path.display())]
    MissingColumns { path: PathBuf, missing: Vec<String> },

    #[error("{}:{line}: {message}", .path.display())]
    Row {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("{}: {source}", .path.display())]
    Benchmark {
        path: PathBuf,
        #[source]
        source: BenchmarkError,
    },

    #[error("{}: {source}", .path.display())]
    Sample {
        path: PathBuf,
        #[source]
        source: SampleError,
    },

    #[error("{}:{line}: dimension '{dimension}': {source}", .path.display())]
    Variance {
        path: PathBuf,
        line: u64,
        dimension: String,
        #[source]
        source: VarianceError,
    },
}

/// A fully read CSV file: header plus string rows with their line numbers.
#[derive(Debug, Clone)]
pub struct Table {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<(u64, Vec<String>)>,
}

/// A participant sample with the rows that had to be skipped.
#[derive(Debug, Clone)]
pub struct LoadedSample {
    pub sample: Sample,
    /// Rows with an empty value in a dimension column.
    pub skipped_rows: usize,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let csv_err = |source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;
        let headers = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_err)?;
            let line = record.position().map_or(0, |p| p.line());
            rows.push((line, record.iter().map(str::to_string).collect()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header positions of `columns`, failing with every missing name.
    pub fn positions(&self, columns: &[String]) -> Result<Vec<usize>, LoadError> {
        let mut found = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for col in columns {
            match self.headers.iter().position(|h| h == col) {
                Some(i) => found.push(i),
                None => missing.push(col.clone()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(LoadError::MissingColumns {
                path: self.path.clone(),
                missing,
            })
        }
    }

    /// Project rows onto `dimension`, one unit per row. Rows with an empty
    /// value in any dimension column are skipped and counted.
    pub fn sample(&self, dimension: &Dimension) -> Result<LoadedSample, LoadError> {
        let idx = self.positions(&dimension.columns)?;
        let mut skipped_rows = 0;
        let mut units = Vec::with_capacity(self.rows.len());
        for (_, row) in &self.rows {
            let values: Vec<&str> = idx.iter().map(|&i| row.get(i).map_or("", String::as_str)).collect();
            if values.iter().any(|v| v.is_empty()) {
                skipped_rows += 1;
                continue;
            }
            units.push(StratumKey::new(values));
        }
        let sample = Sample::from_units(dimension.clone(), units).map_err(|source| LoadError::Sample {
            path: self.path.clone(),
            source,
        })?;
        Ok(LoadedSample {
            sample,
            skipped_rows,
        })
    }
}

/// Load a benchmark for `dimension`.
///
/// Rows sharing a key after projection onto the dimension columns are
/// summed, so a finer benchmark file can serve a coarser dimension.
pub fn load_benchmark(path: &Path, dimension: &Dimension) -> Result<Benchmark, LoadError> {
    let table = Table::read(path)?;
    let mut wanted = dimension.columns.clone();
    wanted.push(PROPORTION_COLUMN.to_string());
    let idx = table.positions(&wanted)?;
    let (key_idx, p_idx) = idx.split_at(dimension.width());

    let mut strata: Vec<Stratum> = Vec::new();
    let mut index: HashMap<StratumKey, usize> = HashMap::new();
    for (line, row) in &table.rows {
        let cell = |i: usize| row.get(i).map_or("", String::as_str);
        let values: Vec<&str> = key_idx.iter().map(|&i| cell(i)).collect();
        if let Some(pos) = values.iter().position(|v| v.is_empty()) {
            return Err(LoadError::Row {
                path: path.to_path_buf(),
                line: *line,
                message: format!("empty value in column '{}'", dimension.columns[pos]),
            });
        }
        let raw = cell(p_idx[0]);
        let p: f64 = raw.parse().map_err(|_| LoadError::Row {
            path: path.to_path_buf(),
            line: *line,
            message: format!("invalid {PROPORTION_COLUMN} '{raw}'"),
        })?;

        let key = StratumKey::new(values);
        match index.get(&key) {
            Some(&i) => strata[i].population_proportion += p,
            None => {
                index.insert(key.clone(), strata.len());
                strata.push(Stratum::new(key, p));
            }
        }
    }

    Benchmark::new(dimension.clone(), strata).map_err(|source| LoadError::Benchmark {
        path: path.to_path_buf(),
        source,
    })
}

/// Load participants from `path` and project them onto `dimension`.
pub fn load_sample(path: &Path, dimension: &Dimension) -> Result<LoadedSample, LoadError> {
    Table::read(path)?.sample(dimension)
}

/// Load a `stratum,variance` file for `dimension`.
pub fn load_variances(path: &Path, dimension: &Dimension) -> Result<InternalVarianceMap, LoadError> {
    let table = Table::read(path)?;
    let idx = table.positions(&[VARIANCE_KEY_COLUMN.to_string(), VARIANCE_COLUMN.to_string()])?;

    let mut map = InternalVarianceMap::new();
    for (line, row) in &table.rows {
        let cell = |i: usize| row.get(i).map_or("", String::as_str);
        let joined = cell(idx[0]);
        let width = joined.split(KEY_SEPARATOR).count();
        if width != dimension.width() {
            return Err(LoadError::Row {
                path: path.to_path_buf(),
                line: *line,
                message: format!(
                    "stratum '{joined}' has {width} values, dimension '{}' expects {}",
                    dimension.name,
                    dimension.width()
                ),
            });
        }
        let raw = cell(idx[1]);
        let v: f64 = raw.parse().map_err(|_| LoadError::Row {
            path: path.to_path_buf(),
            line: *line,
            message: format!("invalid {VARIANCE_COLUMN} '{raw}'"),
        })?;
        map.insert_joined(joined, v).map_err(|source| LoadError::Variance {
            path: path.to_path_buf(),
            line: *line,
            dimension: dimension.name.clone(),
            source,
        })?;
    }
    Ok(map)
}

/// Write a benchmark to CSV in the format [`load_benchmark`] reads.
pub fn write_benchmark_csv(benchmark: &Benchmark) -> Result<String, csv::Error> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = benchmark.dimension().columns.clone();
    header.push(PROPORTION_COLUMN.to_string());
    wtr.write_record(&header)?;
    for s in benchmark.strata() {
        let mut record = s.key.values().to_vec();
        record.push(s.population_proportion.to_string());
        wtr.write_record(&record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
