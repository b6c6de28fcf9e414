//! GRI Runner: scorecard orchestration on top of `gri-core`.
//!
//! This crate provides:
//! - TOML scorecard configuration with per-dimension simplification
//! - CSV loading for benchmarks, participant tables and variance maps
//! - Multi-dimension scorecards with Monte Carlo ceilings
//! - JSON, CSV and Markdown export with schema versioning

pub mod config;
pub mod data_loader;
pub mod export;
pub mod scorecard;

pub use config::{ConfigError, DimensionConfig, ScorecardConfig, SimplificationConfig};
pub use data_loader::{load_benchmark, load_sample, load_variances, LoadError, LoadedSample};
pub use scorecard::{build_scorecard, DimensionScore, Scorecard, ScorecardError, SCHEMA_VERSION};
