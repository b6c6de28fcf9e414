//! GRI Core: representativeness scoring of survey samples against population benchmarks.
//!
//! This crate contains the pure computational core:
//! - Domain types (dimensions, stratum keys, benchmarks, samples, variance maps)
//! - MetricEngine: GRI, Diversity, SRI and VWRS with per-stratum breakdowns
//! - AllocationOptimizer: Neyman allocation with exact-total rounding
//! - SimulationEngine: seeded semi-stochastic sampling and Monte Carlo ceilings
//! - BenchmarkSimplifier: "Others" merging against the granularity paradox
//! - Validation warnings and content fingerprints
//!
//! No I/O, no logging, no global configuration: every input is an explicit
//! parameter.

pub mod allocation;
pub mod domain;
pub mod fingerprint;
pub mod metrics;
pub mod rng;
pub mod simplify;
pub mod simulation;
pub mod stats;
pub mod validation;

pub use allocation::{compare_allocation_methods, optimal_allocation, AllocationError, AllocationPlan};
pub use domain::{Benchmark, Dimension, InternalVarianceMap, Sample, Stratum, StratumKey};
pub use metrics::{calculate_diversity_score, calculate_gri, calculate_sri, calculate_vwrs, MetricError};
pub use simplify::{simplify_benchmark, BenchmarkMode, SimplificationPolicy};
pub use simulation::{monte_carlo_max_scores, SimulationConfig, SimulationError, SimulationResult};
