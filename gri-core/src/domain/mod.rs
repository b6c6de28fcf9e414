//! Domain types: dimensions, strata, benchmarks, samples and variance maps.

pub mod benchmark;
pub mod dimension;
pub mod sample;
pub mod stratum;
pub mod variance;

pub use benchmark::{Benchmark, BenchmarkError};
pub use dimension::Dimension;
pub use sample::{Sample, SampleError};
pub use stratum::{Stratum, StratumKey, KEY_SEPARATOR};
pub use variance::{InternalVarianceMap, VarianceError, DEFAULT_INTERNAL_VARIANCE};
