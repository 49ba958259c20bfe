//! Benchmark execution harness.
//!
//! Callers register [`TestCase`]s with async setup/execute/teardown hooks
//! and drive them through [`BenchmarkRunner::run`], which produces an
//! immutable [`Benchmark`] with per-iteration results and derived
//! statistics. Completed benchmarks live in the runner's registry and can
//! be compared pairwise or exported.

pub mod case;
pub mod compare;
pub mod events;
pub mod export;
pub mod result;
pub mod runner;

pub use case::{ExpectedMetrics, TestCase};
pub use compare::{BenchmarkComparison, Significance};
pub use events::BenchEvent;
pub use result::{Benchmark, BenchmarkResult, BenchmarkStatistics};
pub use runner::{BenchError, BenchmarkRunner};

/// Error text recorded when an iteration loses the race against its
/// deadline timer.
pub const ITERATION_TIMEOUT_ERROR: &str = "Test iteration timeout";
