//! # Perfgauge
//!
//! A performance measurement engine with three cooperating components over
//! a shared metrics core:
//!
//! - **[`BenchmarkRunner`]**: registered async test cases executed through
//!   a setup → warmup → measured → teardown pipeline with timeouts,
//!   early-stop, statistics, and run-to-run comparison.
//! - **[`PerformanceMonitor`]**: a continuous sampling loop with
//!   threshold-based alerting, cooldown spam suppression, and a heap
//!   growth leak heuristic.
//! - **[`MemoryProfiler`]**: session-scoped leak detection over a
//!   pluggable object census, with diffable memory snapshots and a final
//!   analysis report.
//!
//! Each component owns its registries and emits events over a broadcast
//! bus; callers observe via accessors and subscriptions only.
//!
//! ## Quick start
//!
//! ```rust
//! use perfgauge::{BenchmarkRunner, TestCase};
//!
//! # async fn demo() -> Result<(), perfgauge::BenchError> {
//! let runner = BenchmarkRunner::new();
//! runner.register_case(TestCase::new("sort", "sort 10k", || {
//!     Box::pin(async {
//!         let mut data: Vec<u64> = (0..10_000).rev().collect();
//!         data.sort_unstable();
//!         Ok(())
//!     })
//! }));
//!
//! let benchmark = runner.run("sort", 20, 5).await?;
//! println!("mean: {:.3} ms", benchmark.statistics.mean_ms);
//! # Ok(())
//! # }
//! ```

pub use perfgauge_bench as bench;
pub use perfgauge_core as core;
pub use perfgauge_monitor as monitor;
pub use perfgauge_profiler as profiler;

// Metrics model and collection.
pub use perfgauge_core::{
    CollectorError, CpuMetrics, DurationStats, EventBus, FrameMetrics, GcMetrics, MemoryMetrics,
    MetricCollector, MetricSource, PerformanceMetrics, SystemMetricSource, TabularExport,
    FAILED_METRIC_SENTINEL,
};

// Configuration.
pub use perfgauge_core::{AlertThresholds, ConfigError, MonitorConfig};

// Benchmarking.
pub use perfgauge_bench::{
    BenchError, BenchEvent, Benchmark, BenchmarkComparison, BenchmarkResult, BenchmarkRunner,
    BenchmarkStatistics, ExpectedMetrics, Significance, TestCase,
};

// Monitoring.
pub use perfgauge_monitor::{
    Alert, AlertType, AverageMetrics, MonitorEvent, PerformanceMonitor, Severity,
};

// Profiling.
pub use perfgauge_profiler::{
    CensusEntry, CensusReport, LeakDetector, MemoryAnalysis, MemoryLeak, MemoryProfiler,
    MemorySnapshot, ObjectCensus, ProfilerError, ProfilerEvent, ProfilerOptions, SimulatedCensus,
    SnapshotDiff,
};
