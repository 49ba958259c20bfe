//! The benchmark execution state machine.
//!
//! A run moves through setup → warmup → measured iterations → teardown.
//! Setup failures abort the run; iteration failures (including deadline
//! timeouts) become `success = false` results; teardown failures are
//! reported over the event bus and swallowed. The runner holds at most one
//! active run, enforced logically through an atomic flag rather than an OS
//! lock.

use crate::case::TestCase;
use crate::compare::BenchmarkComparison;
use crate::events::BenchEvent;
use crate::result::{Benchmark, BenchmarkResult};
use crate::ITERATION_TIMEOUT_ERROR;
use chrono::Utc;
use perfgauge_core::collector::MetricCollector;
use perfgauge_core::event::EventBus;
use perfgauge_core::metrics::PerformanceMetrics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default measured iteration count for [`BenchmarkRunner::run_default`].
pub const DEFAULT_ITERATIONS: usize = 100;

/// Default warmup iteration count for [`BenchmarkRunner::run_default`].
pub const DEFAULT_WARMUP: usize = 10;

/// Trailing window inspected by the early-stop rule.
const EARLY_STOP_WINDOW: usize = 10;

/// Failure rate over the trailing window that triggers an early stop.
const EARLY_STOP_FAILURE_RATE: f64 = 0.5;

/// Hard failures surfaced to the direct caller. Everything else a run can
/// encounter is recovered locally and recorded as data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BenchError {
    #[error("no test case registered under '{0}'")]
    UnknownTest(String),

    #[error("another benchmark is already running")]
    AlreadyRunning,

    #[error("benchmark setup failed: {0}")]
    Setup(String),

    #[error("unknown benchmark id {0}")]
    UnknownBenchmark(Uuid),
}

/// Drives registered test cases and owns the registry of completed
/// benchmarks.
pub struct BenchmarkRunner {
    cases: RwLock<HashMap<String, Arc<TestCase>>>,
    benchmarks: RwLock<HashMap<Uuid, Arc<Benchmark>>>,
    collector: Mutex<MetricCollector>,
    active: AtomicBool,
    events: EventBus<BenchEvent>,
}

impl BenchmarkRunner {
    /// Runner over the default `sysinfo`-backed collector.
    pub fn new() -> Self {
        Self::with_collector(MetricCollector::system())
    }

    /// Runner over an explicit collector (tests use scripted sources).
    pub fn with_collector(collector: MetricCollector) -> Self {
        Self {
            cases: RwLock::new(HashMap::new()),
            benchmarks: RwLock::new(HashMap::new()),
            collector: Mutex::new(collector),
            active: AtomicBool::new(false),
            events: EventBus::new(),
        }
    }

    /// Subscribe to runner lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<BenchEvent> {
        self.events.subscribe()
    }

    /// Register a test case. Re-registering an id overwrites the previous
    /// case.
    pub fn register_case(&self, case: TestCase) {
        let test_id = case.id.clone();
        self.cases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(test_id.clone(), Arc::new(case));
        debug!(%test_id, "test case registered");
        self.events.emit(BenchEvent::TestRegistered { test_id });
    }

    /// Remove a test case, returning whether one was registered.
    pub fn unregister_case(&self, test_id: &str) -> bool {
        self.cases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(test_id)
            .is_some()
    }

    /// Run with the default iteration and warmup counts.
    pub async fn run_default(&self, test_id: &str) -> Result<Arc<Benchmark>, BenchError> {
        self.run(test_id, DEFAULT_ITERATIONS, DEFAULT_WARMUP).await
    }

    /// Execute a registered case.
    ///
    /// Fails fast with [`BenchError::UnknownTest`] for an unregistered id
    /// and [`BenchError::AlreadyRunning`] while another run holds the
    /// runner. Setup failure aborts the run without producing a benchmark.
    pub async fn run(
        &self,
        test_id: &str,
        iterations: usize,
        warmup: usize,
    ) -> Result<Arc<Benchmark>, BenchError> {
        let case = self
            .cases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(test_id)
            .cloned()
            .ok_or_else(|| BenchError::UnknownTest(test_id.to_string()))?;

        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BenchError::AlreadyRunning)?;

        let outcome = self.run_case(&case, iterations, warmup).await;
        self.active.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_case(
        &self,
        case: &TestCase,
        iterations: usize,
        warmup: usize,
    ) -> Result<Arc<Benchmark>, BenchError> {
        let run_start = Instant::now();
        info!(test_id = %case.id, iterations, warmup, "benchmark run started");
        self.events.emit(BenchEvent::RunStarted {
            test_id: case.id.clone(),
            iterations,
            warmup,
        });

        // Setup failure is the one fatal phase.
        match timeout(case.timeout, case.run_setup()).await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(BenchError::Setup(reason)),
            Err(_) => return Err(BenchError::Setup("Test setup timeout".to_string())),
        }

        self.run_warmup(case, warmup).await;
        let results = self.run_measured(case, iterations).await;
        self.run_teardown(case).await;

        let statistics = Benchmark::compute_statistics(&results);
        let benchmark = Arc::new(Benchmark {
            id: Uuid::new_v4(),
            test_id: case.id.clone(),
            name: case.name.clone(),
            description: case.description.clone(),
            category: case.category.clone(),
            total_duration: run_start.elapsed(),
            iterations: results.len(),
            warmup_iterations: warmup,
            results,
            statistics,
        });

        self.benchmarks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(benchmark.id, Arc::clone(&benchmark));

        info!(
            test_id = %case.id,
            benchmark_id = %benchmark.id,
            success_rate = benchmark.success_rate(),
            "benchmark run completed"
        );
        self.events.emit(BenchEvent::RunCompleted {
            test_id: case.id.clone(),
            benchmark_id: benchmark.id,
            success_rate: benchmark.success_rate(),
        });

        self.validate(case, &benchmark);
        Ok(benchmark)
    }

    async fn run_warmup(&self, case: &TestCase, warmup: usize) {
        if warmup == 0 {
            return;
        }
        self.events.emit(BenchEvent::WarmupStarted {
            test_id: case.id.clone(),
            iterations: warmup,
        });

        for iteration in 0..warmup {
            match timeout(case.timeout, case.run_execute()).await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => {
                    warn!(test_id = %case.id, iteration, %reason, "warmup iteration failed");
                }
                Err(_) => {
                    warn!(test_id = %case.id, iteration, "warmup iteration timed out");
                }
            }
        }

        self.events.emit(BenchEvent::WarmupCompleted {
            test_id: case.id.clone(),
        });
    }

    async fn run_measured(&self, case: &TestCase, iterations: usize) -> Vec<BenchmarkResult> {
        let mut results = Vec::with_capacity(iterations);

        for iteration in 0..iterations {
            let start_metrics = self.collect_or_empty();
            let started_at = Utc::now();
            let clock = Instant::now();

            let outcome = timeout(case.timeout, case.run_execute()).await;
            let duration = clock.elapsed();

            let result = match outcome {
                Ok(Ok(())) => {
                    let end_metrics = self.collect_or_empty();
                    let delta = PerformanceMetrics::delta(&start_metrics, &end_metrics);
                    BenchmarkResult::succeeded(iteration, started_at, duration, delta)
                }
                Ok(Err(reason)) => {
                    BenchmarkResult::failed(iteration, started_at, duration, reason)
                }
                Err(_) => BenchmarkResult::failed(
                    iteration,
                    started_at,
                    duration,
                    ITERATION_TIMEOUT_ERROR,
                ),
            };

            self.events.emit(BenchEvent::IterationCompleted {
                test_id: case.id.clone(),
                iteration,
                success: result.success,
                duration_ms: result.duration.as_secs_f64() * 1000.0,
                error: result.error.clone(),
            });
            results.push(result);

            // Only an early stop if iterations were actually forgone.
            if let Some(failure_rate) = trailing_failure_rate(&results) {
                if failure_rate > EARLY_STOP_FAILURE_RATE && iteration + 1 < iterations {
                    warn!(
                        test_id = %case.id,
                        completed = results.len(),
                        failure_rate,
                        "stopping benchmark early"
                    );
                    self.events.emit(BenchEvent::EarlyStop {
                        test_id: case.id.clone(),
                        completed_iterations: results.len(),
                        trailing_failure_rate: failure_rate,
                    });
                    break;
                }
            }
        }

        results
    }

    async fn run_teardown(&self, case: &TestCase) {
        let reason = match timeout(case.timeout, case.run_teardown()).await {
            Ok(Ok(())) => return,
            Ok(Err(reason)) => reason,
            Err(_) => "Test teardown timeout".to_string(),
        };
        warn!(test_id = %case.id, %reason, "teardown failed");
        self.events.emit(BenchEvent::TeardownFailed {
            test_id: case.id.clone(),
            reason,
        });
    }

    fn collect_or_empty(&self) -> PerformanceMetrics {
        let mut collector = self.collector.lock().unwrap_or_else(PoisonError::into_inner);
        match collector.collect() {
            Ok(metrics) => metrics,
            Err(error) => {
                warn!(%error, "metric collection failed, recording zeroed snapshot");
                PerformanceMetrics::empty_now()
            }
        }
    }

    /// Compare aggregate metrics of a completed benchmark against the
    /// case's expectations and emit a pass or fail event. Never fails the
    /// run.
    fn validate(&self, case: &TestCase, benchmark: &Benchmark) {
        let violations = validation_violations(case, benchmark);
        if violations.is_empty() {
            self.events.emit(BenchEvent::ValidationPassed {
                benchmark_id: benchmark.id,
            });
        } else {
            warn!(benchmark_id = %benchmark.id, ?violations, "benchmark validation failed");
            self.events.emit(BenchEvent::ValidationFailed {
                benchmark_id: benchmark.id,
                violations,
            });
        }
    }

    /// Run several cases, sequentially or concurrently.
    ///
    /// Concurrent runs still contend on the runner's single active-run
    /// flag, so overlapping launches are rejected with
    /// [`BenchError::AlreadyRunning`] for all but the first to start.
    pub async fn run_many(
        &self,
        test_ids: &[String],
        iterations: usize,
        warmup: usize,
        parallel: bool,
    ) -> Vec<(String, Result<Arc<Benchmark>, BenchError>)> {
        if parallel {
            let runs = test_ids
                .iter()
                .map(|id| async move { (id.clone(), self.run(id, iterations, warmup).await) });
            futures::future::join_all(runs).await
        } else {
            let mut outcomes = Vec::with_capacity(test_ids.len());
            for id in test_ids {
                outcomes.push((id.clone(), self.run(id, iterations, warmup).await));
            }
            outcomes
        }
    }

    /// Compare two completed benchmarks by id.
    pub fn compare(&self, a: Uuid, b: Uuid) -> Result<BenchmarkComparison, BenchError> {
        let registry = self.benchmarks.read().unwrap_or_else(PoisonError::into_inner);
        let first = registry.get(&a).ok_or(BenchError::UnknownBenchmark(a))?;
        let second = registry.get(&b).ok_or(BenchError::UnknownBenchmark(b))?;
        Ok(BenchmarkComparison::between(first, second))
    }

    /// Fetch one completed benchmark.
    pub fn benchmark(&self, id: Uuid) -> Option<Arc<Benchmark>> {
        self.benchmarks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// All completed benchmarks, in no particular order.
    pub fn benchmarks(&self) -> Vec<Arc<Benchmark>> {
        self.benchmarks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Structured document export of all completed benchmarks.
    pub fn export_document(&self) -> serde_json::Value {
        crate::export::benchmarks_document(&self.benchmarks())
    }

    /// Flattened tabular export of all completed benchmarks.
    pub fn export_rows(&self) -> perfgauge_core::export::TabularExport {
        crate::export::benchmarks_rows(&self.benchmarks())
    }

    /// Drop all completed benchmarks.
    pub fn clear_benchmarks(&self) {
        self.benchmarks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure rate over the trailing early-stop window, `None` until enough
/// results exist.
fn trailing_failure_rate(results: &[BenchmarkResult]) -> Option<f64> {
    if results.len() < EARLY_STOP_WINDOW {
        return None;
    }
    let window = &results[results.len() - EARLY_STOP_WINDOW..];
    let failures = window.iter().filter(|r| !r.success).count();
    Some(failures as f64 / EARLY_STOP_WINDOW as f64)
}

/// Threshold violations of a benchmark against its case's expectations.
/// Aggregates are computed over successful iterations only.
fn validation_violations(case: &TestCase, benchmark: &Benchmark) -> Vec<String> {
    let successes: Vec<&BenchmarkResult> =
        benchmark.results.iter().filter(|r| r.success).collect();
    if successes.is_empty() {
        return Vec::new();
    }

    let mut violations = Vec::new();
    let count = successes.len() as f64;
    let expected = &case.expected;

    if let Some(max) = expected.max_frame_time_ms {
        let mean = successes
            .iter()
            .map(|r| r.metrics_delta.frame.frame_time_ms)
            .sum::<f64>()
            / count;
        if mean > max {
            violations.push(format!("mean frame time {mean:.2}ms exceeds {max:.2}ms"));
        }
    }

    if let Some(min) = expected.min_frame_rate {
        let mean = successes
            .iter()
            .map(|r| r.metrics_delta.frame.frame_rate)
            .sum::<f64>()
            / count;
        if mean < min {
            violations.push(format!("mean frame rate {mean:.2}fps below {min:.2}fps"));
        }
    }

    if let Some(max) = expected.max_heap_used_bytes {
        let peak = successes
            .iter()
            .map(|r| r.metrics_delta.memory.heap_used)
            .max()
            .unwrap_or(0);
        if peak > max {
            violations.push(format!("peak heap growth {peak}B exceeds {max}B"));
        }
    }

    if let Some(max) = expected.max_cpu_percent {
        let mean = successes
            .iter()
            .map(|r| r.metrics_delta.cpu.percent)
            .sum::<f64>()
            / count;
        if mean > max {
            violations.push(format!("mean CPU {mean:.2}% exceeds {max:.2}%"));
        }
    }

    for (name, max) in &expected.custom {
        let values: Vec<f64> = successes
            .iter()
            .filter_map(|r| r.metrics_delta.custom.get(name).copied())
            .collect();
        if values.is_empty() {
            continue;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        if mean > *max {
            violations.push(format!("custom metric '{name}' mean {mean:.2} exceeds {max:.2}"));
        }
    }

    violations
}
