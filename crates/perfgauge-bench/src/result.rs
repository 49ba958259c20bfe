//! Immutable benchmark artifacts.

use chrono::{DateTime, Utc};
use perfgauge_core::metrics::PerformanceMetrics;
use perfgauge_core::stats::DurationStats;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Derived statistics over the successful subset of a benchmark's results.
pub type BenchmarkStatistics = DurationStats;

/// One executed measured iteration. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub iteration: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// End-minus-start metric delta; zeroed for failed iterations.
    pub metrics_delta: PerformanceMetrics,
    pub success: bool,
    pub error: Option<String>,
}

impl BenchmarkResult {
    pub fn succeeded(
        iteration: usize,
        started_at: DateTime<Utc>,
        duration: Duration,
        metrics_delta: PerformanceMetrics,
    ) -> Self {
        Self {
            iteration,
            started_at,
            duration,
            metrics_delta,
            success: true,
            error: None,
        }
    }

    pub fn failed(
        iteration: usize,
        started_at: DateTime<Utc>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            iteration,
            started_at,
            duration,
            metrics_delta: PerformanceMetrics::default(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A completed benchmark run. Created once on completion (success or
/// exhausted failure) and stored in the runner's registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: Uuid,
    pub test_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub total_duration: Duration,
    /// Measured iterations actually executed (may be short of the request
    /// when the run stopped early).
    pub iterations: usize,
    pub warmup_iterations: usize,
    pub results: Vec<BenchmarkResult>,
    pub statistics: BenchmarkStatistics,
}

impl Benchmark {
    /// Count of successful iterations.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Success rate over all produced results, `0.0` when empty.
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.results.len() as f64
        }
    }

    /// Statistics over only the successful results; zeroed when none
    /// succeeded.
    pub fn compute_statistics(results: &[BenchmarkResult]) -> BenchmarkStatistics {
        let durations: Vec<Duration> = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.duration)
            .collect();
        DurationStats::from_durations(&durations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(iteration: usize, success: bool, millis: u64) -> BenchmarkResult {
        if success {
            BenchmarkResult::succeeded(
                iteration,
                Utc::now(),
                Duration::from_millis(millis),
                PerformanceMetrics::default(),
            )
        } else {
            BenchmarkResult::failed(iteration, Utc::now(), Duration::from_millis(millis), "boom")
        }
    }

    #[test]
    fn statistics_ignore_failed_iterations() {
        let results = vec![result(0, true, 10), result(1, false, 500), result(2, true, 10)];
        let stats = Benchmark::compute_statistics(&results);

        assert_eq!(stats.sample_count, 2);
        assert!((stats.mean_ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn all_failed_yields_zeroed_statistics() {
        let results = vec![result(0, false, 10), result(1, false, 10)];
        let stats = Benchmark::compute_statistics(&results);

        assert_eq!(stats.sample_count, 0);
        assert_eq!(stats.mean_ms, 0.0);
    }

    #[test]
    fn success_rate_over_all_results() {
        let bench = Benchmark {
            id: Uuid::new_v4(),
            test_id: "t".into(),
            name: "t".into(),
            description: String::new(),
            category: "general".into(),
            total_duration: Duration::from_millis(30),
            iterations: 3,
            warmup_iterations: 0,
            results: vec![result(0, true, 10), result(1, false, 10), result(2, true, 10)],
            statistics: BenchmarkStatistics::default(),
        };

        assert_eq!(bench.success_count(), 2);
        assert!((bench.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }
}
