//! Pairwise benchmark comparison.

use crate::result::Benchmark;
use serde::Serialize;
use uuid::Uuid;

/// Mean change above which the second benchmark counts as a regression
/// (and below the negation, an improvement).
const REGRESSION_THRESHOLD_PERCENT: f64 = 5.0;

/// Coarse classification of how meaningful a difference is relative to the
/// observed variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Low,
    Medium,
    High,
}

/// Result of comparing two completed benchmarks (b relative to a).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkComparison {
    pub baseline_id: Uuid,
    pub candidate_id: Uuid,
    pub mean_delta_ms: f64,
    pub median_delta_ms: f64,
    pub percent_change: f64,
    pub is_regression: bool,
    pub is_improvement: bool,
    pub significance: Significance,
}

impl BenchmarkComparison {
    /// Compare two immutable benchmarks. Reads only their derived
    /// statistics.
    pub fn between(baseline: &Benchmark, candidate: &Benchmark) -> Self {
        let mean_delta_ms = candidate.statistics.mean_ms - baseline.statistics.mean_ms;
        let median_delta_ms = candidate.statistics.median_ms - baseline.statistics.median_ms;
        let percent_change = if baseline.statistics.mean_ms == 0.0 {
            0.0
        } else {
            mean_delta_ms / baseline.statistics.mean_ms * 100.0
        };

        Self {
            baseline_id: baseline.id,
            candidate_id: candidate.id,
            mean_delta_ms,
            median_delta_ms,
            percent_change,
            is_regression: percent_change > REGRESSION_THRESHOLD_PERCENT,
            is_improvement: percent_change < -REGRESSION_THRESHOLD_PERCENT,
            significance: significance(
                mean_delta_ms,
                baseline.statistics.std_dev_ms,
                candidate.statistics.std_dev_ms,
            ),
        }
    }
}

/// Bucket by how many multiples of the averaged standard deviation separate
/// the two means. With zero observed variance any nonzero difference is
/// taken as high significance.
fn significance(mean_delta_ms: f64, baseline_sd: f64, candidate_sd: f64) -> Significance {
    let avg_sd = (baseline_sd + candidate_sd) / 2.0;
    if avg_sd == 0.0 {
        return if mean_delta_ms == 0.0 {
            Significance::Low
        } else {
            Significance::High
        };
    }

    let multiples = (mean_delta_ms / avg_sd).abs();
    if multiples > 3.0 {
        Significance::High
    } else if multiples > 1.5 {
        Significance::Medium
    } else {
        Significance::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::BenchmarkStatistics;
    use std::time::Duration;

    fn benchmark(mean_ms: f64, std_dev_ms: f64) -> Benchmark {
        Benchmark {
            id: Uuid::new_v4(),
            test_id: "t".into(),
            name: "t".into(),
            description: String::new(),
            category: "general".into(),
            total_duration: Duration::from_millis(100),
            iterations: 10,
            warmup_iterations: 0,
            results: Vec::new(),
            statistics: BenchmarkStatistics {
                mean_ms,
                median_ms: mean_ms,
                std_dev_ms,
                sample_count: 10,
                ..BenchmarkStatistics::default()
            },
        }
    }

    #[test]
    fn six_percent_slower_is_a_regression() {
        let a = benchmark(100.0, 1.0);
        let b = benchmark(106.0, 1.0);

        let comparison = BenchmarkComparison::between(&a, &b);
        assert!(comparison.is_regression);
        assert!(!comparison.is_improvement);
        assert!((comparison.percent_change - 6.0).abs() < 1e-9);
    }

    #[test]
    fn six_percent_faster_is_an_improvement() {
        let a = benchmark(100.0, 1.0);
        let b = benchmark(94.0, 1.0);

        let comparison = BenchmarkComparison::between(&a, &b);
        assert!(comparison.is_improvement);
        assert!(!comparison.is_regression);
    }

    #[test]
    fn small_changes_are_neither() {
        let a = benchmark(100.0, 1.0);
        let b = benchmark(103.0, 1.0);

        let comparison = BenchmarkComparison::between(&a, &b);
        assert!(!comparison.is_regression);
        assert!(!comparison.is_improvement);
    }

    #[test]
    fn significance_scales_with_variance() {
        let tight_a = benchmark(100.0, 1.0);
        let tight_b = benchmark(110.0, 1.0);
        assert_eq!(
            BenchmarkComparison::between(&tight_a, &tight_b).significance,
            Significance::High
        );

        let medium_b = benchmark(102.0, 1.0);
        assert_eq!(
            BenchmarkComparison::between(&tight_a, &medium_b).significance,
            Significance::Medium
        );

        let noisy_a = benchmark(100.0, 50.0);
        let noisy_b = benchmark(110.0, 50.0);
        assert_eq!(
            BenchmarkComparison::between(&noisy_a, &noisy_b).significance,
            Significance::Low
        );
    }

    #[test]
    fn zero_baseline_mean_yields_zero_percent() {
        let a = benchmark(0.0, 0.0);
        let b = benchmark(10.0, 0.0);

        let comparison = BenchmarkComparison::between(&a, &b);
        assert_eq!(comparison.percent_change, 0.0);
        assert_eq!(comparison.significance, Significance::High);
    }
}
