//! Pure statistics over duration samples.
//!
//! Everything here is a function of its inputs; nothing reads shared state.
//! Durations are analysed in fractional milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Percentile levels included in every [`DurationStats`].
pub const STANDARD_PERCENTILES: [u8; 5] = [50, 75, 90, 95, 99];

/// Z-score above which a sample counts as an outlier.
const OUTLIER_Z_SCORE: f64 = 2.0;

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, `0.0` for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Percentile by rank: index `ceil(p/100 * n) - 1`, clamped into range.
///
/// `sorted` must be in ascending order. The 50th percentile by this rule is
/// the lower-middle element for even-length input, which is also how
/// [`median`] is defined so the two always agree.
pub fn percentile(sorted: &[f64], p: u8) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (f64::from(p) / 100.0 * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}

/// Median, defined as the 50th percentile of the sorted input.
pub fn median(sorted: &[f64]) -> f64 {
    percentile(sorted, 50)
}

/// Values whose z-score against the sample mean exceeds 2.
pub fn outliers(values: &[f64]) -> Vec<f64> {
    let sd = std_dev(values);
    if sd == 0.0 {
        return Vec::new();
    }
    let m = mean(values);
    values
        .iter()
        .copied()
        .filter(|v| ((v - m) / sd).abs() > OUTLIER_Z_SCORE)
        .collect()
}

/// Full statistical summary of a set of duration samples, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
    pub variance_ms: f64,
    /// Percentile level (50/75/90/95/99) to duration in milliseconds.
    pub percentiles: BTreeMap<u8, f64>,
    /// Samples more than two standard deviations from the mean.
    pub outliers_ms: Vec<f64>,
    pub sample_count: usize,
}

impl DurationStats {
    /// Summarise a sequence of durations. Empty input yields a zeroed
    /// summary rather than an error.
    pub fn from_durations(durations: &[Duration]) -> Self {
        let values: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        Self::from_millis(&values)
    }

    /// Summarise pre-converted millisecond samples.
    pub fn from_millis(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut percentiles = BTreeMap::new();
        for p in STANDARD_PERCENTILES {
            percentiles.insert(p, percentile(&sorted, p));
        }

        Self {
            mean_ms: mean(values),
            median_ms: median(&sorted),
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            std_dev_ms: std_dev(values),
            variance_ms: variance(values),
            percentiles,
            outliers_ms: outliers(values),
            sample_count: values.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_input_is_zeroed() {
        let stats = DurationStats::from_durations(&[]);
        assert_eq!(stats.mean_ms, 0.0);
        assert_eq!(stats.sample_count, 0);
        assert!(stats.percentiles.is_empty());
    }

    #[test]
    fn constant_samples_have_zero_spread() {
        let durations = vec![Duration::from_millis(10); 5];
        let stats = DurationStats::from_durations(&durations);

        assert!((stats.mean_ms - 10.0).abs() < 1e-9);
        assert_eq!(stats.min_ms, stats.max_ms);
        assert_eq!(stats.std_dev_ms, 0.0);
        assert!(stats.outliers_ms.is_empty());
    }

    #[rstest]
    #[case(50)]
    #[case(75)]
    #[case(90)]
    #[case(95)]
    #[case(99)]
    fn percentiles_bounded_by_min_max(#[case] p: u8) {
        let sorted: Vec<f64> = (1..=17).map(f64::from).collect();
        let value = percentile(&sorted, p);
        assert!(value >= sorted[0]);
        assert!(value <= sorted[sorted.len() - 1]);
    }

    #[test]
    fn median_matches_p50_for_even_length() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(median(&sorted), percentile(&sorted, 50));
        assert_eq!(median(&sorted), 2.0);
    }

    #[test]
    fn p100_is_the_maximum() {
        let sorted = vec![3.0, 7.0, 11.0];
        assert_eq!(percentile(&sorted, 100), 11.0);
    }

    #[test]
    fn outlier_needs_z_score_above_two() {
        // Nine tight samples and one far spike.
        let mut values = vec![10.0; 9];
        values.push(100.0);
        let found = outliers(&values);
        assert_eq!(found, vec![100.0]);
    }

    #[test]
    fn variance_matches_std_dev() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&values) - 2.0).abs() < 1e-9);
        assert!((variance(&values) - 4.0).abs() < 1e-9);
    }
}
