//! Growth-trend leak detection.
//!
//! One [`LeakCandidate`] per tracked object type accumulates size
//! observations; sustained monotonic growth above a fixed floor promotes
//! the candidate to a reported [`MemoryLeak`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Trailing observations considered when computing the growth rate.
const GROWTH_WINDOW: usize = 10;

/// Observations required before a candidate can carry any confidence.
const MIN_SAMPLES: usize = 5;

/// Trailing run that must be non-decreasing for nonzero confidence.
const MONOTONIC_WINDOW: usize = 5;

/// Confidence ceiling.
const CONFIDENCE_CAP: f64 = 0.9;

/// Confidence a candidate must exceed to be reported.
const PROMOTION_CONFIDENCE: f64 = 0.5;

/// Growth-rate floor in bytes per second; slower growth is noise.
const GROWTH_FLOOR_BYTES_PER_SEC: f64 = 1024.0;

/// An object type under observation for sustained size growth.
#[derive(Debug, Clone)]
pub struct LeakCandidate {
    pub type_name: String,
    /// Trailing observations, capped at [`GROWTH_WINDOW`]; long sessions
    /// never accumulate per-tick entries beyond the window.
    samples: Vec<(Instant, u64)>,
    /// Lifetime observation count, including evicted entries.
    observations: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Bytes per second over the trailing growth window.
    pub growth_rate: f64,
    /// 0..=0.9; zero whenever the trailing run is not monotonic or growth
    /// is below the floor.
    pub confidence: f64,
}

impl LeakCandidate {
    fn new(type_name: String) -> Self {
        let now = Utc::now();
        Self {
            type_name,
            samples: Vec::new(),
            observations: 0,
            first_seen: now,
            last_seen: now,
            growth_rate: 0.0,
            confidence: 0.0,
        }
    }

    /// Record one size observation and refresh the derived signals.
    pub fn record(&mut self, size: u64, at: Instant) {
        self.samples.push((at, size));
        if self.samples.len() > GROWTH_WINDOW {
            self.samples.remove(0);
        }
        self.observations += 1;
        self.last_seen = Utc::now();
        self.growth_rate = self.compute_growth_rate();
        self.confidence = self.compute_confidence();
    }

    /// Latest observed size, zero before any observation.
    pub fn latest_size(&self) -> u64 {
        self.samples.last().map(|(_, size)| *size).unwrap_or(0)
    }

    /// Lifetime observation count; the retained buffer itself never
    /// exceeds the growth window.
    pub fn sample_count(&self) -> usize {
        self.observations
    }

    /// (last − first) over the trailing window, divided by the elapsed
    /// seconds between those two observations.
    fn compute_growth_rate(&self) -> f64 {
        let (Some((first_at, first_size)), Some((last_at, last_size))) =
            (self.samples.first(), self.samples.last())
        else {
            return 0.0;
        };

        let elapsed = last_at.duration_since(*first_at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (*last_size as f64 - *first_size as f64) / elapsed
    }

    /// Requires enough samples and a non-decreasing trailing run, then
    /// scales with sample count up to the cap. Forced to zero below the
    /// growth floor.
    fn compute_confidence(&self) -> f64 {
        if self.observations < MIN_SAMPLES {
            return 0.0;
        }
        if self.growth_rate < GROWTH_FLOOR_BYTES_PER_SEC {
            return 0.0;
        }

        let run_start = self.samples.len() - MONOTONIC_WINDOW;
        let recent = &self.samples[run_start..];
        let monotonic = recent.windows(2).all(|pair| pair[0].1 <= pair[1].1);
        if !monotonic {
            return 0.0;
        }

        (self.observations as f64 / 10.0 * CONFIDENCE_CAP).min(CONFIDENCE_CAP)
    }
}

/// A confirmed, reportable leak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryLeak {
    pub type_name: String,
    /// Latest observed footprint in bytes.
    pub size: u64,
    pub growth_rate: f64,
    /// Synthetic frames; the census has no native stacks to offer.
    pub stack_trace: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub confidence: f64,
}

/// Per-type candidate tracker.
#[derive(Default)]
pub struct LeakDetector {
    candidates: HashMap<String, LeakCandidate>,
}

impl LeakDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest footprint for one object type.
    pub fn observe(&mut self, type_name: &str, total_bytes: u64, at: Instant) {
        let candidate = self
            .candidates
            .entry(type_name.to_string())
            .or_insert_with(|| LeakCandidate::new(type_name.to_string()));
        candidate.record(total_bytes, at);
        debug!(
            type_name,
            total_bytes,
            confidence = candidate.confidence,
            "leak candidate updated"
        );
    }

    /// Drop all candidates, e.g. at the start of a new session.
    pub fn clear(&mut self) {
        self.candidates.clear();
    }

    pub fn candidate(&self, type_name: &str) -> Option<&LeakCandidate> {
        self.candidates.get(type_name)
    }

    pub fn candidates(&self) -> impl Iterator<Item = &LeakCandidate> {
        self.candidates.values()
    }

    /// Promote every candidate above the confidence and growth floors.
    pub fn detect_leaks(&self) -> Vec<MemoryLeak> {
        self.candidates
            .values()
            .filter(|c| {
                c.confidence > PROMOTION_CONFIDENCE
                    && c.growth_rate > GROWTH_FLOOR_BYTES_PER_SEC
            })
            .map(|c| MemoryLeak {
                type_name: c.type_name.clone(),
                size: c.latest_size(),
                growth_rate: c.growth_rate,
                stack_trace: vec![
                    format!("<{} allocation site>", c.type_name),
                    "<object census sample, no native frames>".to_string(),
                ],
                first_seen: c.first_seen,
                last_seen: c.last_seen,
                confidence: c.confidence,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Fabricate evenly spaced past observations ending now.
    fn feed(detector: &mut LeakDetector, type_name: &str, sizes: &[u64], spacing: Duration) {
        let now = Instant::now();
        for (i, &size) in sizes.iter().enumerate() {
            let age = spacing * (sizes.len() - 1 - i) as u32;
            detector.observe(type_name, size, now - age);
        }
    }

    #[test]
    fn confidence_zero_below_minimum_samples() {
        let mut detector = LeakDetector::new();
        feed(
            &mut detector,
            "Buffer",
            &[10_000, 20_000, 30_000, 40_000],
            Duration::from_secs(1),
        );
        assert_eq!(detector.candidate("Buffer").unwrap().confidence, 0.0);
    }

    #[test]
    fn confidence_positive_for_monotonic_fast_growth() {
        let mut detector = LeakDetector::new();
        feed(
            &mut detector,
            "Buffer",
            &[10_000, 20_000, 30_000, 40_000, 50_000, 60_000],
            Duration::from_secs(1),
        );

        let candidate = detector.candidate("Buffer").unwrap();
        assert!(candidate.growth_rate > GROWTH_FLOOR_BYTES_PER_SEC);
        assert!(candidate.confidence > PROMOTION_CONFIDENCE);
    }

    #[test]
    fn confidence_zero_when_recent_run_dips() {
        let mut detector = LeakDetector::new();
        feed(
            &mut detector,
            "Array",
            &[10_000, 20_000, 30_000, 25_000, 40_000, 50_000],
            Duration::from_secs(1),
        );
        // The dip sits inside the trailing five observations.
        assert_eq!(detector.candidate("Array").unwrap().confidence, 0.0);
    }

    #[test]
    fn confidence_zero_below_growth_floor() {
        let mut detector = LeakDetector::new();
        feed(
            &mut detector,
            "Map",
            &[1000, 1100, 1200, 1300, 1400, 1500],
            Duration::from_secs(1),
        );

        let candidate = detector.candidate("Map").unwrap();
        assert!(candidate.growth_rate < GROWTH_FLOOR_BYTES_PER_SEC);
        assert_eq!(candidate.confidence, 0.0);
    }

    #[test]
    fn detect_promotes_only_confident_fast_growers() {
        let mut detector = LeakDetector::new();
        feed(
            &mut detector,
            "Buffer",
            &[10_000, 20_000, 30_000, 40_000, 50_000, 60_000],
            Duration::from_secs(1),
        );
        feed(
            &mut detector,
            "Map",
            &[1000, 1001, 1002, 1003, 1004, 1005],
            Duration::from_secs(1),
        );

        let leaks = detector.detect_leaks();
        assert_eq!(leaks.len(), 1);
        assert_eq!(leaks[0].type_name, "Buffer");
        assert_eq!(leaks[0].size, 60_000);
        assert!(!leaks[0].stack_trace.is_empty());
    }

    #[test]
    fn sample_buffer_stays_bounded_over_long_sessions() {
        let mut detector = LeakDetector::new();
        let sizes: Vec<u64> = (0..50).map(|i| 10_000 + i * 10_000).collect();
        feed(&mut detector, "Buffer", &sizes, Duration::from_secs(1));

        let candidate = detector.candidate("Buffer").unwrap();
        assert_eq!(candidate.samples.len(), GROWTH_WINDOW);
        assert_eq!(candidate.sample_count(), 50);
        assert_eq!(candidate.confidence, CONFIDENCE_CAP);
        // Rate still reflects only the trailing window: 10 KB per second.
        assert!((candidate.growth_rate - 10_000.0).abs() < 1.0);
    }

    #[test]
    fn confidence_caps_at_ceiling() {
        let mut detector = LeakDetector::new();
        let sizes: Vec<u64> = (0..20).map(|i| 10_000 + i * 10_000).collect();
        feed(&mut detector, "Buffer", &sizes, Duration::from_secs(1));
        assert_eq!(detector.candidate("Buffer").unwrap().confidence, CONFIDENCE_CAP);
    }
}
