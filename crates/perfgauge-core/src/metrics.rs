//! Point-in-time performance readings.
//!
//! A [`PerformanceMetrics`] value is produced once per sample and never
//! mutated afterwards. Benchmark iterations capture a start and an end
//! snapshot and keep only the [`PerformanceMetrics::delta`] between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Memory usage at a point in time, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub heap_used: u64,
    pub heap_total: u64,
    pub external: u64,
    pub rss: u64,
    pub array_buffers: u64,
}

impl MemoryMetrics {
    /// Fraction of the heap currently in use, `0.0` when the total is unknown.
    pub fn heap_ratio(&self) -> f64 {
        if self.heap_total == 0 {
            0.0
        } else {
            self.heap_used as f64 / self.heap_total as f64
        }
    }
}

/// CPU usage at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    /// Accumulated user-mode CPU time in microseconds.
    pub user_micros: u64,
    /// Accumulated kernel-mode CPU time in microseconds.
    pub system_micros: u64,
    /// Instantaneous CPU usage in percent (0-100 per core aggregate).
    pub percent: f64,
    /// 1/5/15 minute load averages.
    pub load_average: [f64; 3],
}

/// Frame timing contributed by an embedding render loop.
///
/// The default metric source leaves these zeroed; callers that own a frame
/// loop feed them in through a custom [`crate::MetricSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub frame_time_ms: f64,
    pub frame_rate: f64,
    pub render_time_ms: f64,
    pub update_time_ms: f64,
}

/// Garbage-collection statistics for runtimes that expose them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GcMetrics {
    pub collections: u64,
    pub pause_time_ms: f64,
    pub heap_before: u64,
    pub heap_after: u64,
    pub freed_bytes: u64,
}

/// One immutable, timestamped bundle of system metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub timestamp: DateTime<Utc>,
    pub memory: MemoryMetrics,
    pub cpu: CpuMetrics,
    pub frame: FrameMetrics,
    pub gc: GcMetrics,
    /// Open mapping of named readings contributed by custom producers.
    pub custom: BTreeMap<String, f64>,
}

impl PerformanceMetrics {
    /// Create a zeroed bundle stamped with the current time.
    pub fn empty_now() -> Self {
        Self {
            timestamp: Utc::now(),
            ..Self::default()
        }
    }

    /// End-minus-start delta between two snapshots.
    ///
    /// Unsigned counters saturate at zero instead of wrapping; custom keys
    /// present in either snapshot survive into the delta (a key missing on
    /// one side is treated as zero).
    pub fn delta(start: &Self, end: &Self) -> Self {
        let mut custom = BTreeMap::new();
        for key in start.custom.keys().chain(end.custom.keys()) {
            let before = start.custom.get(key).copied().unwrap_or(0.0);
            let after = end.custom.get(key).copied().unwrap_or(0.0);
            custom.insert(key.clone(), after - before);
        }

        Self {
            timestamp: end.timestamp,
            memory: MemoryMetrics {
                heap_used: end.memory.heap_used.saturating_sub(start.memory.heap_used),
                heap_total: end.memory.heap_total,
                external: end.memory.external.saturating_sub(start.memory.external),
                rss: end.memory.rss.saturating_sub(start.memory.rss),
                array_buffers: end
                    .memory
                    .array_buffers
                    .saturating_sub(start.memory.array_buffers),
            },
            cpu: CpuMetrics {
                user_micros: end.cpu.user_micros.saturating_sub(start.cpu.user_micros),
                system_micros: end
                    .cpu
                    .system_micros
                    .saturating_sub(start.cpu.system_micros),
                percent: end.cpu.percent,
                load_average: end.cpu.load_average,
            },
            frame: FrameMetrics {
                frame_time_ms: end.frame.frame_time_ms - start.frame.frame_time_ms,
                frame_rate: end.frame.frame_rate,
                render_time_ms: end.frame.render_time_ms - start.frame.render_time_ms,
                update_time_ms: end.frame.update_time_ms - start.frame.update_time_ms,
            },
            gc: GcMetrics {
                collections: end.gc.collections.saturating_sub(start.gc.collections),
                pause_time_ms: end.gc.pause_time_ms - start.gc.pause_time_ms,
                heap_before: start.gc.heap_before,
                heap_after: end.gc.heap_after,
                freed_bytes: end.gc.freed_bytes.saturating_sub(start.gc.freed_bytes),
            },
            custom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(heap_used: u64, cpu_percent: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            timestamp: Utc::now(),
            memory: MemoryMetrics {
                heap_used,
                heap_total: 1024,
                ..MemoryMetrics::default()
            },
            cpu: CpuMetrics {
                percent: cpu_percent,
                ..CpuMetrics::default()
            },
            ..PerformanceMetrics::default()
        }
    }

    #[test]
    fn delta_subtracts_counters() {
        let start = snapshot(100, 10.0);
        let end = snapshot(250, 40.0);

        let delta = PerformanceMetrics::delta(&start, &end);
        assert_eq!(delta.memory.heap_used, 150);
        assert_eq!(delta.cpu.percent, 40.0);
    }

    #[test]
    fn delta_saturates_on_shrink() {
        let start = snapshot(500, 0.0);
        let end = snapshot(100, 0.0);

        let delta = PerformanceMetrics::delta(&start, &end);
        assert_eq!(delta.memory.heap_used, 0);
    }

    #[test]
    fn delta_merges_custom_keys() {
        let mut start = snapshot(0, 0.0);
        let mut end = snapshot(0, 0.0);
        start.custom.insert("queue_depth".into(), 5.0);
        end.custom.insert("queue_depth".into(), 9.0);
        end.custom.insert("cache_hits".into(), 3.0);

        let delta = PerformanceMetrics::delta(&start, &end);
        assert_eq!(delta.custom["queue_depth"], 4.0);
        assert_eq!(delta.custom["cache_hits"], 3.0);
    }

    #[test]
    fn heap_ratio_handles_zero_total() {
        assert_eq!(MemoryMetrics::default().heap_ratio(), 0.0);

        let mem = MemoryMetrics {
            heap_used: 512,
            heap_total: 1024,
            ..MemoryMetrics::default()
        };
        assert_eq!(mem.heap_ratio(), 0.5);
    }
}
