//! Alert model and rule evaluation.

use chrono::{DateTime, Utc};
use perfgauge_core::FAILED_METRIC_SENTINEL;
use perfgauge_core::config::AlertThresholds;
use perfgauge_core::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relative heap growth over the trailing sample window that counts as a
/// leak signal.
pub const LEAK_GROWTH_RATIO: f64 = 0.10;

/// Samples required before the in-monitor leak heuristic engages.
pub const LEAK_SAMPLE_WINDOW: usize = 10;

/// Kinds of alert the monitor can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    FrameTime,
    FrameRate,
    MemoryUsage,
    CpuUsage,
    GcPressure,
    MemoryLeak,
    Custom,
}

/// Severity derived from how far a value exceeds its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ladder on the observed/threshold ratio: ≥2.0 critical, ≥1.5 high,
    /// ≥1.2 medium, else low. For below-threshold rules the ratio is
    /// inverted so a deeper shortfall still climbs the ladder.
    pub fn from_breach(observed: f64, threshold: f64, below: bool) -> Self {
        let ratio = if below {
            if observed <= 0.0 {
                return Severity::Critical;
            }
            threshold / observed
        } else {
            if threshold <= 0.0 {
                return Severity::Critical;
            }
            observed / threshold
        };

        if ratio >= 2.0 {
            Severity::Critical
        } else if ratio >= 1.5 {
            Severity::High
        } else if ratio >= 1.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// One anomaly signal. Created transiently; only its `(alert_type, source)`
/// pair survives for cooldown bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub threshold: f64,
    pub observed: f64,
    /// Tag identifying which probe raised the alert; custom rules use the
    /// metric name.
    pub source: String,
    /// The snapshot that triggered the rule.
    pub metrics: PerformanceMetrics,
}

impl Alert {
    fn new(
        alert_type: AlertType,
        severity: Severity,
        message: String,
        threshold: f64,
        observed: f64,
        source: &str,
        metrics: &PerformanceMetrics,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            alert_type,
            severity,
            message,
            threshold,
            observed,
            source: source.to_string(),
            metrics: metrics.clone(),
        }
    }
}

/// Evaluate every alert rule against one snapshot; each breach yields one
/// alert (cooldown suppression happens in the monitor).
pub fn evaluate_rules(thresholds: &AlertThresholds, metrics: &PerformanceMetrics) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let frame_time = metrics.frame.frame_time_ms;
    if frame_time > thresholds.max_frame_time_ms {
        alerts.push(Alert::new(
            AlertType::FrameTime,
            Severity::from_breach(frame_time, thresholds.max_frame_time_ms, false),
            format!(
                "frame time {frame_time:.2}ms exceeds {:.2}ms",
                thresholds.max_frame_time_ms
            ),
            thresholds.max_frame_time_ms,
            frame_time,
            "frame",
            metrics,
        ));
    }

    let frame_rate = metrics.frame.frame_rate;
    if frame_rate < thresholds.min_frame_rate {
        alerts.push(Alert::new(
            AlertType::FrameRate,
            Severity::from_breach(frame_rate, thresholds.min_frame_rate, true),
            format!(
                "frame rate {frame_rate:.2}fps below {:.2}fps",
                thresholds.min_frame_rate
            ),
            thresholds.min_frame_rate,
            frame_rate,
            "frame",
            metrics,
        ));
    }

    let heap_ratio = metrics.memory.heap_ratio();
    if heap_ratio > thresholds.max_heap_ratio {
        alerts.push(Alert::new(
            AlertType::MemoryUsage,
            Severity::from_breach(heap_ratio, thresholds.max_heap_ratio, false),
            format!(
                "heap usage ratio {heap_ratio:.2} exceeds {:.2}",
                thresholds.max_heap_ratio
            ),
            thresholds.max_heap_ratio,
            heap_ratio,
            "memory",
            metrics,
        ));
    }

    let cpu = metrics.cpu.percent;
    if cpu > thresholds.max_cpu_percent {
        alerts.push(Alert::new(
            AlertType::CpuUsage,
            Severity::from_breach(cpu, thresholds.max_cpu_percent, false),
            format!("CPU usage {cpu:.2}% exceeds {:.2}%", thresholds.max_cpu_percent),
            thresholds.max_cpu_percent,
            cpu,
            "cpu",
            metrics,
        ));
    }

    let gc_pause = metrics.gc.pause_time_ms;
    if gc_pause > thresholds.max_gc_pause_ms {
        alerts.push(Alert::new(
            AlertType::GcPressure,
            Severity::from_breach(gc_pause, thresholds.max_gc_pause_ms, false),
            format!(
                "GC pause {gc_pause:.2}ms exceeds {:.2}ms",
                thresholds.max_gc_pause_ms
            ),
            thresholds.max_gc_pause_ms,
            gc_pause,
            "gc",
            metrics,
        ));
    }

    for (name, max) in &thresholds.custom {
        let Some(&observed) = metrics.custom.get(name) else {
            continue;
        };
        // A failed producer's sentinel is not a real reading.
        if observed == FAILED_METRIC_SENTINEL {
            continue;
        }
        if observed > *max {
            alerts.push(Alert::new(
                AlertType::Custom,
                Severity::from_breach(observed, *max, false),
                format!("custom metric '{name}' {observed:.2} exceeds {max:.2}"),
                *max,
                observed,
                name,
                metrics,
            ));
        }
    }

    alerts
}

/// In-monitor leak heuristic over the trailing window of heap readings.
///
/// Separate from the dedicated profiler: with at least
/// [`LEAK_SAMPLE_WINDOW`] samples, relative heap growth above
/// [`LEAK_GROWTH_RATIO`] raises a fixed high-severity alert, bypassing the
/// generic severity ladder.
pub fn evaluate_leak_heuristic(window: &[&PerformanceMetrics]) -> Option<Alert> {
    if window.len() < LEAK_SAMPLE_WINDOW {
        return None;
    }
    let recent = &window[window.len() - LEAK_SAMPLE_WINDOW..];
    let first = recent[0].memory.heap_used;
    let last = recent[recent.len() - 1].memory.heap_used;
    if first == 0 {
        return None;
    }

    let growth = (last as f64 - first as f64) / first as f64;
    if growth <= LEAK_GROWTH_RATIO {
        return None;
    }

    Some(Alert::new(
        AlertType::MemoryLeak,
        Severity::High,
        format!(
            "heap grew {:.1}% over the last {LEAK_SAMPLE_WINDOW} samples",
            growth * 100.0
        ),
        LEAK_GROWTH_RATIO,
        growth,
        "heap",
        recent[recent.len() - 1],
    ))
}
