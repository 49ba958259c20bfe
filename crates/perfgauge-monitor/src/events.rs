//! Monitor lifecycle events.

use crate::alert::Alert;
use perfgauge_core::metrics::PerformanceMetrics;
use serde::Serialize;

/// Events emitted over the monitor's bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// One sampling tick completed and the snapshot entered the history.
    MetricsCollected { metrics: PerformanceMetrics },
    /// An alert rule fired and survived the cooldown filter.
    Alert { alert: Alert },
    /// The monitor accepted a new configuration.
    ConfigUpdated,
}
