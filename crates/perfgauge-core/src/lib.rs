//! Core types for the perfgauge performance measurement engine.
//!
//! This crate holds everything the higher-level components share: the
//! immutable [`PerformanceMetrics`] snapshot model, the pluggable metric
//! collector, the pure statistics engine, the broadcast-based event bus,
//! and the validated monitor configuration.

pub mod collector;
pub mod config;
pub mod event;
pub mod export;
pub mod metrics;
pub mod stats;

pub use collector::{CollectorError, MetricCollector, MetricSource, SystemMetricSource};
pub use config::{AlertThresholds, ConfigError, MonitorConfig};
pub use event::EventBus;
pub use export::TabularExport;
pub use metrics::{CpuMetrics, FrameMetrics, GcMetrics, MemoryMetrics, PerformanceMetrics};
pub use stats::DurationStats;

/// Sentinel recorded for a custom metric whose producer failed.
///
/// Consumers treat this as "collection failed", not as a real reading.
pub const FAILED_METRIC_SENTINEL: f64 = -1.0;
