//! Continuous performance monitoring with anomaly alerting.
//!
//! A [`PerformanceMonitor`] samples a metric collector on a fixed interval,
//! keeps a time-bounded history, evaluates alert rules against every
//! sample, and emits rate-limited [`Alert`] events over its bus.

pub mod alert;
pub mod events;
pub mod export;
pub mod monitor;

pub use alert::{Alert, AlertType, Severity};
pub use events::MonitorEvent;
pub use monitor::{AverageMetrics, PerformanceMonitor};
