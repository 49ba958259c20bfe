//! Metric snapshot collection.
//!
//! [`MetricCollector`] pairs a pluggable [`MetricSource`] with a registry of
//! named custom producers. The default [`SystemMetricSource`] reads process
//! and host figures through `sysinfo`; embedding applications with a frame
//! loop or a GC-backed runtime supply their own source to fill in the
//! sections `sysinfo` cannot see.

use crate::FAILED_METRIC_SENTINEL;
use crate::metrics::{CpuMetrics, MemoryMetrics, PerformanceMetrics};
use chrono::Utc;
use std::collections::BTreeMap;
use sysinfo::{ProcessesToUpdate, System, get_current_pid};
use thiserror::Error;
use tracing::warn;

/// Errors raised while collecting a snapshot.
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("current process is not visible to the metric collector")]
    ProcessUnavailable,

    #[error("metric source failed: {0}")]
    Source(String),
}

/// A pluggable producer of point-in-time metric snapshots.
pub trait MetricSource: Send + Sync {
    fn collect(&mut self) -> Result<PerformanceMetrics, CollectorError>;
}

/// Default source backed by `sysinfo`.
///
/// Populates memory and CPU sections from the running process and host.
/// Frame timing and GC sections stay zeroed; `sysinfo` has no view into
/// them, so they are left to embedding-specific sources. CPU time split
/// (user vs system) is likewise runtime-contributed and stays zeroed here.
pub struct SystemMetricSource {
    system: System,
}

impl SystemMetricSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SystemMetricSource {
    fn collect(&mut self) -> Result<PerformanceMetrics, CollectorError> {
        let pid = get_current_pid().map_err(|_| CollectorError::ProcessUnavailable)?;

        self.system.refresh_memory();
        self.system.refresh_cpu_usage();
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = self
            .system
            .process(pid)
            .ok_or(CollectorError::ProcessUnavailable)?;

        let load = System::load_average();

        Ok(PerformanceMetrics {
            timestamp: Utc::now(),
            memory: MemoryMetrics {
                heap_used: process.memory(),
                heap_total: self.system.total_memory(),
                external: process.virtual_memory().saturating_sub(process.memory()),
                rss: process.memory(),
                array_buffers: 0,
            },
            cpu: CpuMetrics {
                user_micros: 0,
                system_micros: 0,
                percent: f64::from(self.system.global_cpu_usage()),
                load_average: [load.one, load.five, load.fifteen],
            },
            ..PerformanceMetrics::default()
        })
    }
}

type CustomProducer = Box<dyn Fn() -> Result<f64, String> + Send + Sync>;

/// Snapshot collector with pluggable source and named custom producers.
pub struct MetricCollector {
    source: Box<dyn MetricSource>,
    producers: BTreeMap<String, CustomProducer>,
}

impl MetricCollector {
    /// Collector over an explicit source.
    pub fn new(source: Box<dyn MetricSource>) -> Self {
        Self {
            source,
            producers: BTreeMap::new(),
        }
    }

    /// Collector over the default `sysinfo` source.
    pub fn system() -> Self {
        Self::new(Box::new(SystemMetricSource::new()))
    }

    /// Register a named custom producer. Re-registering a name replaces the
    /// previous producer.
    pub fn register_custom<F>(&mut self, name: impl Into<String>, producer: F)
    where
        F: Fn() -> Result<f64, String> + Send + Sync + 'static,
    {
        self.producers.insert(name.into(), Box::new(producer));
    }

    /// Remove a custom producer, returning whether one was registered.
    pub fn remove_custom(&mut self, name: &str) -> bool {
        self.producers.remove(name).is_some()
    }

    /// Names of all registered custom producers, in order.
    pub fn custom_names(&self) -> Vec<String> {
        self.producers.keys().cloned().collect()
    }

    /// Collect one snapshot.
    ///
    /// A failing custom producer records [`FAILED_METRIC_SENTINEL`] for its
    /// key instead of failing the whole collection; only the underlying
    /// source can fail the call.
    pub fn collect(&mut self) -> Result<PerformanceMetrics, CollectorError> {
        let mut metrics = self.source.collect()?;

        for (name, producer) in &self.producers {
            let value = match producer() {
                Ok(value) => value,
                Err(reason) => {
                    warn!(metric = %name, %reason, "custom metric producer failed");
                    FAILED_METRIC_SENTINEL
                }
            };
            metrics.custom.insert(name.clone(), value);
        }

        Ok(metrics)
    }
}
