//! The sampling loop and its bounded history.
//!
//! `Stopped → Running → Stopped`, transitioned by explicit start/stop;
//! both are no-ops when the monitor is already in the target state. The
//! loop is a spawned tokio task; stopping aborts future ticks but never
//! rolls back recorded samples.

use crate::alert::{AlertType, evaluate_leak_heuristic, evaluate_rules};
use crate::events::MonitorEvent;
use chrono::{DateTime, Utc};
use perfgauge_core::FAILED_METRIC_SENTINEL;
use perfgauge_core::collector::MetricCollector;
use perfgauge_core::config::{ConfigError, MonitorConfig};
use perfgauge_core::event::EventBus;
use perfgauge_core::metrics::PerformanceMetrics;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Minimum gap between two alerts of the same `(type, source)` pair.
pub const ALERT_COOLDOWN: Duration = Duration::from_secs(30);

/// Trailing-window averages over the recorded history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AverageMetrics {
    pub heap_used: f64,
    pub heap_ratio: f64,
    pub cpu_percent: f64,
    pub frame_time_ms: f64,
    pub frame_rate: f64,
    /// Per-key means of custom readings, failed-producer sentinels skipped.
    pub custom: BTreeMap<String, f64>,
    pub sample_count: usize,
}

struct MonitorState {
    config: RwLock<MonitorConfig>,
    collector: Mutex<MetricCollector>,
    history: Mutex<VecDeque<PerformanceMetrics>>,
    cooldowns: Mutex<HashMap<(AlertType, String), Instant>>,
    events: EventBus<MonitorEvent>,
}

impl MonitorState {
    /// One sampling tick: collect, append and prune history, evaluate
    /// rules, emit. A failing collector skips the tick instead of killing
    /// the session.
    fn sample(&self) {
        let metrics = {
            let mut collector = self.collector.lock().unwrap_or_else(PoisonError::into_inner);
            match collector.collect() {
                Ok(metrics) => metrics,
                Err(error) => {
                    warn!(%error, "snapshot collection failed, skipping tick");
                    return;
                }
            }
        };

        let (thresholds, retention) = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            (config.thresholds.clone(), config.retention)
        };

        let mut alerts = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(metrics.clone());
            prune_history(&mut history, retention);

            let mut alerts = evaluate_rules(&thresholds, &metrics);
            let window: Vec<&PerformanceMetrics> = history.iter().collect();
            if let Some(leak) = evaluate_leak_heuristic(&window) {
                alerts.push(leak);
            }
            alerts
        };

        alerts.retain(|alert| self.passes_cooldown(alert.alert_type, &alert.source));
        for alert in alerts {
            info!(
                alert_type = ?alert.alert_type,
                severity = ?alert.severity,
                source = %alert.source,
                "performance alert"
            );
            self.events.emit(MonitorEvent::Alert { alert });
        }

        self.events.emit(MonitorEvent::MetricsCollected { metrics });
    }

    /// A `(type, source)` pair may fire at most once per cooldown window;
    /// later breaches inside the window are dropped silently.
    fn passes_cooldown(&self, alert_type: AlertType, source: &str) -> bool {
        let mut cooldowns = self.cooldowns.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (alert_type, source.to_string());
        let now = Instant::now();

        match cooldowns.get(&key) {
            Some(last) if now.duration_since(*last) < ALERT_COOLDOWN => false,
            _ => {
                cooldowns.insert(key, now);
                true
            }
        }
    }
}

fn prune_history(history: &mut VecDeque<PerformanceMetrics>, retention: Duration) {
    let Ok(retention) = chrono::Duration::from_std(retention) else {
        return;
    };
    let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
        return;
    };
    while history.front().is_some_and(|m| m.timestamp < cutoff) {
        history.pop_front();
    }
}

/// Periodic metric sampler with alerting.
pub struct PerformanceMonitor {
    state: Arc<MonitorState>,
    task: Option<JoinHandle<()>>,
}

impl PerformanceMonitor {
    /// Monitor over the default `sysinfo`-backed collector. Configuration
    /// is validated synchronously; violations fail construction.
    pub fn new(config: MonitorConfig) -> Result<Self, ConfigError> {
        Self::with_collector(config, MetricCollector::system())
    }

    /// Monitor over an explicit collector (tests use scripted sources).
    pub fn with_collector(
        config: MonitorConfig,
        collector: MetricCollector,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(MonitorState {
                config: RwLock::new(config),
                collector: Mutex::new(collector),
                history: Mutex::new(VecDeque::new()),
                cooldowns: Mutex::new(HashMap::new()),
                events: EventBus::new(),
            }),
            task: None,
        })
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.state.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Begin sampling. A no-op when already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let state = Arc::clone(&self.state);
        let interval = state
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sample_interval;

        info!(?interval, "performance monitor started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                state.sample();
            }
        }));
    }

    /// Cancel future ticks. A no-op when already stopped; recorded samples
    /// are kept.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("performance monitor stopped");
        }
    }

    /// Replace the configuration: validate, stop, swap, restart if the
    /// monitor was running.
    pub fn update_config(&mut self, config: MonitorConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let was_running = self.is_running();
        self.stop();
        *self
            .state
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
        if was_running {
            self.start();
        }

        self.state.events.emit(MonitorEvent::ConfigUpdated);
        Ok(())
    }

    pub fn config(&self) -> MonitorConfig {
        self.state
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a named custom metric producer on the underlying collector.
    pub fn register_custom_metric<F>(&self, name: impl Into<String>, producer: F)
    where
        F: Fn() -> Result<f64, String> + Send + Sync + 'static,
    {
        self.state
            .collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register_custom(name, producer);
    }

    /// Remove a custom metric producer, returning whether one existed.
    pub fn remove_custom_metric(&self, name: &str) -> bool {
        self.state
            .collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_custom(name)
    }

    /// Full recorded history, oldest first.
    pub fn history(&self) -> Vec<PerformanceMetrics> {
        self.state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<PerformanceMetrics> {
        self.state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    /// Samples inside the inclusive time range.
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<PerformanceMetrics> {
        self.state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| m.timestamp >= from && m.timestamp <= to)
            .cloned()
            .collect()
    }

    /// Averages over samples inside the trailing window, `None` when the
    /// window is empty.
    pub fn average(&self, window: Duration) -> Option<AverageMetrics> {
        let Ok(window) = chrono::Duration::from_std(window) else {
            return None;
        };
        let cutoff = Utc::now().checked_sub_signed(window)?;

        let history = self
            .state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let samples: Vec<&PerformanceMetrics> =
            history.iter().filter(|m| m.timestamp >= cutoff).collect();
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as f64;
        let mut custom_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for sample in &samples {
            for (key, &value) in &sample.custom {
                if value == FAILED_METRIC_SENTINEL {
                    continue;
                }
                let entry = custom_sums.entry(key.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        Some(AverageMetrics {
            heap_used: samples.iter().map(|m| m.memory.heap_used as f64).sum::<f64>() / count,
            heap_ratio: samples.iter().map(|m| m.memory.heap_ratio()).sum::<f64>() / count,
            cpu_percent: samples.iter().map(|m| m.cpu.percent).sum::<f64>() / count,
            frame_time_ms: samples.iter().map(|m| m.frame.frame_time_ms).sum::<f64>() / count,
            frame_rate: samples.iter().map(|m| m.frame.frame_rate).sum::<f64>() / count,
            custom: custom_sums
                .into_iter()
                .filter(|(_, (_, n))| *n > 0)
                .map(|(key, (sum, n))| (key, sum / n as f64))
                .collect(),
            sample_count: samples.len(),
        })
    }

    /// Drop all recorded samples.
    pub fn clear_history(&self) {
        self.state
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Structured document export of the recorded history.
    pub fn export_document(&self) -> serde_json::Value {
        crate::export::history_document(&self.history())
    }

    /// Flattened tabular export of the recorded history.
    pub fn export_rows(&self) -> perfgauge_core::export::TabularExport {
        crate::export::history_rows(&self.history())
    }

    /// Run one sampling pass immediately, outside the interval loop.
    /// Useful for callers that drive sampling themselves.
    pub fn sample_once(&self) {
        self.state.sample();
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
