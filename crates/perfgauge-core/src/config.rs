//! Monitor configuration with synchronous validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Smallest accepted sampling interval.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Smallest accepted history retention window.
pub const MIN_RETENTION: Duration = Duration::from_millis(1000);

/// Configuration errors are fatal to the construction or update that raised
/// them; a running monitor keeps its previous configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample interval {actual:?} is below the {min:?} minimum")]
    SampleIntervalTooSmall { actual: Duration, min: Duration },

    #[error("retention window {actual:?} is below the {min:?} minimum")]
    RetentionTooSmall { actual: Duration, min: Duration },
}

/// Per-metric alert thresholds, including an open custom mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Maximum acceptable frame time in milliseconds.
    pub max_frame_time_ms: f64,
    /// Minimum acceptable frame rate in frames per second.
    pub min_frame_rate: f64,
    /// Maximum acceptable heap-used / heap-total ratio.
    pub max_heap_ratio: f64,
    /// Maximum acceptable CPU usage in percent.
    pub max_cpu_percent: f64,
    /// Maximum acceptable GC pause in milliseconds.
    pub max_gc_pause_ms: f64,
    /// Named custom metric to maximum acceptable value.
    pub custom: BTreeMap<String, f64>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_frame_time_ms: 33.33,
            min_frame_rate: 30.0,
            max_heap_ratio: 0.8,
            max_cpu_percent: 80.0,
            max_gc_pause_ms: 50.0,
            custom: BTreeMap::new(),
        }
    }
}

/// Sampling and retention settings for the performance monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub sample_interval: Duration,
    pub retention: Duration,
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(1),
            retention: Duration::from_secs(300),
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Validate interval and retention floors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval < MIN_SAMPLE_INTERVAL {
            return Err(ConfigError::SampleIntervalTooSmall {
                actual: self.sample_interval,
                min: MIN_SAMPLE_INTERVAL,
            });
        }
        if self.retention < MIN_RETENTION {
            return Err(ConfigError::RetentionTooSmall {
                actual: self.retention,
                min: MIN_RETENTION,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_sub_minimum_interval() {
        let config = MonitorConfig {
            sample_interval: Duration::from_millis(50),
            ..MonitorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SampleIntervalTooSmall { .. })
        ));
    }

    #[test]
    fn rejects_sub_minimum_retention() {
        let config = MonitorConfig {
            retention: Duration::from_millis(500),
            ..MonitorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RetentionTooSmall { .. })
        ));
    }

    #[test]
    fn boundary_values_are_accepted() {
        let config = MonitorConfig {
            sample_interval: MIN_SAMPLE_INTERVAL,
            retention: MIN_RETENTION,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
