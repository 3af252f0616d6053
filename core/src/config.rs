//! Benchmark configuration types
//!
//! The configuration is a YAML document. The `system_metric` section is read
//! by the metric sampler; every other top-level section belongs to a target
//! adapter and is kept as raw YAML until the adapter asks for it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{BenchmarkingStage, SystemMetric};

const DEFAULT_POLLING_INTERVAL_SECS: f64 = 10.0;

fn default_polling_interval() -> f64 {
    DEFAULT_POLLING_INTERVAL_SECS
}

/// Non-zero interval representable as a `Duration`
fn interval_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|interval| !interval.is_zero())
}

fn default_true() -> bool {
    true
}

/// Whole benchmark configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// System metric sampling settings
    #[serde(default)]
    pub system_metric: SystemMetricConfig,

    /// Target adapter sections, keyed by section name
    #[serde(flatten)]
    pub targets: BTreeMap<String, serde_yaml::Value>,
}

impl BenchConfig {
    /// Load and validate a configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate a configuration document
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BenchConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize the named target section
    pub fn target_section<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        let section = self
            .targets
            .get(name)
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;
        serde_yaml::from_value(section.clone()).map_err(|source| ConfigError::InvalidSection {
            section: name.to_string(),
            source,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.system_metric.validate()
    }
}

/// `system_metric` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetricConfig {
    /// Global switch; nothing is sampled or averaged when off
    #[serde(default)]
    pub enable: bool,

    /// Memory polling settings
    #[serde(default)]
    pub memory: MetricPollingConfig,
}

impl SystemMetricConfig {
    /// Sampling enabled for every metric with default intervals
    pub fn enabled() -> Self {
        Self {
            enable: true,
            ..Default::default()
        }
    }

    /// Set one metric's polling interval for a stage
    pub fn with_interval(
        mut self,
        metric: SystemMetric,
        stage: BenchmarkingStage,
        interval: Duration,
    ) -> Self {
        let polling = self.metric_mut(metric);
        match stage {
            BenchmarkingStage::Ingest => polling.ingest_polling_interval = interval.as_secs_f64(),
            BenchmarkingStage::Query => {
                polling.run_query_benchmark_polling_interval = interval.as_secs_f64()
            }
        }
        self
    }

    /// Polling settings of a metric
    pub fn metric(&self, metric: SystemMetric) -> &MetricPollingConfig {
        match metric {
            SystemMetric::Memory => &self.memory,
        }
    }

    fn metric_mut(&mut self, metric: SystemMetric) -> &mut MetricPollingConfig {
        match metric {
            SystemMetric::Memory => &mut self.memory,
        }
    }

    /// Whether a metric should be sampled at all
    pub fn is_enabled(&self, metric: SystemMetric) -> bool {
        self.enable && self.metric(metric).enable
    }

    /// Polling interval of a metric during a stage
    ///
    /// Falls back to the default interval for a value `validate` rejects.
    pub fn polling_interval(&self, metric: SystemMetric, stage: BenchmarkingStage) -> Duration {
        let secs = self.metric(metric).interval_secs(stage);
        interval_from_secs(secs).unwrap_or_else(|| {
            tracing::warn!(
                metric = %metric,
                stage = %stage,
                value = secs,
                "Invalid polling interval, using the default"
            );
            Duration::from_secs(DEFAULT_POLLING_INTERVAL_SECS as u64)
        })
    }

    /// Validate every metric's intervals
    pub fn validate(&self) -> Result<(), ConfigError> {
        for metric in SystemMetric::ALL {
            for stage in BenchmarkingStage::ALL {
                let secs = self.metric(metric).interval_secs(stage);
                if interval_from_secs(secs).is_none() {
                    return Err(ConfigError::InvalidInterval {
                        metric,
                        stage,
                        value: secs,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Per-metric polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPollingConfig {
    /// Per-metric switch, only consulted when the global switch is on
    #[serde(default = "default_true")]
    pub enable: bool,

    /// Seconds between samples while ingesting
    #[serde(default = "default_polling_interval")]
    pub ingest_polling_interval: f64,

    /// Seconds between samples while the query benchmark runs
    #[serde(default = "default_polling_interval")]
    pub run_query_benchmark_polling_interval: f64,
}

impl Default for MetricPollingConfig {
    fn default() -> Self {
        Self {
            enable: true,
            ingest_polling_interval: DEFAULT_POLLING_INTERVAL_SECS,
            run_query_benchmark_polling_interval: DEFAULT_POLLING_INTERVAL_SECS,
        }
    }
}

impl MetricPollingConfig {
    /// Interval in seconds for a stage
    pub fn interval_secs(&self, stage: BenchmarkingStage) -> f64 {
        match stage {
            BenchmarkingStage::Ingest => self.ingest_polling_interval,
            BenchmarkingStage::Query => self.run_query_benchmark_polling_interval,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("unable to read {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Document is not valid YAML for this schema
    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A target section the adapter needs is absent
    #[error("missing config section: {0}")]
    MissingSection(String),

    /// A target section does not match the adapter's schema
    #[error("invalid config section {section}: {source}")]
    InvalidSection {
        /// Section name
        section: String,
        /// Underlying parse error
        source: serde_yaml::Error,
    },

    /// A polling interval is zero, negative, too large or not a number
    #[error("invalid {metric} polling interval for {stage}: {value}")]
    InvalidInterval {
        /// Metric being configured
        metric: SystemMetric,
        /// Stage being configured
        stage: BenchmarkingStage,
        /// Offending value in seconds
        value: f64,
    },
}
