//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::{BenchConfig, SystemMetricConfig};
use crate::error::{BenchError, BenchResult};
use crate::traits::TargetAdapter;

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .adapter(adapter)
///     .config(&config)
///     .build()?;
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    adapter: Option<Arc<dyn TargetAdapter>>,
    system_metric: SystemMetricConfig,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder; system metrics start disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target adapter
    pub fn adapter(mut self, adapter: Arc<dyn TargetAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Set the system metric settings
    pub fn system_metric(mut self, config: SystemMetricConfig) -> Self {
        self.system_metric = config;
        self
    }

    /// Take the system metric settings from a loaded configuration
    pub fn config(self, config: &BenchConfig) -> Self {
        self.system_metric(config.system_metric.clone())
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter is not set, or if configuration
    /// validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let adapter = self
            .adapter
            .ok_or_else(|| BenchError::missing_config("adapter"))?;

        self.system_metric.validate()?;

        Ok(Orchestrator::new(adapter, self.system_metric))
    }
}
