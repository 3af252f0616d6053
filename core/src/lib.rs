//! clp-bench-core: Core of the log-tool benchmarking harness
//!
//! This crate provides everything the harness needs independent of any
//! concrete tool, including:
//!
//! - The target adapter capability set and its run context
//! - The workflow controller for hot, cold and query-only modes
//! - Stage-aware background system metric sampling
//! - Per-mode results and the end-of-run report
//! - Configuration and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod result;
pub mod sampler;
pub mod traits;
pub mod types;

pub use config::{BenchConfig, ConfigError, MetricPollingConfig, SystemMetricConfig};
pub use context::RunContext;
pub use error::*;
pub use orchestrator::{
    stage_average, BenchmarkReport, ModeOutcome, ModeReport, ModeSelection, Orchestrator,
    OrchestratorBuilder, StageAverage,
};
pub use result::{Baseline, BenchmarkingResult, IngestMetrics, MetricRecord, MetricSample, ResultSet};
pub use sampler::{MetricSampler, SamplerError, StageSignals};
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod integration_tests {
    use super::*;

    // =========================================================================
    // End-to-end configuration to report
    // =========================================================================

    #[test]
    fn test_config_document_drives_report() {
        let config = BenchConfig::from_yaml_str(
            r#"
system_metric:
  enable: true
  memory:
    ingest_polling_interval: 0.5
command:
  dataset_path: /data
"#,
        )
        .unwrap();

        let results = ResultSet::new();
        results.with_mode(BenchmarkingMode::ColdRun, |r| {
            let memory = r.metric_mut(SystemMetric::Memory);
            memory.baseline = Baseline::Value(1000);
            memory.push(BenchmarkingStage::Query, MetricSample::now(1500));
        });

        let report = BenchmarkReport::from_results(&results, &config.system_metric);
        let cold = report.mode(BenchmarkingMode::ColdRun).unwrap();
        assert_eq!(
            cold.stage_average(SystemMetric::Memory, BenchmarkingStage::Query),
            Some(500)
        );
        assert_eq!(
            cold.stage_average(SystemMetric::Memory, BenchmarkingStage::Ingest),
            Some(0)
        );
    }

    #[test]
    fn test_error_conversions() {
        let err: BenchError = SamplerError::NotSampling {
            metric: SystemMetric::Memory,
            mode: BenchmarkingMode::HotRun,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "sampler error: already stopped polling memory usage for mode hot run"
        );

        let err: BenchError = ConfigError::MissingSection("command".into()).into();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
