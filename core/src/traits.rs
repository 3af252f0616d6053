//! Core trait for target adapters
//!
//! The trait is defined in core so that the orchestrator depends only on the
//! capability set. Implementations for concrete tools live in the adapters
//! crate (or in the caller's own crate).

use std::fmt;

use async_trait::async_trait;

use crate::context::RunContext;
use crate::sampler::host_memory_usage_kb;
use crate::types::{BenchmarkingStage, SystemMetric};

// ============================================================================
// Target Adapter Trait
// ============================================================================

/// Lifecycle of one benchmarked tool
///
/// The orchestrator raises the ingest stage right before calling [`ingest`]
/// and the query stage right before calling [`run_query_benchmark`], so
/// implementations only do tool work and record results through the
/// [`RunContext`].
///
/// [`ingest`]: TargetAdapter::ingest
/// [`run_query_benchmark`]: TargetAdapter::run_query_benchmark
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Tool identifier (e.g., "clp-s", "elasticsearch")
    fn name(&self) -> &str;

    /// Whether samples of `metric` should have the pre-run baseline subtracted
    ///
    /// Adapters whose samples are already scoped to the tool's own processes
    /// return `false`.
    fn uses_baseline(&self, _metric: SystemMetric) -> bool {
        true
    }

    /// Check prerequisites and prepare storage locations
    async fn deploy(&self, ctx: &RunContext) -> Result<(), AdapterError>;

    /// Start the service (no-op for plain binaries)
    async fn launch(&self, ctx: &RunContext) -> Result<(), AdapterError>;

    /// Ingest the dataset
    ///
    /// On success, sizes, ratio and end-to-end latency must be recorded with
    /// [`RunContext::record_ingest`].
    async fn ingest(&self, ctx: &RunContext) -> Result<(), AdapterError>;

    /// Run every configured query, recording one latency per query
    async fn run_query_benchmark(&self, ctx: &RunContext) -> Result<(), AdapterError>;

    /// Tear the service down between ingest and query in a cold run
    async fn mid_terminate(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        ctx.clear_stage(BenchmarkingStage::Ingest);
        self.terminate(ctx).await
    }

    /// Stop the service and release resources
    async fn terminate(&self, ctx: &RunContext) -> Result<(), AdapterError>;

    /// Take one reading of a system metric
    ///
    /// Defaults to memory in use on the host.
    async fn acquire_system_metric_sample(&self, metric: SystemMetric) -> Result<i64, AdapterError> {
        match metric {
            SystemMetric::Memory => host_memory_usage_kb().await,
        }
    }
}

// ============================================================================
// Lifecycle Operations
// ============================================================================

/// Adapter operation, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    /// [`TargetAdapter::deploy`]
    Deploy,
    /// [`TargetAdapter::launch`]
    Launch,
    /// [`TargetAdapter::ingest`]
    Ingest,
    /// [`TargetAdapter::run_query_benchmark`]
    RunQueryBenchmark,
    /// [`TargetAdapter::mid_terminate`]
    MidTerminate,
    /// [`TargetAdapter::terminate`]
    Terminate,
}

impl LifecycleOp {
    /// Operation name
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleOp::Deploy => "deploy",
            LifecycleOp::Launch => "launch",
            LifecycleOp::Ingest => "ingest",
            LifecycleOp::RunQueryBenchmark => "run_query_benchmark",
            LifecycleOp::MidTerminate => "mid_terminate",
            LifecycleOp::Terminate => "terminate",
        }
    }

    /// Stage the operation runs in, if it is a sampled stage
    pub const fn stage(self) -> Option<BenchmarkingStage> {
        match self {
            LifecycleOp::Ingest => Some(BenchmarkingStage::Ingest),
            LifecycleOp::RunQueryBenchmark => Some(BenchmarkingStage::Query),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Adapter Errors
// ============================================================================

/// Adapter-specific errors
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// An external command exited unsuccessfully
    #[error("command `{command}` failed: {status}")]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit status description
        status: String,
    },

    /// IO error (spawning processes, reading files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool output could not be interpreted
    #[error("unexpected output: {0}")]
    UnexpectedOutput(String),

    /// Adapter misconfiguration
    #[error("configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Shorthand for a failed command
    pub fn command_failed(command: impl Into<String>, status: impl fmt::Display) -> Self {
        AdapterError::CommandFailed {
            command: command.into(),
            status: status.to_string(),
        }
    }
}
