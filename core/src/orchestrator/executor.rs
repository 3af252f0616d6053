//! Orchestrator execution logic

use std::sync::Arc;
use std::time::Instant;

use crate::config::SystemMetricConfig;
use crate::context::RunContext;
use crate::error::BenchError;
use crate::result::{Baseline, ResultSet};
use crate::sampler::{MetricSampler, StageSignals};
use crate::traits::{AdapterError, LifecycleOp, TargetAdapter};
use crate::types::{BenchmarkingMode, SystemMetric};

use super::aggregator::BenchmarkReport;

const HOT_RUN_SEQUENCE: &[LifecycleOp] = &[
    LifecycleOp::Deploy,
    LifecycleOp::Launch,
    LifecycleOp::Ingest,
    LifecycleOp::RunQueryBenchmark,
];

const COLD_RUN_SEQUENCE: &[LifecycleOp] = &[
    LifecycleOp::Deploy,
    LifecycleOp::Launch,
    LifecycleOp::Ingest,
    LifecycleOp::MidTerminate,
    LifecycleOp::Launch,
    LifecycleOp::RunQueryBenchmark,
];

const QUERY_ONLY_SEQUENCE: &[LifecycleOp] = &[LifecycleOp::Launch, LifecycleOp::RunQueryBenchmark];

/// Which modes a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeSelection {
    /// Hot run, then cold run
    #[default]
    All,
    /// Hot run only
    Hot,
    /// Cold run only
    Cold,
    /// Query-only run; never combined with the others
    QueryOnly,
}

impl ModeSelection {
    /// Modes to run, in order
    pub const fn modes(self) -> &'static [BenchmarkingMode] {
        match self {
            ModeSelection::All => &[BenchmarkingMode::HotRun, BenchmarkingMode::ColdRun],
            ModeSelection::Hot => &[BenchmarkingMode::HotRun],
            ModeSelection::Cold => &[BenchmarkingMode::ColdRun],
            ModeSelection::QueryOnly => &[BenchmarkingMode::QueryOnlyRun],
        }
    }
}

/// How a mode ended
#[derive(Debug)]
pub struct ModeOutcome {
    /// Mode that ran
    pub mode: BenchmarkingMode,
    /// First failure of the main sequence, if any
    pub failure: Option<BenchError>,
}

impl ModeOutcome {
    /// Whether every main-sequence step succeeded
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Orchestrator drives one target adapter through the benchmarking modes
///
/// Responsible for the lifecycle call order of each mode, bracketing it with
/// metric sampling, raising the stage signals and always cleaning up.
pub struct Orchestrator {
    /// Target adapter under benchmark
    pub(crate) adapter: Arc<dyn TargetAdapter>,

    /// System metric settings
    pub(crate) config: SystemMetricConfig,

    /// Stage indicator shared with the sampler
    pub(crate) signals: Arc<StageSignals>,

    /// Per-mode results shared with the sampler and the adapter
    pub(crate) results: Arc<ResultSet>,

    /// Background metric sampling
    pub(crate) sampler: MetricSampler,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    pub fn new(adapter: Arc<dyn TargetAdapter>, config: SystemMetricConfig) -> Self {
        let signals = Arc::new(StageSignals::new());
        let results = Arc::new(ResultSet::new());

        for metric in SystemMetric::ALL {
            if !adapter.uses_baseline(metric) {
                for mode in BenchmarkingMode::ALL {
                    results.with_mode(mode, |r| r.metric_mut(metric).baseline = Baseline::Disabled);
                }
            }
        }

        let sampler = MetricSampler::new(
            Arc::clone(&adapter),
            config.clone(),
            Arc::clone(&signals),
            Arc::clone(&results),
        );

        Self {
            adapter,
            config,
            signals,
            results,
            sampler,
        }
    }

    /// Get the system metric configuration
    pub fn config(&self) -> &SystemMetricConfig {
        &self.config
    }

    /// Shared per-mode results
    pub fn results(&self) -> &Arc<ResultSet> {
        &self.results
    }

    /// Shared stage indicator
    pub fn signals(&self) -> &Arc<StageSignals> {
        &self.signals
    }

    /// The metric sampler
    pub fn sampler(&self) -> &MetricSampler {
        &self.sampler
    }

    /// Deploy, launch, ingest and query against a warm service
    pub async fn hot_run(&self) -> ModeOutcome {
        self.run_mode(BenchmarkingMode::HotRun, HOT_RUN_SEQUENCE).await
    }

    /// Like [`hot_run`](Self::hot_run), relaunching the service before querying
    pub async fn cold_run(&self) -> ModeOutcome {
        self.run_mode(BenchmarkingMode::ColdRun, COLD_RUN_SEQUENCE).await
    }

    /// Launch and query only; the service is left running
    pub async fn query_only_run(&self) -> ModeOutcome {
        self.run_mode(BenchmarkingMode::QueryOnlyRun, QUERY_ONLY_SEQUENCE)
            .await
    }

    /// Run the selected modes in order
    ///
    /// A failed mode never prevents the next one from starting.
    pub async fn run(&self, selection: ModeSelection) -> Vec<ModeOutcome> {
        let mut outcomes = Vec::with_capacity(selection.modes().len());
        for mode in selection.modes() {
            let outcome = match mode {
                BenchmarkingMode::HotRun => self.hot_run().await,
                BenchmarkingMode::ColdRun => self.cold_run().await,
                BenchmarkingMode::QueryOnlyRun => self.query_only_run().await,
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Summarize everything collected so far
    pub fn report(&self) -> BenchmarkReport {
        BenchmarkReport::from_results(&self.results, &self.config)
    }

    async fn run_mode(&self, mode: BenchmarkingMode, sequence: &[LifecycleOp]) -> ModeOutcome {
        let start = Instant::now();
        let ctx = RunContext::new(mode, Arc::clone(&self.signals), Arc::clone(&self.results));
        let metrics: Vec<SystemMetric> = SystemMetric::ALL
            .into_iter()
            .filter(|metric| self.config.is_enabled(*metric))
            .collect();

        tracing::info!(mode = %mode, adapter = self.adapter.name(), "Starting mode");

        for metric in &metrics {
            if let Err(e) = self.sampler.start(*metric, mode).await {
                tracing::error!(mode = %mode, metric = %metric, error = %e, "Failed to start sampling");
            }
        }

        let mut failure = None;
        for op in sequence {
            if let Err(source) = self.call(&ctx, *op).await {
                tracing::error!(
                    mode = %mode,
                    operation = %op,
                    stage = ?op.stage(),
                    error = %source,
                    "Lifecycle operation failed, skipping the rest of the mode"
                );
                failure = Some(BenchError::lifecycle(mode, *op, source));
                break;
            }
        }

        for metric in &metrics {
            if let Err(e) = self.sampler.stop(*metric, mode) {
                tracing::error!(mode = %mode, metric = %metric, error = %e, "Failed to stop sampling");
            }
        }
        self.signals.reset();

        if mode != BenchmarkingMode::QueryOnlyRun {
            if let Err(e) = self.call(&ctx, LifecycleOp::Terminate).await {
                tracing::error!(
                    mode = %mode,
                    operation = %LifecycleOp::Terminate,
                    error = %e,
                    "Cleanup failed"
                );
            }
        }

        tracing::info!(
            mode = %mode,
            elapsed_secs = start.elapsed().as_secs_f64(),
            success = failure.is_none(),
            "Mode completed"
        );

        ModeOutcome { mode, failure }
    }

    /// Delegate one lifecycle operation, raising its stage first
    async fn call(&self, ctx: &RunContext, op: LifecycleOp) -> Result<(), AdapterError> {
        if let Some(stage) = op.stage() {
            ctx.set_stage_active(stage);
        }
        tracing::debug!(mode = %ctx.mode(), operation = %op, "Calling adapter");

        match op {
            LifecycleOp::Deploy => self.adapter.deploy(ctx).await,
            LifecycleOp::Launch => self.adapter.launch(ctx).await,
            LifecycleOp::Ingest => self.adapter.ingest(ctx).await,
            LifecycleOp::RunQueryBenchmark => self.adapter.run_query_benchmark(ctx).await,
            LifecycleOp::MidTerminate => self.adapter.mid_terminate(ctx).await,
            LifecycleOp::Terminate => self.adapter.terminate(ctx).await,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .field("active_stage", &self.signals.active_stage())
            .finish()
    }
}
