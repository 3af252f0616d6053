//! Handle passed to every adapter lifecycle call

use std::sync::Arc;
use std::time::Duration;

use crate::result::{IngestMetrics, ResultSet};
use crate::sampler::StageSignals;
use crate::types::{BenchmarkingMode, BenchmarkingStage};

/// What an adapter may touch while a mode runs
///
/// Cheap to clone; all clones refer to the same signals and results.
#[derive(Debug, Clone)]
pub struct RunContext {
    mode: BenchmarkingMode,
    signals: Arc<StageSignals>,
    results: Arc<ResultSet>,
}

impl RunContext {
    /// Create a context for one mode
    pub fn new(mode: BenchmarkingMode, signals: Arc<StageSignals>, results: Arc<ResultSet>) -> Self {
        Self {
            mode,
            signals,
            results,
        }
    }

    /// Mode being run
    pub fn mode(&self) -> BenchmarkingMode {
        self.mode
    }

    /// Make `stage` the only active stage
    pub fn set_stage_active(&self, stage: BenchmarkingStage) {
        self.signals.set_stage_active(stage);
    }

    /// Deactivate `stage` if it is the active one
    pub fn clear_stage(&self, stage: BenchmarkingStage) {
        self.signals.clear_stage(stage);
    }

    /// Currently active stage
    pub fn active_stage(&self) -> Option<BenchmarkingStage> {
        self.signals.active_stage()
    }

    /// Store this mode's ingest measurements
    pub fn record_ingest(&self, ingest: IngestMetrics) {
        tracing::info!(
            mode = %self.mode,
            decompressed_size = ?ingest.decompressed_size,
            compressed_size = ?ingest.compressed_size,
            ratio = ?ingest.effective_ratio(),
            latency_secs = ?ingest.latency.map(|d| d.as_secs_f64()),
            "Recorded ingest metrics"
        );
        self.results.with_mode(self.mode, |r| r.apply_ingest(&ingest));
    }

    /// Append one query's end-to-end latency
    pub fn record_query_latency(&self, latency: Duration) {
        self.results
            .with_mode(self.mode, |r| r.query_latencies.push(latency));
    }
}
