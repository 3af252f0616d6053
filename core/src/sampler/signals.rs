//! Stage indicator shared by the orchestrator and the sampler loops

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use crate::types::BenchmarkingStage;

const NO_STAGE: u8 = 0;

/// Which stage is active, plus a wake-up for sleeping samplers
///
/// The active stage lives in one atomic cell, so setting a stage clears every
/// other one in the same store and two stages are never observed together.
#[derive(Debug, Default)]
pub struct StageSignals {
    active: AtomicU8,
    changed: Notify,
}

impl StageSignals {
    /// No stage active
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `stage` the only active stage and wake sleeping samplers
    pub fn set_stage_active(&self, stage: BenchmarkingStage) {
        self.active.store(stage.code(), Ordering::SeqCst);
        tracing::debug!(stage = %stage, "Stage active");
        self.wake();
    }

    /// Deactivate `stage` if it is the active one, and wake sleeping samplers
    pub fn clear_stage(&self, stage: BenchmarkingStage) {
        let _ = self.active.compare_exchange(
            stage.code(),
            NO_STAGE,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        tracing::debug!(stage = %stage, "Stage cleared");
        self.wake();
    }

    /// Deactivate every stage
    pub fn reset(&self) {
        self.active.store(NO_STAGE, Ordering::SeqCst);
        self.wake();
    }

    /// The active stage, if any
    pub fn active_stage(&self) -> Option<BenchmarkingStage> {
        BenchmarkingStage::from_code(self.active.load(Ordering::SeqCst))
    }

    /// Whether `stage` is the active stage
    pub fn is_active(&self, stage: BenchmarkingStage) -> bool {
        self.active_stage() == Some(stage)
    }

    /// Future resolving on the next transition or wake-up
    ///
    /// Receives every `wake` issued after this call returns, even before it
    /// is first polled, so callers must create it before reading the stage.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// One-shot wake of every pending [`changed`](Self::changed) future
    pub fn wake(&self) {
        self.changed.notify_waiters();
    }
}
