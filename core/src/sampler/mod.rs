//! Stage-aware system metric sampling
//!
//! While a mode runs, one background task per tracked metric periodically
//! asks the target adapter for a reading and files it under the stage that is
//! currently active:
//!
//! 1. [`StageSignals`] holds the single active stage and a wake-up
//!    notification raised on every transition
//! 2. [`MetricSampler::start`] takes the baseline reading and spawns the loop
//! 3. The loop samples, then sleeps for the stage's polling interval unless a
//!    transition wakes it early
//! 4. [`MetricSampler::stop`] ends the session cooperatively
//!
//! Only one sampling session can be enabled at a time. Starting a second one
//! before stopping the first is rejected, not queued.
//!
//! # Example
//!
//! ```ignore
//! let sampler = MetricSampler::new(adapter, config, signals.clone(), results.clone());
//! sampler.start(SystemMetric::Memory, BenchmarkingMode::HotRun).await?;
//! signals.set_stage_active(BenchmarkingStage::Ingest);
//! // ... ingest ...
//! sampler.stop(SystemMetric::Memory, BenchmarkingMode::HotRun)?;
//! ```

mod executor;
mod host;
mod signals;

pub use executor::MetricSampler;
pub use host::host_memory_usage_kb;
pub use signals::StageSignals;

use crate::types::{BenchmarkingMode, SystemMetric};

/// Sampler misuse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplerError {
    /// `start` called while a session is enabled
    #[error("already polling {metric} usage for mode {mode}")]
    AlreadySampling {
        /// Metric the rejected call asked for
        metric: SystemMetric,
        /// Mode the rejected call asked for
        mode: BenchmarkingMode,
    },

    /// `stop` called while no session is enabled
    #[error("already stopped polling {metric} usage for mode {mode}")]
    NotSampling {
        /// Metric the rejected call asked for
        metric: SystemMetric,
        /// Mode the rejected call asked for
        mode: BenchmarkingMode,
    },
}
