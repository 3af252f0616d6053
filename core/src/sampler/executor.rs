//! Sampling session management and the polling loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::SystemMetricConfig;
use crate::result::{Baseline, MetricSample, ResultSet};
use crate::traits::TargetAdapter;
use crate::types::{BenchmarkingMode, BenchmarkingStage, SystemMetric};

use super::signals::StageSignals;
use super::SamplerError;

/// A running sampling loop
struct Session {
    metric: SystemMetric,
    mode: BenchmarkingMode,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Runs background sampling loops for system metrics
///
/// Samples are written into the shared [`ResultSet`] under the mode the
/// session was started for and the stage active when each reading began.
pub struct MetricSampler {
    adapter: Arc<dyn TargetAdapter>,
    config: SystemMetricConfig,
    signals: Arc<StageSignals>,
    results: Arc<ResultSet>,

    /// Global "a session is enabled" flag
    enabled: AtomicBool,

    session: Mutex<Option<Session>>,
}

impl MetricSampler {
    /// Create an idle sampler
    pub fn new(
        adapter: Arc<dyn TargetAdapter>,
        config: SystemMetricConfig,
        signals: Arc<StageSignals>,
        results: Arc<ResultSet>,
    ) -> Self {
        Self {
            adapter,
            config,
            signals,
            results,
            enabled: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }

    /// Start sampling `metric` on behalf of `mode`
    ///
    /// Takes the baseline reading first if this (mode, metric) has none yet.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::AlreadySampling`] without touching any state if a
    /// session is already enabled.
    pub async fn start(
        &self,
        metric: SystemMetric,
        mode: BenchmarkingMode,
    ) -> Result<(), SamplerError> {
        if self
            .enabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SamplerError::AlreadySampling { metric, mode });
        }

        tracing::info!(metric = %metric, mode = %mode, "Start polling usage");

        let intervals = BenchmarkingStage::ALL.map(|stage| {
            let interval = self.config.polling_interval(metric, stage);
            tracing::info!(
                metric = %metric,
                stage = %stage,
                interval_secs = interval.as_secs_f64(),
                "Polling interval"
            );
            interval
        });

        self.take_baseline(metric, mode).await;

        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(poll_system_metric(
            Arc::clone(&self.adapter),
            Arc::clone(&self.signals),
            Arc::clone(&self.results),
            metric,
            mode,
            intervals,
            Arc::clone(&running),
        ));

        // A previous session's loop may still be finishing its last step; it
        // has already been told to stop, so it is detached here.
        *self.session.lock() = Some(Session {
            metric,
            mode,
            running,
            handle,
        });

        Ok(())
    }

    /// Stop the enabled session
    ///
    /// Does not wait for an in-flight reading; the loop exits after its
    /// current step and discards that reading.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::NotSampling`] if no session is enabled.
    pub fn stop(&self, metric: SystemMetric, mode: BenchmarkingMode) -> Result<(), SamplerError> {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return Err(SamplerError::NotSampling { metric, mode });
        }

        if let Some(session) = self.session.lock().as_ref() {
            session.running.store(false, Ordering::SeqCst);
            tracing::debug!(
                metric = %session.metric,
                mode = %session.mode,
                finished = session.handle.is_finished(),
                "Signalled sampling loop to stop"
            );
        }
        self.signals.wake();

        tracing::info!(metric = %metric, mode = %mode, "Stop polling usage");
        Ok(())
    }

    /// Whether a session is enabled
    pub fn is_sampling(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether the most recent session's loop has exited
    pub fn is_loop_finished(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map_or(true, |s| s.handle.is_finished())
    }

    async fn take_baseline(&self, metric: SystemMetric, mode: BenchmarkingMode) {
        let needs_baseline = self
            .results
            .with_mode(mode, |r| r.metric(metric).baseline == Baseline::Unset);
        if !needs_baseline {
            return;
        }

        match self.adapter.acquire_system_metric_sample(metric).await {
            Ok(value) if value > 0 => {
                self.results.with_mode(mode, |r| {
                    let record = r.metric_mut(metric);
                    if record.baseline == Baseline::Unset {
                        record.baseline = Baseline::Value(value);
                    }
                });
                tracing::info!(
                    metric = %metric,
                    mode = %mode,
                    "Initial {} usage: {}{}",
                    metric,
                    value,
                    metric.unit()
                );
            }
            Ok(value) => {
                tracing::warn!(
                    metric = %metric,
                    mode = %mode,
                    value,
                    "Baseline reading not positive, baseline left unset"
                );
            }
            Err(e) => {
                tracing::warn!(
                    metric = %metric,
                    mode = %mode,
                    error = %e,
                    "Failed to take baseline reading"
                );
            }
        }
    }
}

impl Drop for MetricSampler {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.running.store(false, Ordering::SeqCst);
            session.handle.abort();
        }
    }
}

impl std::fmt::Debug for MetricSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSampler")
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .field("enabled", &self.is_sampling())
            .finish()
    }
}

/// Sampling loop for one (metric, mode) session
async fn poll_system_metric(
    adapter: Arc<dyn TargetAdapter>,
    signals: Arc<StageSignals>,
    results: Arc<ResultSet>,
    metric: SystemMetric,
    mode: BenchmarkingMode,
    intervals: [Duration; BenchmarkingStage::COUNT],
    running: Arc<AtomicBool>,
) {
    tracing::debug!(metric = %metric, mode = %mode, "Sampling loop started");

    loop {
        // Registered before the flags are read so that a transition or stop
        // issued after the read still ends the wait below.
        let changed = signals.changed();

        if !running.load(Ordering::SeqCst) {
            break;
        }

        let Some(stage) = signals.active_stage() else {
            changed.await;
            continue;
        };

        match adapter.acquire_system_metric_sample(metric).await {
            Ok(value) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let sample = MetricSample::now(value);
                results.with_mode(mode, |r| r.metric_mut(metric).push(stage, sample));
                tracing::info!(
                    metric = %metric,
                    stage = %stage,
                    "Current {} usage at {} stage: {}{}",
                    metric,
                    stage,
                    value,
                    metric.unit()
                );
            }
            Err(e) => {
                tracing::warn!(
                    metric = %metric,
                    stage = %stage,
                    error = %e,
                    "Sample unavailable"
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(intervals[stage.index()]) => {}
            _ = changed => {}
        }
    }

    tracing::debug!(metric = %metric, mode = %mode, "Sampling loop exited");
}
