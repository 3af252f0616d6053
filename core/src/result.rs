//! Per-mode result records
//!
//! One [`BenchmarkingResult`] exists per mode for the lifetime of a
//! [`ResultSet`]. The metric sampler appends stage samples and sets the
//! baseline; the adapter (through the run context) fills in sizes and
//! latencies.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::types::{BenchmarkingMode, BenchmarkingStage, SystemMetric};

/// Resource usage before any stage started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// No reading taken yet
    #[default]
    Unset,
    /// Samples are reported raw
    Disabled,
    /// Reading taken when sampling first started for the mode
    Value(i64),
}

impl Baseline {
    /// Amount to subtract from a stage mean
    pub fn offset(self) -> Option<i64> {
        match self {
            Baseline::Value(v) => Some(v),
            Baseline::Unset | Baseline::Disabled => None,
        }
    }
}

/// One metric reading
#[derive(Debug, Clone, Copy)]
pub struct MetricSample {
    /// Raw value in the metric's unit; non-positive means unavailable
    pub value: i64,
    /// When the reading was taken
    pub collected_at: Instant,
}

impl MetricSample {
    /// Reading taken now
    pub fn now(value: i64) -> Self {
        Self {
            value,
            collected_at: Instant::now(),
        }
    }
}

/// Samples of a single metric within one mode
#[derive(Debug, Clone, Default)]
pub struct MetricRecord {
    /// Baseline for this (mode, metric)
    pub baseline: Baseline,
    stage_samples: [Vec<MetricSample>; BenchmarkingStage::COUNT],
}

impl MetricRecord {
    /// Samples collected during a stage, in collection order
    pub fn samples(&self, stage: BenchmarkingStage) -> &[MetricSample] {
        &self.stage_samples[stage.index()]
    }

    /// Raw values collected during a stage
    pub fn values(&self, stage: BenchmarkingStage) -> Vec<i64> {
        self.samples(stage).iter().map(|s| s.value).collect()
    }

    /// Append a sample to a stage bucket
    pub fn push(&mut self, stage: BenchmarkingStage, sample: MetricSample) {
        self.stage_samples[stage.index()].push(sample);
    }
}

/// Ingest measurements reported by an adapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestMetrics {
    /// Dataset size before ingestion, in bytes
    pub decompressed_size: Option<u64>,
    /// Size of the ingested representation, in bytes
    pub compressed_size: Option<u64>,
    /// Compression ratio; derived from the sizes when not given
    pub ratio: Option<f64>,
    /// End-to-end ingestion time
    pub latency: Option<Duration>,
}

impl IngestMetrics {
    /// Ratio as reported, or decompressed / compressed size
    pub fn effective_ratio(&self) -> Option<f64> {
        self.ratio.or(match (self.decompressed_size, self.compressed_size) {
            (Some(raw), Some(packed)) if packed > 0 => Some(raw as f64 / packed as f64),
            _ => None,
        })
    }
}

/// Everything collected for one mode
#[derive(Debug, Clone)]
pub struct BenchmarkingResult {
    /// Mode this record belongs to
    pub mode: BenchmarkingMode,
    /// Dataset size before ingestion, in bytes
    pub decompressed_size: Option<u64>,
    /// Ingested size, in bytes
    pub compressed_size: Option<u64>,
    /// Compression ratio
    pub ratio: Option<f64>,
    /// End-to-end ingestion time
    pub ingest_latency: Option<Duration>,
    /// End-to-end query latencies in query order
    pub query_latencies: Vec<Duration>,
    metrics: [MetricRecord; SystemMetric::COUNT],
}

impl BenchmarkingResult {
    /// Empty record for a mode
    pub fn new(mode: BenchmarkingMode) -> Self {
        Self {
            mode,
            decompressed_size: None,
            compressed_size: None,
            ratio: None,
            ingest_latency: None,
            query_latencies: Vec::new(),
            metrics: Default::default(),
        }
    }

    /// Samples and baseline of a metric
    pub fn metric(&self, metric: SystemMetric) -> &MetricRecord {
        &self.metrics[metric.index()]
    }

    /// Mutable samples and baseline of a metric
    pub fn metric_mut(&mut self, metric: SystemMetric) -> &mut MetricRecord {
        &mut self.metrics[metric.index()]
    }

    /// Store ingest measurements
    pub fn apply_ingest(&mut self, ingest: &IngestMetrics) {
        self.decompressed_size = ingest.decompressed_size;
        self.compressed_size = ingest.compressed_size;
        self.ratio = ingest.effective_ratio();
        self.ingest_latency = ingest.latency;
    }

    /// Whether anything at all was collected for this mode
    pub fn is_empty(&self) -> bool {
        self.decompressed_size.is_none()
            && self.compressed_size.is_none()
            && self.ingest_latency.is_none()
            && self.query_latencies.is_empty()
            && self.metrics.iter().all(|m| {
                BenchmarkingStage::ALL
                    .iter()
                    .all(|stage| m.samples(*stage).is_empty())
            })
    }
}

/// Results of every mode, shared between the orchestrator and the sampler
#[derive(Debug)]
pub struct ResultSet {
    modes: [Mutex<BenchmarkingResult>; BenchmarkingMode::COUNT],
}

impl ResultSet {
    /// One empty record per mode
    pub fn new() -> Self {
        Self {
            modes: BenchmarkingMode::ALL.map(|mode| Mutex::new(BenchmarkingResult::new(mode))),
        }
    }

    /// Run `f` with exclusive access to a mode's record
    pub fn with_mode<R>(
        &self,
        mode: BenchmarkingMode,
        f: impl FnOnce(&mut BenchmarkingResult) -> R,
    ) -> R {
        let mut guard = self.modes[mode.index()].lock();
        f(&mut guard)
    }

    /// Copy of a mode's record
    pub fn snapshot(&self, mode: BenchmarkingMode) -> BenchmarkingResult {
        self.modes[mode.index()].lock().clone()
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}
