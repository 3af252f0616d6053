//! Result aggregation and the end-of-run report

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SystemMetricConfig;
use crate::result::{Baseline, BenchmarkingResult, ResultSet};
use crate::types::{BenchmarkingMode, BenchmarkingStage, SystemMetric};

/// Average of one stage's samples, baseline-normalized
///
/// Non-positive samples are unavailable readings and are discarded first.
/// Returns 0 when nothing is left.
pub fn stage_average(samples: &[i64], baseline: Baseline) -> i64 {
    let (sum, count) = samples
        .iter()
        .filter(|v| **v > 0)
        .fold((0i128, 0i128), |(sum, count), v| (sum + i128::from(*v), count + 1));
    if count == 0 {
        return 0;
    }

    let offset = i128::from(baseline.offset().unwrap_or(0));
    // floor((sum / count) - offset) without going through floating point
    let shifted = sum - offset * count;
    let average = shifted.div_euclid(count);
    i64::try_from(average).unwrap_or(if average < 0 { i64::MIN } else { i64::MAX })
}

/// Average usage of a metric during one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageAverage {
    /// Metric sampled
    pub metric: SystemMetric,
    /// Stage the samples were taken in
    pub stage: BenchmarkingStage,
    /// Normalized average in the metric's unit
    pub average: i64,
    /// Unit of `average`
    pub unit: &'static str,
    /// Baseline of the mode; only a `value` was subtracted from `average`
    pub baseline: Baseline,
}

impl StageAverage {
    /// How `average` relates to the raw samples, for log lines
    fn baseline_note(&self) -> String {
        match self.baseline {
            Baseline::Value(v) => format!(" (baseline {v}{} subtracted)", self.unit),
            Baseline::Unset => " (raw, baseline unavailable)".to_string(),
            Baseline::Disabled => String::new(),
        }
    }
}

/// Summary of one mode
#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    /// Mode summarized
    pub mode: BenchmarkingMode,
    /// Dataset size before ingestion, in bytes
    pub decompressed_size: Option<u64>,
    /// Ingested size, in bytes
    pub compressed_size: Option<u64>,
    /// Compression ratio
    pub ratio: Option<f64>,
    /// Ingestion time in seconds
    pub ingest_latency_secs: Option<f64>,
    /// Query times in seconds, in query order
    pub query_latencies_secs: Vec<f64>,
    /// Per-stage metric averages; empty when system metrics are disabled
    pub stage_averages: Vec<StageAverage>,
}

impl ModeReport {
    /// Summarize one mode's record
    pub fn from_result(result: &BenchmarkingResult, metrics: &SystemMetricConfig) -> Self {
        let stage_averages = if metrics.enable {
            SystemMetric::ALL
                .into_iter()
                .filter(|metric| metrics.is_enabled(*metric))
                .flat_map(|metric| {
                    let record = result.metric(metric);
                    BenchmarkingStage::ALL.into_iter().map(move |stage| StageAverage {
                        metric,
                        stage,
                        average: stage_average(&record.values(stage), record.baseline),
                        unit: metric.unit(),
                        baseline: record.baseline,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            mode: result.mode,
            decompressed_size: result.decompressed_size,
            compressed_size: result.compressed_size,
            ratio: result.ratio,
            ingest_latency_secs: result.ingest_latency.map(|d| d.as_secs_f64()),
            query_latencies_secs: result
                .query_latencies
                .iter()
                .map(|d| d.as_secs_f64())
                .collect(),
            stage_averages,
        }
    }

    /// Average for a (metric, stage), if it was computed
    pub fn stage_average(&self, metric: SystemMetric, stage: BenchmarkingStage) -> Option<i64> {
        self.stage_averages
            .iter()
            .find(|a| a.metric == metric && a.stage == stage)
            .map(|a| a.average)
    }

    /// Summary lines, one fact per line
    pub fn lines(&self) -> Vec<String> {
        let label = capitalize(self.mode.as_str());
        let mut lines = Vec::new();

        if let Some(size) = self.decompressed_size {
            lines.push(format!("{label} mode: decompressed size {size}"));
        }
        if let Some(size) = self.compressed_size {
            lines.push(format!("{label} mode: compressed size {size}"));
        }
        if let Some(ratio) = self.ratio {
            lines.push(format!("{label} mode: compression ratio {ratio}"));
        }
        if let Some(latency) = self.ingest_latency_secs {
            lines.push(format!("{label} mode: ingest e2e latency {latency}"));
        }
        for (i, latency) in self.query_latencies_secs.iter().enumerate() {
            lines.push(format!("{label} mode: No.{i} query e2e latency {latency}"));
        }
        for avg in &self.stage_averages {
            lines.push(format!(
                "{label} mode: average {} usage at {} stage: {}{}{}",
                avg.metric,
                avg.stage,
                avg.average,
                avg.unit,
                avg.baseline_note()
            ));
        }

        lines
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// One entry per mode that produced any data, in mode order
    pub modes: Vec<ModeReport>,
}

impl BenchmarkReport {
    /// Summarize every mode that collected something
    pub fn from_results(results: &ResultSet, metrics: &SystemMetricConfig) -> Self {
        let modes = BenchmarkingMode::ALL
            .into_iter()
            .map(|mode| results.snapshot(mode))
            .filter(|result| !result.is_empty())
            .map(|result| ModeReport::from_result(&result, metrics))
            .collect();

        Self {
            generated_at: Utc::now(),
            modes,
        }
    }

    /// Report for a mode, if it produced data
    pub fn mode(&self, mode: BenchmarkingMode) -> Option<&ModeReport> {
        self.modes.iter().find(|m| m.mode == mode)
    }

    /// Emit every summary line at info level
    pub fn log(&self) {
        for report in &self.modes {
            if report
                .stage_averages
                .iter()
                .any(|avg| avg.baseline == Baseline::Unset)
            {
                tracing::warn!(
                    mode = %report.mode,
                    "No baseline reading was taken; averages are not normalized"
                );
            }
            for line in report.lines() {
                tracing::info!(mode = %report.mode, "{}", line);
            }
        }
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
