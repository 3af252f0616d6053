//! Closed enums that key every per-mode, per-stage and per-metric table

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Benchmarking Mode
// ============================================================================

/// Benchmarking scenario selecting which lifecycle sequence runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkingMode {
    /// Deploy, ingest and query against a warm service
    HotRun,
    /// Like a hot run, but the service is torn down and relaunched before querying
    ColdRun,
    /// Only launch and query, reusing data ingested by an earlier run
    QueryOnlyRun,
}

impl BenchmarkingMode {
    /// Number of modes
    pub const COUNT: usize = 3;

    /// All modes in execution order
    pub const ALL: [BenchmarkingMode; Self::COUNT] = [
        BenchmarkingMode::HotRun,
        BenchmarkingMode::ColdRun,
        BenchmarkingMode::QueryOnlyRun,
    ];

    /// Position of this mode in per-mode tables
    pub const fn index(self) -> usize {
        match self {
            BenchmarkingMode::HotRun => 0,
            BenchmarkingMode::ColdRun => 1,
            BenchmarkingMode::QueryOnlyRun => 2,
        }
    }

    /// Human readable name, as used in log lines
    pub const fn as_str(self) -> &'static str {
        match self {
            BenchmarkingMode::HotRun => "hot run",
            BenchmarkingMode::ColdRun => "cold run",
            BenchmarkingMode::QueryOnlyRun => "query only run",
        }
    }
}

impl fmt::Display for BenchmarkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Benchmarking Stage
// ============================================================================

/// Pipeline phase that concurrently collected samples are attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkingStage {
    /// Data is being compressed / ingested by the target
    Ingest,
    /// The query benchmark is running
    Query,
}

impl BenchmarkingStage {
    /// Number of stages
    pub const COUNT: usize = 2;

    /// All stages in pipeline order
    pub const ALL: [BenchmarkingStage; Self::COUNT] =
        [BenchmarkingStage::Ingest, BenchmarkingStage::Query];

    /// Position of this stage in per-stage tables
    pub const fn index(self) -> usize {
        match self {
            BenchmarkingStage::Ingest => 0,
            BenchmarkingStage::Query => 1,
        }
    }

    /// Stage name as it appears in logs and configuration keys
    pub const fn as_str(self) -> &'static str {
        match self {
            BenchmarkingStage::Ingest => "ingest",
            BenchmarkingStage::Query => "run_query_benchmark",
        }
    }

    pub(crate) const fn code(self) -> u8 {
        self.index() as u8 + 1
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BenchmarkingStage::Ingest),
            2 => Some(BenchmarkingStage::Query),
            _ => None,
        }
    }
}

impl fmt::Display for BenchmarkingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// System Metric
// ============================================================================

/// A sampled system resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMetric {
    /// Memory in use, in kilobytes
    Memory,
}

impl SystemMetric {
    /// Number of tracked metrics
    pub const COUNT: usize = 1;

    /// All tracked metrics
    pub const ALL: [SystemMetric; Self::COUNT] = [SystemMetric::Memory];

    /// Position of this metric in per-metric tables
    pub const fn index(self) -> usize {
        match self {
            SystemMetric::Memory => 0,
        }
    }

    /// Metric name
    pub const fn name(self) -> &'static str {
        match self {
            SystemMetric::Memory => "memory",
        }
    }

    /// Display unit of raw samples
    pub const fn unit(self) -> &'static str {
        match self {
            SystemMetric::Memory => "KB",
        }
    }
}

impl fmt::Display for SystemMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_table_order() {
        for (i, mode) in BenchmarkingMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
        }
        for (i, stage) in BenchmarkingStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        for (i, metric) in SystemMetric::ALL.iter().enumerate() {
            assert_eq!(metric.index(), i);
        }
    }

    #[test]
    fn test_stage_code_roundtrip() {
        for stage in BenchmarkingStage::ALL {
            assert_eq!(BenchmarkingStage::from_code(stage.code()), Some(stage));
        }
        assert_eq!(BenchmarkingStage::from_code(0), None);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(BenchmarkingMode::ColdRun.to_string(), "cold run");
        assert_eq!(BenchmarkingStage::Query.to_string(), "run_query_benchmark");
        assert_eq!(SystemMetric::Memory.to_string(), "memory");
        assert_eq!(SystemMetric::Memory.unit(), "KB");
    }
}
