//! Error types for clp-bench-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::sampler::SamplerError;
use crate::traits::{AdapterError, LifecycleOp};
use crate::types::BenchmarkingMode;

/// Core error type
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A lifecycle call against the target adapter failed
    #[error("{operation} failed in {mode} mode: {source}")]
    Lifecycle {
        /// Mode that was running
        mode: BenchmarkingMode,
        /// Adapter operation that failed
        operation: LifecycleOp,
        /// Underlying adapter failure
        #[source]
        source: AdapterError,
    },

    /// Sampler misuse (start twice, stop when not started)
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),

    /// A required builder field was not supplied
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

impl BenchError {
    /// Missing builder field
    pub fn missing_config(field: impl Into<String>) -> Self {
        BenchError::MissingConfig(field.into())
    }

    /// Wrap an adapter failure with the mode and operation it happened in
    pub fn lifecycle(mode: BenchmarkingMode, operation: LifecycleOp, source: AdapterError) -> Self {
        BenchError::Lifecycle {
            mode,
            operation,
            source,
        }
    }

    /// The lifecycle operation that failed, if this is a lifecycle error
    pub fn operation(&self) -> Option<LifecycleOp> {
        match self {
            BenchError::Lifecycle { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
