//! Target adapter implementations for clp-bench
//!
//! This crate provides implementations of the `TargetAdapter` trait:
//!
//! - `command`: drives any tool through shell commands from the config file
//!
//! plus the process helpers those implementations share.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod process;

use std::fmt;
use std::sync::Arc;

use clp_bench_core::{BenchConfig, ConfigError, TargetAdapter};

pub use command::{CommandAdapter, CommandTargetConfig, MemoryProbe};

/// Benchmarkable targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// [`CommandAdapter`]
    Command,
}

impl Target {
    /// Target name, also its config section
    pub const fn as_str(self) -> &'static str {
        match self {
            Target::Command => command::SECTION,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the adapter for `target` from its config section
pub fn load(target: Target, config: &BenchConfig) -> Result<Arc<dyn TargetAdapter>, ConfigError> {
    let adapter: Arc<dyn TargetAdapter> = match target {
        Target::Command => Arc::new(CommandAdapter::from_config(config)?),
    };
    tracing::info!(target_name = %target, adapter = adapter.name(), "Loaded target adapter");
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_command_target() {
        let config = BenchConfig::from_yaml_str(
            "command:\n  name: grep\n  dataset_path: /data\n",
        )
        .unwrap();

        let adapter = load(Target::Command, &config).unwrap();
        assert_eq!(adapter.name(), "grep");
    }

    #[test]
    fn test_load_missing_section() {
        let config = BenchConfig::default();
        assert!(matches!(
            load(Target::Command, &config),
            Err(ConfigError::MissingSection(_))
        ));
    }

    #[test]
    fn test_target_names() {
        assert_eq!(Target::Command.to_string(), "command");
    }
}
