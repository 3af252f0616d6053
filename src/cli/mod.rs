//! CLI argument parsing and run dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use clp_bench_adapters::Target;
use clp_bench_core::{BenchConfig, ModeSelection, OrchestratorBuilder};

#[derive(Parser, Debug)]
#[command(name = "clp-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tool to benchmark
    #[arg(short, long, value_enum)]
    pub target: TargetArg,

    /// Path to configuration file
    #[arg(short, long, default_value = "./config.yaml")]
    pub config: PathBuf,

    /// Benchmarking modes to run
    #[arg(short, long, value_enum, default_value_t = ModeArg::All)]
    pub mode: ModeArg,

    /// Print the report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetArg {
    /// Shell commands from the `command` config section
    Command,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Command => Target::Command,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Hot run followed by cold run
    All,
    /// Hot run only
    Hot,
    /// Cold run only
    Cold,
    /// Query-only run against already ingested data
    QueryOnly,
}

impl From<ModeArg> for ModeSelection {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::All => ModeSelection::All,
            ModeArg::Hot => ModeSelection::Hot,
            ModeArg::Cold => ModeSelection::Cold,
            ModeArg::QueryOnly => ModeSelection::QueryOnly,
        }
    }
}

impl Cli {
    /// Load everything, run the selected modes and report
    pub async fn run(self) -> Result<()> {
        let config = BenchConfig::from_path(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;

        let adapter = clp_bench_adapters::load(self.target.into(), &config)
            .context("creating target adapter")?;

        let orchestrator = OrchestratorBuilder::new()
            .adapter(adapter)
            .config(&config)
            .build()
            .context("building orchestrator")?;

        let outcomes = orchestrator.run(self.mode.into()).await;
        for outcome in &outcomes {
            if let Some(failure) = &outcome.failure {
                tracing::warn!(mode = %outcome.mode, error = %failure, "Mode did not complete");
            }
        }

        let report = orchestrator.report();
        report.log();
        if self.json {
            println!("{}", report.to_json().context("serializing report")?);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["clp-bench", "--target", "command"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("./config.yaml"));
        assert_eq!(cli.mode, ModeArg::All);
        assert!(!cli.json);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_mode_values() {
        let cli =
            Cli::try_parse_from(["clp-bench", "-t", "command", "-m", "query-only", "-c", "b.yaml"])
                .unwrap();
        assert_eq!(ModeSelection::from(cli.mode), ModeSelection::QueryOnly);
        assert_eq!(cli.config, PathBuf::from("b.yaml"));
    }

    #[test]
    fn test_target_is_required() {
        assert!(Cli::try_parse_from(["clp-bench"]).is_err());
        assert!(Cli::try_parse_from(["clp-bench", "-t", "loki"]).is_err());
    }
}
