//! Orchestrator for benchmarking mode lifecycles
//!
//! The Orchestrator coordinates one benchmark run against a target adapter:
//! - Calling the adapter's lifecycle operations in each mode's order
//! - Raising the ingest and query stage signals around those calls
//! - Starting and stopping metric sampling for every mode
//! - Always cleaning up, and reporting failures without aborting later modes
//! - Building the end-of-run report from the collected results
//!
//! # Example
//!
//! ```ignore
//! use clp_bench_core::{ModeSelection, OrchestratorBuilder};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .adapter(adapter)
//!     .config(&config)
//!     .build()?;
//!
//! let outcomes = orchestrator.run(ModeSelection::All).await;
//! orchestrator.report().log();
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{stage_average, BenchmarkReport, ModeReport, StageAverage};
pub use builder::OrchestratorBuilder;
pub use executor::{ModeOutcome, ModeSelection, Orchestrator};
