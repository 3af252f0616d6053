//! Adapter driving any tool through configured shell commands
//!
//! Every lifecycle step is a list of shell commands run in order. Commands may
//! use the `{dataset_path}` and `{data_path}` placeholders.
//!
//! When the tool runs in a docker container, set `container`: deploy then
//! checks `required_files` and prepares `data_path` through `docker exec`.
//!
//! ```yaml
//! command:
//!   name: clp-s
//!   dataset_path: /home/bench/dataset
//!   data_path: /home/bench/archives
//!   clear_data_path: true
//!   ingest:
//!     - clp-s c {data_path} {dataset_path}
//!   queries:
//!     - clp-s s {data_path} 'level: ERROR'
//!   memory:
//!     probe: process
//!     patterns: [clp-s]
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use clp_bench_core::sampler::host_memory_usage_kb;
use clp_bench_core::{
    AdapterError, BenchConfig, BenchmarkingStage, ConfigError, IngestMetrics, RunContext,
    SystemMetric, TargetAdapter,
};

use crate::process::{
    check_args, directory_size, docker_exec, docker_stats_kb, process_rss_kb, run_args,
    run_commands, run_shell, timed_query,
};

/// Config section read by [`CommandAdapter`]
pub const SECTION: &str = "command";

fn default_name() -> String {
    SECTION.to_string()
}

/// How memory readings are taken
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum MemoryProbe {
    /// Memory in use on the whole host
    #[default]
    Host,
    /// RSS of the processes whose `ps aux` line contains every pattern
    Process {
        /// Substrings a process line must contain
        patterns: Vec<String>,
        /// Docker container to run `ps` in
        #[serde(default)]
        container: Option<String>,
    },
    /// Total of the `docker stats` memory column over containers whose name
    /// starts with `name_prefix`
    DockerStats {
        /// Container name prefix
        name_prefix: String,
        /// Docker container to run `docker stats` in
        #[serde(default)]
        container: Option<String>,
    },
    /// A shell command printing a KB value
    Command {
        /// Command to run
        command: String,
    },
}

impl MemoryProbe {
    /// Whether readings include memory unrelated to the tool
    pub fn needs_baseline(&self) -> bool {
        !matches!(
            self,
            MemoryProbe::Process { .. } | MemoryProbe::DockerStats { .. }
        )
    }
}

/// `command` section
#[derive(Debug, Clone, Deserialize)]
pub struct CommandTargetConfig {
    /// Tool name used in logs
    #[serde(default = "default_name")]
    pub name: String,
    /// Dataset to ingest
    pub dataset_path: PathBuf,
    /// Where the tool stores ingested data; measured after ingest
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    /// Empty `data_path` during deploy
    #[serde(default)]
    pub clear_data_path: bool,
    /// Docker container the tool runs in; deploy checks and prepares paths
    /// inside it
    #[serde(default)]
    pub container: Option<String>,
    /// Files that must exist before deploy, such as tool binaries
    #[serde(default)]
    pub required_files: Vec<PathBuf>,
    /// Deploy commands
    #[serde(default)]
    pub deploy: Vec<String>,
    /// Launch commands
    #[serde(default)]
    pub launch: Vec<String>,
    /// Ingest commands
    #[serde(default)]
    pub ingest: Vec<String>,
    /// Mid-run teardown commands; the terminate commands when absent
    #[serde(default)]
    pub mid_terminate: Option<Vec<String>>,
    /// Terminate commands
    #[serde(default)]
    pub terminate: Vec<String>,
    /// Queries, each run piped into `wc -l`
    #[serde(default)]
    pub queries: Vec<String>,
    /// Memory probe
    #[serde(default)]
    pub memory: MemoryProbe,
    /// Override whether the memory baseline is subtracted
    #[serde(default)]
    pub use_baseline: Option<bool>,
}

/// Adapter running the commands of a [`CommandTargetConfig`]
#[derive(Debug, Clone)]
pub struct CommandAdapter {
    config: CommandTargetConfig,
}

impl CommandAdapter {
    /// Create from a parsed section
    pub fn new(config: CommandTargetConfig) -> Self {
        Self { config }
    }

    /// Create from the `command` section of a configuration document
    pub fn from_config(config: &BenchConfig) -> Result<Self, ConfigError> {
        config.target_section(SECTION).map(Self::new)
    }

    /// The parsed section
    pub fn config(&self) -> &CommandTargetConfig {
        &self.config
    }

    fn render(&self, command: &str) -> String {
        let rendered = command.replace(
            "{dataset_path}",
            &self.config.dataset_path.display().to_string(),
        );
        match &self.config.data_path {
            Some(path) => rendered.replace("{data_path}", &path.display().to_string()),
            None => rendered,
        }
    }

    fn render_all(&self, commands: &[String]) -> Vec<String> {
        commands.iter().map(|c| self.render(c)).collect()
    }

    async fn prepare_data_path(&self) -> Result<(), AdapterError> {
        let Some(data_path) = &self.config.data_path else {
            return Ok(());
        };

        if self.config.clear_data_path && tokio::fs::try_exists(data_path).await? {
            tracing::info!(path = %data_path.display(), "Clearing data path");
            tokio::fs::remove_dir_all(data_path).await?;
        }
        tokio::fs::create_dir_all(data_path).await?;
        Ok(())
    }

    async fn check_required_files(&self) -> Result<(), AdapterError> {
        for file in &self.config.required_files {
            let present = match &self.config.container {
                Some(id) => check_args(&container_file_check(id, file)).await?,
                None => tokio::fs::metadata(file).await.is_ok_and(|m| m.is_file()),
            };
            if !present {
                return Err(AdapterError::Config(format!(
                    "required file {} does not exist{}",
                    file.display(),
                    self.config
                        .container
                        .as_ref()
                        .map(|id| format!(" in container {id}"))
                        .unwrap_or_default()
                )));
            }
        }
        Ok(())
    }

    async fn prepare_container_data_path(&self, container: &str) -> Result<(), AdapterError> {
        let Some(data_path) = &self.config.data_path else {
            return Ok(());
        };

        let exists = check_args(&container_dir_check(container, data_path)).await?;
        for step in container_data_path_plan(container, data_path, self.config.clear_data_path, exists) {
            tracing::info!(container, command = %step.join(" "), "Preparing data path");
            run_args(&step).await?;
        }
        Ok(())
    }
}

/// `docker exec <id> test -f <path>`
fn container_file_check(container: &str, path: &Path) -> Vec<String> {
    docker_exec(container, &["test".into(), "-f".into(), path.display().to_string()])
}

/// `docker exec <id> test -d <path>`
fn container_dir_check(container: &str, path: &Path) -> Vec<String> {
    docker_exec(container, &["test".into(), "-d".into(), path.display().to_string()])
}

/// Commands bringing `data_path` inside `container` to its deploy state,
/// given whether the directory already exists
fn container_data_path_plan(
    container: &str,
    data_path: &Path,
    clear: bool,
    exists: bool,
) -> Vec<Vec<String>> {
    let path = data_path.display().to_string();
    match (exists, clear) {
        (true, true) => vec![docker_exec(
            container,
            &["bash".into(), "-c".into(), format!("rm -rf {path}/*")],
        )],
        (true, false) => Vec::new(),
        (false, _) => vec![docker_exec(container, &["mkdir".into(), "-p".into(), path])],
    }
}

#[async_trait]
impl TargetAdapter for CommandAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn uses_baseline(&self, metric: SystemMetric) -> bool {
        match metric {
            SystemMetric::Memory => self
                .config
                .use_baseline
                .unwrap_or_else(|| self.config.memory.needs_baseline()),
        }
    }

    async fn deploy(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        tracing::info!(
            tool = %self.config.name,
            mode = %ctx.mode(),
            dataset_path = %self.config.dataset_path.display(),
            data_path = ?self.config.data_path,
            "Deploying"
        );

        if !tokio::fs::try_exists(&self.config.dataset_path).await? {
            return Err(AdapterError::Config(format!(
                "dataset path {} does not exist",
                self.config.dataset_path.display()
            )));
        }
        self.check_required_files().await?;
        match &self.config.container {
            Some(container) => self.prepare_container_data_path(container).await?,
            None => self.prepare_data_path().await?,
        }

        run_commands(&self.render_all(&self.config.deploy)).await
    }

    async fn launch(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        tracing::info!(tool = %self.config.name, mode = %ctx.mode(), "Launching");
        run_commands(&self.render_all(&self.config.launch)).await
    }

    async fn ingest(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        tracing::info!(tool = %self.config.name, mode = %ctx.mode(), "Ingesting data");

        let decompressed_size = directory_size(&self.config.dataset_path).await?;

        let start = Instant::now();
        run_commands(&self.render_all(&self.config.ingest)).await?;
        let latency = start.elapsed();

        let compressed_size = match &self.config.data_path {
            Some(path) => Some(directory_size(path).await?),
            None => None,
        };

        ctx.record_ingest(IngestMetrics {
            decompressed_size: Some(decompressed_size),
            compressed_size,
            ratio: None,
            latency: Some(latency),
        });
        Ok(())
    }

    async fn run_query_benchmark(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        tracing::info!(
            tool = %self.config.name,
            mode = %ctx.mode(),
            queries = self.config.queries.len(),
            "Running query benchmark"
        );

        for query in &self.config.queries {
            let run = timed_query(&self.render(query)).await?;
            ctx.record_query_latency(run.latency);
        }
        Ok(())
    }

    async fn mid_terminate(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        ctx.clear_stage(BenchmarkingStage::Ingest);
        match &self.config.mid_terminate {
            Some(commands) => {
                tracing::info!(tool = %self.config.name, mode = %ctx.mode(), "Mid-run teardown");
                run_commands(&self.render_all(commands)).await
            }
            None => self.terminate(ctx).await,
        }
    }

    async fn terminate(&self, ctx: &RunContext) -> Result<(), AdapterError> {
        tracing::info!(tool = %self.config.name, mode = %ctx.mode(), "Terminating");
        run_commands(&self.render_all(&self.config.terminate)).await
    }

    async fn acquire_system_metric_sample(&self, metric: SystemMetric) -> Result<i64, AdapterError> {
        match (metric, &self.config.memory) {
            (SystemMetric::Memory, MemoryProbe::Host) => host_memory_usage_kb().await,
            (SystemMetric::Memory, MemoryProbe::Process { patterns, container }) => {
                process_rss_kb(patterns, container.as_deref()).await
            }
            (SystemMetric::Memory, MemoryProbe::DockerStats { name_prefix, container }) => {
                docker_stats_kb(name_prefix, container.as_deref()).await
            }
            (SystemMetric::Memory, MemoryProbe::Command { command }) => {
                let out = run_shell(&self.render(command)).await?;
                out.trim().parse::<i64>().map_err(|_| {
                    AdapterError::UnexpectedOutput(format!("memory probe printed {:?}", out.trim()))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clp_bench_core::{BenchmarkingMode, ModeSelection, OrchestratorBuilder};
    use std::path::Path;
    use std::sync::Arc;

    fn config_for(yaml: &str) -> BenchConfig {
        BenchConfig::from_yaml_str(yaml).unwrap()
    }

    fn fixture(root: &Path) -> (PathBuf, PathBuf) {
        let dataset = root.join("dataset");
        let data = root.join("data");
        std::fs::create_dir(&dataset).unwrap();
        std::fs::write(dataset.join("app.log"), "INFO ok\nERROR bad\nINFO ok\nERROR baddest\n")
            .unwrap();
        (dataset, data)
    }

    #[test]
    fn test_section_defaults() {
        let config = config_for("command:\n  dataset_path: /data\n");
        let adapter = CommandAdapter::from_config(&config).unwrap();

        assert_eq!(adapter.name(), "command");
        assert_eq!(adapter.config().memory, MemoryProbe::Host);
        assert!(adapter.config().queries.is_empty());
        assert!(adapter.config().mid_terminate.is_none());
        assert!(adapter.uses_baseline(SystemMetric::Memory));
    }

    #[test]
    fn test_missing_section() {
        let config = config_for("system_metric:\n  enable: false\n");
        assert!(matches!(
            CommandAdapter::from_config(&config),
            Err(ConfigError::MissingSection(ref name)) if name == "command"
        ));
    }

    #[test]
    fn test_invalid_section() {
        let config = config_for("command:\n  queries: [a]\n");
        assert!(matches!(
            CommandAdapter::from_config(&config),
            Err(ConfigError::InvalidSection { .. })
        ));
    }

    #[test]
    fn test_process_probe_disables_baseline() {
        let config = config_for(
            r#"
command:
  dataset_path: /data
  memory:
    probe: process
    patterns: [clp-s, /data]
    container: bench
"#,
        );
        let adapter = CommandAdapter::from_config(&config).unwrap();

        assert_eq!(
            adapter.config().memory,
            MemoryProbe::Process {
                patterns: vec!["clp-s".into(), "/data".into()],
                container: Some("bench".into()),
            }
        );
        assert!(!adapter.uses_baseline(SystemMetric::Memory));
    }

    #[test]
    fn test_docker_stats_memory_section() {
        let config = config_for(
            r#"
command:
  dataset_path: /data
  container: clp-bench
  required_files: [/clp/sbin/start-clp.sh]
  memory:
    probe: docker_stats
    name_prefix: clp-
"#,
        );
        let adapter = CommandAdapter::from_config(&config).unwrap();

        assert_eq!(
            adapter.config().memory,
            MemoryProbe::DockerStats {
                name_prefix: "clp-".into(),
                container: None,
            }
        );
        assert_eq!(adapter.config().container.as_deref(), Some("clp-bench"));
        assert_eq!(
            adapter.config().required_files,
            vec![PathBuf::from("/clp/sbin/start-clp.sh")]
        );
        assert!(!adapter.uses_baseline(SystemMetric::Memory));
    }

    #[test]
    fn test_container_deploy_commands() {
        let data = Path::new("/var/data/archives");

        assert_eq!(
            container_file_check("bench", Path::new("/clp/bin/clp-s")).join(" "),
            "docker exec bench test -f /clp/bin/clp-s"
        );
        assert_eq!(
            container_dir_check("bench", data).join(" "),
            "docker exec bench test -d /var/data/archives"
        );

        let clear = container_data_path_plan("bench", data, true, true);
        assert_eq!(
            clear,
            vec![vec![
                "docker".to_string(),
                "exec".into(),
                "bench".into(),
                "bash".into(),
                "-c".into(),
                "rm -rf /var/data/archives/*".into(),
            ]]
        );

        assert!(container_data_path_plan("bench", data, false, true).is_empty());

        for clear in [true, false] {
            let create = container_data_path_plan("bench", data, clear, false);
            assert_eq!(create.len(), 1);
            assert_eq!(create[0].join(" "), "docker exec bench mkdir -p /var/data/archives");
        }
    }

    #[tokio::test]
    async fn test_deploy_rejects_missing_required_file() {
        let dir = tempfile::tempdir().unwrap();
        let (dataset, _) = fixture(dir.path());
        let yaml = format!(
            "command:\n  dataset_path: {}\n  required_files: [{}]\n",
            dataset.display(),
            dir.path().join("bin/tool").display()
        );
        let adapter = Arc::new(CommandAdapter::from_config(&config_for(&yaml)).unwrap());
        let orchestrator = OrchestratorBuilder::new().adapter(adapter).build().unwrap();

        assert!(!orchestrator.hot_run().await.is_success());
        assert!(orchestrator.report().modes.is_empty());
    }

    #[test]
    fn test_use_baseline_override() {
        let config = config_for(
            "command:\n  dataset_path: /data\n  use_baseline: false\n",
        );
        let adapter = CommandAdapter::from_config(&config).unwrap();
        assert!(!adapter.uses_baseline(SystemMetric::Memory));
    }

    #[test]
    fn test_placeholders() {
        let config = config_for(
            "command:\n  dataset_path: /in\n  data_path: /out\n",
        );
        let adapter = CommandAdapter::from_config(&config).unwrap();
        assert_eq!(
            adapter.render("tool c {data_path} {dataset_path}"),
            "tool c /out /in"
        );
    }

    #[tokio::test]
    async fn test_command_probe() {
        let config = config_for(
            "command:\n  dataset_path: /data\n  memory:\n    probe: command\n    command: echo 2048\n",
        );
        let adapter = CommandAdapter::from_config(&config).unwrap();
        assert_eq!(
            adapter
                .acquire_system_metric_sample(SystemMetric::Memory)
                .await
                .unwrap(),
            2048
        );
    }

    #[tokio::test]
    async fn test_command_probe_bad_output() {
        let config = config_for(
            "command:\n  dataset_path: /data\n  memory:\n    probe: command\n    command: echo lots\n",
        );
        let adapter = CommandAdapter::from_config(&config).unwrap();
        assert!(matches!(
            adapter
                .acquire_system_metric_sample(SystemMetric::Memory)
                .await,
            Err(AdapterError::UnexpectedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_hot_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (dataset, data) = fixture(dir.path());
        // Stale archive content that deploy must clear
        std::fs::create_dir(&data).unwrap();
        std::fs::write(data.join("stale"), vec![b'z'; 4096]).unwrap();

        let yaml = format!(
            r#"
command:
  name: fixture
  dataset_path: {dataset}
  data_path: {data}
  clear_data_path: true
  ingest:
    - head -c 10 {{dataset_path}}/app.log > {{data_path}}/packed
  queries:
    - grep ERROR {{dataset_path}}/app.log
    - grep INFO {{dataset_path}}/app.log
"#,
            dataset = dataset.display(),
            data = data.display(),
        );
        let adapter = Arc::new(CommandAdapter::from_config(&config_for(&yaml)).unwrap());
        let orchestrator = OrchestratorBuilder::new().adapter(adapter).build().unwrap();

        let outcomes = orchestrator.run(ModeSelection::Hot).await;
        assert!(outcomes[0].is_success());

        let report = orchestrator.report();
        let hot = report.mode(BenchmarkingMode::HotRun).unwrap();
        assert_eq!(hot.decompressed_size, Some(40));
        assert_eq!(hot.compressed_size, Some(10));
        assert_eq!(hot.ratio, Some(4.0));
        assert!(hot.ingest_latency_secs.is_some());
        assert_eq!(hot.query_latencies_secs.len(), 2);
        assert!(!data.join("stale").exists());
    }

    #[tokio::test]
    async fn test_deploy_rejects_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "command:\n  dataset_path: {}\n",
            dir.path().join("missing").display()
        );
        let adapter = Arc::new(CommandAdapter::from_config(&config_for(&yaml)).unwrap());
        let orchestrator = OrchestratorBuilder::new().adapter(adapter).build().unwrap();

        let outcome = orchestrator.hot_run().await;
        assert!(!outcome.is_success());
        assert!(orchestrator.report().modes.is_empty());
    }

    #[tokio::test]
    async fn test_custom_mid_terminate_runs_instead_of_terminate() {
        let dir = tempfile::tempdir().unwrap();
        let (dataset, _) = fixture(dir.path());
        let log = dir.path().join("calls");

        let yaml = format!(
            r#"
command:
  dataset_path: {dataset}
  mid_terminate:
    - echo mid >> {log}
  terminate:
    - echo end >> {log}
  launch:
    - echo launch >> {log}
"#,
            dataset = dataset.display(),
            log = log.display(),
        );
        let adapter = Arc::new(CommandAdapter::from_config(&config_for(&yaml)).unwrap());
        let orchestrator = OrchestratorBuilder::new().adapter(adapter).build().unwrap();

        assert!(orchestrator.cold_run().await.is_success());
        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "launch\nmid\nlaunch\nend\n");
    }
}
