//! Shell and filesystem helpers shared by adapters

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use clp_bench_core::AdapterError;
use tokio::process::Command;
use walkdir::WalkDir;

/// Run `command` through `sh -c` and return its stdout
///
/// # Errors
///
/// Fails if the shell cannot be spawned or the command exits non-zero.
pub async fn run_shell(command: &str) -> Result<String, AdapterError> {
    tracing::debug!(command, "Executing command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .await?;

    if !output.status.success() {
        return Err(AdapterError::command_failed(command, output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run every command in order, stopping at the first failure
pub async fn run_commands(commands: &[String]) -> Result<(), AdapterError> {
    for command in commands {
        tracing::info!(command = %command, "Executing command");
        run_shell(command).await?;
    }
    Ok(())
}

/// Result of one timed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRun {
    /// End-to-end time including the line count
    pub latency: Duration,
    /// Lines the query printed
    pub matched_lines: u64,
}

/// Run `query` piped into `wc -l`, timing the whole pipeline
///
/// The query's stderr is discarded.
pub async fn timed_query(query: &str) -> Result<QueryRun, AdapterError> {
    let command = format!("{query} | wc -l");
    tracing::info!(command = %command, "Executing query");

    let start = Instant::now();
    let output = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await?;
    let latency = start.elapsed();

    if !output.status.success() {
        return Err(AdapterError::command_failed(command, output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let matched_lines = stdout.trim().parse::<u64>().map_err(|_| {
        AdapterError::UnexpectedOutput(format!("line count from `{command}`: {}", stdout.trim()))
    })?;
    tracing::info!(matched_lines, "Number of matched log lines");

    Ok(QueryRun {
        latency,
        matched_lines,
    })
}

/// Total size in bytes of every regular file under `path`
///
/// A plain file reports its own length. Symlinks are not followed.
pub async fn directory_size(path: impl Into<PathBuf>) -> Result<u64, AdapterError> {
    let path = path.into();
    tokio::task::spawn_blocking(move || size_of_tree(&path))
        .await
        .map_err(|e| AdapterError::Io(std::io::Error::other(e)))?
        .map_err(AdapterError::from)
}

fn size_of_tree(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Sum of the RSS column (KB) of `ps aux` lines containing every pattern
///
/// Returns 0 when no process matches.
pub fn parse_ps_rss(output: &str, patterns: &[String]) -> Result<i64, AdapterError> {
    let mut total = 0;
    for line in output.lines().skip(1) {
        if !patterns.iter().all(|p| line.contains(p.as_str())) {
            continue;
        }
        let rss = line
            .split_whitespace()
            .nth(5)
            .and_then(|field| field.parse::<i64>().ok())
            .ok_or_else(|| AdapterError::UnexpectedOutput(format!("ps line: {line}")))?;
        total += rss;
    }
    Ok(total)
}

/// Resident memory in KB of the processes matching every pattern
///
/// Runs `ps aux` inside `container` when one is given.
pub async fn process_rss_kb(patterns: &[String], container: Option<&str>) -> Result<i64, AdapterError> {
    let mut args = vec!["ps".to_string(), "aux".to_string()];
    if let Some(id) = container {
        args = docker_exec(id, args.as_slice());
    }
    let output = run_args(&args).await?;
    parse_ps_rss(&output, patterns)
}

/// Memory usage column of a `docker stats` line, in KB
///
/// Accepts the binary and decimal units docker prints (`GiB`, `MiB`, `KiB`,
/// `kB`, `B` and friends).
pub fn parse_docker_mem_usage(value: &str) -> Option<f64> {
    const UNITS: [(&str, f64); 9] = [
        ("GiB", 1024.0 * 1024.0),
        ("MiB", 1024.0),
        ("KiB", 1.0),
        ("GB", 1000.0 * 1000.0),
        ("MB", 1000.0),
        ("KB", 1.0),
        ("kB", 1.0),
        ("TiB", 1024.0 * 1024.0 * 1024.0),
        ("B", 1.0 / 1024.0),
    ];

    UNITS.iter().find_map(|(unit, factor)| {
        let number = value.strip_suffix(unit)?;
        number.parse::<f64>().ok().map(|n| n * factor)
    })
}

/// Total memory in KB of the `docker stats --no-stream` rows whose container
/// name starts with `name_prefix`
pub fn parse_docker_stats(output: &str, name_prefix: &str) -> Result<i64, AdapterError> {
    let mut total = 0.0;
    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = fields.get(1) else {
            continue;
        };
        if !name.starts_with(name_prefix) {
            continue;
        }
        total += fields
            .get(3)
            .and_then(|usage| parse_docker_mem_usage(usage))
            .ok_or_else(|| AdapterError::UnexpectedOutput(format!("docker stats line: {line}")))?;
    }
    Ok(total.floor() as i64)
}

/// Memory in KB of the containers whose name starts with `name_prefix`
///
/// Runs `docker stats` inside `container` when one is given.
pub async fn docker_stats_kb(name_prefix: &str, container: Option<&str>) -> Result<i64, AdapterError> {
    let mut args = vec!["docker".to_string(), "stats".to_string(), "--no-stream".to_string()];
    if let Some(id) = container {
        args = docker_exec(id, args.as_slice());
    }
    let output = run_args(&args).await?;
    parse_docker_stats(&output, name_prefix)
}

/// Wrap `args` so they run inside `container`
pub fn docker_exec<S: AsRef<str>>(container: &str, args: &[S]) -> Vec<String> {
    ["docker", "exec", container]
        .into_iter()
        .map(str::to_string)
        .chain(args.iter().map(|a| a.as_ref().to_string()))
        .collect()
}

/// Run a program with arguments (no shell) and return its stdout
///
/// # Errors
///
/// Fails if the program cannot be spawned or exits non-zero.
pub async fn run_args(args: &[String]) -> Result<String, AdapterError> {
    let (output, line) = spawn_args(args).await?;
    if !output.status.success() {
        return Err(AdapterError::command_failed(line, output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a program with arguments and report whether it exited successfully
pub async fn check_args(args: &[String]) -> Result<bool, AdapterError> {
    let (output, _) = spawn_args(args).await?;
    Ok(output.status.success())
}

async fn spawn_args(args: &[String]) -> Result<(std::process::Output, String), AdapterError> {
    let line = args.join(" ");
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| AdapterError::Config("empty command".into()))?;
    tracing::debug!(command = %line, "Executing command");

    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await?;
    Ok((output, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS_OUTPUT: &str = "\
USER         PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND
root           1  0.0  0.0   4364  3300 ?        Ss   10:00   0:00 /bin/bash
root          42 95.0  3.1 912000 51200 ?        Rl   10:01   1:20 /usr/bin/clp-s c /data /dataset
root          43 12.0  1.0 412000 20480 ?        Sl   10:01   0:10 /usr/bin/clp-s s /data error
root          77  0.0  0.0   7060  1600 ?        R    10:02   0:00 ps aux
";

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    const DOCKER_STATS_OUTPUT: &str = "\
CONTAINER ID   NAME          CPU %     MEM USAGE / LIMIT     MEM %     NET I/O          BLOCK I/O        PIDS
1a2b3c4d5e6f   clp-db        0.50%     1.5GiB / 15.5GiB      9.68%     1.2kB / 0B       0B / 0B          30
2b3c4d5e6f7a   clp-worker    12.0%     512MiB / 15.5GiB      3.23%     3kB / 1kB        0B / 0B          12
3c4d5e6f7a8b   clp-cache     0.01%     300KiB / 15.5GiB      0.00%     0B / 0B          0B / 0B          2
4d5e6f7a8b9c   loki          1.00%     2GiB / 15.5GiB        12.9%     0B / 0B          0B / 0B          8
";

    #[test]
    fn test_parse_docker_mem_usage_units() {
        assert_eq!(parse_docker_mem_usage("1.5GiB"), Some(1_572_864.0));
        assert_eq!(parse_docker_mem_usage("512MiB"), Some(524_288.0));
        assert_eq!(parse_docker_mem_usage("300KiB"), Some(300.0));
        assert_eq!(parse_docker_mem_usage("300kB"), Some(300.0));
        assert_eq!(parse_docker_mem_usage("2048B"), Some(2.0));
        assert_eq!(parse_docker_mem_usage("--"), None);
        assert_eq!(parse_docker_mem_usage("12"), None);
    }

    #[test]
    fn test_parse_docker_stats_sums_prefixed_containers() {
        assert_eq!(
            parse_docker_stats(DOCKER_STATS_OUTPUT, "clp-").unwrap(),
            1_572_864 + 524_288 + 300
        );
        assert_eq!(parse_docker_stats(DOCKER_STATS_OUTPUT, "loki").unwrap(), 2_097_152);
        assert_eq!(parse_docker_stats(DOCKER_STATS_OUTPUT, "mongo").unwrap(), 0);
    }

    #[test]
    fn test_parse_docker_stats_malformed_usage() {
        let output = "CONTAINER ID NAME CPU % MEM\nabc clp-db 0.0% --\n";
        assert!(matches!(
            parse_docker_stats(output, "clp-"),
            Err(AdapterError::UnexpectedOutput(_))
        ));
    }

    #[test]
    fn test_docker_exec_wraps_arguments() {
        assert_eq!(
            docker_exec("bench", &["test", "-d", "/data"]),
            vec!["docker", "exec", "bench", "test", "-d", "/data"]
        );
    }

    #[tokio::test]
    async fn test_run_args_and_check_args() {
        let args = vec!["echo".to_string(), "a b".to_string()];
        assert_eq!(run_args(&args).await.unwrap().trim(), "a b");

        assert!(check_args(&["true".to_string()]).await.unwrap());
        assert!(!check_args(&["false".to_string()]).await.unwrap());
        assert!(matches!(
            run_args(&["false".to_string()]).await,
            Err(AdapterError::CommandFailed { .. })
        ));
        assert!(run_args(&[]).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_size_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), vec![b'x'; 100]).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.log"), dir.path().join("link.log")).unwrap();

        assert_eq!(directory_size(dir.path()).await.unwrap(), 100);
    }

    #[test]
    fn test_parse_ps_rss_sums_matching_lines() {
        assert_eq!(parse_ps_rss(PS_OUTPUT, &patterns(&["clp-s"])).unwrap(), 71680);
        assert_eq!(
            parse_ps_rss(PS_OUTPUT, &patterns(&["clp-s", "/dataset"])).unwrap(),
            51200
        );
    }

    #[test]
    fn test_parse_ps_rss_no_match() {
        assert_eq!(parse_ps_rss(PS_OUTPUT, &patterns(&["loki"])).unwrap(), 0);
    }

    #[test]
    fn test_parse_ps_rss_skips_header() {
        // Every line, header included, contains an empty pattern
        assert_eq!(parse_ps_rss(PS_OUTPUT, &patterns(&[""])).unwrap(), 76580);
    }

    #[test]
    fn test_parse_ps_rss_malformed_line() {
        let output = "USER PID\nroot 1 clp-s\n";
        assert!(matches!(
            parse_ps_rss(output, &patterns(&["clp-s"])),
            Err(AdapterError::UnexpectedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_run_shell_captures_stdout() {
        let out = run_shell("echo hello").await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_shell_nonzero_exit() {
        let err = run_shell("exit 3").await.unwrap_err();
        match err {
            AdapterError::CommandFailed { command, status } => {
                assert_eq!(command, "exit 3");
                assert!(status.contains('3'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_commands_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let commands = vec![
            "false".to_string(),
            format!("touch {}", marker.display()),
        ];

        assert!(run_commands(&commands).await.is_err());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_timed_query_counts_lines() {
        let run = timed_query("printf 'a\\nb\\nc\\n'").await.unwrap();
        assert_eq!(run.matched_lines, 3);
        assert!(run.latency > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_timed_query_empty_result() {
        let run = timed_query("true").await.unwrap();
        assert_eq!(run.matched_lines, 0);
    }

    #[tokio::test]
    async fn test_directory_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), vec![b'x'; 1000]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("b.log"), vec![b'y'; 24]).unwrap();

        assert_eq!(directory_size(dir.path()).await.unwrap(), 1024);
        assert_eq!(directory_size(dir.path().join("a.log")).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_directory_size_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = directory_size(dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(err, AdapterError::Io(_)));
    }
}
