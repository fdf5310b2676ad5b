//! Containerized execution with hard resource caps, a sibling memory
//! sampler, and a host-enforced wall clock. The container is created with a
//! unique name and is NOT auto-removed, so the one-shot stats query can
//! correlate on the name; cleanup is a bounded best-effort `rm -f`.

use crate::memory::parse_mem_usage;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Exit code reported when the wall clock kills the run.
pub const TIMEOUT_EXIT_CODE: i64 = -999;

const SAMPLER_INITIAL_DELAY: Duration = Duration::from_millis(50);
const SAMPLER_INTERVAL: Duration = Duration::from_millis(150);
const SAMPLER_MAX_SAMPLES: u32 = 60;
const SAMPLER_JOIN_BOUND: Duration = Duration::from_secs(1);
const OUTPUT_JOIN_BOUND: Duration = Duration::from_secs(2);
const CLEANUP_BOUND: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub container_name: String,
    pub image: String,
    pub host_dir: PathBuf,
    pub mount_point: String,
    pub readonly: bool,
    pub command: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub raw_log: String,
    pub timed_out: bool,
    pub exit_code: i64,
    /// Container-wide peak; attributed uniformly to every test case.
    pub peak_memory_bytes: Option<u64>,
    pub wall_time_ms: u64,
}

pub trait Sandbox: Send + Sync {
    fn run(
        &self,
        request: &SandboxRequest,
    ) -> impl Future<Output = Result<SandboxOutcome>> + Send;
}

/// Docker CLI sandbox.
pub struct DockerSandbox {
    pub memory_mib: u64,
    pub cpus: f64,
    pub pids_limit: u32,
    pub wall_timeout: Duration,
}

impl DockerSandbox {
    pub fn new(memory_mib: u64, wall_timeout: Duration) -> Self {
        DockerSandbox {
            memory_mib,
            cpus: 0.5,
            pids_limit: 100,
            wall_timeout,
        }
    }

    fn command(&self, request: &SandboxRequest) -> Command {
        let mount = if request.readonly {
            format!(
                "{}:{}:ro",
                request.host_dir.display(),
                request.mount_point
            )
        } else {
            format!("{}:{}", request.host_dir.display(), request.mount_point)
        };
        let mut cmd = Command::new("docker");
        cmd.arg("run")
            .arg("--name")
            .arg(&request.container_name)
            .arg("--memory")
            .arg(format!("{}m", self.memory_mib))
            .arg("--memory-swap")
            .arg(format!("{}m", self.memory_mib))
            .arg("--cpus")
            .arg(self.cpus.to_string())
            .arg("--pids-limit")
            .arg(self.pids_limit.to_string())
            .arg("--network")
            .arg("none")
            .arg("-v")
            .arg(mount)
            .arg(&request.image)
            .args(&request.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Sandbox for DockerSandbox {
    async fn run(&self, request: &SandboxRequest) -> Result<SandboxOutcome> {
        let started = Instant::now();
        let mut child = self
            .command(request)
            .spawn()
            .context("failed to spawn container process")?;

        // Sibling sampler updates the peak while the process runs; it is
        // cancelled through the watch channel and joined with a short bound.
        let peak = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = watch::channel(false);
        let sampler = tokio::spawn(sample_peak_memory(
            request.container_name.clone(),
            Arc::clone(&peak),
            stop_rx,
        ));

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);
        let collector = tokio::spawn(collect_lines(line_rx));

        let mut timed_out = false;
        let exit_code = match tokio::time::timeout(self.wall_timeout, child.wait()).await {
            Ok(Ok(status)) => status.code().map(i64::from).unwrap_or(-1),
            Ok(Err(e)) => {
                let _ = stop_tx.send(true);
                remove_container(&request.container_name).await;
                return Err(e).context("failed waiting on container process");
            }
            Err(_) => {
                timed_out = true;
                kill_container(&request.container_name).await;
                let _ = child.kill().await;
                let _ = child.wait().await;
                TIMEOUT_EXIT_CODE
            }
        };
        let wall_time_ms = started.elapsed().as_millis() as u64;

        let _ = stop_tx.send(true);
        if tokio::time::timeout(SAMPLER_JOIN_BOUND, sampler).await.is_err() {
            warn!(container = %request.container_name, "memory sampler did not stop in time");
        }

        let raw_log = match tokio::time::timeout(OUTPUT_JOIN_BOUND, collector).await {
            Ok(Ok(log)) => log,
            _ => {
                warn!(container = %request.container_name, "output collector did not finish");
                String::new()
            }
        };

        remove_container(&request.container_name).await;

        let peak_bytes = match peak.load(Ordering::Relaxed) {
            0 => None,
            bytes => Some(bytes),
        };

        Ok(SandboxOutcome {
            raw_log,
            timed_out,
            exit_code,
            peak_memory_bytes: peak_bytes,
            wall_time_ms,
        })
    }
}

async fn sample_peak_memory(
    container_name: String,
    peak: Arc<AtomicU64>,
    mut stop: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = stop.changed() => return,
        _ = tokio::time::sleep(SAMPLER_INITIAL_DELAY) => {}
    }
    for _ in 0..SAMPLER_MAX_SAMPLES {
        if let Some(bytes) = query_memory(&container_name).await {
            peak.fetch_max(bytes, Ordering::Relaxed);
        }
        tokio::select! {
            _ = stop.changed() => return,
            _ = tokio::time::sleep(SAMPLER_INTERVAL) => {}
        }
    }
}

/// One-shot stats query, parsed as a `used / limit` figure.
async fn query_memory(container_name: &str) -> Option<u64> {
    let output = Command::new("docker")
        .args(["stats", "--no-stream", "--format", "{{.MemUsage}}", container_name])
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_mem_usage(String::from_utf8_lossy(&output.stdout).trim())
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "crucible::sandbox", "{}", line);
        if tx.send(line).is_err() {
            break;
        }
    }
}

async fn collect_lines(mut rx: mpsc::UnboundedReceiver<String>) -> String {
    let mut buffer = String::new();
    while let Some(line) = rx.recv().await {
        buffer.push_str(&line);
        buffer.push('\n');
    }
    buffer
}

async fn kill_container(container_name: &str) {
    let result = Command::new("docker")
        .args(["kill", container_name])
        .output()
        .await;
    if let Err(e) = result {
        warn!(container = %container_name, error = %e, "failed to kill container");
    }
}

/// Best-effort removal; a failure is logged, never propagated.
async fn remove_container(container_name: &str) {
    let mut cmd = Command::new("docker");
    cmd.args(["rm", "-f", container_name]);
    match tokio::time::timeout(CLEANUP_BOUND, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {}
        Ok(Ok(output)) => {
            warn!(
                container = %container_name,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "container removal failed"
            );
        }
        Ok(Err(e)) => warn!(container = %container_name, error = %e, "container removal failed"),
        Err(_) => warn!(container = %container_name, "container removal timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_carries_resource_caps() {
        let sandbox = DockerSandbox::new(256, Duration::from_secs(10));
        let request = SandboxRequest {
            container_name: "crucible-test".to_string(),
            image: "crucible-java:latest".to_string(),
            host_dir: PathBuf::from("/tmp/sub"),
            mount_point: "/app/src".to_string(),
            readonly: true,
            command: vec!["java".to_string(), "Main".to_string()],
        };
        let cmd = sandbox.command(&request);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--memory".to_string()));
        assert!(args.contains(&"256m".to_string()));
        assert!(args.contains(&"--memory-swap".to_string()));
        assert!(args.contains(&"0.5".to_string()));
        assert!(args.contains(&"--pids-limit".to_string()));
        assert!(args.contains(&"100".to_string()));
        assert!(args.contains(&"none".to_string()));
        assert!(args.contains(&"/tmp/sub:/app/src:ro".to_string()));
        assert_eq!(args.last().unwrap(), "Main");
    }

    #[test]
    fn writable_mount_has_no_ro_suffix() {
        let sandbox = DockerSandbox::new(256, Duration::from_secs(10));
        let request = SandboxRequest {
            container_name: "crucible-test".to_string(),
            image: "crucible-java:latest".to_string(),
            host_dir: PathBuf::from("/tmp/sub"),
            mount_point: "/app/src".to_string(),
            readonly: false,
            command: vec!["true".to_string()],
        };
        let cmd = sandbox.command(&request);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"/tmp/sub:/app/src".to_string()));
    }
}
