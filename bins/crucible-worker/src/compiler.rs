//! Compile stage. Compiled languages get a bounded container run over the
//! submission mount; interpreted languages are a no-op.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub container_name: String,
    pub image: String,
    pub host_dir: PathBuf,
    pub mount_point: String,
    /// None for interpreted languages.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,
    pub output: String,
}

impl CompileOutcome {
    pub fn skipped() -> Self {
        CompileOutcome {
            success: true,
            output: String::new(),
        }
    }
}

pub trait Compiler: Send + Sync {
    fn compile(
        &self,
        request: &CompileRequest,
    ) -> impl Future<Output = Result<CompileOutcome>> + Send;
}

pub struct DockerCompiler {
    pub timeout: Duration,
}

impl Compiler for DockerCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome> {
        let Some(command) = &request.command else {
            return Ok(CompileOutcome::skipped());
        };

        debug!(container = %request.container_name, "starting compile container");
        // The mount stays writable here: the compiler drops its artifacts
        // next to the sources, which the run stage then mounts read-only.
        let mut cmd = Command::new("docker");
        cmd.arg("run")
            .arg("--rm")
            .arg("--name")
            .arg(&request.container_name)
            .arg("--network")
            .arg("none")
            .arg("-v")
            .arg(format!(
                "{}:{}",
                request.host_dir.display(),
                request.mount_point
            ))
            .arg(&request.image)
            .args(command)
            .stdin(Stdio::null());

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.context("failed to run compile container")?,
            Err(_) => {
                return Ok(CompileOutcome {
                    success: false,
                    output: format!(
                        "compilation exceeded the {}s limit",
                        self.timeout.as_secs()
                    ),
                })
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(CompileOutcome {
            success: output.status.success(),
            output: combined,
        })
    }
}
