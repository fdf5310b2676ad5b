//! Per-submission pipeline: fresh temp directory, harness files, compile,
//! sandbox run, result-line parse, classification. The glue layer knows
//! neither how code executes nor what the caller does with the outputs.

use crate::compiler::{CompileRequest, Compiler};
use crate::harness;
use crate::languages::LanguageRegistry;
use crate::protocol::{self, TestLine};
use crate::sandbox::{Sandbox, SandboxOutcome, SandboxRequest};
use crate::submission::CodeSubmission;
use anyhow::{Context, Result};
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallStatus {
    Success,
    CompilationError,
    Timeout,
    RuntimeError,
    InternalError,
}

#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub index: usize,
    pub actual_output: Option<String>,
    pub execution_time_ms: u64,
    pub memory_bytes: Option<u64>,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub is_custom: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub overall: OverallStatus,
    pub log: String,
    pub cases: Vec<CaseOutcome>,
}

pub struct Orchestrator<C, S> {
    compiler: C,
    sandbox: S,
    registry: LanguageRegistry,
}

impl<C: Compiler, S: Sandbox> Orchestrator<C, S> {
    pub fn new(compiler: C, sandbox: S, registry: LanguageRegistry) -> Self {
        Orchestrator {
            compiler,
            sandbox,
            registry,
        }
    }

    /// Run one submission end to end. Never fails: any infrastructure error
    /// collapses into an INTERNAL_ERROR report. `on_running` fires once the
    /// compile stage has passed and the sandbox is about to start.
    pub async fn execute<F, Fut>(&self, submission: &CodeSubmission, on_running: F) -> ExecutionReport
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()> + Send,
    {
        match self.try_execute(submission, on_running).await {
            Ok(report) => report,
            Err(e) => {
                warn!(submission_id = %submission.id, error = %format!("{:#}", e), "submission failed internally");
                ExecutionReport {
                    overall: OverallStatus::InternalError,
                    log: format!("internal error: {:#}", e),
                    cases: Vec::new(),
                }
            }
        }
    }

    async fn try_execute<F, Fut>(&self, submission: &CodeSubmission, on_running: F) -> Result<ExecutionReport>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()> + Send,
    {
        let profile = self.registry.profile(submission.language)?;
        let generator = harness::generator_for(submission.language);
        let generated = generator
            .generate(submission)
            .context("harness generation failed")?;

        // Removed on every exit path, including panics, when the guard drops.
        let dir = tempfile::Builder::new()
            .prefix("crucible-")
            .tempdir()
            .context("failed to create submission directory")?;
        for file in &generated.files {
            let path = dir.path().join(&file.path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("failed to create package directory")?;
            }
            tokio::fs::write(&path, &file.contents)
                .await
                .with_context(|| format!("failed to write {}", file.path))?;
        }

        let container_base = format!("crucible-{}", Uuid::new_v4());

        let compile = self
            .compiler
            .compile(&CompileRequest {
                container_name: format!("{}-compile", container_base),
                image: profile.image.clone(),
                host_dir: dir.path().to_path_buf(),
                mount_point: profile.mount_point.clone(),
                command: profile.compile_command_for(&generated.package_dir),
            })
            .await?;
        if !compile.success {
            info!(submission_id = %submission.id, "compilation failed");
            return Ok(ExecutionReport {
                overall: OverallStatus::CompilationError,
                log: compile.output,
                cases: Vec::new(),
            });
        }

        on_running().await;

        let run = self
            .sandbox
            .run(&SandboxRequest {
                container_name: container_base,
                image: profile.image.clone(),
                host_dir: dir.path().to_path_buf(),
                mount_point: profile.mount_point.clone(),
                readonly: true,
                command: profile.run_command_for(&generated.entry_point),
            })
            .await?;

        let parsed = protocol::parse_log(&run.raw_log);
        let cases = assemble_cases(submission, &parsed, &run);
        let overall = if run.timed_out {
            OverallStatus::Timeout
        } else if run.exit_code != 0 {
            OverallStatus::RuntimeError
        } else {
            OverallStatus::Success
        };

        let mut log = compile.output;
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&run.raw_log);

        Ok(ExecutionReport {
            overall,
            log,
            cases,
        })
    }
}

/// Align parsed lines with the input order. Every emitted line maps onto
/// its index; on a wall-clock kill the first silent index absorbs the
/// unaccounted wall time as a TimeLimitExceeded entry and later indices
/// stay absent, matching what actually ran.
fn assemble_cases(
    submission: &CodeSubmission,
    parsed: &[TestLine],
    run: &SandboxOutcome,
) -> Vec<CaseOutcome> {
    let mut cases = Vec::new();
    let mut observed_ms: u64 = 0;
    for (index, case) in submission.cases.iter().enumerate() {
        if let Some(line) = parsed.iter().find(|l| l.index == index) {
            observed_ms += line.duration_ms;
            cases.push(CaseOutcome {
                index,
                actual_output: line.output.clone(),
                execution_time_ms: line.duration_ms,
                memory_bytes: run.peak_memory_bytes,
                error: line.error.clone(),
                error_type: line.error_type.clone(),
                is_custom: case.is_custom,
            });
        } else if run.timed_out {
            cases.push(CaseOutcome {
                index,
                actual_output: None,
                execution_time_ms: run.wall_time_ms.saturating_sub(observed_ms),
                memory_bytes: run.peak_memory_bytes,
                error: Some("wall-clock limit reached".to_string()),
                error_type: Some("TimeLimitExceeded".to_string()),
                is_custom: case.is_custom,
            });
            break;
        } else {
            break;
        }
    }
    cases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOutcome;
    use crate::submission::CaseInput;
    use crucible_common::types::{Language, Parameter, QuestionMetadata, QuestionType};
    use serde_json::json;

    struct StubCompiler {
        outcome: CompileOutcome,
    }

    impl Compiler for StubCompiler {
        async fn compile(&self, _request: &CompileRequest) -> Result<CompileOutcome> {
            Ok(self.outcome.clone())
        }
    }

    struct StubSandbox {
        outcome: Option<SandboxOutcome>,
    }

    impl Sandbox for StubSandbox {
        async fn run(&self, _request: &SandboxRequest) -> Result<SandboxOutcome> {
            match &self.outcome {
                Some(outcome) => Ok(outcome.clone()),
                None => anyhow::bail!("docker daemon unreachable"),
            }
        }
    }

    fn two_sum_submission(cases: Vec<serde_json::Value>) -> CodeSubmission {
        CodeSubmission {
            id: "sub-1".to_string(),
            language: Language::Java,
            source_code: "class Solution { public int[] twoSum(int[] nums, int target) { return new int[]{0, 1}; } }".to_string(),
            metadata: QuestionMetadata {
                package_name: "com.example".to_string(),
                function_name: "twoSum".to_string(),
                return_type: "int[]".to_string(),
                parameters: vec![
                    Parameter { name: "nums".to_string(), type_name: "int[]".to_string() },
                    Parameter { name: "target".to_string(), type_name: "int".to_string() },
                ],
                custom_data_structures: Vec::new(),
                question_type: QuestionType::FunctionCall,
                mutation_target: None,
                serialization_strategy: None,
            },
            cases: cases
                .into_iter()
                .map(|input| CaseInput { input, is_custom: false })
                .collect(),
        }
    }

    fn orchestrator(
        compile: CompileOutcome,
        run: Option<SandboxOutcome>,
    ) -> Orchestrator<StubCompiler, StubSandbox> {
        Orchestrator::new(
            StubCompiler { outcome: compile },
            StubSandbox { outcome: run },
            LanguageRegistry::builtin(),
        )
    }

    fn success_outcome(raw_log: &str) -> SandboxOutcome {
        SandboxOutcome {
            raw_log: raw_log.to_string(),
            timed_out: false,
            exit_code: 0,
            peak_memory_bytes: Some(13 * 1024 * 1024),
            wall_time_ms: 120,
        }
    }

    #[tokio::test]
    async fn successful_run_preserves_case_order() {
        let sub = two_sum_submission(vec![
            json!({"nums": [2, 7, 11, 15], "target": 9}),
            json!({"nums": [3, 3], "target": 6}),
        ]);
        let orch = orchestrator(
            CompileOutcome { success: true, output: String::new() },
            Some(success_outcome(
                "TEST_CASE_RESULT: 0,[0,1],12,\nTEST_CASE_RESULT: 1,[0,1],8,\n",
            )),
        );
        let report = orch.execute(&sub, || async {}).await;
        assert_eq!(report.overall, OverallStatus::Success);
        assert_eq!(report.cases.len(), 2);
        assert_eq!(report.cases[0].index, 0);
        assert_eq!(report.cases[0].actual_output.as_deref(), Some("[0,1]"));
        assert_eq!(report.cases[0].execution_time_ms, 12);
        assert_eq!(report.cases[0].memory_bytes, Some(13 * 1024 * 1024));
        assert_eq!(report.cases[1].index, 1);
        assert!(report.cases[1].error.is_none());
    }

    #[tokio::test]
    async fn compile_failure_short_circuits() {
        let sub = two_sum_submission(vec![json!({"nums": [1], "target": 1})]);
        let orch = orchestrator(
            CompileOutcome {
                success: false,
                output: "Main.java:3: error: ';' expected".to_string(),
            },
            Some(success_outcome("")),
        );
        let report = orch.execute(&sub, || async { panic!("must not reach the sandbox") }).await;
        assert_eq!(report.overall, OverallStatus::CompilationError);
        assert!(report.cases.is_empty());
        assert!(report.log.contains("';' expected"));
    }

    #[tokio::test]
    async fn timeout_synthesizes_first_silent_case() {
        let sub = two_sum_submission(vec![
            json!({"nums": [1], "target": 1}),
            json!({"nums": [2], "target": 2}),
            json!({"nums": [3], "target": 3}),
        ]);
        let orch = orchestrator(
            CompileOutcome { success: true, output: String::new() },
            Some(SandboxOutcome {
                raw_log: "TEST_CASE_RESULT: 0,[0,1],200,\n".to_string(),
                timed_out: true,
                exit_code: crate::sandbox::TIMEOUT_EXIT_CODE,
                peak_memory_bytes: None,
                wall_time_ms: 10_050,
            }),
        );
        let report = orch.execute(&sub, || async {}).await;
        assert_eq!(report.overall, OverallStatus::Timeout);
        // first case reported, second synthesized, third absent
        assert_eq!(report.cases.len(), 2);
        assert_eq!(report.cases[1].index, 1);
        assert_eq!(report.cases[1].execution_time_ms, 9_850);
        assert_eq!(report.cases[1].error_type.as_deref(), Some("TimeLimitExceeded"));
        let total: u64 = report.cases.iter().map(|c| c.execution_time_ms).sum();
        assert_eq!(total, 10_050);
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_runtime_error() {
        let sub = two_sum_submission(vec![json!({"nums": [1], "target": 1})]);
        let orch = orchestrator(
            CompileOutcome { success: true, output: String::new() },
            Some(SandboxOutcome {
                raw_log: "TEST_CASE_RESULT: 0,,3,ArrayIndexOutOfBoundsException: Index 0 out of bounds for length 0\n".to_string(),
                timed_out: false,
                exit_code: 1,
                peak_memory_bytes: None,
                wall_time_ms: 40,
            }),
        );
        let report = orch.execute(&sub, || async {}).await;
        assert_eq!(report.overall, OverallStatus::RuntimeError);
        assert_eq!(report.cases.len(), 1);
        assert_eq!(
            report.cases[0].error_type.as_deref(),
            Some("ArrayIndexOutOfBoundsException")
        );
    }

    #[tokio::test]
    async fn sandbox_error_becomes_internal_error() {
        let sub = two_sum_submission(vec![json!({"nums": [1], "target": 1})]);
        let orch = orchestrator(
            CompileOutcome { success: true, output: String::new() },
            None,
        );
        let report = orch.execute(&sub, || async {}).await;
        assert_eq!(report.overall, OverallStatus::InternalError);
        assert!(report.log.contains("docker daemon unreachable"));
        assert!(report.cases.is_empty());
    }

    #[tokio::test]
    async fn custom_flag_travels_to_outcomes() {
        let mut sub = two_sum_submission(vec![
            json!({"nums": [1], "target": 1}),
            json!({"nums": [2], "target": 2}),
        ]);
        sub.cases[1].is_custom = true;
        let orch = orchestrator(
            CompileOutcome { success: true, output: String::new() },
            Some(success_outcome(
                "TEST_CASE_RESULT: 0,[0,1],5,\nTEST_CASE_RESULT: 1,[0,1],6,\n",
            )),
        );
        let report = orch.execute(&sub, || async {}).await;
        assert!(!report.cases[0].is_custom);
        assert!(report.cases[1].is_custom);
    }

    #[tokio::test]
    async fn compile_log_prefixes_runtime_log() {
        let sub = two_sum_submission(vec![json!({"nums": [1], "target": 1})]);
        let orch = orchestrator(
            CompileOutcome { success: true, output: "Note: uses unchecked operations".to_string() },
            Some(success_outcome("TEST_CASE_RESULT: 0,[0,1],5,\n")),
        );
        let report = orch.execute(&sub, || async {}).await;
        assert!(report.log.starts_with("Note: uses unchecked operations\n"));
        assert!(report.log.contains("TEST_CASE_RESULT: 0"));
    }
}
