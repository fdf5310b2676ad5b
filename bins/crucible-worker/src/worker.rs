//! The per-worker loop: block on the queue, validate, drive the
//! orchestrator, translate to the caller-visible shape, store. An error in
//! one iteration only aborts that submission, never the worker.

use crate::compiler::Compiler;
use crate::orchestrator::{ExecutionReport, Orchestrator, OverallStatus};
use crate::sandbox::Sandbox;
use crate::submission::{CaseInput, CodeSubmission};
use crucible_common::config::EngineConfig;
use crucible_common::queue;
use crucible_common::types::{
    QuestionMetadata, SubmissionRequest, SubmissionState, SubmissionStatus, TestCaseResult,
};
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct Worker<C, S> {
    pub id: String,
    conn: ConnectionManager,
    cfg: EngineConfig,
    orchestrator: Arc<Orchestrator<C, S>>,
}

impl<C: Compiler, S: Sandbox> Worker<C, S> {
    pub fn new(
        id: String,
        conn: ConnectionManager,
        cfg: EngineConfig,
        orchestrator: Arc<Orchestrator<C, S>>,
    ) -> Self {
        Worker {
            id,
            conn,
            cfg,
            orchestrator,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.id, "worker started");
        loop {
            let popped = tokio::select! {
                _ = shutdown.changed() => break,
                popped = queue::dequeue_blocking(
                    &mut self.conn,
                    &self.cfg,
                    self.cfg.poll_timeout_seconds as f64,
                ) => popped,
            };
            match popped {
                Ok(Some(request)) => self.process(request).await,
                Ok(None) => continue,
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "queue poll failed");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            }
        }
        info!(worker_id = %self.id, "worker stopped");
    }

    async fn process(&mut self, request: SubmissionRequest) {
        let id = request
            .submission_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(
            worker_id = %self.id,
            submission_id = %id,
            language = %request.language,
            test_cases = request.total_cases(),
            "picked up submission"
        );

        let mut status = match queue::get_status(&mut self.conn, &self.cfg, &id).await {
            Ok(Some(existing)) => existing,
            Ok(None) => SubmissionStatus::queued(id.clone()),
            Err(e) => {
                warn!(submission_id = %id, error = %e, "status read failed, starting fresh");
                SubmissionStatus::queued(id.clone())
            }
        };
        status.worker_id = Some(self.id.clone());

        let Some(metadata) = validate_metadata(&request) else {
            status.status = SubmissionState::Failed;
            status.error_message = Some("Missing execution metadata".to_string());
            status.completed_at = Some(chrono::Utc::now().timestamp_millis());
            self.store(&status).await;
            return;
        };

        status.status = SubmissionState::Compiling;
        status.started_at = Some(chrono::Utc::now().timestamp_millis());
        self.store(&status).await;

        let submission = CodeSubmission {
            id: id.clone(),
            language: request.language,
            source_code: request.source_code.clone(),
            metadata,
            cases: merge_cases(&request),
        };

        let mut running_conn = self.conn.clone();
        let running_cfg = self.cfg.clone();
        let mut running_status = status.clone();
        let report = self
            .orchestrator
            .execute(&submission, move || async move {
                running_status.status = SubmissionState::Running;
                if let Err(e) =
                    queue::set_status(&mut running_conn, &running_cfg, &running_status).await
                {
                    warn!(error = %e, "failed to write RUNNING status");
                }
            })
            .await;

        let final_status = finalize_status(status, &report);
        if final_status.status == SubmissionState::Completed {
            if let Some(runtime_ms) = final_status.runtime_ms {
                if let Err(e) = queue::push_runtime_sample(&mut self.conn, runtime_ms).await {
                    warn!(error = %e, "failed to record runtime sample");
                }
            }
        }
        info!(
            worker_id = %self.id,
            submission_id = %id,
            status = ?final_status.status,
            error_message = final_status.error_message.as_deref().unwrap_or(""),
            runtime_ms = final_status.runtime_ms.unwrap_or(0),
            "submission finished"
        );
        self.store(&final_status).await;
    }

    async fn store(&mut self, status: &SubmissionStatus) {
        if let Err(e) = queue::set_status(&mut self.conn, &self.cfg, status).await {
            error!(
                submission_id = %status.submission_id,
                error = %e,
                "failed to write status"
            );
        }
    }
}

/// Metadata must be present and carry a usable signature.
fn validate_metadata(request: &SubmissionRequest) -> Option<QuestionMetadata> {
    let metadata = request.metadata.as_ref()?;
    if metadata.function_name.trim().is_empty() || metadata.package_name.trim().is_empty() {
        return None;
    }
    Some(metadata.clone())
}

/// Officials first, customs after, each element tagged with its origin.
fn merge_cases(request: &SubmissionRequest) -> Vec<CaseInput> {
    let mut cases = Vec::with_capacity(request.total_cases());
    for input in &request.test_cases {
        let tagged = input
            .get("isCustom")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        cases.push(CaseInput {
            input: input.clone(),
            is_custom: tagged,
        });
    }
    for input in &request.custom_test_cases {
        cases.push(CaseInput {
            input: input.clone(),
            is_custom: true,
        });
    }
    cases
}

/// Map the internal report onto the public record. `passed` stays null on
/// every entry; the engine does not judge.
fn finalize_status(mut status: SubmissionStatus, report: &ExecutionReport) -> SubmissionStatus {
    let results: Vec<TestCaseResult> = report
        .cases
        .iter()
        .map(|c| TestCaseResult {
            index: c.index,
            passed: None,
            actual_output: c.actual_output.clone(),
            execution_time_ms: c.execution_time_ms,
            memory_bytes: c.memory_bytes,
            error: c.error.clone(),
            error_type: c.error_type.clone(),
            is_custom: c.is_custom,
        })
        .collect();

    match report.overall {
        OverallStatus::CompilationError => {
            status.status = SubmissionState::Failed;
            status.error_message = Some("COMPILATION_ERROR".to_string());
            status.test_case_results = Vec::new();
        }
        OverallStatus::InternalError => {
            status.status = SubmissionState::Failed;
            status.error_message = Some("INTERNAL_ERROR".to_string());
            status.test_case_results = Vec::new();
        }
        OverallStatus::Timeout => {
            status.status = SubmissionState::Completed;
            status.error_message = Some("TIME_LIMIT_EXCEEDED".to_string());
            status.test_case_results = results;
        }
        OverallStatus::RuntimeError => {
            status.status = SubmissionState::Completed;
            status.error_message = Some("RUNTIME_ERROR".to_string());
            status.test_case_results = results;
        }
        OverallStatus::Success => {
            status.status = SubmissionState::Completed;
            status.error_message = None;
            status.test_case_results = results;
        }
    }

    if status.status == SubmissionState::Completed {
        status.runtime_ms = Some(
            status
                .test_case_results
                .iter()
                .map(|r| r.execution_time_ms)
                .sum(),
        );
        status.memory_kb = status
            .test_case_results
            .iter()
            .filter_map(|r| r.memory_bytes)
            .max()
            .map(|bytes| bytes / 1024);
    }
    if report.overall != OverallStatus::Success && !report.log.is_empty() {
        status.compilation_output = Some(report.log.clone());
    }
    status.completed_at = Some(chrono::Utc::now().timestamp_millis());
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::CaseOutcome;
    use crucible_common::types::Language;
    use serde_json::json;

    fn request(metadata: Option<QuestionMetadata>) -> SubmissionRequest {
        SubmissionRequest {
            submission_id: Some("sub-1".to_string()),
            language: Language::Java,
            source_code: "class Solution {}".to_string(),
            metadata,
            test_cases: vec![json!({"nums": [1], "target": 1})],
            custom_test_cases: vec![json!({"nums": [2], "target": 2})],
        }
    }

    fn metadata() -> QuestionMetadata {
        QuestionMetadata {
            package_name: "com.example".to_string(),
            function_name: "twoSum".to_string(),
            return_type: "int[]".to_string(),
            parameters: Vec::new(),
            custom_data_structures: Vec::new(),
            question_type: Default::default(),
            mutation_target: None,
            serialization_strategy: None,
        }
    }

    fn outcome(index: usize, ms: u64, memory: Option<u64>) -> CaseOutcome {
        CaseOutcome {
            index,
            actual_output: Some("[0,1]".to_string()),
            execution_time_ms: ms,
            memory_bytes: memory,
            error: None,
            error_type: None,
            is_custom: false,
        }
    }

    #[test]
    fn merge_keeps_officials_first() {
        let req = request(Some(metadata()));
        let merged = merge_cases(&req);
        assert_eq!(merged.len(), 2);
        assert!(!merged[0].is_custom);
        assert!(merged[1].is_custom);
        assert_eq!(merged[0].input["nums"], json!([1]));
        assert_eq!(merged[1].input["nums"], json!([2]));
    }

    #[test]
    fn official_cases_honor_inline_tag() {
        let mut req = request(Some(metadata()));
        req.test_cases = vec![json!({"nums": [1], "isCustom": true})];
        req.custom_test_cases.clear();
        let merged = merge_cases(&req);
        assert!(merged[0].is_custom);
    }

    #[test]
    fn only_custom_cases_is_not_special_cased() {
        let mut req = request(Some(metadata()));
        req.test_cases.clear();
        let merged = merge_cases(&req);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_custom);
    }

    #[test]
    fn missing_metadata_is_rejected() {
        assert!(validate_metadata(&request(None)).is_none());
        let mut empty = metadata();
        empty.function_name = "  ".to_string();
        assert!(validate_metadata(&request(Some(empty))).is_none());
        assert!(validate_metadata(&request(Some(metadata()))).is_some());
    }

    #[test]
    fn success_report_completes_with_aggregates() {
        let report = ExecutionReport {
            overall: OverallStatus::Success,
            log: "TEST_CASE_RESULT: 0,[0,1],12,".to_string(),
            cases: vec![
                outcome(0, 12, Some(13_000_000)),
                outcome(1, 8, Some(9_000_000)),
            ],
        };
        let status = finalize_status(SubmissionStatus::queued("s".to_string()), &report);
        assert_eq!(status.status, SubmissionState::Completed);
        assert!(status.error_message.is_none());
        assert_eq!(status.runtime_ms, Some(20));
        assert_eq!(status.memory_kb, Some(13_000_000 / 1024));
        assert!(status.compilation_output.is_none());
        assert!(status.completed_at.is_some());
        assert!(status.test_case_results.iter().all(|r| r.passed.is_none()));
        for (i, result) in status.test_case_results.iter().enumerate() {
            assert_eq!(result.index, i);
        }
    }

    #[test]
    fn compile_error_fails_with_empty_results() {
        let report = ExecutionReport {
            overall: OverallStatus::CompilationError,
            log: "error: ';' expected".to_string(),
            cases: Vec::new(),
        };
        let status = finalize_status(SubmissionStatus::queued("s".to_string()), &report);
        assert_eq!(status.status, SubmissionState::Failed);
        assert_eq!(status.error_message.as_deref(), Some("COMPILATION_ERROR"));
        assert!(status.test_case_results.is_empty());
        assert_eq!(status.compilation_output.as_deref(), Some("error: ';' expected"));
        assert!(status.runtime_ms.is_none());
    }

    #[test]
    fn timeout_completes_with_tle_message() {
        let report = ExecutionReport {
            overall: OverallStatus::Timeout,
            log: String::new(),
            cases: vec![CaseOutcome {
                index: 0,
                actual_output: None,
                execution_time_ms: 10_020,
                memory_bytes: None,
                error: Some("wall-clock limit reached".to_string()),
                error_type: Some("TimeLimitExceeded".to_string()),
                is_custom: false,
            }],
        };
        let status = finalize_status(SubmissionStatus::queued("s".to_string()), &report);
        assert_eq!(status.status, SubmissionState::Completed);
        assert_eq!(status.error_message.as_deref(), Some("TIME_LIMIT_EXCEEDED"));
        assert_eq!(status.runtime_ms, Some(10_020));
        assert!(status.memory_kb.is_none());
    }

    #[test]
    fn per_case_errors_do_not_fail_the_submission() {
        let report = ExecutionReport {
            overall: OverallStatus::RuntimeError,
            log: String::new(),
            cases: vec![
                outcome(0, 5, None),
                CaseOutcome {
                    index: 1,
                    actual_output: None,
                    execution_time_ms: 3,
                    memory_bytes: None,
                    error: Some("Index 0 out of bounds for length 0".to_string()),
                    error_type: Some("ArrayIndexOutOfBoundsException".to_string()),
                    is_custom: false,
                },
            ],
        };
        let status = finalize_status(SubmissionStatus::queued("s".to_string()), &report);
        assert_eq!(status.status, SubmissionState::Completed);
        assert_eq!(status.error_message.as_deref(), Some("RUNTIME_ERROR"));
        assert_eq!(status.test_case_results.len(), 2);
        assert_eq!(
            status.test_case_results[1].error_type.as_deref(),
            Some("ArrayIndexOutOfBoundsException")
        );
    }

    #[test]
    fn internal_error_fails() {
        let report = ExecutionReport {
            overall: OverallStatus::InternalError,
            log: "internal error: docker daemon unreachable".to_string(),
            cases: Vec::new(),
        };
        let status = finalize_status(SubmissionStatus::queued("s".to_string()), &report);
        assert_eq!(status.status, SubmissionState::Failed);
        assert_eq!(status.error_message.as_deref(), Some("INTERNAL_ERROR"));
    }
}
