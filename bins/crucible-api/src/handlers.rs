// HTTP route handlers for the Crucible intake API

use crate::metrics;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use crucible_common::queue;
use crucible_common::types::SubmissionRequest;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub submission_id: String,
    pub status: &'static str,
    pub queue_position: Option<usize>,
    pub estimated_wait_time_ms: u64,
    pub status_url: String,
    pub results_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
    pub submission_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_size: usize,
    pub active_workers: usize,
    pub avg_execution_time_ms: Option<f64>,
}

/// Field-level validation; the worker re-checks metadata on its side.
fn validate(request: &SubmissionRequest) -> Result<(), &'static str> {
    let Some(metadata) = &request.metadata else {
        return Err("metadata is required");
    };
    if metadata.function_name.trim().is_empty() {
        return Err("metadata.functionName must not be empty");
    }
    if metadata.package_name.trim().is_empty() {
        return Err("metadata.packageName must not be empty");
    }
    // an all-custom submission is still a submission
    if request.total_cases() == 0 {
        return Err("at least one test case is required");
    }
    Ok(())
}

/// POST /submit - enqueue a submission for execution
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmissionRequest>,
) -> impl IntoResponse {
    if let Err(reason) = validate(&request) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": reason })),
        )
            .into_response();
    }

    let mut conn = state.redis.clone();
    let language = request.language;
    let total_cases = request.total_cases();
    match queue::enqueue(&mut conn, &state.cfg, request).await {
        Ok(id) => {
            metrics::SUBMISSIONS_RECEIVED.inc();
            let queue_position = queue::position_of(&mut conn, &state.cfg, &id)
                .await
                .unwrap_or(None);
            let queue_size = queue::size(&mut conn, &state.cfg).await.unwrap_or(0);
            info!(
                submission_id = %id,
                language = %language,
                test_cases = total_cases,
                queue_position = queue_position.unwrap_or(0),
                "submission queued"
            );
            (
                StatusCode::ACCEPTED,
                Json(SubmitResponse {
                    submission_id: id.clone(),
                    status: "QUEUED",
                    queue_position,
                    estimated_wait_time_ms: queue::estimated_wait_ms(
                        queue_size,
                        state.cfg.estimated_wait_per_job_ms,
                    ),
                    status_url: format!("/status/{}", id),
                    results_url: format!("/results/{}", id),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to enqueue submission");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to enqueue submission" })),
            )
                .into_response()
        }
    }
}

/// GET /status/{id} - current submission status record
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut conn = state.redis.clone();
    match queue::get_status(&mut conn, &state.cfg, &id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown submission id", "submissionId": id })),
        )
            .into_response(),
        Err(e) => {
            error!(submission_id = %id, error = %e, "status read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to read status" })),
            )
                .into_response()
        }
    }
}

/// GET /results/{id} - same record; clients call this once terminal
pub async fn results(
    state: State<Arc<AppState>>,
    id: Path<String>,
) -> impl IntoResponse {
    status(state, id).await
}

/// DELETE /cancel/{id} - remove from the queue while still QUEUED
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut conn = state.redis.clone();
    match queue::cancel(&mut conn, &state.cfg, &id).await {
        Ok(true) => {
            info!(submission_id = %id, "submission cancelled");
            (
                StatusCode::OK,
                Json(CancelResponse {
                    success: true,
                    message: "submission cancelled".to_string(),
                    submission_id: id,
                }),
            )
                .into_response()
        }
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(CancelResponse {
                success: false,
                message: "submission is no longer queued".to_string(),
                submission_id: id,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(submission_id = %id, error = %e, "cancel failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CancelResponse {
                    success: false,
                    message: "cancel failed".to_string(),
                    submission_id: id,
                }),
            )
                .into_response()
        }
    }
}

/// GET /health - queue depth, worker count, rolling average runtime
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut conn = state.redis.clone();
    let queue_size = queue::size(&mut conn, &state.cfg).await.unwrap_or(0);
    let active_workers = queue::get_active_workers(&mut conn).await.unwrap_or(0);
    let avg_execution_time_ms = queue::avg_runtime_ms(&mut conn).await.unwrap_or(None);
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "UP",
            queue_size,
            active_workers,
            avg_execution_time_ms,
        }),
    )
}

/// GET /metrics - prometheus text exposition
pub async fn metrics() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            error!(error = %e, "metrics rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response()
        }
    }
}
