use crate::config::EngineConfig;
use crate::types::{SubmissionRequest, SubmissionState, SubmissionStatus};
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Redis queue semantics - defines only semantics, not runtime logic.
/// Intake pushes on the left, workers block-pop on the right, so the list
/// behaves as a FIFO shared by any number of workers.

pub const ACTIVE_WORKERS_KEY: &str = "execution:workers:active";
pub const RUNTIME_SAMPLES_KEY: &str = "execution:stats:runtime-ms";

/// Rolling window backing the health endpoint's average runtime.
const RUNTIME_SAMPLE_WINDOW: isize = 100;

/// Generate the status key for a submission
pub fn status_key(prefix: &str, id: &str) -> String {
    format!("{}{}", prefix, id)
}

fn serde_err(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((
        redis::ErrorKind::TypeError,
        "serialization error",
        e.to_string(),
    ))
}

/// Push a submission onto the queue, assigning an id when the caller did
/// not. The initial QUEUED status is written first; the two writes are not
/// atomic, and workers treat a missing status as a no-op.
pub async fn enqueue(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
    mut request: SubmissionRequest,
) -> RedisResult<String> {
    let id = request
        .submission_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.submission_id = Some(id.clone());

    let status = SubmissionStatus::queued(id.clone());
    set_status(conn, cfg, &status).await?;

    let payload = serde_json::to_string(&request).map_err(serde_err)?;
    let _: () = conn.lpush(&cfg.queue_name, payload).await?;
    Ok(id)
}

/// Blocking pop from the right of the queue. Returns None on timeout so
/// workers can check for shutdown between polls.
pub async fn dequeue_blocking(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
    timeout_seconds: f64,
) -> RedisResult<Option<SubmissionRequest>> {
    let result: Option<(String, String)> = conn.brpop(&cfg.queue_name, timeout_seconds).await?;
    match result {
        Some((_key, payload)) => {
            let request: SubmissionRequest = serde_json::from_str(&payload).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(request))
        }
        None => Ok(None),
    }
}

pub async fn size(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
) -> RedisResult<usize> {
    let len: usize = conn.llen(&cfg.queue_name).await?;
    Ok(len)
}

/// 1-based position of a queued submission, counted from the dequeue end.
/// Linear scan; callers use it only for wait-time hints, so racing a
/// concurrent enqueue is acceptable.
pub async fn position_of(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
    id: &str,
) -> RedisResult<Option<usize>> {
    let entries: Vec<String> = conn.lrange(&cfg.queue_name, 0, -1).await?;
    let len = entries.len();
    for (i, payload) in entries.iter().enumerate() {
        if payload_has_id(payload, id) {
            return Ok(Some(len - i));
        }
    }
    Ok(None)
}

pub fn estimated_wait_ms(queue_size: usize, per_job_ms: u64) -> u64 {
    queue_size as u64 * per_job_ms
}

/// Remove a still-queued submission and mark it CANCELLED. Returns false
/// when the entry is no longer on the queue (a worker already took it).
pub async fn cancel(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
    id: &str,
) -> RedisResult<bool> {
    let entries: Vec<String> = conn.lrange(&cfg.queue_name, 0, -1).await?;
    let Some(payload) = entries.iter().find(|p| payload_has_id(p, id)) else {
        return Ok(false);
    };
    let removed: usize = conn.lrem(&cfg.queue_name, 1, payload).await?;
    if removed == 0 {
        return Ok(false);
    }

    let mut status = get_status(conn, cfg, id)
        .await?
        .unwrap_or_else(|| SubmissionStatus::queued(id.to_string()));
    status.status = SubmissionState::Cancelled;
    status.completed_at = Some(chrono::Utc::now().timestamp_millis());
    set_status(conn, cfg, &status).await?;
    Ok(true)
}

pub async fn get_status(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
    id: &str,
) -> RedisResult<Option<SubmissionStatus>> {
    let payload: Option<String> = conn.get(status_key(&cfg.status_prefix, id)).await?;
    match payload {
        Some(data) => {
            let status: SubmissionStatus = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(status))
        }
        None => Ok(None),
    }
}

/// Write a status record with the configured TTL.
pub async fn set_status(
    conn: &mut redis::aio::ConnectionManager,
    cfg: &EngineConfig,
    status: &SubmissionStatus,
) -> RedisResult<()> {
    let key = status_key(&cfg.status_prefix, &status.submission_id);
    let payload = serde_json::to_string(status).map_err(serde_err)?;
    let _: () = conn.set_ex(key, payload, cfg.status_ttl_seconds).await?;
    Ok(())
}

/// Publish the supervisor's current active worker count for the health
/// endpoint, which runs in a different process.
pub async fn set_active_workers(
    conn: &mut redis::aio::ConnectionManager,
    count: usize,
) -> RedisResult<()> {
    let _: () = conn.set(ACTIVE_WORKERS_KEY, count).await?;
    Ok(())
}

pub async fn get_active_workers(conn: &mut redis::aio::ConnectionManager) -> RedisResult<usize> {
    let count: Option<usize> = conn.get(ACTIVE_WORKERS_KEY).await?;
    Ok(count.unwrap_or(0))
}

/// Record one completed submission's runtime for the rolling average.
pub async fn push_runtime_sample(
    conn: &mut redis::aio::ConnectionManager,
    runtime_ms: u64,
) -> RedisResult<()> {
    let _: () = conn.lpush(RUNTIME_SAMPLES_KEY, runtime_ms).await?;
    let _: () = conn
        .ltrim(RUNTIME_SAMPLES_KEY, 0, RUNTIME_SAMPLE_WINDOW - 1)
        .await?;
    Ok(())
}

pub async fn avg_runtime_ms(conn: &mut redis::aio::ConnectionManager) -> RedisResult<Option<f64>> {
    let samples: Vec<u64> = conn.lrange(RUNTIME_SAMPLES_KEY, 0, -1).await?;
    if samples.is_empty() {
        return Ok(None);
    }
    let sum: u64 = samples.iter().sum();
    Ok(Some(sum as f64 / samples.len() as f64))
}

/// Cheap membership test on a queued payload without a full deserialize.
fn payload_has_id(payload: &str, id: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => value
            .get("submissionId")
            .and_then(|v| v.as_str())
            .map(|v| v == id)
            .unwrap_or(false),
        Err(_) => false,
    }
}
