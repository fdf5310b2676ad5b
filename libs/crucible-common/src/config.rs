use std::env;
use std::time::Duration;

/// Engine configuration, read once at boot from the environment. Every knob
/// has a default so a bare `cargo run` against a local Redis works.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub redis_url: String,
    /// Parallel workers started at boot.
    pub worker_count: usize,
    /// Blocking queue pop timeout, seconds.
    pub poll_timeout_seconds: u64,
    /// Wall-clock cap for one sandbox run, seconds.
    pub execution_timeout_seconds: u64,
    /// Bound on one compile container, seconds.
    pub compile_timeout_seconds: u64,
    /// Container memory cap, MiB. Swap is pinned to the same value.
    pub execution_memory_mib: u64,
    pub queue_name: String,
    pub status_prefix: String,
    pub status_ttl_seconds: u64,
    /// Wait allowed for in-flight jobs on shutdown, seconds.
    pub shutdown_grace_seconds: u64,
    /// Per-queued-job constant behind `estimatedWaitTimeMs`.
    pub estimated_wait_per_job_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            worker_count: 5,
            poll_timeout_seconds: 5,
            execution_timeout_seconds: 10,
            compile_timeout_seconds: 30,
            execution_memory_mib: 256,
            queue_name: "execution:queue".to_string(),
            status_prefix: "execution:status:".to_string(),
            status_ttl_seconds: 3600,
            shutdown_grace_seconds: 60,
            estimated_wait_per_job_ms: 3000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            worker_count: env_parse("WORKER_COUNT", defaults.worker_count),
            poll_timeout_seconds: env_parse("WORKER_POLL_TIMEOUT_SECONDS", defaults.poll_timeout_seconds),
            execution_timeout_seconds: env_parse(
                "EXECUTION_TIMEOUT_SECONDS",
                defaults.execution_timeout_seconds,
            ),
            compile_timeout_seconds: env_parse("COMPILE_TIMEOUT_SECONDS", defaults.compile_timeout_seconds),
            execution_memory_mib: env_parse("EXECUTION_MEMORY_MIB", defaults.execution_memory_mib),
            queue_name: env::var("QUEUE_NAME").unwrap_or(defaults.queue_name),
            status_prefix: env::var("QUEUE_STATUS_PREFIX").unwrap_or(defaults.status_prefix),
            status_ttl_seconds: env_parse("QUEUE_STATUS_TTL_SECONDS", defaults.status_ttl_seconds),
            shutdown_grace_seconds: env_parse("SHUTDOWN_GRACE_SECONDS", defaults.shutdown_grace_seconds),
            estimated_wait_per_job_ms: env_parse(
                "ESTIMATED_WAIT_PER_JOB_MS",
                defaults.estimated_wait_per_job_ms,
            ),
        }
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_seconds)
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.worker_count, 5);
        assert_eq!(cfg.poll_timeout_seconds, 5);
        assert_eq!(cfg.execution_timeout_seconds, 10);
        assert_eq!(cfg.execution_memory_mib, 256);
        assert_eq!(cfg.queue_name, "execution:queue");
        assert_eq!(cfg.status_prefix, "execution:status:");
        assert_eq!(cfg.status_ttl_seconds, 3600);
        assert_eq!(cfg.estimated_wait_per_job_ms, 3000);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("CRUCIBLE_TEST_BAD_INT", "not-a-number");
        assert_eq!(env_parse("CRUCIBLE_TEST_BAD_INT", 7usize), 7);
        std::env::remove_var("CRUCIBLE_TEST_BAD_INT");
    }
}
