mod compiler;
mod harness;
mod languages;
mod memory;
mod orchestrator;
mod pool;
mod protocol;
mod sandbox;
mod submission;
mod worker;


use compiler::DockerCompiler;
use crucible_common::config::EngineConfig;
use languages::LanguageRegistry;
use orchestrator::Orchestrator;
use pool::WorkerPool;
use sandbox::DockerSandbox;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Crucible worker booting");

    let cfg = EngineConfig::from_env();
    let registry = LanguageRegistry::load_default()?;
    info!(languages = ?registry.names(), "language profiles loaded");

    let client = redis::Client::open(cfg.redis_url.as_str())?;
    info!(redis = %cfg.redis_url, "connecting to Redis");

    let orchestrator = Arc::new(Orchestrator::new(
        DockerCompiler {
            timeout: cfg.compile_timeout(),
        },
        DockerSandbox::new(cfg.execution_memory_mib, cfg.execution_timeout()),
        registry,
    ));

    let pool = WorkerPool::start(&cfg, &client, orchestrator).await?;
    info!(
        workers = cfg.worker_count,
        queue = %cfg.queue_name,
        "worker pool started"
    );

    signal::ctrl_c().await?;
    info!("shutdown signal received, draining in-flight jobs");

    let mut conn = redis::aio::ConnectionManager::new(client).await?;
    pool.shutdown(&mut conn, Duration::from_secs(cfg.shutdown_grace_seconds))
        .await;
    info!("worker shutdown complete");
    Ok(())
}
