//! Worker-pool supervisor: spawns the configured number of workers, tracks
//! the active count, and drains in-flight jobs within a grace period on
//! shutdown.

use crate::compiler::Compiler;
use crate::orchestrator::Orchestrator;
use crate::sandbox::Sandbox;
use crate::worker::Worker;
use crucible_common::config::EngineConfig;
use crucible_common::queue;
use futures_util::future::join_all;
use redis::aio::ConnectionManager;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<(String, JoinHandle<()>)>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Each worker gets its own connection: the blocking pop parks a
    /// connection server-side, so sharing one multiplexed manager would
    /// serialize the whole pool.
    pub async fn start<C, S>(
        cfg: &EngineConfig,
        client: &redis::Client,
        orchestrator: Arc<Orchestrator<C, S>>,
    ) -> redis::RedisResult<Self>
    where
        C: Compiler + 'static,
        S: Sandbox + 'static,
    {
        let (shutdown_tx, _) = watch::channel(false);
        let active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(cfg.worker_count);

        for i in 0..cfg.worker_count {
            let worker_id = format!("worker-{}", i + 1);
            let conn = ConnectionManager::new(client.clone()).await?;
            let worker = Worker::new(
                worker_id.clone(),
                conn,
                cfg.clone(),
                Arc::clone(&orchestrator),
            );
            let shutdown_rx = shutdown_tx.subscribe();
            let active = Arc::clone(&active);
            let handle = tokio::spawn(async move {
                active.fetch_add(1, Ordering::SeqCst);
                worker.run(shutdown_rx).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
            handles.push((worker_id, handle));
        }

        // Publish the count for the health endpoint in the API process.
        let mut conn = ConnectionManager::new(client.clone()).await?;
        if let Err(e) = queue::set_active_workers(&mut conn, cfg.worker_count).await {
            warn!(error = %e, "failed to publish active worker count");
        }

        Ok(WorkerPool {
            shutdown_tx,
            handles,
            active,
        })
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop polling and wait for in-flight jobs up to the grace period;
    /// anything still running after that is aborted.
    pub async fn shutdown(mut self, conn: &mut ConnectionManager, grace: Duration) {
        let _ = self.shutdown_tx.send(true);
        let drain = join_all(self.handles.iter_mut().map(|(_, handle)| handle));
        if tokio::time::timeout(grace, drain).await.is_err() {
            for (worker_id, handle) in &self.handles {
                if !handle.is_finished() {
                    warn!(worker_id = %worker_id, "grace period expired, aborting worker");
                    handle.abort();
                }
            }
        }
        if let Err(e) = queue::set_active_workers(conn, 0).await {
            warn!(error = %e, "failed to clear active worker count");
        }
        info!("worker pool drained");
    }
}
