//! Worker Pool
//!
//! Background loops that each pull job ids from their own [`JobSource`] and
//! execute them one at a time inside a root fixture scope of their own.
//! Job failures, step panics included, are logged and counted; a source
//! failure ends that worker.

use super::{execute, RuntimeContext};
use crate::config::WorkerConfig;
use crate::error::RuntimeError;
use crate::queue::JobSource;
use crate::fixture::with_root_scope;
use crate::workflow::Workflow;
use futures::FutureExt;
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counters shared by every worker in a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
    /// Workers whose source failed and who have exited.
    pub stopped: usize,
}

pub struct WorkerPool {
    workflow: Arc<Workflow>,
    ctx: RuntimeContext,
    config: WorkerConfig,
    workers: Arc<RwLock<Vec<JoinHandle<()>>>>,
    running: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
    stats: Arc<RwLock<WorkerStats>>,
}

impl WorkerPool {
    pub fn new(workflow: Arc<Workflow>, ctx: RuntimeContext, config: WorkerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            workflow,
            ctx,
            config,
            workers: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(RwLock::new(false)),
            shutdown,
            stats: Arc::new(RwLock::new(WorkerStats::default())),
        }
    }

    /// Start `config.count` workers. `make_source` is called once per
    /// worker with its index.
    pub fn start<S, F>(&self, mut make_source: F) -> Result<(), RuntimeError>
    where
        S: JobSource + 'static,
        F: FnMut(usize) -> S,
    {
        if self.config.count == 0 {
            return Err(RuntimeError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }

        let mut running = self.running.write();
        if *running {
            return Ok(());
        }
        *running = true;
        drop(running);
        self.shutdown.send_replace(false);

        let mut workers = self.workers.write();
        for i in 0..self.config.count {
            let source = make_source(i);
            let workflow = Arc::clone(&self.workflow);
            let ctx = self.ctx.clone();
            let shutdown = self.shutdown.subscribe();
            let stats = Arc::clone(&self.stats);

            let handle = tokio::spawn(with_root_scope(worker_loop(
                i, source, workflow, ctx, shutdown, stats,
            )));
            workers.push(handle);
        }

        info!(
            worker_count = workers.len(),
            workflow = %self.workflow.name(),
            "Started workflow workers"
        );
        Ok(())
    }

    /// Signal every worker to stop and wait for them. A job already in
    /// progress is allowed to finish.
    pub async fn stop(&self) {
        let mut running = self.running.write();
        if !*running {
            return;
        }
        *running = false;
        drop(running);

        self.shutdown.send_replace(true);
        self.join_workers().await;
        info!("Stopped workflow workers");
    }

    /// Wait until every worker has exited on its own, e.g. because its
    /// source closed.
    pub async fn join(&self) {
        self.join_workers().await;
        *self.running.write() = false;
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.read().clone()
    }

    async fn join_workers(&self) {
        let workers = std::mem::take(&mut *self.workers.write());
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop<S: JobSource>(
    worker_id: usize,
    mut source: S,
    workflow: Arc<Workflow>,
    ctx: RuntimeContext,
    mut shutdown: watch::Receiver<bool>,
    stats: Arc<RwLock<WorkerStats>>,
) {
    debug!(worker_id, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            next = source.next_id() => next,
        };

        let job_id = match next {
            Ok(id) => id,
            Err(e) => {
                error!(worker_id, error = %e, "Job source failed, worker exiting");
                stats.write().stopped += 1;
                break;
            }
        };

        stats.write().processing += 1;
        let started = Instant::now();
        let outcome = AssertUnwindSafe(execute(&job_id, &workflow, &ctx))
            .catch_unwind()
            .await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        {
            let mut counters = stats.write();
            counters.processing -= 1;
            match outcome {
                Ok(Ok(_)) => {
                    counters.completed += 1;
                    debug!(worker_id, job_id = %job_id, duration_ms, "Job completed");
                }
                Ok(Err(e)) => {
                    counters.failed += 1;
                    error!(worker_id, job_id = %job_id, duration_ms, error = %e, "Job failed");
                }
                Err(_) => {
                    counters.failed += 1;
                    error!(worker_id, job_id = %job_id, duration_ms, "Job panicked outside its steps");
                }
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}
