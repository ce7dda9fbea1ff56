//! Persistent FIFO job queue in a sled tree.

use super::JobSource;
use crate::error::{QueueError, StoreError};
use crate::store::persistence::to_store_io;
use crate::store::JobId;
use async_trait::async_trait;
use sled::{Db, Tree};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Ids are keyed by [`Db::generate_id`] so `pop_min` returns the oldest.
/// Clones share the same tree and closed flag; each consumer loop should
/// hold its own clone.
#[derive(Clone)]
pub struct SledJobQueue {
    db: Db,
    tree: Tree,
    poll_interval: Duration,
    closed: Arc<AtomicBool>,
}

impl SledJobQueue {
    pub fn new(db: Db, tree: &str, poll_interval: Duration) -> Result<Self, StoreError> {
        let tree = db.open_tree(tree).map_err(to_store_io)?;
        Ok(Self {
            db,
            tree,
            poll_interval,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Enqueue a job id at the back.
    pub fn push(&self, job_id: impl Into<JobId>) -> Result<(), StoreError> {
        let job_id = job_id.into();
        let seq = self.db.generate_id().map_err(to_store_io)?;
        self.tree
            .insert(seq.to_be_bytes(), job_id.as_bytes())
            .map_err(to_store_io)?;
        debug!(job_id = %job_id, "job enqueued");
        Ok(())
    }

    /// Take the oldest id without waiting.
    pub fn pop(&self) -> Result<Option<JobId>, StoreError> {
        let Some((_, value)) = self.tree.pop_min().map_err(to_store_io)? else {
            return Ok(None);
        };
        let id = String::from_utf8(value.to_vec())
            .map_err(|e| StoreError::Data(format!("Invalid job id in queue: {}", e)))?;
        Ok(Some(id))
    }

    /// Queued ids, oldest first.
    pub fn pending(&self) -> Result<Vec<JobId>, StoreError> {
        let mut out = Vec::new();
        for result in self.tree.iter().values() {
            let value = result.map_err(to_store_io)?;
            out.push(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Mark the queue closed; waiting consumers fail at their next poll.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for SledJobQueue {
    async fn next_id(&mut self) -> Result<JobId, QueueError> {
        loop {
            if self.is_closed() {
                return Err(QueueError::Closed);
            }
            if let Some(id) = self.pop()? {
                return Ok(id);
            }
            trace!("job queue empty, waiting");
            sleep(self.poll_interval).await;
        }
    }
}
