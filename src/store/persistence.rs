//! Sled-backed job store.

use crate::error::StoreError;
use crate::store::{JobDocument, JobStore, StatusRecord, StatusUpdate};
use async_trait::async_trait;
use chrono::Utc;
use sled::{Db, Tree};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const TREE_JOBS: &str = "jobs";
const TREE_STATUS: &str = "job_status";

/// Job documents in one tree, status entries in another.
///
/// Status keys are `len(job_id) job_id seq`, with the length and `seq` (from
/// [`Db::generate_id`]) in big-endian form. The length makes one job's prefix
/// never a prefix of another's, a prefix scan returns a job's entries in
/// append order, and each append is a single insert.
#[derive(Clone)]
pub struct SledJobStore {
    db: Db,
    jobs: Tree,
    status: Tree,
}

impl SledJobStore {
    /// Open (or create) a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(to_store_io)?;
        Self::new(db)
    }

    pub fn new(db: Db) -> Result<Self, StoreError> {
        let jobs = db.open_tree(TREE_JOBS).map_err(to_store_io)?;
        let status = db.open_tree(TREE_STATUS).map_err(to_store_io)?;
        Ok(Self { db, jobs, status })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StoreError> {
        Ok(Arc::new(Self::new(db)?))
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Insert a new job. Fails with `JobExists` if the id is taken.
    ///
    /// Any status entries already on `doc` are appended in order.
    pub fn insert_job(&self, doc: &JobDocument) -> Result<(), StoreError> {
        let mut head = doc.clone();
        let existing = std::mem::take(&mut head.status);
        let value = serde_json::to_vec(&head).map_err(to_store_data)?;

        self.jobs
            .compare_and_swap(doc.id.as_bytes(), None as Option<&[u8]>, Some(value))
            .map_err(to_store_io)?
            .map_err(|_| StoreError::JobExists(doc.id.clone()))?;

        for record in &existing {
            self.append_record(&doc.id, record)?;
        }
        debug!(job_id = %doc.id, "inserted job");
        Ok(())
    }

    /// Load a job with its status log, or `None` if it does not exist.
    pub fn get_job(&self, job_id: &str) -> Result<Option<JobDocument>, StoreError> {
        let Some(raw) = self.jobs.get(job_id.as_bytes()).map_err(to_store_io)? else {
            return Ok(None);
        };
        let mut doc: JobDocument = serde_json::from_slice(&raw).map_err(to_store_data)?;
        doc.status = self.status_log(job_id)?;
        Ok(Some(doc))
    }

    /// A job's status entries in append order.
    pub fn status_log(&self, job_id: &str) -> Result<Vec<StatusRecord>, StoreError> {
        let prefix = status_prefix(job_id);
        let mut out = Vec::new();
        for result in self.status.scan_prefix(&prefix) {
            let (_, value) = result.map_err(to_store_io)?;
            out.push(serde_json::from_slice(&value).map_err(to_store_data)?);
        }
        Ok(out)
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Result<Vec<JobDocument>, StoreError> {
        let mut out = Vec::new();
        for result in self.jobs.iter() {
            let (_, value) = result.map_err(to_store_io)?;
            let mut doc: JobDocument = serde_json::from_slice(&value).map_err(to_store_data)?;
            doc.status = self.status_log(&doc.id)?;
            out.push(doc);
        }
        out.sort_by_key(|d| std::cmp::Reverse(d.created_at));
        Ok(out)
    }

    /// Remove a job and its status log. Returns false if it did not exist.
    pub fn delete_job(&self, job_id: &str) -> Result<bool, StoreError> {
        let removed = self.jobs.remove(job_id.as_bytes()).map_err(to_store_io)?;
        let keys: Vec<sled::IVec> = self
            .status
            .scan_prefix(status_prefix(job_id))
            .keys()
            .collect::<Result<_, _>>()
            .map_err(to_store_io)?;
        for key in keys {
            self.status.remove(key).map_err(to_store_io)?;
        }
        Ok(removed.is_some())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(to_store_io)?;
        Ok(())
    }

    fn append_record(&self, job_id: &str, record: &StatusRecord) -> Result<(), StoreError> {
        let seq = self.db.generate_id().map_err(to_store_io)?;
        let value = serde_json::to_vec(record).map_err(to_store_data)?;
        self.status
            .insert(status_key(job_id, seq), value)
            .map_err(to_store_io)?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for SledJobStore {
    async fn find_job(&self, job_id: &str) -> Result<JobDocument, StoreError> {
        self.get_job(job_id)?
            .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))
    }

    async fn append_status(&self, job_id: &str, update: StatusUpdate) -> Result<(), StoreError> {
        if !self.jobs.contains_key(job_id.as_bytes()).map_err(to_store_io)? {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }
        let record = StatusRecord {
            status: update,
            timestamp: Utc::now(),
        };
        self.append_record(job_id, &record)
    }
}

fn status_prefix(job_id: &str) -> Vec<u8> {
    let len = u64::try_from(job_id.len()).unwrap_or(u64::MAX);
    let mut prefix = Vec::with_capacity(job_id.len() + 8);
    prefix.extend_from_slice(&len.to_be_bytes());
    prefix.extend_from_slice(job_id.as_bytes());
    prefix
}

fn status_key(job_id: &str, seq: u64) -> Vec<u8> {
    let mut key = status_prefix(job_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub(crate) fn to_store_io(err: sled::Error) -> StoreError {
    StoreError::Io(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn to_store_data(err: serde_json::Error) -> StoreError {
    StoreError::Data(err.to_string())
}
