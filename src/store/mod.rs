//! Job Store
//!
//! Persisted job records: one document per job id plus an append-only log
//! of status updates. The runtime only ever reads a document and appends
//! status entries to it.

pub mod persistence;

pub use persistence::SledJobStore;

use crate::error::StoreError;
use crate::workflow::Stage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// External identifier of a job.
pub type JobId = String;

/// Shared handle to a job store.
pub type SharedJobStore = Arc<dyn JobStore>;

/// Lifecycle state recorded with each status entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Running,
    Complete,
    Error,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Error => "error",
        }
    }
}

/// A status update to append to a job record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub progress: f64,
    pub update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    /// A plain running-state message with no step context.
    pub fn message(update: impl Into<String>) -> Self {
        Self {
            state: JobState::Running,
            stage: None,
            step: None,
            progress: 0.0,
            update: update.into(),
            error: None,
        }
    }
}

/// A status update as persisted, with its append timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(flatten)]
    pub status: StatusUpdate,
    pub timestamp: DateTime<Utc>,
}

/// A persisted job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDocument {
    pub id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(default)]
    pub args: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Vec<StatusRecord>,
}

impl JobDocument {
    pub fn new(id: impl Into<JobId>, args: Value) -> Self {
        Self {
            id: id.into(),
            workflow: None,
            args,
            created_at: Utc::now(),
            status: Vec::new(),
        }
    }

    pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = Some(workflow.into());
        self
    }

    /// The update strings in append order.
    pub fn updates(&self) -> Vec<&str> {
        self.status.iter().map(|s| s.status.update.as_str()).collect()
    }

    /// The most recent status entry.
    pub fn latest(&self) -> Option<&StatusRecord> {
        self.status.last()
    }
}

/// Job store interface
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job with its full status log.
    async fn find_job(&self, job_id: &str) -> Result<JobDocument, StoreError>;

    /// Append one status entry to a job's log. A single append is atomic.
    async fn append_status(&self, job_id: &str, update: StatusUpdate) -> Result<(), StoreError>;
}
