//! Configuration System
//!
//! Layered configuration: built-in defaults, the user's global file, the
//! workspace files, then `WORKFLOW_RUNTIME__SECTION__KEY` environment
//! variables. Validation collects every problem instead of stopping at the
//! first one.

use crate::error::RuntimeError;
use crate::logging::{LogOutput, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Application name used for config and data directories.
pub const APP_NAME: &str = "workflow-runtime";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Job store location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Persistent job queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// sled tree holding queued job ids
    #[serde(default = "default_queue_tree")]
    pub tree: String,

    /// How long an idle consumer sleeps between polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

pub(crate) fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".workflow-runtime").join("store"))
}

pub(crate) fn default_queue_tree() -> String {
    "job_queue".to_string()
}

pub(crate) fn default_poll_interval_ms() -> u64 {
    250
}

pub(crate) fn default_worker_count() -> usize {
    1
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tree: default_queue_tree(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

impl WorkerConfig {
    pub fn with_count(count: usize) -> Self {
        Self { count }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Store: {0}")]
    Store(String),

    #[error("Queue: {0}")]
    Queue(String),

    #[error("Workers: {0}")]
    Workers(String),

    #[error("Logging: {0}")]
    Logging(String),
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl RuntimeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.store.path.as_os_str().is_empty() {
            errors.push(ValidationError::Store("path cannot be empty".into()));
        }

        if self.queue.tree.trim().is_empty() {
            errors.push(ValidationError::Queue("tree name cannot be empty".into()));
        }
        if self.queue.poll_interval_ms == 0 {
            errors.push(ValidationError::Queue(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.workers.count == 0 {
            errors.push(ValidationError::Workers("count must be at least 1".into()));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "unknown level '{}'",
                self.logging.level
            )));
        }
        if self.logging.output == LogOutput::File && self.logging.file.as_os_str().is_empty() {
            errors.push(ValidationError::Logging(
                "file output requires a file path".into(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`validate`](Self::validate) with every problem joined into one error.
    pub fn check(&self) -> Result<(), RuntimeError> {
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            RuntimeError::Config(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
