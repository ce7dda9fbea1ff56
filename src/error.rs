//! Error types for the workflow runtime.

use crate::workflow::ExecutionSnapshot;
use thiserror::Error;

/// Boxed error produced by user code (workflow steps, fixture providers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fixture registration and resolution errors
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("No fixture named '{0}' in the current scope")]
    NotFound(String),

    #[error("Fixture '{name}' is not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("No fixture scope is active on this task (cannot register '{0}')")]
    NoActiveScope(String),

    #[error("'{0}' is not marked as a fixture provider")]
    NotAFixture(String),

    #[error("Fixture provider '{name}' failed: {source}")]
    Provider {
        name: String,
        #[source]
        source: BoxError,
    },
}

impl FixtureError {
    /// True for the "name has no provider" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FixtureError::NotFound(_))
    }
}

/// Job store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already exists: {0}")]
    JobExists(String),

    #[error("Store data error: {0}")]
    Data(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Job source errors. `Closed` is fatal for the consuming loop.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue connection closed")]
    Closed,

    #[error("Job queue storage error: {0}")]
    Store(#[from] StoreError),
}

/// The originating failure carried by a [`WorkflowError`].
#[derive(Debug, Error)]
pub enum ErrorCause {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: BoxError,
    },
}

/// A failure during workflow execution, carrying the execution context and
/// the workflow identity. Failure hooks always receive this shape.
#[derive(Debug, Error)]
#[error("Workflow '{workflow}' failed ({context}): {cause}")]
pub struct WorkflowError {
    pub workflow: String,
    pub context: ExecutionSnapshot,
    #[source]
    pub cause: ErrorCause,
}

impl WorkflowError {
    pub fn new(
        workflow: impl Into<String>,
        context: ExecutionSnapshot,
        cause: impl Into<ErrorCause>,
    ) -> Self {
        Self {
            workflow: workflow.into(),
            context,
            cause: cause.into(),
        }
    }
}

/// Top-level errors surfaced to the binary and to queue consumers
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Job {job_id} failed: {source}")]
    Job {
        job_id: String,
        #[source]
        source: WorkflowError,
    },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// A fatal error stops the consumer loop; anything else is per-job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::Queue(_) | RuntimeError::Config(_))
    }
}

impl From<config::ConfigError> for RuntimeError {
    fn from(err: config::ConfigError) -> Self {
        RuntimeError::Config(err.to_string())
    }
}
