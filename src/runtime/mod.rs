//! Execution Coordinator
//!
//! Runs one workflow per job id inside its own fixture scope and reports
//! the outcome through run-level hooks. The scope is a copy of the caller's,
//! so ambient fixtures are inherited while everything registered for the
//! job (`job_id`, `job_document`, `database`, `results`) disappears when
//! the job ends.

pub mod relay;
pub mod worker;

pub use relay::UpdateRelay;
pub use worker::{WorkerPool, WorkerStats};

use crate::error::{RuntimeError, WorkflowError};
use crate::fixture::{self, FixtureScope, SharedFixture};
use crate::hooks::Hook;
use crate::queue::JobSource;
use crate::store::{JobId, SharedJobStore};
use crate::workflow::{Workflow, WorkflowExecution};
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Names of the fixtures registered for every job.
pub mod fixture_names {
    pub const JOB_ID: &str = "job_id";
    pub const JOB_DOCUMENT: &str = "job_document";
    pub const DATABASE: &str = "database";
    pub const RESULTS: &str = "results";
}

/// Values a workflow reports back, keyed by name.
pub type WorkflowResults = Map<String, Value>;

/// Shared results map exposed to steps as the `results` fixture.
#[derive(Debug, Clone, Default)]
pub struct Results(Arc<Mutex<WorkflowResults>>);

impl Results {
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.lock().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    pub fn snapshot(&self) -> WorkflowResults {
        self.0.lock().clone()
    }
}

/// Fired inside the job's scope before the job document is loaded.
/// Subscribers may register additional fixtures.
#[derive(Debug, Clone)]
pub struct LoadFixturesEvent {
    pub job_id: JobId,
    pub workflow: String,
}

#[derive(Debug, Clone)]
pub struct SuccessEvent {
    pub job_id: JobId,
    pub workflow: String,
    pub results: WorkflowResults,
}

#[derive(Debug)]
pub struct FailureEvent {
    pub job_id: JobId,
    pub error: WorkflowError,
}

/// Hooks shared by every execution that uses the same context.
#[derive(Debug)]
pub struct RuntimeHooks {
    pub on_load_fixtures: Hook<LoadFixturesEvent>,
    pub on_success: Hook<SuccessEvent>,
    pub on_failure: Hook<FailureEvent>,
}

impl Default for RuntimeHooks {
    fn default() -> Self {
        Self {
            on_load_fixtures: Hook::new("on_load_fixtures"),
            on_success: Hook::new("on_success"),
            on_failure: Hook::new("on_failure"),
        }
    }
}

/// Everything `execute` needs besides the job id and the workflow.
#[derive(Clone)]
pub struct RuntimeContext {
    store: SharedJobStore,
    hooks: Arc<RuntimeHooks>,
    fixtures: Vec<SharedFixture>,
}

impl RuntimeContext {
    pub fn new(store: SharedJobStore) -> Self {
        Self {
            store,
            hooks: Arc::new(RuntimeHooks::default()),
            fixtures: Vec::new(),
        }
    }

    /// Add a provider to every job scope opened with this context.
    pub fn with_fixture(mut self, provider: SharedFixture) -> Self {
        self.fixtures.push(provider);
        self
    }

    pub fn store(&self) -> &SharedJobStore {
        &self.store
    }

    pub fn hooks(&self) -> &RuntimeHooks {
        &self.hooks
    }
}

/// Outcome of one successful job pulled from a queue.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub results: WorkflowResults,
}

/// Execute `workflow` for `job_id` and return its results.
///
/// Any failure is wrapped into a [`WorkflowError`], reported through
/// `on_failure`, and returned.
pub async fn execute(
    job_id: &str,
    workflow: &Workflow,
    ctx: &RuntimeContext,
) -> Result<WorkflowResults, WorkflowError> {
    let execution = WorkflowExecution::new(workflow);

    let scope = match fixture::open(ctx.fixtures.iter().cloned(), true) {
        Ok(scope) => scope,
        Err(err) => return Err(report_failure(job_id, execution.error(err), ctx).await),
    };

    fixture::enter(scope, async {
        match run_job(job_id, &execution, ctx).await {
            Ok(results) => {
                info!(job_id = %job_id, workflow = %workflow.name(), "job succeeded");
                let event = SuccessEvent {
                    job_id: job_id.to_string(),
                    workflow: workflow.name().to_string(),
                    results,
                };
                ctx.hooks.on_success.trigger(&event).await;
                Ok(event.results)
            }
            Err(err) => Err(report_failure(job_id, err, ctx).await),
        }
    })
    .await
}

async fn run_job(
    job_id: &str,
    execution: &WorkflowExecution<'_>,
    ctx: &RuntimeContext,
) -> Result<WorkflowResults, WorkflowError> {
    use fixture_names::*;

    ctx.hooks
        .on_load_fixtures
        .trigger(&LoadFixturesEvent {
            job_id: job_id.to_string(),
            workflow: execution.workflow().name().to_string(),
        })
        .await;

    fixture::register_value(DATABASE, Arc::clone(&ctx.store)).map_err(|e| execution.error(e))?;

    let document = ctx
        .store
        .find_job(job_id)
        .await
        .map_err(|e| execution.error(e))?;

    UpdateRelay::new(Arc::clone(&ctx.store), job_id).attach(execution.hooks());

    let results = Results::default();
    fixture::register_value(JOB_ID, job_id.to_string()).map_err(|e| execution.error(e))?;
    fixture::register_value(JOB_DOCUMENT, document).map_err(|e| execution.error(e))?;
    fixture::register_value(RESULTS, results.clone()).map_err(|e| execution.error(e))?;

    execution.run().await?;
    Ok(results.snapshot())
}

async fn report_failure(job_id: &str, error: WorkflowError, ctx: &RuntimeContext) -> WorkflowError {
    error!(job_id = %job_id, workflow = %error.workflow, error = %error, "job failed");
    let event = FailureEvent {
        job_id: job_id.to_string(),
        error,
    };
    ctx.hooks.on_failure.trigger(&event).await;
    event.error
}

/// Pull ids from `source` and execute each one in turn.
///
/// The next id is pulled only after the previous job has finished. Job
/// failures are yielded as [`RuntimeError::Job`] and the stream continues;
/// a queue failure is yielded once and ends the stream. Pulls and jobs run
/// inside one root scope that lives as long as the stream, so fixtures
/// registered at its top level (by the source, say) carry over from job to
/// job.
pub fn execute_from_queue<S: JobSource>(
    source: S,
    workflow: Arc<Workflow>,
    ctx: RuntimeContext,
) -> impl Stream<Item = Result<JobOutcome, RuntimeError>> {
    stream::unfold(Some((source, FixtureScope::new())), move |state| {
        let workflow = Arc::clone(&workflow);
        let ctx = ctx.clone();
        async move {
            let (mut source, root) = state?;
            let (outcome, root) = fixture::enter(root, async {
                let outcome = next_outcome(&mut source, &workflow, &ctx).await;
                (outcome, fixture::current())
            })
            .await;
            match outcome {
                Err(err @ RuntimeError::Queue(_)) => Some((Err(err), None)),
                outcome => Some((outcome, Some((source, root)))),
            }
        }
    })
}

async fn next_outcome<S: JobSource>(
    source: &mut S,
    workflow: &Workflow,
    ctx: &RuntimeContext,
) -> Result<JobOutcome, RuntimeError> {
    let job_id = source.next_id().await?;
    match execute(&job_id, workflow, ctx).await {
        Ok(results) => Ok(JobOutcome { job_id, results }),
        Err(source) => Err(RuntimeError::Job { job_id, source }),
    }
}
