//! Sequential execution of one workflow run.

use super::{ExecutionSnapshot, Stage, Workflow};
use crate::error::{ErrorCause, WorkflowError};
use crate::hooks::Hook;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info};

/// Published after each step completes.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEvent {
    pub workflow: String,
    pub stage: Stage,
    pub step: String,
    pub progress: f64,
    pub update: String,
}

/// Published once when the run reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct FinishEvent {
    pub workflow: String,
    pub success: bool,
    pub snapshot: ExecutionSnapshot,
}

/// Hooks that live exactly as long as one execution.
#[derive(Debug)]
pub struct ExecutionHooks {
    pub on_update: Hook<UpdateEvent>,
    pub on_finish: Hook<FinishEvent>,
}

impl ExecutionHooks {
    fn new() -> Self {
        Self {
            on_update: Hook::new("on_update"),
            on_finish: Hook::new("on_workflow_finish"),
        }
    }

    fn close(&self) {
        self.on_update.clear();
        self.on_finish.clear();
    }
}

/// One run of a [`Workflow`].
///
/// The execution can be run once; afterwards its hooks are closed and the
/// snapshot shows where it stopped.
pub struct WorkflowExecution<'a> {
    workflow: &'a Workflow,
    hooks: ExecutionHooks,
    state: Mutex<ExecutionSnapshot>,
}

impl<'a> WorkflowExecution<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        Self {
            workflow,
            hooks: ExecutionHooks::new(),
            state: Mutex::new(ExecutionSnapshot {
                total: workflow.total_steps(),
                ..ExecutionSnapshot::default()
            }),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        self.workflow
    }

    pub fn hooks(&self) -> &ExecutionHooks {
        &self.hooks
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.state.lock().clone()
    }

    /// Wrap `cause` with this execution's identity and current position.
    pub fn error(&self, cause: impl Into<ErrorCause>) -> WorkflowError {
        WorkflowError::new(self.workflow.name(), self.snapshot(), cause)
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// `on_finish` fires once at the end either way, then all execution
    /// hooks are cleared.
    pub async fn run(&self) -> Result<(), WorkflowError> {
        let outcome = self.run_steps().await;

        let finish = FinishEvent {
            workflow: self.workflow.name().to_string(),
            success: outcome.is_ok(),
            snapshot: self.snapshot(),
        };
        self.hooks.on_finish.trigger(&finish).await;
        self.hooks.close();

        outcome
    }

    async fn run_steps(&self) -> Result<(), WorkflowError> {
        let name = self.workflow.name();
        info!(workflow = %name, steps = self.workflow.total_steps(), "workflow started");

        for stage in [Stage::Startup, Stage::Step, Stage::Cleanup] {
            for step in self.workflow.steps(stage) {
                {
                    let mut state = self.state.lock();
                    state.stage = Some(stage);
                    state.step = Some(step.name().to_string());
                }
                debug!(workflow = %name, stage = %stage, step = step.name(), "running step");

                let outcome = AssertUnwindSafe(async { step.call().await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(anyhow::anyhow!("step panicked: {}", panic_message(&*payload)))
                    });
                let update = outcome.map_err(|err| {
                    self.error(ErrorCause::Step {
                        step: step.name().to_string(),
                        source: err.into(),
                    })
                })?;

                let progress = {
                    let mut state = self.state.lock();
                    state.completed += 1;
                    state.progress()
                };
                let event = UpdateEvent {
                    workflow: name.to_string(),
                    stage,
                    step: step.name().to_string(),
                    progress,
                    update,
                };
                self.hooks.on_update.trigger(&event).await;
            }
        }

        info!(workflow = %name, "workflow finished");
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
