//! Workflow definitions and a sequential executor.
//!
//! A workflow is three ordered lists of steps: startup, main steps and
//! cleanup. Each step returns a human-readable status string, which is
//! published on the execution's `on_update` hook before the next step starts.
//! Steps get their dependencies by resolving fixtures from the active scope.

mod execution;

pub use execution::{ExecutionHooks, FinishEvent, UpdateEvent, WorkflowExecution};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type StepFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync;

/// One named unit of work in a workflow.
#[derive(Clone)]
pub struct Step {
    name: String,
    func: Arc<StepFn>,
}

impl Step {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move || -> BoxFuture<'static, anyhow::Result<String>> {
                Box::pin(func())
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self) -> BoxFuture<'static, anyhow::Result<String>> {
        (self.func)()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Step").field(&self.name).finish()
    }
}

/// Phase of a workflow a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Startup,
    Step,
    Cleanup,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Startup => "startup",
            Stage::Step => "step",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, ordered set of steps.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    startup: Vec<Step>,
    steps: Vec<Step>,
    cleanup: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            startup: Vec::new(),
            steps: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// Append a startup step.
    pub fn on_startup<F, Fut>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.startup.push(Step::new(name, func));
        self
    }

    /// Append a main step.
    pub fn step<F, Fut>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.steps.push(Step::new(name, func));
        self
    }

    /// Append a cleanup step.
    pub fn on_cleanup<F, Fut>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.cleanup.push(Step::new(name, func));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self, stage: Stage) -> &[Step] {
        match stage {
            Stage::Startup => &self.startup,
            Stage::Step => &self.steps,
            Stage::Cleanup => &self.cleanup,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.startup.len() + self.steps.len() + self.cleanup.len()
    }
}

/// Where an execution is, captured for status updates and error reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub stage: Option<Stage>,
    pub step: Option<String>,
    pub completed: usize,
    pub total: usize,
}

impl ExecutionSnapshot {
    /// Fraction of steps completed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

impl fmt::Display for ExecutionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.stage, &self.step) {
            (Some(stage), Some(step)) => write!(
                f,
                "{stage} step '{step}', {}/{} done",
                self.completed, self.total
            ),
            _ => f.write_str("before first step"),
        }
    }
}
