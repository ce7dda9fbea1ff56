//! Forwards workflow update events into a job's persisted status log.

use crate::hooks::{Hook, SubscriptionId};
use crate::store::{JobId, JobState, SharedJobStore, StatusUpdate};
use crate::workflow::{ExecutionHooks, FinishEvent, UpdateEvent};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Appends one status entry per update event for a single job.
///
/// Store failures are logged and swallowed so a flaky store never fails
/// the workflow that produced the update.
pub struct UpdateRelay {
    store: SharedJobStore,
    job_id: JobId,
}

impl UpdateRelay {
    pub fn new(store: SharedJobStore, job_id: impl Into<JobId>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Append `event` to the job record. Returns whether the append landed.
    pub async fn relay(&self, event: &UpdateEvent) -> bool {
        let update = status_for(event);
        match self.store.append_status(&self.job_id, update).await {
            Ok(()) => {
                debug!(
                    job_id = %self.job_id,
                    step = %event.step,
                    progress = event.progress,
                    "status appended"
                );
                true
            }
            Err(e) => {
                warn!(
                    job_id = %self.job_id,
                    step = %event.step,
                    error = %e,
                    "failed to append status update"
                );
                false
            }
        }
    }

    /// Append the terminal entry for a successful run that had no steps.
    ///
    /// Runs with steps already recorded `complete` on their last update;
    /// failed runs get no terminal entry. Returns whether anything landed.
    pub async fn relay_finish(&self, event: &FinishEvent) -> bool {
        if !event.success || event.snapshot.total > 0 {
            return false;
        }
        let update = StatusUpdate {
            state: JobState::Complete,
            progress: 1.0,
            ..StatusUpdate::message("Completed with no steps")
        };
        match self.store.append_status(&self.job_id, update).await {
            Ok(()) => true,
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "failed to append final status");
                false
            }
        }
    }

    /// Subscribe this relay to an execution's update hook only.
    pub fn subscribe(self, hook: &Hook<UpdateEvent>) -> SubscriptionId {
        subscribe_updates(Arc::new(self), hook)
    }

    /// Subscribe this relay to both hooks of an execution.
    pub fn attach(self, hooks: &ExecutionHooks) {
        let relay = Arc::new(self);
        subscribe_updates(Arc::clone(&relay), &hooks.on_update);
        hooks.on_finish.subscribe(move |event| {
            let relay = Arc::clone(&relay);
            let event = event.clone();
            async move {
                relay.relay_finish(&event).await;
                Ok(())
            }
            .boxed()
        });
    }
}

fn subscribe_updates(relay: Arc<UpdateRelay>, hook: &Hook<UpdateEvent>) -> SubscriptionId {
    hook.subscribe(move |event| {
        let relay = Arc::clone(&relay);
        let event = event.clone();
        async move {
            relay.relay(&event).await;
            Ok(())
        }
        .boxed()
    })
}

/// The last update of a run that reached every step is recorded as complete.
fn status_for(event: &UpdateEvent) -> StatusUpdate {
    let state = if event.progress >= 1.0 {
        JobState::Complete
    } else {
        JobState::Running
    };
    StatusUpdate {
        state,
        stage: Some(event.stage),
        step: Some(event.step.clone()),
        progress: event.progress,
        update: event.update.clone(),
        error: None,
    }
}
