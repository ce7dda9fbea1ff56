//! Integration tests for executing workflows against a job store

use super::test_utils::{record, store_with_jobs};
use async_trait::async_trait;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use workflow_runtime::error::{ErrorCause, StoreError};
use workflow_runtime::fixture::{open_scope, register_value, resolve_as, value};
use workflow_runtime::runtime::fixture_names::{DATABASE, JOB_DOCUMENT, JOB_ID, RESULTS};
use workflow_runtime::runtime::{execute, Results, RuntimeContext};
use workflow_runtime::store::{
    JobDocument, JobState, JobStore, SharedJobStore, StatusUpdate,
};
use workflow_runtime::workflow::{Stage, Workflow};

fn three_stage_workflow() -> Workflow {
    Workflow::new("three-stage")
        .on_startup("start", || async { Ok("Started up".to_string()) })
        .step("work", || async { Ok("Step".to_string()) })
        .on_cleanup("stop", || async { Ok("Cleaned up".to_string()) })
}

#[tokio::test]
async fn updates_are_persisted_in_order() {
    let (store, _dir) = store_with_jobs(&["1"]);
    let ctx = RuntimeContext::new(store.clone());

    execute("1", &three_stage_workflow(), &ctx).await.unwrap();

    let job = store.get_job("1").unwrap().unwrap();
    assert_eq!(job.updates(), vec!["Started up", "Step", "Cleaned up"]);
    let states: Vec<JobState> = job.status.iter().map(|r| r.status.state).collect();
    assert_eq!(
        states,
        vec![JobState::Running, JobState::Running, JobState::Complete]
    );
    assert_eq!(job.status[1].status.stage, Some(Stage::Step));
    assert_eq!(job.status[1].status.step.as_deref(), Some("work"));
}

#[tokio::test]
async fn steps_resolve_job_fixtures() {
    let (store, _dir) = store_with_jobs(&["42"]);
    let ctx = RuntimeContext::new(store.clone());

    let workflow = Workflow::new("inspect").step("inspect", || async {
        let job_id = resolve_as::<String>(JOB_ID).await?;
        let job = resolve_as::<JobDocument>(JOB_DOCUMENT).await?;
        let db = resolve_as::<SharedJobStore>(DATABASE).await?;
        let results = resolve_as::<Results>(RESULTS).await?;

        assert_eq!(job.id, *job_id);
        db.find_job(&job_id).await?;
        results.insert("seen", job_id.as_str());
        anyhow::Ok(format!("inspected {}", job_id))
    });

    let results = execute("42", &workflow, &ctx).await.unwrap();
    assert_eq!(results["seen"], "42");
}

#[tokio::test]
async fn failing_step_reports_context_through_failure_hook() {
    let (store, _dir) = store_with_jobs(&["1"]);
    let ctx = RuntimeContext::new(store.clone());
    let failures = record(&ctx.hooks().on_failure, |event| {
        (
            event.job_id.clone(),
            event.error.context.stage,
            event.error.context.step.clone(),
            event.error.workflow.clone(),
        )
    });
    let successes = record(&ctx.hooks().on_success, |event| event.job_id.clone());

    let workflow = Workflow::new("fragile")
        .on_startup("start", || async { Ok("Started up".to_string()) })
        .step("explode", || async {
            Err::<String, _>(anyhow::anyhow!("disk full"))
        })
        .on_cleanup("stop", || async { Ok("Cleaned up".to_string()) });

    let err = execute("1", &workflow, &ctx).await.unwrap_err();
    assert!(matches!(&err.cause, ErrorCause::Step { step, .. } if step == "explode"));
    assert_eq!(err.context.completed, 1);

    assert_eq!(
        failures.lock().clone(),
        vec![(
            "1".to_string(),
            Some(Stage::Step),
            Some("explode".to_string()),
            "fragile".to_string()
        )]
    );
    assert!(successes.lock().is_empty());

    let job = store.get_job("1").unwrap().unwrap();
    assert_eq!(job.updates(), vec!["Started up"]);
    assert!(job
        .status
        .iter()
        .all(|r| r.status.state != JobState::Complete));
}

#[tokio::test]
async fn missing_job_document_fails_before_any_step() {
    let (store, _dir) = store_with_jobs(&[]);
    let ctx = RuntimeContext::new(store.clone());
    let failures = record(&ctx.hooks().on_failure, |event| event.job_id.clone());

    let err = execute("ghost", &three_stage_workflow(), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(
        err.cause,
        ErrorCause::Store(StoreError::JobNotFound(ref id)) if id == "ghost"
    ));
    assert_eq!(err.context.stage, None);
    assert_eq!(failures.lock().clone(), vec!["ghost".to_string()]);
}

#[tokio::test]
async fn success_hook_receives_results() {
    let (store, _dir) = store_with_jobs(&["1"]);
    let ctx = RuntimeContext::new(store);
    let seen = record(&ctx.hooks().on_success, |event| event.results.clone());

    let workflow = Workflow::new("counting").step("count", || async {
        let results = resolve_as::<Results>(RESULTS).await?;
        results.insert("count", 3);
        anyhow::Ok("counted".to_string())
    });

    let results = execute("1", &workflow, &ctx).await.unwrap();
    assert_eq!(seen.lock().as_slice(), &[results]);
}

#[tokio::test]
async fn concurrent_jobs_do_not_see_each_other() {
    let (store, _dir) = store_with_jobs(&["a", "b"]);
    let ctx = RuntimeContext::new(store.clone());

    let workflow = Workflow::new("slow").step("check", || async {
        let before = resolve_as::<String>(JOB_ID).await?;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let job = resolve_as::<JobDocument>(JOB_DOCUMENT).await?;
        let after = resolve_as::<String>(JOB_ID).await?;
        assert_eq!(before, after);
        assert_eq!(job.id, *after);
        anyhow::Ok(format!("checked {}", after))
    });

    let (a, b) = tokio::join!(
        execute("a", &workflow, &ctx),
        execute("b", &workflow, &ctx)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(store.get_job("a").unwrap().unwrap().updates(), vec!["checked a"]);
    assert_eq!(store.get_job("b").unwrap().unwrap().updates(), vec!["checked b"]);
}

#[tokio::test]
async fn job_scope_is_discarded_after_execute() {
    let (store, _dir) = store_with_jobs(&["inner"]);
    let ctx = RuntimeContext::new(store).with_fixture(value("greeting", "hi".to_string()));

    let workflow = Workflow::new("greet").step("greet", || async {
        let greeting = resolve_as::<String>("greeting").await?;
        let outer = resolve_as::<String>("caller").await?;
        anyhow::Ok(format!("{} from {}", greeting, outer))
    });

    open_scope([value(JOB_ID, "outer".to_string())], false, async {
        register_value("caller", "test".to_string()).unwrap();
        execute("inner", &workflow, &ctx).await.unwrap();

        assert_eq!(*resolve_as::<String>(JOB_ID).await.unwrap(), "outer");
        assert!(resolve_as::<String>("greeting").await.is_err());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn load_fixtures_hook_can_register_fixtures() {
    let (store, _dir) = store_with_jobs(&["1"]);
    let ctx = RuntimeContext::new(store);
    ctx.hooks().on_load_fixtures.subscribe(|event| {
        let job_id = event.job_id.clone();
        async move {
            register_value("upper", job_id.to_uppercase())?;
            anyhow::Ok(())
        }
        .boxed()
    });

    let workflow = Workflow::new("upper").step("read", || async {
        let upper = resolve_as::<String>("upper").await?;
        anyhow::Ok(upper.as_ref().clone())
    });

    execute("1", &workflow, &ctx).await.unwrap();
}

/// Finds jobs but refuses every status append.
struct ReadOnlyStore;

#[async_trait]
impl JobStore for ReadOnlyStore {
    async fn find_job(&self, job_id: &str) -> Result<JobDocument, StoreError> {
        Ok(JobDocument::new(job_id, serde_json::json!({})))
    }

    async fn append_status(&self, _job_id: &str, _update: StatusUpdate) -> Result<(), StoreError> {
        Err(StoreError::Data("read only".into()))
    }
}

#[tokio::test]
async fn relay_failures_do_not_fail_the_job() {
    let ctx = RuntimeContext::new(Arc::new(ReadOnlyStore));
    assert!(execute("1", &three_stage_workflow(), &ctx).await.is_ok());
}

#[tokio::test]
async fn panicking_step_still_reaches_failure_hook() {
    let (store, _dir) = store_with_jobs(&["1"]);
    let ctx = RuntimeContext::new(store.clone());
    let failures = record(&ctx.hooks().on_failure, |event| {
        (event.job_id.clone(), event.error.context.step.clone())
    });

    let workflow = Workflow::new("indexing")
        .on_startup("start", || async { Ok("Started up".to_string()) })
        .step("index", || async {
            let empty: Vec<String> = Vec::new();
            anyhow::Ok(empty[0].clone())
        });

    let err = execute("1", &workflow, &ctx).await.unwrap_err();
    assert!(matches!(&err.cause, ErrorCause::Step { step, .. } if step == "index"));
    assert_eq!(
        failures.lock().clone(),
        vec![("1".to_string(), Some("index".to_string()))]
    );
    assert_eq!(store.get_job("1").unwrap().unwrap().updates(), vec!["Started up"]);
}

#[tokio::test]
async fn empty_workflow_is_recorded_complete() {
    let (store, _dir) = store_with_jobs(&["1"]);
    let ctx = RuntimeContext::new(store.clone());

    execute("1", &Workflow::new("nothing"), &ctx).await.unwrap();

    let job = store.get_job("1").unwrap().unwrap();
    assert_eq!(job.status.len(), 1);
    assert_eq!(job.latest().unwrap().status.state, JobState::Complete);
}
