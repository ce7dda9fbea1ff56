//! Integration tests for task-local fixture scopes

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use workflow_runtime::error::FixtureError;
use workflow_runtime::fixture::{
    current, fixture, in_new_scope, is_active, open_scope, register_value, resolve_as, scoped,
    value, with_root_scope, Fixture, FixtureValue, SharedFixture,
};

async fn job_id() -> String {
    resolve_as::<String>("job_id").await.unwrap().as_ref().clone()
}

fn no_providers() -> Vec<SharedFixture> {
    Vec::new()
}

#[tokio::test]
async fn concurrent_tasks_see_only_their_own_scope() {
    let mut handles = Vec::new();
    for i in 0..8 {
        handles.push(tokio::spawn(async move {
            open_scope([value("job_id", i.to_string())], false, async move {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                    assert_eq!(job_id().await, i.to_string());
                }
                job_id().await
            })
            .await
            .unwrap()
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), i.to_string());
    }
}

#[tokio::test]
async fn spawned_task_starts_without_a_scope() {
    open_scope([value("job_id", "parent".to_string())], false, async {
        let child = tokio::spawn(async { (is_active(), current().len()) });
        assert_eq!(child.await.unwrap(), (false, 0));
        assert_eq!(job_id().await, "parent");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn error_in_body_restores_previous_scope() {
    open_scope([value("job_id", "outer".to_string())], false, async {
        let result: Result<(), &str> = open_scope(no_providers(), true, async {
            register_value("job_id", "inner".to_string()).unwrap();
            register_value("scratch", 1u32).unwrap();
            Err("boom")
        })
        .await
        .unwrap();

        assert_eq!(result, Err("boom"));
        assert_eq!(job_id().await, "outer");
        assert!(!current().contains("scratch"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn cancelled_body_restores_previous_scope() {
    open_scope([value("job_id", "outer".to_string())], false, async {
        let inner = in_new_scope(async {
            register_value("job_id", "inner".to_string()).unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), inner)
            .await
            .is_err());

        assert_eq!(job_id().await, "outer");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn panic_in_body_restores_previous_scope() {
    open_scope([value("job_id", "outer".to_string())], false, async {
        let inner = in_new_scope(async {
            register_value("job_id", "inner".to_string()).unwrap();
            panic!("step exploded");
        });
        assert!(AssertUnwindSafe(inner).catch_unwind().await.is_err());

        assert_eq!(job_id().await, "outer");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn sibling_scopes_do_not_share_overrides() {
    open_scope([value("job_id", "root".to_string())], false, async {
        in_new_scope(async {
            register_value("job_id", "first".to_string()).unwrap();
            assert_eq!(job_id().await, "first");
        })
        .await;
        in_new_scope(async {
            assert_eq!(job_id().await, "root");
        })
        .await;
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn scoped_wrapper_isolates_each_call() {
    let tag = scoped(|n: u32| async move {
        register_value("call", n).unwrap();
        *resolve_as::<u32>("call").await.unwrap()
    });

    open_scope(no_providers(), false, async {
        assert_eq!(tag(1).await, 1);
        assert_eq!(tag(2).await, 2);
        assert!(!current().contains("call"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn provider_resolves_its_dependencies_from_the_active_scope() {
    let greeting = fixture("greeting", || async {
        let name = resolve_as::<String>("name").await?;
        anyhow::Ok(format!("hello {}", name))
    });

    open_scope([greeting, value("name", "ada".to_string())], false, async {
        assert_eq!(*resolve_as::<String>("greeting").await.unwrap(), "hello ada");

        in_new_scope(async {
            register_value("name", "grace".to_string()).unwrap();
            assert_eq!(
                *resolve_as::<String>("greeting").await.unwrap(),
                "hello grace"
            );
        })
        .await;
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn failing_provider_reports_its_name() {
    let broken = fixture("database", || async {
        Err::<String, _>(anyhow::anyhow!("connection refused"))
    });

    open_scope([broken], false, async {
        match resolve_as::<String>("database").await {
            Err(FixtureError::Provider { name, source }) => {
                assert_eq!(name, "database");
                assert_eq!(source.to_string(), "connection refused");
            }
            other => panic!("expected provider error, got {:?}", other.map(|_| ())),
        }
    })
    .await
    .unwrap();
}

struct Impostor;

#[async_trait]
impl Fixture for Impostor {
    fn name(&self) -> &str {
        "impostor"
    }

    fn is_fixture(&self) -> bool {
        false
    }

    async fn provide(&self) -> Result<FixtureValue, FixtureError> {
        Ok(Arc::new(()))
    }
}

#[tokio::test]
async fn unmarked_provider_is_rejected_before_body_runs() {
    let mut ran = false;
    let err = open_scope([Arc::new(Impostor) as SharedFixture], false, async {
        ran = true;
    })
    .await
    .unwrap_err();

    assert!(matches!(err, FixtureError::NotAFixture(name) if name == "impostor"));
    assert!(!ran);
}

#[tokio::test]
async fn root_scope_registrations_outlive_nested_scopes() {
    let task = tokio::spawn(with_root_scope(async {
        register_value("job_id", "top".to_string()).unwrap();
        in_new_scope(async {
            register_value("job_id", "nested".to_string()).unwrap();
        })
        .await;
        open_scope(no_providers(), true, async { job_id().await })
            .await
            .unwrap()
    }));
    assert_eq!(task.await.unwrap(), "top");
}
