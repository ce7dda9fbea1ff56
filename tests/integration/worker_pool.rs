//! Integration tests for the background worker pool

use super::test_utils::store_with_jobs;
use std::sync::Arc;
use std::time::Duration;
use workflow_runtime::config::WorkerConfig;
use workflow_runtime::error::RuntimeError;
use workflow_runtime::fixture::resolve_as;
use workflow_runtime::queue::{channel, SledJobQueue};
use workflow_runtime::runtime::fixture_names::JOB_ID;
use workflow_runtime::runtime::{RuntimeContext, WorkerPool, WorkerStats};
use workflow_runtime::workflow::Workflow;

fn workflow() -> Arc<Workflow> {
    Arc::new(Workflow::new("worker").step("run", || async {
        let id = resolve_as::<String>(JOB_ID).await?;
        tokio::time::sleep(Duration::from_millis(2)).await;
        anyhow::Ok(format!("worked {}", id))
    }))
}

async fn wait_for(pool: &WorkerPool, done: impl Fn(&WorkerStats) -> bool) -> WorkerStats {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let stats = pool.stats();
            if done(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("workers did not finish in time")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn workers_drain_a_shared_queue() {
    let ids = ["1", "2", "3", "4", "5", "6"];
    let (store, _dir) = store_with_jobs(&ids);
    let queue = SledJobQueue::new(store.db().clone(), "job_queue", Duration::from_millis(5)).unwrap();
    for id in ids {
        queue.push(id).unwrap();
    }
    queue.push("missing").unwrap();

    let pool = WorkerPool::new(
        workflow(),
        RuntimeContext::new(store.clone()),
        WorkerConfig::with_count(3),
    );
    pool.start(|_| queue.clone()).unwrap();
    assert!(pool.is_running());

    let stats = wait_for(&pool, |s| s.completed + s.failed == 7).await;
    pool.stop().await;

    assert_eq!(stats.completed, 6);
    assert_eq!(stats.failed, 1);
    assert_eq!(pool.stats().processing, 0);
    assert!(!pool.is_running());
    assert!(queue.is_empty());
    for id in ids {
        let job = store.get_job(id).unwrap().unwrap();
        assert_eq!(job.updates(), vec![format!("worked {}", id)]);
    }
}

#[tokio::test]
async fn stop_interrupts_idle_workers() {
    let (store, _dir) = store_with_jobs(&[]);
    let queue = SledJobQueue::new(store.db().clone(), "job_queue", Duration::from_millis(5)).unwrap();
    let pool = WorkerPool::new(
        workflow(),
        RuntimeContext::new(store),
        WorkerConfig::with_count(2),
    );
    pool.start(|_| queue.clone()).unwrap();

    tokio::time::timeout(Duration::from_secs(1), pool.stop())
        .await
        .expect("idle workers should stop promptly");
    assert!(!pool.is_running());
    assert_eq!(pool.stats(), WorkerStats::default());
}

#[tokio::test]
async fn closed_sources_end_their_workers() {
    let (store, _dir) = store_with_jobs(&["a", "b"]);
    let pool = WorkerPool::new(
        workflow(),
        RuntimeContext::new(store),
        WorkerConfig::with_count(2),
    );

    let mut senders = Vec::new();
    pool.start(|_| {
        let (tx, source) = channel();
        senders.push(tx);
        source
    })
    .unwrap();

    senders[0].send("a").unwrap();
    senders[1].send("b").unwrap();
    drop(senders);

    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .expect("workers should exit once their sources close");

    let stats = pool.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.stopped, 2);
    assert!(!pool.is_running());
}

#[tokio::test]
async fn zero_workers_is_a_config_error() {
    let (store, _dir) = store_with_jobs(&[]);
    let pool = WorkerPool::new(
        workflow(),
        RuntimeContext::new(store),
        WorkerConfig::with_count(0),
    );
    let (_tx, source) = channel();
    let mut source = Some(source);

    let err = pool.start(|_| source.take().unwrap()).unwrap_err();
    assert!(matches!(err, RuntimeError::Config(_)));
    assert!(!pool.is_running());
}

#[tokio::test]
async fn panicking_job_counts_as_failed_and_worker_continues() {
    let (store, _dir) = store_with_jobs(&["boom", "ok"]);
    let workflow = Arc::new(Workflow::new("picky").step("run", || async {
        let id = resolve_as::<String>(JOB_ID).await?;
        let empty: Vec<String> = Vec::new();
        if id.as_str() == "boom" {
            return anyhow::Ok(empty[0].clone());
        }
        anyhow::Ok(format!("worked {}", id))
    }));
    let pool = WorkerPool::new(
        workflow,
        RuntimeContext::new(store.clone()),
        WorkerConfig::with_count(1),
    );

    let (tx, source) = channel();
    let mut source = Some(source);
    pool.start(|_| source.take().unwrap()).unwrap();
    tx.send("boom").unwrap();
    tx.send("ok").unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .expect("worker should survive the panic and exit on close");

    let stats = pool.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.processing, 0);
    assert_eq!(stats.stopped, 1);
    assert_eq!(store.get_job("ok").unwrap().unwrap().updates(), vec!["worked ok"]);
}
