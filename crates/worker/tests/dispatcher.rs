mod common;

use std::time::Duration;

use common::Harness;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use webapk_db::models::status::JobStatus;
use webapk_db::store::ConversionStore;
use webapk_worker::{BuildDispatcher, DispatcherConfig};

fn config(max_concurrent_builds: usize, poll_ms: u64) -> DispatcherConfig {
    DispatcherConfig {
        max_concurrent_builds,
        poll_interval: Duration::from_millis(poll_ms),
    }
}

/// Poll the store until every job is terminal, or give up after 10s.
async fn wait_for_terminal(h: &Harness, job_ids: &[i64]) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let mut done = 0;
        for id in job_ids {
            let job = h.store.job_by_id(*id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                done += 1;
            }
        }
        if done == job_ids.len() {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "jobs did not finish in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn never_runs_more_builds_than_permits() {
    let h = Harness::new(Duration::from_millis(100));
    let jobs = h.submit(5).await;

    let dispatcher = BuildDispatcher::new(h.orchestrator.clone(), &config(2, 10));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(dispatcher.run(cancel.clone()));

    wait_for_terminal(&h, &jobs).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(h.toolchain.builds(), 5);
    assert!(h.toolchain.peak() <= 2, "peak was {}", h.toolchain.peak());
    for id in jobs {
        let job = h.store.job_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }
}

#[tokio::test]
async fn dispatch_claims_only_while_permits_are_free() {
    let h = Harness::new(Duration::from_millis(50));
    h.submit(3).await;

    let dispatcher = BuildDispatcher::new(h.orchestrator.clone(), &config(2, 1000));
    let mut running = JoinSet::new();

    assert_eq!(dispatcher.dispatch_available(&mut running).await, 2);
    assert_eq!(dispatcher.dispatch_available(&mut running).await, 0);
    assert_eq!(
        h.store.jobs_with_status(JobStatus::Queued).await.unwrap().len(),
        1
    );

    while running.join_next().await.is_some() {}

    assert_eq!(dispatcher.dispatch_available(&mut running).await, 1);
    while running.join_next().await.is_some() {}
    assert_eq!(dispatcher.dispatch_available(&mut running).await, 0);
}

#[tokio::test]
async fn nudge_dispatches_without_waiting_for_the_poll() {
    let h = Harness::new(Duration::from_millis(10));
    let dispatcher = BuildDispatcher::new(h.orchestrator.clone(), &config(1, 3_600_000));
    let handle = dispatcher.handle();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(dispatcher.run(cancel.clone()));

    // Let the immediate first tick pass with an empty queue.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let jobs = h.submit(1).await;
    handle.nudge();
    wait_for_terminal(&h, &jobs).await;

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(h.toolchain.builds(), 1);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_builds() {
    let h = Harness::new(Duration::from_millis(200));
    let jobs = h.submit(1).await;

    let dispatcher = BuildDispatcher::new(h.orchestrator.clone(), &config(1, 10));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(dispatcher.run(cancel.clone()));

    // Wait for the claim, then cancel mid-build.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.store.jobs_with_status(JobStatus::Queued).await.unwrap().len() == 1 {
        assert!(tokio::time::Instant::now() < deadline, "job was never claimed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    task.await.unwrap();

    let job = h.store.job_by_id(jobs[0]).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}
