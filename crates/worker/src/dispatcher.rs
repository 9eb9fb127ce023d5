//! Bounded-concurrency build dispatcher.
//!
//! Claims queued jobs from the store with [`ConversionStore::claim_next_queued`]
//! and runs each one through the [`Orchestrator`] on its own task. A job is
//! only claimed while a semaphore permit is free, so at most
//! `max_concurrent_builds` toolchain runs happen at once. Submitters can
//! [`DispatchHandle::nudge`] the loop instead of waiting for the next poll.
//!
//! [`ConversionStore::claim_next_queued`]: webapk_db::store::ConversionStore::claim_next_queued

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use webapk_pipeline::{JobOutcome, Orchestrator};

use crate::config::DispatcherConfig;

/// Wakes the dispatcher when new work was queued.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    notify: Arc<Notify>,
}

impl DispatchHandle {
    pub fn nudge(&self) {
        self.notify.notify_one();
    }
}

pub struct BuildDispatcher {
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
    notify: Arc<Notify>,
    poll_interval: Duration,
}

impl BuildDispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>, config: &DispatcherConfig) -> Self {
        Self {
            orchestrator,
            permits: Arc::new(Semaphore::new(config.max_concurrent_builds)),
            notify: Arc::new(Notify::new()),
            poll_interval: config.poll_interval,
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        DispatchHandle {
            notify: Arc::clone(&self.notify),
        }
    }

    /// Run the dispatch loop until `cancel` fires, then wait for in-flight
    /// builds to reach a terminal state.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut running: JoinSet<JobOutcome> = JoinSet::new();

        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_concurrent_builds = self.permits.available_permits(),
            "Build dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = running.len(), "Build dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.dispatch_available(&mut running).await;
                }
                _ = self.notify.notified() => {
                    self.dispatch_available(&mut running).await;
                }
                Some(finished) = running.join_next(), if !running.is_empty() => {
                    log_finished(finished);
                    // A permit was released.
                    self.dispatch_available(&mut running).await;
                }
            }
        }

        while let Some(finished) = running.join_next().await {
            log_finished(finished);
        }
        tracing::info!("Build dispatcher stopped");
    }

    /// Claim and start queued jobs while permits are free. Returns how many
    /// jobs were started.
    pub async fn dispatch_available(&self, running: &mut JoinSet<JobOutcome>) -> usize {
        let mut started = 0;
        loop {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };

            let job = match self.orchestrator.store().claim_next_queued().await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim queued job");
                    break;
                }
            };

            tracing::info!(job_id = job.id, apk_id = job.apk_id, "Job claimed");
            let orchestrator = Arc::clone(&self.orchestrator);
            running.spawn(async move {
                let _permit = permit;
                orchestrator.run(job).await
            });
            started += 1;
        }
        started
    }
}

fn log_finished(finished: Result<JobOutcome, tokio::task::JoinError>) {
    match finished {
        Ok(JobOutcome::Completed { apk_path, .. }) => {
            tracing::debug!(apk_path = %apk_path.display(), "Build task finished");
        }
        Ok(JobOutcome::Failed { kind, .. }) => {
            tracing::debug!(kind, "Build task finished with failure");
        }
        Ok(JobOutcome::Skipped) => {}
        Err(e) => tracing::error!(error = %e, "Build task panicked"),
    }
}
