// SPDX-License-Identifier: MIT

//! Per-job checkpoint scheduler.
//!
//! One task per job, keyed by job id. Each tick pulls the job's state from
//! its [`StateSource`], saves it through the checkpoint store, and posts a
//! best-effort MC heartbeat. A `BothMediaFailed` save is critical: the loop
//! alerts and stops for that job; every other error is logged and the loop
//! keeps going.

use crate::alert::AlertRouter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sw_adapters::McApi;
use sw_core::{Alert, Clock, JobId, Severity};
use sw_store::{CheckpointError, CheckpointStore};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// The job runtime could not produce a state snapshot this tick.
#[derive(Debug, Error)]
#[error("state source unavailable: {0}")]
pub struct StateUnavailable(pub String);

/// Supplies the bytes to checkpoint for one job.
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn snapshot(&self) -> Result<Vec<u8>, StateUnavailable>;
}

/// Owns the per-job scheduler tasks.
pub struct CheckpointScheduler<C: Clock> {
    store: Arc<CheckpointStore>,
    mc: Arc<dyn McApi>,
    router: Arc<AlertRouter<C>>,
    agent_id: String,
    agent_name: String,
    interval: Duration,
    tasks: Mutex<HashMap<String, (CancellationToken, JoinHandle<()>)>>,
    cancel: CancellationToken,
}

impl<C: Clock> CheckpointScheduler<C> {
    pub fn new(
        store: Arc<CheckpointStore>,
        mc: Arc<dyn McApi>,
        router: Arc<AlertRouter<C>>,
        agent_id: String,
        agent_name: String,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            mc,
            router,
            agent_id,
            agent_name,
            interval,
            tasks: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    /// Start (or restart) the scheduler loop for a job.
    pub fn start(&self, job_id: JobId, source: Arc<dyn StateSource>) {
        let token = self.cancel.child_token();
        let handle = tokio::spawn(run_job_loop(
            job_id.clone(),
            source,
            Arc::clone(&self.store),
            Arc::clone(&self.mc),
            Arc::clone(&self.router),
            self.agent_id.clone(),
            self.agent_name.clone(),
            self.interval,
            token.clone(),
        ));
        let previous =
            self.tasks.lock().insert(job_id.to_string(), (token, handle));
        if let Some((old_token, _)) = previous {
            old_token.cancel();
        }
        info!(job_id = %job_id, interval_s = self.interval.as_secs(), "checkpoint scheduler started");
    }

    /// Stop the scheduler loop for a job; no-op when none is running.
    pub fn stop(&self, job_id: &JobId) {
        if let Some((token, _)) = self.tasks.lock().remove(job_id.as_str()) {
            token.cancel();
            info!(job_id = %job_id, "checkpoint scheduler stopped");
        }
    }

    /// Job ids with a live scheduler task.
    pub fn active_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = self.tasks.lock().keys().cloned().collect();
        jobs.sort();
        jobs
    }

    /// Cancel every loop and wait for the tasks to return.
    pub async fn shutdown(&self) {
        let tasks: Vec<(CancellationToken, JoinHandle<()>)> =
            self.tasks.lock().drain().map(|(_, v)| v).collect();
        for (token, _) in &tasks {
            token.cancel();
        }
        for (_, handle) in tasks {
            let _ = handle.await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job_loop<C: Clock>(
    job_id: JobId,
    source: Arc<dyn StateSource>,
    store: Arc<CheckpointStore>,
    mc: Arc<dyn McApi>,
    router: Arc<AlertRouter<C>>,
    agent_id: String,
    agent_name: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(job_id = %job_id, "checkpoint loop cancelled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let bytes = match source.snapshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "state snapshot failed");
                continue;
            }
        };

        let seq = store.next_seq(&job_id);
        match store.save(&job_id, seq, &bytes).await {
            Ok(checkpoint) => {
                let message = format!("checkpoint saved: {}B", checkpoint.size_bytes);
                if let Err(e) = mc.post_heartbeat(&agent_id, &job_id, &message).await {
                    tracing::debug!(job_id = %job_id, error = %e, "MC heartbeat failed");
                }
            }
            Err(CheckpointError::BothMediaFailed(_)) => {
                error!(job_id = %job_id, "both checkpoint media failed, stopping loop");
                router
                    .route(Alert::new(
                        Severity::Critical,
                        agent_name.clone(),
                        "Checkpoint stores failed",
                        format!("Both stores failed for job {}, job should be paused", job_id),
                    ))
                    .await;
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "checkpoint save failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
