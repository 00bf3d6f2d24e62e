// SPDX-License-Identifier: MIT

//! GPU watch loop: periodically classifies every managed GPU and hands
//! interruptions to the recovery orchestrator.
//!
//! The loop remembers which job each GPU was last running so that a dead
//! host (no status response at all) can still be recovered. One recovery
//! runs per GPU at a time; a GPU already being recovered is skipped until
//! its handler returns.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use sw_adapters::McApi;
use sw_core::{Clock, GpuId, JobId};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{FailureDetector, RecoveryOrchestrator};

/// Watch the given GPUs until cancelled.
pub async fn run_gpu_watch<C: Clock>(
    gpus: Vec<GpuId>,
    detector: Arc<FailureDetector<C>>,
    orchestrator: Arc<RecoveryOrchestrator<C>>,
    mc: Arc<dyn McApi>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let in_flight: Arc<Mutex<HashSet<GpuId>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut last_jobs: HashMap<GpuId, JobId> = HashMap::new();
    info!(gpus = gpus.len(), "gpu watch started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("gpu watch stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        for gpu_id in &gpus {
            if in_flight.lock().contains(gpu_id) {
                continue;
            }

            let current_job = current_job(&*mc, gpu_id).await;
            if let Some(job_id) = &current_job {
                last_jobs.insert(gpu_id.clone(), job_id.clone());
            }

            let Some(event) = detector.detect(gpu_id).await else { continue };

            // A dead host reports nothing; fall back to the job it was
            // last seen running.
            let job_id = match current_job.or_else(|| last_jobs.get(gpu_id).cloned()) {
                Some(job_id) => job_id,
                None => {
                    warn!(
                        gpu_id = %gpu_id,
                        failure = %event.failure_type,
                        "interruption on idle GPU, nothing to recover"
                    );
                    continue;
                }
            };

            in_flight.lock().insert(gpu_id.clone());
            let orchestrator = Arc::clone(&orchestrator);
            let in_flight = Arc::clone(&in_flight);
            let gpu = gpu_id.clone();
            tokio::spawn(async move {
                let ctx = orchestrator
                    .handle_interruption(job_id, gpu.clone(), event.failure_type)
                    .await;
                info!(gpu_id = %gpu, state = %ctx.state, "recovery finished");
                in_flight.lock().remove(&gpu);
            });
        }
    }
}

/// The job currently attributed to a GPU, if any.
async fn current_job(mc: &dyn McApi, gpu_id: &GpuId) -> Option<JobId> {
    mc.gpu_status(gpu_id)
        .await
        .and_then(|s| s.current_job_id)
        .filter(|j| !j.is_empty())
        .map(JobId::from)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
