// SPDX-License-Identifier: MIT

//! Bounded failover procedure.
//!
//! verify backup → load checkpoint → relaunch → confirm → notify, with
//! every step audited to MC. Target wall-clock budget is configurable
//! (60 s by default); overruns are logged, not aborted.

use std::sync::Arc;
use std::time::Duration;
use sw_adapters::{McApi, SshProbe};
use sw_core::{Clock, DrillResult, FailoverResult, GpuId, JobId};
use sw_store::CheckpointStore;
use tracing::{error, info, warn};

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);
const CONFIRM_POLL_ATTEMPTS: u32 = 10;

pub struct FailoverController<C: Clock> {
    mc: Arc<dyn McApi>,
    probe: Arc<dyn SshProbe>,
    checkpoints: Arc<CheckpointStore>,
    budget_ms: u64,
    clock: C,
}

impl<C: Clock> FailoverController<C> {
    pub fn new(
        mc: Arc<dyn McApi>,
        probe: Arc<dyn SshProbe>,
        checkpoints: Arc<CheckpointStore>,
        budget_ms: u64,
        clock: C,
    ) -> Self {
        Self { mc, probe, checkpoints, budget_ms, clock }
    }

    /// Move a job from a failed GPU to its backup.
    pub async fn failover(
        &self,
        job_id: &JobId,
        failed_gpu: &GpuId,
        backup_gpu: &GpuId,
    ) -> FailoverResult {
        let t0 = self.clock.now();
        let elapsed_ms = |clock: &C| clock.now().duration_since(t0).as_millis() as u64;

        self.audit(
            "failover_started",
            serde_json::json!({
                "job_id": job_id.as_str(),
                "from": failed_gpu.as_str(),
                "to": backup_gpu.as_str(),
            }),
        )
        .await;

        // Step 1: backup must be present, idle, and reachable.
        let Some(backup_status) = self.mc.gpu_status(backup_gpu).await else {
            return self.fail(job_id, failed_gpu, backup_gpu, elapsed_ms(&self.clock), "Backup GPU unreachable").await;
        };
        let occupied = backup_status.current_job_id.as_deref().is_some_and(|j| !j.is_empty())
            && backup_status.status.as_deref() != Some("idle");
        if occupied {
            return self.fail(job_id, failed_gpu, backup_gpu, elapsed_ms(&self.clock), "Backup GPU not idle").await;
        }
        if let Some(host) = backup_status.ssh_host.as_deref().filter(|h| !h.is_empty()) {
            if !self.probe.check(host).await {
                return self
                    .fail(job_id, failed_gpu, backup_gpu, elapsed_ms(&self.clock), "Backup GPU SSH unreachable")
                    .await;
            }
        }

        // Step 2: latest checkpoint. A job with none still fails over,
        // flagged as unverified.
        let latest = self.checkpoints.latest(job_id);
        let integrity_verified = self.checkpoints.load(job_id, None).await.is_some();
        let checkpoint_path = latest
            .as_ref()
            .and_then(|c| c.local_path.clone())
            .unwrap_or_default();

        // Step 3: relaunch on the backup.
        if let Err(e) = self.mc.relaunch_job(job_id, backup_gpu, &checkpoint_path).await {
            return self
                .fail(
                    job_id,
                    failed_gpu,
                    backup_gpu,
                    elapsed_ms(&self.clock),
                    format!("Relaunch API error: {}", e),
                )
                .await;
        }

        // Step 4: confirm the job is running on the backup.
        let mut confirmed = false;
        for _ in 0..CONFIRM_POLL_ATTEMPTS {
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
            if let Some(progress) = self.mc.job_progress(job_id).await {
                if progress.gpu_id.as_deref() == Some(backup_gpu.as_str())
                    && progress.status.as_deref() == Some("running")
                {
                    confirmed = true;
                    break;
                }
            }
        }
        if !confirmed {
            return self
                .fail(
                    job_id,
                    failed_gpu,
                    backup_gpu,
                    elapsed_ms(&self.clock),
                    "Job not confirmed running on backup",
                )
                .await;
        }

        let elapsed = elapsed_ms(&self.clock);
        if elapsed > self.budget_ms {
            warn!(job_id = %job_id, elapsed_ms = elapsed, budget_ms = self.budget_ms, "failover exceeded budget");
        }

        // Step 5: tenant notification is best-effort.
        let minutes = std::cmp::max(1, elapsed / 60_000);
        let notice = format!("Brief interruption ({}m), job resumed on backup hardware.", minutes);
        if let Err(e) = self.mc.notify_tenant(job_id, &notice).await {
            warn!(job_id = %job_id, error = %e, "tenant notification failed");
        }

        self.audit(
            "failover_complete",
            serde_json::json!({
                "job_id": job_id.as_str(),
                "ms": elapsed,
                "integrity": integrity_verified,
            }),
        )
        .await;
        info!(job_id = %job_id, elapsed_ms = elapsed, integrity_verified, "failover complete");

        FailoverResult {
            success: true,
            time_taken_ms: elapsed,
            data_integrity_verified: integrity_verified,
            failed_gpu: failed_gpu.clone(),
            backup_gpu: backup_gpu.clone(),
            job_id: job_id.clone(),
            checkpoint_used: checkpoint_path,
            error: String::new(),
        }
    }

    /// Validation drill: fail over a scratch job, then clean it up.
    pub async fn drill(&self, primary_gpu: &GpuId, backup_gpu: &GpuId) -> DrillResult {
        self.audit(
            "failover_test_started",
            serde_json::json!({
                "primary": primary_gpu.as_str(),
                "backup": backup_gpu.as_str(),
            }),
        )
        .await;

        let job_id = match self.mc.create_drill_job(primary_gpu).await {
            Ok(job_id) => job_id,
            Err(e) => {
                return DrillResult {
                    success: false,
                    failover_time_ms: 0,
                    data_loss: 0,
                    notes: format!("Could not create drill job: {}", e),
                };
            }
        };

        let result = self.failover(&job_id, primary_gpu, backup_gpu).await;

        if let Err(e) = self.mc.delete_job(&job_id).await {
            warn!(job_id = %job_id, error = %e, "drill job cleanup failed");
        }

        self.audit(
            "failover_test_complete",
            serde_json::json!({
                "success": result.success,
                "ms": result.time_taken_ms,
            }),
        )
        .await;

        DrillResult {
            success: result.success,
            failover_time_ms: result.time_taken_ms,
            data_loss: if result.data_integrity_verified { 0 } else { -1 },
            notes: if result.error.is_empty() { "OK".to_string() } else { result.error },
        }
    }

    async fn fail(
        &self,
        job_id: &JobId,
        failed_gpu: &GpuId,
        backup_gpu: &GpuId,
        elapsed_ms: u64,
        reason: impl Into<String>,
    ) -> FailoverResult {
        let reason = reason.into();
        error!(job_id = %job_id, elapsed_ms, %reason, "failover failed");
        self.audit(
            "failover_failed",
            serde_json::json!({
                "job_id": job_id.as_str(),
                "error": reason,
                "ms": elapsed_ms,
            }),
        )
        .await;
        FailoverResult::failed(job_id.clone(), failed_gpu.clone(), backup_gpu.clone(), elapsed_ms, reason)
    }

    async fn audit(&self, event_type: &str, details: serde_json::Value) {
        if let Err(e) = self.mc.post_audit(event_type, details).await {
            warn!(event_type, error = %e, "audit log failed");
        }
    }
}

#[cfg(test)]
#[path = "failover_tests.rs"]
mod tests;
