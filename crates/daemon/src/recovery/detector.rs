// SPDX-License-Identifier: MIT

//! Failure classification for a GPU worker.
//!
//! Checks run in a fixed order; the first hit wins:
//! 1. no status response        → POWER_LOSS
//! 2. SSH probe fails           → NETWORK_LOSS
//! 3. temperature past threshold → THERMAL
//! 4. job stalled past threshold → TIMEOUT

use std::sync::Arc;
use sw_adapters::{McApi, SshProbe};
use sw_core::{Clock, FailureEvent, FailureType, GpuId, JobId};
use tracing::debug;

pub struct FailureDetector<C: Clock> {
    mc: Arc<dyn McApi>,
    probe: Arc<dyn SshProbe>,
    thermal_threshold_c: f64,
    stall_threshold_min: i64,
    clock: C,
}

impl<C: Clock> FailureDetector<C> {
    pub fn new(
        mc: Arc<dyn McApi>,
        probe: Arc<dyn SshProbe>,
        thermal_threshold_c: f64,
        stall_threshold_min: i64,
        clock: C,
    ) -> Self {
        Self { mc, probe, thermal_threshold_c, stall_threshold_min, clock }
    }

    /// Classify the current condition of a GPU, or `None` when healthy.
    pub async fn detect(&self, gpu_id: &GpuId) -> Option<FailureEvent> {
        let Some(status) = self.mc.gpu_status(gpu_id).await else {
            return Some(FailureEvent::new(
                gpu_id.clone(),
                FailureType::PowerLoss,
                "No response from GPU/host",
            ));
        };

        if let Some(host) = status.ssh_host.as_deref().filter(|h| !h.is_empty()) {
            if !self.probe.check(host).await {
                return Some(FailureEvent::new(
                    gpu_id.clone(),
                    FailureType::NetworkLoss,
                    format!("SSH unreachable: {}", host),
                ));
            }
        }

        if let Some(temperature) =
            self.mc.gpu_metrics(gpu_id).await.and_then(|m| m.temperature)
        {
            if temperature > self.thermal_threshold_c {
                return Some(FailureEvent::new(
                    gpu_id.clone(),
                    FailureType::Thermal,
                    format!("Temperature {}C > {}C", temperature, self.thermal_threshold_c),
                ));
            }
        }

        if let Some(job_id) = status.current_job_id.as_deref().filter(|j| !j.is_empty()) {
            if let Some(progress) = self.mc.job_progress(&JobId::from(job_id)).await {
                if let Some(last_progress_at) = progress.last_progress_at {
                    let stalled_min =
                        (self.clock.utc_now() - last_progress_at).num_seconds() / 60;
                    if stalled_min > self.stall_threshold_min {
                        return Some(FailureEvent::new(
                            gpu_id.clone(),
                            FailureType::Timeout,
                            format!("No progress for {}m", stalled_min),
                        ));
                    }
                }
            }
        }

        debug!(gpu_id = %gpu_id, "no failure detected");
        None
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
