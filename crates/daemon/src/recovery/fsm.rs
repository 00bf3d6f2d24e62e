// SPDX-License-Identifier: MIT

//! The per-interruption recovery state machine.
//!
//! ```text
//! RUNNING → INTERRUPTION_DETECTED → RECONNECTING → RUNNING (probe ok)
//!                                        │
//!                                        └→ FAILING_OVER → RUNNING (failover ok)
//!                                                │
//!                                                └→ ESCALATING → RESOLVED | FAILED
//! ```
//!
//! Reconnect attempts follow the configured backoff schedule. Escalation
//! raises the operator (CRITICAL alert + audit), then polls MC for an
//! external resolution until the window expires. Every transition is
//! shipped to the MC audit trail.

use crate::alert::AlertRouter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sw_adapters::{McApi, SshProbe};
use sw_core::{
    Alert, Clock, FailureType, GpuId, JobId, RecoveryContext, RecoveryState, Severity,
};
use tracing::{info, warn};

use super::FailoverController;

/// Recovery policy knobs.
pub struct RecoveryConfig {
    /// Static primary → backup GPU mapping.
    pub backup_map: HashMap<String, String>,
    /// Seconds slept before each reconnect attempt.
    pub reconnect_delays_s: Vec<u64>,
    pub escalation_timeout: Duration,
    pub escalation_poll: Duration,
    /// Source name for escalation alerts.
    pub agent_name: String,
}

pub struct RecoveryOrchestrator<C: Clock> {
    mc: Arc<dyn McApi>,
    probe: Arc<dyn SshProbe>,
    failover: FailoverController<C>,
    router: Arc<AlertRouter<C>>,
    config: RecoveryConfig,
    clock: C,
}

impl<C: Clock> RecoveryOrchestrator<C> {
    pub fn new(
        mc: Arc<dyn McApi>,
        probe: Arc<dyn SshProbe>,
        failover: FailoverController<C>,
        router: Arc<AlertRouter<C>>,
        config: RecoveryConfig,
        clock: C,
    ) -> Self {
        Self { mc, probe, failover, router, config, clock }
    }

    /// Drive one interruption to a terminal state.
    pub async fn handle_interruption(
        &self,
        job_id: JobId,
        gpu_id: GpuId,
        interrupt_type: FailureType,
    ) -> RecoveryContext {
        let mut ctx = RecoveryContext::new(job_id, gpu_id, interrupt_type);
        self.transition(
            &mut ctx,
            RecoveryState::InterruptionDetected,
            &format!("type={}", interrupt_type),
        )
        .await;
        self.transition(&mut ctx, RecoveryState::Reconnecting, "").await;

        // Exponential-backoff reconnect.
        for (attempt, delay) in self.config.reconnect_delays_s.iter().enumerate() {
            ctx.reconnect_attempts = attempt as u32 + 1;
            tokio::time::sleep(Duration::from_secs(*delay)).await;
            if self.attempt_reconnect(&ctx.gpu_id).await {
                let detail = format!("Reconnected after {} attempts", ctx.reconnect_attempts);
                self.transition(&mut ctx, RecoveryState::Running, &detail).await;
                return self.resolve(ctx);
            }
        }

        let detail = format!("{} retries exhausted", ctx.reconnect_attempts);
        self.transition(&mut ctx, RecoveryState::FailingOver, &detail).await;

        let backup =
            self.config.backup_map.get(ctx.gpu_id.as_str()).map(|b| GpuId::from(b.as_str()));
        if let Some(backup) = &backup {
            let result = self.failover.failover(&ctx.job_id, &ctx.gpu_id, backup).await;
            ctx.failover_attempted = true;
            if result.success {
                let detail = format!("Failover to {} succeeded", backup);
                self.transition(&mut ctx, RecoveryState::Running, &detail).await;
                return self.resolve(ctx);
            }
        } else {
            ctx.failover_attempted = true;
        }

        self.transition(&mut ctx, RecoveryState::Escalating, "Backup GPU also unavailable").await;
        self.escalate(&ctx, backup.as_ref()).await;

        // Wait for an external resolution within the escalation window.
        let deadline = tokio::time::Instant::now() + self.config.escalation_timeout;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(self.config.escalation_poll).await;
            let running = self
                .mc
                .job_progress(&ctx.job_id)
                .await
                .is_some_and(|p| p.status.as_deref() == Some("running"));
            if running {
                self.transition(&mut ctx, RecoveryState::Resolved, "Manual intervention succeeded")
                    .await;
                ctx.resolved_at = Some(self.clock.utc_now());
                return ctx;
            }
        }

        self.transition(&mut ctx, RecoveryState::Failed, "Escalation window expired").await;
        ctx
    }

    /// Probe the GPU's SSH host through MC status.
    async fn attempt_reconnect(&self, gpu_id: &GpuId) -> bool {
        let Some(status) = self.mc.gpu_status(gpu_id).await else { return false };
        let Some(host) = status.ssh_host.filter(|h| !h.is_empty()) else { return false };
        self.probe.check(&host).await
    }

    /// Raise the operator: CRITICAL alert through the router + audit event.
    async fn escalate(&self, ctx: &RecoveryContext, backup: Option<&GpuId>) {
        let reason = format!(
            "Primary {} down, backup {} also unavailable. Type: {}",
            ctx.gpu_id,
            backup.map(|b| b.as_str()).unwrap_or("N/A"),
            ctx.interrupt_type,
        );
        warn!(job_id = %ctx.job_id, %reason, "escalating to operator");

        self.router
            .route(Alert::new(
                Severity::Critical,
                self.config.agent_name.clone(),
                "Manual intervention required",
                format!("Job {} needs manual intervention. {} GPU: {}", ctx.job_id, reason, ctx.gpu_id),
            ))
            .await;

        if let Err(e) = self
            .mc
            .post_audit(
                "escalation_critical",
                serde_json::json!({
                    "job_id": ctx.job_id.as_str(),
                    "gpu_id": ctx.gpu_id.as_str(),
                    "reason": reason,
                    "severity": "critical",
                }),
            )
            .await
        {
            warn!(error = %e, "escalation audit failed");
        }
    }

    fn resolve(&self, mut ctx: RecoveryContext) -> RecoveryContext {
        ctx.resolved_at = Some(self.clock.utc_now());
        ctx.state = RecoveryState::Resolved;
        ctx
    }

    /// Record a state transition in the log and the MC audit trail.
    async fn transition(&self, ctx: &mut RecoveryContext, to: RecoveryState, detail: &str) {
        let from = ctx.state;
        ctx.state = to;
        info!(
            job_id = %ctx.job_id,
            gpu_id = %ctx.gpu_id,
            %from,
            %to,
            attempt = ctx.reconnect_attempts,
            detail,
            "recovery transition"
        );
        if let Err(e) = self
            .mc
            .post_audit(
                "recovery_state_transition",
                serde_json::json!({
                    "job_id": ctx.job_id.as_str(),
                    "gpu_id": ctx.gpu_id.as_str(),
                    "from": from.as_str(),
                    "to": to.as_str(),
                    "attempt": ctx.reconnect_attempts,
                    "details": detail,
                }),
            )
            .await
        {
            warn!(error = %e, "transition audit failed");
        }
    }
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
