// SPDX-License-Identifier: MIT

//! Failure classification and the recovery state machine's data model.

use crate::id::{GpuId, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a GPU interruption presented itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    /// Host answers but SSH is unreachable.
    NetworkLoss,
    /// Reported temperature above the thermal threshold.
    Thermal,
    /// No status response at all.
    PowerLoss,
    /// Job made no progress past the stall threshold.
    Timeout,
}

impl FailureType {
    /// Tag used in audit events and interruption details.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::NetworkLoss => "NETWORK_LOSS",
            FailureType::Thermal => "THERMAL",
            FailureType::PowerLoss => "POWER_LOSS",
            FailureType::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected interruption, handed to the recovery orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub gpu_id: GpuId,
    pub failure_type: FailureType,
    pub detected_at: DateTime<Utc>,
    pub details: String,
}

impl FailureEvent {
    pub fn new(gpu_id: GpuId, failure_type: FailureType, details: impl Into<String>) -> Self {
        Self { gpu_id, failure_type, detected_at: Utc::now(), details: details.into() }
    }
}

/// Recovery state machine states.
///
/// `Running` is initial; `Resolved` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryState {
    Running,
    InterruptionDetected,
    Reconnecting,
    FailingOver,
    Escalating,
    Resolved,
    Failed,
}

impl RecoveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecoveryState::Resolved | RecoveryState::Failed)
    }

    /// Tag used in the audit trail's from/to fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryState::Running => "RUNNING",
            RecoveryState::InterruptionDetected => "INTERRUPTION_DETECTED",
            RecoveryState::Reconnecting => "RECONNECTING",
            RecoveryState::FailingOver => "FAILING_OVER",
            RecoveryState::Escalating => "ESCALATING",
            RecoveryState::Resolved => "RESOLVED",
            RecoveryState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-interruption recovery bookkeeping, discarded on terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryContext {
    pub job_id: JobId,
    pub gpu_id: GpuId,
    pub state: RecoveryState,
    pub interrupt_type: FailureType,
    pub reconnect_attempts: u32,
    pub failover_attempted: bool,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RecoveryContext {
    pub fn new(job_id: JobId, gpu_id: GpuId, interrupt_type: FailureType) -> Self {
        Self {
            job_id,
            gpu_id,
            state: RecoveryState::Running,
            interrupt_type,
            reconnect_attempts: 0,
            failover_attempted: false,
            started_at: Utc::now(),
            resolved_at: None,
        }
    }
}

/// Outcome of one failover run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverResult {
    pub success: bool,
    pub time_taken_ms: u64,
    pub data_integrity_verified: bool,
    pub failed_gpu: GpuId,
    pub backup_gpu: GpuId,
    pub job_id: JobId,
    pub checkpoint_used: String,
    pub error: String,
}

impl FailoverResult {
    pub fn failed(
        job_id: JobId,
        failed_gpu: GpuId,
        backup_gpu: GpuId,
        time_taken_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            time_taken_ms,
            data_integrity_verified: false,
            failed_gpu,
            backup_gpu,
            job_id,
            checkpoint_used: String::new(),
            error: error.into(),
        }
    }
}

/// Outcome of a failover drill against a scratch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillResult {
    pub success: bool,
    pub failover_time_ms: u64,
    /// Bytes of state lost; 0 when the checkpoint verified, -1 otherwise.
    pub data_loss: i64,
    pub notes: String,
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
