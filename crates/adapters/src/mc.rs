// SPDX-License-Identifier: MIT

//! Mission Control HTTP API client.
//!
//! Read paths (`gpu_status`, `gpu_metrics`, `job_progress`) collapse every
//! failure to `None` - callers treat an unreachable MC the same as a missing
//! resource. Write paths surface errors so the failover controller can react.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;
use sw_core::{GpuId, JobId};
use thiserror::Error;
use tracing::debug;

/// Errors from MC write operations.
#[derive(Debug, Error)]
pub enum McError {
    #[error("MC request failed: {0}")]
    Request(String),

    #[error("MC returned status {0}")]
    Status(u16),
}

/// GPU worker status as reported by MC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GpuStatus {
    #[serde(default)]
    pub ssh_host: Option<String>,
    #[serde(default)]
    pub current_job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// GPU telemetry as reported by MC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GpuMetrics {
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Job progress as reported by MC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobProgress {
    #[serde(default)]
    pub gpu_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_progress_at: Option<DateTime<Utc>>,
}

/// Outbound Mission Control API.
#[async_trait]
pub trait McApi: Send + Sync {
    async fn gpu_status(&self, gpu_id: &GpuId) -> Option<GpuStatus>;
    async fn gpu_metrics(&self, gpu_id: &GpuId) -> Option<GpuMetrics>;
    async fn job_progress(&self, job_id: &JobId) -> Option<JobProgress>;

    async fn relaunch_job(
        &self,
        job_id: &JobId,
        target_gpu: &GpuId,
        checkpoint_path: &str,
    ) -> Result<(), McError>;

    async fn notify_tenant(&self, job_id: &JobId, message: &str) -> Result<(), McError>;

    async fn create_drill_job(&self, gpu_id: &GpuId) -> Result<JobId, McError>;

    async fn delete_job(&self, job_id: &JobId) -> Result<(), McError>;

    async fn post_alert(
        &self,
        agent_id: &str,
        level: &str,
        message: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), McError>;

    async fn post_audit(&self, event_type: &str, details: serde_json::Value) -> Result<(), McError>;

    async fn post_heartbeat(
        &self,
        agent_id: &str,
        job_id: &JobId,
        message: &str,
    ) -> Result<(), McError>;
}

/// Production MC client over HTTP with bearer auth.
pub struct HttpMcApi {
    base: String,
    token: String,
    client: reqwest::Client,
}

impl HttpMcApi {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { base: base.into().trim_end_matches('/').to_string(), token: token.into(), client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Option<T> {
        let result = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(resp) => match resp.json::<T>().await {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(path, error = %e, "MC response body unreadable");
                    None
                }
            },
            Err(e) => {
                debug!(path, error = %e, "MC GET failed");
                None
            }
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<reqwest::Response, McError> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| McError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(McError::Status(resp.status().as_u16()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl McApi for HttpMcApi {
    async fn gpu_status(&self, gpu_id: &GpuId) -> Option<GpuStatus> {
        self.get_json(&format!("/gpus/{}", gpu_id)).await
    }

    async fn gpu_metrics(&self, gpu_id: &GpuId) -> Option<GpuMetrics> {
        self.get_json(&format!("/gpus/{}/metrics", gpu_id)).await
    }

    async fn job_progress(&self, job_id: &JobId) -> Option<JobProgress> {
        self.get_json(&format!("/jobs/{}", job_id)).await
    }

    async fn relaunch_job(
        &self,
        job_id: &JobId,
        target_gpu: &GpuId,
        checkpoint_path: &str,
    ) -> Result<(), McError> {
        let body = serde_json::json!({
            "target_gpu": target_gpu.as_str(),
            "checkpoint_path": checkpoint_path,
        });
        self.post_json(&format!("/jobs/{}/relaunch", job_id), &body, Duration::from_secs(15))
            .await?;
        Ok(())
    }

    async fn notify_tenant(&self, job_id: &JobId, message: &str) -> Result<(), McError> {
        let body = serde_json::json!({ "message": message });
        self.post_json(&format!("/jobs/{}/notify", job_id), &body, Duration::from_secs(5)).await?;
        Ok(())
    }

    async fn create_drill_job(&self, gpu_id: &GpuId) -> Result<JobId, McError> {
        let body = serde_json::json!({
            "type": "failover_drill",
            "gpu_id": gpu_id.as_str(),
            "test": true,
        });
        let resp = self.post_json("/jobs", &body, Duration::from_secs(10)).await?;
        let value: serde_json::Value =
            resp.json().await.map_err(|e| McError::Request(e.to_string()))?;
        let id = value.get("id").and_then(|v| v.as_str()).unwrap_or("drill-job");
        Ok(JobId::from(id))
    }

    async fn delete_job(&self, job_id: &JobId) -> Result<(), McError> {
        let resp = self
            .client
            .delete(self.url(&format!("/jobs/{}", job_id)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| McError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(McError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn post_alert(
        &self,
        agent_id: &str,
        level: &str,
        message: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), McError> {
        let body = serde_json::json!({
            "agent_id": agent_id,
            "level": level,
            "message": message,
            "metadata": metadata,
        });
        self.post_json("/alerts", &body, Duration::from_secs(10)).await?;
        Ok(())
    }

    async fn post_audit(&self, event_type: &str, details: serde_json::Value) -> Result<(), McError> {
        let body = serde_json::json!({
            "event_type": event_type,
            "severity": "high",
            "details": details,
            "source": "siteward",
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.post_json("/security/audit", &body, Duration::from_secs(5)).await?;
        Ok(())
    }

    async fn post_heartbeat(
        &self,
        agent_id: &str,
        job_id: &JobId,
        message: &str,
    ) -> Result<(), McError> {
        let body = serde_json::json!({
            "agent_id": agent_id,
            "job_id": job_id.as_str(),
            "message": message,
            "ts": Utc::now().to_rfc3339(),
        });
        self.post_json("/heartbeat", &body, Duration::from_secs(5)).await?;
        Ok(())
    }
}

/// Recorded audit event (fake introspection).
#[derive(Debug, Clone, PartialEq)]
pub struct AuditCall {
    pub event_type: String,
    pub details: serde_json::Value,
}

#[derive(Default)]
struct FakeMcState {
    gpu_status: HashMap<String, GpuStatus>,
    gpu_metrics: HashMap<String, GpuMetrics>,
    job_progress: HashMap<String, VecDeque<JobProgress>>,
    relaunch_ok: bool,
    relaunch_calls: Vec<(JobId, GpuId, String)>,
    notify_calls: Vec<(JobId, String)>,
    notify_ok: bool,
    alerts: Vec<(String, String)>,
    audits: Vec<AuditCall>,
    heartbeats: Vec<(JobId, String)>,
    deleted: Vec<JobId>,
    drill_job: Option<JobId>,
}

/// In-memory MC double that records calls and serves scripted responses.
pub struct FakeMcApi {
    state: Mutex<FakeMcState>,
}

impl Default for FakeMcApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMcApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeMcState {
                relaunch_ok: true,
                notify_ok: true,
                ..Default::default()
            }),
        }
    }

    pub fn set_gpu_status(&self, gpu_id: &str, status: Option<GpuStatus>) {
        let mut state = self.state.lock();
        match status {
            Some(s) => state.gpu_status.insert(gpu_id.to_string(), s),
            None => state.gpu_status.remove(gpu_id),
        };
    }

    pub fn set_gpu_temperature(&self, gpu_id: &str, temperature: Option<f64>) {
        self.state.lock().gpu_metrics.insert(gpu_id.to_string(), GpuMetrics { temperature });
    }

    /// Queue progress responses; the final entry repeats once drained.
    pub fn set_job_progress(&self, job_id: &str, sequence: Vec<JobProgress>) {
        self.state.lock().job_progress.insert(job_id.to_string(), sequence.into());
    }

    pub fn set_relaunch_ok(&self, ok: bool) {
        self.state.lock().relaunch_ok = ok;
    }

    pub fn set_notify_ok(&self, ok: bool) {
        self.state.lock().notify_ok = ok;
    }

    pub fn set_drill_job(&self, job_id: &str) {
        self.state.lock().drill_job = Some(JobId::from(job_id));
    }

    pub fn audits(&self) -> Vec<AuditCall> {
        self.state.lock().audits.clone()
    }

    pub fn audit_event_types(&self) -> Vec<String> {
        self.state.lock().audits.iter().map(|a| a.event_type.clone()).collect()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.state.lock().alerts.clone()
    }

    pub fn relaunch_calls(&self) -> Vec<(JobId, GpuId, String)> {
        self.state.lock().relaunch_calls.clone()
    }

    pub fn notify_calls(&self) -> Vec<(JobId, String)> {
        self.state.lock().notify_calls.clone()
    }

    pub fn heartbeats(&self) -> Vec<(JobId, String)> {
        self.state.lock().heartbeats.clone()
    }

    pub fn deleted_jobs(&self) -> Vec<JobId> {
        self.state.lock().deleted.clone()
    }
}

#[async_trait]
impl McApi for FakeMcApi {
    async fn gpu_status(&self, gpu_id: &GpuId) -> Option<GpuStatus> {
        self.state.lock().gpu_status.get(gpu_id.as_str()).cloned()
    }

    async fn gpu_metrics(&self, gpu_id: &GpuId) -> Option<GpuMetrics> {
        self.state.lock().gpu_metrics.get(gpu_id.as_str()).cloned()
    }

    async fn job_progress(&self, job_id: &JobId) -> Option<JobProgress> {
        let mut state = self.state.lock();
        let queue = state.job_progress.get_mut(job_id.as_str())?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    async fn relaunch_job(
        &self,
        job_id: &JobId,
        target_gpu: &GpuId,
        checkpoint_path: &str,
    ) -> Result<(), McError> {
        let mut state = self.state.lock();
        state.relaunch_calls.push((job_id.clone(), target_gpu.clone(), checkpoint_path.into()));
        if state.relaunch_ok {
            Ok(())
        } else {
            Err(McError::Status(503))
        }
    }

    async fn notify_tenant(&self, job_id: &JobId, message: &str) -> Result<(), McError> {
        let mut state = self.state.lock();
        state.notify_calls.push((job_id.clone(), message.to_string()));
        if state.notify_ok {
            Ok(())
        } else {
            Err(McError::Status(503))
        }
    }

    async fn create_drill_job(&self, gpu_id: &GpuId) -> Result<JobId, McError> {
        let _ = gpu_id;
        self.state.lock().drill_job.clone().ok_or(McError::Status(503))
    }

    async fn delete_job(&self, job_id: &JobId) -> Result<(), McError> {
        self.state.lock().deleted.push(job_id.clone());
        Ok(())
    }

    async fn post_alert(
        &self,
        _agent_id: &str,
        level: &str,
        message: &str,
        _metadata: &serde_json::Value,
    ) -> Result<(), McError> {
        self.state.lock().alerts.push((level.to_string(), message.to_string()));
        Ok(())
    }

    async fn post_audit(&self, event_type: &str, details: serde_json::Value) -> Result<(), McError> {
        self.state.lock().audits.push(AuditCall { event_type: event_type.to_string(), details });
        Ok(())
    }

    async fn post_heartbeat(
        &self,
        _agent_id: &str,
        job_id: &JobId,
        message: &str,
    ) -> Result<(), McError> {
        self.state.lock().heartbeats.push((job_id.clone(), message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "mc_tests.rs"]
mod tests;
