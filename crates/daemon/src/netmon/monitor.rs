// SPDX-License-Identifier: MIT

//! The probe loop and its derived health numbers.
//!
//! Every cycle pings the primary target, falling back to the secondary on
//! failure, records the sample in memory and in the metric store, then
//! evaluates outage and loss conditions. Once per hour of process time the
//! metric store rolls up latency percentiles and prunes past retention.

use crate::alert::AlertRouter;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use sw_adapters::Pinger;
use sw_core::{Alert, Clock, Severity};
use sw_store::MetricStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Monitor thresholds and targets.
#[derive(Debug, Clone)]
pub struct NetmonConfig {
    pub primary: String,
    pub fallback: String,
    pub interval: Duration,
    pub ping_timeout: Duration,
    pub loss_pct_alert: f64,
    pub outage_consecutive_s: f64,
    pub rolling_window_s: f64,
    /// Minimum spacing between outage alerts; the router cannot suppress
    /// them because outages go out CRITICAL (rate-limit bypass).
    pub outage_alert_cooldown_s: f64,
}

/// One probe sample. `latency_ms = None` means the cycle failed both targets.
#[derive(Debug, Clone)]
struct PingSample {
    ts: f64,
    latency_ms: Option<f64>,
}

struct MonitorState {
    samples: VecDeque<PingSample>,
    last_success_ts: f64,
    last_outage: Option<String>,
    last_latency: Option<f64>,
    last_outage_alert_ts: f64,
    hourly_tick: f64,
}

/// `GET /status` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusJson {
    pub status: String,
    pub latency_ms: Option<f64>,
    pub loss_pct: f64,
    pub uptime_pct_24h: f64,
    pub last_outage: Option<String>,
}

/// Uplink monitor for the site.
pub struct NetworkMonitor<C: Clock> {
    config: NetmonConfig,
    pinger: Arc<dyn Pinger>,
    db: Arc<MetricStore>,
    router: Arc<AlertRouter<C>>,
    agent_name: String,
    clock: C,
    state: Mutex<MonitorState>,
}

impl<C: Clock> NetworkMonitor<C> {
    pub fn new(
        config: NetmonConfig,
        pinger: Arc<dyn Pinger>,
        db: Arc<MetricStore>,
        router: Arc<AlertRouter<C>>,
        agent_name: String,
        clock: C,
    ) -> Self {
        let now = clock.epoch_secs();
        Self {
            config,
            pinger,
            db,
            router,
            agent_name,
            clock,
            state: Mutex::new(MonitorState {
                samples: VecDeque::new(),
                // Process start counts as the last success so a failure in
                // the first cycle does not immediately read as an outage.
                last_success_ts: now,
                last_outage: None,
                last_latency: None,
                last_outage_alert_ts: 0.0,
                hourly_tick: now,
            }),
        }
    }

    /// Rolling packet loss over the configured window, in percent.
    pub fn loss_pct(&self) -> f64 {
        let cutoff = self.clock.epoch_secs() - self.config.rolling_window_s;
        let state = self.state.lock();
        let window: Vec<_> = state.samples.iter().filter(|s| s.ts > cutoff).collect();
        if window.is_empty() {
            return 0.0;
        }
        let failed = window.iter().filter(|s| s.latency_ms.is_none()).count();
        failed as f64 / window.len() as f64 * 100.0
    }

    /// Current status document for the HTTP surface.
    pub async fn status_json(&self) -> StatusJson {
        let loss = self.loss_pct();
        let uptime = match self.db.uptime_24h(self.clock.utc_now()).await {
            Ok(uptime) => uptime,
            Err(e) => {
                warn!(error = %e, "uptime query failed");
                100.0
            }
        };
        let state = self.state.lock();
        StatusJson {
            status: if loss > self.config.loss_pct_alert { "degraded" } else { "healthy" }
                .to_string(),
            latency_ms: state.last_latency.map(|l| (l * 100.0).round() / 100.0),
            loss_pct: (loss * 100.0).round() / 100.0,
            uptime_pct_24h: (uptime * 100.0).round() / 100.0,
            last_outage: state.last_outage.clone(),
        }
    }

    /// Probe loop; returns when the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            primary = %self.config.primary,
            fallback = %self.config.fallback,
            "network monitor started"
        );
        loop {
            self.ping_cycle().await;
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("network monitor stopped");
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    async fn ping_cycle(&self) {
        let now = self.clock.epoch_secs();

        let mut target = self.config.primary.as_str();
        let mut latency = self.pinger.ping(target, self.config.ping_timeout).await;
        if latency.is_none() {
            target = self.config.fallback.as_str();
            latency = self.pinger.ping(target, self.config.ping_timeout).await;
        }

        {
            let mut state = self.state.lock();
            state.samples.push_back(PingSample { ts: now, latency_ms: latency });
            let cutoff = now - self.config.rolling_window_s * 2.0;
            while state.samples.front().is_some_and(|s| s.ts < cutoff) {
                state.samples.pop_front();
            }
        }

        if let Err(e) = self.db.record_ping(now, target, latency).await {
            warn!(error = %e, "ping sample persist failed");
        }

        match latency {
            Some(latency_ms) => {
                let mut state = self.state.lock();
                state.last_latency = Some(latency_ms);
                state.last_success_ts = now;
            }
            None => self.handle_failure(now, target).await,
        }

        let loss = self.loss_pct();
        if loss > self.config.loss_pct_alert && latency.is_some() {
            warn!(loss_pct = loss, "packet loss above threshold");
            self.router
                .route(
                    Alert::new(
                        Severity::Medium,
                        self.agent_name.clone(),
                        "High packet loss",
                        format!(
                            "High packet loss detected: {:.1}% over last {}s",
                            loss, self.config.rolling_window_s as u64
                        ),
                    )
                    .with_metadata(serde_json::json!({
                        "loss_pct": (loss * 10.0).round() / 10.0,
                        "duration_s": self.config.rolling_window_s as u64,
                        "target": target,
                    })),
                )
                .await;
        }

        self.hourly_maintenance(now).await;
    }

    async fn handle_failure(&self, now: f64, target: &str) {
        let (gap, should_alert) = {
            let mut state = self.state.lock();
            let gap = now - state.last_success_ts;
            if gap < self.config.outage_consecutive_s {
                return;
            }
            state.last_outage = Some(self.clock.utc_now().to_rfc3339());
            let should_alert =
                now - state.last_outage_alert_ts >= self.config.outage_alert_cooldown_s;
            if should_alert {
                state.last_outage_alert_ts = now;
            }
            (gap, should_alert)
        };

        warn!(gap_s = gap, "network outage detected");
        if should_alert {
            self.router
                .route(
                    Alert::new(
                        Severity::Critical,
                        self.agent_name.clone(),
                        "Network outage",
                        format!("Network outage detected: {}s no response", gap as u64),
                    )
                    .with_metadata(serde_json::json!({
                        "loss_pct": 100,
                        "duration_s": (gap * 10.0).round() / 10.0,
                        "target": target,
                    })),
                )
                .await;
        }
    }

    async fn hourly_maintenance(&self, now: f64) {
        {
            let mut state = self.state.lock();
            if now - state.hourly_tick <= 3600.0 {
                return;
            }
            state.hourly_tick = now;
        }
        let utc_now = self.clock.utc_now();
        if let Err(e) = self.db.compute_hourly_stats(utc_now).await {
            warn!(error = %e, "hourly stats rollup failed");
        }
        if let Err(e) = self.db.prune(utc_now).await {
            warn!(error = %e, "metric prune failed");
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
