// SPDX-License-Identifier: MIT

//! The alert router: one entry point, severity decides the fan-out.
//!
//! Routing matrix:
//!
//! | severity | operator DM | group chat | MC API | batched | rate-limited |
//! |----------|-------------|------------|--------|---------|--------------|
//! | CRITICAL | yes         | yes        | yes    | no      | no (bypass)  |
//! | HIGH     | -           | yes        | yes    | no      | yes          |
//! | MEDIUM   | -           | -          | yes    | no      | yes          |
//! | LOW      | -           | -          | -      | yes     | yes          |
//!
//! Rate limiting is per `(source_agent, title)` with a fixed cooldown;
//! suppressed alerts are dropped, never queued. LOW alerts accumulate into a
//! batch flushed once per window as a single MEDIUM summary. Transport
//! failures are logged and swallowed: delivery is at-most-once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sw_adapters::{ChatTransport, McApi};
use sw_core::{Alert, Clock, Severity};
use tracing::{info, warn};

/// Router wiring and identities.
pub struct RouterConfig {
    /// MC identity used on the alerts endpoint.
    pub agent_id: String,
    /// Source name for router-originated alerts (batch summaries).
    pub agent_name: String,
    pub group_chat_id: String,
    pub operator_chat_id: String,
    pub cooldown: Duration,
    pub batch_flush: Duration,
}

#[derive(Default)]
struct RouterInner {
    rate_cache: HashMap<(String, String), Instant>,
    batch: Vec<Alert>,
    batch_timer_armed: bool,
}

/// Severity-based alert router. Shared as `Arc` across every component.
pub struct AlertRouter<C: Clock> {
    chat: Arc<dyn ChatTransport>,
    mc: Arc<dyn McApi>,
    clock: C,
    config: RouterConfig,
    /// Shared with the one-shot batch flush task.
    inner: Arc<Mutex<RouterInner>>,
}

impl<C: Clock> AlertRouter<C> {
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        mc: Arc<dyn McApi>,
        clock: C,
        config: RouterConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            chat,
            mc,
            clock,
            config,
            inner: Arc::new(Mutex::new(RouterInner::default())),
        })
    }

    /// Route one alert according to the matrix.
    pub async fn route(&self, alert: Alert) {
        info!(
            severity = %alert.severity,
            source = %alert.source_agent,
            title = %alert.title,
            "routing alert"
        );

        if alert.severity == Severity::Critical {
            // Critical: immediate, bypasses the rate limiter entirely.
            self.send_chat(&alert, &self.config.operator_chat_id).await;
            self.send_chat(&alert, &self.config.group_chat_id).await;
            send_mc(&*self.mc, &self.config.agent_id, &alert).await;
            return;
        }

        if self.is_rate_limited(&alert) {
            info!(source = %alert.source_agent, title = %alert.title, "alert rate-limited");
            return;
        }

        match alert.severity {
            Severity::Low => self.enqueue_low(alert),
            Severity::Medium => send_mc(&*self.mc, &self.config.agent_id, &alert).await,
            Severity::High => {
                self.send_chat(&alert, &self.config.group_chat_id).await;
                send_mc(&*self.mc, &self.config.agent_id, &alert).await;
            }
            Severity::Critical => {}
        }
    }

    /// Record the alert against its key; true when still inside the cooldown.
    fn is_rate_limited(&self, alert: &Alert) -> bool {
        let key = alert.rate_key();
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if let Some(last) = inner.rate_cache.get(&key) {
            if now.duration_since(*last) < self.config.cooldown {
                return true;
            }
        }
        inner.rate_cache.insert(key, now);
        false
    }

    /// Append to the batch; the first LOW alert arms the one-shot flush timer.
    fn enqueue_low(&self, alert: Alert) {
        let mut inner = self.inner.lock();
        inner.batch.push(alert);
        if inner.batch_timer_armed {
            return;
        }
        inner.batch_timer_armed = true;
        drop(inner);

        let inner = Arc::clone(&self.inner);
        let mc = Arc::clone(&self.mc);
        let agent_id = self.config.agent_id.clone();
        let agent_name = self.config.agent_name.clone();
        let delay = self.config.batch_flush;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flush(&inner, &*mc, &agent_id, &agent_name).await;
        });
    }

    /// Emit one MEDIUM summary for the accumulated batch, then clear it.
    pub async fn flush_batch(&self) {
        flush(&self.inner, &*self.mc, &self.config.agent_id, &self.config.agent_name).await;
    }

    /// Number of alerts currently batched (test introspection).
    pub fn batched(&self) -> usize {
        self.inner.lock().batch.len()
    }

    async fn send_chat(&self, alert: &Alert, chat_id: &str) {
        if chat_id.is_empty() {
            return;
        }
        let text = if alert.severity == Severity::Critical {
            format!("[CRITICAL] {} {}\n{}", alert.source_agent, alert.title, alert.message)
        } else {
            format!("[{}] {}\n{}", alert.source_agent, alert.title, alert.message)
        };
        if let Err(e) = self.chat.send(chat_id, &text).await {
            warn!(chat_id, error = %e, "chat alert delivery failed");
        }
    }
}

async fn flush(inner: &Mutex<RouterInner>, mc: &dyn McApi, agent_id: &str, agent_name: &str) {
    let batch = {
        let mut inner = inner.lock();
        inner.batch_timer_armed = false;
        std::mem::take(&mut inner.batch)
    };
    if batch.is_empty() {
        return;
    }

    let mut summary = format!("Batched alerts ({}):\n", batch.len());
    for alert in &batch {
        summary.push_str(&format!(
            "- [{}] {}: {}\n",
            alert.severity.as_str().to_uppercase(),
            alert.source_agent,
            alert.title
        ));
    }
    info!(count = batch.len(), "flushing batched alerts");

    let summary_alert = Alert::new(
        Severity::Medium,
        agent_name,
        format!("Batch Summary ({} alerts)", batch.len()),
        summary,
    );
    send_mc(mc, agent_id, &summary_alert).await;
}

async fn send_mc(mc: &dyn McApi, agent_id: &str, alert: &Alert) {
    let message = format!("[{}] {}: {}", alert.source_agent, alert.title, alert.message);
    if let Err(e) =
        mc.post_alert(agent_id, alert.severity.as_str(), &message, &alert.metadata).await
    {
        warn!(error = %e, "MC alert delivery failed");
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
