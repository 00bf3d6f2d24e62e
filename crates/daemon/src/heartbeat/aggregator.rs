// SPDX-License-Identifier: MIT

//! Liveness bookkeeping over the durable heartbeat store.

use sw_core::{AgentRegistry, AgentStatus, Clock};
use sw_store::{HeartbeatRecord, HeartbeatStore, HeartbeatStoreError};
use tracing::warn;
use uuid::Uuid;

/// Accepts heartbeats and derives per-peer liveness.
///
/// Records are attributed through the registry; unknown agent ids are kept
/// under their raw id. Nothing is ever deleted here.
pub struct HeartbeatAggregator<C: Clock> {
    store: HeartbeatStore,
    registry: AgentRegistry,
    silent_threshold_min: f64,
    clock: C,
}

impl<C: Clock> HeartbeatAggregator<C> {
    pub fn new(
        store: HeartbeatStore,
        registry: AgentRegistry,
        silent_threshold_min: f64,
        clock: C,
    ) -> Self {
        Self { store, registry, silent_threshold_min, clock }
    }

    /// Record one heartbeat with a server-side UTC timestamp.
    pub async fn record(
        &self,
        agent_id: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), HeartbeatStoreError> {
        let record = HeartbeatRecord {
            id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            agent_name: self.registry.name_for(agent_id).to_string(),
            message: message.to_string(),
            metadata,
            ts: self.clock.utc_now(),
        };
        self.store.insert(&record).await
    }

    /// Derived status for every registered peer, in registration order.
    pub async fn status(&self) -> Vec<AgentStatus> {
        let now = self.clock.utc_now();
        let mut statuses = Vec::with_capacity(self.registry.len());
        for (name, id) in self.registry.iter() {
            let last_seen = match self.store.last_seen(id).await {
                Ok(last_seen) => last_seen,
                Err(e) => {
                    warn!(agent = name, error = %e, "heartbeat lookup failed");
                    None
                }
            };
            statuses.push(AgentStatus::derive(name, id, last_seen, now, self.silent_threshold_min));
        }
        statuses
    }

    /// Status for one peer by registered name (case-insensitive).
    pub async fn status_for(&self, name: &str) -> Option<AgentStatus> {
        let id = self.registry.id_for(name)?.to_string();
        let now = self.clock.utc_now();
        let last_seen = self.store.last_seen(&id).await.ok().flatten();
        let registered = self.registry.name_for(&id).to_string();
        Some(AgentStatus::derive(registered, id, last_seen, now, self.silent_threshold_min))
    }

    /// Registered peers currently considered dead.
    pub async fn silent_peers(&self) -> Vec<AgentStatus> {
        self.status().await.into_iter().filter(|s| !s.is_alive).collect()
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
