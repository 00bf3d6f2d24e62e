// SPDX-License-Identifier: MIT

//! Registry of cooperating site agents and their derived liveness status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed mapping of agent name → agent id for the site's peers.
///
/// Built once at startup from configuration and never mutated. Heartbeats
/// from ids outside the registry are still accepted; they are attributed to
/// their raw id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegistry {
    peers: Vec<(String, String)>,
}

impl AgentRegistry {
    pub fn new(peers: Vec<(String, String)>) -> Self {
        Self { peers }
    }

    /// The default peer set for a single site deployment.
    pub fn default_peers() -> Self {
        Self::new(
            [
                ("NEXUS", "37c0fd6b"),
                ("ATLAS", "3149e473"),
                ("VOLT", "1293aef8"),
                ("GUARDIAN", "3bad1840"),
                ("SPARK", "4aa8d644"),
                ("SYNC", "cb6a5cc5"),
            ]
            .into_iter()
            .map(|(n, i)| (n.to_string(), i.to_string()))
            .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterate `(name, id)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.peers.iter().map(|(n, i)| (n.as_str(), i.as_str()))
    }

    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.peers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, i)| i.as_str())
    }

    /// Resolve an id to its registered name, falling back to the raw id.
    pub fn name_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.peers.iter().find(|(_, i)| i == id).map(|(n, _)| n.as_str()).unwrap_or(id)
    }
}

/// Derived liveness of one registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_name: String,
    pub agent_id: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub silent_minutes: Option<f64>,
    pub is_alive: bool,
    pub message: Option<String>,
}

impl AgentStatus {
    /// Derive a status from the most recent heartbeat (if any).
    ///
    /// `alive` iff seen at all and the silence is under the threshold.
    pub fn derive(
        agent_name: impl Into<String>,
        agent_id: impl Into<String>,
        last_seen: Option<(DateTime<Utc>, Option<String>)>,
        now: DateTime<Utc>,
        silent_threshold_min: f64,
    ) -> Self {
        match last_seen {
            Some((ts, message)) => {
                let silent = (now - ts).num_milliseconds() as f64 / 60_000.0;
                Self {
                    agent_name: agent_name.into(),
                    agent_id: agent_id.into(),
                    last_seen: Some(ts),
                    silent_minutes: Some(silent),
                    is_alive: silent < silent_threshold_min,
                    message,
                }
            }
            None => Self {
                agent_name: agent_name.into(),
                agent_id: agent_id.into(),
                last_seen: None,
                silent_minutes: None,
                is_alive: false,
                message: None,
            },
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
