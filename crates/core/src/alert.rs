// SPDX-License-Identifier: MIT

//! Alert severity levels and the alert record shipped to transports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an alert, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Wire tag, as sent on the MC alerts endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert on its way to the router.
///
/// Fire-and-forget after a delivery attempt; transports never feed back
/// into the producing component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub severity: Severity,
    /// Name of the component or peer that raised the alert.
    pub source_agent: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: Severity,
        source_agent: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            source_agent: source_agent.into(),
            title: title.into(),
            message: message.into(),
            metadata: serde_json::Value::Null,
            ts: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Rate-limit key: alerts with the same source and title share a cooldown.
    pub fn rate_key(&self) -> (String, String) {
        (self.source_agent.clone(), self.title.clone())
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
