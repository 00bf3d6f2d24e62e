// SPDX-License-Identifier: MIT

//! Immutable daemon configuration.
//!
//! Loaded once at startup from `SW_*` environment variables, with an
//! optional TOML overlay (`SW_CONFIG`) for the numeric thresholds. Missing
//! required credentials are fatal: the process exits with code 1.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use sw_core::AgentRegistry;
use thiserror::Error;

/// Configuration errors, all fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingRequired(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("config file {path} unreadable: {reason}")]
    File { path: String, reason: String },
}

/// Immutable configuration for the whole daemon.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// This agent's MC identity.
    pub agent_id: String,
    /// This agent's name, used as the alert source for self-originated alerts.
    pub agent_name: String,

    // Remote object store (checkpoint medium two)
    pub object_endpoint: String,
    pub object_bucket: String,
    pub object_region: String,
    pub object_token: String,

    // Checkpoints
    pub local_base_path: PathBuf,
    pub save_interval_s: u64,
    pub retention_keep_n: usize,

    // Network monitor
    pub ping_primary: String,
    pub ping_fallback: String,
    pub ping_interval_s: u64,
    pub ping_timeout_s: u64,
    pub loss_pct_alert: f64,
    pub outage_consecutive_s: f64,
    pub rolling_window_s: f64,
    pub retention_days: u32,

    // Heartbeats
    pub silent_threshold_min: f64,
    pub silent_check_interval_s: u64,
    pub heartbeat_port: u16,
    pub status_port: u16,
    pub heartbeat_db_path: PathBuf,
    pub metrics_db_path: PathBuf,
    pub registry: AgentRegistry,

    // Alerts
    pub alert_cooldown_s: u64,
    pub batch_flush_s: u64,
    pub chat_bot_token: String,
    pub chat_group_id: String,
    pub chat_operator_id: String,

    // Recovery and failover
    pub escalation_timeout_s: u64,
    pub escalation_poll_s: u64,
    pub reconnect_delays_s: Vec<u64>,
    pub failover_budget_ms: u64,
    pub thermal_threshold_c: f64,
    pub stall_threshold_min: i64,
    pub gpu_check_interval_s: u64,
    /// Static primary → backup GPU mapping.
    pub backup_map: HashMap<String, String>,

    // Mission Control
    pub mc_api_url: String,
    pub mc_api_token: String,

    // Logging
    pub log_dir: PathBuf,
}

impl AgentConfig {
    /// Load from process environment plus the optional `SW_CONFIG` overlay.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if let Some(path) = std::env::var("SW_CONFIG").ok().filter(|p| !p.is_empty()) {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::File { path: path.clone(), reason: e.to_string() })?;
            config.apply_overlay(&text, &path)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Build from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            agent_id: string("SW_AGENT_ID", "37c0fd6b"),
            agent_name: string("SW_AGENT_NAME", "NEXUS"),

            object_endpoint: string("SW_OBJECT_ENDPOINT", ""),
            object_bucket: string("SW_OBJECT_BUCKET", ""),
            object_region: string("SW_OBJECT_REGION", "me-south-1"),
            object_token: string("SW_OBJECT_TOKEN", ""),

            local_base_path: string("SW_LOCAL_BASE_PATH", "/var/dc1/checkpoints").into(),
            save_interval_s: parse(&get, "SW_SAVE_INTERVAL_S", 3600)?,
            retention_keep_n: parse(&get, "SW_RETENTION_KEEP_N", 3)?,

            ping_primary: string("SW_PING_PRIMARY", "8.8.8.8"),
            ping_fallback: string("SW_PING_FALLBACK", "1.1.1.1"),
            ping_interval_s: parse(&get, "SW_PING_INTERVAL_S", 10)?,
            ping_timeout_s: parse(&get, "SW_PING_TIMEOUT_S", 5)?,
            loss_pct_alert: parse(&get, "SW_LOSS_PCT_ALERT", 5.0)?,
            outage_consecutive_s: parse(&get, "SW_OUTAGE_CONSECUTIVE_S", 5.0)?,
            rolling_window_s: parse(&get, "SW_ROLLING_WINDOW_S", 60.0)?,
            retention_days: parse(&get, "SW_RETENTION_DAYS", 7)?,

            silent_threshold_min: parse(&get, "SW_SILENT_THRESHOLD_MIN", 130.0)?,
            silent_check_interval_s: parse(&get, "SW_SILENT_CHECK_INTERVAL_S", 600)?,
            heartbeat_port: parse(&get, "SW_HEARTBEAT_PORT", 8086)?,
            status_port: parse(&get, "SW_STATUS_PORT", 8085)?,
            heartbeat_db_path: string("SW_HEARTBEAT_DB", "data/heartbeats.db").into(),
            metrics_db_path: string("SW_METRICS_DB", "data/network_metrics.db").into(),
            registry: parse_registry(get("SW_REGISTRY").as_deref())?,

            alert_cooldown_s: parse(&get, "SW_ALERT_COOLDOWN_S", 600)?,
            batch_flush_s: parse(&get, "SW_BATCH_FLUSH_S", 1800)?,
            chat_bot_token: string("SW_CHAT_BOT_TOKEN", ""),
            chat_group_id: string("SW_CHAT_GROUP_ID", "-5275672778"),
            chat_operator_id: string("SW_CHAT_OPERATOR_ID", "7652446182"),

            escalation_timeout_s: parse(&get, "SW_ESCALATION_TIMEOUT_S", 600)?,
            escalation_poll_s: parse(&get, "SW_ESCALATION_POLL_S", 30)?,
            reconnect_delays_s: parse_delays(get("SW_RECONNECT_DELAYS_S").as_deref())?,
            failover_budget_ms: parse(&get, "SW_FAILOVER_BUDGET_MS", 60_000)?,
            thermal_threshold_c: parse(&get, "SW_THERMAL_THRESHOLD_C", 80.0)?,
            stall_threshold_min: parse(&get, "SW_STALL_THRESHOLD_MIN", 30)?,
            gpu_check_interval_s: parse(&get, "SW_GPU_CHECK_INTERVAL_S", 30)?,
            backup_map: parse_pairs(get("SW_BACKUP_MAP").as_deref(), "SW_BACKUP_MAP")?
                .unwrap_or_else(default_backup_map),

            mc_api_url: string("SW_MC_API_URL", "http://localhost:8084/api"),
            mc_api_token: string("SW_MC_TOKEN", ""),

            log_dir: string("SW_LOG_DIR", "logs").into(),
        })
    }

    /// Reject configs missing required credentials or holding nonsense values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mc_api_token.is_empty() {
            return Err(ConfigError::MissingRequired("SW_MC_TOKEN"));
        }
        if self.chat_bot_token.is_empty() {
            return Err(ConfigError::MissingRequired("SW_CHAT_BOT_TOKEN"));
        }
        if self.object_endpoint.is_empty() {
            return Err(ConfigError::MissingRequired("SW_OBJECT_ENDPOINT"));
        }
        if self.object_bucket.is_empty() {
            return Err(ConfigError::MissingRequired("SW_OBJECT_BUCKET"));
        }
        if self.object_token.is_empty() {
            return Err(ConfigError::MissingRequired("SW_OBJECT_TOKEN"));
        }
        if self.retention_keep_n == 0 {
            return Err(ConfigError::Invalid {
                key: "SW_RETENTION_KEEP_N".into(),
                value: "0".into(),
            });
        }
        if self.ping_interval_s == 0 {
            return Err(ConfigError::Invalid {
                key: "SW_PING_INTERVAL_S".into(),
                value: "0".into(),
            });
        }
        if self.reconnect_delays_s.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SW_RECONNECT_DELAYS_S".into(),
                value: "(empty)".into(),
            });
        }
        Ok(())
    }

    /// Apply a TOML overlay over the env-derived values.
    pub fn apply_overlay(&mut self, text: &str, path: &str) -> Result<(), ConfigError> {
        let overlay: Overlay = toml::from_str(text)
            .map_err(|e| ConfigError::File { path: path.to_string(), reason: e.to_string() })?;

        macro_rules! take {
            ($($field:ident),+ $(,)?) => {
                $( if let Some(v) = overlay.$field { self.$field = v; } )+
            };
        }
        take!(
            save_interval_s,
            retention_keep_n,
            ping_primary,
            ping_fallback,
            ping_interval_s,
            ping_timeout_s,
            loss_pct_alert,
            outage_consecutive_s,
            rolling_window_s,
            retention_days,
            silent_threshold_min,
            alert_cooldown_s,
            batch_flush_s,
            escalation_timeout_s,
            reconnect_delays_s,
            failover_budget_ms,
            thermal_threshold_c,
            stall_threshold_min,
            gpu_check_interval_s,
            backup_map,
        );
        Ok(())
    }
}

/// Fields the TOML overlay may set (thresholds and topology, not secrets).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overlay {
    save_interval_s: Option<u64>,
    retention_keep_n: Option<usize>,
    ping_primary: Option<String>,
    ping_fallback: Option<String>,
    ping_interval_s: Option<u64>,
    ping_timeout_s: Option<u64>,
    loss_pct_alert: Option<f64>,
    outage_consecutive_s: Option<f64>,
    rolling_window_s: Option<f64>,
    retention_days: Option<u32>,
    silent_threshold_min: Option<f64>,
    alert_cooldown_s: Option<u64>,
    batch_flush_s: Option<u64>,
    escalation_timeout_s: Option<u64>,
    reconnect_delays_s: Option<Vec<u64>>,
    failover_budget_ms: Option<u64>,
    thermal_threshold_c: Option<f64>,
    stall_threshold_min: Option<i64>,
    gpu_check_interval_s: Option<u64>,
    backup_map: Option<HashMap<String, String>>,
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => {
            raw.parse().map_err(|_| ConfigError::Invalid { key: key.to_string(), value: raw })
        }
        None => Ok(default),
    }
}

/// Parse `"1,2,4,8,16"`.
fn parse_delays(raw: Option<&str>) -> Result<Vec<u64>, ConfigError> {
    match raw {
        None => Ok(vec![1, 2, 4, 8, 16]),
        Some(raw) => raw
            .split(',')
            .map(|part| {
                part.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "SW_RECONNECT_DELAYS_S".into(),
                    value: raw.to_string(),
                })
            })
            .collect(),
    }
}

/// Parse `"a=b,c=d"`.
fn parse_pairs(
    raw: Option<&str>,
    key: &str,
) -> Result<Option<HashMap<String, String>>, ConfigError> {
    let Some(raw) = raw else { return Ok(None) };
    let mut map = HashMap::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let (k, v) = part.split_once('=').ok_or_else(|| ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
        })?;
        map.insert(k.trim().to_string(), v.trim().to_string());
    }
    Ok(Some(map))
}

fn parse_registry(raw: Option<&str>) -> Result<AgentRegistry, ConfigError> {
    match parse_pairs(raw, "SW_REGISTRY")? {
        None => Ok(AgentRegistry::default_peers()),
        Some(map) => {
            let mut pairs: Vec<(String, String)> = map.into_iter().collect();
            pairs.sort();
            Ok(AgentRegistry::new(pairs))
        }
    }
}

/// The two-GPU site layout: each card backs the other.
fn default_backup_map() -> HashMap<String, String> {
    [
        ("pc1-rtx3090".to_string(), "pc1-rtx3060".to_string()),
        ("pc1-rtx3060".to_string(), "pc1-rtx3090".to_string()),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
