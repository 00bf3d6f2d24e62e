// SPDX-License-Identifier: MIT

use super::*;

fn base_vars() -> HashMap<String, String> {
    [
        ("SW_MC_TOKEN", "mc-token"),
        ("SW_CHAT_BOT_TOKEN", "bot-token"),
        ("SW_OBJECT_ENDPOINT", "http://objects.local"),
        ("SW_OBJECT_BUCKET", "ckpt"),
        ("SW_OBJECT_TOKEN", "obj-token"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn load(vars: &HashMap<String, String>) -> Result<AgentConfig, ConfigError> {
    let config = AgentConfig::from_lookup(|key| vars.get(key).cloned())?;
    config.validate()?;
    Ok(config)
}

#[test]
fn defaults_match_spec_table() {
    let config = load(&base_vars()).unwrap();
    assert_eq!(config.local_base_path, PathBuf::from("/var/dc1/checkpoints"));
    assert_eq!(config.save_interval_s, 3600);
    assert_eq!(config.retention_keep_n, 3);
    assert_eq!(config.ping_interval_s, 10);
    assert_eq!(config.ping_timeout_s, 5);
    assert_eq!(config.loss_pct_alert, 5.0);
    assert_eq!(config.outage_consecutive_s, 5.0);
    assert_eq!(config.rolling_window_s, 60.0);
    assert_eq!(config.retention_days, 7);
    assert_eq!(config.silent_threshold_min, 130.0);
    assert_eq!(config.alert_cooldown_s, 600);
    assert_eq!(config.batch_flush_s, 1800);
    assert_eq!(config.escalation_timeout_s, 600);
    assert_eq!(config.reconnect_delays_s, vec![1, 2, 4, 8, 16]);
    assert_eq!(config.failover_budget_ms, 60_000);
    assert_eq!(config.thermal_threshold_c, 80.0);
    assert_eq!(config.stall_threshold_min, 30);
    assert_eq!(config.registry.len(), 6);
}

#[test]
fn missing_mc_token_is_fatal() {
    let mut vars = base_vars();
    vars.remove("SW_MC_TOKEN");
    let err = load(&vars).unwrap_err();
    assert!(matches!(err, ConfigError::MissingRequired("SW_MC_TOKEN")));
}

#[test]
fn missing_object_credentials_are_fatal() {
    for key in ["SW_OBJECT_ENDPOINT", "SW_OBJECT_BUCKET", "SW_OBJECT_TOKEN"] {
        let mut vars = base_vars();
        vars.remove(key);
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::MissingRequired(k) if k == key));
    }
}

#[test]
fn invalid_numeric_value_reports_key() {
    let mut vars = base_vars();
    vars.insert("SW_PING_INTERVAL_S".into(), "soon".into());
    let err = load(&vars).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "SW_PING_INTERVAL_S"));
}

#[test]
fn zero_keep_n_rejected() {
    let mut vars = base_vars();
    vars.insert("SW_RETENTION_KEEP_N".into(), "0".into());
    assert!(load(&vars).is_err());
}

#[test]
fn delays_parse_from_comma_list() {
    let mut vars = base_vars();
    vars.insert("SW_RECONNECT_DELAYS_S".into(), "2, 4, 8".into());
    let config = load(&vars).unwrap();
    assert_eq!(config.reconnect_delays_s, vec![2, 4, 8]);
}

#[test]
fn backup_map_parses_pairs() {
    let mut vars = base_vars();
    vars.insert("SW_BACKUP_MAP".into(), "gpu-a=gpu-b,gpu-b=gpu-a".into());
    let config = load(&vars).unwrap();
    assert_eq!(config.backup_map.get("gpu-a").map(String::as_str), Some("gpu-b"));
    assert_eq!(config.backup_map.get("gpu-b").map(String::as_str), Some("gpu-a"));
}

#[test]
fn registry_parses_pairs() {
    let mut vars = base_vars();
    vars.insert("SW_REGISTRY".into(), "ALPHA=a1,BETA=b2".into());
    let config = load(&vars).unwrap();
    assert_eq!(config.registry.len(), 2);
    assert_eq!(config.registry.id_for("ALPHA"), Some("a1"));
}

#[test]
fn overlay_overrides_thresholds() {
    let mut config = load(&base_vars()).unwrap();
    config
        .apply_overlay(
            r#"
            loss_pct_alert = 2.5
            reconnect_delays_s = [1, 1, 1]
            [backup_map]
            "gpu-x" = "gpu-y"
            "#,
            "overlay.toml",
        )
        .unwrap();
    assert_eq!(config.loss_pct_alert, 2.5);
    assert_eq!(config.reconnect_delays_s, vec![1, 1, 1]);
    assert_eq!(config.backup_map.get("gpu-x").map(String::as_str), Some("gpu-y"));
}

#[test]
fn overlay_rejects_unknown_keys() {
    let mut config = load(&base_vars()).unwrap();
    let err = config.apply_overlay("mc_api_token = \"sneaky\"", "overlay.toml").unwrap_err();
    assert!(matches!(err, ConfigError::File { .. }));
}
