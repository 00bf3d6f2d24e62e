// SPDX-License-Identifier: MIT

use super::*;
use chrono::Duration;

#[test]
fn default_registry_has_six_peers() {
    let reg = AgentRegistry::default_peers();
    assert_eq!(reg.len(), 6);
}

#[test]
fn id_lookup_is_case_insensitive() {
    let reg = AgentRegistry::default_peers();
    assert_eq!(reg.id_for("atlas"), Some("3149e473"));
    assert_eq!(reg.id_for("ATLAS"), Some("3149e473"));
    assert_eq!(reg.id_for("nobody"), None);
}

#[test]
fn unknown_id_attributed_to_raw_id() {
    let reg = AgentRegistry::default_peers();
    assert_eq!(reg.name_for("3149e473"), "ATLAS");
    assert_eq!(reg.name_for("deadbeef"), "deadbeef");
}

#[test]
fn never_seen_agent_is_not_alive() {
    let status = AgentStatus::derive("ATLAS", "3149e473", None, Utc::now(), 130.0);
    assert!(!status.is_alive);
    assert!(status.last_seen.is_none());
    assert!(status.silent_minutes.is_none());
}

#[test]
fn recent_heartbeat_is_alive() {
    let now = Utc::now();
    let seen = now - Duration::minutes(5);
    let status = AgentStatus::derive("ATLAS", "3149e473", Some((seen, None)), now, 130.0);
    assert!(status.is_alive);
    let silent = status.silent_minutes.unwrap();
    assert!((silent - 5.0).abs() < 0.01);
}

#[test]
fn silence_past_threshold_is_dead() {
    let now = Utc::now();
    let seen = now - Duration::minutes(200);
    let status =
        AgentStatus::derive("ATLAS", "3149e473", Some((seen, Some("ok".into()))), now, 130.0);
    assert!(!status.is_alive);
    assert_eq!(status.message.as_deref(), Some("ok"));
}

#[test]
fn silence_exactly_at_threshold_is_dead() {
    let now = Utc::now();
    let seen = now - Duration::minutes(130);
    let status = AgentStatus::derive("ATLAS", "3149e473", Some((seen, None)), now, 130.0);
    assert!(!status.is_alive);
}
