// SPDX-License-Identifier: MIT

use super::*;
use crate::alert::RouterConfig;
use sw_adapters::{FakeChatTransport, FakeMcApi};
use sw_core::{AgentRegistry, FakeClock};
use sw_store::HeartbeatStore;
use tempfile::tempdir;

struct Fixture {
    aggregator: Arc<HeartbeatAggregator<FakeClock>>,
    router: Arc<AlertRouter<FakeClock>>,
    chat: Arc<FakeChatTransport>,
    mc: Arc<FakeMcApi>,
}

async fn fixture(dir: &std::path::Path) -> Fixture {
    let clock = FakeClock::new();
    let store = HeartbeatStore::open(&dir.join("hb.db")).await.unwrap();
    let aggregator = Arc::new(HeartbeatAggregator::new(
        store,
        AgentRegistry::default_peers(),
        130.0,
        clock.clone(),
    ));
    let chat = Arc::new(FakeChatTransport::new());
    let mc = Arc::new(FakeMcApi::new());
    let router = AlertRouter::new(
        chat.clone(),
        mc.clone(),
        clock,
        RouterConfig {
            agent_id: "37c0fd6b".into(),
            agent_name: "NEXUS".into(),
            group_chat_id: "group".into(),
            operator_chat_id: "operator".into(),
            cooldown: Duration::from_secs(600),
            batch_flush: Duration::from_secs(1800),
        },
    );
    Fixture { aggregator, router, chat, mc }
}

#[tokio::test]
async fn one_high_alert_lists_all_silent_peers() {
    let dir = tempdir().unwrap();
    let f = fixture(dir.path()).await;

    // Only NEXUS has checked in.
    f.aggregator.record("37c0fd6b", "ok", serde_json::json!({})).await.unwrap();
    tokio::time::pause();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_silent_checker(
        f.aggregator.clone(),
        f.router.clone(),
        "NEXUS".into(),
        Duration::from_secs(600),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_secs(601)).await;
    cancel.cancel();
    handle.await.unwrap();

    // One HIGH alert: group chat + MC, with the five silent names.
    let group = f.chat.sent_to("group");
    assert_eq!(group.len(), 1);
    for name in ["ATLAS", "VOLT", "GUARDIAN", "SPARK", "SYNC"] {
        assert!(group[0].contains(name), "missing {} in {}", name, group[0]);
    }
    assert!(!group[0].contains("NEXUS,"));
    assert_eq!(f.mc.alerts().len(), 1);
    assert_eq!(f.mc.alerts()[0].0, "high");
}

#[tokio::test]
async fn no_alert_when_everyone_is_alive() {
    let dir = tempdir().unwrap();
    let f = fixture(dir.path()).await;

    let registry = AgentRegistry::default_peers();
    for (_, id) in registry.iter() {
        f.aggregator.record(id, "ok", serde_json::json!({})).await.unwrap();
    }
    eprintln!("DEBUG status right after record: {:?}", f.aggregator.status().await);
    tokio::time::pause();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_silent_checker(
        f.aggregator.clone(),
        f.router.clone(),
        "NEXUS".into(),
        Duration::from_secs(600),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_secs(601)).await;
    cancel.cancel();
    handle.await.unwrap();

    eprintln!("DEBUG status: {:?}", f.aggregator.status().await);
    assert!(f.chat.sent().is_empty());
    assert!(f.mc.alerts().is_empty());
}

#[tokio::test]
async fn checker_stops_on_cancel() {
    let dir = tempdir().unwrap();
    let f = fixture(dir.path()).await;
    tokio::time::pause();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_silent_checker(
        f.aggregator.clone(),
        f.router.clone(),
        "NEXUS".into(),
        Duration::from_secs(600),
        cancel.clone(),
    ));

    cancel.cancel();
    handle.await.unwrap();
}
