// SPDX-License-Identifier: MIT

use super::*;
use sw_adapters::{FakeChatTransport, FakeMcApi};
use sw_core::FakeClock;

const GROUP: &str = "-100500";
const OPERATOR: &str = "7007";

struct Fixture {
    router: Arc<AlertRouter<FakeClock>>,
    chat: Arc<FakeChatTransport>,
    mc: Arc<FakeMcApi>,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    let chat = Arc::new(FakeChatTransport::new());
    let mc = Arc::new(FakeMcApi::new());
    let clock = FakeClock::new();
    let router = AlertRouter::new(
        chat.clone(),
        mc.clone(),
        clock.clone(),
        RouterConfig {
            agent_id: "37c0fd6b".into(),
            agent_name: "NEXUS".into(),
            group_chat_id: GROUP.into(),
            operator_chat_id: OPERATOR.into(),
            cooldown: Duration::from_secs(600),
            batch_flush: Duration::from_secs(1800),
        },
    );
    Fixture { router, chat, mc, clock }
}

fn alert(severity: Severity, title: &str) -> Alert {
    Alert::new(severity, "NEXUS", title, "details")
}

#[tokio::test]
async fn low_goes_to_batch_not_transports() {
    let f = fixture();
    f.router.route(alert(Severity::Low, "disk space")).await;

    assert_eq!(f.router.batched(), 1);
    assert!(f.chat.sent().is_empty());
    assert!(f.mc.alerts().is_empty());
}

#[tokio::test]
async fn medium_goes_to_mc_only() {
    let f = fixture();
    f.router.route(alert(Severity::Medium, "loss")).await;

    assert!(f.chat.sent().is_empty());
    assert_eq!(f.mc.alerts().len(), 1);
    assert_eq!(f.mc.alerts()[0].0, "medium");
}

#[tokio::test]
async fn high_goes_to_group_and_mc() {
    let f = fixture();
    f.router.route(alert(Severity::High, "gpu down")).await;

    assert_eq!(f.chat.sent_to(GROUP).len(), 1);
    assert!(f.chat.sent_to(OPERATOR).is_empty());
    assert_eq!(f.mc.alerts().len(), 1);
}

#[tokio::test]
async fn critical_goes_to_operator_group_and_mc() {
    let f = fixture();
    f.router.route(alert(Severity::Critical, "outage")).await;

    assert_eq!(f.chat.sent_to(OPERATOR).len(), 1);
    assert_eq!(f.chat.sent_to(GROUP).len(), 1);
    assert_eq!(f.mc.alerts().len(), 1);
    assert!(f.chat.sent_to(OPERATOR)[0].starts_with("[CRITICAL]"));
}

#[tokio::test]
async fn duplicate_within_cooldown_is_dropped() {
    let f = fixture();
    f.router.route(alert(Severity::High, "dup")).await;
    f.router.route(alert(Severity::High, "dup")).await;

    assert_eq!(f.chat.sent_to(GROUP).len(), 1);
    assert_eq!(f.mc.alerts().len(), 1);
}

#[tokio::test]
async fn duplicate_after_cooldown_is_delivered() {
    let f = fixture();
    f.router.route(alert(Severity::High, "dup")).await;
    f.clock.advance(Duration::from_secs(700));
    f.router.route(alert(Severity::High, "dup")).await;

    assert_eq!(f.chat.sent_to(GROUP).len(), 2);
}

#[tokio::test]
async fn critical_bypasses_rate_limit() {
    let f = fixture();
    f.router.route(alert(Severity::Critical, "dup")).await;
    f.router.route(alert(Severity::Critical, "dup")).await;

    // Two dispatches each: both made it through.
    assert_eq!(f.chat.sent_to(OPERATOR).len(), 2);
    assert_eq!(f.chat.sent_to(GROUP).len(), 2);
    assert_eq!(f.mc.alerts().len(), 2);
}

#[tokio::test]
async fn distinct_titles_do_not_share_cooldown() {
    let f = fixture();
    f.router.route(alert(Severity::Medium, "one")).await;
    f.router.route(alert(Severity::Medium, "two")).await;
    assert_eq!(f.mc.alerts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn batch_flushes_once_as_medium_summary() {
    let f = fixture();
    f.router.route(alert(Severity::Low, "a")).await;
    f.router.route(alert(Severity::Low, "b")).await;

    tokio::time::sleep(Duration::from_secs(1801)).await;
    tokio::task::yield_now().await;

    let alerts = f.mc.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "medium");
    assert!(alerts[0].1.contains("Batch Summary (2 alerts)"));
    assert!(alerts[0].1.contains("[LOW] NEXUS: a"));
    assert_eq!(f.router.batched(), 0);
}

#[tokio::test(start_paused = true)]
async fn mid_window_low_joins_batch_without_resetting_timer() {
    let f = fixture();
    f.router.route(alert(Severity::Low, "a")).await;

    tokio::time::sleep(Duration::from_secs(1200)).await;
    f.router.route(alert(Severity::Low, "late")).await;

    // Only the original timer fires, 1800s after the first alert.
    tokio::time::sleep(Duration::from_secs(601)).await;
    tokio::task::yield_now().await;

    let alerts = f.mc.alerts();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].1.contains("Batch Summary (2 alerts)"));
}

#[tokio::test]
async fn empty_batch_flush_emits_nothing() {
    let f = fixture();
    f.router.flush_batch().await;
    assert!(f.mc.alerts().is_empty());
}

#[tokio::test]
async fn chat_failure_does_not_block_mc_delivery() {
    let f = fixture();
    f.chat.set_failing(true);
    f.router.route(alert(Severity::High, "gpu down")).await;

    // Chat transport failed; the alert still reached MC.
    assert_eq!(f.mc.alerts().len(), 1);
}
