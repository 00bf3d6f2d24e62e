// SPDX-License-Identifier: MIT

//! End-to-end scenarios across the workspace crates, driven entirely
//! through the fake collaborators.

use std::sync::Arc;
use std::time::Duration;
use sw_adapters::{FakeChatTransport, FakeMcApi, FakeSshProbe, GpuStatus, JobProgress};
use sw_core::{FailureType, FakeClock, GpuId, JobId, RecoveryState};
use sw_daemon::alert::{AlertRouter, RouterConfig};
use sw_daemon::heartbeat::HeartbeatAggregator;
use sw_daemon::recovery::{FailoverController, RecoveryConfig, RecoveryOrchestrator};
use sw_store::{CheckpointError, CheckpointStore, HeartbeatStore, MemoryObjectStore};
use tempfile::tempdir;

fn router_fixture(
    clock: FakeClock,
) -> (Arc<AlertRouter<FakeClock>>, Arc<FakeChatTransport>, Arc<FakeMcApi>) {
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
    (router, chat, mc)
}

// Scenario: dual-write happy path for the 256-byte ramp.
#[tokio::test(start_paused = true)]
async fn dual_write_happy_path() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(MemoryObjectStore::new());
    let store = CheckpointStore::new(dir.path(), remote.clone(), 3);
    let job = JobId::from("job-42");
    let bytes: Vec<u8> = (0u8..=255).collect();

    let checkpoint = store.save(&job, 1, &bytes).await.unwrap();

    assert_eq!(checkpoint.size_bytes, 256);
    assert!(checkpoint.sha256.starts_with("40aff2"));
    assert!(std::path::Path::new(checkpoint.local_path.as_ref().unwrap()).exists());
    assert_eq!(remote.keys(), vec!["checkpoints/job-42/000001.ckpt".to_string()]);
    assert_eq!(store.load(&job, None).await.unwrap(), bytes);
}

// Scenario: remote degraded - local still commits, reads stay local.
#[tokio::test(start_paused = true)]
async fn remote_degraded_commits_locally() {
    let dir = tempdir().unwrap();
    let remote = Arc::new(MemoryObjectStore::new());
    let store = CheckpointStore::new(dir.path(), remote.clone(), 3);
    let job = JobId::from("job-42");
    remote.fail_next_puts(3);

    let checkpoint = store.save(&job, 1, b"state").await.unwrap();

    assert!(checkpoint.remote_key.is_none());
    assert!(checkpoint.local_path.is_some());
    assert_eq!(store.list(&job).len(), 1);
    let gets_before = remote.get_count();
    assert_eq!(store.load(&job, None).await.unwrap(), b"state");
    assert_eq!(remote.get_count(), gets_before);
}

// Scenario: both media down surfaces the one error that matters.
#[tokio::test(start_paused = true)]
async fn both_media_down_raises() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let remote = Arc::new(MemoryObjectStore::new());
    remote.fail_next_puts(3);
    let store = CheckpointStore::new(blocker.join("sub"), remote, 3);

    let err = store.save(&JobId::from("job-42"), 1, b"state").await.unwrap_err();
    assert!(matches!(err, CheckpointError::BothMediaFailed(_)));
}

// Scenario: reconnect succeeds on the third attempt after 7 s of backoff.
#[tokio::test(start_paused = true)]
async fn reconnect_recovers_on_attempt_three() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let (router, chat, mc) = router_fixture(clock.clone());
    mc.set_gpu_status(
        "pc1-rtx3090",
        Some(GpuStatus { ssh_host: Some("10.0.0.5".into()), ..Default::default() }),
    );
    let probe = Arc::new(FakeSshProbe::scripted(vec![false, false, true], true));
    let checkpoints =
        Arc::new(CheckpointStore::new(dir.path(), Arc::new(MemoryObjectStore::new()), 3));
    let failover = FailoverController::new(
        mc.clone(),
        probe.clone(),
        checkpoints,
        60_000,
        clock.clone(),
    );
    let orchestrator = RecoveryOrchestrator::new(
        mc.clone(),
        probe,
        failover,
        router,
        RecoveryConfig {
            backup_map: [("pc1-rtx3090".to_string(), "pc1-rtx3060".to_string())]
                .into_iter()
                .collect(),
            reconnect_delays_s: vec![1, 2, 4, 8, 16],
            escalation_timeout: Duration::from_secs(600),
            escalation_poll: Duration::from_secs(30),
            agent_name: "NEXUS".into(),
        },
        clock,
    );

    let start = tokio::time::Instant::now();
    let ctx = orchestrator
        .handle_interruption(
            JobId::from("job-1"),
            GpuId::from("pc1-rtx3090"),
            FailureType::NetworkLoss,
        )
        .await;

    assert_eq!(ctx.state, RecoveryState::Resolved);
    assert!(ctx.resolved_at.is_some());
    assert_eq!(start.elapsed(), Duration::from_secs(7));
    assert!(mc.relaunch_calls().is_empty());
    assert!(chat.sent().is_empty());
}

// Scenario: failover with a verified checkpoint, audited start to finish.
#[tokio::test(start_paused = true)]
async fn failover_with_integrity() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let mc = Arc::new(FakeMcApi::new());
    let store =
        Arc::new(CheckpointStore::new(dir.path(), Arc::new(MemoryObjectStore::new()), 3));
    store.save(&JobId::from("job-1"), 1, b"weights").await.unwrap();

    mc.set_gpu_status(
        "gpu-b",
        Some(GpuStatus {
            ssh_host: Some("10.0.0.6".into()),
            current_job_id: None,
            status: Some("idle".into()),
        }),
    );
    mc.set_job_progress(
        "job-1",
        vec![JobProgress {
            gpu_id: Some("gpu-b".into()),
            status: Some("running".into()),
            last_progress_at: None,
        }],
    );

    let controller = FailoverController::new(
        mc.clone(),
        Arc::new(FakeSshProbe::always(true)),
        store,
        60_000,
        clock,
    );
    let result = controller
        .failover(&JobId::from("job-1"), &GpuId::from("gpu-a"), &GpuId::from("gpu-b"))
        .await;

    assert!(result.success);
    assert!(result.data_integrity_verified);
    assert!(result.time_taken_ms < 60_000);
    assert_eq!(
        mc.audit_event_types(),
        vec!["failover_started".to_string(), "failover_complete".to_string()]
    );
}

// Scenario: one HIGH alert names the five silent peers.
#[tokio::test]
async fn silent_peer_alert_lists_five_names() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let (router, chat, mc) = router_fixture(clock.clone());
    let store = HeartbeatStore::open(&dir.path().join("hb.db")).await.unwrap();
    let aggregator = Arc::new(HeartbeatAggregator::new(
        store,
        sw_core::AgentRegistry::default_peers(),
        130.0,
        clock,
    ));

    aggregator.record("37c0fd6b", "ok", serde_json::json!({})).await.unwrap();

    let silent = aggregator.silent_peers().await;
    assert_eq!(silent.len(), 5);
    let names: Vec<&str> = silent.iter().map(|s| s.agent_name.as_str()).collect();
    router
        .route(sw_core::Alert::new(
            sw_core::Severity::High,
            "NEXUS",
            "Silent agents detected",
            format!("The following agents have not checked in: {}", names.join(", ")),
        ))
        .await;

    let group = chat.sent_to("group");
    assert_eq!(group.len(), 1);
    assert_eq!(names, vec!["ATLAS", "VOLT", "GUARDIAN", "SPARK", "SYNC"]);
    assert_eq!(mc.alerts().len(), 1);
    assert_eq!(mc.alerts()[0].0, "high");
}

// The integer payment split never leaks a halala.
#[test]
fn payment_split_is_exact() {
    for total in [0u64, 1, 3, 7, 100, 999, 10_000, 1_234_567] {
        let (provider, site) = sw_core::split_payment(total);
        assert_eq!(provider + site, total);
        assert_eq!(provider, total * 75 / 100);
    }
}
