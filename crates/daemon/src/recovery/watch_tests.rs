// SPDX-License-Identifier: MIT

use super::*;
use crate::alert::{AlertRouter, RouterConfig};
use crate::recovery::{FailoverController, RecoveryConfig};
use sw_adapters::{FakeChatTransport, FakeMcApi, FakeSshProbe, GpuStatus, JobProgress};
use sw_core::{FailureType, FakeClock};
use sw_store::{CheckpointStore, MemoryObjectStore};
use tempfile::tempdir;

struct Fixture {
    detector: Arc<FailureDetector<FakeClock>>,
    orchestrator: Arc<RecoveryOrchestrator<FakeClock>>,
    mc: Arc<FakeMcApi>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let mc = Arc::new(FakeMcApi::new());
    let probe = Arc::new(FakeSshProbe::always(true));
    let store =
        Arc::new(CheckpointStore::new(dir.path(), Arc::new(MemoryObjectStore::new()), 3));
    let router = AlertRouter::new(
        Arc::new(FakeChatTransport::new()),
        mc.clone(),
        clock.clone(),
        RouterConfig {
            agent_id: "id".into(),
            agent_name: "NEXUS".into(),
            group_chat_id: "group".into(),
            operator_chat_id: "operator".into(),
            cooldown: Duration::from_secs(600),
            batch_flush: Duration::from_secs(1800),
        },
    );
    let failover =
        FailoverController::new(mc.clone(), probe.clone(), store, 60_000, clock.clone());
    let orchestrator = Arc::new(RecoveryOrchestrator::new(
        mc.clone(),
        probe.clone(),
        failover,
        router,
        RecoveryConfig {
            backup_map: [("pc1-rtx3090".to_string(), "pc1-rtx3060".to_string())]
                .into_iter()
                .collect(),
            reconnect_delays_s: vec![1],
            escalation_timeout: Duration::from_secs(60),
            escalation_poll: Duration::from_secs(30),
            agent_name: "NEXUS".into(),
        },
        clock.clone(),
    ));
    let detector = Arc::new(FailureDetector::new(mc.clone(), probe, 80.0, 30, clock));
    Fixture { detector, orchestrator, mc, _dir: dir }
}

#[tokio::test(start_paused = true)]
async fn healthy_gpu_triggers_nothing() {
    let f = fixture();
    f.mc.set_gpu_status(
        "pc1-rtx3090",
        Some(GpuStatus { ssh_host: Some("10.0.0.5".into()), ..Default::default() }),
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_gpu_watch(
        vec![GpuId::from("pc1-rtx3090")],
        f.detector.clone(),
        f.orchestrator.clone(),
        f.mc.clone(),
        Duration::from_secs(30),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_secs(95)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert!(f.mc.audit_event_types().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dead_host_recovers_last_known_job() {
    let f = fixture();
    // First cycle sees the job; then the host goes dark entirely.
    f.mc.set_gpu_status(
        "pc1-rtx3090",
        Some(GpuStatus {
            ssh_host: Some("10.0.0.5".into()),
            current_job_id: Some("job-1".into()),
            ..Default::default()
        }),
    );
    // Healthy backup and a successful relaunch for the eventual failover.
    f.mc.set_gpu_status(
        "pc1-rtx3060",
        Some(GpuStatus { ssh_host: None, current_job_id: None, status: Some("idle".into()) }),
    );
    f.mc.set_job_progress(
        "job-1",
        vec![JobProgress {
            gpu_id: Some("pc1-rtx3060".into()),
            status: Some("running".into()),
            last_progress_at: None,
        }],
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_gpu_watch(
        vec![GpuId::from("pc1-rtx3090")],
        f.detector.clone(),
        f.orchestrator.clone(),
        f.mc.clone(),
        Duration::from_secs(30),
        cancel.clone(),
    ));

    // Let one healthy cycle record the job, then kill the host.
    tokio::time::sleep(Duration::from_secs(35)).await;
    f.mc.set_gpu_status("pc1-rtx3090", None);
    tokio::time::sleep(Duration::from_secs(120)).await;
    cancel.cancel();
    handle.await.unwrap();

    // POWER_LOSS was detected and recovery ran against the remembered job.
    let audits = f.mc.audit_event_types();
    assert!(audits.contains(&"recovery_state_transition".to_string()));
    let relaunches = f.mc.relaunch_calls();
    assert!(!relaunches.is_empty());
    assert_eq!(relaunches[0].0, JobId::from("job-1"));
}

#[tokio::test(start_paused = true)]
async fn idle_dead_gpu_is_logged_not_recovered() {
    let f = fixture();
    // Never seen with a job, and now unreachable.

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_gpu_watch(
        vec![GpuId::from("pc1-rtx3090")],
        f.detector.clone(),
        f.orchestrator.clone(),
        f.mc.clone(),
        Duration::from_secs(30),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_secs(65)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert!(f.mc.relaunch_calls().is_empty());
    assert!(f.mc.audit_event_types().is_empty());
}
