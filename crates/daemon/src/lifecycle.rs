// SPDX-License-Identifier: MIT

//! Daemon lifecycle: startup wiring, run, and ordered shutdown.
//!
//! Startup order: config → stores → adapters → router → components →
//! listeners → supervised loops. Shutdown reverses it: trip the root
//! cancellation token, let every loop return at its next suspension point,
//! drain the HTTP servers, stop the schedulers, and close the SQLite pools
//! last.

use crate::alert::{AlertRouter, RouterConfig};
use crate::config::AgentConfig;
use crate::heartbeat::{heartbeat_router, run_silent_checker, HeartbeatAggregator, HeartbeatCtx};
use crate::http::{self, HttpError};
use crate::netmon::{status_router, NetmonConfig, NetworkMonitor, StatusCtx};
use crate::recovery::{
    run_gpu_watch, FailoverController, FailureDetector, RecoveryConfig, RecoveryOrchestrator,
};
use crate::scheduler::CheckpointScheduler;
use crate::supervisor::spawn_supervised;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sw_adapters::{
    HttpChatTransport, HttpMcApi, HttpObjectStore, SystemPinger, TcpSshProbe,
};
use sw_core::{GpuId, SystemClock};
use sw_store::{CheckpointStore, HeartbeatStore, MetricStore};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long shutdown waits for loops and servers to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("metric store: {0}")]
    MetricStore(#[from] sw_store::MetricStoreError),

    #[error("heartbeat store: {0}")]
    HeartbeatStore(#[from] sw_store::HeartbeatStoreError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// The running daemon: owns the loops and everything they share.
pub struct Daemon {
    config: AgentConfig,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    pub scheduler: Arc<CheckpointScheduler<SystemClock>>,
    aggregator: Arc<HeartbeatAggregator<SystemClock>>,
    metrics: Arc<MetricStore>,
}

impl Daemon {
    /// Wire every component and start the loops.
    pub async fn start(config: AgentConfig) -> Result<Self, StartupError> {
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        info!(
            agent = %config.agent_name,
            object_bucket = %config.object_bucket,
            object_region = %config.object_region,
            "siteward starting"
        );

        // Stores.
        let metrics =
            Arc::new(MetricStore::open(&config.metrics_db_path, config.retention_days).await?);
        let heartbeats = HeartbeatStore::open(&config.heartbeat_db_path).await?;
        let remote = Arc::new(HttpObjectStore::new(
            config.object_endpoint.clone(),
            config.object_bucket.clone(),
            config.object_token.clone(),
        ));
        let checkpoints = Arc::new(CheckpointStore::new(
            config.local_base_path.clone(),
            remote,
            config.retention_keep_n,
        ));

        // External collaborators.
        let mc: Arc<HttpMcApi> =
            Arc::new(HttpMcApi::new(config.mc_api_url.clone(), config.mc_api_token.clone()));
        let chat = Arc::new(HttpChatTransport::new(config.chat_bot_token.clone()));
        let probe = Arc::new(TcpSshProbe::new());
        let pinger = Arc::new(SystemPinger);

        // Alert router.
        let router = AlertRouter::new(
            chat,
            mc.clone(),
            clock.clone(),
            RouterConfig {
                agent_id: config.agent_id.clone(),
                agent_name: config.agent_name.clone(),
                group_chat_id: config.chat_group_id.clone(),
                operator_chat_id: config.chat_operator_id.clone(),
                cooldown: Duration::from_secs(config.alert_cooldown_s),
                batch_flush: Duration::from_secs(config.batch_flush_s),
            },
        );

        // Components.
        let aggregator = Arc::new(HeartbeatAggregator::new(
            heartbeats,
            config.registry.clone(),
            config.silent_threshold_min,
            clock.clone(),
        ));
        let monitor = Arc::new(NetworkMonitor::new(
            NetmonConfig {
                primary: config.ping_primary.clone(),
                fallback: config.ping_fallback.clone(),
                interval: Duration::from_secs(config.ping_interval_s),
                ping_timeout: Duration::from_secs(config.ping_timeout_s),
                loss_pct_alert: config.loss_pct_alert,
                outage_consecutive_s: config.outage_consecutive_s,
                rolling_window_s: config.rolling_window_s,
                outage_alert_cooldown_s: config.alert_cooldown_s as f64,
            },
            pinger,
            metrics.clone(),
            router.clone(),
            config.agent_name.clone(),
            clock.clone(),
        ));
        let failover = FailoverController::new(
            mc.clone(),
            probe.clone(),
            checkpoints.clone(),
            config.failover_budget_ms,
            clock.clone(),
        );
        let orchestrator = Arc::new(RecoveryOrchestrator::new(
            mc.clone(),
            probe.clone(),
            failover,
            router.clone(),
            RecoveryConfig {
                backup_map: config.backup_map.clone(),
                reconnect_delays_s: config.reconnect_delays_s.clone(),
                escalation_timeout: Duration::from_secs(config.escalation_timeout_s),
                escalation_poll: Duration::from_secs(config.escalation_poll_s),
                agent_name: config.agent_name.clone(),
            },
            clock.clone(),
        ));
        let detector = Arc::new(FailureDetector::new(
            mc.clone(),
            probe,
            config.thermal_threshold_c,
            config.stall_threshold_min,
            clock.clone(),
        ));
        let scheduler = Arc::new(CheckpointScheduler::new(
            checkpoints,
            mc.clone(),
            router.clone(),
            config.agent_id.clone(),
            config.agent_name.clone(),
            Duration::from_secs(config.save_interval_s),
            cancel.child_token(),
        ));

        // Listeners bind before any loop starts so port conflicts are fatal.
        let heartbeat_listener =
            http::bind(SocketAddr::from(([0, 0, 0, 0], config.heartbeat_port))).await?;
        let status_listener =
            http::bind(SocketAddr::from(([0, 0, 0, 0], config.status_port))).await?;

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(http::serve(
            "heartbeat",
            heartbeat_listener,
            heartbeat_router(HeartbeatCtx {
                aggregator: aggregator.clone(),
                token: config.mc_api_token.clone(),
            }),
            cancel.child_token(),
        )));
        tasks.push(tokio::spawn(http::serve(
            "status",
            status_listener,
            status_router(StatusCtx::new(monitor.clone(), clock.clone())),
            cancel.child_token(),
        )));

        {
            let monitor = monitor.clone();
            tasks.push(spawn_supervised(
                "network-monitor",
                config.agent_name.clone(),
                router.clone(),
                cancel.child_token(),
                move |token| {
                    let monitor = monitor.clone();
                    async move { monitor.run(token).await }
                },
            ));
        }
        {
            let aggregator = aggregator.clone();
            let router_for_task = router.clone();
            let agent_name = config.agent_name.clone();
            let interval = Duration::from_secs(config.silent_check_interval_s);
            tasks.push(spawn_supervised(
                "silent-checker",
                config.agent_name.clone(),
                router.clone(),
                cancel.child_token(),
                move |token| {
                    run_silent_checker(
                        aggregator.clone(),
                        router_for_task.clone(),
                        agent_name.clone(),
                        interval,
                        token,
                    )
                },
            ));
        }
        {
            let gpus: Vec<GpuId> =
                config.backup_map.keys().map(|g| GpuId::from(g.as_str())).collect();
            let detector = detector.clone();
            let orchestrator = orchestrator.clone();
            let mc = mc.clone();
            let interval = Duration::from_secs(config.gpu_check_interval_s);
            tasks.push(spawn_supervised(
                "gpu-watch",
                config.agent_name.clone(),
                router.clone(),
                cancel.child_token(),
                move |token| {
                    run_gpu_watch(
                        gpus.clone(),
                        detector.clone(),
                        orchestrator.clone(),
                        mc.clone() as Arc<dyn sw_adapters::McApi>,
                        interval,
                        token,
                    )
                },
            ));
        }

        info!("siteward ready");
        Ok(Self { config, cancel, tasks, scheduler, aggregator, metrics })
    }

    /// Block until SIGTERM/SIGINT, then shut down. Returns the exit code.
    pub async fn run_until_shutdown(self) -> i32 {
        wait_for_signal().await;
        self.shutdown().await;
        0
    }

    /// Ordered teardown: cancel loops, drain, close stores last.
    pub async fn shutdown(self) {
        info!("shutting down");
        self.cancel.cancel();

        let drain = async {
            for task in self.tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!(grace_s = SHUTDOWN_GRACE.as_secs(), "shutdown grace expired, abandoning tasks");
        }

        self.scheduler.shutdown().await;

        // Stores close after every writer has stopped.
        self.aggregator.close().await;
        self.metrics.close().await;
        info!(agent = %self.config.agent_name, "shutdown complete");
    }
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, using ctrl-c only");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = term.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received ctrl-c");
    }
}
