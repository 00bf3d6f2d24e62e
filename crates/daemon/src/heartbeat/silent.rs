// SPDX-License-Identifier: MIT

//! Silent-peer checker loop.

use crate::alert::AlertRouter;
use std::sync::Arc;
use std::time::Duration;
use sw_core::{Alert, Clock, Severity};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::HeartbeatAggregator;

/// Every `interval`, emit one HIGH alert naming every peer past the silence
/// threshold. Runs until the token is cancelled.
pub async fn run_silent_checker<C: Clock>(
    aggregator: Arc<HeartbeatAggregator<C>>,
    router: Arc<AlertRouter<C>>,
    agent_name: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("silent checker stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let silent = aggregator.silent_peers().await;
        if silent.is_empty() {
            continue;
        }
        let names: Vec<&str> = silent.iter().map(|s| s.agent_name.as_str()).collect();
        let names = names.join(", ");
        warn!(%names, "silent agents detected");
        router
            .route(Alert::new(
                Severity::High,
                agent_name.clone(),
                "Silent agents detected",
                format!("The following agents have not checked in: {}", names),
            ))
            .await;
    }
}

#[cfg(test)]
#[path = "silent_tests.rs"]
mod tests;
