// SPDX-License-Identifier: MIT

//! Task supervision: a panicking loop must not tear the daemon down.
//!
//! Each long-running loop is spawned through the supervisor. When a task
//! panics, the supervisor emits a CRITICAL alert and restarts it; when the
//! task returns (normal completion or cancellation) the supervisor exits.

use crate::alert::AlertRouter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sw_core::{Alert, Clock, Severity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Spawn `factory`'s future under supervision. The factory is re-invoked
/// with a fresh child token after every panic until `cancel` trips.
pub fn spawn_supervised<C, F, Fut>(
    name: &'static str,
    agent_name: String,
    router: Arc<AlertRouter<C>>,
    cancel: CancellationToken,
    factory: F,
) -> JoinHandle<()>
where
    C: Clock,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let task = tokio::spawn(factory(cancel.child_token()));
            match task.await {
                Ok(()) => return,
                Err(e) if e.is_panic() => {
                    error!(task = name, "supervised task panicked");
                    router
                        .route(Alert::new(
                            Severity::Critical,
                            agent_name.clone(),
                            format!("Task panicked: {}", name),
                            format!("The {} task crashed and will be restarted.", name),
                        ))
                        .await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    tokio::time::sleep(RESTART_DELAY).await;
                }
                Err(_) => return,
            }
        }
    })
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
