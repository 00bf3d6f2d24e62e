// SPDX-License-Identifier: MIT

//! ICMP latency probe via the system `ping` tool (no raw sockets, no root).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// One-shot latency probe. Returns milliseconds, or `None` on failure.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, target: &str, timeout: Duration) -> Option<f64>;
}

/// Pinger shelling out to the system `ping` binary.
///
/// The subprocess gets a hard deadline of `timeout + 2 s` on top of ping's
/// own `-W` so a wedged resolver can never stall the probe loop.
#[derive(Clone, Copy, Default)]
pub struct SystemPinger;

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(&self, target: &str, timeout: Duration) -> Option<f64> {
        let child = Command::new("ping")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(timeout.as_secs().max(1).to_string())
            .arg(target)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                debug!(target, error = %e, "ping spawn failed");
                return None;
            }
        };

        let deadline = timeout + Duration::from_secs(2);
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(_)) | Ok(Err(_)) => return None,
            Err(_) => {
                debug!(target, "ping subprocess hit hard deadline");
                return None;
            }
        };

        parse_latency_ms(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Extract the `time=<ms>` figure from ping output.
fn parse_latency_ms(output: &str) -> Option<f64> {
    for line in output.lines() {
        if let Some((_, rest)) = line.split_once("time=") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

/// Scripted pinger for tests: pops queued results, then a default.
pub struct FakePinger {
    script: Mutex<VecDeque<Option<f64>>>,
    default_response: Option<f64>,
    targets: Mutex<Vec<String>>,
}

impl FakePinger {
    pub fn always(latency_ms: Option<f64>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: latency_ms,
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Queue results to return in order; afterwards `default` applies.
    pub fn scripted(results: Vec<Option<f64>>, default: Option<f64>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            default_response: default,
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, result: Option<f64>) {
        self.script.lock().push_back(result);
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().clone()
    }
}

#[async_trait]
impl Pinger for FakePinger {
    async fn ping(&self, target: &str, _timeout: Duration) -> Option<f64> {
        self.targets.lock().push(target.to_string());
        self.script.lock().pop_front().unwrap_or(self.default_response)
    }
}

#[cfg(test)]
#[path = "ping_tests.rs"]
mod tests;
