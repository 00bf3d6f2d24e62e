// SPDX-License-Identifier: MIT

//! SSH reachability probe.
//!
//! Recovery only needs to know whether a host's SSH port answers within the
//! probe deadline; authentication is not attempted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Reachability check against a host's SSH endpoint.
#[async_trait]
pub trait SshProbe: Send + Sync {
    async fn check(&self, host: &str) -> bool;
}

/// Probe that opens a TCP connection to the SSH port within a deadline.
pub struct TcpSshProbe {
    port: u16,
    timeout: Duration,
}

impl TcpSshProbe {
    pub fn new() -> Self {
        Self { port: 22, timeout: Duration::from_secs(5) }
    }

    pub fn with_port(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for TcpSshProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SshProbe for TcpSshProbe {
    async fn check(&self, host: &str) -> bool {
        let addr = format!("{}:{}", host, self.port);
        let ok = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        );
        debug!(host, ok, "ssh probe");
        ok
    }
}

/// Scripted probe for tests: pops queued results, then a default.
pub struct FakeSshProbe {
    script: Mutex<VecDeque<bool>>,
    default_response: bool,
    checked: Mutex<Vec<String>>,
}

impl FakeSshProbe {
    pub fn always(response: bool) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: response,
            checked: Mutex::new(Vec::new()),
        }
    }

    /// Queue results to return in order; afterwards `default` applies.
    pub fn scripted(results: Vec<bool>, default: bool) -> Self {
        Self {
            script: Mutex::new(results.into()),
            default_response: default,
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn checked_hosts(&self) -> Vec<String> {
        self.checked.lock().clone()
    }
}

#[async_trait]
impl SshProbe for FakeSshProbe {
    async fn check(&self, host: &str) -> bool {
        self.checked.lock().push(host.to_string());
        self.script.lock().pop_front().unwrap_or(self.default_response)
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
