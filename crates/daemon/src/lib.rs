// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-daemon: the Siteward orchestration agent (`swd`).
//!
//! One long-running process hosting the site's core loops: per-job
//! checkpoint schedulers, the network probe loop, the silent-peer checker,
//! the GPU watch loop feeding the recovery state machine, and the two HTTP
//! surfaces (heartbeat ingest, network status). Every loop owns a
//! cancellation token; the lifecycle module trips them on shutdown.

pub mod alert;
pub mod config;
pub mod heartbeat;
pub mod http;
pub mod lifecycle;
pub mod netmon;
pub mod recovery;
pub mod scheduler;
pub mod supervisor;

pub use alert::AlertRouter;
pub use config::{AgentConfig, ConfigError};
pub use lifecycle::Daemon;
