// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-adapters: external collaborators behind traits.
//!
//! Each collaborator (Mission Control HTTP API, chat transport, SSH
//! reachability probe, ICMP pinger, object-store gateway) is a trait with a
//! production implementation and a `Fake*` used by tests. The daemon core
//! only ever sees the traits.

pub mod chat;
pub mod mc;
pub mod object_store;
pub mod ping;
pub mod probe;

pub use chat::{ChatError, ChatTransport, FakeChatTransport, HttpChatTransport};
pub use mc::{FakeMcApi, GpuMetrics, GpuStatus, HttpMcApi, JobProgress, McApi, McError};
pub use object_store::HttpObjectStore;
pub use ping::{FakePinger, Pinger, SystemPinger};
pub use probe::{FakeSshProbe, SshProbe, TcpSshProbe};
