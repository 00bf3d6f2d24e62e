// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-store: durable state for the Siteward agent.
//!
//! Three stores, each with a single owning writer:
//! - the dual-medium checkpoint store (local files + remote objects),
//! - the SQLite metric store (ping samples and hourly rollups),
//! - the SQLite heartbeat store (append-only liveness records).

pub mod checkpoint;
pub mod heartbeats;
pub mod metrics;

pub use checkpoint::{CheckpointError, CheckpointStore, MemoryObjectStore, ObjectStore, ObjectStoreError};
pub use heartbeats::{HeartbeatRecord, HeartbeatStore, HeartbeatStoreError};
pub use metrics::{LatencyBucket, MetricStore, MetricStoreError};
