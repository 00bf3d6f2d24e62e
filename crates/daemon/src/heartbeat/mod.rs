// SPDX-License-Identifier: MIT

//! Heartbeat aggregation: authenticated ingest, liveness derivation, and
//! the silent-peer checker.

mod aggregator;
mod routes;
mod silent;

pub use aggregator::HeartbeatAggregator;
pub use routes::{heartbeat_router, HeartbeatCtx};
pub use silent::run_silent_checker;
