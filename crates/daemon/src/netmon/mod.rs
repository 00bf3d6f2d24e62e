// SPDX-License-Identifier: MIT

//! Network monitoring: probe loop, rolling loss, outage detection, and the
//! HTTP status surface.

mod monitor;
mod status;

pub use monitor::{NetmonConfig, NetworkMonitor, StatusJson};
pub use status::{status_router, StatusCtx};
