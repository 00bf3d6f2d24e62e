// SPDX-License-Identifier: MIT

//! Severity-based alert routing.

mod router;

pub use router::{AlertRouter, RouterConfig};
