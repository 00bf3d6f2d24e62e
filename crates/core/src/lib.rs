// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sw-core: domain types for the Siteward orchestration agent.

pub mod alert;
pub mod billing;
pub mod checkpoint;
pub mod clock;
pub mod failure;
pub mod id;
pub mod registry;

pub use alert::{Alert, Severity};
pub use billing::{compute_proof_hash, halala_to_sar_display, split_payment, verify_billing_integrity};
pub use checkpoint::Checkpoint;
pub use clock::{Clock, FakeClock, SystemClock};
pub use failure::{
    DrillResult, FailoverResult, FailureEvent, FailureType, RecoveryContext, RecoveryState,
};
pub use id::{GpuId, JobId};
pub use registry::{AgentRegistry, AgentStatus};
