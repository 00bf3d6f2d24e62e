// SPDX-License-Identifier: MIT

//! Interruption handling: failure detection, the recovery state machine,
//! and the bounded failover procedure.

mod detector;
mod failover;
mod fsm;
mod watch;

pub use detector::FailureDetector;
pub use failover::FailoverController;
pub use fsm::{RecoveryConfig, RecoveryOrchestrator};
pub use watch::run_gpu_watch;
