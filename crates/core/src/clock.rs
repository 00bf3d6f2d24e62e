// SPDX-License-Identifier: MIT

//! Time sources for the daemon.
//!
//! Two readings cover every consumer: a monotonic [`Instant`] for elapsed
//! time and cooldown math (failover budget, alert rate limiter), and a UTC
//! wall clock for everything that gets persisted (heartbeat rows, checkpoint
//! metadata, outage markers). The epoch views are derived from the wall
//! clock so both stay consistent under the test clock.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic reading; only differences are meaningful.
    fn now(&self) -> Instant;

    /// UTC wall clock for persisted timestamps.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64 {
        self.utc_now().timestamp_millis().max(0) as u64
    }

    /// Epoch seconds as a float (the metric store keys samples by this).
    fn epoch_secs(&self) -> f64 {
        self.epoch_ms() as f64 / 1000.0
    }
}

/// Production clock backed by the operating system.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock anchor for the test clock: 2026-01-01T00:00:00Z.
const TEST_WALL_START_MS: i64 = 1_767_225_600_000;

/// Test clock that only moves when told to.
///
/// Both timelines sit behind one cell so `advance` can never let the
/// monotonic and wall readings drift apart.
#[derive(Clone)]
pub struct FakeClock {
    cell: Arc<Mutex<FakeReadings>>,
}

struct FakeReadings {
    monotonic: Instant,
    wall_ms: i64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(FakeReadings {
                monotonic: Instant::now(),
                wall_ms: TEST_WALL_START_MS,
            })),
        }
    }

    /// Move both timelines forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut cell = self.cell.lock();
        cell.monotonic += by;
        cell.wall_ms += by.as_millis() as i64;
    }

    /// Pin the wall clock to an absolute epoch-milliseconds value.
    pub fn set_epoch_ms(&self, ms: u64) {
        self.cell.lock().wall_ms = ms as i64;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.cell.lock().monotonic
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let wall_ms = self.cell.lock().wall_ms;
        Utc.timestamp_millis_opt(wall_ms).single().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
