// SPDX-License-Identifier: MIT

//! Committed checkpoint record.

use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A committed checkpoint: a verified copy exists in at least one medium
/// and the stored digest matches the bytes that were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job_id: JobId,
    /// Monotonically increasing per job.
    pub seq: u64,
    pub size_bytes: u64,
    /// Hex SHA-256 of the checkpoint bytes.
    pub sha256: String,
    pub created_at: DateTime<Utc>,
    /// Absent when the local write failed at save time.
    pub local_path: Option<String>,
    /// Absent when the remote write failed at save time.
    pub remote_key: Option<String>,
}

impl Checkpoint {
    /// True when both media hold a verified copy.
    pub fn is_dual(&self) -> bool {
        self.local_path.is_some() && self.remote_key.is_some()
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
