// SPDX-License-Identifier: MIT

//! Dual-medium checkpoint store.
//!
//! Every checkpoint is written to a local directory (atomic rename) and a
//! remote object store, each verified by reading the copy back and comparing
//! its SHA-256 against the digest computed at write time. A checkpoint
//! commits when at least one medium verifies; the per-job `meta.json` index
//! records which media hold it. Loss of a single medium is tolerated and
//! logged; only the all-media-failed case surfaces to the caller.

mod object;

pub use object::{MemoryObjectStore, ObjectStore, ObjectStoreError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sw_core::{Checkpoint, JobId};
use thiserror::Error;
use tracing::{info, warn};

/// Delays between remote upload attempts; the last entry is never slept.
const REMOTE_RETRY_DELAYS: [u64; 3] = [1, 2, 4];

/// Errors from checkpoint persistence.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("both local and remote writes failed for job {0}")]
    BothMediaFailed(JobId),

    #[error("checkpoint seq {seq} does not advance past committed seq {latest}")]
    StaleSeq { seq: u64, latest: u64 },

    #[error("checkpoint index unreadable for job {job_id}: {reason}")]
    Index { job_id: JobId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One committed entry in a job's `meta.json` index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    seq: u64,
    sha256: String,
    size_bytes: u64,
    local_path: Option<String>,
    remote_key: Option<String>,
    saved_at: DateTime<Utc>,
}

impl IndexEntry {
    fn to_checkpoint(&self, job_id: &JobId) -> Checkpoint {
        Checkpoint {
            job_id: job_id.clone(),
            seq: self.seq,
            size_bytes: self.size_bytes,
            sha256: self.sha256.clone(),
            created_at: self.saved_at,
            local_path: self.local_path.clone(),
            remote_key: self.remote_key.clone(),
        }
    }
}

/// Dual-medium checkpoint store.
///
/// Concurrent-safe across jobs; saves for one job must be serialized by the
/// caller (the per-job scheduler runs one save at a time).
pub struct CheckpointStore {
    base: PathBuf,
    remote: Arc<dyn ObjectStore>,
    keep_n: usize,
}

impl CheckpointStore {
    pub fn new(base: impl Into<PathBuf>, remote: Arc<dyn ObjectStore>, keep_n: usize) -> Self {
        Self { base: base.into(), remote, keep_n }
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.base.join(job_id.as_str())
    }

    fn meta_path(&self, job_id: &JobId) -> PathBuf {
        self.job_dir(job_id).join("meta.json")
    }

    fn local_file(&self, job_id: &JobId, seq: u64) -> PathBuf {
        self.job_dir(job_id).join(format!("{:06}.ckpt", seq))
    }

    fn remote_key(job_id: &JobId, seq: u64) -> String {
        format!("checkpoints/{}/{:06}.ckpt", job_id, seq)
    }

    fn load_index(&self, job_id: &JobId) -> Result<Vec<IndexEntry>, CheckpointError> {
        let path = self.meta_path(job_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read(&path)?;
        serde_json::from_slice(&raw).map_err(|e| CheckpointError::Index {
            job_id: job_id.clone(),
            reason: e.to_string(),
        })
    }

    fn save_index(&self, job_id: &JobId, entries: &[IndexEntry]) -> Result<(), CheckpointError> {
        let body = serde_json::to_vec_pretty(entries).map_err(|e| CheckpointError::Index {
            job_id: job_id.clone(),
            reason: e.to_string(),
        })?;
        atomic_write(&self.meta_path(job_id), &body)?;
        Ok(())
    }

    /// Save one checkpoint. Commits iff at least one medium holds a copy
    /// whose read-back digest matches; raises [`CheckpointError::BothMediaFailed`]
    /// when neither does.
    pub async fn save(
        &self,
        job_id: &JobId,
        seq: u64,
        bytes: &[u8],
    ) -> Result<Checkpoint, CheckpointError> {
        let mut index = self.load_index(job_id)?;
        if let Some(last) = index.last() {
            if seq <= last.seq {
                return Err(CheckpointError::StaleSeq { seq, latest: last.seq });
            }
        }

        let digest = sha256_hex(bytes);
        let local_path = self.local_file(job_id, seq);
        let remote_key = Self::remote_key(job_id, seq);

        let local_ok = self.write_local_verified(&local_path, bytes, &digest);
        let remote_ok = self.upload_verified(&remote_key, bytes, &digest).await;

        if !local_ok && !remote_ok {
            return Err(CheckpointError::BothMediaFailed(job_id.clone()));
        }

        let entry = IndexEntry {
            seq,
            sha256: digest,
            size_bytes: bytes.len() as u64,
            local_path: local_ok.then(|| local_path.to_string_lossy().into_owned()),
            remote_key: remote_ok.then_some(remote_key),
            saved_at: Utc::now(),
        };
        let checkpoint = entry.to_checkpoint(job_id);
        index.push(entry);
        self.save_index(job_id, &index)?;

        info!(
            job_id = %job_id,
            seq,
            size_bytes = bytes.len(),
            local = local_ok,
            remote = remote_ok,
            "checkpoint saved"
        );

        self.prune_oldest(job_id, self.keep_n).await?;
        Ok(checkpoint)
    }

    /// Write to the local medium with atomic rename and verify by re-reading.
    fn write_local_verified(&self, path: &Path, bytes: &[u8], digest: &str) -> bool {
        let attempt = || -> std::io::Result<bool> {
            atomic_write(path, bytes)?;
            let back = fs::read(path)?;
            Ok(sha256_hex(&back) == digest)
        };
        match attempt() {
            Ok(true) => true,
            Ok(false) => {
                warn!(path = %path.display(), "local read-back digest mismatch");
                false
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "local checkpoint write failed");
                false
            }
        }
    }

    /// Upload with the fixed retry schedule and verify by reading the object back.
    async fn upload_verified(&self, key: &str, bytes: &[u8], digest: &str) -> bool {
        for (attempt, delay) in REMOTE_RETRY_DELAYS.iter().enumerate() {
            match self.try_upload(key, bytes, digest).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(key, attempt = attempt + 1, error = %e, "remote upload attempt failed");
                    if attempt + 1 < REMOTE_RETRY_DELAYS.len() {
                        tokio::time::sleep(Duration::from_secs(*delay)).await;
                    }
                }
            }
        }
        warn!(key, attempts = REMOTE_RETRY_DELAYS.len(), "remote upload exhausted retries");
        false
    }

    async fn try_upload(
        &self,
        key: &str,
        bytes: &[u8],
        digest: &str,
    ) -> Result<(), ObjectStoreError> {
        self.remote.put(key, bytes).await?;
        let back = self
            .remote
            .get(key)
            .await?
            .ok_or_else(|| ObjectStoreError::Request("uploaded object missing on read-back".into()))?;
        if sha256_hex(&back) != digest {
            return Err(ObjectStoreError::Request("read-back digest mismatch".into()));
        }
        Ok(())
    }

    /// Load checkpoint bytes, local medium first, remote as fallback.
    ///
    /// When the remote copy is valid and the local copy is missing or
    /// corrupt, the local copy is rewritten from the verified remote bytes
    /// before returning (self-heal). Returns `None` when no medium holds a
    /// copy matching the indexed digest.
    pub async fn load(&self, job_id: &JobId, seq: Option<u64>) -> Option<Vec<u8>> {
        let index = match self.load_index(job_id) {
            Ok(index) => index,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "checkpoint index unreadable on load");
                return None;
            }
        };
        let pos = match seq {
            Some(s) => index.iter().position(|e| e.seq == s)?,
            None => index.len().checked_sub(1)?,
        };
        let entry = &index[pos];

        if let Some(path) = &entry.local_path {
            if let Ok(bytes) = fs::read(path) {
                if sha256_hex(&bytes) == entry.sha256 {
                    return Some(bytes);
                }
                warn!(job_id = %job_id, seq = entry.seq, "local checkpoint corrupt, trying remote");
            }
        }

        let key = entry.remote_key.as_deref()?;
        match self.remote.get(key).await {
            Ok(Some(bytes)) if sha256_hex(&bytes) == entry.sha256 => {
                self.heal_local(job_id, pos, &bytes, &index);
                Some(bytes)
            }
            Ok(Some(_)) => {
                warn!(job_id = %job_id, seq = entry.seq, "remote checkpoint digest mismatch");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(job_id = %job_id, key, error = %e, "remote checkpoint fetch failed");
                None
            }
        }
    }

    /// Rewrite the canonical local file from verified remote bytes and
    /// record the restored path in the index. Failures are logged only.
    fn heal_local(&self, job_id: &JobId, pos: usize, bytes: &[u8], index: &[IndexEntry]) {
        let seq = index[pos].seq;
        let path = self.local_file(job_id, seq);
        if let Err(e) = atomic_write(&path, bytes) {
            warn!(job_id = %job_id, seq, error = %e, "self-heal local rewrite failed");
            return;
        }
        let mut updated = index.to_vec();
        updated[pos].local_path = Some(path.to_string_lossy().into_owned());
        if let Err(e) = self.save_index(job_id, &updated) {
            warn!(job_id = %job_id, seq, error = %e, "self-heal index update failed");
        } else {
            info!(job_id = %job_id, seq, "local checkpoint restored from remote");
        }
    }

    /// All committed checkpoints for a job, ordered by seq.
    pub fn list(&self, job_id: &JobId) -> Vec<Checkpoint> {
        match self.load_index(job_id) {
            Ok(index) => index.iter().map(|e| e.to_checkpoint(job_id)).collect(),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "checkpoint index unreadable on list");
                Vec::new()
            }
        }
    }

    /// The most recent committed checkpoint, if any.
    pub fn latest(&self, job_id: &JobId) -> Option<Checkpoint> {
        self.list(job_id).pop()
    }

    /// The next seq a caller should save with.
    pub fn next_seq(&self, job_id: &JobId) -> u64 {
        self.latest(job_id).map(|c| c.seq + 1).unwrap_or(1)
    }

    /// Remove every checkpoint and the index for a job. Idempotent.
    pub async fn delete_all(&self, job_id: &JobId) {
        for entry in self.load_index(job_id).unwrap_or_default() {
            if let Some(key) = &entry.remote_key {
                if let Err(e) = self.remote.delete(key).await {
                    warn!(job_id = %job_id, key, error = %e, "remote checkpoint delete failed");
                }
            }
        }
        let dir = self.job_dir(job_id);
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!(job_id = %job_id, error = %e, "local checkpoint dir delete failed");
            }
        }
        info!(job_id = %job_id, "checkpoints deleted");
    }

    /// Keep the `keep_n` most recent entries, deleting older copies from
    /// both media. Never deletes until at least `keep_n + 1` entries exist.
    pub async fn prune_oldest(&self, job_id: &JobId, keep_n: usize) -> Result<(), CheckpointError> {
        let index = self.load_index(job_id)?;
        if index.len() <= keep_n {
            return Ok(());
        }
        let split = index.len() - keep_n;
        let (stale, remaining) = index.split_at(split);

        for entry in stale {
            if let Some(path) = &entry.local_path {
                if let Err(e) = fs::remove_file(path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(job_id = %job_id, seq = entry.seq, error = %e, "stale local delete failed");
                    }
                }
            }
            if let Some(key) = &entry.remote_key {
                if let Err(e) = self.remote.delete(key).await {
                    warn!(job_id = %job_id, seq = entry.seq, error = %e, "stale remote delete failed");
                }
            }
        }
        self.save_index(job_id, remaining)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write via a temp file, fsync, then rename so partial writes are never
/// visible at the target path.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    fs::create_dir_all(parent)?;

    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
