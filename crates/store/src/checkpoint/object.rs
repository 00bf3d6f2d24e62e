// SPDX-License-Identifier: MIT

//! Remote object medium for the checkpoint store.
//!
//! The actual object-store SDK lives behind this trait; the store only
//! needs put/get/delete on opaque keys.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from the remote object medium.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store request failed: {0}")]
    Request(String),
}

/// Remote object storage keyed by string paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;

    /// Returns `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// In-memory object store used by tests and as the no-remote degraded mode.
#[derive(Default)]
pub struct MemoryObjectStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    objects: HashMap<String, Vec<u8>>,
    fail_next_puts: u32,
    put_attempts: u32,
    get_count: u32,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` put attempts fail.
    pub fn fail_next_puts(&self, n: u32) {
        self.inner.lock().fail_next_puts = n;
    }

    /// Overwrite stored bytes without going through `put` (corruption fixture).
    pub fn poison(&self, key: &str, bytes: Vec<u8>) {
        self.inner.lock().objects.insert(key.to_string(), bytes);
    }

    pub fn put_attempts(&self) -> u32 {
        self.inner.lock().put_attempts
    }

    pub fn get_count(&self) -> u32 {
        self.inner.lock().get_count
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.inner.lock().objects.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let mut inner = self.inner.lock();
        inner.put_attempts += 1;
        if inner.fail_next_puts > 0 {
            inner.fail_next_puts -= 1;
            return Err(ObjectStoreError::Request("injected put failure".into()));
        }
        inner.objects.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let mut inner = self.inner.lock();
        inner.get_count += 1;
        Ok(inner.objects.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.inner.lock().objects.remove(key);
        Ok(())
    }
}
