// SPDX-License-Identifier: MIT

//! HTTP object-store gateway client.
//!
//! Implements the checkpoint store's remote medium against an S3-compatible
//! HTTP gateway: objects live at `<endpoint>/<bucket>/<key>` and the gateway
//! authenticates with a bearer token.

use async_trait::async_trait;
use std::time::Duration;
use sw_store::{ObjectStore, ObjectStoreError};

pub struct HttpObjectStore {
    endpoint: String,
    bucket: String,
    token: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            token: token.into(),
            client,
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let resp = self
            .client
            .put(self.url(key))
            .bearer_auth(&self.token)
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ObjectStoreError::Request(format!("PUT status {}", resp.status().as_u16())));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let resp = self
            .client
            .get(self.url(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(ObjectStoreError::Request(format!("GET status {}", resp.status().as_u16())));
        }
        let bytes = resp.bytes().await.map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let resp = self
            .client
            .delete(self.url(key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::Request(format!(
                "DELETE status {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "object_store_tests.rs"]
mod tests;
