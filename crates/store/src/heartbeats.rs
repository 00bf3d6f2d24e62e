// SPDX-License-Identifier: MIT

//! Append-only SQLite store for peer heartbeat records.
//!
//! One table keyed by record uuid; this component never deletes rows.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the heartbeat store.
#[derive(Debug, Error)]
pub enum HeartbeatStoreError {
    #[error("heartbeat store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("heartbeat store query failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("heartbeat record {0} already exists")]
    DuplicateId(Uuid),
}

/// One liveness signal from a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatRecord {
    pub id: Uuid,
    pub agent_id: String,
    pub agent_name: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub ts: DateTime<Utc>,
}

/// Durable record of every heartbeat the aggregator has accepted.
pub struct HeartbeatStore {
    pool: SqlitePool,
}

impl HeartbeatStore {
    pub async fn open(path: &Path) -> Result<Self, HeartbeatStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS heartbeats (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                message TEXT,
                metadata_json TEXT,
                ts_utc TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Insert one record. A duplicate id is rejected; rows are never updated.
    pub async fn insert(&self, record: &HeartbeatRecord) -> Result<(), HeartbeatStoreError> {
        let metadata = serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".into());
        let result = sqlx::query(
            "INSERT INTO heartbeats (id, agent_id, agent_name, message, metadata_json, ts_utc)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.agent_id)
        .bind(&record.agent_name)
        .bind(&record.message)
        .bind(metadata)
        .bind(record.ts.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(HeartbeatStoreError::DuplicateId(record.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Timestamp and message of the most recent record for an agent id.
    pub async fn last_seen(
        &self,
        agent_id: &str,
    ) -> Result<Option<(DateTime<Utc>, Option<String>)>, HeartbeatStoreError> {
        let row = sqlx::query(
            "SELECT ts_utc, message FROM heartbeats WHERE agent_id = ?
             ORDER BY ts_utc DESC LIMIT 1",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            let ts: String = r.get("ts_utc");
            let message: Option<String> = r.get("message");
            DateTime::parse_from_rfc3339(&ts)
                .ok()
                .map(|ts| (ts.with_timezone(&Utc), message.filter(|m| !m.is_empty())))
        }))
    }

    /// Total stored records (test introspection).
    pub async fn count(&self) -> Result<i64, HeartbeatStoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM heartbeats").fetch_one(&self.pool).await?;
        Ok(row.get("n"))
    }

    /// Current journal mode (test introspection).
    pub async fn journal_mode(&self) -> Result<String, HeartbeatStoreError> {
        let row = sqlx::query("PRAGMA journal_mode").fetch_one(&self.pool).await?;
        Ok(row.get::<String, _>(0))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[path = "heartbeats_tests.rs"]
mod tests;
