// SPDX-License-Identifier: MIT

//! SQLite-backed store for ping samples and hourly latency rollups.
//!
//! Opened in WAL mode with a 5 s busy timeout; the network monitor is the
//! only writer.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use thiserror::Error;

/// Errors from the metric store.
#[derive(Debug, Error)]
pub enum MetricStoreError {
    #[error("metric store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metric store query failed: {0}")]
    Sql(#[from] sqlx::Error),
}

/// One hourly latency rollup row.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyBucket {
    /// UTC hour key, `YYYY-MM-DD-HH`.
    pub bucket: String,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub sample_count: i64,
}

/// Store for network probe samples, keyed by epoch-seconds timestamp.
pub struct MetricStore {
    pool: SqlitePool,
    retention_days: u32,
}

impl MetricStore {
    pub async fn open(path: &Path, retention_days: u32) -> Result<Self, MetricStoreError> {
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
            "CREATE TABLE IF NOT EXISTS ping_results (
                ts REAL PRIMARY KEY,
                target TEXT NOT NULL,
                latency_ms REAL,
                success INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS latency_stats (
                bucket TEXT PRIMARY KEY,
                p50 REAL, p95 REAL, p99 REAL, sample_count INTEGER
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool, retention_days })
    }

    /// Persist one probe sample. `latency_ms = None` records a failure.
    pub async fn record_ping(
        &self,
        ts: f64,
        target: &str,
        latency_ms: Option<f64>,
    ) -> Result<(), MetricStoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO ping_results (ts, target, latency_ms, success)
             VALUES (?, ?, ?, ?)",
        )
        .bind(ts)
        .bind(target)
        .bind(latency_ms)
        .bind(latency_ms.is_some() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Roll the last hour of successful samples into `latency_stats`.
    /// No-op when the hour holds no successful samples.
    pub async fn compute_hourly_stats(&self, now: DateTime<Utc>) -> Result<(), MetricStoreError> {
        let hour_ago = now.timestamp() as f64 - 3600.0;
        let rows = sqlx::query(
            "SELECT latency_ms FROM ping_results WHERE ts > ? AND success = 1",
        )
        .bind(hour_ago)
        .fetch_all(&self.pool)
        .await?;

        let mut vals: Vec<f64> =
            rows.iter().filter_map(|r| r.get::<Option<f64>, _>("latency_ms")).collect();
        if vals.is_empty() {
            return Ok(());
        }
        vals.sort_by(f64::total_cmp);

        let n = vals.len();
        let pick = |q: f64| vals[((n as f64 * q) as usize).min(n - 1)];
        let bucket = now.format("%Y-%m-%d-%H").to_string();

        sqlx::query(
            "INSERT OR REPLACE INTO latency_stats (bucket, p50, p95, p99, sample_count)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&bucket)
        .bind(pick(0.50))
        .bind(pick(0.95))
        .bind(pick(0.99))
        .bind(n as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete samples and rollups past the retention horizon.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<(), MetricStoreError> {
        let cutoff = now.timestamp() as f64 - self.retention_days as f64 * 86_400.0;
        sqlx::query("DELETE FROM ping_results WHERE ts < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let cutoff_bucket =
            (now - Duration::days(self.retention_days as i64)).format("%Y-%m-%d-%H").to_string();
        sqlx::query("DELETE FROM latency_stats WHERE bucket < ?")
            .bind(cutoff_bucket)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Success percentage over the trailing 24 h; 100 when no samples exist.
    pub async fn uptime_24h(&self, now: DateTime<Utc>) -> Result<f64, MetricStoreError> {
        let cutoff = now.timestamp() as f64 - 86_400.0;
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(success), 0) AS ok
             FROM ping_results WHERE ts > ?",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let ok: i64 = row.get("ok");
        if total == 0 {
            return Ok(100.0);
        }
        Ok(ok as f64 / total as f64 * 100.0)
    }

    /// Look up one rollup row (test and status introspection).
    pub async fn stats_for(&self, bucket: &str) -> Result<Option<LatencyBucket>, MetricStoreError> {
        let row = sqlx::query(
            "SELECT bucket, p50, p95, p99, sample_count FROM latency_stats WHERE bucket = ?",
        )
        .bind(bucket)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| LatencyBucket {
            bucket: r.get("bucket"),
            p50: r.get("p50"),
            p95: r.get("p95"),
            p99: r.get("p99"),
            sample_count: r.get("sample_count"),
        }))
    }

    /// Total stored samples (test introspection).
    pub async fn sample_count(&self) -> Result<i64, MetricStoreError> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM ping_results").fetch_one(&self.pool).await?;
        Ok(row.get("n"))
    }

    /// Current journal mode (test introspection).
    pub async fn journal_mode(&self) -> Result<String, MetricStoreError> {
        let row = sqlx::query("PRAGMA journal_mode").fetch_one(&self.pool).await?;
        Ok(row.get::<String, _>(0))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
