// SPDX-License-Identifier: MIT

//! HTTP surface for heartbeat ingest and status queries.
//!
//! - `POST /heartbeat` - bearer-authenticated ingest; 401 without the
//!   configured token, 400 on an unreadable body. Missing body fields are
//!   treated as empty.
//! - `GET /heartbeat/status` - all registered peers.
//! - `GET /heartbeat/status/{name}` - one peer, 404 for unknown names.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use sw_core::Clock;
use tracing::warn;

use super::HeartbeatAggregator;

/// Shared state for the heartbeat routes.
pub struct HeartbeatCtx<C: Clock> {
    pub aggregator: Arc<HeartbeatAggregator<C>>,
    /// Bearer token heartbeat posts must carry (the MC token).
    pub token: String,
}

impl<C: Clock> Clone for HeartbeatCtx<C> {
    fn clone(&self) -> Self {
        Self { aggregator: Arc::clone(&self.aggregator), token: self.token.clone() }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HeartbeatBody {
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Build the heartbeat router.
pub fn heartbeat_router<C: Clock>(ctx: HeartbeatCtx<C>) -> Router {
    Router::new()
        .route("/heartbeat", post(post_heartbeat::<C>))
        .route("/heartbeat/status", get(get_status::<C>))
        .route("/heartbeat/status/{name}", get(get_status_one::<C>))
        .with_state(ctx)
}

fn authorized<C: Clock>(headers: &HeaderMap, ctx: &HeartbeatCtx<C>) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", ctx.token))
        .unwrap_or(false)
}

async fn post_heartbeat<C: Clock>(
    State(ctx): State<HeartbeatCtx<C>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if !authorized(&headers, &ctx) {
        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"error": "unauthorized"})))
            .into_response();
    }
    let Ok(body) = serde_json::from_slice::<HeartbeatBody>(&body) else {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "invalid body"})))
            .into_response();
    };

    let metadata = body.metadata.unwrap_or_else(|| serde_json::json!({}));
    match ctx.aggregator.record(&body.agent_id, &body.message, metadata).await {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(e) => {
            warn!(error = %e, "heartbeat insert failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "storage failure"})),
            )
                .into_response()
        }
    }
}

async fn get_status<C: Clock>(State(ctx): State<HeartbeatCtx<C>>) -> Response {
    Json(ctx.aggregator.status().await).into_response()
}

async fn get_status_one<C: Clock>(
    State(ctx): State<HeartbeatCtx<C>>,
    Path(name): Path<String>,
) -> Response {
    match ctx.aggregator.status_for(&name).await {
        Some(status) => Json(status).into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "unknown agent"})))
            .into_response(),
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
