// SPDX-License-Identifier: MIT

//! `GET /status` with a 60 requests/minute in-process cap.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sw_core::Clock;

use super::NetworkMonitor;

const MAX_REQUESTS_PER_MIN: usize = 60;

/// Sliding one-minute request window.
pub struct RequestWindow {
    hits: VecDeque<Instant>,
}

impl RequestWindow {
    fn new() -> Self {
        Self { hits: VecDeque::new() }
    }

    fn allow(&mut self, now: Instant) -> bool {
        while self.hits.front().is_some_and(|t| now.duration_since(*t) >= Duration::from_secs(60)) {
            self.hits.pop_front();
        }
        if self.hits.len() >= MAX_REQUESTS_PER_MIN {
            return false;
        }
        self.hits.push_back(now);
        true
    }
}

/// Shared state for the status route.
pub struct StatusCtx<C: Clock> {
    pub monitor: Arc<NetworkMonitor<C>>,
    pub clock: C,
    pub window: Arc<Mutex<RequestWindow>>,
}

impl<C: Clock> StatusCtx<C> {
    pub fn new(monitor: Arc<NetworkMonitor<C>>, clock: C) -> Self {
        Self { monitor, clock, window: Arc::new(Mutex::new(RequestWindow::new())) }
    }
}

impl<C: Clock> Clone for StatusCtx<C> {
    fn clone(&self) -> Self {
        Self {
            monitor: Arc::clone(&self.monitor),
            clock: self.clock.clone(),
            window: Arc::clone(&self.window),
        }
    }
}

/// Build the status router.
pub fn status_router<C: Clock>(ctx: StatusCtx<C>) -> Router {
    Router::new().route("/status", get(get_status::<C>)).with_state(ctx)
}

async fn get_status<C: Clock>(State(ctx): State<StatusCtx<C>>) -> Response {
    if !ctx.window.lock().allow(ctx.clock.now()) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({"error": "Rate limit exceeded"})),
        )
            .into_response();
    }
    Json(ctx.monitor.status_json().await).into_response()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
