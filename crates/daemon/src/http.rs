// SPDX-License-Identifier: MIT

//! HTTP serving with graceful shutdown.

use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },
}

/// Bind a listener; failures are fatal at startup.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, HttpError> {
    TcpListener::bind(addr).await.map_err(|source| HttpError::Bind { addr, source })
}

/// Serve until the token trips, then drain in-flight requests.
pub async fn serve(name: &'static str, listener: TcpListener, router: Router, cancel: CancellationToken) {
    let addr = listener.local_addr().ok();
    info!(server = name, ?addr, "http server listening");
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await;
    match result {
        Ok(()) => info!(server = name, "http server stopped"),
        Err(e) => error!(server = name, error = %e, "http server failed"),
    }
}
