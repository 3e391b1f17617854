//! HTTP API over the daemon.

mod error;
mod handlers;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use eyre::{Result, WrapErr};
use serde::Serialize;
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::{daemon::DaemonHandle, events::DaemonEvent};

pub use error::ApiError;
pub use handlers::{EXPORTED_MESSAGE, IMPORTED_MESSAGE};

/// The response body shared by every route.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

pub fn router(handle: DaemonHandle) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/api/v1/allCommands", get(handlers::all_commands))
        .route("/api/v1/commands", get(handlers::commands))
        .route("/api/v1/saveAllHistory", post(handlers::save_all_history))
        .route(
            "/api/v1/writeAllCommandsToHistory",
            post(handlers::write_all_commands_to_history),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().include_headers(false)),
        )
        .with_state(handle)
}

/// Bind the listener the API will be served on.
pub async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .wrap_err_with(|| format!("could not listen on {address}"))
}

/// Serve the HTTP API on `listener` in the background.
///
/// The server stops accepting connections on `ShutdownRequested`; the
/// returned task finishes once in-flight requests have drained.
pub fn run_http_server(
    listener: TcpListener,
    handle: DaemonHandle,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let addr = listener.local_addr()?;
    tracing::info!("listening on http://{addr}");

    // Subscribe before spawning so a shutdown emitted right after this
    // returns is not missed
    let mut rx = handle.subscribe();
    let shutdown_signal = async move {
        loop {
            match rx.recv().await {
                Ok(DaemonEvent::ShutdownRequested) => break,
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break, // Channel closed
            }
        }
        tracing::info!("shutting down http server");
    };

    let app = router(handle);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("http server error: {e}");
        }
    });

    Ok((addr, server))
}
