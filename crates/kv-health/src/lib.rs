//! A small Axum server exposing `GET /health`, plus a background ticker
//! that logs the same check on a fixed interval.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use kv_discovery::{CoordinationStore, Discovery};
use kv_transport::ListenerStatus;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How often the background ticker re-runs the health check and logs it.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("failed to bind health endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("health server error: {0}")]
    Serve(#[from] std::io::Error),
}

struct HealthState<S: CoordinationStore> {
    listener_status: ListenerStatus,
    discovery: Arc<Discovery<S>>,
}

/// Runs a combined check: is the transport's listener up, and does the
/// coordination store respond within its timeout.
async fn check<S: CoordinationStore>(state: &HealthState<S>) -> Result<(), String> {
    if !state.listener_status.is_up() {
        return Err("transport listener is down".to_string());
    }
    state
        .discovery
        .health()
        .await
        .map_err(|err| err.to_string())
}

async fn health_handler<S: CoordinationStore + 'static>(
    State(state): State<Arc<HealthState<S>>>,
) -> impl IntoResponse {
    match check(&state).await {
        Ok(()) => (StatusCode::OK, "OK".to_string()),
        Err(reason) => (StatusCode::INTERNAL_SERVER_ERROR, reason),
    }
}

fn build_router<S: CoordinationStore + 'static>(state: Arc<HealthState<S>>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S>))
        .with_state(state)
}

/// Binds `bind_addr` and serves `/health` until `shutdown` is cancelled.
/// Also spawns the periodic background ticker that logs the same check.
pub async fn serve<S: CoordinationStore + 'static>(
    bind_addr: SocketAddr,
    listener_status: ListenerStatus,
    discovery: Arc<Discovery<S>>,
    shutdown: CancellationToken,
) -> Result<(), HealthError> {
    let state = Arc::new(HealthState {
        listener_status,
        discovery,
    });

    spawn_ticker(state.clone(), shutdown.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|source| HealthError::Bind {
            addr: bind_addr,
            source,
        })?;
    tracing::info!(%bind_addr, "health endpoint listening");

    let app = build_router(state);
    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal.cancelled().await })
        .await?;
    Ok(())
}

fn spawn_ticker<S: CoordinationStore + 'static>(
    state: Arc<HealthState<S>>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match check(&state).await {
                        Ok(()) => tracing::debug!("periodic health check passed"),
                        Err(reason) => tracing::warn!(reason = %reason, "periodic health check failed"),
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("health ticker shutting down");
                    return;
                }
            }
        }
    });
}
