// ── HTTP surface ──
//
// `/metrics` renders the registry; `/healthz` reports the last cycle.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::error;

use umami_core::CycleStatus;

use crate::metrics::PrometheusSink;

#[derive(Clone)]
pub struct AppState {
    sink: Arc<PrometheusSink>,
    status: Arc<CycleStatus>,
}

impl AppState {
    pub fn new(sink: Arc<PrometheusSink>, status: Arc<CycleStatus>) -> Self {
        Self { sink, status }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    /// Unix seconds of the last committed cycle, `0` before the first.
    last_fetch: i64,
    success: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve until `shutdown` fires, then drain open connections.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.sink.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let health = Health {
        last_fetch: state.status.last_cycle_timestamp(),
        success: state.status.last_cycle_success(),
    };
    let code = if health.success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}
