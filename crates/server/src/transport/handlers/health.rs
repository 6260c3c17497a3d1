// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness/readiness/self-monitoring endpoints. Left unauthenticated so a
//! load balancer or orchestrator can probe them without holding credentials.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// Unconditional process liveness: if this handler runs at all, the
/// process is alive. No dependency checks.
pub async fn livez() -> &'static str {
    "ok"
}

/// Readiness: the checkpoint store is reachable and the TSDB ingress
/// channel still has a live receiver on the other end. Either failing
/// means this instance shouldn't take traffic yet even though it's alive.
pub async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.store.load_checkpoint().await {
        tracing::warn!(err = %e, "readyz: checkpoint store unreachable");
        return (StatusCode::SERVICE_UNAVAILABLE, "store unreachable").into_response();
    }
    if state.ingress.tsdb_tx.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "tsdb writer not running").into_response();
    }
    (StatusCode::OK, "ok").into_response()
}

/// Plain-text counters, Prometheus-line-format but hand-rolled: see
/// `crate::metrics` for why no metrics crate is pulled in for three
/// gauges.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
