// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: route table, auth gate, and CORS/tracing layers.

pub mod handlers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_layer;
use crate::state::AppState;

/// Build the axum `Router` with the full `/api/v1/*` surface.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health::health))
        .route("/livez", get(handlers::health::livez))
        .route("/readyz", get(handlers::health::readyz))
        .route("/api/v1/metrics", get(handlers::health::metrics))
        // Sessions
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/users", post(handlers::auth::create_user))
        // Agents
        .route("/api/v1/agents", get(handlers::agents::list_agents).post(handlers::agents::create_agent))
        .route(
            "/api/v1/agents/{id}",
            get(handlers::agents::get_agent).delete(handlers::agents::delete_agent),
        )
        .route("/api/v1/agents/{id}/config", put(handlers::agents::put_agent_config))
        .route("/api/v1/agents/{id}/disable", post(handlers::agents::disable_agent))
        .route("/api/v1/agents/{id}/enable", post(handlers::agents::enable_agent))
        .route("/api/v1/agents/heartbeat", post(handlers::agents::heartbeat))
        .route("/api/v1/agents/download/{platform}", get(handlers::agents::download_agent))
        .route("/api/v1/agents/install-guide/{platform}", get(handlers::agents::install_guide))
        // Targets
        .route("/api/v1/targets", get(handlers::targets::list_targets))
        .route(
            "/api/v1/targets/{id}",
            get(handlers::targets::get_target).delete(handlers::targets::delete_target),
        )
        // Alert rules
        .route("/api/v1/alerts/rules", get(handlers::alerts::list_rules).post(handlers::alerts::create_rule))
        .route(
            "/api/v1/alerts/rules/{id}",
            get(handlers::alerts::get_rule).put(handlers::alerts::update_rule).delete(handlers::alerts::delete_rule),
        )
        .route("/api/v1/alerts", get(handlers::alerts::list_active_alerts))
        .route("/api/v1/alerts/{rule_id}/{target_id}/acknowledge", post(handlers::alerts::acknowledge_alert))
        .route("/api/v1/alerts/{rule_id}/{target_id}/resolve", post(handlers::alerts::resolve_alert))
        .route("/api/v1/notifications/test-send", post(handlers::notifications::test_send))
        // Discovery
        .route("/api/v1/discovery/tasks", get(handlers::discovery::list_tasks).post(handlers::discovery::create_task))
        .route("/api/v1/discovery/tasks/{id}", get(handlers::discovery::get_task).delete(handlers::discovery::cancel_task))
        .route("/api/v1/discovery/tasks/{id}/progress", get(handlers::discovery::task_progress))
        .route("/api/v1/discovery/tasks/{id}/results", get(handlers::discovery::task_results))
        // API keys
        .route("/api/v1/apikeys", get(handlers::apikeys::list_keys).post(handlers::apikeys::mint_key))
        .route("/api/v1/apikeys/{id}", axum::routing::delete(handlers::apikeys::revoke_key))
        .route("/api/v1/apikeys/validate", post(handlers::apikeys::validate_key))
        // Config namespaces
        .route(
            "/api/v1/config/alert",
            get(handlers::config::get_alert_config).put(handlers::config::put_alert_config),
        )
        .route(
            "/api/v1/config/system-settings",
            get(handlers::config::get_system_settings).put(handlers::config::put_system_settings),
        )
        .route(
            "/api/v1/config/ai-service",
            get(handlers::config::get_ai_service_config).put(handlers::config::put_ai_service_config),
        )
        // Audit
        .route("/api/v1/audit/logs", get(handlers::audit::list_logs))
        .route("/api/v1/audit/stats", get(handlers::audit::stats))
        .route("/api/v1/audit/logs/export", get(handlers::audit::export_logs))
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
