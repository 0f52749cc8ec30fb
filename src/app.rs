// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router assembly.

use crate::gate::{csrf_gate, rate_limit_gate, security_headers};
use crate::handlers::{contact, health, issue_token, metrics, validate_token, AppState};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the service router with all gates attached.
pub fn router(state: Arc<AppState>) -> Router {
    let contact_routes = Router::new()
        .route("/api/contact", post(contact))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_gate,
        ));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/health", get(health))
        .route("/api/csrf-token", get(issue_token).post(validate_token))
        .merge(contact_routes);

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(middleware::from_fn_with_state(state.clone(), csrf_gate))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
