// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Middleware gates applied in front of the handlers.
//!
//! Order on the wire: security headers (every response) -> CSRF gate ->
//! rate limit gate (contact route only) -> handler.

use crate::client_ip::client_ip;
use crate::error::ErrorResponse;
use crate::handlers::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

/// Attach browser hardening headers to every response.
pub async fn security_headers(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    if state.config.environment.is_production() {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}

/// Reject mutating requests that fail the CSRF check.
pub async fn csrf_gate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let check = state
        .csrf
        .check_request_uri(&parts.method, &parts.uri, &parts.headers)
        .await;

    if let Some(error) = check.error {
        state
            .metrics
            .csrf_rejections
            .with_label_values(&[error.code()])
            .inc();
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Invalid CSRF token".to_string(),
                code: "CSRF_TOKEN_INVALID",
                message: Some(
                    "The request could not be verified. Refresh the page and try again."
                        .to_string(),
                ),
                retry_after_secs: None,
            }),
        )
            .into_response();
    }

    let mut response = next.run(Request::from_parts(parts, body)).await;
    if let Some(new_headers) = check.new_headers {
        response.headers_mut().extend(new_headers);
    }
    response
}

/// Count the request against the client's window; 429 once exhausted.
pub async fn rate_limit_gate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers());
    let decision = state.limiter.check(&ip).await;

    if !decision.allowed {
        let retry_after_secs = decision.retry_after_secs();
        state
            .metrics
            .rate_limit_decisions
            .with_label_values(&["limited"])
            .inc();
        warn!(
            ip = %ip,
            path = %request.uri().path(),
            retry_after_secs,
            "Request rate limited"
        );
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            Json(ErrorResponse {
                error: "Too many requests. Please try again later.".to_string(),
                code: "RATE_LIMITED",
                message: None,
                retry_after_secs: Some(retry_after_secs),
            }),
        )
            .into_response();
    }

    state
        .metrics
        .rate_limit_decisions
        .with_label_values(&["allowed"])
        .inc();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    response
}
