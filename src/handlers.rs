// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact gate.
//!
//! Handlers turn component results into status codes and decide every
//! user-visible message. Rejections never echo submitted token or cookie
//! values.

use crate::client_ip::client_ip;
use crate::config::Config;
use crate::contact::{ContactForm, ContactMessage, ContactValidator, Mailer, ValidationResult};
use crate::crypto::ALGORITHM;
use crate::csrf::{CsrfProtection, TokenStats, CSRF_VERSION};
use crate::error::{AppError, ConfigError, ErrorResponse};
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::sweeper::{Sweeper, SweeperHandle};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const CSRF_VERSION_HEADER: &str = "x-csrf-version";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub csrf: Arc<CsrfProtection>,
    pub limiter: Arc<RateLimiter>,
    pub validator: ContactValidator,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Metrics,
}

impl AppState {
    /// Build the state, failing fast on bad configuration.
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Result<Self, ConfigError> {
        config.validate()?;
        let csrf = CsrfProtection::new(config.csrf.clone(), config.environment)?;
        let limiter = RateLimiter::new(config.rate_limit)?;
        Ok(Self {
            csrf: Arc::new(csrf),
            limiter: Arc::new(limiter),
            validator: ContactValidator::new(),
            mailer,
            metrics: Metrics::new()?,
            config,
        })
    }

    /// Start the background sweep for this state's stores.
    pub fn start_sweeper(&self) -> SweeperHandle {
        Sweeper::spawn(
            self.config.cleanup_interval(),
            self.limiter.clone(),
            self.csrf.clone(),
        )
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Token issuance response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub session_id: String,
    pub expires_in: i64,
    pub algorithm: &'static str,
    pub version: &'static str,
    pub issued: String,
}

/// Debug validation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Debug validation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_token: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TokenStats>,
}

/// Contact success response.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "contact-gate",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Issue a CSRF token and its double-submit cookie.
///
/// An existing session id may be passed in `X-Session-ID`; the request
/// `Origin` is recorded with the token.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let existing = header_str(&headers, SESSION_ID_HEADER);
    let origin = header_str(&headers, header::ORIGIN.as_str());

    let issued = state.csrf.generate_token(existing, origin).await;
    state.metrics.tokens_issued.inc();

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        header_value(&state.csrf.set_cookie_header(&issued))?,
    );
    response_headers.insert(
        HeaderName::from_static(SESSION_ID_HEADER),
        header_value(&issued.session_id)?,
    );
    response_headers.insert(
        HeaderName::from_static(CSRF_VERSION_HEADER),
        HeaderValue::from_static(CSRF_VERSION),
    );
    insert_no_cache(&mut response_headers);

    debug!(session_id = %issued.session_id, "Token endpoint served");

    let body = TokenResponse {
        expires_in: issued.expires_in_secs(),
        issued: issued.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        token: issued.token,
        session_id: issued.session_id,
        algorithm: ALGORITHM,
        version: CSRF_VERSION,
    };

    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

/// Validate a token directly. Intended for debugging and tests.
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let fields = payload.ok().and_then(|Json(req)| {
        let token = req.token.filter(|t| !t.is_empty())?;
        let session_id = req.session_id.filter(|s| !s.is_empty())?;
        Some((token, session_id))
    });
    let Some((token, session_id)) = fields else {
        return Ok(bad_request("Token and sessionId are required", "MISSING_FIELDS"));
    };

    let validation = state.csrf.validate_token(&token, &session_id).await;
    let stats = if state.csrf.config().expose_stats {
        Some(state.csrf.stats().await)
    } else {
        None
    };

    let mut response_headers = HeaderMap::new();
    insert_no_cache(&mut response_headers);
    if let Some(rotated) = &validation.new_token {
        response_headers.insert(
            header::SET_COOKIE,
            header_value(&state.csrf.set_cookie_header(rotated))?,
        );
    }

    let body = ValidateResponse {
        valid: validation.valid,
        error: validation.error.map(|e| e.code()),
        new_token: validation.new_token.map(|t| t.token),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        stats,
    };
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

/// Accept a contact form submission and hand it to the mailer.
///
/// Runs behind the CSRF and rate limit gates.
pub async fn contact(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let Ok(Json(form)) = payload else {
        state
            .metrics
            .contact_messages
            .with_label_values(&["invalid"])
            .inc();
        return Ok(bad_request("Invalid request body", "INVALID_BODY"));
    };

    let ip = client_ip(&headers);
    if let ValidationResult::Invalid(err) = state.validator.validate(&form) {
        info!(ip = %ip, error = %err, "Contact validation failed");
        state
            .metrics
            .contact_messages
            .with_label_values(&["invalid"])
            .inc();
        return Ok(bad_request(&err.to_string(), "VALIDATION_FAILED"));
    }

    let message = ContactMessage::from_form(&form, &ip);
    if let Err(e) = state.mailer.send(&message).await {
        state
            .metrics
            .contact_messages
            .with_label_values(&["failed"])
            .inc();
        return Err(e.into());
    }

    state
        .metrics
        .contact_messages
        .with_label_values(&["sent"])
        .inc();
    info!(ip = %ip, "Contact message accepted");

    Ok((
        StatusCode::OK,
        Json(ContactResponse {
            success: true,
            message: "Message sent successfully",
        }),
    )
        .into_response())
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let body = state.metrics.encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

fn bad_request(error: &str, code: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            code,
            message: None,
            retry_after_secs: None,
        }),
    )
        .into_response()
}

fn insert_no_cache(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value).map_err(|e| {
        warn!(error = %e, "Generated header value is not representable");
        AppError::Internal(format!("invalid header value: {e}"))
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
