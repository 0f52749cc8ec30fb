// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the contact gate.
//!
//! Configuration problems are fatal and surface as [`ConfigError`] or
//! [`RateLimitError`]. Expected request rejections are carried as values
//! ([`CsrfError`] inside a check result) and never escape as panics.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Minimum accepted length for the CSRF signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted CSRF token lifetime: 30 days.
pub const MAX_TOKEN_EXPIRY_SECS: u64 = 30 * 24 * 60 * 60;

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CSRF_SECRET must be set")]
    MissingSecret,

    #[error("CSRF secret must be at least {min} bytes, got {got}")]
    SecretTooShort { min: usize, got: usize },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Token expiry must be greater than zero")]
    ZeroTokenExpiry,

    #[error("Token expiry must be at most {max} seconds, got {got}")]
    TokenExpiryTooLong { max: u64, got: u64 },

    #[error("Token store capacity must be greater than zero")]
    ZeroMaxTokens,

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Invalid rate limit configuration passed at call time.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("maxRequests must be greater than zero")]
    ZeroMaxRequests,

    #[error("rate limit window must be greater than zero")]
    ZeroWindow,
}

/// Reasons a CSRF check can fail.
///
/// The [`Display`](std::fmt::Display) text is for server-side logs only.
/// Clients receive [`CsrfError::code`] through the debug endpoint and a
/// generic message everywhere else.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsrfError {
    #[error("token or session id missing")]
    TokenMissing,

    #[error("token expired")]
    TokenExpired,

    #[error("token does not match session")]
    TokenMismatch,

    #[error("CSRF header missing")]
    MissingHeader,

    #[error("CSRF cookie missing")]
    MissingCookie,

    #[error("request origin does not match host or issuing origin")]
    OriginMismatch,
}

impl CsrfError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenMismatch => "TOKEN_MISMATCH",
            Self::MissingHeader => "MISSING_HEADER",
            Self::MissingCookie => "MISSING_COOKIE",
            Self::OriginMismatch => "ORIGIN_MISMATCH",
        }
    }
}

/// Errors raised by request handlers that are not expected rejections.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Mail dispatch failed: {0}")]
    Mail(#[from] crate::contact::MailError),

    #[error("Metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "retryAfterSecs", skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed with internal error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Internal server error".to_string(),
                code: "INTERNAL_ERROR",
                message: None,
                retry_after_secs: None,
            }),
        )
            .into_response()
    }
}
