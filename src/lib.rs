// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Gate
//!
//! Request-level security middleware for the portfolio contact API:
//!
//! - CSRF tokens signed with HMAC-SHA256 and bound to a session and origin
//! - Double-submit cookie validation with constant-time comparison
//! - Fixed-window rate limiting per client IP (5 requests / 15 minutes default)
//! - Background sweep of expired tokens and windows
//! - Security response headers
//! - Contact form validation and dispatch

pub mod app;
pub mod client_ip;
pub mod config;
pub mod contact;
pub mod crypto;
pub mod csrf;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod sweeper;

pub use app::router;
pub use config::Config;
pub use csrf::{CsrfCheck, CsrfProtection, IssuedToken, TokenValidation};
pub use error::{AppError, ConfigError, CsrfError, RateLimitError};
pub use handlers::AppState;
pub use limiter::{RateLimitDecision, RateLimiter};
