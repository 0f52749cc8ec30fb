// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact gate.
//!
//! Every value has a documented default except the CSRF signing secret,
//! which must be supplied. Values are read from the environment by
//! [`Config::from_env`].

use crate::error::{ConfigError, RateLimitError, MAX_TOKEN_EXPIRY_SECS, MIN_SECRET_LEN};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the contact gate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment (default: development)
    #[serde(default)]
    pub environment: Environment,

    /// CSRF protection configuration
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Rate limiting configuration for the contact endpoint
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Interval between background sweeps in seconds (default: 300)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Deployment environment. Production turns on `Secure` cookies and HSTS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" => Ok(Self::Development),
            other => Err(format!("unknown environment {other:?}")),
        }
    }
}

/// CSRF token issuance and validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// HMAC signing secret. Required, at least 32 bytes.
    #[serde(default, skip_serializing)]
    pub secret: String,

    /// Token lifetime in seconds (default: 3600)
    #[serde(default = "default_token_expiry_secs")]
    pub token_expiry_secs: u64,

    /// Name of the double-submit cookie (default: csrf-token)
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Name of the request header carrying the token (default: x-csrf-token)
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Issue a fresh token after every successful validation (default: false)
    #[serde(default)]
    pub rotate_on_use: bool,

    /// Soft cap on stored tokens; oldest are evicted beyond it (default: 10000)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Include token store statistics in debug validation responses (default: false)
    #[serde(default)]
    pub expose_stats: bool,

    /// Mutating requests under this prefix are checked (default: /api/)
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,

    /// Exact paths that skip the check
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,

    /// Path prefixes that skip the check (static assets)
    #[serde(default = "default_exempt_prefixes")]
    pub exempt_prefixes: Vec<String>,
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds (default: 900000, 15 minutes)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests allowed per window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

fn default_token_expiry_secs() -> u64 {
    3600
}

fn default_cookie_name() -> String {
    "csrf-token".to_string()
}

fn default_header_name() -> String {
    "x-csrf-token".to_string()
}

fn default_max_tokens() -> usize {
    10_000
}

fn default_protected_prefix() -> String {
    "/api/".to_string()
}

fn default_exempt_paths() -> Vec<String> {
    ["/health", "/healthz", "/metrics", "/api/health", "/api/csrf-token"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exempt_prefixes() -> Vec<String> {
    ["/_next/", "/static/", "/assets/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_window_ms() -> u64 {
    15 * 60 * 1000
}

fn default_max_requests() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            environment: Environment::default(),
            csrf: CsrfConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_expiry_secs: default_token_expiry_secs(),
            cookie_name: default_cookie_name(),
            header_name: default_header_name(),
            rotate_on_use: false,
            max_tokens: default_max_tokens(),
            expose_stats: false,
            protected_prefix: default_protected_prefix(),
            exempt_paths: default_exempt_paths(),
            exempt_prefixes: default_exempt_prefixes(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl CsrfConfig {
    /// Get the token lifetime
    pub fn token_expiry(&self) -> chrono::Duration {
        // Bounded by validate(); the clamp keeps the conversion total
        chrono::Duration::seconds(self.token_expiry_secs.min(MAX_TOKEN_EXPIRY_SECS) as i64)
    }

    /// Check the signing secret, token lifetime and store capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort {
                min: MIN_SECRET_LEN,
                got: self.secret.len(),
            });
        }
        if self.token_expiry_secs == 0 {
            return Err(ConfigError::ZeroTokenExpiry);
        }
        if self.token_expiry_secs > MAX_TOKEN_EXPIRY_SECS {
            return Err(ConfigError::TokenExpiryTooLong {
                max: MAX_TOKEN_EXPIRY_SECS,
                got: self.token_expiry_secs,
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        Ok(())
    }
}

impl RateLimitConfig {
    /// Build a config from a window duration and request cap.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window_ms: window.as_millis() as u64,
            max_requests,
        }
    }

    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_requests == 0 {
            return Err(RateLimitError::ZeroMaxRequests);
        }
        if self.window_ms == 0 {
            return Err(RateLimitError::ZeroWindow);
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
    /// - `APP_ENV`: `production` or `development` (default: development)
    /// - `CSRF_SECRET`: HMAC signing secret (required)
    /// - `CSRF_TOKEN_EXPIRY_SECS`: Token lifetime (default: 3600)
    /// - `CSRF_COOKIE_NAME`, `CSRF_HEADER_NAME`: Transport names
    /// - `CSRF_ROTATE_ON_USE`: Rotate tokens after validation (default: false)
    /// - `CSRF_MAX_TOKENS`: Token store soft cap (default: 10000)
    /// - `CSRF_EXPOSE_STATS`: Debug statistics opt-in (default: false)
    /// - `RATE_LIMIT_WINDOW_MS`: Contact window (default: 900000)
    /// - `RATE_LIMIT_MAX_REQUESTS`: Contact requests per window (default: 5)
    /// - `CLEANUP_INTERVAL_SECS`: Background sweep interval (default: 300)
    /// - `METRICS_ENABLED`: Serve Prometheus metrics (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let csrf_defaults = CsrfConfig::default();
        let rate_defaults = RateLimitConfig::default();

        let config = Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            environment: parse_var(&lookup, "APP_ENV", defaults.environment)?,
            csrf: CsrfConfig {
                secret: lookup("CSRF_SECRET").unwrap_or_default(),
                token_expiry_secs: parse_var(
                    &lookup,
                    "CSRF_TOKEN_EXPIRY_SECS",
                    csrf_defaults.token_expiry_secs,
                )?,
                cookie_name: lookup("CSRF_COOKIE_NAME").unwrap_or(csrf_defaults.cookie_name),
                header_name: lookup("CSRF_HEADER_NAME")
                    .map(|h| h.to_ascii_lowercase())
                    .unwrap_or(csrf_defaults.header_name),
                rotate_on_use: parse_var(&lookup, "CSRF_ROTATE_ON_USE", false)?,
                max_tokens: parse_var(&lookup, "CSRF_MAX_TOKENS", csrf_defaults.max_tokens)?,
                expose_stats: parse_var(&lookup, "CSRF_EXPOSE_STATS", false)?,
                ..csrf_defaults
            },
            rate_limit: RateLimitConfig {
                window_ms: parse_var(&lookup, "RATE_LIMIT_WINDOW_MS", rate_defaults.window_ms)?,
                max_requests: parse_var(
                    &lookup,
                    "RATE_LIMIT_MAX_REQUESTS",
                    rate_defaults.max_requests,
                )?,
            },
            cleanup_interval_secs: parse_var(
                &lookup,
                "CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval_secs,
            )?,
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "METRICS_ENABLED", true)?,
                ..defaults.metrics
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.csrf.validate()?;
        self.rate_limit.validate()?;
        if self.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLEANUP_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Get the background sweep interval
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}
