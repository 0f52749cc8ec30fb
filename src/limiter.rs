// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the contact endpoint.
//!
//! Each client identifier owns a counter and a reset instant. The first
//! request opens a window of `window_ms`; requests inside the window
//! increment the counter until `max_requests` is reached, after which the
//! limiter rejects without touching the entry. Once the reset instant
//! passes the entry counts as absent and a fresh window starts.
//!
//! Expired entries are dropped lazily on the next lookup and in bulk by
//! [`RateLimiter::cleanup`], which the background sweeper calls.

use crate::config::RateLimitConfig;
use crate::error::RateLimitError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// Configured cap for the window
    pub limit: u32,
    /// When the current window ends
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Time until the window resets, for `Retry-After`.
    pub fn retry_after(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }

    /// `Retry-After` in whole seconds, rounded up so clients never retry early.
    pub fn retry_after_secs(&self) -> u64 {
        let wait = self.retry_after();
        wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
    }
}

/// Counter for one client identifier.
#[derive(Debug)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Thread-safe fixed-window rate limiter.
pub struct RateLimiter {
    /// Default configuration used by [`RateLimiter::check`]
    config: RateLimitConfig,
    /// Per-identifier windows
    entries: RwLock<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given default configuration.
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        config.validate()?;
        Ok(Self {
            config,
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Default configuration of this limiter.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and count a request against the default configuration.
    pub async fn check(&self, identifier: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::apply(&mut entries, identifier, &self.config, now)
    }

    /// Check and count a request against an explicit configuration.
    ///
    /// Fails only when the configuration itself is invalid.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision, RateLimitError> {
        config.validate()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Ok(Self::apply(&mut entries, identifier, config, now))
    }

    /// Check-and-increment under a single write guard.
    fn apply(
        entries: &mut HashMap<String, WindowEntry>,
        identifier: &str,
        config: &RateLimitConfig,
        now: Instant,
    ) -> RateLimitDecision {
        let window = config.window_duration();
        let entry = entries
            .entry(identifier.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + window,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        if entry.count >= config.max_requests {
            debug!(identifier, count = entry.count, "Rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                limit: config.max_requests,
                reset_at: entry.reset_at,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: config.max_requests - entry.count,
            limit: config.max_requests,
            reset_at: entry.reset_at,
        }
    }

    /// Remove entries whose window has ended. Returns the number removed.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.reset_at);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Rate limit entries swept");
        }
        removed
    }

    /// Forget one identifier.
    pub async fn reset(&self, identifier: &str) {
        self.entries.write().await.remove(identifier);
    }

    /// Forget every identifier.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of tracked identifiers, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
