// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

/// How the simulated client presents its CSRF credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// Header and cookie from a genuinely issued token
    Valid,
    /// No header at all
    Missing,
    /// Header carries an invented token, cookie is genuine
    Forged,
    /// Header from one session, cookie from another
    CrossSession,
    /// Valid pair replayed from a foreign Origin
    CrossOrigin,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Number of unique IPs to simulate
    pub unique_ips: usize,
    /// Credential presentation
    pub token_mode: TokenMode,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_ips: 1,
            token_mode: TokenMode::Valid,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Single IP flood with valid tokens - simulates contact form spam.
    pub fn single_ip_flood() -> Self {
        Self {
            total_requests: 200,
            unique_ips: 1,
            ..Default::default()
        }
    }

    /// Distributed flood - many IPs, each inside its own window.
    pub fn distributed_flood() -> Self {
        Self {
            total_requests: 500,
            unique_ips: 100,
            ..Default::default()
        }
    }

    /// Requests that never fetched a token.
    pub fn missing_token() -> Self {
        Self {
            total_requests: 50,
            unique_ips: 5,
            token_mode: TokenMode::Missing,
        }
    }

    /// Invented tokens paired with a real cookie.
    pub fn forged_token() -> Self {
        Self {
            total_requests: 50,
            unique_ips: 5,
            token_mode: TokenMode::Forged,
        }
    }

    /// Token stolen from another session.
    pub fn cross_session_replay() -> Self {
        Self {
            total_requests: 50,
            unique_ips: 5,
            token_mode: TokenMode::CrossSession,
        }
    }

    /// Valid credentials submitted from a foreign page.
    pub fn cross_origin_replay() -> Self {
        Self {
            total_requests: 50,
            unique_ips: 5,
            token_mode: TokenMode::CrossOrigin,
        }
    }

    /// Maximum number of requests that may get through a limiter allowing
    /// `max_requests` per identifier.
    pub fn max_allowed(&self, max_requests: usize) -> usize {
        match self.token_mode {
            TokenMode::Valid => (self.unique_ips * max_requests).min(self.total_requests),
            _ => 0,
        }
    }
}
