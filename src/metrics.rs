// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for the gate.
//!
//! Each service instance owns its registry so parallel instances (tests,
//! multiple routers) never collide on metric names.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    /// Tokens issued by the token endpoint
    pub tokens_issued: IntCounter,
    /// CSRF rejections by error code
    pub csrf_rejections: IntCounterVec,
    /// Rate limit decisions by outcome ("allowed" or "limited")
    pub rate_limit_decisions: IntCounterVec,
    /// Contact submissions by result
    pub contact_messages: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tokens_issued = IntCounter::new(
            "csrf_tokens_issued_total",
            "Total number of CSRF tokens issued",
        )?;
        let csrf_rejections = IntCounterVec::new(
            Opts::new("csrf_rejections_total", "Total number of requests rejected by the CSRF gate"),
            &["reason"],
        )?;
        let rate_limit_decisions = IntCounterVec::new(
            Opts::new("rate_limit_decisions_total", "Rate limit decisions by outcome"),
            &["outcome"],
        )?;
        let contact_messages = IntCounterVec::new(
            Opts::new("contact_messages_total", "Contact form submissions by result"),
            &["result"],
        )?;

        registry.register(Box::new(tokens_issued.clone()))?;
        registry.register(Box::new(csrf_rejections.clone()))?;
        registry.register(Box::new(rate_limit_decisions.clone()))?;
        registry.register(Box::new(contact_messages.clone()))?;

        Ok(Self {
            registry,
            tokens_issued,
            csrf_rejections,
            rate_limit_decisions,
            contact_messages,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
