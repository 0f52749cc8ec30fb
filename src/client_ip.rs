// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client identification for rate limiting.
//!
//! Header precedence:
//! 1. CDN connecting-IP headers (`cf-connecting-ip`, `x-vercel-forwarded-for`)
//! 2. First entry of `x-forwarded-for`
//! 3. `x-real-ip`
//!
//! Empty or whitespace-only values fall through to the next header. With no
//! usable signal the identifier is [`UNKNOWN_CLIENT`].

use axum::http::HeaderMap;

/// Identifier used when no header identifies the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

const CDN_HEADERS: &[&str] = &["cf-connecting-ip", "x-vercel-forwarded-for"];

/// Resolve the client identifier for a request.
pub fn client_ip(headers: &HeaderMap) -> String {
    CDN_HEADERS
        .iter()
        .find_map(|name| header_value(headers, name).and_then(first_list_entry))
        .or_else(|| header_value(headers, "x-forwarded-for").and_then(first_list_entry))
        .or_else(|| header_value(headers, "x-real-ip").and_then(non_blank))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn first_list_entry(value: &str) -> Option<&str> {
    value.split(',').next().and_then(non_blank)
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
