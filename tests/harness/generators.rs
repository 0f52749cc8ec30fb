// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for attack simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of IP addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Generate token strings an attacker might submit without having been
/// issued one. None of them carries a valid signature.
pub fn generate_forged_tokens() -> Vec<&'static str> {
    vec![
        "a",
        "null",
        "undefined",
        "deadbeef",
        "not-a-token.not-a-signature",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "..",
        "token.",
        ".signature",
        "%00",
    ]
}

/// Generate `Origin` values that must never pass for host `example.com`.
pub fn generate_foreign_origins() -> Vec<&'static str> {
    vec![
        "https://evil.test",
        "https://example.com.evil.test",
        "https://evilexample.com",
        "http://example.com:8080",
        "null",
        "file://",
        "not a url",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ips() {
        let ips = generate_ips(256);
        assert_eq!(ips.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = ips.iter().collect();
        assert_eq!(unique.len(), 256);
    }
}
