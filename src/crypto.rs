// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Signing and comparison primitives shared by the CSRF service.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Name reported to clients for the signing algorithm.
pub const ALGORITHM: &str = "HMAC-SHA256";

/// Random bytes per token nonce.
pub const NONCE_LEN: usize = 32;

/// HMAC-SHA256 signer keyed with the service secret.
#[derive(Clone)]
pub struct Signer {
    key: Vec<u8>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    /// Sign `parts` under a domain label. Parts are length-prefixed so that
    /// `("ab", "c")` and `("a", "bc")` never collide.
    pub fn sign(&self, domain: &str, parts: &[&str]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(domain.as_bytes());
        for part in parts {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part.as_bytes());
        }
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Check a signature produced by [`Signer::sign`] in constant time.
    pub fn verify(&self, domain: &str, parts: &[&str], signature: &str) -> bool {
        constant_time_eq(&self.sign(domain, parts), signature)
    }
}

/// Random URL-safe string carrying `len` bytes of entropy.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time string comparison.
///
/// Length differences return `false` without inspecting content; equal
/// lengths are compared without early exit.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
