// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! CSRF token issuance and validation.
//!
//! Tokens are `<nonce>.<signature>` where the HMAC-SHA256 signature binds a
//! random nonce to the session id. Each session has one live record in an
//! in-memory store together with the origin it was issued to and its expiry.
//!
//! Mutating requests must present the token twice (double-submit):
//! - in the configured header (default `x-csrf-token`)
//! - in the cookie as `<session_id>.<signature over session id and token>`
//!
//! The cookie tells the server which session to look up; the header must
//! match both the cookie signature and the stored record. All secret
//! comparisons are constant time.

use crate::config::{CsrfConfig, Environment};
use crate::crypto::{self, Signer};
use crate::error::{ConfigError, CsrfError};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Protocol version advertised in `X-CSRF-Version`.
pub const CSRF_VERSION: &str = "2.0";

const TOKEN_DOMAIN: &str = "csrf-token";
const COOKIE_DOMAIN: &str = "csrf-cookie";
const MAX_SESSION_ID_LEN: usize = 128;

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Lifetime in whole seconds.
    pub fn expires_in_secs(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Stored state for one session.
#[derive(Debug, Clone)]
struct TokenRecord {
    token: String,
    origin: Option<String>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Records keyed by session id, with an index ordered by issue time so the
/// oldest record can be evicted without scanning.
#[derive(Debug, Default)]
struct TokenStore {
    records: HashMap<String, TokenRecord>,
    by_issued: BTreeSet<(DateTime<Utc>, String)>,
}

impl TokenStore {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, session_id: &str) -> Option<&TokenRecord> {
        self.records.get(session_id)
    }

    fn contains(&self, session_id: &str) -> bool {
        self.records.contains_key(session_id)
    }

    fn insert(&mut self, session_id: String, record: TokenRecord) {
        let issued_at = record.issued_at;
        if let Some(old) = self.records.insert(session_id.clone(), record) {
            self.by_issued.remove(&(old.issued_at, session_id.clone()));
        }
        self.by_issued.insert((issued_at, session_id));
    }

    fn remove(&mut self, session_id: &str) -> Option<TokenRecord> {
        let record = self.records.remove(session_id)?;
        self.by_issued
            .remove(&(record.issued_at, session_id.to_string()));
        Some(record)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, session_id) = self.by_issued.pop_first()?;
        self.records.remove(&session_id);
        Some(session_id)
    }

    fn retain_unexpired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| now <= record.expires_at);
        let records = &self.records;
        self.by_issued
            .retain(|(_, session_id)| records.contains_key(session_id));
        before - self.records.len()
    }

    fn expired(&self, now: DateTime<Utc>) -> usize {
        self.records
            .values()
            .filter(|r| now > r.expires_at)
            .count()
    }
}

/// Result of [`CsrfProtection::validate_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidation {
    pub valid: bool,
    pub error: Option<CsrfError>,
    /// Replacement token when rotation-on-use is enabled
    pub new_token: Option<IssuedToken>,
}

impl TokenValidation {
    fn ok(new_token: Option<IssuedToken>) -> Self {
        Self {
            valid: true,
            error: None,
            new_token,
        }
    }

    fn fail(error: CsrfError) -> Self {
        Self {
            valid: false,
            error: Some(error),
            new_token: None,
        }
    }
}

/// Result of [`CsrfProtection::check_request`].
#[derive(Debug, Clone)]
pub struct CsrfCheck {
    pub valid: bool,
    pub error: Option<CsrfError>,
    /// Headers to attach to the response after a rotation
    pub new_headers: Option<HeaderMap>,
}

impl CsrfCheck {
    fn pass() -> Self {
        Self {
            valid: true,
            error: None,
            new_headers: None,
        }
    }

    fn reject(error: CsrfError) -> Self {
        Self {
            valid: false,
            error: Some(error),
            new_headers: None,
        }
    }
}

/// Token store statistics for the opt-in debug response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenStats {
    pub total: usize,
    pub expired: usize,
    pub capacity: usize,
}

/// CSRF protection service.
pub struct CsrfProtection {
    config: CsrfConfig,
    environment: Environment,
    signer: Signer,
    header_name: HeaderName,
    store: RwLock<TokenStore>,
}

impl CsrfProtection {
    /// Create the service. Fails when the signing secret is missing or weak.
    pub fn new(config: CsrfConfig, environment: Environment) -> Result<Self, ConfigError> {
        config.validate()?;
        let header_name =
            HeaderName::from_bytes(config.header_name.as_bytes()).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "CSRF_HEADER_NAME",
                    value: config.header_name.clone(),
                }
            })?;
        Ok(Self {
            signer: Signer::new(&config.secret),
            header_name,
            config,
            environment,
            store: RwLock::new(TokenStore::default()),
        })
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Header carrying the token on mutating requests.
    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Issue a token for `existing_session_id`, or for a new session.
    pub async fn generate_token(
        &self,
        existing_session_id: Option<&str>,
        origin: Option<&str>,
    ) -> IssuedToken {
        self.generate_token_at(existing_session_id, origin, Utc::now())
            .await
    }

    pub(crate) async fn generate_token_at(
        &self,
        existing_session_id: Option<&str>,
        origin: Option<&str>,
        now: DateTime<Utc>,
    ) -> IssuedToken {
        let session_id = existing_session_id
            .filter(|id| is_valid_session_id(id))
            .map(str::to_string)
            .unwrap_or_else(new_session_id);
        let origin = origin.map(str::trim).filter(|o| !o.is_empty());

        let mut store = self.store.write().await;
        let issued = self.issue(&mut store, session_id, origin.map(str::to_string), now);
        debug!(session_id = %issued.session_id, "CSRF token issued");
        issued
    }

    /// Sign a new token and record it, evicting the oldest record at capacity.
    fn issue(
        &self,
        store: &mut TokenStore,
        session_id: String,
        origin: Option<String>,
        now: DateTime<Utc>,
    ) -> IssuedToken {
        let nonce = crypto::random_token(crypto::NONCE_LEN);
        let signature = self.signer.sign(TOKEN_DOMAIN, &[&session_id, &nonce]);
        let token = format!("{nonce}.{signature}");
        let expires_at = now + self.config.token_expiry();

        if !store.contains(&session_id) && store.len() >= self.config.max_tokens {
            if let Some(evicted) = store.evict_oldest() {
                debug!(session_id = %evicted, "Token store at capacity, evicting oldest");
            }
        }
        store.insert(
            session_id.clone(),
            TokenRecord {
                token: token.clone(),
                origin,
                issued_at: now,
                expires_at,
            },
        );

        IssuedToken {
            token,
            session_id,
            issued_at: now,
            expires_at,
        }
    }

    /// Double-submit cookie value for an issued token.
    pub fn generate_cookie_value(&self, issued: &IssuedToken) -> String {
        let signature = self
            .signer
            .sign(COOKIE_DOMAIN, &[&issued.session_id, &issued.token]);
        format!("{}.{}", issued.session_id, signature)
    }

    /// `Set-Cookie` value carrying the double-submit cookie.
    pub fn set_cookie_header(&self, issued: &IssuedToken) -> String {
        Cookie::build((
            self.config.cookie_name.clone(),
            self.generate_cookie_value(issued),
        ))
        .http_only(true)
        .secure(self.environment.is_production())
        .same_site(SameSite::Lax)
        .path("/")
        .build()
        .to_string()
    }

    /// Validate `token` against the record stored for `session_id`.
    pub async fn validate_token(&self, token: &str, session_id: &str) -> TokenValidation {
        self.validate_token_at(token, session_id, None, Utc::now())
            .await
    }

    /// Like [`CsrfProtection::validate_token`], additionally requiring the
    /// request origin to match the origin the token was issued to.
    pub async fn validate_token_from(
        &self,
        token: &str,
        session_id: &str,
        origin: Option<&str>,
    ) -> TokenValidation {
        self.validate_token_at(token, session_id, origin, Utc::now())
            .await
    }

    pub(crate) async fn validate_token_at(
        &self,
        token: &str,
        session_id: &str,
        origin: Option<&str>,
        now: DateTime<Utc>,
    ) -> TokenValidation {
        if token.is_empty() || session_id.is_empty() {
            return TokenValidation::fail(CsrfError::TokenMissing);
        }

        let mut store = self.store.write().await;
        let Some(record) = store.get(session_id) else {
            return TokenValidation::fail(CsrfError::TokenMismatch);
        };

        if now > record.expires_at {
            store.remove(session_id);
            return TokenValidation::fail(CsrfError::TokenExpired);
        }

        if !self.signature_valid(token, session_id) || !crypto::constant_time_eq(&record.token, token)
        {
            return TokenValidation::fail(CsrfError::TokenMismatch);
        }

        if let (Some(expected), Some(actual)) = (record.origin.as_deref(), origin) {
            if !expected.eq_ignore_ascii_case(actual.trim()) {
                return TokenValidation::fail(CsrfError::OriginMismatch);
            }
        }

        if !self.config.rotate_on_use {
            return TokenValidation::ok(None);
        }

        let origin = record.origin.clone();
        let rotated = self.issue(&mut store, session_id.to_string(), origin, now);
        debug!(session_id, "CSRF token rotated on use");
        TokenValidation::ok(Some(rotated))
    }

    fn signature_valid(&self, token: &str, session_id: &str) -> bool {
        match token.rsplit_once('.') {
            Some((nonce, signature)) => {
                self.signer
                    .verify(TOKEN_DOMAIN, &[session_id, nonce], signature)
            }
            None => false,
        }
    }

    /// Gate a request. Safe methods, paths outside the protected prefix and
    /// exempt paths pass without inspection.
    pub async fn check_request(&self, method: &Method, path: &str, headers: &HeaderMap) -> CsrfCheck {
        self.check(method, path, None, headers).await
    }

    /// Like [`CsrfProtection::check_request`], falling back to the URI
    /// authority when `Host` is absent (HTTP/2 `:authority`).
    pub async fn check_request_uri(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> CsrfCheck {
        let authority = uri.authority().map(|a| a.as_str());
        self.check(method, uri.path(), authority, headers).await
    }

    async fn check(
        &self,
        method: &Method,
        path: &str,
        authority: Option<&str>,
        headers: &HeaderMap,
    ) -> CsrfCheck {
        if !self.requires_check(method, path) {
            return CsrfCheck::pass();
        }

        let origin = header_str(headers, header::ORIGIN.as_str());
        if let Some(origin) = origin {
            let host = header_str(headers, header::HOST.as_str()).or(authority);
            if !host.is_some_and(|host| origin_matches_host(origin, host)) {
                warn!(%method, path, "CSRF check failed: cross-origin request");
                return CsrfCheck::reject(CsrfError::OriginMismatch);
            }
        }

        let Some(token) = header_str(headers, self.header_name.as_str()) else {
            warn!(%method, path, "CSRF check failed: header missing");
            return CsrfCheck::reject(CsrfError::MissingHeader);
        };

        let jar = CookieJar::from_headers(headers);
        let Some(cookie) = jar.get(&self.config.cookie_name) else {
            warn!(%method, path, "CSRF check failed: cookie missing");
            return CsrfCheck::reject(CsrfError::MissingCookie);
        };

        let Some((session_id, cookie_signature)) = cookie.value().rsplit_once('.') else {
            warn!(%method, path, "CSRF check failed: malformed cookie");
            return CsrfCheck::reject(CsrfError::TokenMismatch);
        };

        if !self
            .signer
            .verify(COOKIE_DOMAIN, &[session_id, token], cookie_signature)
        {
            warn!(%method, path, "CSRF check failed: cookie does not pair with header");
            return CsrfCheck::reject(CsrfError::TokenMismatch);
        }

        let validation = self.validate_token_from(token, session_id, origin).await;
        if let Some(error) = validation.error {
            warn!(%method, path, code = error.code(), "CSRF check failed");
            return CsrfCheck::reject(error);
        }

        CsrfCheck {
            valid: true,
            error: None,
            new_headers: validation
                .new_token
                .map(|rotated| self.rotation_headers(&rotated)),
        }
    }

    fn requires_check(&self, method: &Method, path: &str) -> bool {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            return false;
        }
        if !path.starts_with(&self.config.protected_prefix) {
            return false;
        }
        let exempt = self.config.exempt_paths.iter().any(|p| p == path)
            || self
                .config
                .exempt_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()));
        !exempt
    }

    fn rotation_headers(&self, rotated: &IssuedToken) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&rotated.token) {
            headers.insert(self.header_name.clone(), value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.set_cookie_header(rotated)) {
            headers.insert(header::SET_COOKIE, value);
        }
        headers
    }

    /// Remove expired records. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    pub(crate) async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut store = self.store.write().await;
        let removed = store.retain_unexpired(now);
        if removed > 0 {
            debug!(removed, remaining = store.len(), "Expired CSRF tokens swept");
        }
        removed
    }

    /// Store statistics.
    pub async fn stats(&self) -> TokenStats {
        let now = Utc::now();
        let store = self.store.read().await;
        TokenStats {
            total: store.len(),
            expired: store.expired(now),
            capacity: self.config.max_tokens,
        }
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Session ids travel inside the cookie, so only a conservative alphabet is
/// accepted from clients.
fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Whether an `Origin` header names the same host and port as `Host`.
pub fn origin_matches_host(origin: &str, host: &str) -> bool {
    let Ok(origin_url) = Url::parse(origin.trim()) else {
        return false;
    };
    let Some(origin_host) = origin_url.host_str() else {
        return false;
    };
    let Ok(host_url) = Url::parse(&format!("{}://{}", origin_url.scheme(), host.trim())) else {
        return false;
    };
    let host_is_bare = host_url.username().is_empty()
        && host_url.password().is_none()
        && host_url.path() == "/"
        && host_url.query().is_none();

    host_is_bare
        && host_url.host_str() == Some(origin_host)
        && host_url.port_or_known_default() == origin_url.port_or_known_default()
}
