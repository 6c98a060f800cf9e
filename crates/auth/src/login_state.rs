//! Login-state records and their cookie store.
//!
//! One [`LoginState`] exists per login attempt: it binds the attempt's
//! anti-forgery `state` nonce, PKCE verifier, and post-login destination, and
//! travels as an encrypted cookie named `login#<state>#<creation-epoch-ms>`
//! so the callback can find it by `state` alone. A record is immutable once
//! persisted; the callback consumes it exactly once and schedules the cookie
//! for clearing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::codec::{enforce_payload_ceiling, CookieCodec};
use crate::config::AuthConfig;
use crate::cookie::Cookie;
use crate::error::AuthResult;
use crate::http::RequestContext;
use crate::pkce;

const LOGIN_STATE_COOKIE_SEPARATOR: char = '#';
const LOGIN_STATE_COOKIE_PREFIX: &str = "login#";
const LOGIN_STATE_COOKIE_MAX_AGE_SECS: i64 = 3600;

/// At most this many login-state cookies may coexist per client; the oldest
/// are evicted to make room for a new one.
const MAX_CONCURRENT_LOGIN_STATES: usize = 3;

/// Ephemeral record binding a single login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginState {
    /// Anti-forgery nonce, unique per concurrently-stored record.
    pub state: String,

    /// PKCE code verifier, held until the token exchange.
    pub code_verifier: String,

    /// The statically configured OAuth redirect URI.
    pub redirect_uri: String,

    /// Where to send the user after a successful callback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,

    /// Opaque application state carried through the flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_state: Option<Map<String, Value>>,
}

/// Structured form of a login-state cookie name:
/// `login#<state>#<creation-epoch-ms>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStateCookieName {
    pub state: String,
    pub created_at_ms: i64,
}

impl LoginStateCookieName {
    /// Parse a cookie name, returning `None` for anything that is not a
    /// well-formed login-state cookie.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(LOGIN_STATE_COOKIE_PREFIX)?;
        let (state, timestamp) = rest.rsplit_once(LOGIN_STATE_COOKIE_SEPARATOR)?;
        if state.is_empty() {
            return None;
        }
        // Numeric comparison avoids the width-dependence of lexicographic
        // timestamp ordering.
        let created_at_ms = timestamp.parse::<i64>().ok()?;
        Some(Self { state: state.to_string(), created_at_ms })
    }

    /// Render the cookie name back to its wire form.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{}{}{}{}",
            LOGIN_STATE_COOKIE_PREFIX, self.state, LOGIN_STATE_COOKIE_SEPARATOR, self.created_at_ms
        )
    }
}

/// Creates, persists, retrieves, and prunes login-state cookies.
pub struct LoginStateStore {
    codec: CookieCodec,
    redirect_uri: String,
    secure_cookies: bool,
}

impl LoginStateStore {
    /// Build a store keyed by the configured login-state secret.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the secret is empty.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            codec: CookieCodec::new(&config.login_state_secret)?,
            redirect_uri: config.redirect_uri.clone(),
            secure_cookies: config.secure_cookies(),
        })
    }

    /// Create a fresh login-state record for this request.
    ///
    /// Copies `return_url` from the query string when present and attaches
    /// `custom_state` only if it is non-empty.
    ///
    /// # Errors
    /// Returns `AuthError::BadRequest` when `return_url` repeats.
    pub fn create(
        &self,
        ctx: &RequestContext,
        custom_state: Option<Map<String, Value>>,
    ) -> AuthResult<LoginState> {
        let return_url = ctx.single_query_param("return_url")?.map(str::to_string);

        Ok(LoginState {
            state: pkce::generate_state(),
            code_verifier: pkce::generate_code_verifier(),
            redirect_uri: self.redirect_uri.clone(),
            return_url,
            custom_state: custom_state.filter(|cs| !cs.is_empty()),
        })
    }

    /// Encrypt a record and build its timestamped cookie.
    ///
    /// # Errors
    /// Returns `AuthError::PayloadTooLarge` when the sealed record exceeds
    /// the 4 KiB cookie ceiling.
    pub fn persist(&self, login_state: &LoginState) -> AuthResult<Cookie> {
        let sealed = self.codec.seal(login_state)?;
        enforce_payload_ceiling(&sealed)?;

        let name = LoginStateCookieName {
            state: login_state.state.clone(),
            created_at_ms: Utc::now().timestamp_millis(),
        };
        Ok(Cookie::new(name.render(), sealed, LOGIN_STATE_COOKIE_MAX_AGE_SECS)
            .with_secure(self.secure_cookies))
    }

    /// Find and decrypt the login-state cookie matching `state`, returning
    /// the record together with a pre-built clear instruction for the matched
    /// cookie. The caller decides whether and when to attach the clear.
    ///
    /// Returns `None` for an empty `state`, a missing cookie, or any
    /// decryption failure (logged as a warning, never raised).
    #[must_use]
    pub fn retrieve_and_prepare_clear(
        &self,
        ctx: &RequestContext,
        state: &str,
    ) -> Option<(LoginState, Cookie)> {
        if state.is_empty() {
            return None;
        }

        let (name, value) = ctx.cookies.iter().find(|(name, _)| {
            LoginStateCookieName::parse(name).is_some_and(|parsed| parsed.state == state)
        })?;

        match self.codec.unseal::<LoginState>(value) {
            Ok(record) => {
                let clear = Cookie::clearing(name.clone()).with_secure(self.secure_cookies);
                Some((record, clear))
            }
            Err(e) => {
                warn!(error = %e, "failed to decrypt login state cookie");
                None
            }
        }
    }

    /// Clear instructions for stale login-state cookies.
    ///
    /// When [`MAX_CONCURRENT_LOGIN_STATES`] or more cookies exist, the two
    /// with the newest creation timestamps are retained and clears are
    /// returned for the rest, making room for the record about to be created.
    #[must_use]
    pub fn stale_cookies_to_clear(&self, ctx: &RequestContext) -> Vec<Cookie> {
        let mut parsed: Vec<LoginStateCookieName> =
            ctx.cookies.keys().filter_map(|name| LoginStateCookieName::parse(name)).collect();

        if parsed.len() < MAX_CONCURRENT_LOGIN_STATES {
            return Vec::new();
        }

        // Newest first; everything past the two most recent gets cleared.
        parsed.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        parsed
            .iter()
            .skip(MAX_CONCURRENT_LOGIN_STATES - 1)
            .map(|name| Cookie::clearing(name.render()).with_secure(self.secure_cookies))
            .collect()
    }
}
