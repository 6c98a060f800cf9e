//! Double-submit CSRF protection.
//!
//! A random token lives both inside the encrypted session and in a
//! script-readable `CSRF-TOKEN` cookie; authenticated requests must echo it
//! back in the `x-csrf-token` header. Touching a session re-stores the same
//! token value rather than rotating it, because rotation would invalidate
//! concurrently in-flight browser tabs; expiry is managed purely via cookie
//! Max-Age.

use rand::RngCore;
use tracing::error;

use crate::cookie::Cookie;
use crate::http::RequestContext;

/// Cookie carrying the script-readable half of the double-submit pair.
pub const CSRF_TOKEN_COOKIE_NAME: &str = "CSRF-TOKEN";

/// Header carrying the request's copy of the token.
pub const CSRF_TOKEN_HEADER_NAME: &str = "x-csrf-token";

/// Create a fresh CSRF token: 32 random bytes, hex-encoded (64 characters).
#[must_use]
pub fn create_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Validate the double-submit pair: the session-carried token and the
/// request header must both be non-empty and equal.
#[must_use]
pub fn is_csrf_valid(ctx: &RequestContext, session_token: &str) -> bool {
    let header_token = ctx.header(CSRF_TOKEN_HEADER_NAME).unwrap_or_default();
    let valid = !session_token.is_empty()
        && !header_token.is_empty()
        && constant_time_eq(session_token.as_bytes(), header_token.as_bytes());
    if !valid {
        error!("csrf validation failed");
    }
    valid
}

/// Build the CSRF cookie for a token.
#[must_use]
pub fn csrf_cookie(token: &str, max_age: i64, secure: bool) -> Cookie {
    Cookie::new(CSRF_TOKEN_COOKIE_NAME, token, max_age).script_readable().with_secure(secure)
}

/// Build the Max-Age=0 clear for the CSRF cookie.
#[must_use]
pub fn clear_csrf_cookie(secure: bool) -> Cookie {
    Cookie::clearing(CSRF_TOKEN_COOKIE_NAME).script_readable().with_secure(secure)
}

/// Length-leaking only; content comparison runs over every byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
