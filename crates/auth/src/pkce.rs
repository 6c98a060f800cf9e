//! PKCE (Proof Key for Code Exchange) primitives.
//!
//! Implements RFC 7636 for binding an authorization code to a client-held
//! verifier. The code challenge is the base64url encoding of the raw SHA-256
//! digest of the verifier (S256), which is what the identity provider
//! verifies against.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a cryptographically secure code verifier.
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43
/// characters). Per RFC 7636, verifiers must be 43-128 characters long.
#[must_use]
pub fn generate_code_verifier() -> String {
    random_url_safe(32)
}

/// Generate the S256 code challenge for a verifier.
///
/// Per RFC 7636, the challenge is `BASE64URL(SHA256(ASCII(code_verifier)))`
/// computed over the raw digest bytes.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a random state nonce for anti-forgery binding of one login
/// attempt.
#[must_use]
pub fn generate_state() -> String {
    random_url_safe(32)
}

/// Generate the OpenID Connect `nonce` value, independent of `state`.
#[must_use]
pub fn generate_nonce() -> String {
    random_url_safe(32)
}

/// URL-safe base64 encoding of `len` random bytes, without padding.
fn random_url_safe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
