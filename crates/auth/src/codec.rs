//! Authenticated encryption for cookie payloads.
//!
//! Both the login-state and session cookies pass through this codec: the
//! payload is serialized to JSON, sealed with AES-256-GCM under a key derived
//! from the configured secret, and the resulting envelope is base64url-encoded
//! so the value is cookie-safe without further escaping.
//!
//! Decryption failures are a normal condition here (expired deployments
//! rotate secrets, browsers replay stale cookies); callers treat
//! [`AuthError::Decryption`] as "absent" rather than fatal.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

/// Ciphertext ceiling for a single cookie value, enforced by call sites.
pub const MAX_COOKIE_PAYLOAD_BYTES: usize = 4096;

/// Serializable envelope around one sealed payload.
#[derive(Debug, Serialize, Deserialize)]
struct SealedPayload {
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// AES-256-GCM codec keyed by a secret string.
pub struct CookieCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec").field("key", &"[REDACTED]").finish()
    }
}

impl CookieCodec {
    /// Create a codec from a secret string. The 256-bit cipher key is the
    /// SHA-256 digest of the secret, so the same secret always yields the
    /// same key across invocations.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the secret is empty. Minimum length is
    /// enforced by configuration validation, not here.
    pub fn new(secret: &str) -> AuthResult<Self> {
        if secret.is_empty() {
            return Err(AuthError::Config("no secret provided to the cookie codec".to_string()));
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AuthError::Config(format!("failed to create cookie cipher: {e}")))?;
        Ok(Self { cipher })
    }

    /// Serialize and encrypt a payload into a cookie-safe string.
    ///
    /// # Errors
    /// Returns `AuthError::Serialization` if the payload cannot be encoded,
    /// or `AuthError::Decryption` if the cipher fails.
    pub fn seal<T: Serialize>(&self, payload: &T) -> AuthResult<String> {
        let plaintext = serde_json::to_vec(payload)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| AuthError::Decryption(format!("encryption failed: {e}")))?;

        let sealed = SealedPayload { nonce: nonce.to_vec(), ciphertext };
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(&sealed)?))
    }

    /// Decrypt and deserialize a sealed cookie value.
    ///
    /// # Errors
    /// Returns `AuthError::Decryption` for any malformed, tampered, or
    /// wrongly-keyed input.
    pub fn unseal<T: DeserializeOwned>(&self, value: &str) -> AuthResult<T> {
        let decoded = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| AuthError::Decryption(format!("base64 decode failed: {e}")))?;
        let sealed: SealedPayload = serde_json::from_slice(&decoded)
            .map_err(|e| AuthError::Decryption(format!("envelope decode failed: {e}")))?;

        if sealed.nonce.len() != 12 {
            return Err(AuthError::Decryption("invalid nonce length".to_string()));
        }
        let nonce_bytes: [u8; 12] = sealed.nonce.as_slice().try_into().unwrap_or([0u8; 12]);

        let plaintext = self
            .cipher
            .decrypt(&Nonce::from(nonce_bytes), sealed.ciphertext.as_ref())
            .map_err(|e| AuthError::Decryption(format!("decryption failed: {e}")))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| AuthError::Decryption(format!("payload decode failed: {e}")))
    }
}

/// Enforce the cookie payload ceiling on an already-sealed value.
///
/// # Errors
/// Returns `AuthError::PayloadTooLarge` when the sealed value exceeds
/// [`MAX_COOKIE_PAYLOAD_BYTES`].
pub fn enforce_payload_ceiling(sealed: &str) -> AuthResult<()> {
    if sealed.len() > MAX_COOKIE_PAYLOAD_BYTES {
        return Err(AuthError::PayloadTooLarge {
            size: sealed.len(),
            limit: MAX_COOKIE_PAYLOAD_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    //! Unit tests for the cookie codec.
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "a-test-secret-of-at-least-32-chars!!";

    #[test]
    fn seal_and_unseal_round_trip() {
        let codec = CookieCodec::new(SECRET).unwrap();

        let mut payload = HashMap::new();
        payload.insert("state".to_string(), "abc123".to_string());

        let sealed = codec.seal(&payload).unwrap();
        let unsealed: HashMap<String, String> = codec.unseal(&sealed).unwrap();
        assert_eq!(unsealed, payload);
    }

    #[test]
    fn sealed_value_is_cookie_safe() {
        let codec = CookieCodec::new(SECRET).unwrap();
        let sealed = codec.seal(&"payload").unwrap();
        assert!(!sealed.contains('='));
        assert!(!sealed.contains('+'));
        assert!(!sealed.contains('/'));
        assert!(!sealed.contains(';'));
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        let result = CookieCodec::new("");
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn wrong_secret_fails_as_decryption_error() {
        let codec = CookieCodec::new(SECRET).unwrap();
        let other = CookieCodec::new("a-different-secret-of-32-characters!").unwrap();

        let sealed = codec.seal(&"payload").unwrap();
        let result: AuthResult<String> = other.unseal(&sealed);
        assert!(matches!(result, Err(AuthError::Decryption(_))));
    }

    #[test]
    fn tampered_ciphertext_fails_as_decryption_error() {
        let codec = CookieCodec::new(SECRET).unwrap();
        let sealed = codec.seal(&"payload").unwrap();

        let mut tampered: String = sealed.chars().rev().collect();
        tampered.truncate(sealed.len().saturating_sub(2));
        let result: AuthResult<String> = codec.unseal(&tampered);
        assert!(matches!(result, Err(AuthError::Decryption(_))));
    }

    #[test]
    fn garbage_input_fails_as_decryption_error() {
        let codec = CookieCodec::new(SECRET).unwrap();
        let result: AuthResult<String> = codec.unseal("not-a-sealed-payload");
        assert!(matches!(result, Err(AuthError::Decryption(_))));
    }

    #[test]
    fn payload_ceiling_is_enforced() {
        let oversized = "x".repeat(MAX_COOKIE_PAYLOAD_BYTES + 1);
        let err = enforce_payload_ceiling(&oversized).unwrap_err();
        assert!(matches!(err, AuthError::PayloadTooLarge { .. }));

        let within = "x".repeat(MAX_COOKIE_PAYLOAD_BYTES);
        assert!(enforce_payload_ceiling(&within).is_ok());
    }
}
