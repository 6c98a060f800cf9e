//! Error types for the authentication gateway.
//!
//! Every failure mode in the auth flow maps to a tagged [`AuthError`] kind so
//! call sites can branch on the kind rather than on runtime type identity.
//! The recoverable kinds (`InvalidGrant`, `Decryption`) are handled locally
//! by the endpoint orchestrator and never surface to the user as error pages.

use thiserror::Error;

/// Standard result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Error taxonomy for the authentication subsystem.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid static configuration. Fatal; surfaces as a 500 at
    /// request start.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed client-supplied query parameters (e.g. a repeated
    /// single-valued parameter).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Malformed internal call arguments (e.g. a missing refresh token).
    #[error("validation error: {0}")]
    Validation(String),

    /// Stale, replayed, or otherwise invalid authorization code or refresh
    /// token. Recovered locally by redirecting to login; never retried.
    #[error("invalid grant: {description}")]
    InvalidGrant { description: String },

    /// A cookie payload could not be decrypted (corrupt ciphertext, wrong
    /// secret). Callers treat this as "absent", never as fatal.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// An encrypted cookie payload exceeded the 4 KiB ceiling.
    #[error("encrypted payload is {size} bytes, exceeding the {limit}-byte cookie ceiling")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The identity provider returned a well-formed but semantically invalid
    /// response (missing access_token, non-object userinfo, ...).
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Non-2xx response from the identity provider other than invalid_grant.
    #[error("identity provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    /// Transport-level HTTP failure talking to the identity provider.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthError {
    /// HTTP status carried by a [`AuthError::Provider`] error, if any.
    #[must_use]
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a provider call that failed with this error may be retried.
    ///
    /// `InvalidGrant` and 4xx provider responses are never retryable; 5xx
    /// responses and transport failures are.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidGrant { .. } => false,
            Self::Provider { status, .. } => !(400..500).contains(status),
            Self::Http(_) => true,
            _ => false,
        }
    }
}
