//! Session cookie lifecycle and the downstream data-store credential.
//!
//! The session is an encrypted cookie representing an authenticated
//! principal. Reading never fails: an absent or undecryptable cookie yields
//! an empty (unauthenticated) session, so callers branch on validity rather
//! than on errors. Every authenticated read re-issues the same payload to
//! extend the expiry window ("touch" semantics).

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::codec::{enforce_payload_ceiling, CookieCodec};
use crate::config::AuthConfig;
use crate::cookie::Cookie;
use crate::error::{AuthError, AuthResult};
use crate::http::RequestContext;
use crate::provider::Role;

pub const SESSION_COOKIE_NAME: &str = "session";

/// An authenticated principal, as carried in the encrypted session cookie.
///
/// Every field defaults so that a partial or absent payload decodes to an
/// unauthenticated session instead of an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub is_authenticated: bool,
    pub access_token: String,
    pub refresh_token: String,

    /// Access-token expiry, epoch milliseconds.
    pub expires_at: i64,

    pub user_id: String,
    pub tenant_id: String,
    pub email: String,
    pub tenant_domain_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_custom_domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_state: Option<Map<String, Value>>,

    pub csrf_token: String,
    pub role: Role,

    /// Credential the browser presents to the downstream data store.
    pub downstream_token: String,
}

impl Session {
    /// Whether this session represents a fully authenticated principal.
    ///
    /// Requires the authentication flag plus non-empty tenant, user, email,
    /// downstream credential, and role name.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let valid = self.is_authenticated
            && !self.tenant_id.is_empty()
            && !self.user_id.is_empty()
            && !self.downstream_token.is_empty()
            && !self.email.is_empty()
            && !self.role.name.is_empty();
        if !valid {
            error!("user does not have an authenticated session");
        }
        valid
    }
}

/// Issues, reads, touches, and clears the encrypted session cookie.
pub struct SessionManager {
    codec: CookieCodec,
    secure_cookies: bool,
    max_age_secs: i64,
}

impl SessionManager {
    /// Build a manager keyed by the configured session secret.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if the secret is empty.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            codec: CookieCodec::new(&config.session_secret)?,
            secure_cookies: config.secure_cookies(),
            max_age_secs: config.session_cookie_max_age_secs,
        })
    }

    /// Encrypt a session and build its cookie.
    ///
    /// # Errors
    /// Returns `AuthError::PayloadTooLarge` when the sealed session exceeds
    /// the 4 KiB cookie ceiling; no cookie is emitted in that case.
    pub fn issue(&self, session: &Session) -> AuthResult<Cookie> {
        let sealed = self.codec.seal(session)?;
        enforce_payload_ceiling(&sealed)?;
        Ok(Cookie::new(SESSION_COOKIE_NAME, sealed, self.max_age_secs)
            .with_secure(self.secure_cookies))
    }

    /// Read the session from the request.
    ///
    /// An absent cookie or a decryption failure yields the empty session;
    /// the failure is logged as a warning, never raised.
    #[must_use]
    pub fn read(&self, ctx: &RequestContext) -> Session {
        let Some(value) = ctx.cookie(SESSION_COOKIE_NAME) else {
            return Session::default();
        };
        match self.codec.unseal(value) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "failed to decrypt session cookie");
                Session::default()
            }
        }
    }

    /// Re-issue the same payload to extend the expiry window.
    ///
    /// # Errors
    /// Same conditions as [`SessionManager::issue`].
    pub fn touch(&self, session: &Session) -> AuthResult<Cookie> {
        self.issue(session)
    }

    /// The Max-Age=0 clear for the session cookie.
    #[must_use]
    pub fn clear(&self) -> Cookie {
        Cookie::clearing(SESSION_COOKIE_NAME).with_secure(self.secure_cookies)
    }
}

#[derive(Serialize)]
struct DownstreamClaims<'a> {
    aud: &'static str,
    iat: i64,
    iss: &'static str,
    sub: &'a str,
    role: &'static str,
    user_metadata: DownstreamMetadata<'a>,
}

#[derive(Serialize)]
struct DownstreamMetadata<'a> {
    provider: &'static str,
    tenant_id: &'a str,
}

/// Mint the HS256 credential the browser uses against the downstream data
/// store. No `exp` claim: the credential lives as long as the session cookie
/// that carries it.
///
/// # Errors
/// Returns `AuthError::Validation` when `user_id` or `tenant_id` is empty,
/// or `AuthError::Config` if signing fails.
pub fn mint_downstream_token(
    config: &AuthConfig,
    user_id: &str,
    tenant_id: &str,
) -> AuthResult<String> {
    if user_id.is_empty() {
        return Err(AuthError::Validation("userId missing from session data".to_string()));
    }
    if tenant_id.is_empty() {
        return Err(AuthError::Validation("tenantId missing from session data".to_string()));
    }

    let claims = DownstreamClaims {
        aud: "authenticated",
        iat: Utc::now().timestamp(),
        iss: "gatehouse",
        sub: user_id,
        role: "authenticated",
        user_metadata: DownstreamMetadata { provider: "gatehouse", tenant_id },
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.downstream_token_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Config(format!("failed to sign downstream token: {e}")))
}

#[cfg(test)]
mod tests {
    //! Unit tests for session validity, persistence, and the downstream
    //! credential.
    use std::collections::HashMap;

    use jsonwebtoken::{decode, DecodingKey, Validation};

    use super::*;
    use crate::config::test_support::test_config;

    fn manager() -> SessionManager {
        SessionManager::new(&test_config()).unwrap()
    }

    fn authenticated_session() -> Session {
        Session {
            is_authenticated: true,
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: Utc::now().timestamp_millis() + 60_000,
            user_id: "user-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            email: "user@acme.com".to_string(),
            tenant_domain_name: "acme".to_string(),
            tenant_custom_domain: None,
            custom_state: None,
            csrf_token: "c".repeat(64),
            role: Role { id: "r1".to_string(), name: "app:owner".to_string(), display_name: None },
            downstream_token: "jwt".to_string(),
        }
    }

    fn ctx_with_session_cookie(value: &str) -> RequestContext {
        let mut headers = HashMap::new();
        headers.insert(
            "cookie".to_string(),
            format!("{SESSION_COOKIE_NAME}={}", urlencoding::encode(value)),
        );
        RequestContext::new("GET", None, Vec::new(), headers)
    }

    #[test]
    fn issue_then_read_round_trips() {
        let manager = manager();
        let session = authenticated_session();

        let cookie = manager.issue(&session).unwrap();
        assert_eq!(cookie.name, SESSION_COOKIE_NAME);
        assert!(cookie.http_only);

        let ctx = ctx_with_session_cookie(&cookie.value);
        assert_eq!(manager.read(&ctx), session);
    }

    #[test]
    fn absent_cookie_reads_as_empty_session() {
        let session = manager().read(&RequestContext::default());
        assert_eq!(session, Session::default());
        assert!(!session.is_valid());
    }

    #[test]
    fn corrupt_cookie_reads_as_empty_session() {
        let ctx = ctx_with_session_cookie("definitely-not-ciphertext");
        assert_eq!(manager().read(&ctx), Session::default());
    }

    #[test]
    fn validity_requires_every_field() {
        assert!(authenticated_session().is_valid());

        let mut missing_flag = authenticated_session();
        missing_flag.is_authenticated = false;
        assert!(!missing_flag.is_valid());

        let mut missing_tenant = authenticated_session();
        missing_tenant.tenant_id = String::new();
        assert!(!missing_tenant.is_valid());

        let mut missing_user = authenticated_session();
        missing_user.user_id = String::new();
        assert!(!missing_user.is_valid());

        let mut missing_credential = authenticated_session();
        missing_credential.downstream_token = String::new();
        assert!(!missing_credential.is_valid());

        let mut missing_email = authenticated_session();
        missing_email.email = String::new();
        assert!(!missing_email.is_valid());

        let mut empty_role = authenticated_session();
        empty_role.role = Role::default();
        assert!(!empty_role.is_valid());
    }

    #[test]
    fn touch_re_issues_the_same_payload() {
        let manager = manager();
        let session = authenticated_session();

        let touched = manager.touch(&session).unwrap();
        let ctx = ctx_with_session_cookie(&touched.value);
        assert_eq!(manager.read(&ctx), session);
    }

    #[test]
    fn oversized_session_is_rejected_without_a_cookie() {
        let mut session = authenticated_session();
        session.access_token = "x".repeat(8192);

        let err = manager().issue(&session).unwrap_err();
        assert!(matches!(err, AuthError::PayloadTooLarge { .. }));
    }

    #[test]
    fn downstream_token_carries_user_and_tenant() {
        let config = test_config();
        let token = mint_downstream_token(&config, "user-1", "tenant-1").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["authenticated"]);
        validation.required_spec_claims.remove("exp");
        validation.validate_exp = false;

        let decoded = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(config.downstream_token_secret.as_bytes()),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.claims["sub"], "user-1");
        assert_eq!(decoded.claims["user_metadata"]["tenant_id"], "tenant-1");
        assert_eq!(decoded.claims["role"], "authenticated");
        assert!(decoded.claims.get("exp").is_none());
    }

    #[test]
    fn downstream_token_requires_user_and_tenant() {
        let config = test_config();
        assert!(mint_downstream_token(&config, "", "tenant-1").is_err());
        assert!(mint_downstream_token(&config, "user-1", "").is_err());
    }
}
