//! Identity-provider API client.
//!
//! Performs the PKCE authorization-code exchange, userinfo fetch, token
//! refresh, and token revocation against the provider's OAuth2 endpoints.
//! Token-endpoint calls authenticate with HTTP Basic auth from the client
//! credentials. Refresh is the only operation with an internal retry loop:
//! bounded, sequential, with exponential backoff, and never retrying
//! `invalid_grant` or other 4xx answers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

const MAX_REFRESH_ATTEMPTS: u32 = 3;
const DEFAULT_REFRESH_BACKOFF: Duration = Duration::from_millis(100);

/// Successful answer from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Access-token lifetime in seconds.
    pub expires_in: u64,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub id_token: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,
}

/// A role attached to the authenticated user. `name` drives admin detection
/// downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Claims returned by the provider's userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Userinfo {
    /// Provider-scoped user ID.
    pub sub: String,

    /// Tenant the user authenticated under.
    pub tnt_id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Operations the auth flows need from the identity provider.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Exchange an authorization code for tokens using PKCE.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> AuthResult<TokenResponse>;

    /// Fetch the userinfo claims for an access token.
    async fn get_userinfo(&self, access_token: &str) -> AuthResult<Userinfo>;

    /// Refresh the access token when `expires_at_ms` has passed, retrying
    /// transient failures. Returns `None` without any network call while the
    /// current token is still valid.
    async fn refresh_if_expired(
        &self,
        refresh_token: &str,
        expires_at_ms: i64,
    ) -> AuthResult<Option<TokenResponse>>;

    /// Revoke a refresh token. Best-effort: failures are logged and
    /// swallowed so revocation can never block logout.
    async fn revoke_refresh_token(&self, refresh_token: &str);
}

/// HTTP client for the identity provider's OAuth2 API.
pub struct IdentityProviderClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    base_backoff: Duration,
}

impl IdentityProviderClient {
    /// Build a client addressing the provider at its application vanity
    /// domain.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_base_url(
            config,
            format!("https://{}/api/v1", config.application_vanity_domain),
        )
    }

    /// Build a client with an explicit API base URL.
    #[must_use]
    pub fn with_base_url(config: &AuthConfig, base_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            base_backoff: DEFAULT_REFRESH_BACKOFF,
        }
    }

    /// Override the refresh backoff base delay.
    #[must_use]
    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    fn token_request(&self, form: &[(&str, &str)]) -> RequestBuilder {
        self.http
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
    }

    async fn perform_refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        let response = self
            .token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await?;
        decode_token_response(response).await
    }

    async fn sleep_with_backoff(&self, attempt: u32) {
        let delay = self.base_backoff.saturating_mul(1u32 << attempt.min(8));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderApi for IdentityProviderClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> AuthResult<TokenResponse> {
        if code.trim().is_empty() {
            return Err(AuthError::Validation("authorization code is required".to_string()));
        }
        if redirect_uri.trim().is_empty() {
            return Err(AuthError::Validation("redirect URI is required".to_string()));
        }
        if code_verifier.trim().is_empty() {
            return Err(AuthError::Validation("code verifier is required".to_string()));
        }

        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;
        decode_token_response(response).await
    }

    async fn get_userinfo(&self, access_token: &str) -> AuthResult<Userinfo> {
        if access_token.trim().is_empty() {
            return Err(AuthError::Validation("access token is required".to_string()));
        }

        let response = self
            .http
            .get(format!("{}/oauth2/userinfo", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("malformed userinfo response: {e}")))
    }

    async fn refresh_if_expired(
        &self,
        refresh_token: &str,
        expires_at_ms: i64,
    ) -> AuthResult<Option<TokenResponse>> {
        if refresh_token.is_empty() {
            return Err(AuthError::Validation("refresh token must be a valid string".to_string()));
        }
        if expires_at_ms <= 0 {
            return Err(AuthError::Validation(
                "the expiresAt field must be an integer greater than 0".to_string(),
            ));
        }

        // Still valid: nothing to do, no network call.
        if Utc::now().timestamp_millis() < expires_at_ms {
            return Ok(None);
        }

        let mut attempt = 0;
        loop {
            match self.perform_refresh(refresh_token).await {
                Ok(token_response) => return Ok(Some(token_response)),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt >= MAX_REFRESH_ATTEMPTS {
                        return Err(e);
                    }
                    debug!(attempt, error = %e, "token refresh failed; retrying");
                    self.sleep_with_backoff(attempt).await;
                }
            }
        }
    }

    async fn revoke_refresh_token(&self, refresh_token: &str) {
        let result = async {
            let response = self
                .http
                .post(format!("{}/oauth2/revoke", self.base_url))
                .basic_auth(&self.client_id, Some(&self.client_secret))
                .form(&[("token", refresh_token)])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }
            Ok::<(), AuthError>(())
        }
        .await;

        if let Err(e) = result {
            warn!(error = %e, "failed to revoke refresh token");
        }
    }
}

/// Decode a token-endpoint response, classifying `invalid_grant` answers.
async fn decode_token_response(response: Response) -> AuthResult<TokenResponse> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| AuthError::InvalidResponse(format!("malformed token response: {e}")))
}

/// Map a non-2xx provider answer to a typed error. An `invalid_grant` body
/// becomes [`AuthError::InvalidGrant`] with the provider's description;
/// everything else carries the status and raw body.
async fn error_from_response(response: Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    if let Ok(value) = serde_json::from_str::<Value>(&body) {
        if value.get("error").and_then(Value::as_str) == Some("invalid_grant") {
            let description = value
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or("Invalid grant")
                .to_string();
            return AuthError::InvalidGrant { description };
        }
    }
    AuthError::Provider { status, body }
}
