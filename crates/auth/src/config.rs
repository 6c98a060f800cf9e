//! Gateway configuration.
//!
//! Configuration is built once at process start and injected by reference
//! into every component constructor; business logic never reads ambient
//! environment state. `validate()` collects every violation before failing
//! so a misconfigured deployment reports all problems in one shot.
//!
//! ## Environment Variables
//! - `GATEHOUSE_CLIENT_ID` / `GATEHOUSE_CLIENT_SECRET`: OAuth client credentials
//! - `GATEHOUSE_LOGIN_STATE_SECRET`: login-state cookie secret (32+ chars)
//! - `GATEHOUSE_SESSION_SECRET`: session cookie secret (32+ chars)
//! - `GATEHOUSE_LOGIN_URL`: application login endpoint URL
//! - `GATEHOUSE_REDIRECT_URI`: OAuth callback URI registered with the provider
//! - `GATEHOUSE_SCOPES`: comma-separated scopes (default `openid,offline_access,email`)
//! - `GATEHOUSE_APPLICATION_VANITY_DOMAIN`: identity provider application domain
//! - `GATEHOUSE_PARSE_TENANT_FROM_ROOT_DOMAIN`: root domain for subdomain parsing (optional)
//! - `GATEHOUSE_DEFAULT_TENANT_DOMAIN_NAME` / `GATEHOUSE_DEFAULT_TENANT_CUSTOM_DOMAIN` (optional)
//! - `GATEHOUSE_DANGEROUSLY_DISABLE_SECURE_COOKIES`: defaults to secure
//! - `GATEHOUSE_SESSION_COOKIE_MAX_AGE_SECS`: session/CSRF cookie lifetime
//! - `GATEHOUSE_POST_CALLBACK_LANDING_URL` / `GATEHOUSE_POST_LOGOUT_REDIRECT_URL`
//! - `GATEHOUSE_DOWNSTREAM_TOKEN_SECRET`: HS256 secret for the downstream credential
//! - `GATEHOUSE_DEVELOPMENT_MODE`: include real error detail in 500 bodies

use crate::error::{AuthError, AuthResult};

const MIN_SECRET_LENGTH: usize = 32;
const DEFAULT_SCOPES: &str = "openid,offline_access,email";
const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 3600;

/// Static configuration for the authentication gateway.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID issued by the identity provider.
    pub client_id: String,

    /// OAuth client secret, used for HTTP Basic auth on token endpoints.
    pub client_secret: String,

    /// Secret keying the encrypted login-state cookie (32 characters minimum).
    pub login_state_secret: String,

    /// Secret keying the encrypted session cookie (32 characters minimum).
    pub session_secret: String,

    /// Application login endpoint. In subdomain mode this may carry a
    /// `{tenant_domain}` template placeholder.
    pub login_url: String,

    /// OAuth redirect URI registered with the identity provider.
    pub redirect_uri: String,

    /// OAuth scopes requested during authorization.
    pub scopes: Vec<String>,

    /// The identity provider's application-level vanity domain.
    pub application_vanity_domain: String,

    /// Root domain for tenant-subdomain parsing. Empty string disables
    /// subdomain mode; tenants are then resolved from the `tenant_domain`
    /// query parameter.
    pub parse_tenant_from_root_domain: String,

    /// Whether an application-level custom top-level domain is active. Flips
    /// the tenant vanity-domain separator from `-` to `.`.
    pub is_application_custom_domain_active: bool,

    /// Optional custom application login page overriding the provider's.
    pub custom_application_login_page_url: String,

    /// Default tenant domain name used when a request carries none.
    pub default_tenant_domain_name: String,

    /// Default tenant custom domain used when a request carries none.
    pub default_tenant_custom_domain: String,

    /// Disables the `Secure` cookie attribute. Defaults to secure; only for
    /// local development over plain HTTP.
    pub dangerously_disable_secure_cookies: bool,

    /// Max-Age applied to the session and CSRF cookies, in seconds.
    pub session_cookie_max_age_secs: i64,

    /// Where to land after a successful callback without a `return_url`.
    pub post_callback_landing_url: String,

    /// Where to land after logout, when configured.
    pub post_logout_redirect_url: String,

    /// HS256 secret for minting the downstream data-store credential.
    pub downstream_token_secret: String,

    /// Include real error messages in 500 response bodies. Production builds
    /// answer with a redacted message only.
    pub development_mode: bool,
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `AuthError::Config` if any required variable is missing or
    /// fails validation. All violations are reported together.
    pub fn from_env() -> AuthResult<Self> {
        let config = Self {
            client_id: env_string("GATEHOUSE_CLIENT_ID"),
            client_secret: env_string("GATEHOUSE_CLIENT_SECRET"),
            login_state_secret: env_string("GATEHOUSE_LOGIN_STATE_SECRET"),
            session_secret: env_string("GATEHOUSE_SESSION_SECRET"),
            login_url: env_string("GATEHOUSE_LOGIN_URL"),
            redirect_uri: env_string("GATEHOUSE_REDIRECT_URI"),
            scopes: std::env::var("GATEHOUSE_SCOPES")
                .unwrap_or_else(|_| DEFAULT_SCOPES.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            application_vanity_domain: env_string("GATEHOUSE_APPLICATION_VANITY_DOMAIN"),
            parse_tenant_from_root_domain: env_string("GATEHOUSE_PARSE_TENANT_FROM_ROOT_DOMAIN"),
            is_application_custom_domain_active: env_bool(
                "GATEHOUSE_APPLICATION_CUSTOM_DOMAIN_ACTIVE",
                false,
            ),
            custom_application_login_page_url: env_string("GATEHOUSE_CUSTOM_APP_LOGIN_PAGE_URL"),
            default_tenant_domain_name: env_string("GATEHOUSE_DEFAULT_TENANT_DOMAIN_NAME"),
            default_tenant_custom_domain: env_string("GATEHOUSE_DEFAULT_TENANT_CUSTOM_DOMAIN"),
            dangerously_disable_secure_cookies: env_bool(
                "GATEHOUSE_DANGEROUSLY_DISABLE_SECURE_COOKIES",
                false,
            ),
            session_cookie_max_age_secs: std::env::var("GATEHOUSE_SESSION_COOKIE_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECS),
            post_callback_landing_url: env_string("GATEHOUSE_POST_CALLBACK_LANDING_URL"),
            post_logout_redirect_url: env_string("GATEHOUSE_POST_LOGOUT_REDIRECT_URL"),
            downstream_token_secret: env_string("GATEHOUSE_DOWNSTREAM_TOKEN_SECRET"),
            development_mode: env_bool("GATEHOUSE_DEVELOPMENT_MODE", false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate required fields, collecting every violation.
    ///
    /// # Errors
    /// Returns `AuthError::Config` listing all failed checks.
    pub fn validate(&self) -> AuthResult<()> {
        let mut errors = Vec::new();

        if self.client_id.is_empty() {
            errors.push("the [client_id] config must have a value");
        }
        if self.client_secret.is_empty() {
            errors.push("the [client_secret] config must have a value");
        }
        if self.login_state_secret.len() < MIN_SECRET_LENGTH {
            errors.push("the [login_state_secret] config must have a value of 32 characters minimum");
        }
        if self.session_secret.len() < MIN_SECRET_LENGTH {
            errors.push("the [session_secret] config must have a value of 32 characters minimum");
        }
        if self.login_url.is_empty() {
            errors.push("the [login_url] config must have a value");
        }
        if self.redirect_uri.is_empty() {
            errors.push("the [redirect_uri] config must have a value");
        }
        if self.application_vanity_domain.is_empty() {
            errors.push("the [application_vanity_domain] config must have a value");
        }
        if self.downstream_token_secret.is_empty() {
            errors.push("the [downstream_token_secret] config must have a value");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Config(errors.join("; ")))
        }
    }

    /// Whether tenant subdomain parsing is enabled.
    #[must_use]
    pub fn subdomain_mode(&self) -> bool {
        !self.parse_tenant_from_root_domain.is_empty()
    }

    /// Whether cookies carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        !self.dangerously_disable_secure_cookies
    }

    /// The tenant vanity-domain segment separator: `.` when an application
    /// custom domain is active, `-` otherwise (subdomain style).
    #[must_use]
    pub fn domain_separator(&self) -> char {
        if self.is_application_custom_domain_active {
            '.'
        } else {
            '-'
        }
    }

    /// The application-level login page used when no tenant can be resolved.
    #[must_use]
    pub fn application_login_url(&self) -> String {
        if self.custom_application_login_page_url.is_empty() {
            format!("https://{}/login", self.application_vanity_domain)
        } else {
            self.custom_application_login_page_url.clone()
        }
    }
}

fn env_string(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

/// Parse a boolean environment variable, accepting `1/true/yes/on`
/// (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
