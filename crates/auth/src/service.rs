//! Endpoint orchestration for the authentication gateway.
//!
//! [`AuthService`] wires the login-state store, session manager, CSRF guard,
//! tenant resolver, and provider client into the five auth endpoints. Each
//! handler is a pure function of the request context; all state lives in
//! client-held encrypted cookies or at the identity provider.
//!
//! Failure policy follows the flow semantics rather than the error type:
//! login/callback/logout answer 500 on unexpected errors (redacted outside
//! development builds), while session/token answer 401 because their only
//! callers are authenticated-session polls.

use chrono::Utc;
use serde_json::json;
use tracing::{error, info};

use crate::config::AuthConfig;
use crate::cookie::Cookie;
use crate::csrf;
use crate::error::{AuthError, AuthResult};
use crate::http::{ApiResponse, RequestContext};
use crate::login_state::LoginStateStore;
use crate::provider::ProviderApi;
use crate::session::{mint_downstream_token, Session, SessionManager};
use crate::tenant::{self, AuthorizeUrlRequest};

const LOGIN_REQUIRED_ERROR: &str = "login_required";

/// The authentication gateway's request handlers.
pub struct AuthService<P> {
    config: AuthConfig,
    login_states: LoginStateStore,
    sessions: SessionManager,
    provider: P,
}

impl<P: ProviderApi> AuthService<P> {
    /// Build the service, validating configuration up front so a
    /// misconfigured deployment fails at startup rather than per request.
    ///
    /// # Errors
    /// Returns `AuthError::Config` listing every validation failure.
    pub fn new(config: AuthConfig, provider: P) -> AuthResult<Self> {
        config.validate()?;
        let login_states = LoginStateStore::new(&config)?;
        let sessions = SessionManager::new(&config)?;
        Ok(Self { config, login_states, sessions, provider })
    }

    /// GET /auth/login: start the authorization-code flow.
    pub async fn login(&self, ctx: &RequestContext) -> ApiResponse {
        if ctx.method != "GET" {
            return ApiResponse::error(405, "Method Not Allowed", None, false);
        }
        match self.try_login(ctx).await {
            Ok(response) => response,
            Err(e) => self.internal_error("login", &e),
        }
    }

    /// GET /auth/callback: complete the authorization-code flow.
    pub async fn callback(&self, ctx: &RequestContext) -> ApiResponse {
        if ctx.method != "GET" {
            return ApiResponse::error(405, "Method Not Allowed", None, false);
        }
        match self.try_callback(ctx).await {
            Ok(response) => response,
            Err(e) => self.internal_error("callback", &e),
        }
    }

    /// GET /auth/logout: revoke, clear cookies, and leave.
    pub async fn logout(&self, ctx: &RequestContext) -> ApiResponse {
        if ctx.method != "GET" {
            return ApiResponse::error(405, "Method Not Allowed", None, false);
        }
        match self.try_logout(ctx).await {
            Ok(response) => response,
            Err(e) => self.internal_error("logout", &e),
        }
    }

    /// GET /auth/session: authenticated session poll with touch semantics.
    pub async fn session(&self, ctx: &RequestContext) -> ApiResponse {
        if ctx.method != "GET" {
            return ApiResponse::error(405, "Method Not Allowed", None, false);
        }
        match self.try_session(ctx) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "session endpoint error");
                ApiResponse::status_only(401)
            }
        }
    }

    /// GET /auth/token: access token for downstream API calls, refreshing
    /// when expired.
    pub async fn token(&self, ctx: &RequestContext) -> ApiResponse {
        if ctx.method != "GET" {
            return ApiResponse::error(405, "Method Not Allowed", None, false);
        }
        match self.try_token(ctx).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "token endpoint error");
                ApiResponse::status_only(401)
            }
        }
    }

    fn internal_error(&self, endpoint: &str, e: &AuthError) -> ApiResponse {
        error!(error = %e, "{endpoint} endpoint error");
        ApiResponse::error(
            500,
            "Internal Server Error",
            Some(&e.to_string()),
            self.config.development_mode,
        )
    }

    async fn try_login(&self, ctx: &RequestContext) -> AuthResult<ApiResponse> {
        let tenant_custom_domain = tenant::resolve_tenant_custom_domain_param(ctx)?;
        let tenant_domain_name = tenant::resolve_tenant_domain_name(ctx, &self.config)?;

        // No tenant determinable anywhere: send to the app-level login page
        // for tenant discovery.
        if tenant_custom_domain.is_empty()
            && tenant_domain_name.is_empty()
            && self.config.default_tenant_custom_domain.is_empty()
            && self.config.default_tenant_domain_name.is_empty()
        {
            let app_login_url =
                format!("{}?client_id={}", self.config.application_login_url(), self.config.client_id);
            return Ok(ApiResponse::redirect(app_login_url, Vec::new()));
        }

        let login_state = self.login_states.create(ctx, None)?;
        let authorize_url = tenant::build_authorize_url(
            ctx,
            &self.config,
            &AuthorizeUrlRequest {
                state: login_state.state.clone(),
                code_verifier: login_state.code_verifier.clone(),
                tenant_custom_domain,
                tenant_domain_name,
            },
        )?;

        let mut cookies = vec![self.login_states.persist(&login_state)?];
        cookies.extend(self.login_states.stale_cookies_to_clear(ctx));
        Ok(ApiResponse::redirect(authorize_url, cookies))
    }

    async fn try_callback(&self, ctx: &RequestContext) -> AuthResult<ApiResponse> {
        // The provider is trusted to send well-formed values; malformed ones
        // are treated as server errors.
        let param_state = ctx
            .single_query_param("state")?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AuthError::BadRequest(
                    "invalid query parameter [state] passed during callback".to_string(),
                )
            })?
            .to_string();
        let code = ctx.single_query_param("code")?.map(str::to_string);
        let provider_error = ctx.single_query_param("error")?.map(str::to_string);
        let error_description = ctx.single_query_param("error_description")?.map(str::to_string);
        let tenant_custom_domain_param = tenant::resolve_tenant_custom_domain_param(ctx)?;

        let resolved_tenant_domain = tenant::resolve_tenant_domain_name(ctx, &self.config)?;
        if resolved_tenant_domain.is_empty() {
            return Err(AuthError::BadRequest(if self.config.subdomain_mode() {
                "callback request URL is missing a tenant subdomain".to_string()
            } else {
                "callback request is missing the [tenant_domain] query parameter".to_string()
            }));
        }

        let tenant_login_url =
            tenant::tenant_login_url(&self.config, &resolved_tenant_domain, &tenant_custom_domain_param);

        // Missing login state means it expired, was never set, or was
        // already consumed; re-entering login is the only recovery.
        let Some((login_state, login_state_clear)) =
            self.login_states.retrieve_and_prepare_clear(ctx, &param_state)
        else {
            return Ok(ApiResponse::redirect(tenant_login_url, Vec::new()));
        };

        if param_state != login_state.state {
            return Ok(ApiResponse::redirect(tenant_login_url, vec![login_state_clear]));
        }

        if let Some(provider_error) = provider_error {
            if provider_error.eq_ignore_ascii_case(LOGIN_REQUIRED_ERROR) {
                // Silent re-auth signal, not a failure.
                return Ok(ApiResponse::redirect(tenant_login_url, vec![login_state_clear]));
            }
            return Err(AuthError::BadRequest(format!(
                "{provider_error}: {}",
                error_description.as_deref().unwrap_or("Authentication error occurred")
            )));
        }

        let code = code.ok_or_else(|| {
            AuthError::BadRequest("invalid query parameter [code] passed during callback".to_string())
        })?;

        let token_response = match self
            .provider
            .exchange_code(&code, &login_state.redirect_uri, &login_state.code_verifier)
            .await
        {
            Ok(token_response) => token_response,
            // A stale or replayed code means "please log in again".
            Err(AuthError::InvalidGrant { .. }) => {
                return Ok(ApiResponse::redirect(tenant_login_url, vec![login_state_clear]));
            }
            Err(e) => return Err(e),
        };

        let userinfo = self.provider.get_userinfo(&token_response.access_token).await?;
        let csrf_token = csrf::create_csrf_token();
        let downstream_token = mint_downstream_token(&self.config, &userinfo.sub, &userinfo.tnt_id)?;

        let session = Session {
            is_authenticated: true,
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token.unwrap_or_default(),
            expires_at: Utc::now().timestamp_millis() + (token_response.expires_in as i64) * 1000,
            user_id: userinfo.sub,
            tenant_id: userinfo.tnt_id,
            email: userinfo.email,
            tenant_domain_name: resolved_tenant_domain,
            tenant_custom_domain: (!tenant_custom_domain_param.is_empty())
                .then_some(tenant_custom_domain_param),
            custom_state: login_state.custom_state,
            csrf_token: csrf_token.clone(),
            role: userinfo.roles.into_iter().next().unwrap_or_default(),
            downstream_token,
        };

        let cookies = vec![
            login_state_clear,
            self.sessions.issue(&session)?,
            self.csrf_cookie(&csrf_token),
        ];
        let destination = login_state
            .return_url
            .unwrap_or_else(|| self.config.post_callback_landing_url.clone());
        Ok(ApiResponse::redirect(destination, cookies))
    }

    async fn try_logout(&self, ctx: &RequestContext) -> AuthResult<ApiResponse> {
        let session = self.sessions.read(ctx);
        let cookies =
            vec![self.sessions.clear(), csrf::clear_csrf_cookie(self.config.secure_cookies())];

        let tenant_custom_domain_param = tenant::resolve_tenant_custom_domain_param(ctx)?;
        let tenant_domain_param =
            ctx.single_query_param("tenant_domain")?.unwrap_or_default().to_string();

        if !session.refresh_token.is_empty() {
            self.provider.revoke_refresh_token(&session.refresh_token).await;
        }

        let mut logout_query = format!("client_id={}", self.config.client_id);
        if !self.config.post_logout_redirect_url.is_empty() {
            logout_query.push_str(&format!(
                "&redirect_url={}",
                urlencoding::encode(&self.config.post_logout_redirect_url)
            ));
        }

        // Domain priority: configured custom domain, configured domain name,
        // request custom-domain param, host subdomain, request domain param,
        // then the app-level login page for tenant discovery.
        let subdomain =
            tenant::parse_tenant_subdomain(ctx, &self.config.parse_tenant_from_root_domain);
        let logout_domain = if !self.config.default_tenant_custom_domain.is_empty() {
            self.config.default_tenant_custom_domain.clone()
        } else if !self.config.default_tenant_domain_name.is_empty() {
            tenant::qualified_tenant_domain(&self.config, &self.config.default_tenant_domain_name)
        } else if !tenant_custom_domain_param.is_empty() {
            tenant_custom_domain_param
        } else if !subdomain.is_empty() {
            tenant::qualified_tenant_domain(&self.config, &subdomain)
        } else if !tenant_domain_param.is_empty() {
            tenant::qualified_tenant_domain(&self.config, &tenant_domain_param)
        } else {
            let fallback = if self.config.post_logout_redirect_url.is_empty() {
                format!("{}?client_id={}", self.config.application_login_url(), self.config.client_id)
            } else {
                self.config.post_logout_redirect_url.clone()
            };
            return Ok(ApiResponse::redirect(fallback, cookies));
        };

        let logout_url = format!("https://{logout_domain}/api/v1/logout?{logout_query}");
        Ok(ApiResponse::redirect(logout_url, cookies))
    }

    fn try_session(&self, ctx: &RequestContext) -> AuthResult<ApiResponse> {
        let session = self.sessions.read(ctx);
        if !session.is_valid() {
            return Ok(ApiResponse::status_only(401));
        }
        if !csrf::is_csrf_valid(ctx, &session.csrf_token) {
            return Ok(ApiResponse::status_only(403));
        }

        let cookies =
            vec![self.sessions.touch(&session)?, self.csrf_cookie(&session.csrf_token)];

        // Only the initial load needs data; polls pass omit_data=true to
        // save bandwidth.
        let omit_data = ctx.single_query_param("omit_data")? == Some("true");
        let body = if omit_data {
            json!({})
        } else {
            // Response structure matters: extra fields belong in metadata.
            json!({
                "userId": session.user_id,
                "tenantId": session.tenant_id,
                "metadata": {
                    "downstreamToken": session.downstream_token,
                    "email": session.email,
                    "role": session.role,
                },
            })
        };
        Ok(ApiResponse::ok_json(body.to_string(), cookies, true))
    }

    async fn try_token(&self, ctx: &RequestContext) -> AuthResult<ApiResponse> {
        let mut session = self.sessions.read(ctx);
        if !session.is_valid() || session.expires_at <= 0 || session.refresh_token.is_empty() {
            return Ok(ApiResponse::status_only(401));
        }
        if !csrf::is_csrf_valid(ctx, &session.csrf_token) {
            return Ok(ApiResponse::status_only(403));
        }

        if let Some(token_response) = self
            .provider
            .refresh_if_expired(&session.refresh_token, session.expires_at)
            .await?
        {
            info!("token refreshed successfully");
            session.access_token = token_response.access_token;
            if let Some(refresh_token) = token_response.refresh_token {
                session.refresh_token = refresh_token;
            }
            session.expires_at =
                Utc::now().timestamp_millis() + (token_response.expires_in as i64) * 1000;
        }

        // Always re-issue to extend the expiry window, new tokens or not.
        let cookies =
            vec![self.sessions.touch(&session)?, self.csrf_cookie(&session.csrf_token)];
        let body = json!({
            "accessToken": session.access_token,
            "expiresAt": session.expires_at,
        });
        Ok(ApiResponse::ok_json(body.to_string(), cookies, true))
    }

    fn csrf_cookie(&self, token: &str) -> Cookie {
        csrf::csrf_cookie(
            token,
            self.config.session_cookie_max_age_secs,
            self.config.secure_cookies(),
        )
    }
}
