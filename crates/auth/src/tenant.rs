//! Tenant resolution and identity-provider URL construction.
//!
//! A tenant is addressed either by a subdomain of the configured root domain
//! or by an explicit `tenant_domain` query parameter, with custom-domain
//! overrides taking precedence. The authorize URL resolves its target domain
//! through a fixed priority order so every caller lands on the same tenant
//! for the same inputs.

use url::Url;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::http::RequestContext;
use crate::pkce;

/// Domain-related inputs for one authorize-URL construction. Empty strings
/// mean "not supplied"; the priority order in [`build_authorize_url`] decides
/// which one wins.
#[derive(Debug, Clone, Default)]
pub struct AuthorizeUrlRequest {
    pub state: String,
    pub code_verifier: String,
    pub tenant_custom_domain: String,
    pub tenant_domain_name: String,
}

/// Extract the tenant subdomain from the request Host header.
///
/// Returns the leading label only when the remainder of the host equals the
/// configured root domain; everything else yields an empty string.
#[must_use]
pub fn parse_tenant_subdomain(ctx: &RequestContext, parse_tenant_from_root_domain: &str) -> String {
    let Some(host) = ctx.host.as_deref() else {
        return String::new();
    };
    if parse_tenant_from_root_domain.is_empty() {
        return String::new();
    }

    match host.split_once('.') {
        Some((subdomain, rest)) if rest == parse_tenant_from_root_domain => subdomain.to_string(),
        _ => String::new(),
    }
}

/// Resolve the tenant domain name for this request.
///
/// In subdomain mode the value comes from the Host header; otherwise from the
/// `tenant_domain` query parameter. An empty string means no tenant could be
/// determined.
///
/// # Errors
/// Returns `AuthError::BadRequest` when `tenant_domain` repeats.
pub fn resolve_tenant_domain_name(ctx: &RequestContext, config: &AuthConfig) -> AuthResult<String> {
    if config.subdomain_mode() {
        return Ok(parse_tenant_subdomain(ctx, &config.parse_tenant_from_root_domain));
    }
    Ok(ctx.single_query_param("tenant_domain")?.unwrap_or_default().to_string())
}

/// Resolve the request-level tenant custom-domain override.
///
/// # Errors
/// Returns `AuthError::BadRequest` when `tenant_custom_domain` repeats.
pub fn resolve_tenant_custom_domain_param(ctx: &RequestContext) -> AuthResult<String> {
    Ok(ctx.single_query_param("tenant_custom_domain")?.unwrap_or_default().to_string())
}

/// Qualify a bare tenant domain name with the application vanity domain,
/// using `.` when a custom top-level domain is active and `-` otherwise.
#[must_use]
pub fn qualified_tenant_domain(config: &AuthConfig, tenant_domain_name: &str) -> String {
    format!(
        "{tenant_domain_name}{}{}",
        config.domain_separator(),
        config.application_vanity_domain
    )
}

/// Build the identity provider's authorization endpoint URL.
///
/// The target domain resolves in priority order: request-level custom domain,
/// request-level tenant domain name, configured default custom domain,
/// configured default tenant domain name. `login_hint` from the inbound query
/// string passes through when present.
///
/// # Errors
/// Returns `AuthError::Config` when no domain source is available, or
/// `AuthError::BadRequest` when `login_hint` repeats.
pub fn build_authorize_url(
    ctx: &RequestContext,
    config: &AuthConfig,
    request: &AuthorizeUrlRequest,
) -> AuthResult<String> {
    let domain = if !request.tenant_custom_domain.is_empty() {
        request.tenant_custom_domain.clone()
    } else if !request.tenant_domain_name.is_empty() {
        qualified_tenant_domain(config, &request.tenant_domain_name)
    } else if !config.default_tenant_custom_domain.is_empty() {
        config.default_tenant_custom_domain.clone()
    } else if !config.default_tenant_domain_name.is_empty() {
        qualified_tenant_domain(config, &config.default_tenant_domain_name)
    } else {
        return Err(AuthError::Config("cannot determine authorization URL".to_string()));
    };

    let login_hint = ctx.single_query_param("login_hint")?;

    let mut url = Url::parse(&format!("https://{domain}/api/v1/oauth2/authorize"))
        .map_err(|e| AuthError::Config(format!("malformed authorize URL domain: {e}")))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("state", &request.state)
            .append_pair("scope", &config.scopes.join(" "))
            .append_pair("code_challenge", &pkce::generate_code_challenge(&request.code_verifier))
            .append_pair("code_challenge_method", "S256")
            .append_pair("nonce", &pkce::generate_nonce());
        if let Some(hint) = login_hint {
            pairs.append_pair("login_hint", hint);
        }
    }
    Ok(url.into())
}

/// Build the tenant-scoped login URL used by callback recovery redirects.
///
/// In subdomain mode the configured login URL carries a `{tenant_domain}`
/// placeholder; otherwise the tenant rides along as a query parameter.
#[must_use]
pub fn tenant_login_url(
    config: &AuthConfig,
    tenant_domain_name: &str,
    tenant_custom_domain_param: &str,
) -> String {
    let mut url = if config.subdomain_mode() {
        config.login_url.replace("{tenant_domain}", tenant_domain_name)
    } else {
        format!("{}?tenant_domain={tenant_domain_name}", config.login_url)
    };

    if !tenant_custom_domain_param.is_empty() {
        let joiner = if config.subdomain_mode() { '?' } else { '&' };
        url.push_str(&format!("{joiner}tenant_custom_domain={tenant_custom_domain_param}"));
    }
    url
}
