//! Shared helpers for the integration suites.

use std::collections::HashMap;

use gatehouse_auth::cookie::Cookie;
use gatehouse_auth::{ApiResponse, AuthConfig, RequestContext};

/// A fully populated configuration pointed at deterministic test values.
pub fn test_config() -> AuthConfig {
    AuthConfig {
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        login_state_secret: "login-state-secret-0123456789abcdef".to_string(),
        session_secret: "session-secret-0123456789abcdefghij".to_string(),
        login_url: "https://app.example.com/api/auth/login".to_string(),
        redirect_uri: "https://app.example.com/api/auth/callback".to_string(),
        scopes: vec!["openid".to_string(), "offline_access".to_string(), "email".to_string()],
        application_vanity_domain: "idp.example-app.com".to_string(),
        parse_tenant_from_root_domain: String::new(),
        is_application_custom_domain_active: false,
        custom_application_login_page_url: String::new(),
        default_tenant_domain_name: String::new(),
        default_tenant_custom_domain: String::new(),
        dangerously_disable_secure_cookies: false,
        session_cookie_max_age_secs: 3600,
        post_callback_landing_url: "https://app.example.com/home".to_string(),
        post_logout_redirect_url: String::new(),
        downstream_token_secret: "downstream-jwt-secret".to_string(),
        development_mode: false,
    }
}

/// Build a GET request context with query parameters, cookies, and headers.
pub fn get_request(
    query: Vec<(&str, &str)>,
    cookies: Vec<(String, String)>,
    headers: Vec<(&str, &str)>,
) -> RequestContext {
    let mut header_map: HashMap<String, String> =
        headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    if !cookies.is_empty() {
        let cookie_header = cookies
            .into_iter()
            .map(|(name, value)| format!("{name}={}", urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("; ");
        header_map.insert("cookie".to_string(), cookie_header);
    }
    RequestContext::new(
        "GET",
        None,
        query.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        header_map,
    )
}

/// The Location header of a redirect response.
pub fn location(response: &ApiResponse) -> &str {
    response
        .headers
        .iter()
        .find(|(k, _)| k == "Location")
        .map(|(_, v)| v.as_str())
        .unwrap_or_default()
}

/// Find a set cookie by name.
pub fn find_cookie<'a>(response: &'a ApiResponse, name: &str) -> Option<&'a Cookie> {
    response.set_cookies.iter().find(|c| c.name == name)
}

/// Find the login-state cookie set by a login response, returning it with
/// the `state` value embedded in its name.
pub fn login_state_cookie(response: &ApiResponse) -> (Cookie, String) {
    let cookie = response
        .set_cookies
        .iter()
        .find(|c| c.name.starts_with("login#") && c.max_age > 0)
        .expect("login response should set a login-state cookie")
        .clone();
    let state = cookie
        .name
        .trim_start_matches("login#")
        .rsplit_once('#')
        .map(|(state, _)| state.to_string())
        .expect("login-state cookie name should embed the state");
    (cookie, state)
}
