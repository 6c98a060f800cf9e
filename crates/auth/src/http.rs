//! Request/response model shared by every endpoint.
//!
//! Each endpoint invocation is a stateless handler over an immutable
//! [`RequestContext`] producing an [`ApiResponse`]; there is no shared
//! in-process state between invocations. The binary crate adapts its HTTP
//! framework's request/response types to these at the edge.

use std::collections::HashMap;

use crate::cookie::Cookie;
use crate::error::{AuthError, AuthResult};

/// An inbound request, reduced to the parts the auth flow reads.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Uppercase HTTP method (`GET`, `POST`, ...).
    pub method: String,

    /// The request's Host header, if present.
    pub host: Option<String>,

    /// Query parameters in arrival order. Repeats are preserved so
    /// single-valued parameters can be enforced.
    pub query: Vec<(String, String)>,

    /// Request headers with lowercased names.
    pub headers: HashMap<String, String>,

    /// Cookies parsed from the `Cookie` header.
    pub cookies: HashMap<String, String>,
}

impl RequestContext {
    /// Build a context from raw request parts. Header names are lowercased
    /// and the `Cookie` header is parsed into the cookie map.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        host: Option<String>,
        query: Vec<(String, String)>,
        headers: HashMap<String, String>,
    ) -> Self {
        let headers: HashMap<String, String> =
            headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        let cookies = headers.get("cookie").map(|h| parse_cookie_header(h)).unwrap_or_default();
        Self { method: method.into().to_ascii_uppercase(), host, query, headers, cookies }
    }

    /// Fetch a query parameter that must appear at most once.
    ///
    /// # Errors
    /// Returns `AuthError::BadRequest` when the parameter repeats.
    pub fn single_query_param(&self, name: &str) -> AuthResult<Option<&str>> {
        let mut values = self.query.iter().filter(|(k, _)| k == name).map(|(_, v)| v.as_str());
        let first = values.next();
        if values.next().is_some() {
            return Err(AuthError::BadRequest(format!(
                "more than one [{name}] query parameter was encountered"
            )));
        }
        Ok(first)
    }

    /// Fetch a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Fetch a cookie value by name.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// Parse a `Cookie` request header into name/value pairs, URL-decoding the
/// values.
#[must_use]
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let mut parts = pair.splitn(2, '=');
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let decoded =
            urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_else(|_| value.to_string());
        cookies.insert(name.to_string(), decoded);
    }
    cookies
}

/// An outbound response: status, headers, cookies to set, optional body.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub set_cookies: Vec<Cookie>,
    pub body: Option<String>,
}

impl ApiResponse {
    /// A 302 redirect with no-store cache headers, attaching the given
    /// cookies.
    #[must_use]
    pub fn redirect(location: impl Into<String>, cookies: Vec<Cookie>) -> Self {
        Self {
            status: 302,
            headers: vec![
                ("Location".to_string(), location.into()),
                ("Cache-Control".to_string(), "no-store".to_string()),
                ("Pragma".to_string(), "no-cache".to_string()),
            ],
            set_cookies: cookies,
            body: None,
        }
    }

    /// A 200 response carrying a JSON body.
    #[must_use]
    pub fn ok_json(body: String, cookies: Vec<Cookie>, no_cache: bool) -> Self {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if no_cache {
            headers.push(("Cache-Control".to_string(), "no-store".to_string()));
            headers.push(("Pragma".to_string(), "no-cache".to_string()));
        }
        Self { status: 200, headers, set_cookies: cookies, body: Some(body) }
    }

    /// An error response with a JSON body. `dev_detail` is only included when
    /// `development_mode` is set; production answers carry the redacted
    /// message alone.
    #[must_use]
    pub fn error(
        status: u16,
        message: &str,
        dev_detail: Option<&str>,
        development_mode: bool,
    ) -> Self {
        let body = match dev_detail {
            Some(detail) if development_mode => {
                serde_json::json!({ "error": message, "message": detail })
            }
            _ => serde_json::json!({ "error": message }),
        };
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            set_cookies: Vec::new(),
            body: Some(body.to_string()),
        }
    }

    /// A bare status-only error (401/403 bodies are intentionally empty).
    #[must_use]
    pub fn status_only(status: u16) -> Self {
        Self { status, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the request/response model.
    use super::*;

    fn ctx_with_query(query: Vec<(&str, &str)>) -> RequestContext {
        RequestContext::new(
            "GET",
            Some("app.example.com".to_string()),
            query.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            HashMap::new(),
        )
    }

    #[test]
    fn single_query_param_returns_value() {
        let ctx = ctx_with_query(vec![("tenant_domain", "acme")]);
        assert_eq!(ctx.single_query_param("tenant_domain").unwrap(), Some("acme"));
        assert_eq!(ctx.single_query_param("missing").unwrap(), None);
    }

    #[test]
    fn duplicated_query_param_is_rejected() {
        let ctx = ctx_with_query(vec![("return_url", "/a"), ("return_url", "/b")]);
        let err = ctx.single_query_param("return_url").unwrap_err();
        assert!(matches!(err, AuthError::BadRequest(_)));
    }

    #[test]
    fn cookie_header_is_parsed_and_decoded() {
        let mut headers = HashMap::new();
        headers.insert(
            "Cookie".to_string(),
            "session=abc%3D%3D; CSRF-TOKEN=deadbeef; malformed".to_string(),
        );
        let ctx = RequestContext::new("get", None, Vec::new(), headers);

        assert_eq!(ctx.cookie("session"), Some("abc=="));
        assert_eq!(ctx.cookie("CSRF-TOKEN"), Some("deadbeef"));
        assert_eq!(ctx.cookies.len(), 2);
        assert_eq!(ctx.method, "GET");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("X-CSRF-Token".to_string(), "abc".to_string());
        let ctx = RequestContext::new("GET", None, Vec::new(), headers);
        assert_eq!(ctx.header("x-csrf-token"), Some("abc"));
    }

    #[test]
    fn redirect_sets_no_store_headers() {
        let response = ApiResponse::redirect("https://example.com", Vec::new());
        assert_eq!(response.status, 302);
        assert!(response
            .headers
            .iter()
            .any(|(k, v)| k == "Cache-Control" && v == "no-store"));
        assert!(response.body.is_none());
    }

    #[test]
    fn error_detail_is_redacted_outside_development() {
        let prod = ApiResponse::error(500, "Internal Server Error", Some("boom"), false);
        assert!(!prod.body.unwrap().contains("boom"));

        let dev = ApiResponse::error(500, "Internal Server Error", Some("boom"), true);
        assert!(dev.body.unwrap().contains("boom"));
    }
}
