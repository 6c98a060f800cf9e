//! Axum router adapting HTTP requests to the auth service.
//!
//! The service layer works over framework-neutral request/response types;
//! this module is the only place that touches axum's. Each Set-Cookie is
//! emitted as its own header.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use gatehouse_auth::{ApiResponse, AuthService, IdentityProviderClient, RequestContext};

pub type SharedService = Arc<AuthService<IdentityProviderClient>>;

/// Build the router for the five auth endpoints.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/api/auth/login", get(login))
        .route("/api/auth/callback", get(callback))
        .route("/api/auth/logout", get(logout))
        .route("/api/auth/session", get(session))
        .route("/api/auth/token", get(token))
        .with_state(service)
}

async fn login(State(service): State<SharedService>, request: Request) -> Response {
    let ctx = request_context(&request);
    into_response(service.login(&ctx).await)
}

async fn callback(State(service): State<SharedService>, request: Request) -> Response {
    let ctx = request_context(&request);
    into_response(service.callback(&ctx).await)
}

async fn logout(State(service): State<SharedService>, request: Request) -> Response {
    let ctx = request_context(&request);
    into_response(service.logout(&ctx).await)
}

async fn session(State(service): State<SharedService>, request: Request) -> Response {
    let ctx = request_context(&request);
    into_response(service.session(&ctx).await)
}

async fn token(State(service): State<SharedService>, request: Request) -> Response {
    let ctx = request_context(&request);
    into_response(service.token(&ctx).await)
}

/// Reduce an axum request to the parts the auth flows read. Query parameters
/// keep their arrival order so repeats stay detectable.
fn request_context(request: &Request) -> RequestContext {
    let query: Vec<(String, String)> = request
        .uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().host().map(str::to_string));

    RequestContext::new(request.method().as_str(), host, query, headers)
}

fn into_response(api: ApiResponse) -> Response {
    let mut response = Response::new(Body::from(api.body.unwrap_or_default()));
    *response.status_mut() =
        StatusCode::from_u16(api.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = response.headers_mut();
    for (name, value) in &api.headers {
        if let (Ok(name), Ok(value)) =
            (name.parse::<header::HeaderName>(), HeaderValue::from_str(value))
        {
            headers.append(name, value);
        }
    }
    for cookie in &api.set_cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_header_value()) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    //! Tests for the axum adapters.
    use gatehouse_auth::AuthConfig;
    use tower::util::ServiceExt;

    use super::*;

    fn test_config() -> AuthConfig {
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

    fn test_router() -> Router {
        let config = test_config();
        let provider = IdentityProviderClient::new(&config);
        let service = AuthService::new(config, provider).unwrap();
        router(Arc::new(service))
    }

    #[test]
    fn request_context_parses_query_and_cookies() {
        let request = Request::builder()
            .method("GET")
            .uri("/api/auth/login?tenant_domain=acme&return_url=%2Fdash")
            .header("Host", "acme.example-app.com")
            .header("Cookie", "session=abc; CSRF-TOKEN=def")
            .body(Body::empty())
            .unwrap();

        let ctx = request_context(&request);
        assert_eq!(ctx.method, "GET");
        assert_eq!(ctx.host.as_deref(), Some("acme.example-app.com"));
        assert_eq!(ctx.single_query_param("tenant_domain").unwrap(), Some("acme"));
        assert_eq!(ctx.single_query_param("return_url").unwrap(), Some("/dash"));
        assert_eq!(ctx.cookie("session"), Some("abc"));
    }

    #[test]
    fn into_response_emits_one_set_cookie_header_per_cookie() {
        let api = ApiResponse::redirect(
            "https://example.com",
            vec![
                gatehouse_auth::cookie::Cookie::new("a", "1", 60),
                gatehouse_auth::cookie::Cookie::clearing("b"),
            ],
        );
        let response = into_response(api);

        assert_eq!(response.status(), StatusCode::FOUND);
        let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn session_endpoint_answers_401_without_cookies() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_endpoint_redirects() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/login?tenant_domain=acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://acme-idp.example-app.com/api/v1/oauth2/authorize?"));
    }
}
