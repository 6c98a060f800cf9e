//! Tenant-aware OAuth2/PKCE authentication gateway.
//!
//! Implements the authorization-code flow against a multi-tenant identity
//! provider: login-state creation and storage, the callback state machine,
//! encrypted session cookies with CSRF protection, and token refresh with
//! bounded retry. All per-client state travels in encrypted cookies; the
//! process itself is stateless.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod codec;
pub mod config;
pub mod cookie;
pub mod csrf;
pub mod error;
pub mod http;
pub mod login_state;
pub mod pkce;
pub mod provider;
pub mod service;
pub mod session;
pub mod tenant;

// Re-export the types most callers touch.
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use http::{ApiResponse, RequestContext};
pub use provider::{IdentityProviderClient, ProviderApi};
pub use service::AuthService;
pub use session::{Session, SessionManager};
