//! Gatehouse API server.
//!
//! Hosts the five authentication endpoints over HTTP. Configuration comes
//! from `GATEHOUSE_*` environment variables (a local `.env` is honored);
//! a misconfigured deployment exits at startup with every violation listed.

use std::sync::Arc;

use gatehouse_auth::{AuthConfig, AuthService, IdentityProviderClient};
use tracing_subscriber::EnvFilter;

mod routes;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gatehouse_auth=debug")),
        )
        .init();

    let config = AuthConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    let listen_addr =
        std::env::var("GATEHOUSE_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8787".to_string());

    let provider = IdentityProviderClient::new(&config);
    let service = AuthService::new(config, provider).unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    let app = routes::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind {listen_addr}: {e}");
        std::process::exit(1);
    });

    tracing::info!(%listen_addr, "gatehouse API server listening");

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    });
}
