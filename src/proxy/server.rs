//! Proxy server setup

use axum::{
    extract::State,
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::dispatcher::UpstreamClient;
use super::handler::AssistantHandler;
use crate::config::AppConfig;

/// Shared state for the proxy
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub upstream: UpstreamClient,
}

impl ProxyState {
    pub fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_seconds))
            .build()?;
        let upstream = UpstreamClient::new(http_client, config.upstream.clone());
        Ok(Self {
            config: Arc::new(config),
            upstream,
        })
    }
}

/// Build the application router
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // any() so the handler owns the 405 contract (Allow: POST + JSON body)
        .route("/api/assistant", any(assistant_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the proxy server
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = ProxyState::new(config)?;
    let app = build_router(state.clone());

    let addr: SocketAddr =
        format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("medikit-proxy listening on {}", addr);
    tracing::info!("Upstream endpoint: {}", state.config.upstream.url);
    if !state.upstream.has_credential() {
        tracing::warn!("No upstream API credential configured; assistant requests will fail");
    }

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Single assistant endpoint
async fn assistant_handler(
    State(state): State<ProxyState>,
    req: axum::extract::Request,
) -> axum::response::Response {
    let handler = AssistantHandler::new(state);
    handler.handle(req).await
}
