// src/api/mod.rs — HTTP gateway for job submission and status

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::infra::config::{ApiConfig, BuildConfig};
use crate::queue::QueueAdapter;
use crate::store::JobStore;

pub use types::BuildRequest;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn QueueAdapter>,
    /// Per-job bounds applied when the request does not override them.
    pub defaults: BuildConfig,
    /// Debug mode: internal error detail is included in 500 responses.
    pub debug: bool,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState, config: &ApiConfig) -> Router {
    Router::new()
        .route("/api/v1/models", post(handlers::submit))
        .route("/api/v1/models", get(handlers::list))
        .route("/api/v1/models/{id}", get(handlers::get))
        .route("/api/v1/models/{id}/cancel", post(handlers::cancel))
        .route("/api/v1/health", get(handlers::health))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let parsed: Vec<axum::http::HeaderValue> =
            origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server (blocking).
pub async fn start_server(config: &ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let router = build_router(state, config);

    tracing::info!("API listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
