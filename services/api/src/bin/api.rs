//! services/api/src/bin/api.rs

use api_lib::{
    adapters::UpstreamAdapter,
    config::Config,
    error::ApiError,
    web::{middleware::require_auth, rest::ApiDoc, state::AppState, validate_comment_handler, ws_handler},
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting gateway...");

    // --- 2. Initialize the Upstream Adapter ---
    let upstream = Arc::new(UpstreamAdapter::from_config(&config)?);
    info!(upstream = %config.upstream_base_url, "Upstream backend configured");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::with_backend(config.clone(), upstream));

    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!(
            "Invalid ALLOWED_ORIGIN '{}': {}",
            config.allowed_origin, e
        ))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new().route("/comments/validate", post(validate_comment_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
