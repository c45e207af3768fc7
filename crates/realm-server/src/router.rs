use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all endpoints.
///
/// With a local backend the assets directory is also served statically
/// under its public prefix.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handler::health_handler))
        .route("/api/upload", post(handler::upload_handler))
        .route("/api/upload-check", get(handler::upload_check_handler))
        .route("/api/upload-url", get(handler::upload_url_handler))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    if let Some(local) = state.storage.local_backend() {
        let prefix = match local.public_prefix() {
            p if p.starts_with('/') && p.len() > 1 => p.to_string(),
            _ => "/assets".to_string(),
        };
        router = router.nest_service(&prefix, ServeDir::new(local.assets_dir()));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
