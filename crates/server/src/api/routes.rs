use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{credentials, handlers, uploads};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config().server.max_upload_bytes;

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Uploads and publish jobs
        .route(
            "/uploads",
            post(uploads::create_upload).get(uploads::list_uploads),
        )
        .route("/uploads/{job_id}/retry", post(uploads::retry_upload))
        // Credentials
        .route("/credentials", get(credentials::list_credentials))
        .route(
            "/credentials/{kind}",
            put(credentials::save_tokens).delete(credentials::delete_credential),
        )
        .route(
            "/credentials/{kind}/oauth-config",
            put(credentials::save_oauth_config),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
