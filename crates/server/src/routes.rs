//! Route configuration.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use chunkdrop_protocol::constants::{
    ROUTE_DOWNLOAD, ROUTE_GET_RESOURCE, ROUTE_HEALTH, ROUTE_LARGE_CHECK, ROUTE_LARGE_CHUNK,
    ROUTE_LARGE_MERGE, ROUTE_LARGE_SECOND, ROUTE_LARGE_STATUS, ROUTE_RESOURCES, ROUTE_UPLOAD,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_chunk_bytes;
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        // Chunked upload
        .route(ROUTE_LARGE_CHUNK, post(handlers::upload_chunk))
        .route(ROUTE_LARGE_CHECK, post(handlers::check_chunks))
        .route(ROUTE_LARGE_MERGE, post(handlers::merge_chunks))
        .route(ROUTE_LARGE_SECOND, get(handlers::instant_check))
        .route(ROUTE_LARGE_STATUS, get(handlers::session_status))
        // Single-shot upload and completed files
        .route(ROUTE_UPLOAD, post(handlers::upload_files))
        .route(ROUTE_RESOURCES, get(handlers::list_resources))
        .route(ROUTE_GET_RESOURCE, get(handlers::get_resource))
        .route(ROUTE_DOWNLOAD, get(handlers::download))
        .route(ROUTE_HEALTH, get(handlers::health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
