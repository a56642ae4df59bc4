use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::auth::require_auth;
use super::handlers::{delete, health, rebuild, upload, upload_local};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route("/api/upload-local", post(upload_local))
        .route("/api/delete", post(delete))
        .route("/api/rebuild", post(rebuild))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
