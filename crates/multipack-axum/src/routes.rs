//! Route definitions and router construction.

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::middleware::log_requests;
use crate::state::AppState;

/// Dev tooling in the browser talks to the server from other origins.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// API routes without the `/api` prefix (for nesting under /api).
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/targets", get(handlers::api::targets))
        .route("/events", get(handlers::events::stream))
        .route("/{target}/stats", get(handlers::api::stats))
        .route("/{target}/assets", get(handlers::api::assets))
}

/// Create the gateway router.
///
/// Everything not matched by a named route is treated as an asset request.
/// Axum 0.8 uses brace syntax for path parameters: `{target}`.
pub fn create_router(state: AppState) -> Router {
    let hmr_path = state.config.hmr_path.clone();

    Router::new()
        .route("/", get(handlers::status::index))
        .route("/status", get(handlers::status::status))
        .route("/symbolicate", post(handlers::symbolicate::symbolicate))
        .route("/message", get(handlers::message::connect))
        .route("/reload", post(handlers::message::reload))
        .route(&hmr_path, get(handlers::hmr::connect))
        .nest("/api", api_routes())
        .fallback(handlers::assets::serve)
        .layer(from_fn_with_state(state.clone(), log_requests))
        .layer(build_cors_layer())
        .with_state(state)
}
