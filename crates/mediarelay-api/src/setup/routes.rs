//! Router and HTTP layers

use crate::error::hide_error_details;
use crate::handlers::{status, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use mediarelay_core::RelayConfig;
use mediarelay_infra::request_id_middleware;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn setup_routes(config: &RelayConfig, state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(upload::upload))
        .route("/status", get(status::status))
        .layer(axum::middleware::from_fn_with_state(
            config.is_production(),
            hide_error_details,
        ))
        // The multipart extractor's own 2 MB default would otherwise apply
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.base.max_upload_size_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
