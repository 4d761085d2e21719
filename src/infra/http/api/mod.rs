pub mod error;
pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

use self::error::ApiError;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/render/generate", post(handlers::generate_document))
        .route("/api/health", get(handlers::health))
        .fallback(route_not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn route_not_found() -> ApiError {
    ApiError::not_found("route not found")
}
