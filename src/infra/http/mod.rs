//! HTTP boundary: routes, middleware and error mapping.

pub mod api;
mod middleware;

pub use api::{AppState, build_router};
pub use middleware::RequestContext;
