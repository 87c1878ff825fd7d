//! Proxy Routes
//!
//! Every path and method goes through the caching interceptor to the
//! terminal handler.

use axum::{middleware, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers::{cache_layer, serve_cached};
use super::AppState;

/// Creates the proxy router.
///
/// # Middleware
/// - Caching: fills the store on a miss
/// - Tracing: logs every request and its response at info
pub fn create_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .fallback(serve_cached)
        .layer(middleware::from_fn_with_state(state.clone(), cache_layer))
        .layer(trace)
        .with_state(state)
}
