//! Proxy Module
//!
//! The cache-backed request pipeline in front of the origin.
//!
//! # Flow
//! - `cache_layer` looks the request target up; on a miss it fetches from
//!   the origin, normalizes the body and stores it
//! - `serve_cached` answers with the body the interceptor attached

pub mod handlers;
pub mod routes;
mod single_flight;
mod state;
mod upstream;

pub use handlers::{cache_key, cache_layer, serve_cached, CachedBody};
pub use routes::create_router;
pub use single_flight::{FetchGate, InFlight};
pub use state::AppState;
pub use upstream::UpstreamClient;
