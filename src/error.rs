//! Error types for the caching proxy
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Body returned when the terminal handler finds nothing to serve.
pub const MISSING_FROM_CACHE: &str = "resource not found in cache";

// == Proxy Error Enum ==
/// Errors surfaced to HTTP clients by the proxy pipeline.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Transport failure talking to the upstream, or an unreadable body
    #[error("{0}")]
    UpstreamFetch(String),

    /// The caching stage ran but the entry is not in the store
    #[error("{}", MISSING_FROM_CACHE)]
    CacheMissAfterInterceptor,
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::UpstreamFetch(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        // Every proxy failure is an internal error from the client's point of view
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

// == Persistence Error Enum ==
/// Failures reading or writing the cache snapshot.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot is not a valid document (truncated, wrong schema)
    #[error("corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A stored value is not valid base64
    #[error("corrupt snapshot value for key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Written by an incompatible version of the proxy
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

// == Normalize Error ==
/// The body is not a well-formed JSON document.
#[derive(Error, Debug)]
#[error("body is not well-formed JSON: {0}")]
pub struct NormalizeError(#[from] pub serde_json::Error);

// == Result Type Aliases ==
/// Convenience Result type for the request pipeline.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Convenience Result type for snapshot operations.
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
