//! Proxy Handlers
//!
//! The caching interceptor that resolves the body for a request, from the
//! store or the origin, and the terminal handler that serves it.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::Response,
    Extension,
};
use tracing::{debug, info, warn};

use crate::error::{ProxyError, Result};
use crate::normalize::normalize_or_raw;
use crate::proxy::AppState;

/// Body resolved by the caching interceptor, attached to the request for the
/// terminal handler.
#[derive(Debug, Clone)]
pub struct CachedBody(pub Bytes);

/// Cache key for a request: the exact request target (path plus query).
pub fn cache_key(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Caching interceptor.
///
/// On a miss, fetches the target from the origin, normalizes the body and
/// stores it before handing the request on. Either way the body is attached
/// to the request, so an entry expiring before the terminal handler runs
/// does not lose it. Fetch failures answer 500 with the error text and leave
/// the store untouched.
pub async fn cache_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let key = cache_key(request.uri());

    let body = match state.cache.get(&key) {
        Some(entry) => {
            debug!(%key, "data present in cache");
            entry.value
        }
        None => {
            debug!(%key, "not cached, forwarding headers and fetching");
            populate(state, key, request.headers().clone()).await?
        }
    };

    request.extensions_mut().insert(CachedBody(body));
    Ok(next.run(request).await)
}

/// Terminal handler: serves the body resolved by the interceptor with
/// status 200.
pub async fn serve_cached(uri: Uri, body: Option<Extension<CachedBody>>) -> Result<Response> {
    match body {
        Some(Extension(CachedBody(body))) => Ok(Response::new(Body::from(body))),
        None => {
            warn!(key = %cache_key(&uri), "no body attached by caching stage");
            Err(ProxyError::CacheMissAfterInterceptor)
        }
    }
}

/// Runs the fetch on its own task so a client hanging up mid-request does not
/// cancel it; the 10 second client timeout still bounds it.
async fn populate(state: AppState, key: String, headers: HeaderMap) -> Result<Bytes> {
    tokio::spawn(async move {
        match state.in_flight.clone() {
            Some(in_flight) => {
                let gate = in_flight.gate(&key);
                let result = {
                    let _held = gate.lock().await;
                    match state.cache.peek(&key) {
                        Some(entry) => {
                            debug!(%key, "filled by a concurrent fetch");
                            Ok(entry.value)
                        }
                        None => fetch_and_store(&state, &key, &headers).await,
                    }
                };
                in_flight.release(&key, &gate);
                result
            }
            None => fetch_and_store(&state, &key, &headers).await,
        }
    })
    .await
    .map_err(|err| ProxyError::UpstreamFetch(err.to_string()))?
}

async fn fetch_and_store(state: &AppState, key: &str, headers: &HeaderMap) -> Result<Bytes> {
    let body = state.upstream.fetch(key, headers).await.map_err(|err| {
        warn!(%key, "upstream fetch failed: {}", err);
        err
    })?;

    let body = normalize_or_raw(body);
    info!("caching data from {}", state.upstream.url_for(key));
    state.cache.set(key, body.clone(), state.ttl);
    Ok(body)
}
