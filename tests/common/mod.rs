//! Shared utilities for integration tests: a recording origin server and a
//! proxy wired to it.

use std::future::IntoFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use cache_proxy::{cache::CacheStore, config::UPSTREAM_TIMEOUT, proxy::UpstreamClient, AppState};
use tokio::net::TcpListener;

/// One request seen by the origin.
#[derive(Debug, Clone)]
pub struct OriginCall {
    pub target: String,
    pub headers: HeaderMap,
}

/// Origin server that records every request it receives.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    calls: Arc<Mutex<Vec<OriginCall>>>,
}

#[allow(dead_code)]
impl Origin {
    pub fn calls(&self) -> Vec<OriginCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, target: &str) -> usize {
        self.calls().iter().filter(|c| c.target == target).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }
}

/// Routes:
/// - `/widgets/1` -> loosely formatted JSON
/// - `/raw` -> `hello`
/// - `/slow` -> JSON after 300ms
/// - `/gone` -> 404 with a text body
/// - anything else -> JSON naming the target
async fn origin_handler(State(origin): State<Origin>, uri: Uri, headers: HeaderMap) -> Response {
    let target = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    origin.calls.lock().unwrap().push(OriginCall {
        target: target.clone(),
        headers,
    });

    match uri.path() {
        "/widgets/1" => r#"{"a": 1,   "b":2}"#.into_response(),
        "/raw" => "hello".into_response(),
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(300)).await;
            r#"{ "slow" : true }"#.into_response()
        }
        "/gone" => (StatusCode::NOT_FOUND, "not here").into_response(),
        _ => Response::new(Body::from(format!("{{ \"target\": \"{}\" }}", target))),
    }
}

/// Starts the origin on an ephemeral port and returns its base URL.
pub async fn spawn_origin() -> (String, Origin) {
    let origin = Origin::default();
    let app = Router::new()
        .fallback(origin_handler)
        .with_state(origin.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());

    (format!("http://{}", addr), origin)
}

/// Proxy state pointed at `base_url`.
#[allow(dead_code)]
pub fn proxy_state(base_url: &str, ttl: Duration) -> AppState {
    let cache = Arc::new(CacheStore::new(ttl));
    let upstream = UpstreamClient::new(base_url, UPSTREAM_TIMEOUT).unwrap();
    AppState::new(cache, upstream)
}
