//! Upstream Client
//!
//! Fetches uncached resources from the origin server.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use axum::http::HeaderMap;
use tracing::warn;

use crate::error::Result;

/// HTTP client bound to one origin.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Creates a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// The base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upstream URL for a request target.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }

    /// GETs `key` from the origin, forwarding the inbound headers, and
    /// returns the full body.
    ///
    /// Any status is accepted; only transport failures and unreadable bodies
    /// are errors.
    pub async fn fetch(&self, key: &str, inbound: &HeaderMap) -> Result<Bytes> {
        let url = self.url_for(key);
        let response = self
            .client
            .get(&url)
            .headers(forwarded_headers(inbound))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "upstream returned non-success status, caching anyway");
        }

        Ok(response.bytes().await?)
    }
}

/// Copies the inbound headers, minus the ones describing the inbound
/// connection and body. The client derives those for the upstream request.
fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION] {
        headers.remove(name);
    }
    headers
}
