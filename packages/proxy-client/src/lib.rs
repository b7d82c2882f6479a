//! Pure retail backend proxy REST API client.
//!
//! A minimal client for the multi-tenant retail backend, which is reachable
//! only through a generic HTTP proxy. Every call is one round trip with fixed
//! headers and a session cookie; the response is classified into an
//! [`Outcome`] instead of an error so that pagination code owns the
//! escalation policy. No retries happen here.
//!
//! # Example
//!
//! ```rust,ignore
//! use proxy_client::{ApiPath, ApiRequest, Gateway, ProxyClient, ProxyConfig};
//!
//! let client = ProxyClient::new(config)?;
//! let outcome = client.call(&ApiRequest::get(ApiPath::data("tenant", "stores"))).await;
//! ```

pub mod error;
pub mod path;
pub mod types;

pub use error::{ProxyError, Result};
pub use path::ApiPath;
pub use types::{classify, ApiRequest, Envelope, Method, Outcome, SessionToken, SoftFailure};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use std::time::Duration;
use tracing::{debug, warn};

/// API version marker the backend expects in the `api` header.
const API_VERSION: &str = "v3";

/// Cookie carrying the session credential.
const SESSION_COOKIE: &str = "connect.sid";

/// Anything that can issue one classified call against the proxy.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn call(&self, request: &ApiRequest) -> Outcome;
}

/// Connection settings for [`ProxyClient`].
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy endpoint, e.g. `https://backend.example/proxy`
    pub base_url: String,
    /// Value of the fixed `timezone` query parameter (UTC offset in seconds)
    pub timezone: String,
    pub session: SessionToken,
    /// Ceiling for a single request, connect included
    pub timeout: Duration,
}

pub struct ProxyClient {
    client: reqwest::Client,
    base_url: String,
    timezone: String,
}

impl ProxyClient {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("api", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut cookie =
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, config.session.expose()))
                .map_err(|_| ProxyError::InvalidCredential)?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
            timezone: config.timezone,
        })
    }

    /// Full proxy URL for a logical path. The path travels as one encoded parameter.
    pub fn url_for(&self, path: &str) -> String {
        proxy_url(&self.base_url, &self.timezone, path)
    }
}

fn proxy_url(base_url: &str, timezone: &str, path: &str) -> String {
    format!(
        "{}?path={}&timezone={}",
        base_url,
        urlencoding::encode(path),
        urlencoding::encode(timezone)
    )
}

#[async_trait]
impl Gateway for ProxyClient {
    async fn call(&self, request: &ApiRequest) -> Outcome {
        let url = self.url_for(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => {
                let body = request
                    .body
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({}));
                self.client.post(&url).json(&body)
            }
        };

        debug!(path = %request.path, method = ?request.method, "Proxy request");

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %request.path, error = %e, "Proxy request failed");
                return Outcome::SoftFail(SoftFailure::from_transport(&e));
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %request.path, error = %e, "Failed to read proxy response body");
                return Outcome::SoftFail(SoftFailure::from_transport(&e));
            }
        };

        let outcome = classify(status, &body);
        if let Outcome::SoftFail(failure) = &outcome {
            warn!(path = %request.path, status, reason = %failure, "Proxy call did not succeed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_url_encodes_whole_path() {
        let url = proxy_url(
            "https://proxy.example/proxy",
            "7200",
            "/data/t1/catalog?offset=0&limit=1000",
        );
        assert_eq!(
            url,
            "https://proxy.example/proxy?path=%2Fdata%2Ft1%2Fcatalog%3Foffset%3D0%26limit%3D1000&timezone=7200"
        );
    }

    #[test]
    fn test_client_builds_with_plain_token() {
        let client = ProxyClient::new(ProxyConfig {
            base_url: "https://proxy.example/proxy".to_string(),
            timezone: "7200".to_string(),
            session: SessionToken::new("s%3Aabc.def"),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert!(client.url_for("/data/t/stores").starts_with("https://proxy.example/proxy?path="));
    }

    #[test]
    fn test_client_rejects_header_breaking_token() {
        let result = ProxyClient::new(ProxyConfig {
            base_url: "https://proxy.example/proxy".to_string(),
            timezone: "7200".to_string(),
            session: SessionToken::new("line\nbreak"),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(ProxyError::InvalidCredential)));
    }
}
