//! Request/response protocol and the HTTP network client.
//!
//! Everything that issues requests in toolshell talks to a [`Network`]. The
//! reqwest-backed [`FetchClient`] is the real network; the cache agent is a
//! `Network` too, so any caller can be routed through it without knowing it
//! is there.
//!
//! ### Response semantics
//! - Non-2xx statuses are responses, not errors. Callers decide what a 404 means.
//! - Transport failures (offline, DNS, reset) are `NETWORK_ERROR`, timeouts
//!   are `FETCH_TIMEOUT`.
//! - Bodies larger than `max_bytes` are rejected with `FETCH_TOO_LARGE`.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use toolshell_core::{CacheEntry, Error};

pub use self::url::{UrlError, canonicalize, resolve, same_origin};
pub use reqwest::{Method, StatusCode, Url};

/// What kind of load a request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// A full-document load issued by the browser itself.
    Navigate,
    /// Everything else: assets and in-page content fetches.
    Subresource,
}

/// A request as seen by the network layer.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, mode: RequestMode::Subresource }
    }

    pub fn navigate(url: Url) -> Self {
        Self { method: Method::GET, url, mode: RequestMode::Navigate }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// The offline page, served in place of the requested document.
    Fallback,
}

/// A captured response.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// The final URL after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
    /// Time taken to fetch in milliseconds (0 for cache hits)
    pub fetch_ms: u64,
}

impl CapturedResponse {
    /// True when the final URL shares scheme, host and port with `origin`.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        same_origin(&self.url, origin)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Snapshot this response for storage under the identity of `request`.
    ///
    /// The key is the request URL, not the final URL, so a redirected request
    /// is found again under the address it was asked for.
    pub fn to_entry(&self, request: &Request) -> CacheEntry {
        CacheEntry::new(
            request.method.as_str(),
            request.url.as_str(),
            self.status.as_u16(),
            self.headers.clone(),
            self.body.to_vec(),
        )
    }

    /// Rebuild a response from a stored entry.
    pub fn from_entry(entry: CacheEntry, source: ResponseSource) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| Error::Serialization(format!("stored status {}: {e}", entry.status)))?;
        Ok(Self { url, status, headers: entry.headers, body: Bytes::from(entry.body), source, fetch_ms: 0 })
    }
}

/// Anything that can answer a request.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "toolshell/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "toolshell/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &toolshell_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// HTTP client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        if request.is_navigation() {
            builder = builder.header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            );
        }

        let response = builder.send().await.map_err(transport_error)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response.bytes().await.map_err(transport_error)?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            body.len()
        );

        Ok(CapturedResponse { url: final_url, status, headers, body, source: ResponseSource::Network, fetch_ms })
    }
}
