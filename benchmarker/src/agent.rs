//! Agent: the browser-like HTTP client each virtual user drives
//!
//! Actions only see the [`Agent`] trait. [`HttpAgent`] is the production
//! implementation on top of `reqwest`; it keeps a cookie store per user and
//! treats the assets of the [`AssetManifest`] as the sub-resources of every
//! page it loads.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::join_all;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Errors raised by an agent before a response is available
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Failed to build request for {path}: {reason}")]
    RequestBuild { path: String, reason: String },

    #[error("Request to {path} timed out")]
    Timeout { path: String },

    #[error("Request to {path} failed: {reason}")]
    Transport { path: String, reason: String },
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout { .. })
    }

    fn from_reqwest(path: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AgentError::Timeout {
                path: path.to_string(),
            }
        } else if e.is_builder() {
            AgentError::RequestBuild {
                path: path.to_string(),
                reason: e.to_string(),
            }
        } else {
            AgentError::Transport {
                path: path.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// A fully read HTTP response
///
/// The body is buffered so assertions can inspect it any number of times.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Value of the `Content-Type` header, or an empty string
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// Result of loading one sub-resource of a page
#[derive(Debug, Clone)]
pub struct SubResource {
    pub path: String,
    pub result: Result<Response, AgentError>,
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// GET a page
    async fn get(&self, path: &str) -> Result<Response, AgentError>;

    /// POST `fields` as `application/x-www-form-urlencoded`
    async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, String)],
    ) -> Result<Response, AgentError>;

    /// Load every sub-resource referenced by `page`
    async fn fetch_resources(&self, page: &Response) -> Vec<SubResource>;
}

/// Creates one agent per virtual user
pub trait AgentFactory: Send + Sync {
    fn new_agent(&self) -> Result<Box<dyn Agent>, AgentError>;
}

/// Expected SHA-256 digests of the static assets served by the target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    assets: BTreeMap<String, String>,
}

impl AssetManifest {
    pub fn new(assets: BTreeMap<String, String>) -> Self {
        let assets = assets
            .into_iter()
            .map(|(path, digest)| (path, digest.to_lowercase()))
            .collect();
        Self { assets }
    }

    /// Load a manifest from a JSON object of `path -> sha256 hex`
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let raw = std::fs::read(path)?;
        let assets: BTreeMap<String, String> = serde_json::from_slice(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::new(assets))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn expected_digest(&self, path: &str) -> Option<&str> {
        self.assets.get(path).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }
}

/// Lowercase hex SHA-256 of `body`
pub fn sha256_hex(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

/// `reqwest`-backed agent with its own cookie jar
pub struct HttpAgent {
    client: reqwest::Client,
    base_url: String,
    assets: Arc<AssetManifest>,
}

impl HttpAgent {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        assets: Arc<AssetManifest>,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .user_agent(concat!("speedtest-benchmarker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::RequestBuild {
                path: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            assets,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read(path: &str, res: reqwest::Response) -> Result<Response, AgentError> {
        let status = res.status();
        let headers = res.headers().clone();
        let body = res
            .bytes()
            .await
            .map_err(|e| AgentError::from_reqwest(path, e))?;
        Ok(Response::new(status, headers, body))
    }
}

#[async_trait]
impl Agent for HttpAgent {
    async fn get(&self, path: &str) -> Result<Response, AgentError> {
        debug!("GET {}", path);
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(path, e))?;
        Self::read(path, res).await
    }

    async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, String)],
    ) -> Result<Response, AgentError> {
        debug!("POST {}", path);
        let res = self
            .client
            .post(self.url(path))
            .form(fields)
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(path, e))?;
        Self::read(path, res).await
    }

    async fn fetch_resources(&self, _page: &Response) -> Vec<SubResource> {
        let fetches = self.assets.paths().map(|path| async move {
            SubResource {
                path: path.to_string(),
                result: self.get(path).await,
            }
        });
        join_all(fetches).await
    }
}

/// Builds an [`HttpAgent`] per user against one target
pub struct HttpAgentFactory {
    base_url: String,
    request_timeout: Duration,
    assets: Arc<AssetManifest>,
}

impl HttpAgentFactory {
    pub fn new(base_url: &str, request_timeout: Duration, assets: Arc<AssetManifest>) -> Self {
        Self {
            base_url: base_url.to_string(),
            request_timeout,
            assets,
        }
    }
}

impl AgentFactory for HttpAgentFactory {
    fn new_agent(&self) -> Result<Box<dyn Agent>, AgentError> {
        let agent = HttpAgent::new(&self.base_url, self.request_timeout, Arc::clone(&self.assets))?;
        Ok(Box::new(agent))
    }
}
