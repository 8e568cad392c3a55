//! HTTP transport collaborator.
//!
//! [`DeployKeysClient`](crate::keys::DeployKeysClient) only builds requests and
//! shapes responses; everything on the wire goes through a [`Connection`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client, Method, StatusCode, Url,
    header::{ACCEPT, HeaderMap, USER_AGENT},
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

pub const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Relative to the API root, or an absolute URL taken from a `Link` header.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Sends one request and returns the raw response, whatever its status.
///
/// Implementations must be safe to share between concurrent calls and must not
/// retry on their own.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse>;
}

/// `reqwest` backed [`Connection`].
#[derive(Debug, Clone)]
pub struct HttpConnection {
    client: Client,
    base_url: Url,
    token: Option<String>,
    user_agent: String,
}

impl HttpConnection {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> HttpConnectionBuilder {
        HttpConnectionBuilder {
            base_url: base_url.to_string(),
            token: None,
            user_agent: concat!("deploykeys/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
            trust_invalid_server_cert: false,
        }
    }

    pub fn from_config(config: &Config) -> ApiResult<Self> {
        let mut builder = Self::builder(&config.api_url)
            .user_agent(&config.user_agent)
            .trust_invalid_server_cert(config.trust_invalid_server_cert);
        if let Some(token) = config.token() {
            builder = builder.token(token);
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Absolute URLs (from `Link` headers) must share the API origin, so the
    /// token is never sent to another host.
    fn resolve(&self, path: &str) -> ApiResult<Url> {
        if !(path.starts_with("http://") || path.starts_with("https://")) {
            return self
                .base_url
                .join(path.trim_start_matches('/'))
                .map_err(|e| invalid_url(path, e));
        }

        let url = Url::parse(path).map_err(|e| invalid_url(path, e))?;
        if url.origin() != self.base_url.origin() {
            warn!(url = %url, "refusing to follow URL outside the API origin");
            return Err(ApiError::Connection(format!(
                "refusing to follow '{url}': not on {}",
                self.base_url.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }
}

fn invalid_url(path: &str, e: impl std::fmt::Display) -> ApiError {
    ApiError::Connection(format!("invalid request URL '{path}': {e}"))
}

#[async_trait]
impl Connection for HttpConnection {
    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let url = self.resolve(&request.path)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, ACCEPT_GITHUB_JSON)
            .header(USER_AGENT, &self.user_agent);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.text().await?;

        if status.is_server_error() {
            warn!(method = %request.method, path = %request.path, %status, "server error");
        } else {
            debug!(method = %request.method, path = %request.path, %status, "response received");
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

pub struct HttpConnectionBuilder {
    base_url: String,
    token: Option<String>,
    user_agent: String,
    timeout: Option<Duration>,
    trust_invalid_server_cert: bool,
}

impl HttpConnectionBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Accept self-signed certificates, for self-hosted instances.
    pub fn trust_invalid_server_cert(mut self, trust: bool) -> Self {
        self.trust_invalid_server_cert = trust;
        self
    }

    pub fn build(self) -> ApiResult<HttpConnection> {
        // join() drops the last segment unless the base ends with a slash
        let mut base = self.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| ApiError::Connection(format!("invalid API URL '{}': {e}", self.base_url)))?;

        let mut client = Client::builder();
        if self.trust_invalid_server_cert {
            warn!("Trusting invalid server certificate");
            client = client.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(HttpConnection {
            client: client.build()?,
            base_url,
            token: self.token,
            user_agent: self.user_agent,
        })
    }
}
