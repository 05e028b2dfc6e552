//! HTTP client configuration.

use crate::request::RequestBuilder;
use crate::response::{parse_json, ResponseError};
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("vellum/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
        }
    }
}

/// Build a configured HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
        .map_err(HttpError::ClientBuild)
}

/// HTTP errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error: {status}")]
    ServerError { status: u16, body: String },

    #[error("client error: {status}")]
    ClientError { status: u16, body: String },

    #[error(transparent)]
    Decode(#[from] ResponseError),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::Request(e)
        }
    }
}

/// HTTP client bound to one base URL and header set.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    request: RequestBuilder,
}

impl HttpClient {
    /// Create a client with default config.
    pub fn new(request: RequestBuilder) -> Result<Self, HttpError> {
        Self::with_config(&HttpConfig::default(), request)
    }

    /// Create a client with custom config.
    pub fn with_config(config: &HttpConfig, request: RequestBuilder) -> Result<Self, HttpError> {
        let inner = build_client(config)?;
        Ok(Self { inner, request })
    }

    /// Full URL for a path under the base URL.
    pub fn url(&self, path: &str) -> String {
        self.request.url(path)
    }

    /// GET a path with query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "GET");
        let response = self
            .inner
            .get(&url)
            .headers(self.request.headers().clone())
            .query(query)
            .send()
            .await?;
        tracing::debug!(status = %response.status(), url = %url, "GET response");
        let response = Self::check_response(response).await?;
        Ok(parse_json(response).await?)
    }

    /// POST a JSON body to a path and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "POST");
        let response = self
            .inner
            .post(&url)
            .headers(self.request.headers().clone())
            .json(body)
            .send()
            .await?;
        tracing::debug!(status = %response.status(), url = %url, "POST response");
        let response = Self::check_response(response).await?;
        Ok(parse_json(response).await?)
    }

    /// Check response status and convert errors.
    pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, HttpError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);

            return Err(HttpError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();

        if status.is_server_error() {
            Err(HttpError::ServerError {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(HttpError::ClientError {
                status: status.as_u16(),
                body,
            })
        }
    }
}
