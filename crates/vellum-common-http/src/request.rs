//! Request header and URL construction.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

/// Common HTTP headers.
pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    /// PostgREST gateway key header.
    pub const APIKEY: &str = "apikey";
    /// Postgres schema selection for PostgREST.
    pub const ACCEPT_PROFILE: &str = "accept-profile";
}

/// Base URL plus the headers sent with every request.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    headers: HeaderMap,
    base_url: Option<String>,
}

impl RequestBuilder {
    /// Create a new request builder.
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            base_url: None,
        }
    }

    /// Set the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a header. Invalid names or values are skipped.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Add bearer token authorization.
    pub fn bearer_auth(mut self, token: impl AsRef<str>) -> Self {
        if let Ok(value) = HeaderValue::try_from(format!("Bearer {}", token.as_ref())) {
            self.headers.insert(AUTHORIZATION, value);
        }
        self
    }

    /// Authenticate against a PostgREST gateway: `apikey` plus bearer token.
    pub fn gateway_key(self, key: impl AsRef<str>) -> Self {
        let key = key.as_ref();
        self.header(headers::APIKEY, key).bearer_auth(key)
    }

    /// Send and accept JSON.
    pub fn json_content(mut self) -> Self {
        let json = HeaderValue::from_static(headers::CONTENT_TYPE_JSON);
        self.headers.insert(CONTENT_TYPE, json.clone());
        self.headers.insert(ACCEPT, json);
        self
    }

    /// Get the built headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Build the URL.
    pub fn url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path.to_string(),
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
