//! reqwest implementation of the [`Transport`] seam.
//!
//! Every request goes to `{base_url}{path}` with an optional
//! `Authorization: Bearer <token>` header and a JSON body.  Responses are
//! read as text first so that an empty body can become `Value::Null` and a
//! body that is not JSON (some backend endpoints answer with a bare string)
//! can become `Value::String`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::application::transport::{Method, Transport, TransportError};

/// Upper bound for a single backend request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticated JSON client for the backend REST API.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    /// Creates a transport for `api_url`, which is normalized first.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error if the TLS backend cannot be initialised.
    pub fn new(api_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: normalize_api_url(api_url),
            token: None,
        })
    }

    /// Sends `token` as a bearer token with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        let request_error = |e: reqwest::Error| TransportError::Request {
            method,
            path: path.to_string(),
            reason: e.to_string(),
        };

        let mut builder = self.client.request(to_reqwest(method), self.url(path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        debug!(%method, path, "backend request");
        let response = builder.send().await.map_err(request_error)?;
        let status = response.status();
        let text = response.text().await.map_err(request_error)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(parse_body(text))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Collapses repeated slashes that do not follow a `:` and strips trailing
/// slashes.
///
/// `https://host//emil/` becomes `https://host/emil`.
pub fn normalize_api_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for ch in url.chars() {
        if ch == '/' && out.ends_with('/') && !out.ends_with(":/") {
            continue;
        }
        out.push(ch);
    }
    out.trim_end_matches('/').to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
