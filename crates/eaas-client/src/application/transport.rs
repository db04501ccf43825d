//! The transport seam: an authenticated JSON request to the backend.
//!
//! The application layer never builds HTTP requests itself.  It calls a
//! [`Transport`] with a method, an API-relative path and an optional JSON
//! body, and gets the parsed JSON response back (or an error for any
//! non-success status).  The reqwest implementation lives in
//! `infrastructure::http`; tests use `infrastructure::transport_mock`.
//!
//! Transport failures are never retried here.  A retry policy, if one is
//! wanted, belongs in a `Transport` wrapper.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::error::ClientError;

/// HTTP methods used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        })
    }
}

/// Error type for transport operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The backend answered with a non-success status.
    #[error("{method} {path} failed with status {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },
    /// The request could not be sent or the response could not be read.
    #[error("{method} {path} failed: {reason}")]
    Request {
        method: Method,
        path: String,
        reason: String,
    },
}

/// An authenticated request function against the backend API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` to `path` (relative to the API base URL).
    ///
    /// Returns `Value::Null` for empty response bodies.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError>;

    /// The normalized API base URL, used to resolve relative URLs the
    /// backend hands out.
    fn base_url(&self) -> &str;
}

/// Sends a request and decodes the response into `T`.
pub(crate) async fn call<T: DeserializeOwned>(
    transport: &dyn Transport,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<T, ClientError> {
    let value = transport.request(method, path, body).await?;
    serde_json::from_value(value).map_err(|source| ClientError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Sends a request whose response body is irrelevant.
pub(crate) async fn send(
    transport: &dyn Transport,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<(), ClientError> {
    transport.request(method, path, body).await?;
    Ok(())
}
