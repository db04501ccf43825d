//! Error type for client orchestration.
//!
//! Three kinds of failure reach callers:
//!
//! - transport failures (`Transport`), propagated unchanged;
//! - domain errors raised by the client itself (`NoSessions`,
//!   `NoActiveView`, `SessionNotFound`, `NoNetwork`);
//! - wrapped failures that keep their cause reachable through
//!   `std::error::Error::source` (`StartFailed`, `UpdateNetworkFailed`).
//!
//! Emulators that stop or fail while the client is running are *not* errors;
//! they are reported as `ClientEvent::Error` events.

use eaas_core::ComponentId;
use thiserror::Error;

use super::transport::TransportError;
use super::viewport::ViewportError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode request for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no sessions available")]
    NoSessions,

    #[error("no active view possible")]
    NoActiveView,

    #[error("session not found: {0}")]
    SessionNotFound(ComponentId),

    #[error("no network session available")]
    NoNetwork,

    #[error("viewer error: {0}")]
    Viewer(#[from] ViewportError),

    #[error("Starting environment session failed")]
    StartFailed(#[source] Box<ClientError>),

    #[error("update network failed")]
    UpdateNetworkFailed(#[source] Box<ClientError>),

    #[error("task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("task {task_id} did not finish after {attempts} polls")]
    TaskTimedOut { task_id: String, attempts: u32 },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_start_failed_exposes_underlying_cause() {
        // Arrange
        let err = ClientError::StartFailed(Box::new(ClientError::NoSessions));

        // Act
        let source = err.source().map(|s| s.to_string());

        // Assert
        assert_eq!(err.to_string(), "Starting environment session failed");
        assert_eq!(source.as_deref(), Some("no sessions available"));
    }
}
