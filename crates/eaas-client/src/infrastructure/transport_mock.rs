//! Mock backend transport for unit and integration testing.
//!
//! # Why a mock transport?
//!
//! The real [`HttpTransport`](super::http::HttpTransport) talks to a live EaaS
//! backend, which:
//!
//! - Needs credentials and a reachable server.
//! - Starts real emulators (slow, and they cost resources).
//! - Cannot be told to fail on demand.
//!
//! `MockTransport` answers every request from an in-memory script and records
//! each call in a `Mutex<Vec<...>>`, so a test can assert exactly which
//! requests were sent and in what order.
//!
//! # Scripting responses
//!
//! ```ignore
//! let transport = Arc::new(MockTransport::new());
//! transport.respond_once(Method::Post, "/components", json!({ "id": "c-1" }));
//! transport.respond(Method::Get, "/components/c-1/state", json!({ "state": "RUNNING" }));
//! transport.fail(Method::Get, "/components/c-1/stop", 500);
//! ```
//!
//! One-shot responses are consumed first, in the order they were queued.
//! After that the persistent response (if any) answers every further call.
//! A route with no script at all answers `null`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::transport::{Method, Transport, TransportError};

type Route = (Method, String);
type Reply = Result<Value, TransportError>;

/// One request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// A scripted in-memory [`Transport`].
pub struct MockTransport {
    base_url: String,
    once: Mutex<HashMap<Route, VecDeque<Reply>>>,
    persistent: Mutex<HashMap<Route, Reply>>,
    /// Every request, in the order it was received.
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    /// Creates a mock whose base URL is `http://localhost/emil`.
    pub fn new() -> Self {
        Self::with_base_url("http://localhost/emil")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            once: Mutex::new(HashMap::new()),
            persistent: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call to `method path` with `value`.
    pub fn respond(&self, method: Method, path: &str, value: Value) {
        self.persistent
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Ok(value));
    }

    /// Answers the next call to `method path` with `value`.
    pub fn respond_once(&self, method: Method, path: &str, value: Value) {
        self.once
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Ok(value));
    }

    /// Makes every call to `method path` fail with HTTP `status`.
    pub fn fail(&self, method: Method, path: &str, status: u16) {
        let err = TransportError::Status {
            method,
            path: path.to_string(),
            status,
            body: "mock failure".to_string(),
        };
        self.persistent
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Err(err));
    }

    /// All recorded calls as `"METHOD /path"` strings.
    pub fn requests(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }

    /// Number of calls made to `method path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Body of the most recent call to `method path`.
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.method == method && c.path == path)
            .and_then(|c| c.body.clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body,
        });

        let route = (method, path.to_string());
        if let Some(reply) = self
            .once
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.persistent
            .lock()
            .unwrap()
            .get(&route)
            .cloned()
            .unwrap_or(Ok(Value::Null))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
