//! Polling asynchronous backend jobs to completion.
//!
//! Slow backend operations (image imports, container builds, emulator
//! imports) answer with `{ "taskId": ... }` right away and keep working in
//! the background.  [`TaskPoller::wait`] asks `GET /tasks/{taskId}` on a
//! fixed interval until the task is done, then unwraps its result:
//!
//! | backend answer                         | result                      |
//! |----------------------------------------|-----------------------------|
//! | `isDone` and status `"1"`/`"FAILED"`   | `Err(TaskFailed)`           |
//! | `isDone` with `object` (a JSON string) | `Ok(TaskOutput::Object)`    |
//! | `isDone` with `userData`               | `Ok(TaskOutput::UserData)`  |
//! | `isDone` with neither                  | `Ok(TaskOutput::Empty)`     |
//! | not done after `max_attempts` polls    | `Err(TaskTimedOut)`         |

use std::sync::Arc;
use std::time::Duration;

use eaas_core::protocol::messages::{TaskCreated, TaskInfo};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::error::ClientError;
use super::transport::{call, Method, Transport};

pub const DEFAULT_TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TASK_MAX_ATTEMPTS: u32 = 600;

/// Result payload of a finished task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// The decoded `object` string.
    Object(Value),
    /// The raw `userData` value.
    UserData(Value),
    Empty,
}

impl TaskOutput {
    /// Decodes the payload (object or user data) into `T`.
    ///
    /// `path` names the submitting endpoint in decode errors.
    pub fn decode<T: DeserializeOwned>(self, path: &str) -> Result<T, ClientError> {
        let value = match self {
            Self::Object(v) | Self::UserData(v) => v,
            Self::Empty => Value::Null,
        };
        serde_json::from_value(value).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

/// Waits for backend tasks.
#[derive(Clone)]
pub struct TaskPoller {
    transport: Arc<dyn Transport>,
    interval: Duration,
    max_attempts: u32,
}

impl TaskPoller {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            interval: DEFAULT_TASK_POLL_INTERVAL,
            max_attempts: DEFAULT_TASK_MAX_ATTEMPTS,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// POSTs `body` to `path`, which must answer with a task id, and waits
    /// for that task.
    pub async fn submit(&self, path: &str, body: Value) -> Result<TaskOutput, ClientError> {
        let created: TaskCreated =
            call(self.transport.as_ref(), Method::Post, path, Some(body)).await?;
        info!(task_id = %created.task_id, path, "task submitted");
        self.wait(&created.task_id).await
    }

    /// Polls `task_id` until it finishes.
    ///
    /// # Errors
    ///
    /// - [`ClientError::TaskFailed`] if the backend reports failure.
    /// - [`ClientError::TaskTimedOut`] if the task is still running after
    ///   `max_attempts` polls.
    /// - Any transport or decode error of a poll request.
    pub async fn wait(&self, task_id: &str) -> Result<TaskOutput, ClientError> {
        let path = format!("/tasks/{task_id}");
        for attempt in 1..=self.max_attempts {
            let info: TaskInfo = call(self.transport.as_ref(), Method::Get, &path, None).await?;
            if info.is_done {
                return finish(task_id, info);
            }
            debug!(task_id, attempt, status = ?info.status, "task still running");
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        Err(ClientError::TaskTimedOut {
            task_id: task_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

fn finish(task_id: &str, info: TaskInfo) -> Result<TaskOutput, ClientError> {
    if info.is_failed() {
        return Err(ClientError::TaskFailed {
            task_id: task_id.to_string(),
            message: info.message.unwrap_or_default(),
        });
    }
    info!(task_id, "task finished");
    if let Some(object) = info.object {
        let value = serde_json::from_str(&object).map_err(|source| ClientError::Decode {
            path: format!("/tasks/{task_id}"),
            source,
        })?;
        return Ok(TaskOutput::Object(value));
    }
    Ok(info.user_data.map_or(TaskOutput::Empty, TaskOutput::UserData))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport_mock::MockTransport;
    use serde_json::json;

    fn poller(t: &Arc<MockTransport>) -> TaskPoller {
        TaskPoller::new(t.clone()).with_interval(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_polls_until_done_and_decodes_object() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        t.respond_once(Method::Get, "/tasks/7", json!({ "isDone": false }));
        t.respond_once(Method::Get, "/tasks/7", json!({ "isDone": false }));
        t.respond(
            Method::Get,
            "/tasks/7",
            json!({ "isDone": true, "status": "0", "object": "{\"imageId\":\"img-1\"}" }),
        );

        // Act
        let output = poller(&t).wait("7").await.unwrap();

        // Assert
        assert_eq!(output, TaskOutput::Object(json!({ "imageId": "img-1" })));
        assert_eq!(t.count(Method::Get, "/tasks/7"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_does_not_sleep_after_last_attempt() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        t.respond(Method::Get, "/tasks/7", json!({ "isDone": false }));
        let started = tokio::time::Instant::now();

        // Act
        let result = TaskPoller::new(t.clone())
            .with_interval(Duration::from_secs(30))
            .with_max_attempts(2)
            .wait("7")
            .await;

        // Assert – one pause between the two polls, none after the second
        assert!(matches!(result, Err(ClientError::TaskTimedOut { attempts: 2, .. })));
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_user_data_when_no_object() {
        let t = Arc::new(MockTransport::new());
        t.respond(
            Method::Get,
            "/tasks/7",
            json!({ "isDone": true, "userData": { "environmentId": "e-1" } }),
        );

        let output = poller(&t).wait("7").await.unwrap();

        assert_eq!(output, TaskOutput::UserData(json!({ "environmentId": "e-1" })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_rejects_failed_task_with_backend_message() {
        let t = Arc::new(MockTransport::new());
        t.respond(
            Method::Get,
            "/tasks/7",
            json!({ "isDone": true, "status": "1", "message": "disk full" }),
        );

        let err = poller(&t).wait("7").await.unwrap_err();

        match err {
            ClientError::TaskFailed { task_id, message } => {
                assert_eq!(task_id, "7");
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_gives_up_after_max_attempts() {
        let t = Arc::new(MockTransport::new());
        t.respond(Method::Get, "/tasks/7", json!({ "isDone": false }));

        let err = poller(&t).with_max_attempts(3).wait("7").await.unwrap_err();

        assert!(matches!(err, ClientError::TaskTimedOut { attempts: 3, .. }));
        assert_eq!(t.count(Method::Get, "/tasks/7"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_posts_body_then_waits_for_returned_task() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        t.respond(Method::Post, "/jobs", json!({ "taskId": "42" }));
        t.respond(Method::Get, "/tasks/42", json!({ "isDone": true }));

        // Act
        let output = poller(&t).submit("/jobs", json!({ "x": 1 })).await.unwrap();

        // Assert
        assert_eq!(output, TaskOutput::Empty);
        assert_eq!(t.requests(), vec!["POST /jobs", "GET /tasks/42"]);
    }

    #[test]
    fn test_decode_reads_object_payload() {
        #[derive(serde::Deserialize)]
        struct Built {
            #[serde(rename = "containerUrl")]
            container_url: String,
        }

        let built: Built = TaskOutput::Object(json!({ "containerUrl": "u" }))
            .decode("/jobs")
            .unwrap();

        assert_eq!(built.container_url, "u");
    }
}
