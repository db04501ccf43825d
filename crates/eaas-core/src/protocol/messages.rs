//! Request and response bodies of the backend REST API.
//!
//! # Endpoint map
//!
//! | Endpoint                                   | Request                | Response                  |
//! |--------------------------------------------|------------------------|---------------------------|
//! | `POST /components`                         | component request JSON | [`ComponentCreated`]      |
//! | `GET /components/{id}/state`               | –                      | [`EmulatorStateResponse`] |
//! | `GET /components/{id}/stop`                | –                      | [`StopResponse`]          |
//! | `GET /components/{id}/controlurls`         | –                      | [`ControlUrls`]           |
//! | `GET /sessions/{id}`                       | –                      | [`SessionDescriptor`]     |
//! | `POST /sessions/{id}/detach`               | [`DetachRequest`]      | –                         |
//! | `POST /networks`                           | `NetworkConfig`        | [`NetworkCreated`]        |
//! | `POST /networks/{id}/components`           | [`AddComponentRequest`]| –                         |
//! | `GET /networks/{id}/wsConnection`          | –                      | [`WsConnectionResponse`]  |
//! | `GET /network-environments/{id}`           | –                      | [`NetworkEnvironment`]    |
//! | any task-returning endpoint                | endpoint-specific      | [`TaskCreated`]           |
//! | `GET /tasks/{taskId}`                      | –                      | [`TaskInfo`]              |
//! | `POST /environment-repository/environments`| environment template   | [`EnvironmentCreated`]    |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::ids::{ComponentId, SessionId};
use crate::domain::network::NetworkConfig;

/// Component type name of emulated machines in a session descriptor.
pub const MACHINE_COMPONENT_TYPE: &str = "machine";

// ── Components ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCreated {
    pub id: ComponentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorStateResponse {
    pub state: String,
}

/// Result of stopping a component.  `url` points at the produced artifacts
/// (or a teardown/redirect page) when the backend has one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {
    #[serde(default)]
    pub url: Option<String>,
}

/// Protocol name (e.g. `"xpra"`, `"webrtc"`) → connection URL.
pub type ControlUrls = BTreeMap<String, String>;

// ── Sessions ──────────────────────────────────────────────────────────────────

/// Descriptor of a pre-existing backend session, used to re-attach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    #[serde(default)]
    pub components: Vec<SessionComponent>,
    #[serde(default)]
    pub network: Option<NetworkConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionComponent {
    pub component_id: ComponentId,
    #[serde(default)]
    pub environment_id: Option<String>,
    /// Empty when the backend omits `type`; such components are not machines.
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl SessionComponent {
    pub fn is_machine(&self) -> bool {
        self.kind == MACHINE_COMPONENT_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachRequest {
    pub lifetime: u32,
    pub lifetime_unit: String,
    #[serde(rename = "sessionName")]
    pub session_name: String,
}

impl DetachRequest {
    pub fn minutes(session_name: impl Into<String>, minutes: u32) -> Self {
        Self {
            lifetime: minutes,
            lifetime_unit: "minutes".to_string(),
            session_name: session_name.into(),
        }
    }
}

// ── Networks ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCreated {
    pub id: SessionId,
    #[serde(default)]
    pub network_urls: Option<NetworkUrls>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkUrls {
    #[serde(default)]
    pub tcp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddComponentRequest {
    pub component_id: ComponentId,
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsConnectionResponse {
    pub ws_connection: String,
}

/// Stored network environment: which emulation environments make up a network.
///
/// Only `emilEnvironments[].envId` is interpreted; every other field is kept
/// verbatim so the descriptor can be written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEnvironment {
    #[serde(default)]
    pub emil_environments: Vec<NetworkEnvironmentMember>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEnvironmentMember {
    pub env_id: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl NetworkEnvironment {
    /// Points every member referencing `old_env_id` at `new_env_id`.
    ///
    /// Returns the number of rewritten members.
    pub fn replace_environment(&mut self, old_env_id: &str, new_env_id: &str) -> usize {
        let mut replaced = 0;
        for member in &mut self.emil_environments {
            if member.env_id == old_env_id {
                member.env_id = new_env_id.to_string();
                replaced += 1;
            }
        }
        replaced
    }
}

// ── Provisioning ──────────────────────────────────────────────────────────────

/// Task result of `/EmilContainerData/buildContainerImage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltContainerImage {
    pub container_url: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Task result of `/environment-repository/actions/import-image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedImage {
    pub image_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCreated {
    pub id: String,
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
}

/// Status codes the backend uses for failed tasks.
const TASK_FAILED_STATUSES: [&str; 2] = ["1", "FAILED"];

/// Poll result of `GET /tasks/{taskId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Result serialized as a JSON *string*.
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub user_data: Option<Value>,
}

impl TaskInfo {
    pub fn is_failed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| TASK_FAILED_STATUSES.contains(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_descriptor_parses_backend_shape() {
        // Arrange
        let raw = json!({
            "components": [
                {"componentId": "c-1", "environmentId": "env-1", "type": "machine"},
                {"componentId": "c-2", "type": "nodetcp"}
            ],
            "network": {"components": [{"componentId": "c-1", "networkLabel": "srv"}]}
        });

        // Act
        let desc: SessionDescriptor = serde_json::from_value(raw).unwrap();

        // Assert
        assert_eq!(desc.components.len(), 2);
        assert!(desc.components[0].is_machine());
        assert!(!desc.components[1].is_machine());
        assert_eq!(desc.network.unwrap().components[0].network_label, "srv");
    }

    #[test]
    fn test_detach_request_uses_backend_field_names() {
        let json = serde_json::to_value(DetachRequest::minutes("demo", 30)).unwrap();
        assert_eq!(json, json!({"lifetime": 30, "lifetime_unit": "minutes", "sessionName": "demo"}));
    }

    #[test]
    fn test_replace_environment_keeps_unknown_fields() {
        // Arrange
        let mut env: NetworkEnvironment = serde_json::from_value(json!({
            "networking": {"enableInternet": true},
            "emilEnvironments": [
                {"envId": "old", "label": "a"},
                {"envId": "other"}
            ]
        }))
        .unwrap();

        // Act
        let replaced = env.replace_environment("old", "new");
        let back = serde_json::to_value(&env).unwrap();

        // Assert
        assert_eq!(replaced, 1);
        assert_eq!(back["emilEnvironments"][0]["envId"], "new");
        assert_eq!(back["emilEnvironments"][0]["label"], "a");
        assert_eq!(back["networking"]["enableInternet"], true);
    }

    #[test]
    fn test_task_info_failed_status() {
        let failed: TaskInfo =
            serde_json::from_value(json!({"isDone": true, "status": "1", "message": "boom"})).unwrap();
        let ok: TaskInfo = serde_json::from_value(json!({"isDone": true, "status": "0"})).unwrap();

        assert!(failed.is_failed());
        assert!(!ok.is_failed());
    }
}
