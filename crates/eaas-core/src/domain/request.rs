//! Component requests, client options and viewer settings.
//!
//! A [`ComponentRequest`] describes a component that does not exist yet: the
//! client turns it into a live component session by POSTing
//! [`ComponentRequest::build`] to the backend.  The request also remembers
//! per-component choices that only matter on the client side, such as
//! whether the component is *interactive* (should become the default view)
//! and its optional network settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::network::{NetworkComponentRequest, NetworkConfig};

// ── Keyboard ──────────────────────────────────────────────────────────────────

/// Keyboard layout preference injected into every component request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardPrefs {
    /// Language/layout name, e.g. `"us"` or `"de"`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Keyboard model, e.g. `"pc105"`.
    #[serde(default = "default_layout")]
    pub layout: String,
}

impl Default for KeyboardPrefs {
    fn default() -> Self {
        Self {
            language: default_language(),
            layout: default_layout(),
        }
    }
}

fn default_language() -> String {
    "us".to_string()
}
fn default_layout() -> String {
    "pc105".to_string()
}

// ── Component request ─────────────────────────────────────────────────────────

/// What kind of component the backend should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// An emulated machine booted from an environment.
    Machine { environment_id: String },
    /// A container-based component.
    Container { environment_id: String },
}

impl ComponentKind {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Machine { .. } => "machine",
            Self::Container { .. } => "container",
        }
    }

    /// The environment the component boots from.
    pub fn environment_id(&self) -> &str {
        match self {
            Self::Machine { environment_id } | Self::Container { environment_id } => {
                environment_id
            }
        }
    }
}

/// A not-yet-realized component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRequest {
    kind: ComponentKind,
    interactive: bool,
    keyboard: Option<KeyboardPrefs>,
    network: Option<NetworkComponentRequest>,
    extra: Map<String, Value>,
}

impl ComponentRequest {
    /// Request for a machine booted from `environment_id`.
    pub fn machine(environment_id: impl Into<String>) -> Self {
        Self::new(ComponentKind::Machine {
            environment_id: environment_id.into(),
        })
    }

    /// Request for a container component.
    pub fn container(environment_id: impl Into<String>) -> Self {
        Self::new(ComponentKind::Container {
            environment_id: environment_id.into(),
        })
    }

    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            interactive: false,
            keyboard: None,
            network: None,
            extra: Map::new(),
        }
    }

    /// Marks the component as the one the user interacts with.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Joins the component to the client's network with these settings.
    pub fn with_network(mut self, network: NetworkComponentRequest) -> Self {
        self.network = Some(network);
        self
    }

    /// Adds a backend-specific field (e.g. `object`, `archive`, `emulatorVersion`).
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn set_keyboard(&mut self, prefs: &KeyboardPrefs) {
        self.keyboard = Some(prefs.clone());
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn keyboard(&self) -> Option<&KeyboardPrefs> {
        self.keyboard.as_ref()
    }

    /// The component's network settings, if it opted into networking.
    pub fn network_config(&self) -> Option<&NetworkComponentRequest> {
        self.network.as_ref()
    }

    /// Builds the JSON body for `POST /components`.
    pub fn build(&self) -> Value {
        let mut body = self.extra.clone();
        body.insert("type".into(), Value::from(self.kind.type_name()));
        body.insert("environment".into(), Value::from(self.kind.environment_id()));
        if let Some(kb) = &self.keyboard {
            body.insert("keyboardLayout".into(), Value::from(kb.language.as_str()));
            body.insert("keyboardModel".into(), Value::from(kb.layout.as_str()));
        }
        Value::Object(body)
    }
}

// ── Viewer ────────────────────────────────────────────────────────────────────

/// Display settings passed to the viewer when connecting a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    pub xpra_width: u32,
    pub xpra_height: u32,
    #[serde(rename = "xpraDPI")]
    pub xpra_dpi: u32,
    pub xpra_encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_cursor: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            xpra_width: 640,
            xpra_height: 480,
            xpra_dpi: 96,
            xpra_encoding: "jpeg".to_string(),
            ghost_cursor: None,
        }
    }
}

// ── Client options ────────────────────────────────────────────────────────────

/// Options for starting an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Template for the network; `None` disables networking.
    pub network: Option<NetworkConfig>,
    pub xpra_encoding: String,
    pub ghost_cursor: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            network: None,
            xpra_encoding: "jpeg".to_string(),
            ghost_cursor: None,
        }
    }
}

impl ClientOptions {
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn is_network_enabled(&self) -> bool {
        self.network.is_some()
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

/// Kind of checkpoint the backend should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotKind {
    NewEnvironment,
    SaveRevision,
    ObjectEnvironment,
    SaveImport,
}

/// Body of `POST /components/{id}/snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub env_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_relative_mouse: bool,
    #[serde(default)]
    pub clean_removable_drives: bool,
}

impl SnapshotRequest {
    pub fn new(kind: SnapshotKind, env_id: impl Into<String>) -> Self {
        Self {
            kind,
            env_id: env_id.into(),
            title: None,
            message: None,
            object_id: None,
            archive_id: None,
            user_id: None,
            is_relative_mouse: false,
            clean_removable_drives: false,
        }
    }
}
