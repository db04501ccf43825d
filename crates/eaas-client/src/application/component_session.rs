//! Handle to one remote emulated machine.
//!
//! A `ComponentSession` is created in one of two ways:
//!
//! - [`ComponentSession::create`] realizes a [`ComponentRequest`] on the
//!   backend.  The result is *ephemeral*: this client owns it and must stop
//!   it on teardown.
//! - [`ComponentSession::load`] wraps a component that already runs inside a
//!   backend session.  The result is *non-ephemeral*: the client may release
//!   its local handle but never stops it.
//!
//! The ephemeral flag is fixed at construction.  The owning network is
//! recorded only as its [`SessionId`], never as a pointer back to the
//! network object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use eaas_core::{
    protocol::messages::{ComponentCreated, ControlUrls, EmulatorStateResponse, StopResponse},
    ComponentId, ComponentRequest, EmulatorState, NetworkComponentRequest, SessionId,
    SnapshotRequest, ViewerConfig,
};
use serde_json::Value;
use tracing::{debug, info};

use super::error::ClientError;
use super::transport::{call, send, Method, Transport};
use super::viewport::ViewAttachment;

pub struct ComponentSession {
    transport: Arc<dyn Transport>,
    component_id: ComponentId,
    environment_id: Option<String>,
    ephemeral: bool,
    request: Option<ComponentRequest>,
    network_id: Mutex<Option<SessionId>>,
    released: AtomicBool,
}

impl ComponentSession {
    /// Starts a new component on the backend from `request`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the backend refuses the request, or
    /// [`ClientError::Decode`] if it answers without a component id.
    pub async fn create(
        transport: Arc<dyn Transport>,
        request: ComponentRequest,
    ) -> Result<Self, ClientError> {
        let created: ComponentCreated =
            call(transport.as_ref(), Method::Post, "/components", Some(request.build())).await?;
        info!(component_id = %created.id, "component created");
        Ok(Self {
            transport,
            component_id: created.id,
            environment_id: Some(request.kind().environment_id().to_string()),
            ephemeral: true,
            request: Some(request),
            network_id: Mutex::new(None),
            released: AtomicBool::new(false),
        })
    }

    /// Wraps a component that already runs on the backend.
    pub fn load(
        transport: Arc<dyn Transport>,
        component_id: ComponentId,
        environment_id: Option<String>,
    ) -> Self {
        Self {
            transport,
            component_id,
            environment_id,
            ephemeral: false,
            request: None,
            network_id: Mutex::new(None),
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn environment_id(&self) -> Option<&str> {
        self.environment_id.as_deref()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// The request this session was created from, if it was created here.
    pub fn request(&self) -> Option<&ComponentRequest> {
        self.request.as_ref()
    }

    /// Network settings from the originating request.
    pub fn network_request(&self) -> Option<&NetworkComponentRequest> {
        self.request.as_ref().and_then(ComponentRequest::network_config)
    }

    pub fn network_id(&self) -> Option<SessionId> {
        self.network_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_network_id(&self, network_id: Option<SessionId>) {
        *self.network_id.lock().unwrap_or_else(PoisonError::into_inner) = network_id;
    }

    // ── Backend calls ─────────────────────────────────────────────────────────

    /// Asks the backend for the emulator state.
    ///
    /// Returns `Ok(None)` when the backend has no answer yet (empty body or
    /// empty state string).
    pub async fn emulator_state(&self) -> Result<Option<EmulatorState>, ClientError> {
        let path = format!("/components/{}/state", self.component_id);
        let value = self.transport.request(Method::Get, &path, None).await?;
        if value.is_null() {
            return Ok(None);
        }
        let response: EmulatorStateResponse =
            serde_json::from_value(value).map_err(|source| ClientError::Decode { path, source })?;
        if response.state.is_empty() {
            return Ok(None);
        }
        Ok(Some(EmulatorState::from(response.state.as_str())))
    }

    pub async fn keepalive(&self) -> Result<(), ClientError> {
        let path = format!("/components/{}/keepalive", self.component_id);
        send(self.transport.as_ref(), Method::Post, &path, None).await
    }

    /// Stops the emulator and returns the backend's teardown URL, if any.
    pub async fn stop(&self) -> Result<Option<String>, ClientError> {
        let path = format!("/components/{}/stop", self.component_id);
        let value = self.transport.request(Method::Get, &path, None).await?;
        if value.is_null() {
            return Ok(None);
        }
        let response: StopResponse =
            serde_json::from_value(value).map_err(|source| ClientError::Decode { path, source })?;
        info!(component_id = %self.component_id, "component stopped");
        Ok(response.url)
    }

    pub async fn control_urls(&self) -> Result<ControlUrls, ClientError> {
        let path = format!("/components/{}/controlurls", self.component_id);
        call(self.transport.as_ref(), Method::Get, &path, None).await
    }

    /// Everything the display container needs to show this component.
    pub async fn view_attachment(&self, viewer: &ViewerConfig) -> Result<ViewAttachment, ClientError> {
        Ok(ViewAttachment {
            component_id: self.component_id.clone(),
            control_urls: self.control_urls().await?,
            viewer: viewer.clone(),
        })
    }

    /// Asks the backend to snapshot this component.
    pub async fn checkpoint(&self, request: &SnapshotRequest) -> Result<Value, ClientError> {
        let path = format!("/components/{}/snapshot", self.component_id);
        let body = serde_json::to_value(request).map_err(|source| ClientError::Encode {
            path: path.clone(),
            source,
        })?;
        info!(component_id = %self.component_id, kind = ?request.kind, "checkpointing component");
        call(self.transport.as_ref(), Method::Post, &path, Some(body)).await
    }

    /// Releases the local handle.
    ///
    /// Ephemeral components are also deleted on the backend.  Calling this
    /// more than once is a no-op.
    pub async fn release(&self) -> Result<(), ClientError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_network_id(None);
        if !self.ephemeral {
            debug!(component_id = %self.component_id, "released background component locally");
            return Ok(());
        }
        let path = format!("/components/{}", self.component_id);
        send(self.transport.as_ref(), Method::Delete, &path, None).await?;
        debug!(component_id = %self.component_id, "released ephemeral component");
        Ok(())
    }
}

impl std::fmt::Debug for ComponentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSession")
            .field("component_id", &self.component_id)
            .field("environment_id", &self.environment_id)
            .field("ephemeral", &self.ephemeral)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
