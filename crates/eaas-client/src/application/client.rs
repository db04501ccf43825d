//! The client orchestrator.
//!
//! [`Client`] owns every component session it started or attached to, at
//! most one [`NetworkSession`], the single *active view* bound to a display
//! container, and the background poll job that watches emulator state.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!            start() / attach() / attach_new_env()
//!                           │
//!                           ▼
//!   ┌──────── sessions registered, poll job running ────────┐
//!   │  connect() ⇄ disconnect()   checkpoint()   stop()      │
//!   └───────────────────────────┬───────────────────────────┘
//!                               │ release(all)
//!                               ▼
//!                  released (terminal, never undone)
//! ```
//!
//! # Ownership of remote resources
//!
//! Sessions this client created are *ephemeral*: `release(false)` stops and
//! deletes them.  Sessions loaded from an existing backend session are
//! *background* sessions: `release(false)` only drops the local handle, and
//! only `release(true)` stops them.
//!
//! # Shared state
//!
//! Everything the poll job needs lives in [`ClientShared`] behind an `Arc`.
//! The poll job clones a snapshot of the session list before talking to the
//! backend, so no lock is held across a backend call from the poll loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock as StdRwLock};
use std::time::Duration;

use eaas_core::{
    protocol::messages::SessionDescriptor, ClientOptions, ComponentId, ComponentRequest,
    KeyboardPrefs, SessionId, SnapshotRequest, StatePhase, ViewerConfig,
};
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::component_session::ComponentSession;
use super::error::ClientError;
use super::events::{ClientEvent, ErrorDetail, EventBus};
use super::network_session::NetworkSession;
use super::poll::{KeepaliveSchedule, PollJob, KEEPALIVE_INTERVAL, STATE_POLL_INTERVAL};
use super::transport::{call, Method, Transport};
use super::viewport::Viewport;

/// Network label given to components added by [`Client::attach_new_env`].
pub const TEMP_CLIENT_LABEL: &str = "Temp Client";

/// Callback invoked with the id of an emulator that reached a terminal state.
pub type StoppedCallback = Arc<dyn Fn(&ComponentId) + Send + Sync>;

// ── Settings and results ──────────────────────────────────────────────────────

/// Construction-time settings of a [`Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Keyboard preferences injected into every component request.
    pub keyboard: KeyboardPrefs,
    /// Initial viewer settings.
    pub viewer: ViewerConfig,
    pub state_poll_interval: Duration,
    pub keepalive_interval: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            keyboard: KeyboardPrefs::default(),
            viewer: ViewerConfig::default(),
            state_poll_interval: STATE_POLL_INTERVAL,
            keepalive_interval: KEEPALIVE_INTERVAL,
        }
    }
}

/// One entry of [`Client::get_sessions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: ComponentId,
    pub title: String,
}

/// One entry of [`Client::stop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopResult {
    pub id: ComponentId,
    /// Teardown URL returned by the backend, if any.
    pub result: Option<String>,
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct ClientShared {
    client_id: Uuid,
    transport: Arc<dyn Transport>,
    sessions: RwLock<Vec<Arc<ComponentSession>>>,
    network: RwLock<Option<Arc<NetworkSession>>>,
    keepalive: Mutex<KeepaliveSchedule>,
    events: EventBus<ClientEvent>,
    on_emulator_stopped: StdRwLock<Option<StoppedCallback>>,
}

impl ClientShared {
    /// One poll tick.
    async fn poll_state(&self) {
        let trigger_keepalive = self
            .keepalive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check(Instant::now());

        if trigger_keepalive {
            if let Some(network) = self.network.read().await.clone() {
                network.keepalive();
            }
        }

        // Background sessions are kept alive by the backend as part of the
        // network session.
        let sessions = self.sessions.read().await.clone();
        for session in sessions.iter().filter(|s| s.is_ephemeral()) {
            let state = match session.emulator_state().await {
                Ok(Some(state)) => state,
                Ok(None) => {
                    debug!(component_id = %session.id(), "no emulator state yet");
                    continue;
                }
                Err(e) => {
                    debug!(component_id = %session.id(), "emulator state unavailable: {e}");
                    continue;
                }
            };

            match state.phase() {
                StatePhase::Live => {
                    if trigger_keepalive {
                        self.keepalive_session(session).await;
                    }
                }
                StatePhase::Terminal => {
                    info!(
                        client_id = %self.client_id,
                        component_id = %session.id(),
                        state = state.as_str(),
                        "emulator reached terminal state"
                    );
                    let callback = self
                        .on_emulator_stopped
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    if let Some(callback) = callback {
                        callback(session.id());
                    }
                    self.keepalive_session(session).await;
                    self.events
                        .emit(ClientEvent::Error(ErrorDetail::State(state.as_str().to_string())));
                }
                StatePhase::Unexpected => {
                    warn!(component_id = %session.id(), state = state.as_str(), "unexpected emulator state");
                    self.events.emit(ClientEvent::Error(ErrorDetail::Session {
                        component_id: session.id().clone(),
                        state: state.as_str().to_string(),
                    }));
                }
            }
        }
    }

    async fn keepalive_session(&self, session: &ComponentSession) {
        if let Err(e) = session.keepalive().await {
            warn!(component_id = %session.id(), "keepalive failed: {e}");
        }
    }

    async fn find(&self, component_id: &ComponentId) -> Option<Arc<ComponentSession>> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.id() == component_id)
            .cloned()
    }

    /// Adds `session` unless a session with the same id is already tracked.
    async fn register(&self, session: Arc<ComponentSession>) {
        let mut sessions = self.sessions.write().await;
        if !sessions.iter().any(|s| s.id() == session.id()) {
            sessions.push(session);
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

struct ActiveView {
    component_id: ComponentId,
    container: Arc<dyn Viewport>,
}

/// Orchestrates component sessions, the network and the active view.
pub struct Client {
    shared: Arc<ClientShared>,
    emulator_container: Arc<dyn Viewport>,
    keyboard: KeyboardPrefs,
    state_poll_interval: Duration,
    viewer: Mutex<ViewerConfig>,
    active: tokio::sync::Mutex<Option<ActiveView>>,
    default_view: Mutex<Option<ComponentId>>,
    is_connected: AtomicBool,
    is_released: AtomicBool,
    poll_job: Mutex<Option<PollJob>>,
}

impl Client {
    /// Creates a client talking through `transport`.
    ///
    /// `emulator_container` is the display container used by [`connect`]
    /// when the caller does not pass one.
    ///
    /// [`connect`]: Client::connect
    pub fn new(
        transport: Arc<dyn Transport>,
        emulator_container: Arc<dyn Viewport>,
        settings: ClientSettings,
    ) -> Self {
        let shared = Arc::new(ClientShared {
            client_id: Uuid::new_v4(),
            transport,
            sessions: RwLock::new(Vec::new()),
            network: RwLock::new(None),
            keepalive: Mutex::new(KeepaliveSchedule::new(settings.keepalive_interval)),
            events: EventBus::default(),
            on_emulator_stopped: StdRwLock::new(None),
        });
        Self {
            shared,
            emulator_container,
            keyboard: settings.keyboard,
            state_poll_interval: settings.state_poll_interval,
            viewer: Mutex::new(settings.viewer),
            active: tokio::sync::Mutex::new(None),
            default_view: Mutex::new(None),
            is_connected: AtomicBool::new(false),
            is_released: AtomicBool::new(false),
            poll_job: Mutex::new(None),
        }
    }

    // ── Starting and attaching ────────────────────────────────────────────────

    /// Starts one component per request, optionally joined into a network.
    ///
    /// All creation requests are in flight at the same time.  The first
    /// interactive request becomes the default view.
    ///
    /// # Errors
    ///
    /// Any failure releases everything (as `release(true)`) and is returned
    /// wrapped in [`ClientError::StartFailed`].
    pub async fn start(
        &self,
        components: Vec<ComponentRequest>,
        options: Option<ClientOptions>,
    ) -> Result<(), ClientError> {
        if let Some(options) = &options {
            info!(encoding = %options.xpra_encoding, "setting xpra encoding");
            let mut viewer = self.lock_viewer();
            viewer.xpra_encoding = options.xpra_encoding.clone();
            viewer.ghost_cursor = options.ghost_cursor.clone();
        }

        match self.realize(components, options.as_ref()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(client_id = %self.shared.client_id, "starting environment session failed: {e}");
                self.release(true).await;
                Err(ClientError::StartFailed(Box::new(e)))
            }
        }
    }

    async fn realize(
        &self,
        components: Vec<ComponentRequest>,
        options: Option<&ClientOptions>,
    ) -> Result<(), ClientError> {
        info!(client_id = %self.shared.client_id, count = components.len(), "starting components");
        let pending = components.into_iter().map(|mut request| {
            request.set_keyboard(&self.keyboard);
            let transport = Arc::clone(&self.shared.transport);
            async move {
                let interactive = request.is_interactive();
                ComponentSession::create(transport, request)
                    .await
                    .map(|session| (Arc::new(session), interactive))
            }
        });

        self.start_polling();
        let results = join_all(pending).await;

        let mut first_error = None;
        let mut default_view = None;
        for result in results {
            match result {
                Ok((session, interactive)) => {
                    if interactive && default_view.is_none() {
                        default_view = Some(session.id().clone());
                    }
                    self.shared.register(session).await;
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if default_view.is_some() {
            *self.lock_default_view() = default_view;
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if let Some(template) = options.and_then(|o| o.network.as_ref()) {
            info!(client_id = %self.shared.client_id, "starting network");
            let network = Arc::new(NetworkSession::new(Arc::clone(&self.shared.transport)));
            let sessions = self.sessions().await;
            network.start_network(&sessions, template).await?;
            *self.shared.network.write().await = Some(network);
        }
        Ok(())
    }

    /// Binds to an existing backend session and connects a view to it.
    ///
    /// `component_id` selects the view; without it the default or first
    /// session is shown.
    pub async fn attach(
        &self,
        session_id: &SessionId,
        container: Option<Arc<dyn Viewport>>,
        component_id: Option<&ComponentId>,
    ) -> Result<(), ClientError> {
        let descriptor = self.fetch_session(session_id).await?;
        self.load(session_id, &descriptor).await;

        let view = match component_id {
            Some(id) => Some(self.get_session(id).await?.id().clone()),
            None => None,
        };
        self.start_polling();

        info!(client_id = %self.shared.client_id, session_id = %session_id, "attaching to session");
        self.connect(container, view).await
    }

    /// Binds to an existing backend session, starts one more component in
    /// it and connects a view to the new component.
    pub async fn attach_new_env(
        &self,
        session_id: &SessionId,
        container: Option<Arc<dyn Viewport>>,
        mut request: ComponentRequest,
    ) -> Result<(), ClientError> {
        let descriptor = self.fetch_session(session_id).await?;
        self.load(session_id, &descriptor).await;

        request.set_keyboard(&self.keyboard);
        let session = Arc::new(
            ComponentSession::create(Arc::clone(&self.shared.transport), request).await?,
        );
        // Tracked before joining the network so that release() tears it down
        // even when the join fails.
        self.shared.register(Arc::clone(&session)).await;
        self.start_polling();

        let network = self.network().await.ok_or(ClientError::NoNetwork)?;
        network
            .add_component(session.id(), session.is_ephemeral(), TEMP_CLIENT_LABEL)
            .await?;
        session.set_network_id(network.id());

        self.connect(container, Some(session.id().clone())).await
    }

    /// Re-creates local handles from a backend session descriptor.
    ///
    /// Machine components already tracked are skipped, so loading the same
    /// descriptor twice does not duplicate sessions.  The network is
    /// replaced by a background network bound to `session_id`.
    pub async fn load(&self, session_id: &SessionId, descriptor: &SessionDescriptor) {
        let transport = &self.shared.transport;
        let mut sessions = self.shared.sessions.write().await;
        for component in descriptor.components.iter().filter(|c| c.is_machine()) {
            if sessions.iter().any(|s| s.id() == &component.component_id) {
                continue;
            }
            sessions.push(Arc::new(ComponentSession::load(
                Arc::clone(transport),
                component.component_id.clone(),
                component.environment_id.clone(),
            )));
        }

        let network = Arc::new(NetworkSession::background(Arc::clone(transport)));
        network.load(session_id.clone(), &sessions, descriptor.network.clone());
        let count = sessions.len();
        drop(sessions);

        *self.shared.network.write().await = Some(network);
        debug!(session_id = %session_id, sessions = count, "session loaded");
    }

    async fn fetch_session(&self, session_id: &SessionId) -> Result<SessionDescriptor, ClientError> {
        let path = format!("/sessions/{session_id}");
        call(self.shared.transport.as_ref(), Method::Get, &path, None).await
    }

    // ── Viewing ───────────────────────────────────────────────────────────────

    /// Shows a session in a display container.
    ///
    /// Uses `container`, or the client's emulator container when `None`.
    /// The view is `view`, else the default view, else the first session.
    /// Any active view is disconnected first.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NoActiveView`] if there is no session to show.
    /// - [`ClientError::SessionNotFound`] if `view` is not a tracked session.
    /// - Transport or viewer errors while attaching.
    ///
    /// The previous view is disconnected before `view` is resolved, so it is
    /// left empty on every error.
    pub async fn connect(
        &self,
        container: Option<Arc<dyn Viewport>>,
        view: Option<ComponentId>,
    ) -> Result<(), ClientError> {
        let container = container.unwrap_or_else(|| Arc::clone(&self.emulator_container));
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            self.detach_view(previous);
        }
        let session = self
            .resolve_view(view)
            .await?
            .ok_or(ClientError::NoActiveView)?;

        info!(client_id = %self.shared.client_id, component_id = %session.id(), "connecting viewer");
        let viewer = self.viewer_config();
        let attached = match session.view_attachment(&viewer).await {
            Ok(attachment) => container.attach(&attachment).map_err(ClientError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = attached {
            error!(component_id = %session.id(), "connecting viewer failed: {e}");
            return Err(e);
        }

        *active = Some(ActiveView {
            component_id: session.id().clone(),
            container,
        });
        self.is_connected.store(true, Ordering::SeqCst);
        self.shared.events.emit(ClientEvent::ViewConnected {
            component_id: session.id().clone(),
        });
        Ok(())
    }

    async fn resolve_view(
        &self,
        view: Option<ComponentId>,
    ) -> Result<Option<Arc<ComponentSession>>, ClientError> {
        if let Some(id) = view {
            return match self.shared.find(&id).await {
                Some(session) => Ok(Some(session)),
                None => Err(ClientError::SessionNotFound(id)),
            };
        }
        let default_view = self.lock_default_view().clone();
        if let Some(session) = match default_view {
            Some(id) => self.shared.find(&id).await,
            None => None,
        } {
            return Ok(Some(session));
        }
        debug!("no view defined, using first session");
        Ok(self.shared.sessions.read().await.first().cloned())
    }

    fn detach_view(&self, view: ActiveView) {
        view.container.clear();
        view.container.detach(&view.component_id);
        self.is_connected.store(false, Ordering::SeqCst);
        info!(client_id = %self.shared.client_id, component_id = %view.component_id, "viewer disconnected");
        self.shared.events.emit(ClientEvent::ViewDisconnected {
            component_id: view.component_id,
        });
    }

    /// Detaches the active view.  Does nothing when nothing is connected.
    pub async fn disconnect(&self) {
        if let Some(view) = self.active.lock().await.take() {
            self.detach_view(view);
        }
    }

    /// The session currently shown, if any.
    pub async fn active_session(&self) -> Option<Arc<ComponentSession>> {
        let id = self.active.lock().await.as_ref()?.component_id.clone();
        self.shared.find(&id).await
    }

    // ── Session operations ────────────────────────────────────────────────────

    /// Keeps the network running on the backend for `minutes` under `name`,
    /// then disconnects locally.
    pub async fn detach(&self, name: &str, minutes: u32) -> Result<(), ClientError> {
        let network = self.network().await.ok_or(ClientError::NoNetwork)?;
        network.detach(name, minutes).await?;
        self.disconnect().await;
        Ok(())
    }

    /// Disconnects, then snapshots the session that was being shown.
    pub async fn checkpoint(&self, request: &SnapshotRequest) -> Result<Value, ClientError> {
        let session = self.active_session().await.ok_or(ClientError::NoActiveView)?;
        self.disconnect().await;
        session.checkpoint(request).await
    }

    /// Disconnects, then stops every session.  Does not release anything.
    pub async fn stop(&self) -> Result<Vec<StopResult>, ClientError> {
        self.disconnect().await;
        let sessions = self.sessions().await;
        let mut results = Vec::with_capacity(sessions.len());
        for session in sessions {
            let result = session.stop().await?;
            results.push(StopResult {
                id: session.id().clone(),
                result,
            });
        }
        Ok(results)
    }

    /// Tears everything down.  Only the first call does anything.
    ///
    /// Ephemeral sessions are stopped; background sessions are stopped only
    /// when `all` is set.  Every session is released locally and the network
    /// is released.  Failures of individual calls are logged and teardown
    /// continues.
    ///
    /// Returns the teardown URL of the last stopped session.
    pub async fn release(&self, all: bool) -> Option<String> {
        if self.is_released.swap(true, Ordering::SeqCst) {
            debug!(client_id = %self.shared.client_id, "client already released, skipping redundant call");
            return None;
        }

        self.disconnect().await;
        self.stop_polling();

        let what = if all { "all" } else { "ephemeral" };
        info!(client_id = %self.shared.client_id, "releasing {what} sessions");

        let sessions = std::mem::take(&mut *self.shared.sessions.write().await);
        let mut url = None;
        for session in &sessions {
            if all || session.is_ephemeral() {
                match session.stop().await {
                    Ok(result) => url = result,
                    Err(e) => warn!(component_id = %session.id(), "stopping session failed: {e}"),
                }
            }
            if let Err(e) = session.release().await {
                warn!(component_id = %session.id(), "releasing session failed: {e}");
            }
        }
        *self.lock_default_view() = None;

        let network = self.shared.network.write().await.take();
        if let Some(network) = network {
            if let Err(e) = network.release().await {
                warn!("releasing network failed: {e}");
            }
        }

        info!(client_id = %self.shared.client_id, "released {what} sessions");
        url
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Looks up a session of the network.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NoSessions`] if there is no network.
    /// - [`ClientError::SessionNotFound`] if the network has no such member.
    pub async fn get_session(&self, id: &ComponentId) -> Result<Arc<ComponentSession>, ClientError> {
        let network = self.network().await.ok_or(ClientError::NoSessions)?;
        if !network.contains(id) {
            return Err(ClientError::SessionNotFound(id.clone()));
        }
        self.shared
            .find(id)
            .await
            .ok_or_else(|| ClientError::SessionNotFound(id.clone()))
    }

    /// `{id, title}` of every network member that has a network label.
    pub async fn get_sessions(&self) -> Vec<SessionSummary> {
        let Some(network) = self.network().await else {
            return Vec::new();
        };
        network
            .component_ids()
            .iter()
            .filter_map(|id| network.get_network_config(id))
            .map(|config| SessionSummary {
                id: config.component_id,
                title: config.network_label,
            })
            .collect()
    }

    /// All tracked sessions in creation order.
    pub async fn sessions(&self) -> Vec<Arc<ComponentSession>> {
        self.shared.sessions.read().await.clone()
    }

    pub async fn network(&self) -> Option<Arc<NetworkSession>> {
        self.shared.network.read().await.clone()
    }

    pub fn default_view(&self) -> Option<ComponentId> {
        self.lock_default_view().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.is_released.load(Ordering::SeqCst)
    }

    pub fn is_polling(&self) -> bool {
        self.poll_job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn id(&self) -> Uuid {
        self.shared.client_id
    }

    // ── Viewer settings ───────────────────────────────────────────────────────

    pub fn viewer_config(&self) -> ViewerConfig {
        self.lock_viewer().clone()
    }

    /// Replaces the xpra settings and resets the ghost cursor.
    pub fn set_viewer_config(&self, width: u32, height: u32, dpi: u32, encoding: impl Into<String>) {
        *self.lock_viewer() = ViewerConfig {
            xpra_width: width,
            xpra_height: height,
            xpra_dpi: dpi,
            xpra_encoding: encoding.into(),
            ghost_cursor: None,
        };
    }

    // ── Events and polling ────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    /// Sets the callback invoked when an emulator stops or fails.
    pub fn set_on_emulator_stopped<F>(&self, callback: F)
    where
        F: Fn(&ComponentId) + Send + Sync + 'static,
    {
        *self
            .shared
            .on_emulator_stopped
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Runs one poll tick now.  The background job runs the same code.
    pub async fn poll_state(&self) {
        self.shared.poll_state().await;
    }

    fn start_polling(&self) {
        if self.is_released() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let job = PollJob::spawn(self.state_poll_interval, move || {
            let shared = Arc::clone(&shared);
            async move { shared.poll_state().await }
        });
        debug!(client_id = %self.shared.client_id, "starting client side keepalive");
        // Replacing a running job drops (and so cancels) the old one.
        self.poll_job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(job);
    }

    fn stop_polling(&self) {
        let job = self
            .poll_job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(job) = job {
            job.cancel();
        }
    }

    fn lock_viewer(&self) -> std::sync::MutexGuard<'_, ViewerConfig> {
        self.viewer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_default_view(&self) -> std::sync::MutexGuard<'_, Option<ComponentId>> {
        self.default_view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
