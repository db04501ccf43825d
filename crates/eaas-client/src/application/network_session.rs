//! The backend network that joins several component sessions.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//!   new() ──start_network()──► bound (ephemeral) ──release()──► DELETE /sessions/{id}
//!   background() ──load()────► bound (background) ──release()──► local only
//! ```
//!
//! A network is *bound* once it holds a backend session id.  Every
//! operation that talks to the backend needs that id; `keepalive`,
//! `release` and `ws_connection` quietly do nothing without it, the others
//! fail with [`ClientError::NoNetwork`].
//!
//! The network keeps only the ids of its member components.  The
//! `ComponentSession` objects themselves belong to the client, which
//! resolves ids through its own registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use eaas_core::{
    protocol::messages::{
        AddComponentRequest, DetachRequest, NetworkCreated, NetworkEnvironment,
        WsConnectionResponse,
    },
    ComponentId, NetworkComponentConfig, NetworkConfig, SessionId,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::component_session::ComponentSession;
use super::error::ClientError;
use super::events::{EventBus, NetworkEvent};
use super::transport::{call, send, Method, Transport};

#[derive(Debug, Default)]
struct NetworkState {
    session_id: Option<SessionId>,
    config: Option<NetworkConfig>,
    components: Vec<ComponentId>,
    tcp_info: Option<String>,
}

pub struct NetworkSession {
    transport: Arc<dyn Transport>,
    ephemeral: bool,
    state: Mutex<NetworkState>,
    events: EventBus<NetworkEvent>,
}

impl NetworkSession {
    /// An unbound network this client will create and own.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_ownership(transport, true)
    }

    /// An unbound handle for a network that already exists on the backend.
    pub fn background(transport: Arc<dyn Transport>) -> Self {
        Self::with_ownership(transport, false)
    }

    fn with_ownership(transport: Arc<dyn Transport>, ephemeral: bool) -> Self {
        Self {
            transport,
            ephemeral,
            state: Mutex::new(NetworkState::default()),
            events: EventBus::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bound_id(&self) -> Result<SessionId, ClientError> {
        self.state().session_id.clone().ok_or(ClientError::NoNetwork)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Creates the network on the backend from `template` plus the network
    /// settings of every session that asked for one.
    ///
    /// Sessions whose request carries no network settings are left out.
    pub async fn start_network(
        &self,
        sessions: &[Arc<ComponentSession>],
        template: &NetworkConfig,
    ) -> Result<(), ClientError> {
        let mut config = template.clone();
        let mut members = Vec::new();
        for session in sessions {
            let Some(request) = session.network_request() else {
                info!(component_id = %session.id(), "component has no network settings, not joining it");
                continue;
            };
            config.add_component(request.bind(session.id().clone()));
            members.push(Arc::clone(session));
        }

        let body = serde_json::to_value(&config).map_err(|source| ClientError::Encode {
            path: "/networks".to_string(),
            source,
        })?;
        let created: NetworkCreated =
            call(self.transport.as_ref(), Method::Post, "/networks", Some(body)).await?;
        info!(network_id = %created.id, members = members.len(), "network started");

        for session in &members {
            session.set_network_id(Some(created.id.clone()));
        }
        let mut state = self.state();
        state.components = members.iter().map(|s| s.id().clone()).collect();
        state.tcp_info = created.network_urls.and_then(|urls| urls.tcp);
        state.config = Some(config);
        state.session_id = Some(created.id);
        Ok(())
    }

    /// Binds to an existing backend session instead of creating one.
    pub fn load(
        &self,
        session_id: SessionId,
        sessions: &[Arc<ComponentSession>],
        config: Option<NetworkConfig>,
    ) {
        for session in sessions {
            session.set_network_id(Some(session_id.clone()));
        }
        let mut state = self.state();
        state.components = sessions.iter().map(|s| s.id().clone()).collect();
        state.config = config;
        state.session_id = Some(session_id);
    }

    /// Sends a keepalive without waiting for it.
    ///
    /// Returns `None` when the network is not bound.  A failed keepalive is
    /// logged and otherwise ignored.
    pub fn keepalive(&self) -> Option<JoinHandle<()>> {
        let session_id = self.state().session_id.clone()?;
        let transport = Arc::clone(&self.transport);
        Some(tokio::spawn(async move {
            let path = format!("/sessions/{session_id}/keepalive");
            if let Err(e) = transport.request(Method::Post, &path, None).await {
                warn!(network_id = %session_id, "network keepalive failed: {e}");
            }
        }))
    }

    /// Drops the backend session.
    ///
    /// Only ephemeral networks are deleted remotely.  The local binding is
    /// cleared either way.
    pub async fn release(&self) -> Result<(), ClientError> {
        let Some(session_id) = self.state().session_id.clone() else {
            return Ok(());
        };
        if self.ephemeral {
            let path = format!("/sessions/{session_id}");
            send(self.transport.as_ref(), Method::Delete, &path, None).await?;
            info!(network_id = %session_id, "released ephemeral network");
        } else {
            info!(network_id = %session_id, "skipped background network");
        }
        self.state().session_id = None;
        self.events.emit(NetworkEvent::Released { session_id });
        Ok(())
    }

    /// Asks the backend to keep the network running unattended.
    pub async fn detach(&self, name: &str, minutes: u32) -> Result<(), ClientError> {
        let session_id = self.bound_id()?;
        info!(network_id = %session_id, name, minutes, "detaching network session");
        let path = format!("/sessions/{session_id}/detach");
        let body = serde_json::to_value(DetachRequest::minutes(name, minutes)).map_err(|source| {
            ClientError::Encode {
                path: path.clone(),
                source,
            }
        })?;
        send(self.transport.as_ref(), Method::Post, &path, Some(body)).await?;
        self.events.emit(NetworkEvent::Detached { session_id });
        Ok(())
    }

    // ── Members ───────────────────────────────────────────────────────────────

    /// Joins an already running component to this network.
    pub async fn add_component(
        &self,
        component_id: &ComponentId,
        ephemeral: bool,
        label: &str,
    ) -> Result<(), ClientError> {
        let session_id = self.bound_id()?;
        let path = format!("/networks/{session_id}/components");
        let body = serde_json::to_value(AddComponentRequest {
            component_id: component_id.clone(),
            ephemeral,
        })
        .map_err(|source| ClientError::Encode {
            path: path.clone(),
            source,
        })?;
        send(self.transport.as_ref(), Method::Post, &path, Some(body)).await?;

        let mut state = self.state();
        if !state.components.contains(component_id) {
            state.components.push(component_id.clone());
        }
        state
            .config
            .get_or_insert_with(NetworkConfig::default)
            .add_component(NetworkComponentConfig {
                component_id: component_id.clone(),
                network_label: label.to_string(),
                hw_address: None,
                fqdn: None,
                server_ip: None,
                server_ports: Vec::new(),
            });
        drop(state);

        debug!(network_id = %session_id, component_id = %component_id, "component added to network");
        self.events.emit(NetworkEvent::ComponentAdded {
            component_id: component_id.clone(),
        });
        Ok(())
    }

    /// Disconnects a component from the network without removing it.
    pub async fn disconnect(&self, component_id: &ComponentId) -> Result<(), ClientError> {
        let session_id = self.bound_id()?;
        info!(network_id = %session_id, component_id = %component_id, "disconnecting component from network");
        let path = format!("/networks/{session_id}/components/{component_id}/disconnect");
        send(self.transport.as_ref(), Method::Post, &path, None).await
    }

    /// Removes a component from the network for good.
    pub async fn remove(&self, component_id: &ComponentId) -> Result<(), ClientError> {
        let session_id = self.bound_id()?;
        info!(network_id = %session_id, component_id = %component_id, "removing component from network");
        let path = format!("/networks/{session_id}/components/{component_id}");
        send(self.transport.as_ref(), Method::Delete, &path, None).await?;

        let mut state = self.state();
        state.components.retain(|id| id != component_id);
        if let Some(config) = state.config.as_mut() {
            config.remove_component(component_id);
        }
        drop(state);

        self.events.emit(NetworkEvent::ComponentRemoved {
            component_id: component_id.clone(),
        });
        Ok(())
    }

    /// The network settings of one member, or `None` if it has none.
    pub fn get_network_config(&self, component_id: &ComponentId) -> Option<NetworkComponentConfig> {
        self.state()
            .config
            .as_ref()
            .and_then(|c| c.component(component_id))
            .cloned()
    }

    pub fn contains(&self, component_id: &ComponentId) -> bool {
        self.state().components.contains(component_id)
    }

    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.state().components.clone()
    }

    pub fn config(&self) -> Option<NetworkConfig> {
        self.state().config.clone()
    }

    // ── Network environments ──────────────────────────────────────────────────

    /// Points the network environment `net_env_id` at `new_env_id` wherever
    /// it referenced `old_env_id`, and stores the result.
    pub async fn update_network(
        &self,
        net_env_id: &str,
        old_env_id: &str,
        new_env_id: &str,
    ) -> Result<Value, ClientError> {
        self.rewrite_environment(net_env_id, old_env_id, new_env_id)
            .await
            .map_err(|e| ClientError::UpdateNetworkFailed(Box::new(e)))
    }

    async fn rewrite_environment(
        &self,
        net_env_id: &str,
        old_env_id: &str,
        new_env_id: &str,
    ) -> Result<Value, ClientError> {
        let path = format!("/network-environments/{net_env_id}");
        let mut env: NetworkEnvironment =
            call(self.transport.as_ref(), Method::Get, &path, None).await?;
        let replaced = env.replace_environment(old_env_id, new_env_id);
        debug!(net_env_id, replaced, "rewrote network environment");
        let body = serde_json::to_value(&env).map_err(|source| ClientError::Encode { path, source })?;
        let saved = self
            .transport
            .request(Method::Post, "/network-environments", Some(body))
            .await?;
        Ok(saved)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// The websocket URL of the network's switch, resolved against the API
    /// base URL.  Port 443 forces the `wss` scheme.
    pub async fn ws_connection(&self) -> Result<Option<String>, ClientError> {
        let Some(session_id) = self.id() else {
            return Ok(None);
        };
        let path = format!("/networks/{session_id}/wsConnection");
        let response: WsConnectionResponse =
            call(self.transport.as_ref(), Method::Get, &path, None).await?;
        resolve_ws_url(self.transport.base_url(), &response.ws_connection).map(Some)
    }

    pub fn id(&self) -> Option<SessionId> {
        self.state().session_id.clone()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// TCP endpoint info the backend returned when the network was created.
    pub fn tcp_info(&self) -> Option<String> {
        self.state().tcp_info.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }
}

fn resolve_ws_url(base: &str, ws_connection: &str) -> Result<String, ClientError> {
    let invalid = |source| ClientError::InvalidUrl {
        url: ws_connection.to_string(),
        source,
    };
    let base = Url::parse(base).map_err(invalid)?;
    let mut url = base.join(ws_connection).map_err(invalid)?;
    if url.port_or_known_default() == Some(443) {
        // Only fails for non-special schemes, which keep their scheme.
        let _ = url.set_scheme("wss");
    }
    Ok(url.to_string())
}

impl std::fmt::Debug for NetworkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSession")
            .field("ephemeral", &self.ephemeral)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport_mock::MockTransport;
    use eaas_core::{ComponentRequest, NetworkComponentRequest};
    use serde_json::json;

    async fn session(t: &Arc<MockTransport>, id: &str, label: Option<&str>) -> Arc<ComponentSession> {
        let mut request = ComponentRequest::machine(format!("env-{id}"));
        if let Some(label) = label {
            request = request.with_network(NetworkComponentRequest::new(label));
        }
        t.respond_once(Method::Post, "/components", json!({ "id": id }));
        Arc::new(ComponentSession::create(t.clone(), request).await.unwrap())
    }

    async fn started(t: &Arc<MockTransport>) -> (NetworkSession, Vec<Arc<ComponentSession>>) {
        let sessions = vec![
            session(t, "a", Some("client")).await,
            session(t, "b", None).await,
        ];
        t.respond(
            Method::Post,
            "/networks",
            json!({ "id": "net-1", "networkUrls": { "tcp": "tcp://h:1" } }),
        );
        let network = NetworkSession::new(t.clone());
        network
            .start_network(&sessions, &NetworkConfig::default())
            .await
            .unwrap();
        (network, sessions)
    }

    #[tokio::test]
    async fn test_start_network_skips_sessions_without_network_settings() {
        // Arrange
        let t = Arc::new(MockTransport::new());

        // Act
        let (network, sessions) = started(&t).await;

        // Assert
        assert_eq!(network.id(), Some(SessionId::from("net-1")));
        assert_eq!(network.tcp_info().as_deref(), Some("tcp://h:1"));
        assert_eq!(network.component_ids(), vec![ComponentId::from("a")]);
        assert_eq!(sessions[0].network_id(), Some(SessionId::from("net-1")));
        assert_eq!(sessions[1].network_id(), None);
        let body = t.last_body(Method::Post, "/networks").unwrap();
        assert_eq!(body["components"][0]["componentId"], "a");
        assert_eq!(body["components"][0]["networkLabel"], "client");
    }

    #[tokio::test]
    async fn test_get_network_config_of_unknown_component_is_none() {
        let t = Arc::new(MockTransport::new());
        let (network, _) = started(&t).await;

        assert!(network.get_network_config(&"zzz".into()).is_none());
        assert_eq!(
            network.get_network_config(&"a".into()).unwrap().network_label,
            "client"
        );
    }

    #[tokio::test]
    async fn test_unbound_network_keepalive_and_release_do_nothing() {
        let t = Arc::new(MockTransport::new());
        let network = NetworkSession::new(t.clone());

        assert!(network.keepalive().is_none());
        network.release().await.unwrap();
        assert_eq!(network.ws_connection().await.unwrap(), None);
        assert!(t.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unbound_network_detach_fails() {
        let network = NetworkSession::new(Arc::new(MockTransport::new()));

        let err = network.detach("demo", 5).await.unwrap_err();

        assert!(matches!(err, ClientError::NoNetwork));
    }

    #[tokio::test]
    async fn test_keepalive_failure_is_swallowed() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        let network = NetworkSession::background(t.clone());
        network.load("s-1".into(), &[], None);
        t.fail(Method::Post, "/sessions/s-1/keepalive", 500);

        // Act
        let handle = network.keepalive().unwrap();

        // Assert
        assert!(handle.await.is_ok());
        assert_eq!(t.count(Method::Post, "/sessions/s-1/keepalive"), 1);
    }

    #[tokio::test]
    async fn test_release_deletes_ephemeral_network_and_emits_event() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        let (network, _) = started(&t).await;
        let mut events = network.subscribe();

        // Act
        network.release().await.unwrap();

        // Assert
        assert_eq!(t.count(Method::Delete, "/sessions/net-1"), 1);
        assert_eq!(network.id(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            NetworkEvent::Released {
                session_id: "net-1".into()
            }
        );
    }

    #[tokio::test]
    async fn test_release_of_background_network_only_clears_binding() {
        let t = Arc::new(MockTransport::new());
        let network = NetworkSession::background(t.clone());
        network.load("s-1".into(), &[], None);

        network.release().await.unwrap();

        assert!(t.requests().is_empty());
        assert_eq!(network.id(), None);
    }

    #[tokio::test]
    async fn test_detach_sends_lifetime_in_minutes() {
        let t = Arc::new(MockTransport::new());
        let network = NetworkSession::background(t.clone());
        network.load("s-1".into(), &[], None);

        network.detach("demo", 30).await.unwrap();

        let body = t.last_body(Method::Post, "/sessions/s-1/detach").unwrap();
        assert_eq!(
            body,
            json!({ "lifetime": 30, "lifetime_unit": "minutes", "sessionName": "demo" })
        );
    }

    #[tokio::test]
    async fn test_add_and_remove_component_update_registry() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        let network = NetworkSession::background(t.clone());
        network.load("s-1".into(), &[], Some(NetworkConfig::default()));
        let id = ComponentId::from("c-7");

        // Act / Assert
        network.add_component(&id, true, "Temp Client").await.unwrap();
        assert!(network.contains(&id));
        assert_eq!(network.get_network_config(&id).unwrap().network_label, "Temp Client");
        assert_eq!(
            t.last_body(Method::Post, "/networks/s-1/components").unwrap(),
            json!({ "componentId": "c-7", "ephemeral": true })
        );

        network.remove(&id).await.unwrap();
        assert!(!network.contains(&id));
        assert!(network.get_network_config(&id).is_none());
        assert_eq!(t.count(Method::Delete, "/networks/s-1/components/c-7"), 1);
    }

    #[tokio::test]
    async fn test_disconnect_posts_to_component_endpoint() {
        let t = Arc::new(MockTransport::new());
        let network = NetworkSession::background(t.clone());
        network.load("s-1".into(), &[], None);

        network.disconnect(&"c-1".into()).await.unwrap();

        assert_eq!(t.requests(), vec!["POST /networks/s-1/components/c-1/disconnect"]);
    }

    #[tokio::test]
    async fn test_update_network_rewrites_matching_environments() {
        // Arrange
        let t = Arc::new(MockTransport::new());
        t.respond(
            Method::Get,
            "/network-environments/ne-1",
            json!({
                "title": "lab",
                "emilEnvironments": [
                    { "envId": "old", "label": "server" },
                    { "envId": "other" }
                ]
            }),
        );
        let network = NetworkSession::new(t.clone());

        // Act
        network.update_network("ne-1", "old", "new").await.unwrap();

        // Assert
        let body = t.last_body(Method::Post, "/network-environments").unwrap();
        assert_eq!(body["emilEnvironments"][0]["envId"], "new");
        assert_eq!(body["emilEnvironments"][0]["label"], "server");
        assert_eq!(body["emilEnvironments"][1]["envId"], "other");
        assert_eq!(body["title"], "lab");
    }

    #[tokio::test]
    async fn test_update_network_wraps_failures() {
        let t = Arc::new(MockTransport::new());
        t.fail(Method::Get, "/network-environments/ne-1", 404);
        let network = NetworkSession::new(t);

        let err = network.update_network("ne-1", "a", "b").await.unwrap_err();

        assert!(matches!(err, ClientError::UpdateNetworkFailed(_)));
    }

    #[test]
    fn test_resolve_ws_url_switches_to_wss_on_port_443() {
        let url = resolve_ws_url("https://host/emil", "/networks/n/ws").unwrap();
        assert_eq!(url, "wss://host/networks/n/ws");
    }

    #[test]
    fn test_resolve_ws_url_keeps_scheme_on_other_ports() {
        let url = resolve_ws_url("http://host:8080/emil/", "ws/n").unwrap();
        assert_eq!(url, "http://host:8080/emil/ws/n");
    }
}
