//! Virtual network configuration.
//!
//! A network session joins several component sessions into one virtual
//! Ethernet segment.  Two shapes of per-component configuration exist:
//!
//! - [`NetworkComponentRequest`] – attached to a component *request*, before
//!   the backend has assigned a component id.
//! - [`NetworkComponentConfig`] – the same settings bound to a real
//!   [`ComponentId`], as stored in the network-wide [`NetworkConfig`].
//!
//! The network-wide [`NetworkConfig`] is sent once to `POST /networks` and is
//! read-only afterwards.

use serde::{Deserialize, Serialize};

use super::ids::ComponentId;

/// Per-component network settings supplied with a component request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkComponentRequest {
    /// Human-readable label shown when enumerating network members.
    pub network_label: String,
    /// MAC address, or `"auto"` to let the backend pick one.
    #[serde(default = "default_hw_address")]
    pub hw_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_ports: Vec<u16>,
}

impl NetworkComponentRequest {
    pub fn new(network_label: impl Into<String>) -> Self {
        Self {
            network_label: network_label.into(),
            hw_address: default_hw_address(),
            fqdn: None,
            server_ip: None,
            server_ports: Vec::new(),
        }
    }

    /// Binds these settings to the id the backend assigned to the component.
    pub fn bind(&self, component_id: ComponentId) -> NetworkComponentConfig {
        NetworkComponentConfig {
            component_id,
            network_label: self.network_label.clone(),
            hw_address: Some(self.hw_address.clone()),
            fqdn: self.fqdn.clone(),
            server_ip: self.server_ip.clone(),
            server_ports: self.server_ports.clone(),
        }
    }
}

/// One `{componentId, networkLabel}` record of a [`NetworkConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkComponentConfig {
    pub component_id: ComponentId,
    #[serde(default)]
    pub network_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_ports: Vec<u16>,
}

/// TCP gateway exposing one network member to the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpGatewayConfig {
    pub server_ip: String,
    pub server_port: u16,
}

/// Network-wide configuration, including the ordered component list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    #[serde(default)]
    pub components: Vec<NetworkComponentConfig>,
    #[serde(default)]
    pub has_internet: bool,
    #[serde(default)]
    pub enable_dhcp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_network_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_network_mask: Option<String>,
    #[serde(default)]
    pub has_tcp_gateway: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_gateway_config: Option<TcpGatewayConfig>,
}

impl NetworkConfig {
    /// Appends a bound component record.
    pub fn add_component(&mut self, component: NetworkComponentConfig) {
        self.components.push(component);
    }

    /// Looks up the record for `component_id`; `None` when it is not configured.
    pub fn component(&self, component_id: &ComponentId) -> Option<&NetworkComponentConfig> {
        self.components
            .iter()
            .find(|c| &c.component_id == component_id)
    }

    /// Drops the record for `component_id`, if any.
    pub fn remove_component(&mut self, component_id: &ComponentId) {
        self.components.retain(|c| &c.component_id != component_id);
    }
}

fn default_hw_address() -> String {
    "auto".to_string()
}
