//! Integration tests for the eaas-core wire format.
//!
//! These tests exercise the domain builders and protocol messages together
//! through the public API, checking the exact JSON the backend receives and
//! that representative backend responses decode.

use eaas_core::{
    protocol::messages::{NetworkCreated, SessionDescriptor, TaskInfo},
    ComponentRequest, EmulatorState, KeyboardPrefs, NetworkComponentRequest, NetworkConfig,
    StatePhase,
};
use serde_json::json;

#[test]
fn test_component_request_body_matches_backend_expectations() {
    // Arrange
    let mut req = ComponentRequest::machine("env-42")
        .interactive(true)
        .with_field("emulatorVersion", json!("latest"))
        .with_network(NetworkComponentRequest::new("workstation"));
    req.set_keyboard(&KeyboardPrefs::default());

    // Act
    let body = req.build();

    // Assert
    assert_eq!(
        body,
        json!({
            "type": "machine",
            "environment": "env-42",
            "keyboardLayout": "us",
            "keyboardModel": "pc105",
            "emulatorVersion": "latest"
        })
    );
    // Client-side settings never leak into the component body.
    assert!(body.get("interactive").is_none());
}

#[test]
fn test_network_config_built_from_requests_lists_components_in_order() {
    // Arrange
    let template = NetworkConfig {
        has_internet: true,
        enable_dhcp: true,
        ..Default::default()
    };
    let requests = [
        ("c-1", NetworkComponentRequest::new("server")),
        ("c-2", NetworkComponentRequest::new("client")),
    ];

    // Act
    let mut cfg = template.clone();
    for (id, req) in &requests {
        cfg.add_component(req.bind((*id).into()));
    }
    let json = serde_json::to_value(&cfg).unwrap();

    // Assert
    assert_eq!(json["components"][0]["componentId"], "c-1");
    assert_eq!(json["components"][1]["networkLabel"], "client");
    assert_eq!(json["enableDhcp"], true);
    assert!(template.components.is_empty(), "template must stay untouched");
}

#[test]
fn test_network_created_without_urls_decodes() {
    let created: NetworkCreated = serde_json::from_value(json!({"id": "net-1"})).unwrap();
    assert_eq!(created.id.as_str(), "net-1");
    assert!(created.network_urls.is_none());
}

#[test]
fn test_network_created_with_tcp_url_decodes() {
    let created: NetworkCreated = serde_json::from_value(json!({
        "id": "net-1",
        "networkUrls": {"tcp": "tcp://gw:8080"}
    }))
    .unwrap();
    assert_eq!(
        created.network_urls.and_then(|u| u.tcp).as_deref(),
        Some("tcp://gw:8080")
    );
}

#[test]
fn test_empty_session_descriptor_decodes_to_defaults() {
    let desc: SessionDescriptor = serde_json::from_value(json!({})).unwrap();
    assert!(desc.components.is_empty());
    assert!(desc.network.is_none());
}

#[test]
fn test_session_component_without_type_is_not_a_machine() {
    // Arrange
    let raw = json!({
        "components": [
            { "componentId": "c-1", "type": "machine" },
            { "componentId": "x-1" }
        ]
    });

    // Act
    let desc: SessionDescriptor = serde_json::from_value(raw).unwrap();

    // Assert
    assert_eq!(desc.components.len(), 2);
    assert!(desc.components[0].is_machine());
    assert_eq!(desc.components[1].kind, "");
    assert!(!desc.components[1].is_machine());
}

#[test]
fn test_task_info_with_object_payload_decodes() {
    let info: TaskInfo = serde_json::from_value(json!({
        "taskId": "t-1",
        "status": "0",
        "isDone": true,
        "object": "{\"imageId\":\"img-1\"}"
    }))
    .unwrap();

    assert!(info.is_done);
    assert!(!info.is_failed());
    let object: serde_json::Value = serde_json::from_str(info.object.as_deref().unwrap()).unwrap();
    assert_eq!(object["imageId"], "img-1");
}

#[test]
fn test_reported_states_map_to_expected_phases() {
    let cases = [
        ("RUNNING", StatePhase::Live),
        ("READY", StatePhase::Live),
        ("FAILED", StatePhase::Terminal),
        ("PAUSED", StatePhase::Unexpected),
    ];
    for (name, phase) in cases {
        assert_eq!(EmulatorState::from(name).phase(), phase, "state {name}");
    }
}
