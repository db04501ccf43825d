//! A viewport without a screen.
//!
//! `HeadlessViewport` picks the first control URL whose protocol it knows
//! and logs it, so a terminal user can open the stream in a separate viewer.
//! It keeps track of the component it currently shows and refuses control
//! URL maps that offer nothing it can hand out.

use std::sync::{Mutex, PoisonError};

use eaas_core::ComponentId;
use tracing::{debug, info};

use crate::application::viewport::{ViewAttachment, Viewport, ViewportError};

/// Protocols in order of preference.
pub const SUPPORTED_PROTOCOLS: &[&str] = &["xpra", "webrtc", "vnc"];

#[derive(Debug, Default)]
pub struct HeadlessViewport {
    current: Mutex<Option<(ComponentId, String)>>,
}

impl HeadlessViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The component currently shown and the URL handed out for it.
    pub fn current(&self) -> Option<(ComponentId, String)> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Viewport for HeadlessViewport {
    fn attach(&self, attachment: &ViewAttachment) -> Result<(), ViewportError> {
        let (protocol, url) = SUPPORTED_PROTOCOLS
            .iter()
            .find_map(|p| attachment.control_urls.get(*p).map(|url| (*p, url.clone())))
            .ok_or_else(|| {
                ViewportError::UnsupportedProtocol(attachment.control_urls.keys().cloned().collect())
            })?;

        info!(
            component_id = %attachment.component_id,
            protocol,
            url = %url,
            width = attachment.viewer.xpra_width,
            height = attachment.viewer.xpra_height,
            "view available"
        );
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((attachment.component_id.clone(), url));
        Ok(())
    }

    fn detach(&self, component_id: &ComponentId) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(id, _)| id == component_id) {
            *current = None;
        }
        debug!(%component_id, "view detached");
    }

    fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eaas_core::{protocol::messages::ControlUrls, ViewerConfig};

    fn attachment(urls: &[(&str, &str)]) -> ViewAttachment {
        ViewAttachment {
            component_id: ComponentId::from("c-1"),
            control_urls: urls
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<ControlUrls>(),
            viewer: ViewerConfig::default(),
        }
    }

    #[test]
    fn test_attach_prefers_xpra() {
        // Arrange
        let viewport = HeadlessViewport::new();

        // Act
        viewport
            .attach(&attachment(&[("vnc", "vnc://h"), ("xpra", "wss://h/xpra")]))
            .unwrap();

        // Assert
        assert_eq!(
            viewport.current(),
            Some((ComponentId::from("c-1"), "wss://h/xpra".to_string()))
        );
    }

    #[test]
    fn test_attach_without_known_protocol_fails() {
        let viewport = HeadlessViewport::new();

        let err = viewport.attach(&attachment(&[("spice", "spice://h")])).unwrap_err();

        assert_eq!(err, ViewportError::UnsupportedProtocol(vec!["spice".to_string()]));
        assert_eq!(viewport.current(), None);
    }

    #[test]
    fn test_detach_of_other_component_keeps_current_view() {
        let viewport = HeadlessViewport::new();
        viewport.attach(&attachment(&[("xpra", "wss://h")])).unwrap();

        viewport.detach(&ComponentId::from("c-2"));
        assert!(viewport.current().is_some());

        viewport.detach(&ComponentId::from("c-1"));
        assert_eq!(viewport.current(), None);
    }
}
