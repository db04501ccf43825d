//! The display seam: where a component's output is shown.
//!
//! Rendering (xpra/WebRTC streams, canvases, pixel pushing) is outside this
//! crate.  A [`Viewport`] is the container a viewer draws into; the client
//! only tells it *which* component to show and with which settings, and when
//! to clear itself.  Only one component may be attached to a viewport at a
//! time; the client guarantees `clear` + `detach` run before the next
//! `attach`.

use eaas_core::{protocol::messages::ControlUrls, ComponentId, ViewerConfig};
use thiserror::Error;

/// Error type for viewport operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewportError {
    #[error("no supported control URL among {0:?}")]
    UnsupportedProtocol(Vec<String>),
    #[error("viewport failure: {0}")]
    Platform(String),
}

/// Everything a viewer needs to show one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewAttachment {
    pub component_id: ComponentId,
    pub control_urls: ControlUrls,
    pub viewer: ViewerConfig,
}

/// A display container.
#[cfg_attr(test, mockall::automock)]
pub trait Viewport: Send + Sync {
    /// Starts showing the component described by `attachment`.
    fn attach(&self, attachment: &ViewAttachment) -> Result<(), ViewportError>;

    /// Stops showing `component_id`.
    fn detach(&self, component_id: &ComponentId);

    /// Removes everything currently rendered in the container.
    fn clear(&self);
}
