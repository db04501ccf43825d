//! Recording viewport for unit and integration testing.
//!
//! # Why a recording viewport?
//!
//! A real viewport draws a remote screen, which cannot be observed from test
//! code.  `RecordingViewport` pushes every call into a `Mutex<Vec<...>>` (or
//! bumps a counter) so tests can assert what was attached, detached and
//! cleared, and in what order.
//!
//! ```ignore
//! let viewport = Arc::new(RecordingViewport::new());
//! client.connect(Some(viewport.clone()), None).await?;
//! assert_eq!(viewport.attached_ids(), vec![ComponentId::from("c-1")]);
//! ```
//!
//! Set `should_fail` to make `attach` return `ViewportError::Platform`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use eaas_core::ComponentId;

use crate::application::viewport::{ViewAttachment, Viewport, ViewportError};

/// One call seen by the viewport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportCall {
    Attach(ComponentId),
    Detach(ComponentId),
    Clear,
}

#[derive(Debug, Default)]
pub struct RecordingViewport {
    /// Every successful `attach`.
    pub attached: Mutex<Vec<ViewAttachment>>,
    /// Every `detach`.
    pub detached: Mutex<Vec<ComponentId>>,
    pub clears: AtomicUsize,
    /// Every call, including failed attaches.
    pub calls: Mutex<Vec<ViewportCall>>,
    /// When `true`, `attach` fails with `ViewportError::Platform`.
    pub should_fail: bool,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn attached_ids(&self) -> Vec<ComponentId> {
        self.attached
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.component_id.clone())
            .collect()
    }

    pub fn calls(&self) -> Vec<ViewportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl Viewport for RecordingViewport {
    fn attach(&self, attachment: &ViewAttachment) -> Result<(), ViewportError> {
        self.calls
            .lock()
            .unwrap()
            .push(ViewportCall::Attach(attachment.component_id.clone()));
        if self.should_fail {
            return Err(ViewportError::Platform("mock attach failure".to_string()));
        }
        self.attached.lock().unwrap().push(attachment.clone());
        Ok(())
    }

    fn detach(&self, component_id: &ComponentId) {
        self.calls
            .lock()
            .unwrap()
            .push(ViewportCall::Detach(component_id.clone()));
        self.detached.lock().unwrap().push(component_id.clone());
    }

    fn clear(&self) {
        self.calls.lock().unwrap().push(ViewportCall::Clear);
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}
