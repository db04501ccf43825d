//! Publish/subscribe for client and network events.
//!
//! Long-lived UIs need to learn about emulators that stop or crash without
//! the client unwinding.  [`EventBus`] wraps a `tokio::sync::broadcast`
//! channel: every [`EventBus::subscribe`] call gets its own receiver, and
//! [`EventBus::emit`] never blocks or fails (an event with no subscribers is
//! simply dropped).
//!
//! # Error payload duality
//!
//! A poll tick reports two different things under the same `Error` kind:
//!
//! - a *known terminal state* (`STOPPED`/`FAILED`) as [`ErrorDetail::State`],
//!   carrying the literal state string;
//! - an *unexpected state* as [`ErrorDetail::Session`], carrying the
//!   identity of the session that reported it.
//!
//! Consumers distinguish the two by matching on the variant.

use eaas_core::{ComponentId, SessionId};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Payload of [`ClientEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// A known terminal state, e.g. `"FAILED"`.
    State(String),
    /// A session reported a state the client does not recognize.
    Session {
        component_id: ComponentId,
        state: String,
    },
}

/// Events emitted by the [`Client`](super::client::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Error(ErrorDetail),
    /// A component was attached to the display container.
    ViewConnected { component_id: ComponentId },
    /// The active view was detached from the display container.
    ViewDisconnected { component_id: ComponentId },
}

/// Events emitted by a [`NetworkSession`](super::network_session::NetworkSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    ComponentAdded { component_id: ComponentId },
    ComponentRemoved { component_id: ComponentId },
    Detached { session_id: SessionId },
    Released { session_id: SessionId },
}

/// Broadcast-based event dispatcher.
#[derive(Debug)]
pub struct EventBus<E: Clone> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Delivers `event` to every current subscriber.
    pub fn emit(&self, event: E) {
        let _ = self.tx.send(event);
    }

    /// Returns a receiver for all events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
