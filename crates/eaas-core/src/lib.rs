//! # eaas-core
//!
//! Shared library for the EaaS (emulation-as-a-service) client containing the
//! domain entities and the JSON wire messages exchanged with the backend.
//!
//! It has zero dependencies on HTTP clients, async runtimes, or viewers, so
//! everything in here can be unit-tested without a network.
//!
//! # Architecture overview (for beginners)
//!
//! An EaaS backend runs emulated machines ("components") on the server side.
//! A client asks the backend to start components, keeps them alive while the
//! user works with them, optionally wires several of them into one virtual
//! network, and finally tears everything down again.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure business types: identifiers, the emulator state
//!   machine as reported by the backend, component and network requests,
//!   viewer settings, and container image references.
//!
//! - **`protocol`** – The request/response bodies of the backend REST API,
//!   modelled as `serde` structs with the camelCase field names the backend
//!   uses on the wire.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `eaas_core::ComponentId` instead of `eaas_core::domain::ids::ComponentId`.
pub use domain::ids::{ComponentId, SessionId};
pub use domain::image::{ImageReference, ImageReferenceError};
pub use domain::network::{NetworkComponentConfig, NetworkComponentRequest, NetworkConfig};
pub use domain::request::{
    ClientOptions, ComponentKind, ComponentRequest, KeyboardPrefs, SnapshotKind, SnapshotRequest,
    ViewerConfig,
};
pub use domain::state::{EmulatorState, StatePhase};
