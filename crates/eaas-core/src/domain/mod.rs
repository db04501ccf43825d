//! Domain layer: pure EaaS types with no I/O.
//!
//! - **`ids`** – Opaque identifiers assigned by the backend.
//! - **`state`** – Emulator states and how the client reacts to each.
//! - **`network`** – Virtual network configuration.
//! - **`request`** – Component requests, client options, viewer settings,
//!   snapshot requests.
//! - **`image`** – Container image reference parsing for emulator imports.

pub mod ids;
pub mod image;
pub mod network;
pub mod request;
pub mod state;
