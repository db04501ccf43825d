//! eaas-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does eaas-client do? (for beginners)
//!
//! An EaaS backend runs emulated computers ("components") on a server.  This
//! crate is the *client side* of that arrangement:
//!
//! 1. Asks the backend to start one or more components, all at once.
//! 2. Optionally joins them into one virtual network.
//! 3. Polls each component's state every few seconds and sends keepalive
//!    pings on a slower cadence so the backend does not expire them.
//! 4. Reports failures (a component that stopped or crashed) as events.
//! 5. Binds exactly one component to a display container (the *active view*).
//! 6. Tears everything down again, stopping only what this client owns.
//!
//! # Layers
//!
//! - **`application`** – The orchestration logic (`Client`, `NetworkSession`,
//!   `ComponentSession`, the poll loop, task polling).  It talks to the world
//!   only through the `Transport` and `Viewport` traits.
//! - **`infrastructure`** – Implementations of those traits (reqwest HTTP,
//!   headless viewer, test doubles), OAuth, and the TOML config file.

/// Application layer: session orchestration use cases.
pub mod application;

/// Infrastructure layer: HTTP transport, OAuth, viewers, config storage.
pub mod infrastructure;

pub use application::client::{Client, ClientSettings, SessionSummary, StopResult};
pub use application::error::ClientError;
pub use application::events::{ClientEvent, ErrorDetail, NetworkEvent};
