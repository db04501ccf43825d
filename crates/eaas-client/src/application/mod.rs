//! Application layer use cases for the EaaS client.
//!
//! **Dependency rule**: this layer depends on `eaas_core` and on the two
//! seams it defines itself ([`transport::Transport`] and
//! [`viewport::Viewport`]); it never imports `infrastructure`.
//!
//! - **`client`** – The orchestrator: start/attach/connect/stop/release.
//! - **`component_session`** – Handle to one remote emulated machine.
//! - **`network_session`** – Handle to the backend network joining components.
//! - **`poll`** – Keepalive cadence and the cancellable poll job.
//! - **`task`** – Polling asynchronous backend jobs to completion.
//! - **`provisioning`** – Emulator/image import flows built on `task`.
//! - **`events`** – Publish/subscribe for client and network events.

pub mod client;
pub mod component_session;
pub mod error;
pub mod events;
pub mod network_session;
pub mod poll;
pub mod provisioning;
pub mod task;
pub mod transport;
pub mod viewport;
