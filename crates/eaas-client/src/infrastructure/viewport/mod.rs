//! Viewport implementations.
//!
//! `headless` is used by the `eaas` binary, which has no screen to draw on;
//! `mock` records calls for tests.

pub mod headless;
pub mod mock;
