//! Infrastructure layer of the client library.
//!
//! Contains the adapters behind the application seams: the reqwest HTTP
//! transport, OAuth token acquisition, TOML configuration storage, and the
//! viewport implementations.  `transport_mock` is the scripted transport used
//! by unit and integration tests.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `eaas_core`, but MUST NOT be imported by the `application` layer outside
//! of its tests.

pub mod http;
pub mod oauth;
pub mod storage;
pub mod transport_mock;
pub mod viewport;
