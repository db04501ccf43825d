//! Wire messages of the EaaS backend REST API.
//!
//! Every struct here mirrors one JSON body.  Field names follow the backend's
//! camelCase convention through `#[serde(rename_all = "camelCase")]`.

pub mod messages;
