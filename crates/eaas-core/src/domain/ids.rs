//! Backend-assigned identifiers.
//!
//! Both identifiers are opaque strings chosen by the backend at creation time.
//! Wrapping them in newtypes keeps a component id from being passed where a
//! network session id is expected (and vice versa), while `#[serde(transparent)]`
//! keeps the wire format a plain JSON string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one component session (a remote emulated machine).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

/// Identifier of a backend session (used for network sessions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(ComponentId);
string_id!(SessionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_id_serializes_as_plain_string() {
        // Arrange
        let id = ComponentId::new("c-1");

        // Act
        let json = serde_json::to_string(&id).unwrap();

        // Assert
        assert_eq!(json, "\"c-1\"");
    }

    #[test]
    fn test_session_id_display_matches_inner_value() {
        let id = SessionId::from("net-42");
        assert_eq!(id.to_string(), "net-42");
        assert_eq!(id.as_str(), "net-42");
    }
}
