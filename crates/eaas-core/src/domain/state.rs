//! Emulator states reported by the backend.
//!
//! # State phases (for beginners)
//!
//! The backend reports a component's state as a plain string.  The client
//! only cares about which *phase* a state belongs to, because that decides
//! how the poll loop reacts:
//!
//! ```text
//! INITIALIZING / RUNNING / OK / READY  ──►  Live        (keep alive on cadence)
//! STOPPED / FAILED                     ──►  Terminal    (notify, final keepalive)
//! anything else                        ──►  Unexpected  (report the session)
//! ```
//!
//! `OK` and `READY` are obsolete names that older backends still send.

use std::fmt;
use std::str::FromStr;

/// A backend-reported emulator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmulatorState {
    Initializing,
    Running,
    /// Legacy alias of `Running`.
    Ok,
    /// Legacy alias of `Running`.
    Ready,
    Stopped,
    Failed,
    /// A state name this client does not know.
    Other(String),
}

/// How the poll loop treats a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePhase {
    Live,
    Terminal,
    Unexpected,
}

impl EmulatorState {
    pub fn phase(&self) -> StatePhase {
        match self {
            Self::Initializing | Self::Running | Self::Ok | Self::Ready => StatePhase::Live,
            Self::Stopped | Self::Failed => StatePhase::Terminal,
            Self::Other(_) => StatePhase::Unexpected,
        }
    }

    /// The literal wire name of the state.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Running => "RUNNING",
            Self::Ok => "OK",
            Self::Ready => "READY",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for EmulatorState {
    fn from(name: &str) -> Self {
        match name {
            "INITIALIZING" => Self::Initializing,
            "RUNNING" => Self::Running,
            "OK" => Self::Ok,
            "READY" => Self::Ready,
            "STOPPED" => Self::Stopped,
            "FAILED" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for EmulatorState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for EmulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_and_legacy_aliases_are_live() {
        for name in ["INITIALIZING", "RUNNING", "OK", "READY"] {
            assert_eq!(EmulatorState::from(name).phase(), StatePhase::Live, "{name}");
        }
    }

    #[test]
    fn test_stopped_and_failed_are_terminal() {
        assert_eq!(EmulatorState::from("STOPPED").phase(), StatePhase::Terminal);
        assert_eq!(EmulatorState::from("FAILED").phase(), StatePhase::Terminal);
    }

    #[test]
    fn test_unknown_state_is_unexpected_and_keeps_its_name() {
        // Arrange / Act
        let state: EmulatorState = "MIGRATING".parse().unwrap();

        // Assert
        assert_eq!(state.phase(), StatePhase::Unexpected);
        assert_eq!(state.to_string(), "MIGRATING");
    }

    #[test]
    fn test_state_names_are_case_sensitive() {
        // The backend always sends upper-case names; anything else is unknown.
        assert_eq!(EmulatorState::from("running").phase(), StatePhase::Unexpected);
    }
}
