//! Grant states and resolutions.

use serde::Serialize;
use std::fmt;

/// What a caller sees when asking for a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    Granted,
    Denied,
    /// A fetch is in flight. Not a denial: render nothing definitive yet.
    Pending,
}

impl GrantState {
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }

    pub fn is_denied(self) -> bool {
        self == Self::Denied
    }

    pub fn is_pending(self) -> bool {
        self == Self::Pending
    }

    pub fn from_granted(granted: bool) -> Self {
        if granted {
            Self::Granted
        } else {
            Self::Denied
        }
    }
}

impl fmt::Display for GrantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Pending => "pending",
        })
    }
}

/// Why a resolution could not consult the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    Timeout,
    FetchFailure,
}

/// A settled answer and how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum Resolution {
    /// The source had a record for this role.
    Explicit { granted: bool },
    /// No record; decided by the override-role rule.
    Fallback { granted: bool },
    /// The source could not answer. Always denied, and retryable.
    Faulted { fault: Fault },
}

impl Resolution {
    pub fn granted(self) -> bool {
        match self {
            Self::Explicit { granted } | Self::Fallback { granted } => granted,
            Self::Faulted { .. } => false,
        }
    }

    pub fn state(self) -> GrantState {
        GrantState::from_granted(self.granted())
    }

    pub fn is_faulted(self) -> bool {
        matches!(self, Self::Faulted { .. })
    }

    /// Short label used in logs and audit events.
    pub fn basis(self) -> &'static str {
        match self {
            Self::Explicit { .. } => "explicit",
            Self::Fallback { .. } => "fallback",
            Self::Faulted { fault: Fault::Timeout } => "timeout",
            Self::Faulted { fault: Fault::FetchFailure } => "fetch_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faults_are_denied() {
        for fault in [Fault::Timeout, Fault::FetchFailure] {
            let resolution = Resolution::Faulted { fault };
            assert!(!resolution.granted());
            assert_eq!(resolution.state(), GrantState::Denied);
            assert!(resolution.is_faulted());
        }
    }

    #[test]
    fn test_resolution_state() {
        assert_eq!(Resolution::Explicit { granted: true }.state(), GrantState::Granted);
        assert_eq!(Resolution::Fallback { granted: false }.state(), GrantState::Denied);
        assert_eq!(Resolution::Fallback { granted: true }.basis(), "fallback");
    }

    #[test]
    fn test_resolution_serializes_with_basis_tag() {
        let json = serde_json::to_value(Resolution::Faulted { fault: Fault::Timeout }).unwrap();
        assert_eq!(json, serde_json::json!({ "basis": "faulted", "fault": "timeout" }));
    }
}
