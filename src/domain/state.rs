//! Domain run-state enumeration.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state of a domain as reported by the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DomainState {
    /// No state reported.
    NoState,
    /// Running.
    Running,
    /// Blocked on a resource.
    Blocked,
    /// Paused by the user.
    Paused,
    /// Being shut down.
    Shutdown,
    /// Shut off.
    Shutoff,
    /// Crashed.
    Crashed,
    /// Suspended by guest power management.
    Suspended,
}

/// Run-state codes in hypervisor order; the index is the code.
static STATE_TABLE: [DomainState; 8] = [
    DomainState::NoState,
    DomainState::Running,
    DomainState::Blocked,
    DomainState::Paused,
    DomainState::Shutdown,
    DomainState::Shutoff,
    DomainState::Crashed,
    DomainState::Suspended,
];

/// A run-state code with no entry in the state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownStateCode(pub u32);

impl DomainState {
    /// Map a raw run-state code.
    pub fn from_code(code: u32) -> Result<Self, UnknownStateCode> {
        usize::try_from(code)
            .ok()
            .and_then(|i| STATE_TABLE.get(i))
            .copied()
            .ok_or(UnknownStateCode(code))
    }

    /// Raw run-state code for this state.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Get the state name as a string.
    pub fn name(self) -> &'static str {
        match self {
            DomainState::NoState => "nostate",
            DomainState::Running => "running",
            DomainState::Blocked => "blocked",
            DomainState::Paused => "paused",
            DomainState::Shutdown => "shutdown",
            DomainState::Shutoff => "shutoff",
            DomainState::Crashed => "crashed",
            DomainState::Suspended => "suspended",
        }
    }
}

impl TryFrom<u32> for DomainState {
    type Error = UnknownStateCode;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl std::fmt::Display for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
