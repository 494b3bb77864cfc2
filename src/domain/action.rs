//! Lifecycle transitions.
//!
//! Legality is decided by the hypervisor: a transition is forwarded as-is
//! and any refusal comes back as [`Error::Action`] with the hypervisor's
//! message untouched.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use super::descriptor::{self, DomainDescriptor};
use crate::error::{Error, Result};
use crate::hypervisor::DomainHandle;

/// Transitions that can be requested on a domain.
///
/// ```text
/// shutoff --create--> running
/// running --destroy--> shutoff     (forced)
/// running --shutdown--> shutoff    (graceful, may not complete)
/// running --suspend--> paused
/// paused  --resume--> running
/// running --reboot--> running
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DomainAction {
    /// Boot an inactive domain.
    Create,
    /// Force the domain off.
    Destroy,
    /// Reboot the guest.
    Reboot,
    /// Unpause.
    Resume,
    /// Pause.
    Suspend,
    /// Graceful guest shutdown.
    Shutdown,
}

impl DomainAction {
    /// Every action, in route order.
    pub const ALL: [DomainAction; 6] = [
        DomainAction::Destroy,
        DomainAction::Create,
        DomainAction::Reboot,
        DomainAction::Resume,
        DomainAction::Suspend,
        DomainAction::Shutdown,
    ];

    /// Get the action name as a string.
    pub fn name(self) -> &'static str {
        match self {
            DomainAction::Create => "create",
            DomainAction::Destroy => "destroy",
            DomainAction::Reboot => "reboot",
            DomainAction::Resume => "resume",
            DomainAction::Suspend => "suspend",
            DomainAction::Shutdown => "shutdown",
        }
    }

    /// Invoke the matching transition on a handle.
    fn invoke(self, handle: &dyn DomainHandle) -> crate::hypervisor::HvResult<()> {
        match self {
            DomainAction::Create => handle.create(),
            DomainAction::Destroy => handle.destroy(),
            DomainAction::Reboot => handle.reboot(),
            DomainAction::Resume => handle.resume(),
            DomainAction::Suspend => handle.suspend(),
            DomainAction::Shutdown => handle.shutdown(),
        }
    }
}

impl std::fmt::Display for DomainAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An action name outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for DomainAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DomainAction::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Apply an action and return a fresh snapshot taken afterwards.
pub fn dispatch(handle: &dyn DomainHandle, action: DomainAction) -> Result<DomainDescriptor> {
    let domain = handle.name().unwrap_or_else(|_| "<unknown>".to_string());
    tracing::info!(domain = %domain, action = %action, "dispatching domain action");

    action.invoke(handle).map_err(|e| {
        tracing::warn!(domain = %domain, action = %action, error = %e, "domain action rejected");
        Error::Action {
            action,
            domain: domain.clone(),
            message: e.message().to_string(),
        }
    })?;

    descriptor::build(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainState;
    use crate::hypervisor::{Connection, Hypervisor, MockHypervisor};

    fn connect(hv: &MockHypervisor) -> Box<dyn Connection> {
        match hv.open() {
            Ok(c) => c,
            Err(e) => panic!("open failed: {e}"),
        }
    }

    #[test]
    fn test_parse_action_names() {
        for action in DomainAction::ALL {
            assert_eq!(action.name().parse::<DomainAction>(), Ok(action));
        }
        assert_eq!(
            "migrate".parse::<DomainAction>(),
            Err(UnknownAction("migrate".to_string()))
        );
        assert!("Suspend".parse::<DomainAction>().is_err());
    }

    #[test]
    fn test_dispatch_returns_post_action_state() {
        let hv = MockHypervisor::with_sample_domains();
        let conn = connect(&hv);

        let vm1 = conn.lookup_by_name("vm1").unwrap();
        let d = dispatch(vm1.as_ref(), DomainAction::Suspend).unwrap();
        assert_eq!(d.name, "vm1");
        assert_eq!(d.state, DomainState::Paused);

        let d = dispatch(vm1.as_ref(), DomainAction::Resume).unwrap();
        assert_eq!(d.state, DomainState::Running);

        let vm2 = conn.lookup_by_name("vm2").unwrap();
        let d = dispatch(vm2.as_ref(), DomainAction::Create).unwrap();
        assert_eq!(d.state, DomainState::Running);
        let d = dispatch(vm2.as_ref(), DomainAction::Destroy).unwrap();
        assert_eq!(d.state, DomainState::Shutoff);
    }

    #[test]
    fn test_rejected_transition_passes_message_through() {
        let hv = MockHypervisor::with_sample_domains();
        let conn = connect(&hv);
        let vm2 = conn.lookup_by_name("vm2").unwrap();

        match dispatch(vm2.as_ref(), DomainAction::Suspend) {
            Err(Error::Action {
                action, message, ..
            }) => {
                assert_eq!(action, DomainAction::Suspend);
                assert_eq!(
                    message,
                    "Requested operation is not valid: domain is not running"
                );
            }
            other => panic!("expected action error, got {:?}", other),
        }
    }
}
