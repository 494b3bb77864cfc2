//! Error types for virtrest.

use crate::domain::DomainAction;
use crate::hypervisor::HypervisorError;
use thiserror::Error;

/// Result type alias using virtrest's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in virtrest operations.
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    /// The hypervisor management session could not be opened.
    #[error("failed to connect to hypervisor at {uri}: {source}")]
    Connection {
        /// Endpoint that was dialed.
        uri: String,
        /// Underlying client error.
        #[source]
        source: HypervisorError,
    },

    // Lookup errors
    /// No domain with the requested name exists.
    #[error("domain not found: {name}")]
    DomainNotFound {
        /// Requested domain name.
        name: String,
    },

    /// A hypervisor call other than a transition failed.
    #[error("{operation} failed: {source}")]
    Hypervisor {
        /// The call that failed (e.g. "list domains").
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: HypervisorError,
    },

    // Descriptor errors
    /// Descriptor markup could not be fetched or parsed.
    #[error("invalid descriptor for domain {domain}: {reason}")]
    Descriptor {
        /// Domain the descriptor belongs to.
        domain: String,
        /// What went wrong.
        reason: String,
    },

    /// The hypervisor reported a run-state code outside the known set.
    #[error("unknown run-state code {code} reported for domain {domain}")]
    StateMapping {
        /// Domain whose state was queried.
        domain: String,
        /// Raw code from the hypervisor.
        code: u32,
    },

    // Action errors
    /// The hypervisor rejected a lifecycle transition.
    #[error("{action} failed for domain {domain}: {message}")]
    Action {
        /// Requested transition.
        action: DomainAction,
        /// Target domain.
        domain: String,
        /// Hypervisor message, verbatim.
        message: String,
    },

    /// A tracked handle was used after it had been released.
    #[error("domain handle already released")]
    HandleReleased,

    // Configuration errors
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to load configuration.
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    // IO errors
    /// IO error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a descriptor error with a reason.
    pub fn descriptor(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Descriptor {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a hypervisor call error.
    pub fn hypervisor(operation: &'static str, source: HypervisorError) -> Self {
        Self::Hypervisor { operation, source }
    }

    /// Create a configuration error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the requested domain does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DomainNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::ErrorKind;

    #[test]
    fn test_domain_not_found_includes_name() {
        let err = Error::DomainNotFound {
            name: "web-01".to_string(),
        };
        assert!(err.to_string().contains("web-01"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_connection_error_includes_uri_and_cause() {
        let err = Error::Connection {
            uri: "qemu:///system".to_string(),
            source: HypervisorError::new(ErrorKind::NoConnect, "socket refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("qemu:///system"), "Error should include URI");
        assert!(msg.contains("socket refused"), "Error should include cause");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_action_error_passes_message_verbatim() {
        let err = Error::Action {
            action: DomainAction::Suspend,
            domain: "vm1".to_string(),
            message: "Requested operation is not valid: domain is not running".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("suspend"));
        assert!(msg.contains("vm1"));
        assert!(msg.contains("Requested operation is not valid: domain is not running"));
    }

    #[test]
    fn test_state_mapping_error_includes_code() {
        let err = Error::StateMapping {
            domain: "vm1".to_string(),
            code: 42,
        };
        assert!(err.to_string().contains("42"));
    }
}
