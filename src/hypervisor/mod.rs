//! Hypervisor management client abstraction.
//!
//! This module defines the seam between virtrest and the hypervisor:
//! - [`Hypervisor`]: Factory for management sessions against one endpoint
//! - [`Connection`]: One open management session
//! - [`DomainHandle`]: Native reference to a hypervisor-side domain object
//!
//! Backends: [`MockHypervisor`] (`mock://` URIs) and, with the `libvirt`
//! feature, `LibvirtHypervisor` for everything else.

#[cfg(feature = "libvirt")]
mod libvirt;
pub mod mock;

use std::sync::Arc;
use thiserror::Error;

use crate::error::Result;

#[cfg(feature = "libvirt")]
pub use libvirt::LibvirtHypervisor;
pub use mock::{HandleStats, MockHypervisor};

/// Result type for raw hypervisor client calls.
pub type HvResult<T> = std::result::Result<T, HypervisorError>;

/// Classification of a hypervisor client failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The named domain does not exist.
    NoDomain,
    /// The management endpoint is unreachable or rejected the session.
    NoConnect,
    /// The requested operation is not valid in the domain's current state.
    OperationInvalid,
    /// Any other failure.
    Internal,
}

/// Error reported by the hypervisor client.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HypervisorError {
    kind: ErrorKind,
    message: String,
}

impl HypervisorError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message as reported by the hypervisor.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the hypervisor reported that the domain does not exist.
    pub fn is_no_domain(&self) -> bool {
        self.kind == ErrorKind::NoDomain
    }
}

/// Factory for management sessions.
///
/// One value is shared by the whole server; each request opens its own
/// [`Connection`] through it.
pub trait Hypervisor: Send + Sync {
    /// Backend name (e.g., "libvirt", "mock").
    fn name(&self) -> &'static str;

    /// Endpoint URI sessions are opened against.
    fn uri(&self) -> &str;

    /// Open a new management session.
    fn open(&self) -> HvResult<Box<dyn Connection>>;
}

/// An open management session.
pub trait Connection {
    /// List every domain visible on this connection, in hypervisor order.
    fn list_all_domains(&self) -> HvResult<Vec<Box<dyn DomainHandle>>>;

    /// Look up a domain by name.
    ///
    /// Must fail with [`ErrorKind::NoDomain`] when no such domain exists.
    fn lookup_by_name(&self, name: &str) -> HvResult<Box<dyn DomainHandle>>;

    /// Close the session. Calling this more than once is a no-op.
    fn close(&mut self) -> HvResult<()>;
}

/// Native reference to a hypervisor-side domain object.
///
/// Handles must be released with [`DomainHandle::free`]; the
/// [`ResourceTracker`](crate::domain::ResourceTracker) owns that call.
pub trait DomainHandle {
    /// Domain name as known to the hypervisor.
    fn name(&self) -> HvResult<String>;

    /// Fetch the descriptor markup.
    fn xml_desc(&self) -> HvResult<String>;

    /// Fetch the raw run-state code.
    fn state(&self) -> HvResult<u32>;

    /// Boot a defined, inactive domain.
    fn create(&self) -> HvResult<()>;

    /// Forcefully stop the domain.
    fn destroy(&self) -> HvResult<()>;

    /// Ask the guest to reboot.
    fn reboot(&self) -> HvResult<()>;

    /// Resume a paused domain.
    fn resume(&self) -> HvResult<()>;

    /// Pause a running domain.
    fn suspend(&self) -> HvResult<()>;

    /// Ask the guest to shut down gracefully.
    fn shutdown(&self) -> HvResult<()>;

    /// Release the native reference.
    fn free(&mut self) -> HvResult<()>;
}

/// Create the hypervisor backend for a URI.
///
/// `mock://` selects the in-process mock; anything else needs the `libvirt`
/// feature.
pub fn connect_backend(uri: &str) -> Result<Arc<dyn Hypervisor>> {
    if uri.starts_with(mock::SCHEME) {
        return Ok(Arc::new(MockHypervisor::with_sample_domains()));
    }

    #[cfg(feature = "libvirt")]
    {
        Ok(Arc::new(LibvirtHypervisor::new(uri)))
    }

    #[cfg(not(feature = "libvirt"))]
    {
        Err(crate::error::Error::config(format!(
            "cannot use '{}': built without the libvirt feature",
            uri
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_not_found_is_structural() {
        let err = HypervisorError::new(ErrorKind::NoDomain, "whatever the locale says");
        assert!(err.is_no_domain());

        // A message that merely mentions the phrase is not a not-found signal.
        let err = HypervisorError::new(ErrorKind::Internal, "Domain not found");
        assert!(!err.is_no_domain());
    }

    #[test]
    fn test_mock_scheme_selects_mock_backend() {
        let hv = connect_backend("mock:///default").unwrap();
        assert_eq!(hv.name(), "mock");
    }

    #[cfg(not(feature = "libvirt"))]
    #[test]
    fn test_libvirt_uri_without_feature_is_config_error() {
        let err = match connect_backend("qemu:///system") {
            Ok(_) => panic!("expected configuration error"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::Config(_)));
    }
}
