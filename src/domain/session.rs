//! Request-scoped hypervisor session.
//!
//! A [`Session`] owns one management connection and the request's
//! [`ResourceTracker`]. Every handle obtained through it is registered with
//! the tracker at acquisition. Closing the session (explicitly or on drop)
//! releases all handles and then the connection, on every exit path.

use super::action::{self, DomainAction};
use super::descriptor::{self, DomainDescriptor};
use super::tracker::{DrainReport, HandleId, ResourceTracker};
use crate::error::{Error, Result};
use crate::hypervisor::{Connection, Hypervisor};

/// One request's view of the hypervisor.
pub struct Session {
    uri: String,
    tracker: ResourceTracker,
    // Taken on close.
    connection: Option<Box<dyn Connection>>,
}

impl Session {
    /// Open a management session.
    pub fn open(hypervisor: &dyn Hypervisor) -> Result<Self> {
        let uri = hypervisor.uri().to_string();
        let connection = hypervisor.open().map_err(|source| {
            tracing::error!(uri = %uri, error = %source, "failed to open hypervisor session");
            Error::Connection {
                uri: uri.clone(),
                source,
            }
        })?;
        tracing::debug!(uri = %uri, "opened hypervisor session");

        Ok(Self {
            uri,
            tracker: ResourceTracker::new(),
            connection: Some(connection),
        })
    }

    fn connection(&self) -> Result<&dyn Connection> {
        self.connection.as_deref().ok_or_else(|| {
            Error::config(format!("session for {} is already closed", self.uri))
        })
    }

    /// Resolve a domain by name.
    ///
    /// A missing domain yields [`Error::DomainNotFound`]; it is recognized
    /// only by the client's structured not-found signal.
    pub fn lookup(&mut self, name: &str) -> Result<HandleId> {
        let handle = self.connection()?.lookup_by_name(name).map_err(|e| {
            if e.is_no_domain() {
                Error::DomainNotFound {
                    name: name.to_string(),
                }
            } else {
                Error::hypervisor("look up domain", e)
            }
        })?;
        Ok(self.tracker.register(handle))
    }

    /// Enumerate every domain, in hypervisor order.
    pub fn enumerate(&mut self) -> Result<Vec<HandleId>> {
        let handles = self
            .connection()?
            .list_all_domains()
            .map_err(|e| Error::hypervisor("list domains", e))?;
        Ok(handles
            .into_iter()
            .map(|h| self.tracker.register(h))
            .collect())
    }

    /// Snapshot a resolved domain.
    pub fn describe(&self, id: HandleId) -> Result<DomainDescriptor> {
        descriptor::build(self.tracker.get(id)?)
    }

    /// Apply a lifecycle action and snapshot the result.
    pub fn perform(&self, id: HandleId, action: DomainAction) -> Result<DomainDescriptor> {
        action::dispatch(self.tracker.get(id)?, action)
    }

    /// Release one handle before the session ends.
    pub fn release(&mut self, id: HandleId) -> bool {
        self.tracker.release(id)
    }

    /// Release all handles, then the connection.
    pub fn close(mut self) -> DrainReport {
        self.shutdown()
    }

    fn shutdown(&mut self) -> DrainReport {
        let report = self.tracker.drain();
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                tracing::warn!(uri = %self.uri, error = %e, "failed to close hypervisor session");
            }
            tracing::debug!(
                uri = %self.uri,
                released = report.released,
                failed = report.failed,
                "closed hypervisor session"
            );
        }
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run `f` inside a fresh session that is closed however `f` exits.
pub fn with_session<T>(
    hypervisor: &dyn Hypervisor,
    f: impl FnOnce(&mut Session) -> Result<T>,
) -> Result<T> {
    let mut session = Session::open(hypervisor)?;
    let outcome = f(&mut session);
    session.close();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainState;
    use crate::hypervisor::MockHypervisor;

    #[test]
    fn test_lookup_and_describe() {
        let hv = MockHypervisor::with_sample_domains();
        let descriptor = with_session(&hv, |s| {
            let id = s.lookup("vm3")?;
            s.describe(id)
        })
        .unwrap();
        assert_eq!(descriptor.name, "vm3");
        assert_eq!(descriptor.state, DomainState::Paused);
        assert!(hv.stats().is_balanced());
    }

    #[test]
    fn test_missing_domain_is_not_found() {
        let hv = MockHypervisor::with_sample_domains();
        let err = with_session(&hv, |s| s.lookup("nope")).unwrap_err();
        assert!(err.is_not_found());
        assert!(hv.stats().is_balanced());
    }

    #[test]
    fn test_enumerate_registers_every_handle() {
        let hv = MockHypervisor::with_sample_domains();
        let mut session = Session::open(&hv).unwrap();
        let ids = session.enumerate().unwrap();
        assert_eq!(ids.len(), 3);

        let report = session.close();
        assert_eq!(report.released, 3);
        let stats = hv.stats();
        assert_eq!(stats.handles_acquired, 3);
        assert!(stats.is_balanced());
    }

    #[test]
    fn test_drop_releases_on_error_path() {
        let hv = MockHypervisor::with_sample_domains();
        hv.set_state_code("vm1", 42);
        {
            let mut session = Session::open(&hv).unwrap();
            let id = session.lookup("vm1").unwrap();
            assert!(matches!(
                session.describe(id),
                Err(Error::StateMapping { code: 42, .. })
            ));
            // Session dropped without an explicit close.
        }
        assert!(hv.stats().is_balanced());
    }

    #[test]
    fn test_early_release_counts_once() {
        let hv = MockHypervisor::with_sample_domains();
        let mut session = Session::open(&hv).unwrap();
        let id = session.lookup("vm2").unwrap();
        assert!(session.release(id));
        assert!(!session.release(id));
        assert!(matches!(session.describe(id), Err(Error::HandleReleased)));
        assert_eq!(session.close().released, 0);
        assert!(hv.stats().is_balanced());
    }

    #[test]
    fn test_unreachable_hypervisor_is_connection_error() {
        let hv = MockHypervisor::with_sample_domains();
        hv.set_unreachable(true);
        let err = with_session(&hv, |s| s.enumerate()).unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }
}
