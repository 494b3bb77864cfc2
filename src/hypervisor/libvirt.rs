//! libvirt backend built on the `virt` bindings.

use virt::connect::Connect;
use virt::domain::Domain;
use virt::error::ErrorNumber;

use super::{Connection, DomainHandle, ErrorKind, HvResult, Hypervisor, HypervisorError};

/// Hypervisor reached through a libvirt URI (e.g. `qemu:///system`).
pub struct LibvirtHypervisor {
    uri: String,
}

impl LibvirtHypervisor {
    /// Create a backend for the given URI. No session is opened yet.
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
        }
    }
}

impl Hypervisor for LibvirtHypervisor {
    fn name(&self) -> &'static str {
        "libvirt"
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn open(&self) -> HvResult<Box<dyn Connection>> {
        tracing::debug!(uri = %self.uri, "opening libvirt connection");
        let conn = Connect::open(Some(self.uri.as_str())).map_err(|e| {
            HypervisorError::new(ErrorKind::NoConnect, e.to_string())
        })?;
        Ok(Box::new(LibvirtConnection { conn: Some(conn) }))
    }
}

/// Map a libvirt error onto the client error taxonomy.
fn convert(err: virt::error::Error) -> HypervisorError {
    let kind = match err.code() {
        ErrorNumber::NoDomain => ErrorKind::NoDomain,
        ErrorNumber::NoConnect => ErrorKind::NoConnect,
        ErrorNumber::OperationInvalid => ErrorKind::OperationInvalid,
        _ => ErrorKind::Internal,
    };
    HypervisorError::new(kind, err.to_string())
}

struct LibvirtConnection {
    conn: Option<Connect>,
}

impl LibvirtConnection {
    fn conn(&self) -> HvResult<&Connect> {
        self.conn
            .as_ref()
            .ok_or_else(|| HypervisorError::new(ErrorKind::Internal, "connection already closed"))
    }
}

impl Connection for LibvirtConnection {
    fn list_all_domains(&self) -> HvResult<Vec<Box<dyn DomainHandle>>> {
        let domains = self.conn()?.list_all_domains(0).map_err(convert)?;
        Ok(domains
            .into_iter()
            .map(|d| Box::new(LibvirtDomain { dom: Some(d) }) as Box<dyn DomainHandle>)
            .collect())
    }

    fn lookup_by_name(&self, name: &str) -> HvResult<Box<dyn DomainHandle>> {
        let dom = Domain::lookup_by_name(self.conn()?, name).map_err(convert)?;
        Ok(Box::new(LibvirtDomain { dom: Some(dom) }))
    }

    fn close(&mut self) -> HvResult<()> {
        if let Some(mut conn) = self.conn.take() {
            conn.close().map_err(convert)?;
        }
        Ok(())
    }
}

struct LibvirtDomain {
    dom: Option<Domain>,
}

impl LibvirtDomain {
    fn dom(&self) -> HvResult<&Domain> {
        self.dom
            .as_ref()
            .ok_or_else(|| HypervisorError::new(ErrorKind::Internal, "domain handle already freed"))
    }
}

impl DomainHandle for LibvirtDomain {
    fn name(&self) -> HvResult<String> {
        self.dom()?.get_name().map_err(convert)
    }

    fn xml_desc(&self) -> HvResult<String> {
        self.dom()?.get_xml_desc(0).map_err(convert)
    }

    fn state(&self) -> HvResult<u32> {
        let (state, _reason) = self.dom()?.get_state().map_err(convert)?;
        Ok(state as u32)
    }

    fn create(&self) -> HvResult<()> {
        self.dom()?.create().map(|_| ()).map_err(convert)
    }

    fn destroy(&self) -> HvResult<()> {
        self.dom()?.destroy().map(|_| ()).map_err(convert)
    }

    fn reboot(&self) -> HvResult<()> {
        self.dom()?.reboot(0).map(|_| ()).map_err(convert)
    }

    fn resume(&self) -> HvResult<()> {
        self.dom()?.resume().map(|_| ()).map_err(convert)
    }

    fn suspend(&self) -> HvResult<()> {
        self.dom()?.suspend().map(|_| ()).map_err(convert)
    }

    fn shutdown(&self) -> HvResult<()> {
        self.dom()?.shutdown().map(|_| ()).map_err(convert)
    }

    fn free(&mut self) -> HvResult<()> {
        // Taken before the native call so a second release is a no-op.
        if let Some(mut dom) = self.dom.take() {
            dom.free().map_err(convert)?;
        }
        Ok(())
    }
}
