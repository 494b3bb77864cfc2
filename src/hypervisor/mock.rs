//! In-process hypervisor for development and tests.
//!
//! Selected by `mock://` URIs. Domains live in memory, transitions follow the
//! usual lifecycle rules, and every connection and handle is counted so leak
//! and double-release bugs show up in tests.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Connection, DomainHandle, ErrorKind, HvResult, Hypervisor, HypervisorError};
use crate::domain::DomainState;

/// URI scheme that selects this backend.
pub const SCHEME: &str = "mock://";

/// Default URI for the mock backend.
pub const DEFAULT_URI: &str = "mock:///default";

const RUNNING: u32 = 1;
const PAUSED: u32 = 3;
const SHUTOFF: u32 = 5;

#[derive(Debug, Clone)]
struct MockDomain {
    name: String,
    xml: String,
    state: u32,
}

#[derive(Default)]
struct Counters {
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    handles_acquired: AtomicUsize,
    handles_freed: AtomicUsize,
    double_frees: AtomicUsize,
}

struct Inner {
    uri: String,
    domains: Mutex<Vec<MockDomain>>,
    counters: Counters,
    unreachable: AtomicBool,
}

/// Snapshot of connection and handle accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    /// Sessions opened.
    pub connections_opened: usize,
    /// Sessions closed.
    pub connections_closed: usize,
    /// Domain handles handed out by lookup or enumeration.
    pub handles_acquired: usize,
    /// Domain handles released.
    pub handles_freed: usize,
    /// Release calls on an already-released handle.
    pub double_frees: usize,
}

impl HandleStats {
    /// Every connection closed and every handle freed exactly once.
    pub fn is_balanced(&self) -> bool {
        self.connections_opened == self.connections_closed
            && self.handles_acquired == self.handles_freed
            && self.double_frees == 0
    }
}

/// In-memory hypervisor.
///
/// Cloning shares the underlying domain set and counters.
#[derive(Clone)]
pub struct MockHypervisor {
    inner: Arc<Inner>,
}

impl MockHypervisor {
    /// Create an empty mock hypervisor.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                uri: DEFAULT_URI.to_string(),
                domains: Mutex::new(Vec::new()),
                counters: Counters::default(),
                unreachable: AtomicBool::new(false),
            }),
        }
    }

    /// Create a mock with `vm1` (running), `vm2` (shutoff) and `vm3` (paused).
    pub fn with_sample_domains() -> Self {
        let hv = Self::new();
        hv.add_domain("vm1", DomainState::Running);
        hv.add_domain("vm2", DomainState::Shutoff);
        hv.add_domain("vm3", DomainState::Paused);
        hv
    }

    /// Define a domain with generated descriptor markup.
    pub fn add_domain(&self, name: &str, state: DomainState) {
        let mut domains = self.inner.domains.lock();
        let index = domains.len() + 1;
        domains.push(MockDomain {
            name: name.to_string(),
            xml: sample_xml(name, index),
            state: state.code(),
        });
    }

    /// Define a domain with caller-supplied markup and a raw state code.
    pub fn add_domain_with_xml(&self, name: &str, xml: impl Into<String>, state_code: u32) {
        self.inner.domains.lock().push(MockDomain {
            name: name.to_string(),
            xml: xml.into(),
            state: state_code,
        });
    }

    /// Overwrite a domain's raw state code.
    pub fn set_state_code(&self, name: &str, code: u32) {
        if let Some(d) = self.inner.domains.lock().iter_mut().find(|d| d.name == name) {
            d.state = code;
        }
    }

    /// Make subsequent session opens fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Current accounting snapshot.
    pub fn stats(&self) -> HandleStats {
        let c = &self.inner.counters;
        HandleStats {
            connections_opened: c.connections_opened.load(Ordering::SeqCst),
            connections_closed: c.connections_closed.load(Ordering::SeqCst),
            handles_acquired: c.handles_acquired.load(Ordering::SeqCst),
            handles_freed: c.handles_freed.load(Ordering::SeqCst),
            double_frees: c.double_frees.load(Ordering::SeqCst),
        }
    }
}

impl Default for MockHypervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Hypervisor for MockHypervisor {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn uri(&self) -> &str {
        &self.inner.uri
    }

    fn open(&self) -> HvResult<Box<dyn Connection>> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(HypervisorError::new(
                ErrorKind::NoConnect,
                format!("Failed to connect to '{}': Connection refused", self.inner.uri),
            ));
        }
        self.inner
            .counters
            .connections_opened
            .fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            inner: self.inner.clone(),
            closed: false,
        }))
    }
}

struct MockConnection {
    inner: Arc<Inner>,
    closed: bool,
}

impl MockConnection {
    fn ensure_open(&self) -> HvResult<()> {
        if self.closed {
            return Err(HypervisorError::new(
                ErrorKind::Internal,
                "invalid connection pointer",
            ));
        }
        Ok(())
    }

    fn handle(&self, name: &str) -> Box<dyn DomainHandle> {
        self.inner
            .counters
            .handles_acquired
            .fetch_add(1, Ordering::SeqCst);
        Box::new(MockDomainHandle {
            name: name.to_string(),
            inner: self.inner.clone(),
            freed: false,
        })
    }
}

impl Connection for MockConnection {
    fn list_all_domains(&self) -> HvResult<Vec<Box<dyn DomainHandle>>> {
        self.ensure_open()?;
        let names: Vec<String> = self
            .inner
            .domains
            .lock()
            .iter()
            .map(|d| d.name.clone())
            .collect();
        Ok(names.iter().map(|n| self.handle(n)).collect())
    }

    fn lookup_by_name(&self, name: &str) -> HvResult<Box<dyn DomainHandle>> {
        self.ensure_open()?;
        let exists = self.inner.domains.lock().iter().any(|d| d.name == name);
        if !exists {
            return Err(no_domain(name));
        }
        Ok(self.handle(name))
    }

    fn close(&mut self) -> HvResult<()> {
        if !self.closed {
            self.closed = true;
            self.inner
                .counters
                .connections_closed
                .fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct MockDomainHandle {
    name: String,
    inner: Arc<Inner>,
    freed: bool,
}

impl MockDomainHandle {
    fn with_domain<T>(&self, f: impl FnOnce(&mut MockDomain) -> HvResult<T>) -> HvResult<T> {
        if self.freed {
            return Err(HypervisorError::new(
                ErrorKind::Internal,
                "invalid domain pointer",
            ));
        }
        let mut domains = self.inner.domains.lock();
        let domain = domains
            .iter_mut()
            .find(|d| d.name == self.name)
            .ok_or_else(|| no_domain(&self.name))?;
        f(domain)
    }

    fn transition(&self, allowed: &[u32], target: u32, refusal: &str) -> HvResult<()> {
        self.with_domain(|d| {
            if !allowed.contains(&d.state) {
                return Err(invalid_operation(refusal));
            }
            d.state = target;
            Ok(())
        })
    }
}

impl DomainHandle for MockDomainHandle {
    fn name(&self) -> HvResult<String> {
        self.with_domain(|d| Ok(d.name.clone()))
    }

    fn xml_desc(&self) -> HvResult<String> {
        self.with_domain(|d| Ok(d.xml.clone()))
    }

    fn state(&self) -> HvResult<u32> {
        self.with_domain(|d| Ok(d.state))
    }

    fn create(&self) -> HvResult<()> {
        self.transition(&[SHUTOFF], RUNNING, "domain is already running")
    }

    fn destroy(&self) -> HvResult<()> {
        self.with_domain(|d| {
            if d.state == SHUTOFF {
                return Err(invalid_operation("domain is not running"));
            }
            d.state = SHUTOFF;
            Ok(())
        })
    }

    fn reboot(&self) -> HvResult<()> {
        self.transition(&[RUNNING], RUNNING, "domain is not running")
    }

    fn resume(&self) -> HvResult<()> {
        self.transition(&[PAUSED], RUNNING, "domain is not paused")
    }

    fn suspend(&self) -> HvResult<()> {
        self.with_domain(|d| match d.state {
            RUNNING => {
                d.state = PAUSED;
                Ok(())
            }
            PAUSED => Err(invalid_operation("domain is already paused")),
            _ => Err(invalid_operation("domain is not running")),
        })
    }

    fn shutdown(&self) -> HvResult<()> {
        self.transition(&[RUNNING], SHUTOFF, "domain is not running")
    }

    fn free(&mut self) -> HvResult<()> {
        if self.freed {
            self.inner.counters.double_frees.fetch_add(1, Ordering::SeqCst);
            return Err(HypervisorError::new(
                ErrorKind::Internal,
                format!("domain handle for '{}' freed twice", self.name),
            ));
        }
        self.freed = true;
        self.inner.counters.handles_freed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn no_domain(name: &str) -> HypervisorError {
    HypervisorError::new(
        ErrorKind::NoDomain,
        format!("Domain not found: no domain with matching name '{}'", name),
    )
}

fn invalid_operation(reason: &str) -> HypervisorError {
    HypervisorError::new(
        ErrorKind::OperationInvalid,
        format!("Requested operation is not valid: {}", reason),
    )
}

/// Generate descriptor markup for a sample domain.
fn sample_xml(name: &str, index: usize) -> String {
    format!(
        r#"<domain type='kvm' id='{index}'>
  <name>{name}</name>
  <uuid>6f1c2a3e-9b4d-4e7a-8c10-{index:012x}</uuid>
  <memory unit='KiB'>1048576</memory>
  <currentMemory unit='KiB'>1048576</currentMemory>
  <vcpu placement='static'>2</vcpu>
  <os>
    <type arch='x86_64' machine='pc-i440fx-2.1'>hvm</type>
    <boot dev='hd'/>
  </os>
  <devices>
    <emulator>/usr/bin/qemu-system-x86_64</emulator>
    <disk type='file' device='disk'>
      <driver name='qemu' type='qcow2'/>
      <source file='/var/lib/libvirt/images/{name}.qcow2'/>
      <target dev='vda' bus='virtio'/>
    </disk>
    <controller type='usb' index='0'/>
    <disk type='block' device='cdrom'>
      <driver name='qemu' type='raw'/>
      <source dev='/dev/sr0'/>
      <target dev='hdc' bus='ide'/>
      <readonly/>
    </disk>
    <interface type='network'>
      <mac address='52:54:00:00:00:{index:02x}'/>
      <source network='default'/>
      <model type='virtio'/>
      <filterref filter='clean-traffic'>
        <parameter name='IP' value='192.168.122.{index}'/>
      </filterref>
    </interface>
    <interface type='bridge'>
      <mac address='52:54:00:00:01:{index:02x}'/>
      <source bridge='br0'/>
    </interface>
  </devices>
</domain>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(hv: &MockHypervisor) -> Box<dyn Connection> {
        match hv.open() {
            Ok(c) => c,
            Err(e) => panic!("open failed: {e}"),
        }
    }

    #[test]
    fn test_lookup_missing_domain_is_no_domain() {
        let hv = MockHypervisor::with_sample_domains();
        let conn = open(&hv);
        let err = match conn.lookup_by_name("ghost") {
            Ok(_) => panic!("expected lookup failure"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::NoDomain);
        assert!(err.message().contains("ghost"));
    }

    #[test]
    fn test_list_preserves_definition_order() {
        let hv = MockHypervisor::with_sample_domains();
        let conn = open(&hv);
        let names: Vec<String> = conn
            .list_all_domains()
            .unwrap()
            .iter()
            .map(|h| h.name().unwrap())
            .collect();
        assert_eq!(names, ["vm1", "vm2", "vm3"]);
    }

    #[test]
    fn test_transitions_follow_lifecycle() {
        let hv = MockHypervisor::with_sample_domains();
        let conn = open(&hv);
        let vm1 = conn.lookup_by_name("vm1").unwrap();

        vm1.suspend().unwrap();
        assert_eq!(vm1.state().unwrap(), PAUSED);
        assert_eq!(
            vm1.suspend().unwrap_err().kind(),
            ErrorKind::OperationInvalid
        );
        vm1.resume().unwrap();
        vm1.reboot().unwrap();
        assert_eq!(vm1.state().unwrap(), RUNNING);
        vm1.destroy().unwrap();
        assert_eq!(vm1.state().unwrap(), SHUTOFF);
        assert!(vm1.shutdown().is_err());
        vm1.create().unwrap();
        assert_eq!(vm1.state().unwrap(), RUNNING);
        vm1.shutdown().unwrap();
        assert_eq!(vm1.state().unwrap(), SHUTOFF);
    }

    #[test]
    fn test_accounting_detects_double_free() {
        let hv = MockHypervisor::with_sample_domains();
        let mut conn = open(&hv);
        let mut handle = conn.lookup_by_name("vm2").unwrap();
        handle.free().unwrap();
        assert!(handle.free().is_err());
        conn.close().unwrap();
        conn.close().unwrap();

        let stats = hv.stats();
        assert_eq!(stats.handles_acquired, 1);
        assert_eq!(stats.handles_freed, 1);
        assert_eq!(stats.double_frees, 1);
        assert_eq!(stats.connections_closed, 1);
        assert!(!stats.is_balanced());
    }

    #[test]
    fn test_unreachable_endpoint_refuses_sessions() {
        let hv = MockHypervisor::with_sample_domains();
        hv.set_unreachable(true);
        let err = match hv.open() {
            Ok(_) => panic!("expected connection failure"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), ErrorKind::NoConnect);
        assert_eq!(hv.stats().connections_opened, 0);
    }
}
