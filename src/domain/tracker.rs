//! Per-request registry of native domain handles.
//!
//! Every handle acquired while serving a request is registered here and
//! released exactly once when the tracker drains, whatever the outcome of the
//! request. Handles are addressed through [`HandleId`]s so a released handle
//! can never be reached again.

use crate::error::{Error, Result};
use crate::hypervisor::DomainHandle;

/// Index of a handle registered with a [`ResourceTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(usize);

/// Outcome of a drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Handles released successfully.
    pub released: usize,
    /// Handles whose release call failed.
    pub failed: usize,
}

/// Ordered list of handles pending release.
#[derive(Default)]
pub struct ResourceTracker {
    // `None` once released; slots are never reused.
    slots: Vec<Option<Box<dyn DomainHandle>>>,
    drained: bool,
}

impl ResourceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a handle until the tracker drains.
    ///
    /// Registering after [`drain`](Self::drain) is a bug in the caller. Debug
    /// builds panic; release builds free the handle on the spot so it cannot
    /// leak, and hand back an id that resolves to nothing.
    pub fn register(&mut self, handle: Box<dyn DomainHandle>) -> HandleId {
        debug_assert!(!self.drained, "handle registered after tracker drained");
        let id = HandleId(self.slots.len());
        self.slots.push(Some(handle));
        if self.drained {
            tracing::error!("handle registered after tracker drained, releasing immediately");
            self.release(id);
        }
        id
    }

    /// Borrow a registered handle.
    pub fn get(&self, id: HandleId) -> Result<&dyn DomainHandle> {
        self.slots
            .get(id.0)
            .and_then(|slot| slot.as_deref())
            .ok_or(Error::HandleReleased)
    }

    /// Release one handle ahead of the drain.
    ///
    /// Returns false if it had already been released.
    pub fn release(&mut self, id: HandleId) -> bool {
        match self.slots.get_mut(id.0).and_then(Option::take) {
            Some(handle) => {
                free_handle(handle);
                true
            }
            None => false,
        }
    }

    /// Number of handles still awaiting release.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether the tracker has drained.
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Release every pending handle in registration order.
    ///
    /// A failed release is logged and does not stop the rest. Draining twice
    /// is a no-op.
    pub fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        if self.drained {
            return report;
        }
        self.drained = true;

        for handle in self.slots.iter_mut().filter_map(Option::take) {
            if free_handle(handle) {
                report.released += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::debug!(
            released = report.released,
            failed = report.failed,
            "released domain handles"
        );
        report
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        self.drain();
    }
}

fn free_handle(mut handle: Box<dyn DomainHandle>) -> bool {
    match handle.free() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "failed to release domain handle");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::{ErrorKind, HvResult, HypervisorError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Handle that records release calls and optionally fails them.
    struct FakeHandle {
        frees: Arc<AtomicUsize>,
        fail: bool,
    }

    impl FakeHandle {
        fn boxed(frees: &Arc<AtomicUsize>, fail: bool) -> Box<dyn DomainHandle> {
            Box::new(Self {
                frees: frees.clone(),
                fail,
            })
        }
    }

    fn unsupported<T>() -> HvResult<T> {
        Err(HypervisorError::new(ErrorKind::Internal, "unsupported"))
    }

    impl DomainHandle for FakeHandle {
        fn name(&self) -> HvResult<String> {
            Ok("fake".into())
        }
        fn xml_desc(&self) -> HvResult<String> {
            unsupported()
        }
        fn state(&self) -> HvResult<u32> {
            unsupported()
        }
        fn create(&self) -> HvResult<()> {
            unsupported()
        }
        fn destroy(&self) -> HvResult<()> {
            unsupported()
        }
        fn reboot(&self) -> HvResult<()> {
            unsupported()
        }
        fn resume(&self) -> HvResult<()> {
            unsupported()
        }
        fn suspend(&self) -> HvResult<()> {
            unsupported()
        }
        fn shutdown(&self) -> HvResult<()> {
            unsupported()
        }
        fn free(&mut self) -> HvResult<()> {
            self.frees.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HypervisorError::new(ErrorKind::Internal, "free failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_drain_releases_each_handle_once() {
        let frees = Arc::new(AtomicUsize::new(0));
        let mut tracker = ResourceTracker::new();
        for _ in 0..3 {
            tracker.register(FakeHandle::boxed(&frees, false));
        }
        assert_eq!(tracker.pending(), 3);

        let report = tracker.drain();
        assert_eq!(report, DrainReport { released: 3, failed: 0 });
        assert_eq!(frees.load(Ordering::SeqCst), 3);

        // Second drain and drop are no-ops.
        assert_eq!(tracker.drain(), DrainReport::default());
        drop(tracker);
        assert_eq!(frees.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_release_does_not_block_the_rest() {
        let frees = Arc::new(AtomicUsize::new(0));
        let mut tracker = ResourceTracker::new();
        tracker.register(FakeHandle::boxed(&frees, false));
        tracker.register(FakeHandle::boxed(&frees, true));
        tracker.register(FakeHandle::boxed(&frees, false));

        let report = tracker.drain();
        assert_eq!(report, DrainReport { released: 2, failed: 1 });
        assert_eq!(frees.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_early_release_is_idempotent() {
        let frees = Arc::new(AtomicUsize::new(0));
        let mut tracker = ResourceTracker::new();
        let first = tracker.register(FakeHandle::boxed(&frees, false));
        let second = tracker.register(FakeHandle::boxed(&frees, false));

        assert!(tracker.release(first));
        assert!(!tracker.release(first));
        assert!(matches!(tracker.get(first), Err(Error::HandleReleased)));
        assert!(tracker.get(second).is_ok());

        assert_eq!(tracker.drain().released, 1);
        assert_eq!(frees.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_drains() {
        let frees = Arc::new(AtomicUsize::new(0));
        {
            let mut tracker = ResourceTracker::new();
            tracker.register(FakeHandle::boxed(&frees, false));
            tracker.register(FakeHandle::boxed(&frees, false));
        }
        assert_eq!(frees.load(Ordering::SeqCst), 2);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "registered after tracker drained")]
    fn test_register_after_drain_is_a_bug() {
        let frees = Arc::new(AtomicUsize::new(0));
        let mut tracker = ResourceTracker::new();
        tracker.drain();
        tracker.register(FakeHandle::boxed(&frees, false));
    }
}
