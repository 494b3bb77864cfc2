//! Domain snapshots, lifecycle actions and request-scoped handle management.
//!
//! - [`Session`]: One management connection plus the request's handle tracker
//! - [`ResourceTracker`]: Exactly-once release of native handles
//! - [`DomainDescriptor`]: Point-in-time snapshot built from a handle
//! - [`DomainAction`]: Closed set of lifecycle transitions

pub mod action;
pub mod descriptor;
pub mod session;
pub mod state;
pub mod tracker;

pub use action::{dispatch, DomainAction, UnknownAction};
pub use descriptor::{
    build, Devices, Disk, DiskDriver, DiskSource, DiskTarget, DomainConfig, DomainDescriptor,
    FilterParameter, FilterRef, Interface, InterfaceMac, InterfaceModel, InterfaceSource, Os,
    OsBoot, OsType,
};
pub use session::{with_session, Session};
pub use state::{DomainState, UnknownStateCode};
pub use tracker::{DrainReport, HandleId, ResourceTracker};
