//! virtrest - HTTP lifecycle control for hypervisor-managed virtual machines.
//!
//! Each HTTP request opens its own hypervisor session, resolves domains,
//! takes point-in-time snapshots or applies lifecycle transitions, and
//! releases every native handle before responding.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod hypervisor;

pub use api::ApiDoc;
pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
