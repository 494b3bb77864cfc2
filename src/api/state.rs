//! API server state.

use std::sync::Arc;
use std::time::Duration;

use crate::api::error::ApiError;
use crate::domain::{with_session, Session};
use crate::error::Result;
use crate::hypervisor::Hypervisor;

/// Shared API server state.
///
/// Holds nothing mutable: each request opens its own session through the
/// hypervisor and releases everything before responding.
pub struct ApiState {
    hypervisor: Arc<dyn Hypervisor>,
    request_timeout: Duration,
}

impl ApiState {
    /// Create API state for a hypervisor backend.
    pub fn new(hypervisor: Arc<dyn Hypervisor>) -> Self {
        Self {
            hypervisor,
            request_timeout: Duration::from_secs(300),
        }
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The hypervisor backend.
    pub fn hypervisor(&self) -> &dyn Hypervisor {
        self.hypervisor.as_ref()
    }

    /// Run blocking hypervisor work inside a request-scoped session.
    ///
    /// The session, and every handle acquired through it, is released before
    /// this returns, whether `f` succeeded, failed or panicked.
    pub async fn run<T, F>(&self, f: F) -> std::result::Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T> + Send + 'static,
    {
        let hypervisor = self.hypervisor.clone();
        let outcome = tokio::task::spawn_blocking(move || with_session(hypervisor.as_ref(), f))
            .await?;

        outcome.map_err(|e| {
            if e.is_not_found() {
                tracing::debug!(error = %e, "request failed");
            } else {
                tracing::warn!(error = %e, "request failed");
            }
            ApiError::from(e)
        })
    }
}
