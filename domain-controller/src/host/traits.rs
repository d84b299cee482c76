use async_trait::async_trait;
use domain_model::{HostId, ServerIdentity, ServerUpdate, UpdateFailure};
use std::time::Duration;

/// The abstraction for "the hosts".
/// Implement this for an in-process simulation, a remote management channel, etc.
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// Applies each server's update on `host`.
    ///
    /// The engine calls this at most once per host and dispatch, never retries,
    /// and treats an `Err` (or an answer later than `timeout`) as a host
    /// failure. Implementations should apply to all listed servers or none.
    async fn apply_to_host(
        &self,
        host: &HostId,
        updates: &[(ServerIdentity, ServerUpdate)],
        timeout: Duration,
    ) -> Result<(), UpdateFailure>;
}
