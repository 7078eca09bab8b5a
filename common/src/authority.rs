use async_trait::async_trait;

use crate::error::AuthorityError;
use crate::model::discovery::{CanonicalPort, DiscoveredPort};
use crate::model::host::{HostGroup, HostId};
use crate::model::port::PortKey;

/// The remote service that persists assignments and has the final word on
/// their validity.
///
/// Every call is a single round trip. The engine never retries; a failure is
/// terminal for the operation that issued it.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    async fn request_relocate(
        &self,
        port: PortKey,
        source: &HostId,
        target: &HostId,
    ) -> Result<CanonicalPort, AuthorityError>;

    async fn request_reorder(&self, host: &HostId, order: &[PortKey]) -> Result<(), AuthorityError>;

    async fn request_add_discovered_port(
        &self,
        port: &DiscoveredPort,
    ) -> Result<(), AuthorityError>;

    /// Returns the full authoritative collection. Used on reload.
    async fn fetch_collection(&self) -> Result<Vec<HostGroup>, AuthorityError>;
}
