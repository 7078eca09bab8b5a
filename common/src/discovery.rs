use async_trait::async_trait;

use crate::model::discovery::DiscoveredPort;

/// An external integration that can list ports currently exposed somewhere.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(&self) -> anyhow::Result<Vec<DiscoveredPort>>;
}
