use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use portall_common::discovery::DiscoverySource;
use portall_common::model::discovery::DiscoveredPort;
use portall_common::model::host::HostId;
use portall_protocols::docker::{self, ContainerSummary};

pub const DEFAULT_ENDPOINT: u32 = 1;

/// Lists published container ports through Portainer's Docker proxy.
pub struct PortainerSource {
    url: String,
    token: String,
    endpoint_id: u32,
    host_ip: HostId,
    client: Client,
}

impl PortainerSource {
    pub fn new(url: &str, token: impl Into<String>, endpoint_id: u32) -> anyhow::Result<Self> {
        let url = url.trim().trim_end_matches('/').to_string();
        let host_ip = host_of(&url)?;
        Ok(Self {
            url,
            token: token.into(),
            endpoint_id,
            host_ip,
            client: crate::http_client()?,
        })
    }

    pub fn host_ip(&self) -> &HostId {
        &self.host_ip
    }

    /// Connection test against `GET /api/endpoints`.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .get(format!("{}/api/endpoints", self.url))
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("connecting to Portainer at {}", self.url))?;

        if !response.status().is_success() {
            bail!("Portainer at {} answered {}", self.url, response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoverySource for PortainerSource {
    fn name(&self) -> &str {
        "portainer"
    }

    async fn discover(&self) -> anyhow::Result<Vec<DiscoveredPort>> {
        let url = format!(
            "{}/api/endpoints/{}/docker/containers/json",
            self.url, self.endpoint_id
        );
        let containers: Vec<ContainerSummary> = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("connecting to Portainer at {}", self.url))?
            .error_for_status()
            .context("listing containers")?
            .json()
            .await
            .context("decoding container list")?;

        debug!(
            containers = containers.len(),
            endpoint = self.endpoint_id,
            "portainer containers listed"
        );
        Ok(docker::discovered_ports(&containers, &self.host_ip))
    }
}

fn host_of(url: &str) -> anyhow::Result<HostId> {
    let parsed = Url::parse(url).with_context(|| format!("invalid Portainer URL {url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Portainer URL {url} has no host"))?;
    Ok(HostId::new(host.trim_start_matches('[').trim_end_matches(']')))
}
