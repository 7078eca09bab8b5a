use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use portall_common::discovery::DiscoverySource;
use portall_common::model::discovery::DiscoveredPort;
use portall_common::model::host::HostId;
use portall_protocols::docker::{self, ContainerSummary};

/// Lists published container ports from a Docker daemon exposed over TCP.
pub struct DockerSource {
    host_ip: HostId,
    base_url: String,
    client: Client,
}

impl DockerSource {
    /// `socket_url` may be `tcp://host:2375` or `http://host:2375`.
    pub fn new(host_ip: impl Into<HostId>, socket_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            host_ip: host_ip.into(),
            base_url: normalize_url(socket_url)?,
            client: crate::http_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Connection test against `GET /_ping`.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let url = format!("{}/_ping", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("connecting to Docker at {}", self.base_url))?;

        if !response.status().is_success() {
            bail!("Docker at {} answered {}", self.base_url, response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoverySource for DockerSource {
    fn name(&self) -> &str {
        "docker"
    }

    async fn discover(&self) -> anyhow::Result<Vec<DiscoveredPort>> {
        let url = format!("{}/containers/json", self.base_url);
        let containers: Vec<ContainerSummary> = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("connecting to Docker at {}", self.base_url))?
            .error_for_status()
            .context("listing containers")?
            .json()
            .await
            .context("decoding container list")?;

        debug!(containers = containers.len(), "docker containers listed");
        Ok(docker::discovered_ports(&containers, &self.host_ip))
    }
}

fn normalize_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim().trim_end_matches('/');
    if raw.starts_with("unix://") || raw.starts_with("npipe://") {
        bail!("only TCP Docker daemons are supported, got {raw}");
    }

    let url = match raw.strip_prefix("tcp://") {
        Some(rest) => format!("http://{rest}"),
        None if raw.starts_with("http://") || raw.starts_with("https://") => raw.to_string(),
        None => format!("http://{raw}"),
    };
    Ok(url)
}
