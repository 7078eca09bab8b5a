//! [`RemoteAuthority`] over the Portall HTTP API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use portall_common::authority::RemoteAuthority;
use portall_common::error::AuthorityError;
use portall_common::model::discovery::{CanonicalPort, DiscoveredPort};
use portall_common::model::host::{HostGroup, HostId};
use portall_common::model::port::PortKey;
use portall_protocols::wire::{
    self, ApiResponse, DiscoveredPortBody, MovePortForm, PortOrderBody, PortRecord,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct HttpAuthority {
    client: Client,
    base_url: String,
}

impl HttpAuthority {
    pub fn new(config: AuthorityConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn request_relocate(
        &self,
        port: PortKey,
        source: &HostId,
        target: &HostId,
    ) -> Result<CanonicalPort, AuthorityError> {
        let form = MovePortForm::new(port, source, target);
        let response = self
            .client
            .post(self.url("/move_port"))
            .form(&form)
            .send()
            .await
            .map_err(transport)?;

        let body = envelope(response).await?;
        match body.port {
            Some(record) => record
                .to_canonical()
                .map_err(|e| AuthorityError::Transport(format!("{e:#}"))),
            // Older servers answer without the row; the move itself succeeded.
            None => Ok(CanonicalPort {
                id: None,
                host: target.clone(),
                number: port.number,
                protocol: port.protocol,
                description: String::new(),
            }),
        }
    }

    async fn request_reorder(
        &self,
        host: &HostId,
        order: &[PortKey],
    ) -> Result<(), AuthorityError> {
        let response = self
            .client
            .post(self.url("/update_port_order"))
            .json(&PortOrderBody::new(host, order))
            .send()
            .await
            .map_err(transport)?;

        envelope(response).await.map(|_| ())
    }

    async fn request_add_discovered_port(
        &self,
        port: &DiscoveredPort,
    ) -> Result<(), AuthorityError> {
        let response = self
            .client
            .post(self.url("/add_discovered_port"))
            .json(&DiscoveredPortBody::from(port))
            .send()
            .await
            .map_err(transport)?;

        envelope(response).await.map(|_| ())
    }

    async fn fetch_collection(&self) -> Result<Vec<HostGroup>, AuthorityError> {
        let response = self
            .client
            .get(self.url("/export_entries"))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthorityError::Transport(format!("export failed with {status}")));
        }

        let records: Vec<PortRecord> = response.json().await.map_err(transport)?;
        debug!(rows = records.len(), "fetched export entries");
        wire::host_groups(records).map_err(|e| AuthorityError::Transport(format!("{e:#}")))
    }
}

/// Decodes the `{success, message}` envelope. A decodable `success: false`
/// is a rejection regardless of status code; anything undecodable is a
/// transport failure.
async fn envelope(response: Response) -> Result<ApiResponse, AuthorityError> {
    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    match serde_json::from_str::<ApiResponse>(&text) {
        Ok(body) if body.success && status.is_success() => Ok(body),
        Ok(body) => Err(AuthorityError::Rejected(
            body.message_or(&format!("request failed with {status}")),
        )),
        Err(e) if status.is_success() => Err(AuthorityError::Transport(format!(
            "undecodable response: {e}"
        ))),
        Err(_) => Err(AuthorityError::Transport(format!(
            "request failed with {status}"
        ))),
    }
}

fn transport(err: reqwest::Error) -> AuthorityError {
    AuthorityError::Transport(err.to_string())
}
