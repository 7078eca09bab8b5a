//! Discovery sources feeding the engine's merge.

pub mod docker;
pub mod portainer;

pub use docker::DockerSource;
pub use portainer::PortainerSource;

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> anyhow::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("building HTTP client")
}
