//! Docker Engine API `GET /containers/json` summaries.

use serde::Deserialize;
use tracing::debug;

use portall_common::model::discovery::DiscoveredPort;
use portall_common::model::host::HostId;
use portall_common::model::port::Protocol;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub ports: Vec<PortBinding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "IP", default)]
    pub ip: Option<String>,
    #[serde(rename = "PrivatePort")]
    pub private_port: u16,
    #[serde(rename = "PublicPort", default)]
    pub public_port: Option<u16>,
    #[serde(rename = "Type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "tcp".to_string()
}

impl ContainerSummary {
    /// Container name without Docker's leading `/`, falling back to a short id.
    pub fn name(&self) -> String {
        self.names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.chars().take(12).collect())
    }
}

/// Turns published bindings into discovery records.
///
/// Unpublished ports are skipped. A wildcard bind address stands for the
/// Docker host itself and is replaced by `host_ip`.
pub fn discovered_ports(containers: &[ContainerSummary], host_ip: &HostId) -> Vec<DiscoveredPort> {
    let mut out = Vec::new();

    for container in containers {
        let name = container.name();
        for binding in &container.ports {
            let Some(public) = binding.public_port.filter(|p| *p != 0) else {
                continue;
            };
            let Ok(protocol) = binding.kind.parse::<Protocol>() else {
                debug!(container = %name, kind = %binding.kind, "skipping unsupported port type");
                continue;
            };

            let host = match binding.ip.as_deref() {
                None | Some("") | Some("0.0.0.0") | Some("::") => host_ip.clone(),
                Some(ip) => HostId::new(ip),
            };

            out.push(DiscoveredPort {
                host,
                number: public,
                protocol,
                description: name.clone(),
                source: format!("{}/{}", binding.private_port, binding.kind.to_ascii_lowercase()),
            });
        }
    }

    out
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
