use std::collections::BTreeMap;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use portall_common::model::discovery::{CanonicalPort, DiscoveredPort};
use portall_common::model::host::{HostGroup, HostId};
use portall_common::model::port::{PortAssignment, PortKey, Protocol};

/// Form body of `POST /move_port`.
#[derive(Debug, Serialize)]
pub struct MovePortForm<'a> {
    pub port_number: u16,
    pub source_ip: &'a str,
    pub target_ip: &'a str,
    pub protocol: Protocol,
}

impl<'a> MovePortForm<'a> {
    pub fn new(port: PortKey, source: &'a HostId, target: &'a HostId) -> Self {
        Self {
            port_number: port.number,
            source_ip: source.as_str(),
            target_ip: target.as_str(),
            protocol: port.protocol,
        }
    }
}

/// JSON body of `POST /update_port_order`. The API orders by port number.
#[derive(Debug, Serialize)]
pub struct PortOrderBody<'a> {
    pub ip: &'a str,
    pub port_order: Vec<u16>,
}

impl<'a> PortOrderBody<'a> {
    pub fn new(host: &'a HostId, order: &[PortKey]) -> Self {
        Self {
            ip: host.as_str(),
            port_order: order.iter().map(|key| key.number).collect(),
        }
    }
}

/// JSON body of `POST /add_discovered_port`.
#[derive(Debug, Serialize)]
pub struct DiscoveredPortBody<'a> {
    pub host_ip: &'a str,
    pub host_port: u16,
    pub container_name: &'a str,
    pub container_port: &'a str,
    pub port_protocol: Protocol,
}

impl<'a> From<&'a DiscoveredPort> for DiscoveredPortBody<'a> {
    fn from(port: &'a DiscoveredPort) -> Self {
        Self {
            host_ip: port.host.as_str(),
            host_port: port.number,
            container_name: &port.description,
            container_port: &port.source,
            port_protocol: port.protocol,
        }
    }
}

/// The `{success, message}` envelope every mutating endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub port: Option<PortRecord>,
}

impl ApiResponse {
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// A port row as the API returns it, both from `/move_port` and from
/// `/export_entries`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub ip_address: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub port_number: u16,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_protocol")]
    pub port_protocol: String,
    #[serde(default)]
    pub order: Option<i64>,
}

fn default_protocol() -> String {
    Protocol::Tcp.to_string()
}

impl PortRecord {
    pub fn protocol(&self) -> anyhow::Result<Protocol> {
        self.port_protocol
            .parse::<Protocol>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("port {} on {}", self.port_number, self.ip_address))
    }

    pub fn to_canonical(&self) -> anyhow::Result<CanonicalPort> {
        Ok(CanonicalPort {
            id: self.id,
            host: HostId::new(self.ip_address.clone()),
            number: self.port_number,
            protocol: self.protocol()?,
            description: self.description.clone(),
        })
    }
}

/// Builds host groups from exported rows: grouped by address, ordered by the
/// stored `order` (rows without one go last, in export order), renumbered.
pub fn host_groups(records: Vec<PortRecord>) -> anyhow::Result<Vec<HostGroup>> {
    let mut grouped: BTreeMap<String, (Option<String>, Vec<(i64, usize, PortAssignment)>)> =
        BTreeMap::new();

    for (idx, record) in records.into_iter().enumerate() {
        let protocol = record.protocol()?;
        if record.port_number == 0 {
            bail!("port 0 on {} is not a valid assignment", record.ip_address);
        }

        let (nickname, ports) = grouped.entry(record.ip_address.clone()).or_default();
        if nickname.is_none() {
            *nickname = record.nickname.clone().filter(|n| !n.is_empty());
        }
        let key = PortKey::new(record.port_number, protocol);
        if ports.iter().any(|(_, _, p)| p.key() == key) {
            debug!(host = %record.ip_address, port = %key, "skipping duplicate export row");
            continue;
        }
        ports.push((
            record.order.unwrap_or(i64::MAX),
            idx,
            PortAssignment::new(record.port_number, protocol, record.description),
        ));
    }

    Ok(grouped
        .into_iter()
        .map(|(ip, (nickname, mut ports))| {
            ports.sort_by_key(|(order, idx, _)| (*order, *idx));
            let mut group = HostGroup::new(ip).with_ports(ports.into_iter().map(|(_, _, p)| p));
            group.nickname = nickname;
            group
        })
        .collect())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
