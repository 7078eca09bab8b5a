use serde::{Deserialize, Serialize};

use super::host::HostId;
use super::port::{PortAssignment, PortKey, Protocol};

/// A port reported by an integration (Docker, Portainer, ...), not yet known
/// to the local collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPort {
    pub host: HostId,
    pub number: u16,
    pub protocol: Protocol,
    pub description: String,
    /// Where the port came from, e.g. the container port `80/tcp`.
    pub source: String,
}

impl DiscoveredPort {
    pub fn key(&self) -> PortKey {
        PortKey::new(self.number, self.protocol)
    }

    pub fn to_assignment(&self) -> PortAssignment {
        PortAssignment::new(self.number, self.protocol, self.description.clone())
    }
}

/// The authority's record of a port after it accepted a relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPort {
    pub id: Option<u64>,
    pub host: HostId,
    pub number: u16,
    pub protocol: Protocol,
    pub description: String,
}

impl CanonicalPort {
    pub fn key(&self) -> PortKey {
        PortKey::new(self.number, self.protocol)
    }
}
