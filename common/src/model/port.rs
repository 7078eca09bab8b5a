use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("TCP"),
            Protocol::Udp => f.write_str("UDP"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

/// Identifies a port within one host. Two assignments on the same host may
/// never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortKey {
    pub number: u16,
    pub protocol: Protocol,
}

impl PortKey {
    pub fn new(number: u16, protocol: Protocol) -> Self {
        Self { number, protocol }
    }

    pub fn tcp(number: u16) -> Self {
        Self::new(number, Protocol::Tcp)
    }

    pub fn udp(number: u16) -> Self {
        Self::new(number, Protocol::Udp)
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

impl FromStr for PortKey {
    type Err = String;

    /// Parses `"80"`, `"80/tcp"` or `"53/UDP"`. A bare number is TCP.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number_str, protocol) = match s.split_once('/') {
            Some((number, proto)) => (number, proto.parse::<Protocol>()?),
            None => (s, Protocol::Tcp),
        };

        let number = number_str
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid port number '{number_str}': {e}"))?;

        if number == 0 {
            return Err("port number must be between 1 and 65535".to_string());
        }

        Ok(Self { number, protocol })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Committed,
    PendingRelocate,
    PendingReorder,
    /// A discovered port whose remote add has not settled yet.
    PendingAdd,
    /// A discovered port the authority refused; pruned when its merge finishes.
    Conflict,
}

impl PortState {
    pub fn is_pending(&self) -> bool {
        !matches!(self, PortState::Committed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAssignment {
    pub number: u16,
    pub protocol: Protocol,
    pub description: String,
    pub position: usize,
    pub state: PortState,
}

impl PortAssignment {
    pub fn new(number: u16, protocol: Protocol, description: impl Into<String>) -> Self {
        Self {
            number,
            protocol,
            description: description.into(),
            position: 0,
            state: PortState::Committed,
        }
    }

    pub fn key(&self) -> PortKey {
        PortKey::new(self.number, self.protocol)
    }
}
