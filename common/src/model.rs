//! # Domain Models
//!
//! ## Core Entities
//! * [`host::HostGroup`]: A host address together with its ordered port list.
//! * [`port::PortAssignment`]: One number+protocol bound to a host.
//!
//! ## Value Objects
//! * [`host::HostId`], [`port::PortKey`], [`port::Protocol`].
//! * [`discovery::DiscoveredPort`]: A port reported by an external integration.
//! * [`discovery::CanonicalPort`]: The authority's view of a port after a relocation.

pub mod discovery;
pub mod host;
pub mod port;
