//! # Portall Protocols
//!
//! Wire formats spoken with the outside world.
//!
//! * **[`wire`]**: Request and response bodies of the Portall HTTP API, and
//!   conversion of exported entries into host groups.
//! * **[`docker`]**: The Docker Engine container summary and how its published
//!   ports become discovery records.

pub mod docker;
pub mod wire;
