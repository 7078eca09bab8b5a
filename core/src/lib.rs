//! # Portall Core
//!
//! The reconciliation engine and its HTTP adapter.
//!
//! * **[`engine`]**: The [`Engine`] handle, state ownership and host patch hooks.
//! * **[`relocate`]**, **[`reorder`]**, **[`merge`]**: The three mutating
//!   operations, each built on the lock/snapshot/settle cycle.
//! * **[`registry`]**, **[`snapshot`]**, **[`collection`]**: Bookkeeping owned
//!   by the engine state.
//! * **[`authority`]**: [`HttpAuthority`], the production [`RemoteAuthority`].
//!
//! [`RemoteAuthority`]: portall_common::authority::RemoteAuthority

pub mod authority;
pub mod collection;
pub mod engine;
pub mod merge;
pub mod registry;
pub mod relocate;
pub mod reorder;
pub mod snapshot;

pub use authority::{AuthorityConfig, HttpAuthority};
pub use engine::Engine;
pub use merge::{MergeFailure, MergeReport};
pub use relocate::{PendingRelocation, RelocateOutcome, RelocateRequest, Relocation};
