//! # Portall Common
//!
//! Shared vocabulary for every crate in the workspace.
//!
//! * **[`model`]**: Host groups, port assignments and discovery records.
//! * **[`error`]**: The error taxonomy surfaced by the engine and its collaborators.
//! * **[`authority`]**, **[`notify`]**, **[`discovery`]**: Outbound ports, implemented
//!   by adapters in `portall-core`, `portall-plugins` and the CLI.
//! * **[`config`]**: Engine tunables.

pub mod authority;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod notify;

#[doc(hidden)]
pub use tracing as __tracing;

/// Logs a neutral status line.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "portall::info", $($arg)*)
    };
}

/// Logs a completed action.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "portall::success", $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!(target: "portall::warn", $($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!(target: "portall::error", $($arg)*)
    };
}
