use crate::model::discovery::CanonicalPort;
use crate::model::host::HostId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
}

/// User-facing notification sink. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NotifyKind);

    /// The listed hosts changed and should be re-rendered.
    fn hosts_changed(&self, _hosts: &[HostId]) {}
}

/// Caller hooks for a single relocation (typically a drag-and-drop gesture).
pub trait RelocationHooks: Send + Sync {
    /// Undo view state the engine does not own, e.g. a detached drag element.
    fn cancel_drop(&self) {}

    fn on_success(&self, _port: &CanonicalPort) {}
}

/// Hooks that do nothing, for callers without view state.
pub struct NoHooks;

impl RelocationHooks for NoHooks {}
