use portall_common::model::host::HostId;
use portall_common::notify::{Notifier, NotifyKind};
use portall_common::{error, success};
use tracing::debug;

/// Prints engine notifications as status lines.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, kind: NotifyKind) {
        match kind {
            NotifyKind::Success => success!("{message}"),
            NotifyKind::Error => error!("{message}"),
        }
    }

    fn hosts_changed(&self, hosts: &[HostId]) {
        debug!(?hosts, "hosts changed");
    }
}
