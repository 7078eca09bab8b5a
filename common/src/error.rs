use thiserror::Error;

use crate::model::host::HostId;
use crate::model::port::PortKey;

/// Failure reported by the remote authority. The message is opaque to the
/// engine; only the success/failure distinction is acted upon.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("operation in progress")]
    Busy,

    #[error("{0}")]
    RemoteRejected(String),

    #[error("{0}")]
    TransportFailure(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("unknown host {0}")]
    UnknownHost(HostId),

    #[error("port {port} is not assigned to {host}")]
    UnknownPort { host: HostId, port: PortKey },

    #[error("port {port} is already assigned to {host}")]
    Duplicate { host: HostId, port: PortKey },
}

impl From<AuthorityError> for EngineError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Rejected(msg) => EngineError::RemoteRejected(msg),
            AuthorityError::Transport(msg) => EngineError::TransportFailure(msg),
        }
    }
}
