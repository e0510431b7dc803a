/// Errors that can occur in relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] scorelog_transport::TransportError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The supervisor answered the registration with a failure status.
    #[error("registration refused by supervisor (status {0})")]
    RegistrationRefused(i32),

    /// The other side sent something the protocol does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The other side went away.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The relay was driven out of order.
    #[error("invalid relay state: {0}")]
    InvalidState(String),
}

impl RelayError {
    /// The operation would have blocked or was interrupted.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::Transport(scorelog_transport::TransportError::Io(err)) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use std::io::{Error, ErrorKind};

    use scorelog_transport::TransportError;

    use super::*;

    #[test]
    fn only_blocking_transport_errors_are_transient() {
        let would_block = RelayError::from(TransportError::Io(Error::from(ErrorKind::WouldBlock)));
        assert!(would_block.is_transient());

        let reset = RelayError::from(TransportError::Io(Error::from(ErrorKind::ConnectionReset)));
        assert!(!reset.is_transient());
        assert!(!RelayError::Disconnected("control channel closed".into()).is_transient());
        assert!(!RelayError::RegistrationRefused(1).is_transient());
    }
}
