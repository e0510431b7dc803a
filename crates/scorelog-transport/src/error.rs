use std::path::PathBuf;

use crate::mode::ChannelMode;

/// Errors that can occur in channel transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Neither the ordered nor the datagram socket pair could be created.
    #[error("cannot create channel pair: seqpacket: {seqpacket}; datagram: {datagram}")]
    ChannelUnavailable {
        seqpacket: std::io::Error,
        datagram: std::io::Error,
    },

    /// Creating a socket pair in a single mode failed.
    #[error("failed to create {mode} socket pair: {source}")]
    Create {
        mode: ChannelMode,
        source: std::io::Error,
    },

    /// Failed to open or lock the startup barrier file.
    #[error("startup barrier {path}: {source}")]
    Barrier {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A message exceeds what the receiving buffer can hold.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Ancillary data carried something other than a single descriptor.
    #[error("unexpected ancillary data: {0}")]
    Ancillary(String),

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed its end of the channel.
    #[error("channel closed by peer")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
