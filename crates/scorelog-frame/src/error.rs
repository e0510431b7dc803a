/// Errors that can occur while encoding, decoding or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is shorter than the fixed header.
    #[error("frame too short ({len} bytes, header needs {min})")]
    TooShort { len: usize, min: usize },

    /// The declared symbol count does not match the bytes that follow the header.
    #[error("bad length: {declared} elements announced but {available} available")]
    CountMismatch {
        declared: u32,
        available: usize,
        /// Bytes left over after the last whole symbol result.
        trailing: usize,
    },

    /// The datagram did not fit the read buffer and was cut short.
    #[error("frame exceeds maximum size of {max} bytes and was truncated")]
    Oversized { max: usize },

    /// An event is too large to be sent as a single frame.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the channel.
    #[error("channel closed")]
    ConnectionClosed,
}

impl FrameError {
    /// The frame itself was bad; the channel is still usable.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::TooShort { .. }
                | FrameError::CountMismatch { .. }
                | FrameError::Oversized { .. }
        )
    }

    /// The read would have blocked or was interrupted; retry on next readiness.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::Interrupted
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
