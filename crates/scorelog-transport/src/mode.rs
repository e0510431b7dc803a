use std::fmt;

/// Socket type backing a channel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// Ordered, reliable, message-boundary-preserving (`SOCK_SEQPACKET`).
    SeqPacket,
    /// Unordered datagrams (`SOCK_DGRAM`).
    Datagram,
}

impl ChannelMode {
    /// Short name used in logs and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelMode::SeqPacket => "seqpacket",
            ChannelMode::Datagram => "datagram",
        }
    }

    /// Whether a zero-length read signals that the peer went away.
    ///
    /// Datagram sockets can carry empty datagrams, so only the
    /// connection-oriented mode reports closure this way.
    pub fn zero_read_is_eof(self) -> bool {
        matches!(self, ChannelMode::SeqPacket)
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
