//! Score telemetry relay for a mail-filter worker pool.
//!
//! A relay worker creates a private socket-pair channel, hands one end to
//! the supervising process and reads fixed-layout score frames from the
//! other end, delivering each decoded event to a list of handlers.
//!
//! # Crate Structure
//!
//! - [`transport`]: socket-pair channels, descriptor transfer, startup barrier
//! - [`frame`]: score-event wire format with datagram reader and writer
//! - [`relay`]: registration handshake, dispatch loop and handler registry
//!   (behind the `relay` feature)

/// Re-export transport types.
pub mod transport {
    pub use scorelog_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use scorelog_frame::*;
}

/// Re-export relay types (requires `relay` feature).
#[cfg(feature = "relay")]
pub mod relay {
    pub use scorelog_relay::*;
}
