//! Local channel transport for the scorelog relay.
//!
//! Provides the pieces the relay worker needs from the operating system:
//! - socket-pair channels, ordered (`SOCK_SEQPACKET`) with a datagram fallback
//! - descriptor transfer to another process over a control socket
//! - readiness polling
//! - a cross-process startup barrier backed by a lock file
//!
//! This is the lowest layer of scorelog. Everything else builds on the
//! [`ChannelEndpoint`] type provided here.

pub mod error;
pub mod mode;

#[cfg(unix)]
pub mod barrier;
#[cfg(unix)]
pub mod endpoint;
#[cfg(unix)]
pub mod pair;
#[cfg(unix)]
pub mod poll;

pub use error::{Result, TransportError};
pub use mode::ChannelMode;

#[cfg(unix)]
pub use barrier::{BarrierGuard, StartupBarrier};
#[cfg(unix)]
pub use endpoint::{ChannelEndpoint, Received};
#[cfg(unix)]
pub use pair::{establish, establish_with, ChannelPair};
#[cfg(unix)]
pub use poll::{wait_readable, Readiness};
