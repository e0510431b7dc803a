use std::io;
use std::os::fd::{FromRawFd, OwnedFd};

use tracing::{debug, info};

use crate::endpoint::ChannelEndpoint;
use crate::error::{Result, TransportError};
use crate::mode::ChannelMode;

/// Both ends of a freshly created channel.
///
/// `local` is kept by the process that created the pair; `peer` is meant to
/// be handed to another process.
#[derive(Debug)]
pub struct ChannelPair {
    pub local: ChannelEndpoint,
    pub peer: ChannelEndpoint,
}

impl ChannelPair {
    fn new(local: OwnedFd, peer: OwnedFd, mode: ChannelMode) -> Self {
        Self {
            local: ChannelEndpoint::from_owned_fd(local, mode),
            peer: ChannelEndpoint::from_owned_fd(peer, mode),
        }
    }

    /// Socket type shared by both endpoints.
    pub fn mode(&self) -> ChannelMode {
        self.local.mode()
    }
}

/// Create a local channel pair, ordered mode first, datagram as fallback.
pub fn establish() -> Result<ChannelPair> {
    establish_with(socket_pair)
}

/// Create a channel pair with an explicit pair factory.
///
/// `create` is tried with [`ChannelMode::SeqPacket`] and, if that fails, once
/// with [`ChannelMode::Datagram`]. There is no further retry.
pub fn establish_with<F>(mut create: F) -> Result<ChannelPair>
where
    F: FnMut(ChannelMode) -> io::Result<(OwnedFd, OwnedFd)>,
{
    let seqpacket = match create(ChannelMode::SeqPacket) {
        Ok((local, peer)) => {
            info!(mode = %ChannelMode::SeqPacket, "created channel pair");
            return Ok(ChannelPair::new(local, peer, ChannelMode::SeqPacket));
        }
        Err(err) => {
            debug!(error = %err, "seqpacket socket pair unavailable, trying datagram");
            err
        }
    };

    match create(ChannelMode::Datagram) {
        Ok((local, peer)) => {
            info!(mode = %ChannelMode::Datagram, "created channel pair");
            Ok(ChannelPair::new(local, peer, ChannelMode::Datagram))
        }
        Err(datagram) => Err(TransportError::ChannelUnavailable {
            seqpacket,
            datagram,
        }),
    }
}

/// Create an `AF_UNIX` socket pair of the given type, close-on-exec.
pub fn socket_pair(mode: ChannelMode) -> io::Result<(OwnedFd, OwnedFd)> {
    let ty = match mode {
        ChannelMode::SeqPacket => libc::SOCK_SEQPACKET,
        ChannelMode::Datagram => libc::SOCK_DGRAM,
    };
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let ty = ty | libc::SOCK_CLOEXEC;

    let mut fds = [-1 as libc::c_int; 2];
    // SAFETY: `fds` is a writable array of two descriptors as socketpair requires.
    let rc = unsafe { libc::socketpair(libc::AF_UNIX, ty, 0, fds.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: socketpair succeeded, so both descriptors are open and unowned.
    let (local, peer) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        use std::os::fd::AsRawFd;
        crate::endpoint::set_cloexec(local.as_raw_fd(), true).map_err(to_io)?;
        crate::endpoint::set_cloexec(peer.as_raw_fd(), true).map_err(to_io)?;
    }

    Ok((local, peer))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn to_io(err: TransportError) -> io::Error {
    match err {
        TransportError::Io(io) => io,
        other => io::Error::other(other.to_string()),
    }
}
