use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

/// Readiness reported for a descriptor by [`wait_readable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Data (or an end-of-stream marker) can be read without blocking.
    pub readable: bool,
    /// The peer hung up.
    pub hangup: bool,
    /// The descriptor is in an error state or invalid.
    pub error: bool,
}

impl Readiness {
    /// Hang-up or error with nothing left to read.
    pub fn is_dead(&self) -> bool {
        !self.readable && (self.hangup || self.error)
    }
}

/// Wait until `fd` is readable or `timeout` elapses.
///
/// Returns `Ok(None)` on timeout and when the wait was interrupted by a
/// signal, so callers can re-check their shutdown state. `None` as timeout
/// waits indefinitely.
pub fn wait_readable(fd: BorrowedFd<'_>, timeout: Option<Duration>) -> io::Result<Option<Readiness>> {
    let timeout_ms: libc::c_int = match timeout {
        Some(t) => t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    };

    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    // SAFETY: `pfd` is a single valid pollfd and the count passed is 1.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(None);
        }
        return Err(err);
    }
    if rc == 0 {
        return Ok(None);
    }

    Ok(Some(Readiness {
        readable: pfd.revents & libc::POLLIN != 0,
        hangup: pfd.revents & libc::POLLHUP != 0,
        error: pfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0,
    }))
}
