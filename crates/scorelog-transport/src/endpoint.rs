use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::mode::ChannelMode;
use crate::poll::wait_readable;

const FD_SIZE: libc::c_uint = std::mem::size_of::<libc::c_int>() as libc::c_uint;
/// Control buffer words; comfortably larger than `CMSG_SPACE` for one descriptor.
const CMSG_BUF_WORDS: usize = 8;

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

#[cfg(any(target_os = "linux", target_os = "android"))]
const RECV_FD_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RECV_FD_FLAGS: libc::c_int = 0;

/// Outcome of a single message read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Bytes copied into the caller's buffer.
    pub len: usize,
    /// The message did not fit and the kernel discarded the remainder.
    pub truncated: bool,
}

/// One side of a local two-endpoint channel.
///
/// Owns its descriptor: dropping the endpoint closes it exactly once.
/// Handing the endpoint to another process goes through
/// [`ChannelEndpoint::send_with_endpoint`], which duplicates the descriptor
/// into the receiver; the local copy stays open until it is dropped.
pub struct ChannelEndpoint {
    fd: OwnedFd,
    mode: ChannelMode,
}

impl ChannelEndpoint {
    /// Wrap an already-open socket descriptor.
    pub fn from_owned_fd(fd: OwnedFd, mode: ChannelMode) -> Self {
        Self { fd, mode }
    }

    /// Adopt a descriptor inherited from the parent process.
    ///
    /// The socket type is queried from the kernel; anything other than a
    /// seqpacket or datagram socket is rejected. A descriptor number that is
    /// not open is reported as an error without being adopted. The adopted
    /// descriptor is marked close-on-exec.
    ///
    /// # Safety
    ///
    /// If `fd` is open, nothing else in this process may own it.
    pub unsafe fn from_raw_inherited(fd: RawFd) -> Result<Self> {
        set_cloexec(fd, true)?;
        // SAFETY: `fd` is open (fcntl succeeded) and unowned per the caller.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        let mode = socket_mode(fd.as_fd())?;
        Ok(Self { fd, mode })
    }

    /// Socket type of this endpoint.
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Release the descriptor without closing it.
    pub fn into_owned_fd(self) -> OwnedFd {
        self.fd
    }

    /// Switch the descriptor between blocking and non-blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        let fd = self.fd.as_raw_fd();
        // SAFETY: `fd` is a valid descriptor owned by `self`.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        // SAFETY: `fd` is a valid descriptor owned by `self`.
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    /// Control whether the descriptor survives `exec` into a child process.
    ///
    /// Supervisors use this to pass a control endpoint to a spawned worker.
    pub fn set_inheritable(&self, inheritable: bool) -> Result<()> {
        set_cloexec(self.fd.as_raw_fd(), !inheritable)
    }

    /// Send one message (blocking unless the endpoint is non-blocking).
    pub fn send(&self, payload: &[u8]) -> io::Result<usize> {
        loop {
            // SAFETY: `payload` is a valid readable buffer of `payload.len()` bytes.
            let rc = unsafe {
                libc::send(
                    self.fd.as_raw_fd(),
                    payload.as_ptr().cast::<libc::c_void>(),
                    payload.len(),
                    SEND_FLAGS,
                )
            };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Receive one message into `buf`.
    ///
    /// A message longer than `buf` is cut short by the kernel; the
    /// remainder is lost and [`Received::truncated`] is set.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<Received> {
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast::<libc::c_void>(),
            iov_len: buf.len(),
        };
        // SAFETY: an all-zero msghdr is a valid empty header.
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;

        loop {
            // SAFETY: `msg` points at `iov`, which points at `buf`; both outlive the call.
            let rc = unsafe { libc::recvmsg(self.fd.as_raw_fd(), &mut msg, 0) };
            if rc >= 0 {
                return Ok(Received {
                    len: rc as usize,
                    truncated: msg.msg_flags & libc::MSG_TRUNC != 0,
                });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    /// Whether `received` marks the end of an ordered stream.
    ///
    /// A zero-length message is a legal datagram on both socket types, so a
    /// zero read alone proves nothing. It is end-of-stream only on an ordered
    /// channel whose peers have all hung up and that has no non-empty message
    /// left in its queue.
    pub fn at_end_of_stream(&self, received: Received) -> io::Result<bool> {
        if received.len != 0 || !self.mode.zero_read_is_eof() {
            return Ok(false);
        }
        let readiness = wait_readable(self.fd.as_fd(), Some(Duration::ZERO))?;
        if !readiness.is_some_and(|r| r.hangup) {
            return Ok(false);
        }

        let mut byte = 0u8;
        // SAFETY: `byte` is a valid one-byte buffer for the duration of the call.
        let rc = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                (&mut byte as *mut u8).cast::<libc::c_void>(),
                1,
                libc::MSG_PEEK | libc::MSG_DONTWAIT,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(true),
                _ => Err(err),
            };
        }
        Ok(rc == 0)
    }

    /// Send `payload` with a duplicate of `endpoint`'s descriptor attached.
    ///
    /// After this returns the receiving process holds its own copy of the
    /// descriptor. The caller still owns `endpoint` and decides when to close
    /// the local copy.
    pub fn send_with_endpoint(&self, payload: &[u8], endpoint: &ChannelEndpoint) -> Result<()> {
        let mut iov = libc::iovec {
            iov_base: payload.as_ptr() as *mut libc::c_void,
            iov_len: payload.len(),
        };
        let mut cmsg_buf = [0u64; CMSG_BUF_WORDS];

        // SAFETY: an all-zero msghdr is a valid empty header.
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = cmsg_buf.as_mut_ptr().cast::<libc::c_void>();
        // SAFETY: CMSG_SPACE is pure size arithmetic.
        msg.msg_controllen = unsafe { libc::CMSG_SPACE(FD_SIZE) } as _;

        // SAFETY: `msg_control` points at a zeroed, aligned buffer of at least
        // CMSG_SPACE(FD_SIZE) bytes, so CMSG_FIRSTHDR yields a header inside it
        // and CMSG_DATA has room for one descriptor.
        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            if cmsg.is_null() {
                return Err(TransportError::Ancillary(
                    "no room for control header".to_string(),
                ));
            }
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN(FD_SIZE) as _;
            std::ptr::write_unaligned(
                libc::CMSG_DATA(cmsg).cast::<libc::c_int>(),
                endpoint.fd.as_raw_fd(),
            );
        }

        loop {
            // SAFETY: `msg` references `iov` and `cmsg_buf`, both alive for the call.
            let rc = unsafe { libc::sendmsg(self.fd.as_raw_fd(), &msg, SEND_FLAGS) };
            if rc >= 0 {
                if rc as usize != payload.len() {
                    return Err(TransportError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short send: {rc} of {} bytes", payload.len()),
                    )));
                }
                debug!(
                    size = payload.len(),
                    mode = %endpoint.mode,
                    "sent message with endpoint descriptor"
                );
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        }
    }

    /// Receive one message and at most one attached endpoint descriptor.
    ///
    /// Descriptors beyond the first are closed and reported as an error.
    pub fn recv_with_endpoint(
        &self,
        buf: &mut [u8],
    ) -> Result<(Received, Option<ChannelEndpoint>)> {
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast::<libc::c_void>(),
            iov_len: buf.len(),
        };
        let mut cmsg_buf = [0u64; CMSG_BUF_WORDS];

        // SAFETY: an all-zero msghdr is a valid empty header.
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = cmsg_buf.as_mut_ptr().cast::<libc::c_void>();
        // SAFETY: CMSG_SPACE is pure size arithmetic.
        msg.msg_controllen = unsafe { libc::CMSG_SPACE(FD_SIZE) } as _;

        let len = loop {
            // SAFETY: `msg` references `iov` (pointing at `buf`) and `cmsg_buf`,
            // all of which outlive the call.
            let rc = unsafe { libc::recvmsg(self.fd.as_raw_fd(), &mut msg, RECV_FD_FLAGS) };
            if rc >= 0 {
                break rc as usize;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        };

        let mut received: Vec<OwnedFd> = Vec::new();
        if msg.msg_controllen as usize > 0 {
            // SAFETY: the kernel filled `cmsg_buf` and updated `msg_controllen`;
            // the CMSG_* macros only walk headers within that length.
            unsafe {
                let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
                while !cmsg.is_null() {
                    if (*cmsg).cmsg_level == libc::SOL_SOCKET
                        && (*cmsg).cmsg_type == libc::SCM_RIGHTS
                    {
                        let data_len = (*cmsg).cmsg_len as usize - libc::CMSG_LEN(0) as usize;
                        let count = data_len / FD_SIZE as usize;
                        let data = libc::CMSG_DATA(cmsg).cast::<libc::c_int>();
                        for i in 0..count {
                            let raw = std::ptr::read_unaligned(data.add(i));
                            received.push(OwnedFd::from_raw_fd(raw));
                        }
                    }
                    cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
                }
            }
        }

        if msg.msg_flags & libc::MSG_CTRUNC != 0 {
            return Err(TransportError::Ancillary(
                "control data truncated".to_string(),
            ));
        }
        if received.len() > 1 {
            return Err(TransportError::Ancillary(format!(
                "expected at most one descriptor, got {}",
                received.len()
            )));
        }

        let endpoint = match received.pop() {
            Some(fd) => {
                if RECV_FD_FLAGS == 0 {
                    set_cloexec(fd.as_raw_fd(), true)?;
                }
                let mode = socket_mode(fd.as_fd())?;
                Some(ChannelEndpoint { fd, mode })
            }
            None => None,
        };

        Ok((
            Received {
                len,
                truncated: msg.msg_flags & libc::MSG_TRUNC != 0,
            },
            endpoint,
        ))
    }
}

impl AsFd for ChannelEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for ChannelEndpoint {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl std::fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("fd", &self.fd.as_raw_fd())
            .field("mode", &self.mode)
            .finish()
    }
}

pub(crate) fn set_cloexec(fd: RawFd, cloexec: bool) -> Result<()> {
    // SAFETY: `fd` is an open descriptor owned by the caller.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error().into());
    }
    let flags = if cloexec {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    // SAFETY: `fd` is an open descriptor owned by the caller.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags) } < 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

fn socket_mode(fd: BorrowedFd<'_>) -> Result<ChannelMode> {
    let mut ty: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

    // SAFETY: `ty` and `len` are valid writable pointers for the provided sizes,
    // and `fd` is an open descriptor borrowed for the duration of the call.
    let rc = unsafe {
        libc::getsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_TYPE,
            (&mut ty as *mut libc::c_int).cast::<libc::c_void>(),
            &mut len,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }

    match ty {
        libc::SOCK_SEQPACKET => Ok(ChannelMode::SeqPacket),
        libc::SOCK_DGRAM => Ok(ChannelMode::Datagram),
        other => Err(TransportError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("descriptor is not a message socket (type {other})"),
        ))),
    }
}
