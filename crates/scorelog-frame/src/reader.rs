use std::os::fd::{AsFd, BorrowedFd};

use scorelog_transport::ChannelEndpoint;
use tracing::{debug, trace};

use crate::codec::{decode_score_event, FrameConfig, ScoreEvent};
use crate::error::{FrameError, Result};

/// Reads score events from a message-oriented channel endpoint.
///
/// Each call consumes exactly one datagram into a buffer of
/// `max_frame_size` bytes. There is no reassembly: a frame that does not
/// fit is reported as [`FrameError::Oversized`] and dropped.
pub struct FrameReader {
    inner: ChannelEndpoint,
    buf: Vec<u8>,
    config: FrameConfig,
}

impl FrameReader {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: ChannelEndpoint) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: ChannelEndpoint, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: vec![0u8; config.max_frame_size],
            config,
        }
    }

    /// Read and decode the next frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when an ordered channel
    /// reads zero bytes after every peer hung up. An empty message from a
    /// live peer is just a short frame. Malformed frames come back as errors
    /// for which [`FrameError::is_malformed`] is true; the channel stays usable.
    pub fn read_event(&mut self) -> Result<ScoreEvent> {
        let received = self.inner.recv(&mut self.buf)?;

        if self.inner.at_end_of_stream(received)? {
            debug!(mode = %self.inner.mode(), "telemetry channel reached end of stream");
            return Err(FrameError::ConnectionClosed);
        }
        if received.truncated {
            debug!(
                max = self.buf.len(),
                "frame truncated by the kernel, discarding remainder"
            );
            return Err(FrameError::Oversized {
                max: self.buf.len(),
            });
        }

        trace!(len = received.len, "received frame");
        decode_score_event(&self.buf[..received.len])
    }

    /// Borrow the underlying endpoint.
    pub fn get_ref(&self) -> &ChannelEndpoint {
        &self.inner
    }

    /// Consume the reader and return the inner endpoint.
    pub fn into_inner(self) -> ChannelEndpoint {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl AsFd for FrameReader {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use scorelog_transport::{establish, establish_with, ChannelMode};

    use super::*;
    use crate::codec::{encode_score_event, frame_size, HEADER_SIZE};
    use crate::writer::FrameWriter;

    fn event(symbols: usize) -> ScoreEvent {
        (0..symbols).fold(ScoreEvent::new(4.0, 6.0, 1), |ev, i| {
            ev.with_symbol(i as i32, i as f64 * 0.5)
        })
    }

    #[test]
    fn read_events_in_send_order() {
        let pair = establish().unwrap();
        let mut writer = FrameWriter::new(pair.peer);
        let mut reader = FrameReader::new(pair.local);

        for n in 0..4 {
            writer.send_event(&event(n)).unwrap();
        }
        for n in 0..4 {
            assert_eq!(reader.read_event().unwrap(), event(n));
        }
    }

    #[test]
    fn malformed_frame_keeps_channel_usable() {
        let pair = establish().unwrap();
        let mut reader = FrameReader::new(pair.local);

        pair.peer.send(&[1, 2, 3]).unwrap();
        let mut wire = BytesMut::new();
        encode_score_event(&event(2), &mut wire).unwrap();
        pair.peer.send(&wire).unwrap();

        let err = reader.read_event().unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(err, FrameError::TooShort { len: 3, .. }));
        assert_eq!(reader.read_event().unwrap(), event(2));
    }

    #[test]
    fn count_mismatch_over_channel() {
        let pair = establish().unwrap();
        let mut reader = FrameReader::new(pair.local);

        let mut wire = BytesMut::new();
        encode_score_event(&event(2), &mut wire).unwrap();
        wire[0] = 3;
        pair.peer.send(&wire).unwrap();

        assert!(matches!(
            reader.read_event(),
            Err(FrameError::CountMismatch {
                declared: 3,
                available: 2,
                ..
            })
        ));
    }

    #[test]
    fn oversized_frame_is_rejected_not_reassembled() {
        let pair = establish().unwrap();
        let config = FrameConfig {
            max_frame_size: frame_size(2),
        };
        let mut reader = FrameReader::with_config(pair.local, config);

        let mut wire = BytesMut::new();
        encode_score_event(&event(5), &mut wire).unwrap();
        pair.peer.send(&wire).unwrap();
        let mut ok = BytesMut::new();
        encode_score_event(&event(1), &mut ok).unwrap();
        pair.peer.send(&ok).unwrap();

        let err = reader.read_event().unwrap_err();
        assert!(matches!(err, FrameError::Oversized { max } if max == frame_size(2)));
        assert_eq!(reader.read_event().unwrap(), event(1));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn seqpacket_close_reports_connection_closed() {
        let pair = establish().unwrap();
        let mut reader = FrameReader::new(pair.local);
        drop(pair.peer);

        assert!(matches!(
            reader.read_event(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn seqpacket_empty_message_from_live_peer_is_too_short() {
        let pair = establish().unwrap();
        assert_eq!(pair.local.mode(), ChannelMode::SeqPacket);
        let mut writer = FrameWriter::new(pair.peer);
        let mut reader = FrameReader::new(pair.local);

        writer.get_ref().send(&[]).unwrap();
        writer.send_event(&event(1)).unwrap();

        let err = reader.read_event().unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(err, FrameError::TooShort { len: 0, min: HEADER_SIZE }));
        assert_eq!(reader.read_event().unwrap(), event(1));
    }

    #[test]
    fn empty_datagram_is_too_short_not_closed() {
        let pair = establish_with(|mode| match mode {
            ChannelMode::SeqPacket => {
                Err(std::io::Error::from_raw_os_error(libc::EPROTONOSUPPORT))
            }
            ChannelMode::Datagram => scorelog_transport::pair::socket_pair(mode),
        })
        .unwrap();
        let mut reader = FrameReader::new(pair.local);
        pair.peer.send(&[]).unwrap();

        assert!(matches!(
            reader.read_event(),
            Err(FrameError::TooShort { len: 0, min: HEADER_SIZE })
        ));
    }

    #[test]
    fn nonblocking_read_is_transient() {
        let pair = establish().unwrap();
        pair.local.set_nonblocking(true).unwrap();
        let mut reader = FrameReader::new(pair.local);

        let err = reader.read_event().unwrap_err();
        assert!(err.is_transient());
        assert!(!err.is_malformed());
    }

    #[test]
    fn raw_bytes_with_trailing_garbage() {
        let pair = establish().unwrap();
        let mut reader = FrameReader::new(pair.local);

        let mut wire = BytesMut::new();
        encode_score_event(&event(1), &mut wire).unwrap();
        wire.put_slice(&[0xAA; 5]);
        pair.peer.send(&wire).unwrap();

        assert!(matches!(
            reader.read_event(),
            Err(FrameError::CountMismatch { trailing: 5, .. })
        ));
    }
}
