use std::io::{self, ErrorKind};

use bytes::BytesMut;
use scorelog_transport::ChannelEndpoint;
use tracing::{debug, trace};

use crate::codec::{encode_score_event, FrameConfig, ScoreEvent};
use crate::error::{FrameError, Result};

/// Writes score events as single datagrams.
///
/// This is the emitting side used by scan workers that hold a copy of the
/// telemetry channel.
pub struct FrameWriter {
    inner: ChannelEndpoint,
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameWriter {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: ChannelEndpoint) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: ChannelEndpoint, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(config.max_frame_size),
            config,
        }
    }

    /// Encode and send one event.
    ///
    /// Events larger than `max_frame_size` are refused up front; the reader
    /// could never accept them.
    pub fn send_event(&mut self, event: &ScoreEvent) -> Result<()> {
        let size = event.wire_size();
        if size > self.config.max_frame_size {
            debug!(
                size,
                max = self.config.max_frame_size,
                symbols = event.symbol_results.len(),
                "refusing score frame larger than max_frame_size"
            );
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.config.max_frame_size,
            });
        }

        self.buf.clear();
        encode_score_event(event, &mut self.buf)?;

        match self.inner.send(&self.buf) {
            Ok(n) if n == self.buf.len() => {
                trace!(len = n, "sent frame");
                Ok(())
            }
            Ok(n) => Err(FrameError::Io(io::Error::new(
                ErrorKind::WriteZero,
                format!("short send: {n} of {} bytes", self.buf.len()),
            ))),
            Err(err) if err.kind() == ErrorKind::BrokenPipe => Err(FrameError::ConnectionClosed),
            Err(err) => Err(FrameError::Io(err)),
        }
    }

    /// Borrow the underlying endpoint.
    pub fn get_ref(&self) -> &ChannelEndpoint {
        &self.inner
    }

    /// Consume the writer and return the inner endpoint.
    pub fn into_inner(self) -> ChannelEndpoint {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use scorelog_transport::establish;

    use super::*;
    use crate::codec::{decode_score_event, frame_size};

    #[test]
    fn send_writes_one_datagram_per_event() {
        let pair = establish().unwrap();
        let mut writer = FrameWriter::new(pair.peer);

        let event = ScoreEvent::new(1.0, 5.0, 9).with_symbol(42, 1.0);
        writer.send_event(&event).unwrap();

        let mut buf = [0u8; 256];
        let received = pair.local.recv(&mut buf).unwrap();
        assert_eq!(received.len, frame_size(1));
        assert_eq!(decode_score_event(&buf[..received.len]).unwrap(), event);
    }

    #[test]
    fn refuses_event_over_max_frame_size() {
        let pair = establish().unwrap();
        let config = FrameConfig {
            max_frame_size: frame_size(1),
        };
        let mut writer = FrameWriter::with_config(pair.peer, config);

        let event = ScoreEvent::new(1.0, 5.0, 0)
            .with_symbol(1, 1.0)
            .with_symbol(2, 1.0);
        let err = writer.send_event(&event).unwrap_err();
        assert!(matches!(
            err,
            FrameError::FrameTooLarge { size, max } if size == frame_size(2) && max == frame_size(1)
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn send_after_reader_closed() {
        let pair = establish().unwrap();
        let mut writer = FrameWriter::new(pair.peer);
        drop(pair.local);

        let err = writer.send_event(&ScoreEvent::new(0.0, 0.0, 0)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed | FrameError::Io(_)));
    }
}
