use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Header: symbol count (4) + score (8) + required score (8) + settings id (4) = 24 bytes.
pub const HEADER_SIZE: usize = 24;

/// Symbol result: id (4) + score (8) = 12 bytes.
pub const SYMBOL_RESULT_SIZE: usize = 12;

/// Default per-read buffer, and therefore the largest accepted frame: 1 KiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Wire size of a frame carrying `symbols` results.
pub const fn frame_size(symbols: usize) -> usize {
    HEADER_SIZE + symbols * SYMBOL_RESULT_SIZE
}

/// One matched rule and the weight it contributed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolResult {
    pub id: i32,
    pub score: f64,
}

/// A decoded per-message scan result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreEvent {
    /// Aggregate score of the message.
    pub score: f64,
    /// Threshold the score was compared against.
    pub required_score: f64,
    /// Configuration profile that produced the result, passed through untouched.
    pub settings_id: u32,
    /// Matched rules in the order they appeared on the wire.
    pub symbol_results: Vec<SymbolResult>,
}

impl ScoreEvent {
    /// Create an event with no symbol results.
    pub fn new(score: f64, required_score: f64, settings_id: u32) -> Self {
        Self {
            score,
            required_score,
            settings_id,
            symbol_results: Vec::new(),
        }
    }

    /// Append a symbol result.
    pub fn with_symbol(mut self, id: i32, score: f64) -> Self {
        self.symbol_results.push(SymbolResult { id, score });
        self
    }

    /// The total wire size of this event.
    pub fn wire_size(&self) -> usize {
        frame_size(self.symbol_results.len())
    }
}

/// Encode an event into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬────────────────┬─────────────┬────────────────────────┐
/// │ Count (4B LE)│ Score     │ Required score │ Settings id │ Count × (id i32 LE,    │
/// │ u32          │ (8B f64)  │ (8B f64)       │ (4B LE u32) │          score f64 LE) │
/// └──────────────┴───────────┴────────────────┴─────────────┴────────────────────────┘
/// ```
pub fn encode_score_event(event: &ScoreEvent, dst: &mut BytesMut) -> Result<()> {
    let count = u32::try_from(event.symbol_results.len()).map_err(|_| {
        FrameError::FrameTooLarge {
            size: event.wire_size(),
            max: frame_size(u32::MAX as usize),
        }
    })?;

    dst.reserve(event.wire_size());
    dst.put_u32_le(count);
    dst.put_f64_le(event.score);
    dst.put_f64_le(event.required_score);
    dst.put_u32_le(event.settings_id);
    for result in &event.symbol_results {
        dst.put_i32_le(result.id);
        dst.put_f64_le(result.score);
    }
    Ok(())
}

/// Decode one complete frame.
///
/// The frame must be exactly `HEADER_SIZE + count * SYMBOL_RESULT_SIZE`
/// bytes long. Anything else is rejected as a whole; no partial event is
/// ever produced.
pub fn decode_score_event(src: &[u8]) -> Result<ScoreEvent> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::TooShort {
            len: src.len(),
            min: HEADER_SIZE,
        });
    }

    let mut buf = src;
    let declared = buf.get_u32_le();

    let extra = src.len() - HEADER_SIZE;
    let available = extra / SYMBOL_RESULT_SIZE;
    let trailing = extra % SYMBOL_RESULT_SIZE;
    if trailing != 0 || available != declared as usize {
        return Err(FrameError::CountMismatch {
            declared,
            available,
            trailing,
        });
    }

    let score = buf.get_f64_le();
    let required_score = buf.get_f64_le();
    let settings_id = buf.get_u32_le();

    // Capacity comes from the validated length, not the declared count.
    let mut symbol_results = Vec::with_capacity(available);
    for _ in 0..available {
        let id = buf.get_i32_le();
        let score = buf.get_f64_le();
        symbol_results.push(SymbolResult { id, score });
    }

    Ok(ScoreEvent {
        score,
        required_score,
        settings_id,
        symbol_results,
    })
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Read buffer size and largest frame accepted or sent. Default: 1 KiB.
    ///
    /// Frames are never reassembled across reads: a larger frame is cut by
    /// the socket and rejected.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl FrameConfig {
    /// Largest number of symbol results that fits in one frame.
    pub fn max_symbols(&self) -> usize {
        self.max_frame_size.saturating_sub(HEADER_SIZE) / SYMBOL_RESULT_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(declared: u32, results: &[(i32, f64)]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32_le(declared);
        buf.put_f64_le(7.5);
        buf.put_f64_le(15.0);
        buf.put_u32_le(3);
        for &(id, score) in results {
            buf.put_i32_le(id);
            buf.put_f64_le(score);
        }
        buf
    }

    #[test]
    fn decode_two_symbols_in_order() {
        let wire = raw_frame(2, &[(101, 1.5), (-7, -0.25)]);
        assert_eq!(wire.len(), frame_size(2));

        let event = decode_score_event(&wire).unwrap();
        assert_eq!(event.score, 7.5);
        assert_eq!(event.required_score, 15.0);
        assert_eq!(event.settings_id, 3);
        assert_eq!(
            event.symbol_results,
            vec![
                SymbolResult { id: 101, score: 1.5 },
                SymbolResult { id: -7, score: -0.25 },
            ]
        );
    }

    #[test]
    fn decode_header_only() {
        let wire = raw_frame(0, &[]);
        let event = decode_score_event(&wire).unwrap();
        assert!(event.symbol_results.is_empty());
    }

    #[test]
    fn every_short_buffer_is_rejected() {
        let wire = raw_frame(0, &[]);
        for len in 0..HEADER_SIZE {
            let result = decode_score_event(&wire[..len]);
            assert!(
                matches!(result, Err(FrameError::TooShort { len: l, .. }) if l == len),
                "length {len} should be too short"
            );
        }
    }

    #[test]
    fn declared_count_larger_than_payload() {
        let wire = raw_frame(3, &[(1, 1.0), (2, 2.0)]);
        let err = decode_score_event(&wire).unwrap_err();
        assert!(matches!(
            err,
            FrameError::CountMismatch {
                declared: 3,
                available: 2,
                trailing: 0
            }
        ));
    }

    #[test]
    fn declared_count_smaller_than_payload() {
        let wire = raw_frame(1, &[(1, 1.0), (2, 2.0)]);
        assert!(matches!(
            decode_score_event(&wire),
            Err(FrameError::CountMismatch { declared: 1, .. })
        ));
    }

    #[test]
    fn partial_trailing_symbol_is_rejected() {
        let mut wire = raw_frame(1, &[(1, 1.0)]);
        wire.put_u8(0xFF);
        assert!(matches!(
            decode_score_event(&wire),
            Err(FrameError::CountMismatch {
                declared: 1,
                available: 1,
                trailing: 1
            })
        ));
    }

    #[test]
    fn huge_declared_count_does_not_allocate() {
        let wire = raw_frame(u32::MAX, &[]);
        assert!(matches!(
            decode_score_event(&wire),
            Err(FrameError::CountMismatch {
                declared: u32::MAX,
                available: 0,
                ..
            })
        ));
    }

    #[test]
    fn encode_matches_wire_layout() {
        let event = ScoreEvent::new(7.5, 15.0, 3)
            .with_symbol(101, 1.5)
            .with_symbol(-7, -0.25);
        let mut buf = BytesMut::new();
        encode_score_event(&event, &mut buf).unwrap();

        assert_eq!(buf.len(), event.wire_size());
        assert_eq!(buf, raw_frame(2, &[(101, 1.5), (-7, -0.25)]));
        assert_eq!(decode_score_event(&buf).unwrap(), event);
    }

    #[test]
    fn max_symbols_for_default_buffer() {
        let config = FrameConfig::default();
        assert_eq!(config.max_symbols(), (1024 - 24) / 12);
        assert!(frame_size(config.max_symbols()) <= config.max_frame_size);
        assert!(frame_size(config.max_symbols() + 1) > config.max_frame_size);
    }
}
