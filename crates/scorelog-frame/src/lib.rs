//! Score-event wire format for the scorelog telemetry channel.
//!
//! Every frame is one datagram carrying a fixed header followed by a
//! variable number of symbol results:
//! - header: symbol count (u32), score (f64), required score (f64), settings id (u32)
//! - per symbol: id (i32), score (f64)
//!
//! All fields are little-endian and packed. A frame is accepted only when its
//! length matches the declared symbol count exactly.

pub mod codec;
pub mod error;
#[cfg(unix)]
pub mod reader;
#[cfg(unix)]
pub mod writer;

pub use codec::{
    decode_score_event, encode_score_event, frame_size, FrameConfig, ScoreEvent, SymbolResult,
    DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE, SYMBOL_RESULT_SIZE,
};
pub use error::{FrameError, Result};
#[cfg(unix)]
pub use reader::FrameReader;
#[cfg(unix)]
pub use writer::FrameWriter;
