//! Error types for the decode side

use crate::types::{Rect, VideoCodec};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Codec {0} not supported on this device")]
    CodecUnsupported(VideoCodec),

    #[error("Resolution {width}x{height} exceeds device limit {max_width}x{max_height}")]
    ResolutionUnsupported {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Macroblock count {count} exceeds device limit {max}")]
    MacroblockCountUnsupported { count: u32, max: u32 },

    #[error("Empty display area {0:?}")]
    EmptyDisplayArea(Rect),

    #[error("Dynamic resolution change from {from:?} to {to:?} is not supported")]
    ResolutionChange { from: (u32, u32), to: (u32, u32) },

    #[error("Decoder not initialized")]
    NotInitialized,

    #[error("Mapped frame too small: need {need} bytes, have {have}")]
    MappedFrameTooSmall { need: usize, have: usize },

    #[error("{op} failed with status {status}")]
    Device { op: &'static str, status: i32 },

    #[error("Bitstream parse error: {0}")]
    Parser(String),
}
