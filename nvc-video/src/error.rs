//! Error types for surface packing and host allocation

use crate::types::BufferFormat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VideoError {
    #[error("failed to allocate {size} bytes of surface memory")]
    Allocation { size: usize },

    #[error("surface too small: need {need} bytes, have {have}")]
    SurfaceTooSmall { need: usize, have: usize },

    #[error("pitch {pitch} cannot hold a {width}-sample row of {format}")]
    PitchTooSmall {
        pitch: usize,
        width: u32,
        format: BufferFormat,
    },

    #[error("pitch {pitch} is not a whole number of 16-bit samples for {format}")]
    OddPitch { pitch: usize, format: BufferFormat },

    #[error("{width}x{height} frame does not fit the surface")]
    FrameExceedsSurface { width: u32, height: u32 },

    #[error("source plane {plane} too small: need {need} samples, have {have}")]
    SourceTooSmall {
        plane: usize,
        need: usize,
        have: usize,
    },

    #[error("{format} surface needs {expected}-bit source samples")]
    SampleDepthMismatch { format: BufferFormat, expected: u32 },

    #[error("surface memory is not aligned for 16-bit samples")]
    Misaligned,
}
