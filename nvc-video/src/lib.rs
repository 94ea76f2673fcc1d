//! NVC Video - shared surface types and buffer plumbing
//!
//! Building blocks for feeding a hardware video encoder.
//!
//! Key pieces:
//! - Fixed-capacity FIFO ring of reusable hardware buffers
//! - Planar YUV to NV12 / YUV444 / P010 / YUV444 10-bit surface packing
//! - AVX2 dispatch for 10-bit MSB alignment
//! - 32-byte aligned host allocations for software surfaces

pub mod aligned;
pub mod buffer_queue;
pub mod error;
pub mod format_conversion;
pub mod types;

pub use aligned::*;
pub use buffer_queue::*;
pub use error::*;
pub use format_conversion::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_format_sizes() {
        assert_eq!(BufferFormat::NV12.surface_rows(1080), 1620);
        assert_eq!(BufferFormat::YUV444_10.surface_rows(1080), 3240);
        assert_eq!(
            BufferFormat::NV12.source_frame_size(1920, 1080),
            1920 * 1080 * 3 / 2
        );
        assert_eq!(BufferFormat::P010.source_plane_sizes(4, 2), [16, 4, 4]);
        assert_eq!(BufferFormat::YUV444.chroma_format_idc(), 3);
    }

    #[test]
    fn test_surface_desc_pitch() {
        let desc = SurfaceDesc::new(BufferFormat::P010, 1920, 1080);
        assert_eq!(desc.min_pitch(), 3840);
        assert_eq!(desc.required_len(4096), 4096 * 1620);
    }
}
