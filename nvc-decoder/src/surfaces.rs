//! Decode surface sizing

use crate::types::VideoCodec;

// HEVC level 6.2 limits (A.4.1)
const HEVC_MAX_LUMA_PS: u64 = 35_651_584;
const HEVC_MAX_DPB_PIC_BUF: u32 = 6;

/// Number of decode surfaces to allocate for a stream
///
/// H.264 assumes the worst case of 20. HEVC follows the level 6.2 DPB
/// rule for the picture size, capped at 16 plus 4 in flight.
pub fn num_decode_surfaces(codec: VideoCodec, width: u32, height: u32) -> u32 {
    if codec == VideoCodec::Vp9 {
        return 12;
    }

    if codec.is_h264_family() {
        return 20;
    }

    if codec == VideoCodec::Hevc {
        let pic_size = width as u64 * height as u64;
        let max_dpb_size = if pic_size <= HEVC_MAX_LUMA_PS >> 2 {
            HEVC_MAX_DPB_PIC_BUF * 4
        } else if pic_size <= HEVC_MAX_LUMA_PS >> 1 {
            HEVC_MAX_DPB_PIC_BUF * 2
        } else if pic_size <= (3 * HEVC_MAX_LUMA_PS) >> 2 {
            (HEVC_MAX_DPB_PIC_BUF * 4) / 3
        } else {
            HEVC_MAX_DPB_PIC_BUF
        };
        return max_dpb_size.min(16) + 4;
    }

    8
}
