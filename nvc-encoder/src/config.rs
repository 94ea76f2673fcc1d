//! Encoder session configuration and pool sizing

use crate::device::EncodeCaps;
use crate::error::{EncodeError, Result};
use nvc_video::{BufferFormat, PictureStructure, SurfaceDesc};
use std::time::Duration;

/// Upper bound on in-flight submissions
pub const MAX_ENCODE_QUEUE: usize = 32;

/// Capacity of every bitstream output buffer
pub const BITSTREAM_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// How long a flush waits for the end-of-stream signal
pub const EOS_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Motion vector output bytes reserved per 16x16 macroblock
pub const MV_BYTES_PER_MACROBLOCK: usize = 64;

pub const MACROBLOCK_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    H264,
    Hevc,
}

/// Macroblock grid (columns, rows) covering a picture
pub fn macroblock_grid(width: u32, height: u32) -> (usize, usize) {
    (
        width.div_ceil(MACROBLOCK_SIZE) as usize,
        height.div_ceil(MACROBLOCK_SIZE) as usize,
    )
}

pub fn macroblock_count(width: u32, height: u32) -> usize {
    let (cols, rows) = macroblock_grid(width, height);
    cols * rows
}

/// Size of the motion vector output buffer for a picture
pub fn mv_buffer_size(width: u32, height: u32) -> usize {
    macroblock_count(width, height) * MV_BYTES_PER_MACROBLOCK
}

/// Encoder session parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub max_width: u32,  // 0 = same as width
    pub max_height: u32, // 0 = same as height
    pub codec: Codec,
    pub format: BufferFormat,
    pub num_b_frames: u32,
    pub picture_structure: PictureStructure,
    pub async_mode: bool,
    pub motion_estimation_only: bool,
    pub external_me_hints: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            max_width: 0,
            max_height: 0,
            codec: Codec::H264,
            format: BufferFormat::NV12,
            num_b_frames: 0,
            picture_structure: PictureStructure::Frame,
            async_mode: false,
            motion_estimation_only: false,
            external_me_hints: false,
        }
    }
}

impl EncodeConfig {
    pub fn new(width: u32, height: u32, format: BufferFormat) -> Self {
        Self {
            width,
            height,
            format,
            ..Default::default()
        }
    }

    /// Largest resolution the session may be reconfigured to
    pub fn max_dimensions(&self) -> (u32, u32) {
        let width = if self.max_width == 0 {
            self.width
        } else {
            self.max_width
        };
        let height = if self.max_height == 0 {
            self.height
        } else {
            self.max_height
        };
        (width, height)
    }

    /// Input surfaces are allocated at the maximum resolution
    pub fn surface_desc(&self) -> SurfaceDesc {
        let (width, height) = self.max_dimensions();
        SurfaceDesc::new(self.format, width, height)
    }

    /// Number of pool slots to allocate
    ///
    /// B-frames need `num_b + 4` slots in flight. Otherwise larger pictures
    /// get fewer slots. The motion-estimation pool uses half.
    pub fn buffer_count(&self) -> usize {
        let count = if self.num_b_frames > 0 {
            self.num_b_frames as usize + 4
        } else {
            let (width, height) = self.max_dimensions();
            let mbs = macroblock_count(width, height);
            if mbs >= 32768 {
                MAX_ENCODE_QUEUE / 8 // 4096x2048 and up
            } else if mbs >= 16384 {
                MAX_ENCODE_QUEUE / 4
            } else if mbs >= 8160 {
                MAX_ENCODE_QUEUE / 2 // 1920x1080 and up
            } else {
                MAX_ENCODE_QUEUE
            }
        };

        if self.motion_estimation_only {
            count / 2
        } else {
            count
        }
    }

    /// Check the configuration against device limits
    pub fn validate(&self, caps: &EncodeCaps) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::InvalidConfig(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }

        let (max_width, max_height) = self.max_dimensions();
        if max_width < self.width || max_height < self.height {
            return Err(EncodeError::InvalidConfig(format!(
                "max resolution {}x{} is below {}x{}",
                max_width, max_height, self.width, self.height
            )));
        }

        if !self.format.is_444() && (max_width % 2 != 0 || max_height % 2 != 0) {
            return Err(EncodeError::InvalidConfig(format!(
                "{} requires even dimensions, got {}x{}",
                self.format, max_width, max_height
            )));
        }

        if max_width > caps.max_width || max_height > caps.max_height {
            return Err(EncodeError::InvalidConfig(format!(
                "{}x{} exceeds device limit {}x{}",
                max_width, max_height, caps.max_width, caps.max_height
            )));
        }

        if self.format.is_444() && !caps.yuv444 {
            return Err(EncodeError::InvalidConfig(
                "device does not support YUV 444 input".to_string(),
            ));
        }

        if self.format.is_high_bit_depth() && !caps.ten_bit {
            return Err(EncodeError::InvalidConfig(
                "device does not support 10-bit input".to_string(),
            ));
        }

        if self.async_mode && !caps.async_encode {
            return Err(EncodeError::InvalidConfig(
                "device does not support async encode".to_string(),
            ));
        }

        if self.motion_estimation_only && !caps.motion_estimation_only {
            return Err(EncodeError::InvalidConfig(
                "device does not support motion estimation only mode".to_string(),
            ));
        }

        if self.external_me_hints
            && (self.codec != Codec::H264 || self.num_b_frames > 0 || self.motion_estimation_only)
        {
            return Err(EncodeError::InvalidConfig(
                "external ME hints require H.264 P-frame encoding".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> EncodeCaps {
        EncodeCaps {
            max_width: 4096,
            max_height: 4096,
            yuv444: true,
            ten_bit: true,
            async_encode: true,
            motion_estimation_only: true,
        }
    }

    #[test]
    fn test_buffer_count_by_resolution() {
        assert_eq!(EncodeConfig::new(640, 480, BufferFormat::NV12).buffer_count(), 32);
        assert_eq!(EncodeConfig::new(1920, 1080, BufferFormat::NV12).buffer_count(), 16);
        assert_eq!(EncodeConfig::new(2560, 1600, BufferFormat::NV12).buffer_count(), 16);
        assert_eq!(EncodeConfig::new(3840, 2160, BufferFormat::NV12).buffer_count(), 8);
        assert_eq!(EncodeConfig::new(4096, 2048, BufferFormat::NV12).buffer_count(), 4);
    }

    #[test]
    fn test_buffer_count_uses_max_dimensions() {
        let mut config = EncodeConfig::new(640, 480, BufferFormat::NV12);
        config.max_width = 3840;
        config.max_height = 2160;
        assert_eq!(config.buffer_count(), 8);
        assert_eq!(config.surface_desc().width, 3840);
    }

    #[test]
    fn test_max_dimensions_default_to_frame_size() {
        let mut config = EncodeConfig::new(1280, 720, BufferFormat::NV12);
        assert_eq!(config.max_dimensions(), (1280, 720));
        config.max_height = 1080;
        assert_eq!(config.max_dimensions(), (1280, 1080));
    }

    #[test]
    fn test_buffer_count_b_frames_and_me_only() {
        let mut config = EncodeConfig::default();
        config.num_b_frames = 3;
        assert_eq!(config.buffer_count(), 7);

        let mut me = EncodeConfig::new(1920, 1080, BufferFormat::NV12);
        me.motion_estimation_only = true;
        assert_eq!(me.buffer_count(), 8);
    }

    #[test]
    fn test_mv_buffer_size() {
        // 1920x1080 rounds up to 120x68 macroblocks
        assert_eq!(mv_buffer_size(1920, 1080), 120 * 68 * 64);
        assert_eq!(mv_buffer_size(17, 1), 2 * 64);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let caps = caps();
        assert!(EncodeConfig::default().validate(&caps).is_ok());

        let zero = EncodeConfig::new(0, 1080, BufferFormat::NV12);
        assert!(matches!(zero.validate(&caps), Err(EncodeError::InvalidConfig(_))));

        let odd = EncodeConfig::new(1921, 1080, BufferFormat::NV12);
        assert!(odd.validate(&caps).is_err());
        let odd_444 = EncodeConfig::new(1921, 1081, BufferFormat::YUV444);
        assert!(odd_444.validate(&caps).is_ok());

        let huge = EncodeConfig::new(8192, 4320, BufferFormat::NV12);
        assert!(huge.validate(&caps).is_err());

        let mut no_444 = caps;
        no_444.yuv444 = false;
        assert!(EncodeConfig::new(1920, 1080, BufferFormat::YUV444_10)
            .validate(&no_444)
            .is_err());
    }

    #[test]
    fn test_validate_external_hints() {
        let caps = caps();
        let mut config = EncodeConfig {
            external_me_hints: true,
            ..Default::default()
        };
        assert!(config.validate(&caps).is_ok());

        config.num_b_frames = 2;
        assert!(config.validate(&caps).is_err());

        config.num_b_frames = 0;
        config.codec = Codec::Hevc;
        assert!(config.validate(&caps).is_err());
    }
}
