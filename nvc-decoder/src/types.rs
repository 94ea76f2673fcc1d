//! Stream description types exchanged with the parser and decode device

use nvc_video::BufferFormat;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    Mpeg1,
    Mpeg2,
    Mpeg4,
    Vc1,
    H264,
    Jpeg,
    H264Svc,
    H264Mvc,
    Hevc,
    Vp8,
    Vp9,
}

impl VideoCodec {
    pub fn is_h264_family(self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H264Svc | VideoCodec::H264Mvc)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoCodec::Mpeg1 => "MPEG-1",
            VideoCodec::Mpeg2 => "MPEG-2",
            VideoCodec::Mpeg4 => "MPEG-4 (ASP)",
            VideoCodec::Vc1 => "VC-1/WMV",
            VideoCodec::H264 => "AVC/H.264",
            VideoCodec::Jpeg => "M-JPEG",
            VideoCodec::H264Svc => "H.264/SVC",
            VideoCodec::H264Mvc => "H.264/MVC",
            VideoCodec::Hevc => "H.265/HEVC",
            VideoCodec::Vp8 => "VP8",
            VideoCodec::Vp9 => "VP9",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaFormat {
    Monochrome,
    Yuv420,
    Yuv422,
    Yuv444,
}

impl fmt::Display for ChromaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChromaFormat::Monochrome => "YUV 400 (Monochrome)",
            ChromaFormat::Yuv420 => "YUV 420",
            ChromaFormat::Yuv422 => "YUV 422",
            ChromaFormat::Yuv444 => "YUV 444",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Sequence header information reported by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub codec: VideoCodec,
    pub chroma_format: ChromaFormat,
    pub bit_depth_luma_minus8: u8,
    pub coded_width: u32,
    pub coded_height: u32,
    pub display_area: Rect,
    pub progressive: bool,
    pub frame_rate: (u32, u32),
}

/// Decoder limits for one codec / chroma / bit depth combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeCaps {
    pub supported: bool,
    pub max_width: u32,
    pub max_height: u32,
    pub max_mb_count: u32,
}

/// Parameters for creating the hardware decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderCreateInfo {
    pub codec: VideoCodec,
    pub chroma_format: ChromaFormat,
    pub output_format: BufferFormat,
    pub bit_depth_minus8: u8,
    pub num_decode_surfaces: u32,
    pub num_output_surfaces: u32,
    pub width: u32,
    pub height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

/// One picture ready for hardware decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureParams {
    pub picture_index: u32,
    pub bitstream: Vec<u8>,
}

/// One picture ready for display, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub picture_index: u32,
    pub progressive_frame: bool,
    pub top_field_first: bool,
    pub repeat_first_field: i32,
    pub timestamp: i64,
}

/// Post-processing parameters for mapping a decoded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcParams {
    pub progressive_frame: bool,
    pub second_field: bool,
    pub top_field_first: bool,
    pub unpaired_field: bool,
}

impl From<&DisplayInfo> for ProcParams {
    fn from(info: &DisplayInfo) -> Self {
        ProcParams {
            progressive_frame: info.progressive_frame,
            second_field: info.repeat_first_field + 1 != 0,
            top_field_first: info.top_field_first,
            unpaired_field: info.repeat_first_field < 0,
        }
    }
}

/// Compressed data handed to the parser
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    pub payload: &'a [u8],
    pub timestamp: i64,
    pub end_of_stream: bool,
}

/// Host view of a mapped decoded picture
pub struct MappedFrame<'a> {
    pub data: &'a [u8],
    pub pitch: usize,
}
