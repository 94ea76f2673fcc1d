//! Video data types and constants

use std::fmt;

/// Input surface format accepted by the encoder hardware
///
/// Discriminants match the hardware's buffer format tags.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    NV12 = 0x1,          // Semi-planar YUV 4:2:0 (Y plane, interleaved CbCr)
    YUV444 = 0x1000,     // Planar YUV 4:4:4
    P010 = 0x10000,      // Semi-planar YUV 4:2:0 10-bit, MSB-aligned in 16-bit samples
    YUV444_10 = 0x100000, // Planar YUV 4:4:4 10-bit, MSB-aligned in 16-bit samples
}

impl BufferFormat {
    /// Bytes per stored sample (1 for 8-bit, 2 for 10-bit containers)
    pub fn bytes_per_sample(self) -> usize {
        match self {
            BufferFormat::NV12 | BufferFormat::YUV444 => 1,
            BufferFormat::P010 | BufferFormat::YUV444_10 => 2,
        }
    }

    pub fn is_444(self) -> bool {
        matches!(self, BufferFormat::YUV444 | BufferFormat::YUV444_10)
    }

    pub fn is_high_bit_depth(self) -> bool {
        self.bytes_per_sample() == 2
    }

    /// Chroma format IDC as used in H.264/HEVC headers (1 = 4:2:0, 3 = 4:4:4)
    pub fn chroma_format_idc(self) -> u32 {
        if self.is_444() {
            3
        } else {
            1
        }
    }

    /// Number of pitch-sized rows a hardware surface of `height` luma rows spans
    pub fn surface_rows(self, height: u32) -> usize {
        let height = height as usize;
        if self.is_444() {
            height * 3
        } else {
            height + height / 2
        }
    }

    /// Byte sizes of the three tightly packed source planes (Y, Cb, Cr)
    pub fn source_plane_sizes(self, width: u32, height: u32) -> [usize; 3] {
        let bps = self.bytes_per_sample();
        let luma = width as usize * height as usize * bps;
        let chroma = if self.is_444() {
            luma
        } else {
            (width / 2) as usize * (height / 2) as usize * bps
        };
        [luma, chroma, chroma]
    }

    /// Total byte size of one tightly packed planar source frame
    pub fn source_frame_size(self, width: u32, height: u32) -> usize {
        self.source_plane_sizes(width, height).iter().sum()
    }
}

impl fmt::Display for BufferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferFormat::NV12 => "YUV 420",
            BufferFormat::YUV444 => "YUV 444",
            BufferFormat::P010 => "YUV 420 10-bit",
            BufferFormat::YUV444_10 => "YUV 444 10-bit",
        };
        f.write_str(name)
    }
}

/// Picture structure passed with every frame submission
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PictureStructure {
    #[default]
    Frame = 1,
    FieldTopBottom = 2, // Top field first
    FieldBottomTop = 3, // Bottom field first
}

/// Format and resolution of one hardware input surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDesc {
    pub format: BufferFormat,
    pub width: u32,
    pub height: u32,
}

impl SurfaceDesc {
    pub fn new(format: BufferFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
        }
    }

    /// Smallest row pitch in bytes that holds one luma row
    pub fn min_pitch(&self) -> usize {
        self.width as usize * self.format.bytes_per_sample()
    }

    /// Bytes a locked surface must expose for the given pitch
    pub fn required_len(&self, pitch: usize) -> usize {
        pitch * self.format.surface_rows(self.height)
    }
}

/// Borrowed source planes, either 8-bit or 16-bit samples
#[derive(Debug, Clone, Copy)]
pub enum PlaneData<'a> {
    U8([&'a [u8]; 3]),
    U16([&'a [u16]; 3]),
}

/// One planar YUV source frame as handed to a pipeline
///
/// `stride` is the luma row stride in samples; 0 means tightly packed
/// (`stride == width`). Chroma strides derive from it: half for 4:2:0,
/// equal for 4:4:4.
#[derive(Debug, Clone, Copy)]
pub struct PlanarFrame<'a> {
    pub planes: PlaneData<'a>,
    pub stride: usize,
    pub width: u32,
    pub height: u32,
}

impl<'a> PlanarFrame<'a> {
    pub fn new_8bit(y: &'a [u8], cb: &'a [u8], cr: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            planes: PlaneData::U8([y, cb, cr]),
            stride: 0,
            width,
            height,
        }
    }

    pub fn new_16bit(
        y: &'a [u16],
        cb: &'a [u16],
        cr: &'a [u16],
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            planes: PlaneData::U16([y, cb, cr]),
            stride: 0,
            width,
            height,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn is_high_bit_depth(&self) -> bool {
        matches!(self.planes, PlaneData::U16(_))
    }
}
