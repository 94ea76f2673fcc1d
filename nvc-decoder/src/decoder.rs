//! Parser-driven hardware decoder
//!
//! The parser calls back into the decoder synchronously while a packet is
//! parsed: once per sequence header, once per picture to decode and once per
//! picture ready for display. Displayed pictures are copied to host frames.

use crate::error::{DecodeError, Result};
use crate::frame_stock::FrameStock;
use crate::surfaces::num_decode_surfaces;
use crate::types::{
    DecodeCaps, DecoderCreateInfo, DisplayInfo, MappedFrame, Packet, PictureParams, ProcParams,
    VideoCodec, VideoFormat,
};
use nvc_video::BufferFormat;
use parking_lot::MutexGuard;
use std::sync::Arc;

/// Receives parser callbacks
pub trait DecodeEventSink {
    /// New sequence header; returns the number of decode surfaces in use
    fn on_sequence(&mut self, format: &VideoFormat) -> Result<u32>;
    fn on_picture_decode(&mut self, params: &PictureParams) -> Result<()>;
    fn on_picture_display(&mut self, info: &DisplayInfo) -> Result<()>;
}

/// Bitstream parser feeding a [`DecodeEventSink`]
pub trait VideoParser {
    fn parse(&mut self, packet: &Packet<'_>, events: &mut dyn DecodeEventSink) -> Result<()>;
}

/// Hardware decoder session
pub trait DecodeDevice {
    fn capabilities(&self, format: &VideoFormat) -> Result<DecodeCaps>;
    fn create_decoder(&mut self, info: &DecoderCreateInfo) -> Result<()>;
    fn destroy_decoder(&mut self);
    fn decode_picture(&mut self, params: &PictureParams) -> Result<()>;

    /// Map a decoded picture, hand it to `read`, then unmap
    fn map_frame(
        &mut self,
        picture_index: u32,
        proc_params: &ProcParams,
        read: &mut dyn FnMut(MappedFrame<'_>),
    ) -> Result<()>;
}

/// Geometry fixed by the first sequence header
#[derive(Debug, Clone, Copy)]
struct Session {
    format: VideoFormat,
    width: u32,
    height: u32,
    surface_height: u32,
    output_format: BufferFormat,
}

impl Session {
    fn row_bytes(&self) -> usize {
        self.width as usize * self.output_format.bytes_per_sample()
    }

    fn frame_size(&self) -> usize {
        self.row_bytes() * self.output_format.surface_rows(self.height)
    }
}

struct DecoderCore<D: DecodeDevice> {
    device: D,
    session: Option<Session>,
    stock: Arc<FrameStock>,
    timestamps: Vec<i64>,
    decoded: usize,
}

fn copy_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for (src_row, dst_row) in src
        .chunks(src_pitch)
        .zip(dst.chunks_exact_mut(row_bytes))
        .take(rows)
    {
        dst_row.copy_from_slice(&src_row[..row_bytes]);
    }
}

impl<D: DecodeDevice> DecodeEventSink for DecoderCore<D> {
    fn on_sequence(&mut self, format: &VideoFormat) -> Result<u32> {
        let surfaces = num_decode_surfaces(format.codec, format.coded_width, format.coded_height);
        if format.display_area.width() == 0 || format.display_area.height() == 0 {
            return Err(DecodeError::EmptyDisplayArea(format.display_area));
        }

        let caps = self.device.capabilities(format)?;
        if !caps.supported {
            return Err(DecodeError::CodecUnsupported(format.codec));
        }
        if format.coded_width > caps.max_width || format.coded_height > caps.max_height {
            return Err(DecodeError::ResolutionUnsupported {
                width: format.coded_width,
                height: format.coded_height,
                max_width: caps.max_width,
                max_height: caps.max_height,
            });
        }
        let mb_count = (format.coded_width >> 4) * (format.coded_height >> 4);
        if mb_count > caps.max_mb_count {
            return Err(DecodeError::MacroblockCountUnsupported {
                count: mb_count,
                max: caps.max_mb_count,
            });
        }

        if let Some(session) = &self.session {
            // The device follows VP9 resolution changes on its own
            let previous = &session.format;
            if previous.codec == VideoCodec::Vp9
                || (previous.coded_width, previous.coded_height)
                    == (format.coded_width, format.coded_height)
            {
                return Ok(surfaces);
            }
            return Err(DecodeError::ResolutionChange {
                from: (previous.coded_width, previous.coded_height),
                to: (format.coded_width, format.coded_height),
            });
        }

        let output_format = if format.bit_depth_luma_minus8 > 0 {
            BufferFormat::P010
        } else {
            BufferFormat::NV12
        };
        let info = DecoderCreateInfo {
            codec: format.codec,
            chroma_format: format.chroma_format,
            output_format,
            bit_depth_minus8: format.bit_depth_luma_minus8,
            num_decode_surfaces: surfaces,
            num_output_surfaces: 2,
            width: format.coded_width,
            height: format.coded_height,
            target_width: format.coded_width,
            target_height: format.coded_height,
        };
        self.device.create_decoder(&info)?;

        let session = Session {
            format: *format,
            width: format.display_area.width(),
            height: format.display_area.height(),
            surface_height: info.target_height,
            output_format,
        };
        log::info!(
            "Decoding {} {} {}-bit, coded {}x{}, display {}x{}, {}, {} surfaces",
            format.codec,
            format.chroma_format,
            format.bit_depth_luma_minus8 + 8,
            format.coded_width,
            format.coded_height,
            session.width,
            session.height,
            if format.progressive { "progressive" } else { "interlaced" },
            surfaces
        );
        self.session = Some(session);
        Ok(surfaces)
    }

    fn on_picture_decode(&mut self, params: &PictureParams) -> Result<()> {
        if self.session.is_none() {
            return Err(DecodeError::NotInitialized);
        }
        self.device.decode_picture(params)
    }

    fn on_picture_display(&mut self, info: &DisplayInfo) -> Result<()> {
        let session = self.session.ok_or(DecodeError::NotInitialized)?;
        let row_bytes = session.row_bytes();
        let luma_rows = session.height as usize;
        let chroma_rows = luma_rows / 2;
        let surface_height = session.surface_height as usize;

        self.decoded += 1;
        let index = self.decoded - 1;
        let mut frames = self.stock.reserve(self.decoded, session.frame_size());
        let frame = &mut frames[index];

        let mut copied = Ok(());
        self.device
            .map_frame(info.picture_index, &ProcParams::from(info), &mut |mapped| {
                let pitch = mapped.pitch;
                let need = pitch * (surface_height + chroma_rows);
                if mapped.data.len() < need || pitch < row_bytes {
                    copied = Err(DecodeError::MappedFrameTooSmall {
                        need,
                        have: mapped.data.len(),
                    });
                    return;
                }
                let (luma, chroma) = frame.split_at_mut(row_bytes * luma_rows);
                copy_rows(mapped.data, pitch, luma, row_bytes, luma_rows);
                let chroma_src = &mapped.data[pitch * surface_height..];
                copy_rows(chroma_src, pitch, chroma, row_bytes, chroma_rows);
            })?;
        copied?;

        if self.timestamps.len() < self.decoded {
            self.timestamps.resize(frames.len(), 0);
        }
        self.timestamps[index] = info.timestamp;
        Ok(())
    }
}

impl<D: DecodeDevice> Drop for DecoderCore<D> {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            self.device.destroy_decoder();
        }
    }
}

/// Frames produced by one [`Decoder::decode`] call
///
/// Borrows the frame stock; frames stay valid until the next decode.
pub struct DecodedFrames<'a> {
    frames: MutexGuard<'a, Vec<Vec<u8>>>,
    timestamps: &'a [i64],
}

impl<'a> DecodedFrames<'a> {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn frame(&self, index: usize) -> &[u8] {
        &self.frames[index]
    }

    pub fn timestamp(&self, index: usize) -> i64 {
        self.timestamps[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], i64)> {
        self.frames
            .iter()
            .map(Vec::as_slice)
            .zip(self.timestamps.iter().copied())
    }
}

/// A decoded frame taken out of the stock by [`Decoder::decode_lock_frames`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedFrame {
    pub data: Vec<u8>,
    pub timestamp: i64,
}

/// Hardware decoder driven by a bitstream parser
pub struct Decoder<P: VideoParser, D: DecodeDevice> {
    parser: P,
    core: DecoderCore<D>,
}

impl<P: VideoParser, D: DecodeDevice> Decoder<P, D> {
    pub fn new(parser: P, device: D) -> Self {
        Self {
            parser,
            core: DecoderCore {
                device,
                session: None,
                stock: Arc::new(FrameStock::new()),
                timestamps: Vec::new(),
                decoded: 0,
            },
        }
    }

    fn parse(&mut self, data: &[u8], timestamp: i64) -> Result<usize> {
        self.core.decoded = 0;
        let packet = Packet {
            payload: data,
            timestamp,
            end_of_stream: data.is_empty(),
        };
        self.parser.parse(&packet, &mut self.core)?;
        Ok(self.core.decoded)
    }

    /// Parse one packet and return the frames it made displayable
    ///
    /// An empty `data` slice signals end of stream and drains the parser.
    pub fn decode(&mut self, data: &[u8], timestamp: i64) -> Result<DecodedFrames<'_>> {
        let count = self.parse(data, timestamp)?;
        Ok(DecodedFrames {
            frames: self.core.stock.lock(),
            timestamps: &self.core.timestamps[..count],
        })
    }

    /// Like [`decode`](Self::decode), but the frames leave the stock until
    /// handed back with [`unlock_frames`](Self::unlock_frames)
    pub fn decode_lock_frames(&mut self, data: &[u8], timestamp: i64) -> Result<Vec<LockedFrame>> {
        let count = self.parse(data, timestamp)?;
        let frames = self.core.stock.take_front(count);
        Ok(frames
            .into_iter()
            .zip(self.core.timestamps.iter().copied())
            .map(|(data, timestamp)| LockedFrame { data, timestamp })
            .collect())
    }

    pub fn unlock_frames(&self, frames: Vec<LockedFrame>) {
        self.core
            .stock
            .give_back(frames.into_iter().map(|frame| frame.data));
    }

    /// Shared handle to the frame stock, for returning frames from other threads
    pub fn frame_stock(&self) -> Arc<FrameStock> {
        Arc::clone(&self.core.stock)
    }

    pub fn video_format(&self) -> Option<&VideoFormat> {
        self.core.session.as_ref().map(|s| &s.format)
    }

    /// Display width and height, known after the first sequence header
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.core.session.map(|s| (s.width, s.height))
    }

    pub fn output_format(&self) -> Option<BufferFormat> {
        self.core.session.map(|s| s.output_format)
    }

    /// Bytes in one host frame (luma plus interleaved half-height chroma)
    pub fn frame_size(&self) -> Option<usize> {
        self.core.session.map(|s| s.frame_size())
    }

    pub fn device(&self) -> &D {
        &self.core.device
    }
}
