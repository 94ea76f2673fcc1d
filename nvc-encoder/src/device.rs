//! Hardware encoder boundary
//!
//! Pipelines talk to the encoder through [`EncodeDevice`]. Every resource the
//! device hands out is an owned, non-cloneable handle; giving it back through
//! the matching `destroy_*` call consumes it, so a handle cannot be released
//! twice.

use crate::error::NvEncStatus;
use crate::hints::ExternalMeHints;
use nvc_video::{BufferFormat, PictureStructure, SurfaceDesc};
use std::time::Duration;

/// Result of a single hardware call
pub type DeviceResult<T> = std::result::Result<T, NvEncStatus>;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                $name(raw)
            }

            pub fn as_raw(&self) -> u64 {
                self.0
            }
        }
    };
}

device_handle!(
    /// Hardware input surface the host writes packed frames into
    InputSurface
);
device_handle!(
    /// Hardware output buffer receiving one encoded access unit
    BitstreamBuffer
);
device_handle!(
    /// Hardware output buffer receiving per-macroblock motion vectors
    MvBuffer
);
device_handle!(
    /// Completion event registered with the encoder for async mode
    AsyncEvent
);

/// Encoder limits and feature support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeCaps {
    pub max_width: u32,
    pub max_height: u32,
    pub yuv444: bool,
    pub ten_bit: bool,
    pub async_encode: bool,
    pub motion_estimation_only: bool,
}

/// Host view of a locked input surface
pub struct LockedSurface<'a> {
    pub data: &'a mut [u8],
    /// Row pitch in bytes chosen by the device
    pub pitch: usize,
}

/// Parameters of one picture submission
pub struct EncodePictureParams<'a> {
    pub input: &'a InputSurface,
    pub format: BufferFormat,
    pub output: &'a BitstreamBuffer,
    pub completion_event: Option<&'a AsyncEvent>,
    pub width: u32,
    pub height: u32,
    pub picture_structure: PictureStructure,
    /// One signed QP offset per macroblock, raster order
    pub qp_delta_map: Option<&'a [i8]>,
    pub external_hints: Option<&'a ExternalMeHints>,
}

/// Parameters of one motion-estimation-only submission
pub struct MotionEstimationParams<'a> {
    pub input: &'a InputSurface,
    pub reference: &'a InputSurface,
    pub format: BufferFormat,
    pub output: &'a MvBuffer,
    pub completion_event: Option<&'a AsyncEvent>,
    pub width: u32,
    pub height: u32,
}

/// Encoder session as seen by the pipelines
///
/// Submissions complete in the order they were made. In async mode each
/// submission signals its completion event; otherwise locking an output
/// blocks until the hardware has finished writing it.
pub trait EncodeDevice {
    fn capabilities(&self) -> EncodeCaps;

    fn create_input_surface(&self, desc: &SurfaceDesc) -> DeviceResult<InputSurface>;
    fn destroy_input_surface(&self, surface: InputSurface) -> DeviceResult<()>;

    fn create_bitstream_buffer(&self, size: usize) -> DeviceResult<BitstreamBuffer>;
    fn destroy_bitstream_buffer(&self, buffer: BitstreamBuffer) -> DeviceResult<()>;

    fn create_mv_buffer(&self, size: usize) -> DeviceResult<MvBuffer>;
    fn destroy_mv_buffer(&self, buffer: MvBuffer) -> DeviceResult<()>;

    /// Create an event and register it with the encoder
    fn register_async_event(&self) -> DeviceResult<AsyncEvent>;
    /// Unregister an event and close it
    fn unregister_async_event(&self, event: AsyncEvent) -> DeviceResult<()>;

    /// Block until `event` is signaled or `timeout` elapses
    ///
    /// Returns `false` on timeout. `None` waits without bound.
    fn wait_for_event(&self, event: &AsyncEvent, timeout: Option<Duration>) -> DeviceResult<bool>;

    /// Lock `surface` for host writes, run `write`, then unlock
    fn lock_input_surface(
        &self,
        surface: &InputSurface,
        write: &mut dyn FnMut(LockedSurface<'_>),
    ) -> DeviceResult<()>;

    /// Submit one picture; `Err(NeedMoreInput)` means accepted but buffered
    fn encode_picture(&self, params: &EncodePictureParams<'_>) -> DeviceResult<()>;

    fn run_motion_estimation(&self, params: &MotionEstimationParams<'_>) -> DeviceResult<()>;

    /// Push an end-of-stream marker; `eos_event` is signaled once every
    /// earlier submission has completed
    fn flush_encoder(&self, eos_event: Option<&AsyncEvent>) -> DeviceResult<()>;

    /// Lock a completed bitstream buffer and hand its payload to `read`
    fn lock_bitstream(&self, buffer: &BitstreamBuffer, read: &mut dyn FnMut(&[u8]))
        -> DeviceResult<()>;

    /// Lock a completed motion vector buffer and hand its contents to `read`
    fn lock_mv_buffer(&self, buffer: &MvBuffer, read: &mut dyn FnMut(&[u8])) -> DeviceResult<()>;
}
