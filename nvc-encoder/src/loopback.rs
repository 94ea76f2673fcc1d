//! Host-memory encoder device
//!
//! Implements [`EncodeDevice`] without hardware so pipelines can be driven in
//! tests and benchmarks. Submissions complete immediately. Each encoded
//! packet is the little-endian submission sequence number followed by the
//! first luma row of the input surface, so consumers can check both ordering
//! and surface contents. Motion estimation reports the luma SAD of each
//! macroblock as its cost with zero vectors.

use crate::config::MACROBLOCK_SIZE;
use crate::device::{
    AsyncEvent, BitstreamBuffer, DeviceResult, EncodeCaps, EncodeDevice, EncodePictureParams,
    InputSurface, LockedSurface, MotionEstimationParams, MvBuffer,
};
use crate::error::NvEncStatus;
use crate::mv::{MvRecord, PartitionType, MV_RECORD_SIZE};
use nvc_video::{AlignedBuffer, SurfaceDesc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Row pitch granularity of loopback surfaces
pub const LOOPBACK_PITCH_ALIGNMENT: usize = 256;

struct HostSurface {
    desc: SurfaceDesc,
    pitch: usize,
    data: AlignedBuffer,
}

struct HostOutput {
    capacity: usize,
    data: Vec<u8>,
}

#[derive(Default)]
struct LoopbackState {
    next_handle: u64,
    surfaces: HashMap<u64, HostSurface>,
    bitstreams: HashMap<u64, HostOutput>,
    mv_buffers: HashMap<u64, HostOutput>,
    events: HashMap<u64, bool>, // signaled
    allocations_left: Option<usize>,
    stall_end_of_stream: bool,
    fail_encode: Option<NvEncStatus>,
    frames_encoded: u64,
    motion_estimations: u64,
    flushes: u64,
}

impl LoopbackState {
    fn next_handle(&mut self) -> DeviceResult<u64> {
        if let Some(left) = self.allocations_left.as_mut() {
            if *left == 0 {
                return Err(NvEncStatus::OutOfMemory);
            }
            *left -= 1;
        }
        self.next_handle += 1;
        Ok(self.next_handle)
    }

    fn signal(&mut self, event: Option<&AsyncEvent>) -> DeviceResult<()> {
        if let Some(event) = event {
            let signaled = self
                .events
                .get_mut(&event.as_raw())
                .ok_or(NvEncStatus::EventNotRegistered)?;
            *signaled = true;
        }
        Ok(())
    }
}

/// Software stand-in for the hardware encoder
pub struct LoopbackDevice {
    caps: EncodeCaps,
    state: Mutex<LoopbackState>,
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self::with_caps(EncodeCaps {
            max_width: 4096,
            max_height: 4096,
            yuv444: true,
            ten_bit: true,
            async_encode: true,
            motion_estimation_only: true,
        })
    }

    pub fn with_caps(caps: EncodeCaps) -> Self {
        Self {
            caps,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Let the next `count` allocations succeed, then fail with `OutOfMemory`
    pub fn fail_allocations_after(&self, count: usize) {
        self.state.lock().allocations_left = Some(count);
    }

    /// Never signal the end-of-stream event on flush
    pub fn stall_end_of_stream(&self, stall: bool) {
        self.state.lock().stall_end_of_stream = stall;
    }

    /// Fail every following submission with `status`
    pub fn fail_encode(&self, status: Option<NvEncStatus>) {
        self.state.lock().fail_encode = status;
    }

    /// Surfaces, output buffers and events currently alive
    pub fn live_resources(&self) -> usize {
        let state = self.state.lock();
        state.surfaces.len() + state.bitstreams.len() + state.mv_buffers.len() + state.events.len()
    }

    pub fn frames_encoded(&self) -> u64 {
        self.state.lock().frames_encoded
    }

    pub fn motion_estimations(&self) -> u64 {
        self.state.lock().motion_estimations
    }

    pub fn flush_count(&self) -> u64 {
        self.state.lock().flushes
    }
}

impl Default for LoopbackDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn luma_sad(input: &HostSurface, reference: &HostSurface, width: u32, height: u32) -> Vec<u32> {
    let bps = input.desc.format.bytes_per_sample();
    let mb = MACROBLOCK_SIZE as usize;
    let (width, height) = (width as usize, height as usize);
    let cols = width.div_ceil(mb);
    let rows = height.div_ceil(mb);
    let mut costs = vec![0u32; cols * rows];

    for y in 0..height {
        let cur = &input.data.as_slice()[y * input.pitch..][..width * bps];
        let refr = &reference.data.as_slice()[y * reference.pitch..][..width * bps];
        for (i, (a, b)) in cur.iter().zip(refr).enumerate() {
            let x = i / bps;
            costs[(y / mb) * cols + x / mb] += a.abs_diff(*b) as u32;
        }
    }
    costs
}

impl EncodeDevice for LoopbackDevice {
    fn capabilities(&self) -> EncodeCaps {
        self.caps
    }

    fn create_input_surface(&self, desc: &SurfaceDesc) -> DeviceResult<InputSurface> {
        let pitch = desc.min_pitch().div_ceil(LOOPBACK_PITCH_ALIGNMENT) * LOOPBACK_PITCH_ALIGNMENT;
        let data = AlignedBuffer::zeroed(desc.required_len(pitch))
            .map_err(|_| NvEncStatus::OutOfMemory)?;

        let mut state = self.state.lock();
        let handle = state.next_handle()?;
        state.surfaces.insert(
            handle,
            HostSurface {
                desc: *desc,
                pitch,
                data,
            },
        );
        Ok(InputSurface::from_raw(handle))
    }

    fn destroy_input_surface(&self, surface: InputSurface) -> DeviceResult<()> {
        self.state
            .lock()
            .surfaces
            .remove(&surface.as_raw())
            .map(|_| ())
            .ok_or(NvEncStatus::InvalidPtr)
    }

    fn create_bitstream_buffer(&self, size: usize) -> DeviceResult<BitstreamBuffer> {
        let mut state = self.state.lock();
        let handle = state.next_handle()?;
        state.bitstreams.insert(
            handle,
            HostOutput {
                capacity: size,
                data: Vec::new(),
            },
        );
        Ok(BitstreamBuffer::from_raw(handle))
    }

    fn destroy_bitstream_buffer(&self, buffer: BitstreamBuffer) -> DeviceResult<()> {
        self.state
            .lock()
            .bitstreams
            .remove(&buffer.as_raw())
            .map(|_| ())
            .ok_or(NvEncStatus::InvalidPtr)
    }

    fn create_mv_buffer(&self, size: usize) -> DeviceResult<MvBuffer> {
        let mut state = self.state.lock();
        let handle = state.next_handle()?;
        state.mv_buffers.insert(
            handle,
            HostOutput {
                capacity: size,
                data: Vec::new(),
            },
        );
        Ok(MvBuffer::from_raw(handle))
    }

    fn destroy_mv_buffer(&self, buffer: MvBuffer) -> DeviceResult<()> {
        self.state
            .lock()
            .mv_buffers
            .remove(&buffer.as_raw())
            .map(|_| ())
            .ok_or(NvEncStatus::InvalidPtr)
    }

    fn register_async_event(&self) -> DeviceResult<AsyncEvent> {
        let mut state = self.state.lock();
        let handle = state.next_handle()?;
        state.events.insert(handle, false);
        Ok(AsyncEvent::from_raw(handle))
    }

    fn unregister_async_event(&self, event: AsyncEvent) -> DeviceResult<()> {
        self.state
            .lock()
            .events
            .remove(&event.as_raw())
            .map(|_| ())
            .ok_or(NvEncStatus::EventNotRegistered)
    }

    fn wait_for_event(&self, event: &AsyncEvent, _timeout: Option<Duration>) -> DeviceResult<bool> {
        // Work completes synchronously, so an unsignaled event never fires
        let mut state = self.state.lock();
        let signaled = state
            .events
            .get_mut(&event.as_raw())
            .ok_or(NvEncStatus::EventNotRegistered)?;
        Ok(std::mem::take(signaled))
    }

    fn lock_input_surface(
        &self,
        surface: &InputSurface,
        write: &mut dyn FnMut(LockedSurface<'_>),
    ) -> DeviceResult<()> {
        let mut state = self.state.lock();
        let host = state
            .surfaces
            .get_mut(&surface.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        let pitch = host.pitch;
        write(LockedSurface {
            data: host.data.as_mut_slice(),
            pitch,
        });
        Ok(())
    }

    fn encode_picture(&self, params: &EncodePictureParams<'_>) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_encode {
            return Err(status);
        }

        let surface = state
            .surfaces
            .get(&params.input.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        if surface.desc.format != params.format
            || params.width > surface.desc.width
            || params.height > surface.desc.height
        {
            return Err(NvEncStatus::InvalidParam);
        }

        let sequence = state.frames_encoded as u32;
        let row_len = params.width as usize * params.format.bytes_per_sample();
        let mut packet = Vec::with_capacity(4 + row_len);
        packet.extend_from_slice(&sequence.to_le_bytes());
        packet.extend_from_slice(&surface.data.as_slice()[..row_len]);

        let output = state
            .bitstreams
            .get_mut(&params.output.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        if packet.len() > output.capacity {
            return Err(NvEncStatus::NotEnoughBuffer);
        }
        output.data = packet;

        state.frames_encoded += 1;
        state.signal(params.completion_event)
    }

    fn run_motion_estimation(&self, params: &MotionEstimationParams<'_>) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if let Some(status) = state.fail_encode {
            return Err(status);
        }

        let input = state
            .surfaces
            .get(&params.input.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        let reference = state
            .surfaces
            .get(&params.reference.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        if params.width > input.desc.width || params.height > input.desc.height {
            return Err(NvEncStatus::InvalidParam);
        }

        let records: Vec<MvRecord> = luma_sad(input, reference, params.width, params.height)
            .into_iter()
            .map(|cost| MvRecord {
                partition_type: PartitionType::P16x16 as u8,
                mb_cost: cost,
                ..Default::default()
            })
            .collect();

        let output = state
            .mv_buffers
            .get_mut(&params.output.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        if records.len() * MV_RECORD_SIZE > output.capacity {
            return Err(NvEncStatus::NotEnoughBuffer);
        }
        output.data = bytemuck::cast_slice(&records).to_vec();

        state.motion_estimations += 1;
        state.signal(params.completion_event)
    }

    fn flush_encoder(&self, eos_event: Option<&AsyncEvent>) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state.flushes += 1;
        if state.stall_end_of_stream {
            return Ok(());
        }
        state.signal(eos_event)
    }

    fn lock_bitstream(
        &self,
        buffer: &BitstreamBuffer,
        read: &mut dyn FnMut(&[u8]),
    ) -> DeviceResult<()> {
        let state = self.state.lock();
        let output = state
            .bitstreams
            .get(&buffer.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        read(&output.data);
        Ok(())
    }

    fn lock_mv_buffer(&self, buffer: &MvBuffer, read: &mut dyn FnMut(&[u8])) -> DeviceResult<()> {
        let state = self.state.lock();
        let output = state
            .mv_buffers
            .get(&buffer.as_raw())
            .ok_or(NvEncStatus::InvalidPtr)?;
        read(&output.data);
        Ok(())
    }
}
