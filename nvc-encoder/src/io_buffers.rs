//! Hardware I/O buffer allocation and release
//!
//! Each pool slot owns its device handles. Dropping a slot destroys every
//! handle it still holds, so a failed allocation unwinds whatever was already
//! created and leaves no resource behind.

use crate::config::{mv_buffer_size, BITSTREAM_BUFFER_SIZE};
use crate::device::{AsyncEvent, BitstreamBuffer, EncodeDevice, InputSurface, MvBuffer};
use crate::error::{EncodeError, NvEncStatus, Result};
use nvc_video::{pack_frame, PlanarFrame, SurfaceDesc};
use std::sync::Arc;

/// Input half of a slot: one hardware surface
#[derive(Debug)]
pub struct InputBuffer {
    pub(crate) surface: Option<InputSurface>,
    pub(crate) desc: SurfaceDesc,
}

impl InputBuffer {
    fn empty(desc: SurfaceDesc) -> Self {
        InputBuffer {
            surface: None,
            desc,
        }
    }

    fn allocate<D: EncodeDevice>(&mut self, device: &D) -> Result<()> {
        let surface = device
            .create_input_surface(&self.desc)
            .map_err(EncodeError::allocation("input surface"))?;
        self.surface = Some(surface);
        Ok(())
    }

    pub fn desc(&self) -> &SurfaceDesc {
        &self.desc
    }

    pub(crate) fn surface(&self) -> Result<&InputSurface> {
        self.surface.as_ref().ok_or(EncodeError::Hardware {
            op: "input surface lookup",
            status: NvEncStatus::InvalidPtr,
        })
    }

    /// Lock the surface, pack `frame` into it, unlock
    pub(crate) fn write_frame<D: EncodeDevice>(
        &self,
        device: &D,
        frame: &PlanarFrame<'_>,
    ) -> Result<()> {
        let surface = self.surface()?;
        let desc = self.desc;
        let mut packed = Ok(());
        device
            .lock_input_surface(surface, &mut |locked| {
                packed = pack_frame(frame, &desc, locked.data, locked.pitch);
            })
            .map_err(EncodeError::hardware("lock input surface"))?;
        packed?;
        Ok(())
    }

    fn release<D: EncodeDevice>(&mut self, device: &D) {
        if let Some(surface) = self.surface.take() {
            if let Err(status) = device.destroy_input_surface(surface) {
                log::warn!("Failed to destroy input surface: {}", status);
            }
        }
    }
}

/// Output half of a slot: an output buffer plus its completion event
#[derive(Debug)]
pub struct OutputBuffer<H> {
    pub(crate) handle: Option<H>,
    pub(crate) capacity: usize,
    pub(crate) event: Option<AsyncEvent>,
}

impl<H> OutputBuffer<H> {
    fn empty(capacity: usize) -> Self {
        OutputBuffer {
            handle: None,
            capacity,
            event: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_async(&self) -> bool {
        self.event.is_some()
    }

    pub(crate) fn handle(&self) -> Result<&H> {
        self.handle.as_ref().ok_or(EncodeError::Hardware {
            op: "output buffer lookup",
            status: NvEncStatus::InvalidPtr,
        })
    }

    /// Block until the hardware signals completion; no-op in sync mode
    pub(crate) fn wait_complete<D: EncodeDevice>(&self, device: &D) -> Result<()> {
        if let Some(event) = self.event.as_ref() {
            let signaled = device
                .wait_for_event(event, None)
                .map_err(EncodeError::hardware("wait for completion"))?;
            if !signaled {
                return Err(EncodeError::hardware("wait for completion")(NvEncStatus::Generic));
            }
        }
        Ok(())
    }

    fn register_event<D: EncodeDevice>(&mut self, device: &D) -> Result<()> {
        let event = device
            .register_async_event()
            .map_err(EncodeError::allocation("completion event"))?;
        self.event = Some(event);
        Ok(())
    }
}

fn release_event<D: EncodeDevice>(device: &D, event: &mut Option<AsyncEvent>) {
    if let Some(event) = event.take() {
        if let Err(status) = device.unregister_async_event(event) {
            log::warn!("Failed to unregister completion event: {}", status);
        }
    }
}

/// One slot of the encode pool
pub struct EncodeBuffer<D: EncodeDevice> {
    device: Arc<D>,
    pub(crate) input: InputBuffer,
    pub(crate) output: OutputBuffer<BitstreamBuffer>,
    /// Set once a picture was handed to the hardware from this slot
    pub(crate) submitted: bool,
}

impl<D: EncodeDevice> EncodeBuffer<D> {
    fn empty(device: Arc<D>, desc: SurfaceDesc) -> Self {
        EncodeBuffer {
            device,
            input: InputBuffer::empty(desc),
            output: OutputBuffer::empty(BITSTREAM_BUFFER_SIZE),
            submitted: false,
        }
    }

    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    pub fn output(&self) -> &OutputBuffer<BitstreamBuffer> {
        &self.output
    }

    /// Destroy every handle still held; safe to call more than once
    pub fn release(&mut self) {
        let device = &*self.device;
        self.input.release(device);
        if let Some(buffer) = self.output.handle.take() {
            if let Err(status) = device.destroy_bitstream_buffer(buffer) {
                log::warn!("Failed to destroy bitstream buffer: {}", status);
            }
        }
        release_event(device, &mut self.output.event);
        self.submitted = false;
    }
}

impl<D: EncodeDevice> Drop for EncodeBuffer<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// One slot of the motion estimation pool
///
/// Holds two input surfaces: `inputs[0]` receives the reference frame and
/// `inputs[1]` the current frame.
pub struct MotionEstimationBuffer<D: EncodeDevice> {
    device: Arc<D>,
    pub(crate) inputs: [InputBuffer; 2],
    pub(crate) output: OutputBuffer<MvBuffer>,
    pub(crate) input_frame_index: u32,
    pub(crate) reference_frame_index: u32,
    pub(crate) submitted: bool,
}

impl<D: EncodeDevice> MotionEstimationBuffer<D> {
    fn empty(device: Arc<D>, desc: SurfaceDesc) -> Self {
        MotionEstimationBuffer {
            device,
            inputs: [InputBuffer::empty(desc), InputBuffer::empty(desc)],
            output: OutputBuffer::empty(mv_buffer_size(desc.width, desc.height)),
            input_frame_index: 0,
            reference_frame_index: 0,
            submitted: false,
        }
    }

    pub fn frame_indices(&self) -> (u32, u32) {
        (self.input_frame_index, self.reference_frame_index)
    }

    pub fn output(&self) -> &OutputBuffer<MvBuffer> {
        &self.output
    }

    pub fn release(&mut self) {
        let device = &*self.device;
        for input in self.inputs.iter_mut() {
            input.release(device);
        }
        if let Some(buffer) = self.output.handle.take() {
            if let Err(status) = device.destroy_mv_buffer(buffer) {
                log::warn!("Failed to destroy motion vector buffer: {}", status);
            }
        }
        release_event(device, &mut self.output.event);
        self.submitted = false;
    }
}

impl<D: EncodeDevice> Drop for MotionEstimationBuffer<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// End-of-stream marker: carries only the flush completion event
pub struct EndOfStreamMarker<D: EncodeDevice> {
    device: Arc<D>,
    pub(crate) event: Option<AsyncEvent>,
}

impl<D: EncodeDevice> EndOfStreamMarker<D> {
    pub fn new(device: Arc<D>, async_mode: bool) -> Result<Self> {
        let mut marker = EndOfStreamMarker {
            device,
            event: None,
        };
        if async_mode {
            let event = marker
                .device
                .register_async_event()
                .map_err(EncodeError::allocation("end of stream event"))?;
            marker.event = Some(event);
        }
        Ok(marker)
    }

    pub fn event(&self) -> Option<&AsyncEvent> {
        self.event.as_ref()
    }
}

impl<D: EncodeDevice> Drop for EndOfStreamMarker<D> {
    fn drop(&mut self) {
        release_event(&*self.device, &mut self.event);
    }
}

/// Allocate `count` encode slots plus the end-of-stream marker
///
/// Either every resource is created or none remains allocated.
pub fn allocate_encode_buffers<D: EncodeDevice>(
    device: &Arc<D>,
    desc: SurfaceDesc,
    count: usize,
    async_mode: bool,
) -> Result<(Vec<EncodeBuffer<D>>, EndOfStreamMarker<D>)> {
    let mut buffers = Vec::with_capacity(count);

    for _ in 0..count {
        let mut buffer = EncodeBuffer::empty(Arc::clone(device), desc);
        buffer.input.allocate(&**device)?;

        let bitstream = device
            .create_bitstream_buffer(BITSTREAM_BUFFER_SIZE)
            .map_err(EncodeError::allocation("bitstream buffer"))?;
        buffer.output.handle = Some(bitstream);

        if async_mode {
            buffer.output.register_event(&**device)?;
        }
        buffers.push(buffer);
    }

    let eos = EndOfStreamMarker::new(Arc::clone(device), async_mode)?;

    log::debug!(
        "Allocated {} encode buffers ({} {}x{})",
        count,
        desc.format,
        desc.width,
        desc.height
    );
    Ok((buffers, eos))
}

/// Allocate `count` motion estimation slots
pub fn allocate_me_buffers<D: EncodeDevice>(
    device: &Arc<D>,
    desc: SurfaceDesc,
    count: usize,
    async_mode: bool,
) -> Result<Vec<MotionEstimationBuffer<D>>> {
    let mut buffers = Vec::with_capacity(count);

    for _ in 0..count {
        let mut buffer = MotionEstimationBuffer::empty(Arc::clone(device), desc);
        for input in buffer.inputs.iter_mut() {
            input.allocate(&**device)?;
        }

        let mv = device
            .create_mv_buffer(buffer.output.capacity)
            .map_err(EncodeError::allocation("motion vector buffer"))?;
        buffer.output.handle = Some(mv);

        if async_mode {
            buffer.output.register_event(&**device)?;
        }
        buffers.push(buffer);
    }

    log::debug!(
        "Allocated {} motion estimation buffers ({} {}x{})",
        count,
        desc.format,
        desc.width,
        desc.height
    );
    Ok(buffers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackDevice;
    use nvc_video::BufferFormat;

    fn desc() -> SurfaceDesc {
        SurfaceDesc::new(BufferFormat::NV12, 64, 32)
    }

    #[test]
    fn test_allocate_encode_buffers_counts() {
        let device = Arc::new(LoopbackDevice::new());
        let (buffers, eos) = allocate_encode_buffers(&device, desc(), 4, true).unwrap();

        assert_eq!(buffers.len(), 4);
        assert!(eos.event().is_some());
        assert!(buffers.iter().all(|b| b.output().is_async()));
        // surface + bitstream + event per slot, one EOS event
        assert_eq!(device.live_resources(), 4 * 3 + 1);

        drop(buffers);
        drop(eos);
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_sync_mode_has_no_events() {
        let device = Arc::new(LoopbackDevice::new());
        let (buffers, eos) = allocate_encode_buffers(&device, desc(), 2, false).unwrap();

        assert!(eos.event().is_none());
        assert!(buffers.iter().all(|b| !b.output().is_async()));
        assert_eq!(device.live_resources(), 2 * 2);
    }

    #[test]
    fn test_allocation_failure_rolls_back() {
        for fail_after in 0..13 {
            let device = Arc::new(LoopbackDevice::new());
            device.fail_allocations_after(fail_after);

            let result = allocate_encode_buffers(&device, desc(), 4, true);
            match result {
                Err(EncodeError::Allocation { status, .. }) => {
                    assert_eq!(status, NvEncStatus::OutOfMemory)
                }
                Err(other) => panic!("unexpected error {other}"),
                Ok(_) => panic!("allocation {fail_after} should have failed"),
            }
            assert_eq!(device.live_resources(), 0, "leak after {fail_after} allocations");
        }
    }

    #[test]
    fn test_me_buffers_hold_two_surfaces() {
        let device = Arc::new(LoopbackDevice::new());
        let buffers = allocate_me_buffers(&device, desc(), 3, false).unwrap();

        assert_eq!(buffers.len(), 3);
        assert_eq!(buffers[0].output().capacity(), mv_buffer_size(64, 32));
        assert_eq!(device.live_resources(), 3 * 3);

        drop(buffers);
        assert_eq!(device.live_resources(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let device = Arc::new(LoopbackDevice::new());
        let (mut buffers, _eos) = allocate_encode_buffers(&device, desc(), 1, false).unwrap();

        buffers[0].release();
        buffers[0].release();
        assert_eq!(device.live_resources(), 0);
    }
}
