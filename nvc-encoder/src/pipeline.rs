//! Frame submission pipeline
//!
//! Drives the encode pool: each frame takes a free slot (draining the oldest
//! pending slot first when none is free), is packed into the slot's input
//! surface and submitted. Completed access units reach the sink in
//! submission order.

use crate::config::{macroblock_count, EncodeConfig, EOS_WAIT_TIMEOUT};
use crate::device::{EncodeDevice, EncodePictureParams};
use crate::error::{EncodeError, NvEncStatus, Result};
use crate::hints::ExternalMeHints;
use crate::io_buffers::{allocate_encode_buffers, EncodeBuffer, EndOfStreamMarker};
use crate::sink::BitstreamSink;
use nvc_video::{BufferQueue, PictureStructure, PlanarFrame, QueueStats, SlotId};
use std::sync::Arc;

/// Per-frame submission parameters
#[derive(Debug, Clone, Copy)]
pub struct EncodeFrameConfig<'a> {
    pub frame: PlanarFrame<'a>,
    /// One signed QP offset per macroblock
    pub qp_delta_map: Option<&'a [i8]>,
    pub external_hints: Option<&'a ExternalMeHints>,
}

impl<'a> EncodeFrameConfig<'a> {
    pub fn new(frame: PlanarFrame<'a>) -> Self {
        Self {
            frame,
            qp_delta_map: None,
            external_hints: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub submitted: u64,
    pub completed: u64,
    /// Submissions that had to drain the oldest slot first
    pub backpressure_reclaims: u64,
}

/// Encode pipeline over a pool of hardware buffers
pub struct EncodePipeline<D: EncodeDevice, S: BitstreamSink> {
    queue: BufferQueue<EncodeBuffer<D>>,
    eos: EndOfStreamMarker<D>,
    device: Arc<D>,
    sink: S,
    picture_structure: PictureStructure,
    external_hints: bool,
    stats: PipelineStats,
}

impl<D: EncodeDevice, S: BitstreamSink> EncodePipeline<D, S> {
    /// Validate `config` and allocate the pool
    pub fn new(device: Arc<D>, config: &EncodeConfig, sink: S) -> Result<Self> {
        config.validate(&device.capabilities())?;
        if config.motion_estimation_only {
            return Err(EncodeError::InvalidConfig(
                "motion estimation only sessions use MotionEstimator".to_string(),
            ));
        }

        let count = config.buffer_count();
        let desc = config.surface_desc();
        let (buffers, eos) = allocate_encode_buffers(&device, desc, count, config.async_mode)?;

        log::info!(
            "Encode pipeline ready: {} buffers, {} {}x{}, {}",
            count,
            desc.format,
            desc.width,
            desc.height,
            if config.async_mode { "async" } else { "sync" }
        );

        Ok(EncodePipeline {
            queue: BufferQueue::new(buffers),
            eos,
            device,
            sink,
            picture_structure: config.picture_structure,
            external_hints: config.external_me_hints,
            stats: PipelineStats::default(),
        })
    }

    /// Pack and submit one frame
    ///
    /// Blocks on the oldest submission when every slot is in flight.
    pub fn submit(&mut self, frame: &EncodeFrameConfig<'_>) -> Result<()> {
        self.check_frame(frame)?;

        let id = self.acquire_slot()?;
        let buffer = self.queue.get_mut(id);
        buffer.input.write_frame(&*self.device, &frame.frame)?;

        let params = EncodePictureParams {
            input: buffer.input.surface()?,
            format: buffer.input.desc.format,
            output: buffer.output.handle()?,
            completion_event: buffer.output.event.as_ref(),
            width: frame.frame.width,
            height: frame.frame.height,
            picture_structure: self.picture_structure,
            qp_delta_map: frame.qp_delta_map,
            external_hints: frame.external_hints,
        };

        match self.device.encode_picture(&params) {
            // Accepted and held for reordering
            Ok(()) | Err(NvEncStatus::NeedMoreInput) => {}
            Err(status) => return Err(EncodeError::hardware("encode picture")(status)),
        }

        buffer.submitted = true;
        self.stats.submitted += 1;
        Ok(())
    }

    fn check_frame(&self, frame: &EncodeFrameConfig<'_>) -> Result<()> {
        let (width, height) = (frame.frame.width, frame.frame.height);

        if let Some(map) = frame.qp_delta_map {
            let mbs = macroblock_count(width, height);
            if map.len() < mbs {
                return Err(EncodeError::InvalidInput(format!(
                    "QP delta map has {} entries for {} macroblocks",
                    map.len(),
                    mbs
                )));
            }
        }

        if let Some(hints) = frame.external_hints {
            if !self.external_hints {
                return Err(EncodeError::InvalidInput(
                    "external ME hints were not enabled for this session".to_string(),
                ));
            }
            let mbs = macroblock_count(width, height);
            if hints.macroblock_count() < mbs {
                return Err(EncodeError::InvalidInput(format!(
                    "external hints cover {} of {} macroblocks",
                    hints.macroblock_count(),
                    mbs
                )));
            }
        }

        Ok(())
    }

    fn acquire_slot(&mut self) -> Result<SlotId> {
        if let Some(id) = self.queue.acquire_available() {
            return Ok(id);
        }

        let oldest = self.queue.reclaim_pending().ok_or_else(|| {
            EncodeError::InvalidConfig("encode pool has no buffers".to_string())
        })?;
        log::debug!("Encode pool full, draining oldest submission");
        self.stats.backpressure_reclaims += 1;
        self.process_output(oldest)?;

        self.queue.acquire_available().ok_or_else(|| {
            EncodeError::InvalidConfig("encode pool has no buffers".to_string())
        })
    }

    /// Wait for a reclaimed slot's output and hand it to the sink
    fn process_output(&mut self, id: SlotId) -> Result<()> {
        let buffer = self.queue.get_mut(id);
        if !std::mem::take(&mut buffer.submitted) {
            return Ok(());
        }

        buffer.output.wait_complete(&*self.device)?;

        let sink = &mut self.sink;
        let mut written = Ok(());
        self.device
            .lock_bitstream(buffer.output.handle()?, &mut |data| {
                written = sink.write_bitstream(data);
            })
            .map_err(EncodeError::hardware("lock bitstream"))?;
        written?;

        self.stats.completed += 1;
        Ok(())
    }

    /// Drain every pending submission and wait for end of stream
    ///
    /// Signals end of stream to the hardware, delivers all pending outputs
    /// in submission order, then waits up to [`EOS_WAIT_TIMEOUT`] for the
    /// hardware to confirm.
    pub fn flush(&mut self) -> Result<()> {
        self.device
            .flush_encoder(self.eos.event())
            .map_err(EncodeError::hardware("flush encoder"))?;

        let mut drained = 0;
        while let Some(id) = self.queue.reclaim_pending() {
            self.process_output(id)?;
            drained += 1;
        }

        if let Some(event) = self.eos.event() {
            let signaled = self
                .device
                .wait_for_event(event, Some(EOS_WAIT_TIMEOUT))
                .map_err(EncodeError::hardware("end of stream wait"))?;
            if !signaled {
                return Err(EncodeError::hardware("end of stream wait")(NvEncStatus::Generic));
            }
        }

        log::debug!("Encode pipeline flushed {} pending buffers", drained);
        Ok(())
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Tear down the pool and return the sink
    pub fn into_sink(self) -> S {
        log::debug!("Releasing {} encode buffers", self.queue.capacity());
        self.sink
    }
}
