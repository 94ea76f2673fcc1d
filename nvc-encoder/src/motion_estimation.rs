//! Motion-estimation-only pipeline
//!
//! Same slot discipline as the encode pipeline, but each slot holds a
//! reference and a current input surface and produces motion vectors instead
//! of a bitstream. There is no end-of-stream marker: a flush only drains.

use crate::config::{macroblock_count, EncodeConfig};
use crate::device::{EncodeDevice, MotionEstimationParams};
use crate::error::{EncodeError, Result};
use crate::io_buffers::{allocate_me_buffers, MotionEstimationBuffer};
use crate::mv::parse_mv_records;
use crate::pipeline::PipelineStats;
use crate::sink::MotionVectorSink;
use nvc_video::{BufferQueue, PlanarFrame, QueueStats, SlotId};
use std::sync::Arc;

/// One reference/current frame pair
#[derive(Debug, Clone, Copy)]
pub struct MeOnlyConfig<'a> {
    pub reference: PlanarFrame<'a>,
    pub input: PlanarFrame<'a>,
    pub reference_frame_index: u32,
    pub input_frame_index: u32,
}

/// Turns a frame stream into consecutive (previous, current) pairs
///
/// The first frame only primes the window; every later frame is paired with
/// the one before it.
#[derive(Debug, Default)]
pub struct MeFrameWindow<'a> {
    previous: Option<(u32, PlanarFrame<'a>)>,
}

impl<'a> MeFrameWindow<'a> {
    pub fn new() -> Self {
        Self { previous: None }
    }

    pub fn push(&mut self, index: u32, frame: PlanarFrame<'a>) -> Option<MeOnlyConfig<'a>> {
        let pair = self.previous.map(|(reference_index, reference)| MeOnlyConfig {
            reference,
            input: frame,
            reference_frame_index: reference_index,
            input_frame_index: index,
        });
        self.previous = Some((index, frame));
        pair
    }

    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Motion estimation pipeline over a pool of paired input surfaces
pub struct MotionEstimator<D: EncodeDevice, S: MotionVectorSink> {
    queue: BufferQueue<MotionEstimationBuffer<D>>,
    device: Arc<D>,
    sink: S,
    stats: PipelineStats,
}

impl<D: EncodeDevice, S: MotionVectorSink> MotionEstimator<D, S> {
    pub fn new(device: Arc<D>, config: &EncodeConfig, sink: S) -> Result<Self> {
        if !config.motion_estimation_only {
            return Err(EncodeError::InvalidConfig(
                "motion estimator requires motion estimation only mode".to_string(),
            ));
        }
        config.validate(&device.capabilities())?;

        let count = config.buffer_count();
        let desc = config.surface_desc();
        let buffers = allocate_me_buffers(&device, desc, count, config.async_mode)?;

        log::info!(
            "Motion estimator ready: {} buffers, {} {}x{}",
            count,
            desc.format,
            desc.width,
            desc.height
        );

        Ok(MotionEstimator {
            queue: BufferQueue::new(buffers),
            device,
            sink,
            stats: PipelineStats::default(),
        })
    }

    /// Pack both frames of a pair and submit them
    pub fn submit(&mut self, pair: &MeOnlyConfig<'_>) -> Result<()> {
        let (width, height) = (pair.input.width, pair.input.height);
        if (pair.reference.width, pair.reference.height) != (width, height) {
            return Err(EncodeError::InvalidInput(format!(
                "reference {}x{} does not match input {}x{}",
                pair.reference.width, pair.reference.height, width, height
            )));
        }

        let id = self.acquire_slot()?;
        let buffer = self.queue.get_mut(id);
        buffer.input_frame_index = pair.input_frame_index;
        buffer.reference_frame_index = pair.reference_frame_index;

        let [reference_input, current_input] = &buffer.inputs;
        reference_input.write_frame(&*self.device, &pair.reference)?;
        current_input.write_frame(&*self.device, &pair.input)?;

        let params = MotionEstimationParams {
            input: current_input.surface()?,
            reference: reference_input.surface()?,
            format: current_input.desc.format,
            output: buffer.output.handle()?,
            completion_event: buffer.output.event.as_ref(),
            width,
            height,
        };
        self.device
            .run_motion_estimation(&params)
            .map_err(EncodeError::hardware("run motion estimation"))?;

        buffer.submitted = true;
        self.stats.submitted += 1;
        Ok(())
    }

    /// Submit every consecutive pair of `frames`
    ///
    /// Returns the number of pairs submitted. Outputs still pending are
    /// delivered by the next [`flush`](Self::flush).
    pub fn run_sequence<'a, I>(&mut self, frames: I) -> Result<usize>
    where
        I: IntoIterator<Item = (u32, PlanarFrame<'a>)>,
    {
        let mut window = MeFrameWindow::new();
        let mut pairs = 0;
        for (index, frame) in frames {
            if let Some(pair) = window.push(index, frame) {
                self.submit(&pair)?;
                pairs += 1;
            }
        }
        Ok(pairs)
    }

    fn acquire_slot(&mut self) -> Result<SlotId> {
        if let Some(id) = self.queue.acquire_available() {
            return Ok(id);
        }

        let oldest = self.queue.reclaim_pending().ok_or_else(|| {
            EncodeError::InvalidConfig("motion estimation pool has no buffers".to_string())
        })?;
        log::debug!("Motion estimation pool full, draining oldest submission");
        self.stats.backpressure_reclaims += 1;
        self.process_output(oldest)?;

        self.queue.acquire_available().ok_or_else(|| {
            EncodeError::InvalidConfig("motion estimation pool has no buffers".to_string())
        })
    }

    fn process_output(&mut self, id: SlotId) -> Result<()> {
        let buffer = self.queue.get_mut(id);
        if !std::mem::take(&mut buffer.submitted) {
            return Ok(());
        }

        buffer.output.wait_complete(&*self.device)?;

        let desc = buffer.inputs[1].desc;
        let mbs = macroblock_count(desc.width, desc.height);
        let mut records = Vec::new();
        self.device
            .lock_mv_buffer(buffer.output.handle()?, &mut |data| {
                records = parse_mv_records(data, mbs);
            })
            .map_err(EncodeError::hardware("lock motion vector buffer"))?;

        self.sink.write_motion_vectors(
            buffer.input_frame_index,
            buffer.reference_frame_index,
            &records,
        )?;
        self.stats.completed += 1;
        Ok(())
    }

    /// Deliver every pending output in submission order
    pub fn flush(&mut self) -> Result<()> {
        let mut drained = 0;
        while let Some(id) = self.queue.reclaim_pending() {
            self.process_output(id)?;
            drained += 1;
        }
        log::debug!("Motion estimator flushed {} pending buffers", drained);
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

    pub fn into_sink(self) -> S {
        self.sink
    }
}
