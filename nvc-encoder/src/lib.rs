//! NVC Encoder - buffer lifecycle and pipelining for a hardware video encoder
//!
//! Keeps a fixed pool of hardware input/output buffers busy: frames are
//! packed into free input surfaces and submitted, completed outputs are
//! drained in submission order when the pool runs dry or at flush.
//!
//! Key pieces:
//! - `EncodeDevice` boundary with owned, non-cloneable resource handles
//! - Transactional pool allocation (RAII release on failure and teardown)
//! - Encode pipeline with backpressure and end-of-stream flush
//! - Motion-estimation-only pipeline with a sliding frame window
//! - External ME hint packing and motion vector text output
//! - Host-memory loopback device for tests and benchmarks

pub mod config;
pub mod device;
pub mod error;
pub mod hints;
pub mod io_buffers;
pub mod loopback;
pub mod motion_estimation;
pub mod mv;
pub mod pipeline;
pub mod sink;

pub use config::*;
pub use device::*;
pub use error::*;
pub use hints::*;
pub use io_buffers::*;
pub use loopback::*;
pub use motion_estimation::*;
pub use mv::*;
pub use pipeline::*;
pub use sink::*;

#[cfg(test)]
mod tests {
    use super::*;
    use nvc_video::{BufferFormat, PlanarFrame};
    use std::sync::Arc;

    #[test]
    fn test_p010_end_to_end() {
        let device = Arc::new(LoopbackDevice::new());
        let config = EncodeConfig::new(32, 16, BufferFormat::P010);
        let mut pipeline =
            EncodePipeline::new(Arc::clone(&device), &config, WriterSink::new(Vec::new()))
                .unwrap();

        let y = vec![0x3FFu16; 32 * 16];
        let c = vec![0x200u16; 16 * 8];
        let frame = PlanarFrame::new_16bit(&y, &c, &c, 32, 16);
        pipeline.submit(&EncodeFrameConfig::new(frame)).unwrap();
        pipeline.flush().unwrap();

        let bytes = pipeline.into_sink().into_inner();
        assert_eq!(bytes.len(), 4 + 64);
        // Samples arrive MSB-aligned, little-endian
        assert_eq!(&bytes[4..6], &[0xC0, 0xFF]);
    }
}
