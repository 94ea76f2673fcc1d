//! NVC Decoder - parser-driven hardware decode into host frames
//!
//! Key pieces:
//! - Parser callbacks (sequence / decode / display) behind `DecodeEventSink`
//! - Decode surface sizing per codec and HEVC level limits
//! - Grow-on-demand host frame stock with lock/unlock hand-off across threads

pub mod decoder;
pub mod error;
pub mod frame_stock;
pub mod surfaces;
pub mod types;

pub use decoder::*;
pub use error::*;
pub use frame_stock::*;
pub use surfaces::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proc_params_from_display_info() {
        let info = DisplayInfo {
            picture_index: 3,
            progressive_frame: false,
            top_field_first: true,
            repeat_first_field: -1,
            timestamp: 0,
        };
        let proc_params = ProcParams::from(&info);
        assert!(proc_params.unpaired_field);
        assert!(!proc_params.second_field);
        assert!(proc_params.top_field_first);
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(VideoCodec::Hevc.to_string(), "H.265/HEVC");
        assert_eq!(ChromaFormat::Yuv420.to_string(), "YUV 420");
    }
}
