//! Error types for the encode pipelines

use nvc_video::VideoError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EncodeError>;

/// Status codes reported by the encoder hardware
///
/// Discriminants match the vendor API; success is represented by `Ok`.
#[repr(u32)]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NvEncStatus {
    #[error("no encode capable device")]
    NoEncodeDevice = 1,
    #[error("device not supported")]
    UnsupportedDevice = 2,
    #[error("invalid encoder device")]
    InvalidEncoderDevice = 3,
    #[error("invalid device")]
    InvalidDevice = 4,
    #[error("device does not exist")]
    DeviceNotExist = 5,
    #[error("invalid pointer")]
    InvalidPtr = 6,
    #[error("invalid completion event")]
    InvalidEvent = 7,
    #[error("invalid parameter")]
    InvalidParam = 8,
    #[error("invalid call")]
    InvalidCall = 9,
    #[error("out of memory")]
    OutOfMemory = 10,
    #[error("encoder not initialized")]
    EncoderNotInitialized = 11,
    #[error("unsupported parameter")]
    UnsupportedParam = 12,
    #[error("lock busy")]
    LockBusy = 13,
    #[error("not enough buffer")]
    NotEnoughBuffer = 14,
    #[error("invalid API version")]
    InvalidVersion = 15,
    #[error("map failed")]
    MapFailed = 16,
    #[error("need more input")]
    NeedMoreInput = 17,
    #[error("encoder busy")]
    EncoderBusy = 18,
    #[error("event not registered")]
    EventNotRegistered = 19,
    #[error("generic error")]
    Generic = 20,
    #[error("incompatible client key")]
    IncompatibleClientKey = 21,
    #[error("unimplemented")]
    Unimplemented = 22,
}

/// Main error type for the encode pipelines
#[derive(Error, Debug)]
pub enum EncodeError {
    /// Configuration rejected before any allocation or submission
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Per-frame input rejected before submission
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Hardware resource allocation failed during setup
    #[error("Failed to allocate {what}: {status}")]
    Allocation {
        what: &'static str,
        status: NvEncStatus,
    },

    /// A hardware call failed mid-stream
    #[error("{op} failed: {status}")]
    Hardware {
        op: &'static str,
        status: NvEncStatus,
    },

    #[error("Surface packing failed: {0}")]
    Video(#[from] VideoError),

    #[error("Output sink error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    pub fn hardware(op: &'static str) -> impl FnOnce(NvEncStatus) -> EncodeError {
        move |status| {
            log::error!("{} failed: {}", op, status);
            EncodeError::Hardware { op, status }
        }
    }

    pub fn allocation(what: &'static str) -> impl FnOnce(NvEncStatus) -> EncodeError {
        move |status| {
            log::error!("Failed to allocate {}: {}", what, status);
            EncodeError::Allocation { what, status }
        }
    }

    /// Hardware status behind this error, if any
    pub fn status(&self) -> Option<NvEncStatus> {
        match self {
            EncodeError::Allocation { status, .. } | EncodeError::Hardware { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_match_vendor_values() {
        assert_eq!(NvEncStatus::Generic as u32, 20);
        assert_eq!(NvEncStatus::IncompatibleClientKey as u32, 21);
        assert_eq!(NvEncStatus::Unimplemented as u32, 22);
    }

    #[test]
    fn test_status_of_errors() {
        let err = EncodeError::hardware("encode picture")(NvEncStatus::IncompatibleClientKey);
        assert_eq!(err.status(), Some(NvEncStatus::IncompatibleClientKey));
        assert_eq!(err.to_string(), "encode picture failed: incompatible client key");
        assert_eq!(EncodeError::InvalidInput("empty".into()).status(), None);
    }
}
