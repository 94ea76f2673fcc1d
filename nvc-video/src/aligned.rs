//! Zeroed host memory aligned for SIMD and 16-bit sample access

use crate::error::VideoError;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

pub const SURFACE_ALIGNMENT: usize = 32; // AVX2 requires 32-byte alignment

/// Owned, zero-initialized byte buffer with [`SURFACE_ALIGNMENT`] alignment
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    pub fn zeroed(len: usize) -> Result<Self, VideoError> {
        // Zero-sized layouts are not valid allocator input
        let layout = Layout::from_size_align(len.max(1), SURFACE_ALIGNMENT)
            .map_err(|_| VideoError::Allocation { size: len })?;

        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(VideoError::Allocation { size: len })?;

        Ok(AlignedBuffer { ptr, len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_and_zeroing() {
        let buffer = AlignedBuffer::zeroed(1920 * 1080 * 3 / 2).unwrap();
        assert_eq!(buffer.as_slice().as_ptr() as usize % 32, 0, "Buffer not aligned");
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_length() {
        let mut buffer = AlignedBuffer::zeroed(0).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.as_mut_slice().is_empty());
    }

    #[test]
    fn test_u16_view() {
        let mut buffer = AlignedBuffer::zeroed(64).unwrap();
        let samples: &mut [u16] = bytemuck::cast_slice_mut(buffer.as_mut_slice());
        samples[3] = 0xFFC0;
        assert_eq!(samples.len(), 32);
    }
}
