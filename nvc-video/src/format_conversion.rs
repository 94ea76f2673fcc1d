//! Planar YUV to hardware surface packing with AVX2 dispatch
//!
//! Source planes are tightly packed (or strided) Y, Cb and Cr arrays.
//! Destinations are the pitch-aligned layouts encoder input surfaces use:
//! NV12 and P010 store an interleaved CbCr plane after the luma rows,
//! the 4:4:4 formats stack three full planes. 10-bit samples are written
//! MSB-aligned into 16-bit containers.
//!
//! Source strides are in samples. Destination strides are in bytes, as
//! reported by a surface lock. A stride of 0 means "tightly packed".

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use crate::error::VideoError;
use crate::types::{BufferFormat, PlanarFrame, PlaneData, SurfaceDesc};

/// Shift that left-aligns a 10-bit sample in a 16-bit container
pub const TEN_BIT_SHIFT: u32 = 6;

fn default_stride(stride: usize, width: usize) -> usize {
    if stride == 0 {
        width
    } else {
        stride
    }
}

/// Pack 8-bit planar YUV 4:2:0 into NV12
///
/// `dst_luma` receives `height` rows; `dst_chroma` receives `height / 2`
/// rows of interleaved Cb/Cr. Odd widths and heights truncate the chroma.
///
/// # Panics
/// Panics if any buffer is too small for the given dimensions and strides.
pub fn convert_yuv_to_nv12(
    src_y: &[u8],
    src_cb: &[u8],
    src_cr: &[u8],
    dst_luma: &mut [u8],
    dst_chroma: &mut [u8],
    width: usize,
    height: usize,
    src_stride: usize,
    dst_stride: usize,
) {
    let src_stride = default_stride(src_stride, width);
    let dst_stride = default_stride(dst_stride, width);

    for row in 0..height {
        let src = &src_y[row * src_stride..row * src_stride + width];
        dst_luma[row * dst_stride..row * dst_stride + width].copy_from_slice(src);
    }

    let chroma_width = width / 2;
    let chroma_stride = src_stride / 2;
    for row in 0..height / 2 {
        let src_offset = row * chroma_stride;
        let cb = &src_cb[src_offset..src_offset + chroma_width];
        let cr = &src_cr[src_offset..src_offset + chroma_width];
        let dst = &mut dst_chroma[row * dst_stride..row * dst_stride + chroma_width * 2];

        for ((pair, &u), &v) in dst.chunks_exact_mut(2).zip(cb).zip(cr) {
            pair[0] = u;
            pair[1] = v;
        }
    }
}

/// Pack 8-bit planar YUV 4:4:4 into three stacked surface planes
///
/// # Panics
/// Panics if any buffer is too small for the given dimensions and strides.
pub fn convert_yuv_to_yuv444(
    src_y: &[u8],
    src_cb: &[u8],
    src_cr: &[u8],
    dst_y: &mut [u8],
    dst_cb: &mut [u8],
    dst_cr: &mut [u8],
    width: usize,
    height: usize,
    src_stride: usize,
    dst_stride: usize,
) {
    let src_stride = default_stride(src_stride, width);
    let dst_stride = default_stride(dst_stride, width);

    for row in 0..height {
        let src = row * src_stride..row * src_stride + width;
        let dst = row * dst_stride..row * dst_stride + width;
        dst_y[dst.clone()].copy_from_slice(&src_y[src.clone()]);
        dst_cb[dst.clone()].copy_from_slice(&src_cb[src.clone()]);
        dst_cr[dst].copy_from_slice(&src_cr[src]);
    }
}

/// Pack 10-bit planar YUV 4:2:0 into P010
///
/// Same layout as [`convert_yuv_to_nv12`] on 16-bit samples, each shifted
/// left by [`TEN_BIT_SHIFT`]. `dst_stride` is in bytes.
///
/// # Panics
/// Panics if any buffer is too small for the given dimensions and strides.
pub fn convert_yuv10_to_p010(
    src_y: &[u16],
    src_cb: &[u16],
    src_cr: &[u16],
    dst_luma: &mut [u16],
    dst_chroma: &mut [u16],
    width: usize,
    height: usize,
    src_stride: usize,
    dst_stride: usize,
) {
    let src_stride = default_stride(src_stride, width);
    let dst_stride = default_stride(dst_stride, width * 2) / 2;

    for row in 0..height {
        shift_row_to_msb(
            &src_y[row * src_stride..row * src_stride + width],
            &mut dst_luma[row * dst_stride..row * dst_stride + width],
        );
    }

    let chroma_width = width / 2;
    let chroma_stride = src_stride / 2;
    for row in 0..height / 2 {
        let src_offset = row * chroma_stride;
        let cb = &src_cb[src_offset..src_offset + chroma_width];
        let cr = &src_cr[src_offset..src_offset + chroma_width];
        let dst = &mut dst_chroma[row * dst_stride..row * dst_stride + chroma_width * 2];

        for ((pair, &u), &v) in dst.chunks_exact_mut(2).zip(cb).zip(cr) {
            pair[0] = u << TEN_BIT_SHIFT;
            pair[1] = v << TEN_BIT_SHIFT;
        }
    }
}

/// Pack 10-bit planar YUV 4:4:4 into three stacked 16-bit planes
///
/// `dst_stride` is in bytes.
///
/// # Panics
/// Panics if any buffer is too small for the given dimensions and strides.
pub fn convert_yuv10_to_yuv444_10(
    src_y: &[u16],
    src_cb: &[u16],
    src_cr: &[u16],
    dst_y: &mut [u16],
    dst_cb: &mut [u16],
    dst_cr: &mut [u16],
    width: usize,
    height: usize,
    src_stride: usize,
    dst_stride: usize,
) {
    let src_stride = default_stride(src_stride, width);
    let dst_stride = default_stride(dst_stride, width * 2) / 2;

    for row in 0..height {
        let src = row * src_stride..row * src_stride + width;
        let dst = row * dst_stride..row * dst_stride + width;
        shift_row_to_msb(&src_y[src.clone()], &mut dst_y[dst.clone()]);
        shift_row_to_msb(&src_cb[src.clone()], &mut dst_cb[dst.clone()]);
        shift_row_to_msb(&src_cr[src], &mut dst_cr[dst]);
    }
}

/// Shift one row of 10-bit samples into MSB-aligned 16-bit samples
///
/// Dispatches to AVX2 at runtime when available.
pub fn shift_row_to_msb(src: &[u16], dst: &mut [u16]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe {
                shift_row_to_msb_avx2(src, dst);
            }
            return;
        }
    }

    shift_row_to_msb_scalar(src, dst);
}

/// Shift a row of samples using AVX2, 16 samples per iteration
///
/// # Safety
/// Requires AVX2 CPU support.
#[target_feature(enable = "avx2")]
#[cfg(target_arch = "x86_64")]
pub unsafe fn shift_row_to_msb_avx2(src: &[u16], dst: &mut [u16]) {
    let len = src.len().min(dst.len());
    let vector_len = len - len % 16;

    for x in (0..vector_len).step_by(16) {
        let samples = _mm256_loadu_si256(src.as_ptr().add(x) as *const __m256i);
        let shifted = _mm256_slli_epi16::<6>(samples);
        _mm256_storeu_si256(dst.as_mut_ptr().add(x) as *mut __m256i, shifted);
    }

    shift_row_to_msb_scalar(&src[vector_len..len], &mut dst[vector_len..len]);
}

/// Scalar fallback implementation (portable, slower)
fn shift_row_to_msb_scalar(src: &[u16], dst: &mut [u16]) {
    for (out, &sample) in dst.iter_mut().zip(src) {
        *out = sample << TEN_BIT_SHIFT;
    }
}

fn check_plane(
    plane: usize,
    have: usize,
    rows: usize,
    row_len: usize,
    stride: usize,
) -> Result<(), VideoError> {
    if rows == 0 || row_len == 0 {
        return Ok(());
    }
    let need = (rows - 1) * stride + row_len;
    if have < need {
        return Err(VideoError::SourceTooSmall { plane, need, have });
    }
    Ok(())
}

fn check_source(
    format: BufferFormat,
    lens: [usize; 3],
    width: usize,
    height: usize,
    stride: usize,
) -> Result<(), VideoError> {
    check_plane(0, lens[0], height, width, stride)?;
    let (rows, row_len, chroma_stride) = if format.is_444() {
        (height, width, stride)
    } else {
        (height / 2, width / 2, stride / 2)
    };
    check_plane(1, lens[1], rows, row_len, chroma_stride)?;
    check_plane(2, lens[2], rows, row_len, chroma_stride)
}

/// Write `frame` into a locked input surface described by `desc`
///
/// `surface` is the locked memory and `pitch` its row pitch in bytes. The
/// chroma region starts `desc.height` rows into the surface, which may be
/// taller than the frame. The converter is picked from the surface format.
pub fn pack_frame(
    frame: &PlanarFrame<'_>,
    desc: &SurfaceDesc,
    surface: &mut [u8],
    pitch: usize,
) -> Result<(), VideoError> {
    let format = desc.format;
    let width = frame.width as usize;
    let height = frame.height as usize;

    if frame.width > desc.width || frame.height > desc.height {
        return Err(VideoError::FrameExceedsSurface {
            width: frame.width,
            height: frame.height,
        });
    }
    if pitch < desc.min_pitch() {
        return Err(VideoError::PitchTooSmall {
            pitch,
            width: desc.width,
            format,
        });
    }
    if format.is_high_bit_depth() && pitch % 2 != 0 {
        return Err(VideoError::OddPitch { pitch, format });
    }
    let need = desc.required_len(pitch);
    if surface.len() < need {
        return Err(VideoError::SurfaceTooSmall {
            need,
            have: surface.len(),
        });
    }

    let src_stride = default_stride(frame.stride, width);
    let plane_len = pitch * desc.height as usize;
    let surface = &mut surface[..need];

    match (format, frame.planes) {
        (BufferFormat::NV12, PlaneData::U8([y, cb, cr])) => {
            check_source(format, [y.len(), cb.len(), cr.len()], width, height, src_stride)?;
            let (luma, chroma) = surface.split_at_mut(plane_len);
            convert_yuv_to_nv12(y, cb, cr, luma, chroma, width, height, src_stride, pitch);
        }
        (BufferFormat::YUV444, PlaneData::U8([y, cb, cr])) => {
            check_source(format, [y.len(), cb.len(), cr.len()], width, height, src_stride)?;
            let (dst_y, rest) = surface.split_at_mut(plane_len);
            let (dst_cb, dst_cr) = rest.split_at_mut(plane_len);
            convert_yuv_to_yuv444(
                y, cb, cr, dst_y, dst_cb, dst_cr, width, height, src_stride, pitch,
            );
        }
        (BufferFormat::P010, PlaneData::U16([y, cb, cr])) => {
            check_source(format, [y.len(), cb.len(), cr.len()], width, height, src_stride)?;
            let samples: &mut [u16] =
                bytemuck::try_cast_slice_mut(surface).map_err(|_| VideoError::Misaligned)?;
            let (luma, chroma) = samples.split_at_mut(plane_len / 2);
            convert_yuv10_to_p010(y, cb, cr, luma, chroma, width, height, src_stride, pitch);
        }
        (BufferFormat::YUV444_10, PlaneData::U16([y, cb, cr])) => {
            check_source(format, [y.len(), cb.len(), cr.len()], width, height, src_stride)?;
            let samples: &mut [u16] =
                bytemuck::try_cast_slice_mut(surface).map_err(|_| VideoError::Misaligned)?;
            let (dst_y, rest) = samples.split_at_mut(plane_len / 2);
            let (dst_cb, dst_cr) = rest.split_at_mut(plane_len / 2);
            convert_yuv10_to_yuv444_10(
                y, cb, cr, dst_y, dst_cb, dst_cr, width, height, src_stride, pitch,
            );
        }
        (format, _) => {
            return Err(VideoError::SampleDepthMismatch {
                format,
                expected: if format.is_high_bit_depth() { 16 } else { 8 },
            });
        }
    }

    Ok(())
}
