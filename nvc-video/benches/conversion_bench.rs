//! Benchmarks for nvc-video
//!
//! Measures surface packing throughput for each input format at 1080p.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nvc_video::{pack_frame, AlignedBuffer, BufferFormat, PlanarFrame, SurfaceDesc};

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;
const PITCH_ALIGN: usize = 256;

fn aligned_pitch(desc: &SurfaceDesc) -> usize {
    desc.min_pitch().div_ceil(PITCH_ALIGN) * PITCH_ALIGN
}

fn bench_pack_8bit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_8bit");

    for format in [BufferFormat::NV12, BufferFormat::YUV444] {
        let [luma, chroma, _] = format.source_plane_sizes(WIDTH, HEIGHT);
        let y = vec![128u8; luma];
        let cb = vec![64u8; chroma];
        let cr = vec![192u8; chroma];
        let frame = PlanarFrame::new_8bit(&y, &cb, &cr, WIDTH, HEIGHT);

        let desc = SurfaceDesc::new(format, WIDTH, HEIGHT);
        let pitch = aligned_pitch(&desc);
        let mut surface = AlignedBuffer::zeroed(desc.required_len(pitch)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, _| {
            b.iter(|| {
                pack_frame(black_box(&frame), &desc, surface.as_mut_slice(), pitch).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_pack_10bit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_10bit");

    for format in [BufferFormat::P010, BufferFormat::YUV444_10] {
        let [luma, chroma, _] = format.source_plane_sizes(WIDTH, HEIGHT);
        let y = vec![512u16; luma / 2];
        let cb = vec![256u16; chroma / 2];
        let cr = vec![768u16; chroma / 2];
        let frame = PlanarFrame::new_16bit(&y, &cb, &cr, WIDTH, HEIGHT);

        let desc = SurfaceDesc::new(format, WIDTH, HEIGHT);
        let pitch = aligned_pitch(&desc);
        let mut surface = AlignedBuffer::zeroed(desc.required_len(pitch)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, _| {
            b.iter(|| {
                pack_frame(black_box(&frame), &desc, surface.as_mut_slice(), pitch).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pack_8bit, bench_pack_10bit);
criterion_main!(benches);
