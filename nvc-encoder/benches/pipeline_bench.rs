use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nvc_encoder::{
    pack_external_hints, EncodeConfig, EncodeFrameConfig, EncodePipeline, LoopbackDevice,
    MeHintCounts, MvRecord, WriterSink,
};
use nvc_video::{BufferFormat, PlanarFrame};
use std::io;
use std::sync::Arc;

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit");

    for &(width, height) in &[(1280u32, 720u32), (1920, 1080)] {
        let luma = (width * height) as usize;
        let y = vec![16u8; luma];
        let chroma = vec![128u8; luma / 4];
        let frame = PlanarFrame::new_8bit(&y, &chroma, &chroma, width, height);

        let device = Arc::new(LoopbackDevice::new());
        let config = EncodeConfig {
            async_mode: true,
            ..EncodeConfig::new(width, height, BufferFormat::NV12)
        };
        let mut pipeline =
            EncodePipeline::new(device, &config, WriterSink::new(io::sink())).unwrap();

        group.throughput(Throughput::Bytes(BufferFormat::NV12.source_frame_size(width, height) as u64));
        group.bench_with_input(
            BenchmarkId::new("nv12", format!("{}x{}", width, height)),
            &frame,
            |b, frame| {
                b.iter(|| {
                    pipeline
                        .submit(black_box(&EncodeFrameConfig::new(*frame)))
                        .unwrap()
                });
            },
        );
        pipeline.flush().unwrap();
    }

    group.finish();
}

fn bench_hint_packing(c: &mut Criterion) {
    // 1080p macroblock grid
    let records = vec![MvRecord::default(); 120 * 68];

    c.bench_function("pack_external_hints_1080p", |b| {
        b.iter(|| pack_external_hints(black_box(&records), MeHintCounts::default()))
    });
}

criterion_group!(benches, bench_submit, bench_hint_packing);
criterion_main!(benches);
