use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use narrate_core::{dsp, fluency, segment_text, AudioBuffer, AudioWriter, DepthProcessor};
use tempfile::TempDir;

const RATE: u32 = 24_000;

fn speech_like(seconds: f32) -> AudioBuffer {
    let low = dsp::sine(220.0, 0.2, seconds, RATE);
    let high = dsp::sine(4_000.0, 0.1, seconds, RATE);
    AudioBuffer::new(low.iter().zip(&high).map(|(a, b)| a + b).collect(), RATE)
}

fn bench_depth_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("depth_processing");
    let buffer = speech_like(5.0);

    for (depth, speed) in [(1_u8, 0.5_f32), (5, 1.0), (9, 1.0), (9, 2.0)] {
        let processor = DepthProcessor::new(depth, speed);
        group.bench_with_input(
            BenchmarkId::new("5sec", format!("depth{depth}_speed{speed}")),
            &buffer,
            |b, buffer| b.iter(|| black_box(processor.process(black_box(buffer)))),
        );
    }

    group.finish();
}

fn bench_dsp_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp");
    let buffer = speech_like(5.0);

    group.bench_function("time_stretch_0.9", |b| {
        b.iter(|| black_box(dsp::time_stretch(black_box(&buffer.samples), RATE, 0.9)));
    });
    group.bench_function("low_pass_7200", |b| {
        b.iter(|| black_box(dsp::low_pass(black_box(&buffer.samples), RATE, 7_200.0)));
    });
    group.bench_function("resample_24k_to_16k", |b| {
        b.iter(|| black_box(dsp::resample(black_box(&buffer.samples), RATE, 16_000).unwrap()));
    });

    group.finish();
}

fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");
    let script = "The night was long... and the road -- narrow!! Was it worth it?!\n\n"
        .repeat(200);

    group.bench_function("fluency_normalize", |b| {
        b.iter(|| black_box(fluency::normalize(black_box(&script))));
    });
    group.bench_function("segment_3000", |b| {
        b.iter(|| black_box(segment_text(black_box(&script), 3000).count()));
    });

    group.finish();
}

fn bench_wav_write(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let writer = AudioWriter::default();
    let buffer = speech_like(10.0);
    let path = dir.path().join("bench.wav");

    c.bench_function("wav_write_10sec", |b| {
        b.iter(|| black_box(writer.write(black_box(&buffer), &path).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_depth_processing,
    bench_dsp_primitives,
    bench_text,
    bench_wav_write
);
criterion_main!(benches);
