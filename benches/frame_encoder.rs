use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vocore::audio::{Direction, Resampler, calculate_rms};
use vocore::codec::{FrameEncoder, Pcm16Codec};

/// One second of a 440 Hz tone at 16 kHz
fn tone(samples: usize) -> Vec<i16> {
    (0..samples)
        .map(|i| {
            let t = i as f32 / 16000.0;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16
        })
        .collect()
}

fn bench_encoder(c: &mut Criterion) {
    let audio = tone(16000);
    let mut group = c.benchmark_group("frame_encoder");

    for frame_ms in [20u32, 60] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}ms", frame_ms)),
            &audio,
            |b, audio| {
                let mut encoder =
                    FrameEncoder::with_config(Box::new(Pcm16Codec::new()), 16000, 1, frame_ms);
                b.iter(|| {
                    let mut bytes = 0usize;
                    encoder.encode(black_box(audio), |packet| bytes += packet.len());
                    bytes
                });
            },
        );
    }

    group.finish();
}

fn bench_resampler(c: &mut Criterion) {
    let audio = tone(16000);
    let mut group = c.benchmark_group("resampler");

    for (rate_in, rate_out) in [(16000u32, 24000u32), (16000, 8000)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_to_{}", rate_in, rate_out)),
            &audio,
            |b, audio| {
                let mut resampler =
                    Resampler::with_rates(rate_in, rate_out).expect("valid rates");
                assert_ne!(resampler.direction(), Some(Direction::Passthrough));
                b.iter(|| resampler.process_to_vec(black_box(audio)).expect("resample"));
            },
        );
    }

    group.finish();
}

fn bench_rms(c: &mut Criterion) {
    let audio = tone(512);
    c.bench_function("calculate_rms_512", |b| {
        b.iter(|| calculate_rms(black_box(&audio)))
    });
}

criterion_group!(benches, bench_encoder, bench_resampler, bench_rms);
criterion_main!(benches);
