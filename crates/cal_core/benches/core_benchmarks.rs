//! Benchmarks for cal_core measurement routines.

use cal_core::math::spectrum::power_spectrum;
use cal_core::math::tone::measure_tone_level;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_complex::Complex32;
use std::f64::consts::PI;

fn capture(n: usize) -> Vec<Complex32> {
    (0..n)
        .map(|k| {
            let phase = 2.0 * PI * 0.7e6 * k as f64 / 10e6;
            Complex32::new(phase.cos() as f32, phase.sin() as f32)
        })
        .collect()
}

fn benchmark_tone_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("tone_level");

    for size in [1024, 8192, 65536] {
        let samples = capture(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &samples, |b, s| {
            b.iter(|| measure_tone_level(black_box(s), 0.7e6, 10e6))
        });
    }

    group.finish();
}

fn benchmark_power_spectrum(c: &mut Criterion) {
    let samples = capture(8192);

    c.bench_function("power_spectrum_8192_1024", |b| {
        b.iter(|| power_spectrum(black_box(&samples), 1024))
    });
}

criterion_group!(benches, benchmark_tone_level, benchmark_power_spectrum);
criterion_main!(benches);
