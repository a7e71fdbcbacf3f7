//! Benchmarks for preprocessing and decomposition

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use megica_native::decomposition::fit;
use megica_native::features::extract;
use megica_native::processing::filters::FilterChain;
use megica_native::processing::resample::FftResampler;
use megica_native::simulation::SimulationConfig;

/// Generate a synthetic MEG-like trace (sinusoid with line noise)
fn generate_samples(n: usize, freq_hz: f64, sample_rate: f64) -> Vec<f64> {
    use std::f64::consts::PI;

    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let signal = (2.0 * PI * freq_hz * t).sin();
            let line = 0.3 * (2.0 * PI * 50.0 * t).sin();
            signal + line
        })
        .collect()
}

fn bench_zero_phase_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_phase_filter");

    let bandpass = FilterChain::bandpass(1000.0, 1.0, 40.0);
    let notch = FilterChain::notch(1000.0, 50.0, 30.0, true);

    for size in [1000, 10_000, 60_000].iter() {
        let samples = generate_samples(*size, 10.0, 1000.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let filtered = bandpass.apply_zero_phase(black_box(&samples), 3000);
                black_box(notch.apply_zero_phase(&filtered, 3000))
            });
        });
    }

    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("fft_resample");

    for size in [1000, 10_000, 60_000].iter() {
        let samples = generate_samples(*size, 10.0, 1000.0);
        let mut resampler = FftResampler::new();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(resampler.resample(black_box(&samples), size / 5)));
        });
    }

    group.finish();
}

fn bench_decomposition(c: &mut Criterion) {
    let mut group = c.benchmark_group("decomposition");
    group.sample_size(20);

    for channels in [10, 32, 64].iter() {
        let mixture = SimulationConfig { n_channels: *channels, n_samples: 4000, ..SimulationConfig::default() }
            .generate()
            .expect("valid simulation");

        group.bench_with_input(BenchmarkId::new("fit_3_components", channels), channels, |b, _| {
            b.iter(|| black_box(fit(black_box(&mixture.signal), 3, 97, 1000, 1e-4)));
        });
    }

    group.finish();
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");

    let mixture = SimulationConfig::default().generate().expect("valid simulation");
    let model = fit(&mixture.signal, 3, 97, 1000, 1e-4).expect("fit");
    let sources = model.sources(&mixture.signal).expect("sources");

    group.bench_function("extract_features", |b| {
        b.iter(|| black_box(extract(&model, &sources)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_zero_phase_filter,
    bench_resample,
    bench_decomposition,
    bench_feature_extraction,
);

criterion_main!(benches);
