//! Feature Extraction Benchmark
//!
//! Measures how fast a clip is reduced to its 15-value feature vector, and
//! the cost of resampling 44.1 kHz input to the analysis rate.
//!
//! ## Scenarios
//!
//! - 30 s tone at 22.05 kHz through `FeatureExtractor::extract`
//! - 30 s tone at 44.1 kHz through `audio::resample`
//! - Scoring one query against a 1000-item corpus

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use melixa_ml::audio::resample;
use melixa_ml::corpus::{ReferenceCorpus, ReferenceItem};
use melixa_ml::features::{FeatureExtractor, FeatureVector, Raw, FEATURE_COUNT};
use melixa_ml::recommender::recommend;
use std::time::Instant;

const ANALYSIS_RATE: u32 = 22_050;

/// Tone with a slow amplitude pulse so onset and tempo stages have work to do
fn pulsed_tone(duration_s: f64, sample_rate: u32) -> Vec<f32> {
    let count = (duration_s * sample_rate as f64) as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = 0.5 + 0.5 * (2.0 * std::f32::consts::PI * 2.0 * t).sin().max(0.0);
            0.4 * envelope * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    group.sample_size(10);

    let extractor = FeatureExtractor::new();
    for duration_s in [10.0, 30.0] {
        let samples = pulsed_tone(duration_s, ANALYSIS_RATE);
        group.throughput(Throughput::Elements((duration_s * 1000.0) as u64)); // ms of audio

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}s", duration_s)),
            &samples,
            |b, samples| {
                b.iter(|| {
                    let start = Instant::now();
                    let extraction = extractor
                        .extract(black_box(samples), ANALYSIS_RATE)
                        .expect("Extraction failed");
                    let elapsed = start.elapsed().as_secs_f64();
                    println!(
                        "{}s clip: {:.1}x realtime",
                        duration_s,
                        duration_s / elapsed
                    );
                    black_box(extraction);
                });
            },
        );
    }

    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample_to_analysis_rate");
    group.sample_size(10);

    let duration_s = 30.0;
    let samples = pulsed_tone(duration_s, 44_100);
    group.throughput(Throughput::Elements((duration_s * 1000.0) as u64));

    group.bench_function("44k_to_22k", |b| {
        b.iter(|| {
            let resampled = resample(black_box(samples.clone()), 44_100, ANALYSIS_RATE)
                .expect("Resampling failed");
            black_box(resampled);
        });
    });

    group.finish();
}

fn bench_recommend(c: &mut Criterion) {
    let items = (0..1000)
        .map(|i| {
            let mut values = [0.0; FEATURE_COUNT];
            for (slot, value) in values.iter_mut().enumerate() {
                *value = ((i * 7 + slot * 13) % 101) as f64 / 10.0 - 5.0;
            }
            ReferenceItem {
                identifier: format!("track_{:04}.mp3", i),
                features: FeatureVector::<Raw>::new(values),
            }
        })
        .collect();
    let corpus = ReferenceCorpus::new(items);
    let query = FeatureVector::<Raw>::new([0.5; FEATURE_COUNT]);

    c.bench_function("recommend_top5_of_1000", |b| {
        b.iter(|| black_box(recommend(black_box(&query), &corpus, 5)));
    });
}

criterion_group!(benches, bench_extract, bench_resample, bench_recommend);
criterion_main!(benches);
