use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{UnitQuaternion, Vector3};
use tag_anchor_core::Detection;
use tag_anchor_placement::{smooth_detections, DetectionAccumulator, SmoothingParams};

/// Deterministic jitter in [-1, 1].
fn jitter(i: usize, salt: usize) -> f64 {
    let h = (i.wrapping_mul(2_654_435_761) ^ salt.wrapping_mul(40_503)) % 10_007;
    h as f64 / 5_003.5 - 1.0
}

fn detections(n: usize) -> Vec<Detection> {
    (0..n)
        .map(|i| {
            let outlier = i % 17 == 0;
            let scale = if outlier { 0.5 } else { 0.005 };
            let position = Vector3::new(
                1.0 + scale * jitter(i, 1),
                0.2 + scale * jitter(i, 2),
                3.0 + scale * jitter(i, 3),
            );
            let rotation = UnitQuaternion::from_euler_angles(
                0.01 * jitter(i, 4),
                0.5 + 0.01 * jitter(i, 5),
                0.01 * jitter(i, 6),
            );
            Detection::new(1, position, rotation, i as f64 * 0.016, i as u64)
        })
        .collect()
}

fn bench_smoothing(c: &mut Criterion) {
    let params = SmoothingParams::default();
    let thresholds = params.thresholds();
    let mut group = c.benchmark_group("smooth_detections");
    for n in [30usize, 300, 1000] {
        let dets = detections(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &dets, |b, dets| {
            b.iter(|| smooth_detections(black_box(dets.iter()), &thresholds))
        });
    }
    group.finish();
}

fn bench_accumulate(c: &mut Criterion) {
    let params = SmoothingParams::default();
    let dets = detections(2000);
    c.bench_function("accumulate_2000", |b| {
        b.iter(|| {
            let mut acc = DetectionAccumulator::from_params(&params);
            for d in &dets {
                acc.insert(*d, d.capture_timestamp());
            }
            black_box(acc.len(1))
        })
    });
}

criterion_group!(benches, bench_smoothing, bench_accumulate);
criterion_main!(benches);
