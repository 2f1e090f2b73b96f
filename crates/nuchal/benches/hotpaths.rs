use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use nuchal::{
    binarize_probabilities, denoise, fit_ellipse_to_points, fit_mask_ellipse, BinaryMask,
    DenoiseConfig, MaskConfig, ProbabilityMap,
};

/// Speckle-like frame with a horizontal interference pattern.
fn make_frame(w: u32, h: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(w, h, |x, y| {
        let base = 70.0 + 60.0 * (y as f64 / h as f64);
        let stripe = 25.0 * (2.0 * PI * x as f64 / 7.0).cos();
        let speckle = rng.gen_range(-20.0..20.0);
        Luma([(base + stripe + speckle).clamp(0.0, 255.0) as u8])
    })
}

fn make_probability_map(w: u32, h: u32) -> ProbabilityMap {
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    ProbabilityMap::from_fn(w, h, |x, y| {
        let u = (x as f32 - cx) / (0.3 * w as f32);
        let v = (y as f32 - cy) / (0.08 * h as f32);
        Luma([if u * u + v * v <= 1.0 { 0.92 } else { 0.03 }])
    })
}

fn make_ellipse_points(n: usize) -> Vec<[f64; 2]> {
    let mut rng = StdRng::seed_from_u64(42);
    let (cx, cy, a, b) = (300.0, 200.0, 90.0, 22.0);
    let (sin_a, cos_a) = 0.2f64.sin_cos();
    (0..n)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / n as f64;
            let (ex, ey) = (a * t.cos(), b * t.sin());
            [
                cx + cos_a * ex - sin_a * ey + rng.gen_range(-0.5..0.5),
                cy + sin_a * ex + cos_a * ey + rng.gen_range(-0.5..0.5),
            ]
        })
        .collect()
}

fn bench_denoise(c: &mut Criterion) {
    let cfg = DenoiseConfig::default();
    let frame = make_frame(600, 400, 7);

    c.bench_function("denoise_600x400", |b| {
        b.iter(|| black_box(denoise(black_box(&frame), black_box(&cfg))))
    });
}

fn bench_binarize(c: &mut Criterion) {
    let probs = make_probability_map(600, 400);
    let cfg = MaskConfig::default();

    c.bench_function("binarize_600x400_to_1024x768", |b| {
        b.iter(|| {
            let mask = binarize_probabilities(black_box(&probs), [1024, 768], &cfg);
            black_box(mask.foreground_count())
        })
    });
}

fn bench_mask_ellipse(c: &mut Criterion) {
    let probs = make_probability_map(1024, 768);
    let mask: BinaryMask = binarize_probabilities(&probs, [1024, 768], &MaskConfig::default());

    c.bench_function("mask_ellipse_1024x768", |b| {
        b.iter(|| black_box(fit_mask_ellipse(black_box(&mask))))
    });
}

fn bench_ellipse_fit(c: &mut Criterion) {
    let points = make_ellipse_points(400);
    c.bench_function("ellipse_fit_400pts", |b| {
        b.iter(|| black_box(fit_ellipse_to_points(black_box(&points))))
    });
}

criterion_group!(
    hotpaths,
    bench_denoise,
    bench_binarize,
    bench_mask_ellipse,
    bench_ellipse_fit
);
criterion_main!(hotpaths);
