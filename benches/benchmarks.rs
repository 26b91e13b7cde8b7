use std::time::Duration;

use criterion::{criterion_group, criterion_main, Benchmark, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rustdetect::imgproc::{equalize_histogram, rescale, rgba_to_grayscale};
use rustdetect::integral::{compute_rotated_sat, compute_sat, compute_squared_sat};
use rustdetect::{compile, CascadeDetector, ImageData, Model};

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

fn random_pixels(len: usize, seed: u64) -> Vec<u32> {
    random_bytes(len, seed).into_iter().map(u32::from).collect()
}

/// A 20x20 cascade with four stages of growing depth, in the shape real
/// trained classifiers take.
fn synthetic_model(seed: u64) -> Model {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values = vec![20.0f32, 20.0];
    for num_nodes in [3u32, 6, 10, 16] {
        values.push(num_nodes as f32 / 2.0);
        values.push(num_nodes as f32);
        for _ in 0..num_nodes {
            values.push(0.0);
            let num_features = rng.gen_range(1..=2u32);
            values.push(num_features as f32);
            for _ in 0..num_features {
                let x = rng.gen_range(0..15u32);
                let y = rng.gen_range(0..15u32);
                let w = rng.gen_range(1..=20 - x);
                let h = rng.gen_range(1..=20 - y);
                values.extend([x as f32, y as f32, w as f32, h as f32]);
                values.push(rng.gen_range(-2.0..2.0f32));
            }
            values.push(rng.gen_range(64.0..4096.0f32));
            values.push(-1.0);
            values.push(1.0);
        }
    }
    Model::from_values(values).unwrap()
}

fn detect_single_frame(c: &mut Criterion) {
    let model = synthetic_model(7);
    let mut detector = CascadeDetector::new(&model, WIDTH as u32, HEIGHT as u32, 1.2).unwrap();
    detector.set_step_size(2);
    detector.set_min_neighbors(2);
    let frame = random_bytes(WIDTH * HEIGHT, 11);

    let target_runtime = Duration::new(30, 0);

    c.bench(
        "detect_single_frame",
        Benchmark::new("detect", move |b| {
            b.iter(|| detector.detect(&ImageData::new(&frame, WIDTH as u32, HEIGHT as u32)))
        })
        // Limit the measurement time and the sample size
        // to make sure the benchmark finishes in a feasible amount of time.
        .measurement_time(target_runtime)
        .sample_size(20),
    );
}

fn bench_rgba_to_grayscale(c: &mut Criterion) {
    c.bench_function("imgproc_rgba_to_grayscale", |b| {
        let rgba = random_bytes(WIDTH * HEIGHT * 4, 13);
        let mut gray = Vec::new();
        b.iter(|| rgba_to_grayscale(&rgba, &mut gray));
    });
}

fn bench_rescale(c: &mut Criterion) {
    c.bench_function("imgproc_rescale", |b| {
        let gray = random_pixels(WIDTH * HEIGHT, 17);
        let mut scaled = Vec::new();
        b.iter(|| rescale(&gray, WIDTH, HEIGHT, 1.2, &mut scaled));
    });
}

fn bench_equalize_histogram(c: &mut Criterion) {
    c.bench_function("imgproc_equalize_histogram", |b| {
        let gray = random_pixels(WIDTH * HEIGHT, 19);
        let mut equalized = Vec::new();
        b.iter(|| equalize_histogram(&gray, 4, &mut equalized));
    });
}

fn bench_sat(c: &mut Criterion) {
    c.bench_function("integral_sat", |b| {
        let gray = random_pixels(WIDTH * HEIGHT, 23);
        let mut sat = Vec::new();
        b.iter(|| compute_sat(&gray, WIDTH, HEIGHT, &mut sat));
    });
}

fn bench_squared_sat(c: &mut Criterion) {
    c.bench_function("integral_squared_sat", |b| {
        let gray = random_pixels(WIDTH * HEIGHT, 29);
        let mut squared_sat = Vec::new();
        b.iter(|| compute_squared_sat(&gray, WIDTH, HEIGHT, &mut squared_sat));
    });
}

fn bench_rotated_sat(c: &mut Criterion) {
    c.bench_function("integral_rotated_sat", |b| {
        let gray = random_pixels(WIDTH * HEIGHT, 31);
        let mut rotated_sat = Vec::new();
        b.iter(|| compute_rotated_sat(&gray, WIDTH, HEIGHT, &mut rotated_sat));
    });
}

fn bench_parse_model(c: &mut Criterion) {
    c.bench_function("model_from_values", |b| {
        let values = synthetic_model(37).values().to_vec();
        b.iter(|| Model::from_values(values.clone()).unwrap());
    });
}

fn bench_compile_model(c: &mut Criterion) {
    c.bench_function("classifier_compile", |b| {
        let model = synthetic_model(41);
        b.iter(|| compile(&model, WIDTH as u32, HEIGHT as u32).unwrap());
    });
}

criterion_group!(detection_perf, detect_single_frame);
criterion_group!(
    imgproc_perf,
    bench_rgba_to_grayscale,
    bench_rescale,
    bench_equalize_histogram
);
criterion_group!(
    integral_perf,
    bench_sat,
    bench_squared_sat,
    bench_rotated_sat
);
criterion_group!(model_perf, bench_parse_model, bench_compile_model);
criterion_main!(detection_perf, imgproc_perf, integral_perf, model_perf);
