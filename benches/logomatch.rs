use criterion::{criterion_group, criterion_main, Criterion};
use logomatch::{check_logo, CheckConfig, Extractor, OwnedImage};
use std::hint::black_box;

fn make_logo(side: usize) -> OwnedImage {
    let mut data = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            let bx = x / 8;
            let by = y / 8;
            let value = (bx * 41 + by * 89 + bx * bx * 7 + by * by * 23) % 256;
            data.push(value as u8);
        }
    }
    OwnedImage::new(data, side, side).unwrap()
}

fn embed(patch: &OwnedImage, scene_w: usize, scene_h: usize, x0: usize, y0: usize) -> OwnedImage {
    let mut data = vec![128u8; scene_w * scene_h];
    for y in 0..patch.height() {
        for x in 0..patch.width() {
            data[(y0 + y) * scene_w + (x0 + x)] = patch.data()[y * patch.width() + x];
        }
    }
    OwnedImage::new(data, scene_w, scene_h).unwrap()
}

fn bench_pipeline(c: &mut Criterion) {
    let logo = make_logo(96);
    let scene = embed(&logo, 512, 512, 180, 140);

    c.bench_function("extract_features_512", |b| {
        let extractor = Extractor::default();
        b.iter(|| black_box(extractor.detect_and_compute(black_box(&scene))));
    });

    c.bench_function("check_logo_512", |b| {
        let config = CheckConfig::default();
        b.iter(|| black_box(check_logo(black_box(&logo), black_box(&scene), &config)));
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
