//! Performance benchmarks for scatter marks

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gpu_scatter_renderer::colormap::build_lut;
use gpu_scatter_renderer::{
    AttributeStore, Channel, ChannelValue, HeadlessBackend, LinearScale, PixelCache,
    SelectionEngine, SelectorRequest, SetOptions,
};

fn positions(point_count: usize) -> (Vec<f64>, Vec<f64>) {
    let x = (0..point_count).map(|i| i as f64).collect();
    let y = (0..point_count).map(|i| (i as f64).sin()).collect();
    (x, y)
}

fn bench_pixel_cache_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("pixel_cache_rebuild");

    for point_count in [1_000, 100_000, 1_000_000].iter() {
        let (x, y) = positions(*point_count);
        let x_scale = LinearScale::new([0.0, *point_count as f64], [0.0, 1920.0]);
        let y_scale = LinearScale::new([-1.0, 1.0], [1080.0, 0.0]);
        let mut cache = PixelCache::new();

        group.bench_function(format!("{}_points", point_count), |b| {
            b.iter(|| {
                cache.invalidate();
                let coords = cache.ensure(&x, &y, &x_scale, &y_scale);
                black_box(coords.len());
            });
        });
    }

    group.finish();
}

fn bench_brush_selection(c: &mut Criterion) {
    let (x, y) = positions(100_000);
    let x_scale = LinearScale::new([0.0, 100_000.0], [0.0, 1920.0]);
    let y_scale = LinearScale::new([-1.0, 1.0], [1080.0, 0.0]);
    let mut cache = PixelCache::new();
    let mut engine = SelectionEngine::default();
    let request = SelectorRequest::Select(Box::new(|x: &[f64], y: &[f64]| {
        x.iter()
            .zip(y)
            .map(|(&px, &py)| (400.0..800.0).contains(&px) && (200.0..600.0).contains(&py))
            .collect()
    }));

    c.bench_function("brush_selection_100k", |b| {
        b.iter(|| {
            let coords = cache.ensure(&x, &y, &x_scale, &y_scale);
            black_box(engine.evaluate(&request, coords));
        });
    });
}

fn bench_channel_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_updates");
    let point_count = 100_000;
    let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
    let mut store = AttributeStore::new(backend, "bench", point_count);
    let sizes = ChannelValue::PerInstance((0..point_count).map(|i| (i % 64) as f32).collect());

    group.bench_function("animated_size", |b| {
        b.iter(|| {
            store
                .set_channel(Channel::Size, &sizes, 1, SetOptions::default())
                .unwrap();
            black_box(store.upload().unwrap());
        });
    });

    group.bench_function("snapped_size", |b| {
        b.iter(|| {
            store
                .set_channel(Channel::Size, &sizes, 1, SetOptions::immediate())
                .unwrap();
            black_box(store.upload().unwrap());
        });
    });

    group.finish();
}

fn bench_colormap_lut(c: &mut Criterion) {
    let stops = vec![
        [0.27, 0.0, 0.33],
        [0.23, 0.32, 0.55],
        [0.13, 0.57, 0.55],
        [0.37, 0.79, 0.38],
        [0.99, 0.91, 0.14],
    ];
    c.bench_function("colormap_lut", |b| {
        b.iter(|| black_box(build_lut(black_box(&stops))));
    });
}

criterion_group!(
    benches,
    bench_pixel_cache_rebuild,
    bench_brush_selection,
    bench_channel_updates,
    bench_colormap_lut
);
criterion_main!(benches);
