use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geoprint_export::crop::{crop_to_selection, CropRect};
use geoprint_export::{composite, CanvasKind, LayerCanvas};
use image::{Rgba, RgbaImage};

fn generate_canvases(width: u32, height: u32, layers: usize) -> Vec<LayerCanvas> {
    let mut canvases = vec![LayerCanvas::new(CanvasKind::Basemap, RgbaImage::from_pixel(width, height, Rgba([235, 232, 220, 255])))];
    for i in 0..layers {
        let shade = (40 * i % 255) as u8;
        canvases.push(
            LayerCanvas::new(CanvasKind::Other(format!("overlay-{}", i)), RgbaImage::from_pixel(width, height, Rgba([shade, 80, 160, 128])))
                .with_opacity(0.8),
        );
    }
    canvases
}

fn bench_composite(c: &mut Criterion) {
    let canvases = generate_canvases(1280, 800, 3);
    c.bench_function("composite_1280x800_4_layers", |b| {
        b.iter(|| black_box(composite(black_box(&canvases), 1280, 800)))
    });

    // HiDPI viewport: canvases drawn at 2x with a scaling transform
    let hidpi: Vec<LayerCanvas> = generate_canvases(640, 400, 2)
        .into_iter()
        .map(|c| c.with_transform([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]))
        .collect();
    c.bench_function("composite_scaled_1280x800", |b| {
        b.iter(|| black_box(composite(black_box(&hidpi), 1280, 800)))
    });
}

fn bench_crop(c: &mut Criterion) {
    let raster = RgbaImage::from_pixel(2560, 1600, Rgba([100, 120, 140, 255]));
    let rect = CropRect { x: 400, y: 300, width: 1600, height: 1000 };
    c.bench_function("crop_to_300dpi", |b| {
        b.iter(|| black_box(crop_to_selection(black_box(&raster), rect, 2.0, 300.0 / 96.0)))
    });
}

criterion_group!(benches, bench_composite, bench_crop);
criterion_main!(benches);
