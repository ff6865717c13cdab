use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lan_camera_relay::codec::JpegEncoder;
use lan_camera_relay::compositor::{compose_grid, layout_for};
use lan_camera_relay::overlay::render_overlay;
use lan_camera_relay::video::{Color, Frame, PixelFormat};

fn bench_overlay(c: &mut Criterion) {
    let frame = Frame::filled(1280, 720, PixelFormat::Rgb8, Color::new(90, 120, 150));

    c.bench_function("overlay_720p", |b| {
        b.iter(|| render_overlay(black_box(&frame), "CAM_A", "01:02:03:04", Some(29.97)))
    });
}

fn bench_grid(c: &mut Criterion) {
    let frames: Vec<Frame> = (0..4)
        .map(|i| Frame::filled(1280, 720, PixelFormat::Rgb8, Color::new(40 * i, 80, 160)))
        .collect();
    let names = ["CAM_A", "CAM_B", "CAM_C", "CAM_D"];
    let sources: Vec<(&str, &Frame)> = names.iter().copied().zip(frames.iter()).collect();

    c.bench_function("grid_4x720p", |b| {
        b.iter(|| compose_grid(black_box(&sources), layout_for(sources.len()), (640, 360), true))
    });
}

fn bench_jpeg(c: &mut Criterion) {
    let frame = Frame::filled(1280, 720, PixelFormat::Rgb8, Color::new(90, 120, 150));
    let mut encoder = JpegEncoder::new(80);

    c.bench_function("jpeg_encode_720p", |b| b.iter(|| encoder.encode(black_box(&frame))));
}

criterion_group!(benches, bench_overlay, bench_grid, bench_jpeg);
criterion_main!(benches);
