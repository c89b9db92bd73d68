use std::hint::black_box;
use std::time::Instant;

use glam::Vec3;
use skillcity_assets::ResourceCache;
use skillcity_common::Camera;
use skillcity_kernel::{City, CityBuilder, CityConfig};
use skillcity_visibility::{SchedulerConfig, UpdateScheduler};

fn make_city(residential: usize, half_extent: f32) -> City {
    let mut config = CityConfig::default();
    config.half_extent = half_extent;
    config.residential.count = residential;
    config.residential.grid.half_extent = half_extent - 10.0;
    CityBuilder::new(config)
        .build(ResourceCache::new())
        .expect("benchmark city builds")
}

fn bench_build(residential: usize, half_extent: f32, iterations: usize) {
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(make_city(black_box(residential), half_extent));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  assemble ({residential} houses, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_frames(residential: usize, half_extent: f32, cutoff: f32, iterations: usize) {
    let mut city = make_city(residential, half_extent);
    let entities = city.entity_count();
    let mut scheduler = UpdateScheduler::new(SchedulerConfig {
        cutoff_distance: cutoff,
        ..SchedulerConfig::default()
    });

    let start = Instant::now();
    let mut updated = 0;
    for i in 0..iterations {
        // Orbit the camera around the plaza.
        let angle = i as f32 * 0.01;
        let camera = Camera::looking_at(Vec3::new(angle.cos() * 120.0, 60.0, angle.sin() * 120.0), Vec3::ZERO);
        let stats = scheduler.run_frame(black_box(&mut city), i as f32 / 60.0, black_box(&camera));
        updated += stats.updated();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  run_frame ({entities} entities, cutoff {cutoff}, {iterations} iters): {per_iter:?}/iter, avg {} updated",
        updated / iterations
    );
}

fn main() {
    println!("=== Scheduler Benchmarks ===\n");

    println!("City assembly:");
    bench_build(60, 120.0, 20);
    bench_build(400, 300.0, 5);

    println!("\nFrame scheduling:");
    bench_frames(60, 120.0, 150.0, 1000);
    bench_frames(400, 300.0, 150.0, 500);
    bench_frames(400, 300.0, 1000.0, 500);

    println!("\n=== Done ===");
}
