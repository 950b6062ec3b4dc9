use std::hint::black_box;

use bevy_fortune_pie::normal::{NormalConfig, build_normal_map_from_height};
use bevy_fortune_pie::particles::{AmbientParticles, VaporConfig};
use bevy_fortune_pie::slice::{SliceConfig, build_slice_assembly};
use bevy_fortune_pie::surface::{SurfaceConfig, build_surface_maps};
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_surface_maps(c: &mut Criterion) {
    let config = SurfaceConfig::default();
    c.bench_function("surface_maps_512", |b| {
        b.iter(|| build_surface_maps(black_box(&config)))
    });
}

fn bench_normal_map(c: &mut Criterion) {
    let maps = build_surface_maps(&SurfaceConfig::default()).expect("valid size");
    let config = NormalConfig::default();
    c.bench_function("normal_from_height_512", |b| {
        b.iter(|| build_normal_map_from_height(black_box(&maps.height), &config))
    });
}

fn bench_slice_assembly(c: &mut Criterion) {
    let config = SliceConfig::default();
    c.bench_function("slice_assembly_8", |b| {
        b.iter(|| build_slice_assembly(black_box(&config), (), ()))
    });
}

fn bench_particle_tick(c: &mut Criterion) {
    let mut pool = AmbientParticles::with_seed(2_000, VaporConfig::default(), 1);
    c.bench_function("particles_tick_2000", |b| {
        b.iter(|| pool.update(black_box(1.0 / 60.0)))
    });
}

criterion_group!(
    benches,
    bench_surface_maps,
    bench_normal_map,
    bench_slice_assembly,
    bench_particle_tick
);
criterion_main!(benches);
