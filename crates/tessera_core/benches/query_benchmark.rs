//! # Query Benchmark
//!
//! Iteration throughput per residency and iteration flavour, plus the cost
//! of a cached archetype lookup.

#![allow(missing_docs)]

use bytemuck::{Pod, Zeroable};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera_core::{Component, Residency, World};

const ENTITY_COUNT: usize = 100_000;

#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Position {}

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Component for Velocity {}

impl Default for Velocity {
    fn default() -> Self {
        Self { x: 0.1, y: 0.2, z: 0.3 }
    }
}

fn world(residency: Residency) -> World {
    let mut world = World::new();
    world.set_residency::<Position>(residency).unwrap();
    world.set_residency::<Velocity>(residency).unwrap();
    world.spawn_batch((0..ENTITY_COUNT).map(|_| (Position::default(), Velocity::default())));
    world
}

fn bench_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrate_100k");

    for residency in [Residency::Archetype, Residency::Sparse] {
        let label = format!("{residency:?}");

        let mut w = world(residency);
        group.bench_with_input(BenchmarkId::new("for_each", &label), &(), |b, ()| {
            b.iter(|| {
                w.query().for_each2::<Position, Velocity>(|pos, vel| {
                    pos.x += vel.x;
                    pos.y += vel.y;
                    pos.z += vel.z;
                });
            });
        });

        let mut w = world(residency);
        group.bench_with_input(BenchmarkId::new("for_each_batch", &label), &(), |b, ()| {
            b.iter(|| {
                w.query().for_each_batch2::<Position, Velocity>(|_, positions, velocities| {
                    for (pos, vel) in positions.iter_mut().zip(velocities.iter()) {
                        pos.x += vel.x;
                        pos.y += vel.y;
                        pos.z += vel.z;
                    }
                });
            });
        });

        let mut w = world(residency);
        group.bench_with_input(BenchmarkId::new("par_for_each", &label), &(), |b, ()| {
            b.iter(|| {
                w.query().par_for_each2::<Position, Velocity>(|_, pos, vel| {
                    pos.x += vel.x;
                    pos.y += vel.y;
                    pos.z += vel.z;
                });
            });
        });
    }

    group.finish();
}

fn bench_cached_count(c: &mut Criterion) {
    let mut w = world(Residency::Archetype);
    c.bench_function("count_cached_100k", |b| {
        b.iter(|| black_box(w.query().with::<Position>().count()));
    });
}

criterion_group!(benches, bench_iteration, bench_cached_count);
criterion_main!(benches);
