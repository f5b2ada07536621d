use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use rs_barnes_hut::particles::{generate_uniform, QuadTree, Simulation};
use rs_barnes_hut::utils::SimulationConstants;
use rs_barnes_hut::visualization::NoVisualization;

pub fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    group.measurement_time(std::time::Duration::from_secs(5));
    let constants = SimulationConstants::default();

    for &n in &[1_000usize, 10_000, 50_000] {
        let particles = generate_uniform(n, &constants.bounds, 10.0, 42);
        let mut tree = QuadTree::new();
        group.bench_with_input(BenchmarkId::from_parameter(n), &particles, |b, particles| {
            b.iter(|| {
                tree.build(black_box(particles), &constants).ok();
                tree.clear();
            })
        });
    }
    group.finish();
}

pub fn bench_forces(c: &mut Criterion) {
    let mut group = c.benchmark_group("force_evaluation");
    group.measurement_time(std::time::Duration::from_secs(5));
    group.sample_size(20);
    let constants = SimulationConstants::default();
    let particles = generate_uniform(10_000, &constants.bounds, 10.0, 42);
    let tree = match QuadTree::from_particles(&particles, &constants) {
        Ok(tree) => tree,
        Err(e) => panic!("benchmark fixture cannot be built: {}", e),
    };

    for &theta in &[0.0, 0.3, 0.5, 1.0] {
        group.bench_with_input(BenchmarkId::new("theta", theta), &theta, |b, &theta| {
            let mut stack = Vec::new();
            b.iter(|| {
                let mut sum = 0.0;
                for i in 0..particles.len() {
                    let (ax, ay) = tree.acceleration_with(&particles, i, black_box(theta), &constants, &mut stack);
                    sum += ax + ay;
                }
                sum
            })
        });
    }
    group.finish();
}

pub fn bench_sequential_steps(c: &mut Criterion) {
    let constants = SimulationConstants::default();
    let particles = generate_uniform(5_000, &constants.bounds, 10.0, 7);

    c.bench_function("sequential_10_steps_5000", |b| {
        b.iter(|| {
            let mut sim = match Simulation::new(particles.clone(), constants, 0.5, 0.05) {
                Ok(sim) => sim,
                Err(e) => panic!("invalid benchmark parameters: {}", e),
            };
            sim.simulate(10, &mut NoVisualization).ok();
            black_box(sim.into_particles())
        })
    });
}

criterion_group!(benches, bench_tree_build, bench_forces, bench_sequential_steps);
criterion_main!(benches);
