//! Criterion benchmarks for whole frames through the solver.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use flux_core::{CollisionParams, Constraint, Vec3};
use flux_solver::ParticleBuffer;
use flux_test_utils::{cloud, stream_all, test_solver};

fn groups(count: u64, per_group: usize) -> Vec<ParticleBuffer> {
    (0..count)
        .map(|seed| cloud(seed, per_group, Vec3::new(seed as f32 * 4.0, 5.0, 0.0), 8.0))
        .collect()
}

/// Benchmark: four 2.5K groups, streamed and settled each iteration.
fn bench_frame_4x2500(c: &mut Criterion) {
    let solver = test_solver(4, CollisionParams::default());
    let buffers = groups(4, 2_500);

    c.bench_function("frame_4x2500", |b| {
        b.iter(|| {
            solver.begin_batch(None);
            for buffer in &buffers {
                let mut ctx = solver.begin_async(buffer, 1.0 / 60.0, None);
                stream_all(&mut ctx, buffer);
            }
            solver.end_batch();
            black_box(solver.await_completion());
        });
    });
}

/// Benchmark: same load with a floor constraint on every group.
fn bench_frame_4x2500_floor(c: &mut Criterion) {
    let solver = test_solver(4, CollisionParams::default());
    let buffers = groups(4, 2_500);

    c.bench_function("frame_4x2500_floor", |b| {
        b.iter(|| {
            solver.begin_batch(None);
            for buffer in &buffers {
                let mut ctx = solver.begin_async(buffer, 1.0 / 60.0, Some(Constraint::floor()));
                let snapshot = buffer.lock().clone();
                for i in 0..buffer.live_count() {
                    ctx.submit_query(i, snapshot.positions[i], snapshot.velocities[i]);
                }
            }
            solver.end_batch();
            black_box(solver.await_completion());
        });
    });
}

criterion_group!(benches, bench_frame_4x2500, bench_frame_4x2500_floor);
criterion_main!(benches);
