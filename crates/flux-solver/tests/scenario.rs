//! End-to-end collision counts through the full pipeline.

use std::sync::Arc;

use flux_core::{CollisionParams, Vec3};
use flux_jobs::JobGroup;
use flux_solver::{CollisionSolver, ParticleBuffer, SolverConfig, SortStrategy};
use flux_test_utils::{cloud, stream_all, test_solver};

fn group_a() -> ParticleBuffer {
    ParticleBuffer::from_particles(
        &[Vec3::ZERO, Vec3::new(0.1, 0.0, 0.0), Vec3::new(50.0, 0.0, 0.0)],
        &[Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO, Vec3::ZERO],
    )
}

fn group_b() -> ParticleBuffer {
    ParticleBuffer::from_particles(&[Vec3::new(0.05, 0.0, 0.0)], &[Vec3::new(-1.0, 0.0, 0.0)])
}

fn run_frame(solver: &CollisionSolver, buffers: &[&ParticleBuffer]) {
    solver.begin_batch(None);
    for buffer in buffers {
        let mut ctx = solver.begin_async(buffer, 0.016, None);
        stream_all(&mut ctx, buffer);
    }
    solver.end_batch();
}

fn net_impulse(buffers: &[&ParticleBuffer]) -> Vec3 {
    buffers
        .iter()
        .flat_map(|b| b.forces().to_vec(b.live_count()))
        .sum()
}

#[test]
fn two_groups_resolve_one_local_and_two_cross_contacts() {
    let solver = test_solver(4, CollisionParams::new(1.2, 2));
    let (a, b) = (group_a(), group_b());
    run_frame(&solver, &[&a, &b]);
    let report = solver.await_completion();

    assert_eq!(report.local_collisions, 1);
    assert_eq!(report.global_collisions, 2);
    assert_eq!(report.total_collisions(), 3);
    assert_eq!(report.queries, 2);
    assert_eq!(report.inter_query_jobs, 1);

    assert_eq!(a.forces().get(2), Vec3::ZERO);
    assert_ne!(b.forces().get(0), Vec3::ZERO);
    assert!(net_impulse(&[&a, &b]).length() < 1e-4);
}

#[test]
fn single_query_spawns_no_cross_work() {
    let solver = test_solver(2, CollisionParams::new(1.2, 2));
    let a = group_a();
    run_frame(&solver, &[&a]);
    let report = solver.await_completion();
    assert_eq!(report.queries, 1);
    assert_eq!(report.inter_query_jobs, 0);
    assert_eq!(report.global_collisions, 0);
    assert_eq!(report.local_collisions, 1);
}

#[test]
fn incremental_sort_matches_bulk() {
    let params = CollisionParams::new(1.2, 2);
    let mut reports = Vec::new();
    for sort in [SortStrategy::Bulk, SortStrategy::Incremental] {
        let config = SolverConfig {
            tunables: flux_core::CollisionTunables::uniform(params.clone()),
            sort,
            ..SolverConfig::default()
        };
        let solver = CollisionSolver::with_scheduler_config(
            config,
            flux_jobs::SchedulerConfig::with_workers(2),
        )
        .unwrap();
        let (a, b) = (group_a(), group_b());
        run_frame(&solver, &[&a, &b]);
        reports.push(solver.await_completion());
    }
    assert_eq!(reports[0].total_collisions(), reports[1].total_collisions());
    assert_eq!(reports[1].total_collisions(), 3);
}

#[test]
fn overlapping_clouds_conserve_momentum() {
    let solver = test_solver(4, CollisionParams::new(0.5, 4));
    let clouds: Vec<ParticleBuffer> = (0..4)
        .map(|seed| cloud(seed, 200, Vec3::splat(seed as f32 * 0.5), 3.0))
        .collect();
    let refs: Vec<&ParticleBuffer> = clouds.iter().collect();
    run_frame(&solver, &refs);
    let report = solver.await_completion();

    assert_eq!(report.queries, 4);
    assert_eq!(report.inter_query_jobs, 6);
    assert!(report.total_collisions() > 0);

    let magnitude: f32 = refs
        .iter()
        .flat_map(|b| b.forces().to_vec(b.live_count()))
        .map(Vec3::length)
        .sum();
    let net = net_impulse(&refs);
    assert!(
        net.length() <= 1e-3 * magnitude.max(1.0),
        "net {net:?} vs total magnitude {magnitude}"
    );
}

#[test]
fn job_group_dispatch_gives_same_result() {
    let solver = test_solver(3, CollisionParams::new(1.2, 2));
    let group = Arc::new(JobGroup::new(Arc::clone(solver.scheduler()), "frame"));
    let (a, b) = (group_a(), group_b());

    solver.begin_batch(Some(Arc::clone(&group)));
    for buffer in [&a, &b] {
        let mut ctx = solver.begin_async(buffer, 0.016, None);
        stream_all(&mut ctx, buffer);
    }
    solver.end_batch();
    group.sync();
    assert_eq!(group.outstanding(), 0);

    let report = solver.await_completion();
    assert_eq!(report.total_collisions(), 3);
    assert_eq!(report.jobs, 3);
}
