//! Two particle fountains falling onto a floor.
//!
//! Demonstrates: emit → await last frame → integrate and stream with a
//! floor constraint → read the impulses back next frame.
//!
//! Run with `RUST_LOG=flux_solver=debug` to see per-frame reports.
//! Writing a new tunables file to `FLUX_TUNABLES` and sending a line on
//! stdin reloads it on the next frame.

use std::io::BufRead;
use std::time::Instant;

use flux_bench::{pointfall_profile, step_group, GRAVITY};
use flux_core::{CollisionTunables, Constraint};
use flux_jobs::SchedulerConfig;
use flux_solver::{CollisionSolver, JsonTunablesFile, SolverConfig};
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 600;
const DT: f32 = 1.0 / 60.0;
const BOUND: f32 = 40.0;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Flux Pointfall Example ===\n");

    let solver = CollisionSolver::with_scheduler_config(
        SolverConfig {
            tunables: CollisionTunables::default(),
            ..SolverConfig::default()
        },
        SchedulerConfig::default(),
    )
    .unwrap();
    println!("workers: {}", solver.scheduler().worker_count());

    if let Ok(path) = std::env::var("FLUX_TUNABLES") {
        let source = JsonTunablesFile::load_on_start(&path);
        let handle = source.reload_handle();
        solver.set_tunables_source(Box::new(source));
        std::thread::spawn(move || {
            for _ in std::io::stdin().lock().lines() {
                handle.request();
            }
        });
        println!("tunables from {path}; press enter to reload");
    }

    let mut fountains = pointfall_profile(42, 4_000);
    let started = Instant::now();

    for frame in 0..FRAMES {
        // Every group, before editing any: a group's impulses can still
        // gain pair contacts until the groups registered after it finish.
        for (_, buffer) in &fountains {
            solver.await_query_completion(buffer);
        }
        for (emitter, buffer) in &mut fountains {
            let mut i = 0;
            while i < buffer.live_count() {
                let x = buffer.lock().positions[i].x;
                if x.abs() > BOUND {
                    buffer.expire(i);
                } else {
                    i += 1;
                }
            }
            emitter.emit(buffer, DT);
        }

        solver.begin_batch(None);
        for (_, buffer) in &fountains {
            let mut ctx = solver.begin_async(buffer, DT, Some(Constraint::floor()));
            step_group(&mut ctx, buffer, DT, GRAVITY);
        }
        solver.end_batch();

        if frame % 100 == 0 || frame == FRAMES - 1 {
            let report = solver.await_completion();
            let live: usize = fountains.iter().map(|(_, b)| b.live_count()).sum();
            println!(
                "  frame {:>3}: live={:>5}, local={:>5}, cross={:>5}, floor={:>5}, jobs={:>3}",
                frame + 1,
                live,
                report.local_collisions,
                report.global_collisions,
                report.constraint_contacts,
                report.jobs,
            );
        }
    }

    solver.await_completion();
    let elapsed = started.elapsed();
    let metrics = solver.scheduler().metrics();
    println!(
        "\n{} frames in {:.1?} ({:.2?}/frame); jobs run {}, inline {}, producer blocks {}",
        FRAMES,
        elapsed,
        elapsed / FRAMES as u32,
        metrics.jobs_run,
        metrics.jobs_run_inline,
        metrics.producer_blocks,
    );
}
