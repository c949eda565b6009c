// Benchmarks for duration tabulation and whole looping builds.
//
// Run with: cargo bench -p tunesmith_core

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tunesmith_core::combinatorics::DurationSolver;
use tunesmith_core::track::TrackCatalog;
use tunesmith_core::{BeatTime, EntityKind, GameData, LevelBounds, LoopingOptimizer, LoopingRequest, NoteTarget};

fn bench_tabulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("duration_solver/tabulate");
    let units = TrackCatalog::standard().unit_costs();
    for limit in [200u32, 600, 1200] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            b.iter(|| black_box(DurationSolver::new(&units, limit)))
        });
    }
    group.finish();
}

fn bench_nearest_period(c: &mut Criterion) {
    let solver = DurationSolver::new(&TrackCatalog::standard().unit_costs(), 600);
    c.bench_function("duration_solver/nearest_loop_period", |b| {
        b.iter(|| {
            let mut hits = 0u32;
            for desired in 0..600 {
                if solver.nearest_loop_period(black_box(desired)).is_some() {
                    hits += 1;
                }
            }
            hits
        })
    });
}

fn bench_looping_build(c: &mut Criterion) {
    let data = GameData::default();
    let optimizer = LoopingOptimizer::new(&data);
    let notes: Vec<NoteTarget> = [(8, 0), (10, 1), (12, 2), (9, 3)]
        .iter()
        .enumerate()
        .map(|(i, &(pitch, beat))| NoteTarget::new(i as u32, pitch, BeatTime::whole(beat), EntityKind::Goomba))
        .collect();
    let request = LoopingRequest::from_notes(
        &notes,
        120.0,
        BeatTime::whole(4),
        LevelBounds::new(64, 27),
        "autoscroll-medium",
    );
    c.bench_function("looping/four_note_bar", |b| {
        b.iter(|| black_box(optimizer.build(&request)))
    });
}

criterion_group!(benches, bench_tabulate, bench_nearest_period, bench_looping_build);
criterion_main!(benches);
