// Fixtures for end-to-end pipeline tests.
//
// Builds the reference requests the integration tests run through the real
// optimizers, plus small helpers for inspecting results. Nothing here
// reimplements pipeline logic: every build goes through
// `LoopingOptimizer::build` or `TraditionalOptimizer::build` with the
// default game data unless a test overrides it.
//
// See also: `tests/scenarios.rs` for the scenarios themselves.

use std::collections::BTreeSet;

use tunesmith_core::{
    BeatTime, DiagnosticKind, EntityKind, GameData, LevelBounds, LoopingOptimizer, LoopingRequest, NoteId,
    NoteTarget, OptimizationResult, ScrollPreference, TraditionalOptimizer, TraditionalRequest,
};

/// The level every scenario builds into unless it says otherwise.
pub const LEVEL: LevelBounds = LevelBounds::new(64, 27);

/// Goomba notes at `(pitch_row, beat)`, numbered in order.
pub fn goombas(notes: &[(i32, BeatTime)]) -> Vec<NoteTarget> {
    notes
        .iter()
        .enumerate()
        .map(|(i, &(pitch, time))| NoteTarget::new(i as u32, pitch, time, EntityKind::Goomba))
        .collect()
}

/// Four quarter notes in one bar at 120 bpm: a 120-frame loop period.
pub fn scenario_a() -> LoopingRequest {
    let notes = goombas(&[
        (8, BeatTime::whole(0)),
        (10, BeatTime::whole(1)),
        (12, BeatTime::whole(2)),
        (9, BeatTime::whole(3)),
    ]);
    LoopingRequest::from_notes(&notes, 120.0, BeatTime::whole(4), LEVEL, "autoscroll-medium")
}

/// Four quarter notes for the traditional pipeline, the third one placed
/// above the playable height.
pub fn scenario_b() -> TraditionalRequest {
    TraditionalRequest {
        notes: goombas(&[
            (8, BeatTime::whole(0)),
            (10, BeatTime::whole(1)),
            (27, BeatTime::whole(2)),
            (9, BeatTime::whole(3)),
        ]),
        tempo_bpm: 120.0,
        level: LevelBounds::new(80, 27),
        scroll_preference: ScrollPreference::Any,
    }
}

/// Two identical notes that need the same delivery column.
pub fn scenario_c() -> LoopingRequest {
    let notes = goombas(&[(8, BeatTime::whole(0)), (8, BeatTime::whole(0))]);
    LoopingRequest::from_notes(&notes, 120.0, BeatTime::whole(4), LEVEL, "autoscroll-medium")
}

/// Game data whose delivery zone admits exactly one column per timing, so
/// notes that share a timing compete. `attempts` caps section retries.
pub fn single_column_data(attempts: u32) -> GameData {
    let mut data = GameData::default();
    data.looping.delivery_width = 10;
    data.limits.max_section_attempts = attempts;
    data
}

pub fn build_looping(data: &GameData, request: &LoopingRequest) -> OptimizationResult {
    LoopingOptimizer::new(data)
        .build(request)
        .expect("looping build returned a fatal error")
}

pub fn build_traditional(data: &GameData, request: &TraditionalRequest) -> OptimizationResult {
    TraditionalOptimizer::new(data)
        .build(request)
        .expect("traditional build returned a fatal error")
}

/// Notes that ended up with an entity.
pub fn placed_notes(result: &OptimizationResult) -> BTreeSet<NoteId> {
    result.entities.iter().filter_map(|(_, e)| e.note).collect()
}

/// Notes named by diagnostics of `kind`, in report order.
pub fn notes_with(result: &OptimizationResult, kind: DiagnosticKind) -> Vec<NoteId> {
    result.diagnostics_of(kind).filter_map(|d| d.note).collect()
}
