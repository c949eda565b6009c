// Looping pipeline: notes replayed forever by a track contraption.
//
// Each section of the level hosts a loop body (a bouncing line of track whose
// round trip is a whole number of loop periods) feeding a delivery zone. An
// entity released by the loop rides a rail to its delivery column, climbs a
// stack, falls through an air gap, and is let go by an emitter exactly on its
// note's frame within the period.
//
// `LoopingOptimizer::build` runs the stages in order:
// 1. Loop body (`loop_body.rs`). It depends only on the period and the level
//    height, so it is built once per request. Failure here is a
//    whole-configuration failure and ends the build.
// 2. A FIFO queue of section jobs, one per input section. For each job:
//    delivery timing per note (`delivery.rs`), column assignment
//    (`assignment.rs`), then splitting or committing.
// 3. Splitting: when some notes lose the column assignment, the winners go
//    back to the front of the queue as their own job and the losers to the
//    back with one more attempt, until `max_section_attempts` runs out.
// 4. Committing: non-base sections are pushed right by a spacer until their
//    start column is a whole number of periods of scroll away from the level
//    start, so every section's loop runs in phase.
// 5. Width check and rendering (`layout.rs`).
//
// **Critical constraint: determinism.** Sections are processed in queue
// order, candidates in ascending column order, and the loop body search in
// solver order. No hash-map iteration reaches the output.

pub mod assignment;
pub mod column_setup;
pub mod delivery;
pub mod layout;
pub mod loop_body;

use crate::combinatorics::DurationSolver;
use crate::config::GameData;
use crate::error::{BuildError, Result};
use crate::grid::SparseGrid;
use crate::result::{BuildSummary, DiagnosticKind, Diagnostics, LevelTiles, OptimizationResult};
use crate::track::TrackCatalog;
use crate::types::{BeatTime, EntityKind, LevelBounds, NoteTarget};
use assignment::assign_columns;
use column_setup::SetupTable;
use delivery::DeliveryContext;
use layout::{PlacedNote, SectionLayout, render_sections, section_width};
use loop_body::{LoopBodyOutcome, build_loop_body};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Notes for one instrument. Every note's instrument must match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopingSection {
    pub instrument: EntityKind,
    pub notes: Vec<NoteTarget>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopingRequest {
    pub sections: Vec<LoopingSection>,
    pub tempo_bpm: f64,
    /// Length of the repeating pattern in beats.
    pub period_beats: BeatTime,
    pub level: LevelBounds,
    pub scroll_speed: String,
}

impl LoopingRequest {
    /// Group a flat note list into one section per instrument, in order of
    /// first appearance.
    pub fn from_notes(
        notes: &[NoteTarget],
        tempo_bpm: f64,
        period_beats: BeatTime,
        level: LevelBounds,
        scroll_speed: &str,
    ) -> Self {
        let mut sections: Vec<LoopingSection> = Vec::new();
        for note in notes {
            match sections.iter_mut().find(|s| s.instrument == note.instrument) {
                Some(section) => section.notes.push(*note),
                None => sections.push(LoopingSection {
                    instrument: note.instrument,
                    notes: vec![*note],
                }),
            }
        }
        Self {
            sections,
            tempo_bpm,
            period_beats,
            level,
            scroll_speed: scroll_speed.to_string(),
        }
    }

    pub fn note_count(&self) -> usize {
        self.sections.iter().map(|s| s.notes.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// A pending section. `attempt` counts how often its notes were displaced.
#[derive(Clone, Debug)]
struct SectionJob {
    instrument: EntityKind,
    notes: Vec<NoteTarget>,
    attempt: u32,
}

/// Mutable state of one `build` call.
struct Composition {
    diags: Diagnostics,
    sections: Vec<SectionLayout>,
    cursor: i32,
    rejected: usize,
}

pub struct LoopingOptimizer<'a> {
    data: &'a GameData,
    catalog: TrackCatalog,
    solver: DurationSolver,
    table: SetupTable,
}

impl<'a> LoopingOptimizer<'a> {
    pub fn new(data: &'a GameData) -> Self {
        let catalog = TrackCatalog::standard();
        let solver = DurationSolver::new(&catalog.unit_costs(), data.limits.duration_cache_limit);
        let table = SetupTable::new(data);
        Self {
            data,
            catalog,
            solver,
            table,
        }
    }

    pub fn build(&self, request: &LoopingRequest) -> Result<OptimizationResult> {
        self.validate(request)?;
        let speed = self.data.scroll_speed(&request.scroll_speed)?;
        let period = request.period_beats.to_frames(request.tempo_bpm);
        if period == 0 {
            return Err(BuildError::invalid("loop period rounds to zero frames"));
        }
        let level = request.level;
        debug!(period, speed = %speed.name, notes = request.note_count(), "looping build started");

        let mut summary = BuildSummary {
            scroll_speed: Some(speed.name.clone()),
            period_frames: Some(period),
            ..BuildSummary::default()
        };

        let body = match build_loop_body(self.data, &self.catalog, &self.solver, period, level.height)? {
            LoopBodyOutcome::Built(body) => body,
            LoopBodyOutcome::PeriodNotFound => {
                warn!(period, "no loop body length fits the period");
                let mut diags = Diagnostics::new();
                diags.error(
                    DiagnosticKind::LoopPeriodNotFound,
                    None,
                    format!("no track leg closes a loop of {period} frames"),
                );
                summary.rejected_notes = request.note_count();
                return Ok(empty_result(diags, level, summary));
            }
            LoopBodyOutcome::PathfindFailed { leg_frames } => {
                warn!(period, leg_frames, "loop body could not be laid out");
                let mut diags = Diagnostics::new();
                diags.error(
                    DiagnosticKind::LoopPathfindFailed,
                    None,
                    format!("no layout of a {leg_frames}-frame leg fits the loop zone"),
                );
                summary.rejected_notes = request.note_count();
                return Ok(empty_result(diags, level, summary));
            }
        };
        debug!(leg = body.leg_frames, cycle = body.cycle.frames, "loop body built");

        let ctx = DeliveryContext {
            data: self.data,
            table: &self.table,
            speed,
            level_height: level.height,
        };
        let mut comp = Composition {
            diags: Diagnostics::new(),
            sections: Vec::new(),
            cursor: 0,
            rejected: 0,
        };

        let mut queue: VecDeque<SectionJob> = request
            .sections
            .iter()
            .filter(|s| !s.notes.is_empty())
            .map(|s| SectionJob {
                instrument: s.instrument,
                notes: s.notes.clone(),
                attempt: 0,
            })
            .collect();

        while let Some(job) = queue.pop_front() {
            self.process_job(job, &ctx, request, period, &mut queue, &mut comp)?;
        }

        if comp.cursor > level.width {
            warn!(width = comp.cursor, budget = level.width, "looping output too wide");
            comp.diags.error(
                DiagnosticKind::OutputTooWide,
                None,
                format!("sections need {} columns, the level has {}", comp.cursor, level.width),
            );
        }

        let rendered = render_sections(self.data, &self.catalog, &body, &comp.sections, level)?;
        let placed: usize = comp.sections.iter().map(|s| s.notes.len()).sum();
        summary.width = comp.cursor;
        summary.sections = comp.sections.len();
        summary.placed_notes = placed;
        summary.rejected_notes = comp.rejected;
        comp.diags.info(format!(
            "{placed} of {} notes placed in {} sections, {} columns wide",
            request.note_count(),
            comp.sections.len(),
            comp.cursor
        ));

        let result = OptimizationResult::finish(
            comp.diags,
            rendered.tiles,
            rendered.tracks,
            rendered.emitters,
            rendered.entities,
            summary,
        );
        info!(
            succeeded = result.succeeded,
            placed,
            rejected = comp.rejected,
            width = comp.cursor,
            "looping build finished"
        );
        Ok(result)
    }

    fn validate(&self, request: &LoopingRequest) -> Result<()> {
        if !(request.tempo_bpm.is_finite() && request.tempo_bpm > 0.0) {
            return Err(BuildError::invalid(format!("tempo {} is not positive", request.tempo_bpm)));
        }
        if request.period_beats.num() == 0 {
            return Err(BuildError::invalid("loop period is zero beats"));
        }
        let level = request.level;
        if level.width <= 0 || level.height <= 0 {
            return Err(BuildError::invalid(format!(
                "level {}x{} is empty",
                level.width, level.height
            )));
        }
        if level.height < self.data.looping.rail_row + 3 {
            return Err(BuildError::invalid(format!(
                "level height {} leaves no room above the rail",
                level.height
            )));
        }
        for section in &request.sections {
            self.data.instrument_rules(section.instrument)?;
            if let Some(stray) = section.notes.iter().find(|n| n.instrument != section.instrument) {
                return Err(BuildError::invalid(format!(
                    "{} is a {:?} in a {:?} section",
                    stray.id, stray.instrument, section.instrument
                )));
            }
        }
        Ok(())
    }

    fn process_job(
        &self,
        job: SectionJob,
        ctx: &DeliveryContext<'_>,
        request: &LoopingRequest,
        period: u32,
        queue: &mut VecDeque<SectionJob>,
        comp: &mut Composition,
    ) -> Result<()> {
        let rules = self.data.instrument_rules(job.instrument)?;

        let mut timed: Vec<NoteTarget> = Vec::new();
        let mut lists = Vec::new();
        for note in &job.notes {
            let frame = note.time.to_frames(request.tempo_bpm) % period;
            match ctx.candidates(note, frame, rules) {
                Ok(found) => {
                    timed.push(*note);
                    lists.push(found);
                }
                Err(failure) => {
                    comp.diags.error(failure.kind, Some(note.id), failure.message);
                    comp.rejected += 1;
                }
            }
        }
        if timed.is_empty() {
            return Ok(());
        }

        let columns: Vec<Vec<i32>> = lists.iter().map(|l| l.iter().map(|c| c.x).collect()).collect();
        let assigned = assign_columns(&columns);

        let mut placed = Vec::new();
        let mut displaced = Vec::new();
        for ((note, candidates), column) in timed.iter().zip(&lists).zip(&assigned) {
            match column.and_then(|x| candidates.iter().find(|c| c.x == x)) {
                Some(candidate) => placed.push(PlacedNote {
                    note: *note,
                    column: candidate.x,
                    setup: candidate.setup,
                }),
                None => displaced.push(*note),
            }
        }

        if !displaced.is_empty() {
            debug!(
                instrument = ?job.instrument,
                placed = placed.len(),
                displaced = displaced.len(),
                "splitting section"
            );
            if !placed.is_empty() {
                queue.push_front(SectionJob {
                    instrument: job.instrument,
                    notes: placed.iter().map(|p| p.note).collect(),
                    attempt: job.attempt,
                });
            }
            if job.attempt < self.data.limits.max_section_attempts {
                for note in &displaced {
                    comp.diags.warning(
                        DiagnosticKind::AssignmentFailed,
                        Some(note.id),
                        format!("delivery column taken, moved to a new section (attempt {})", job.attempt + 1),
                    );
                }
                queue.push_back(SectionJob {
                    instrument: job.instrument,
                    notes: displaced,
                    attempt: job.attempt + 1,
                });
            } else {
                for note in &displaced {
                    comp.diags.error(
                        DiagnosticKind::AssignmentFailed,
                        Some(note.id),
                        format!("no free delivery column after {} attempts", job.attempt + 1),
                    );
                }
                comp.rejected += displaced.len();
            }
            return Ok(());
        }

        let width = section_width(&self.data.looping, &placed);
        let spacer = if comp.sections.is_empty() {
            0
        } else {
            match self.sync_spacer(ctx, comp.cursor, period) {
                Some(w) => w,
                None => {
                    warn!(instrument = ?job.instrument, x = comp.cursor, "section cannot be synchronized");
                    comp.diags.error(
                        DiagnosticKind::SynchronizationFailed,
                        None,
                        format!(
                            "{:?} section at column {} cannot be put in phase within {} columns",
                            job.instrument, comp.cursor, self.data.limits.sync_width_cap
                        ),
                    );
                    comp.rejected += placed.len();
                    return Ok(());
                }
            }
        };

        let x_start = comp.cursor + spacer;
        debug!(instrument = ?job.instrument, x_start, spacer, width, notes = placed.len(), "section committed");
        comp.cursor = x_start + width;
        comp.sections.push(SectionLayout {
            instrument: job.instrument,
            x_start,
            spacer,
            width,
            notes: placed,
        });
        Ok(())
    }

    /// Smallest spacer putting column `cursor + w` a whole number of periods
    /// of scroll away from column 0.
    fn sync_spacer(&self, ctx: &DeliveryContext<'_>, cursor: i32, period: u32) -> Option<i32> {
        (0..=self.data.limits.sync_width_cap).find(|w| {
            ctx.speed
                .frames_for_tiles(cursor + w)
                .is_some_and(|frames| frames % period == 0)
        })
    }
}

/// Result of a build that failed before any section was laid out.
fn empty_result(diags: Diagnostics, level: LevelBounds, summary: BuildSummary) -> OptimizationResult {
    OptimizationResult::finish(
        diags,
        LevelTiles::new(level.width, level.height),
        Vec::new(),
        Vec::new(),
        SparseGrid::new(),
        summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Severity, Tile};
    use crate::types::{NoteId, TilePos};

    fn scenario_a() -> LoopingRequest {
        let notes: Vec<NoteTarget> = [(8, 0), (10, 1), (12, 2), (9, 3)]
            .iter()
            .enumerate()
            .map(|(i, &(pitch, beat))| NoteTarget::new(i as u32, pitch, BeatTime::whole(beat), EntityKind::Goomba))
            .collect();
        LoopingRequest::from_notes(
            &notes,
            120.0,
            BeatTime::whole(4),
            LevelBounds::new(64, 27),
            "autoscroll-medium",
        )
    }

    fn scenario_c() -> LoopingRequest {
        let notes = vec![
            NoteTarget::new(0, 8, BeatTime::whole(0), EntityKind::Goomba),
            NoteTarget::new(1, 8, BeatTime::whole(0), EntityKind::Goomba),
        ];
        LoopingRequest::from_notes(
            &notes,
            120.0,
            BeatTime::whole(4),
            LevelBounds::new(64, 27),
            "autoscroll-medium",
        )
    }

    fn narrow_data(attempts: u32) -> GameData {
        let mut data = GameData::default();
        data.looping.delivery_width = 10;
        data.limits.max_section_attempts = attempts;
        data
    }

    #[test]
    fn four_notes_in_one_section() {
        let data = GameData::default();
        let result = LoopingOptimizer::new(&data).build(&scenario_a()).unwrap();
        assert!(result.succeeded, "{:?}", result.diagnostics);
        assert_eq!(result.entities.len(), 4);
        assert_eq!(result.summary.sections, 1);
        assert_eq!(result.summary.width, 43);
        assert_eq!(result.summary.period_frames, Some(120));

        let columns: Vec<i32> = result.entities.iter().map(|(pos, _)| pos.x).collect();
        assert_eq!(columns, vec![18, 22, 26, 41]);
        let first = result.entities.get(TilePos::new(18, 8)).unwrap();
        assert!(first.parachute);
        assert_eq!(first.note, Some(NoteId(0)));
    }

    #[test]
    fn every_note_gets_one_emitter() {
        let data = GameData::default();
        let result = LoopingOptimizer::new(&data).build(&scenario_a()).unwrap();
        assert_eq!(result.emitters.len(), 4);
        for emitter in &result.emitters {
            let entity = result.entities.get(emitter.pos).unwrap();
            assert_eq!(entity.note, emitter.note);
            assert_eq!(result.tiles.foreground.get(emitter.pos), Tile::Emitter);
        }
        // Only the five loop pieces are tracks.
        assert_eq!(result.tracks.len(), 5);
        let catalog = TrackCatalog::standard();
        for track in &result.tracks {
            assert!(catalog.by_name(&track.template).is_ok(), "{}", track.template);
        }
    }

    #[test]
    fn exhausted_attempts_fail_the_displaced_note() {
        let data = narrow_data(0);
        let result = LoopingOptimizer::new(&data).build(&scenario_c()).unwrap();
        assert!(!result.succeeded);
        let failures: Vec<_> = result.diagnostics_of(DiagnosticKind::AssignmentFailed).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].note, Some(NoteId(1)));
        assert_eq!(failures[0].severity, Severity::Error);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.summary.rejected_notes, 1);
    }

    #[test]
    fn displaced_note_moves_to_a_synchronized_section() {
        let data = narrow_data(2);
        let result = LoopingOptimizer::new(&data).build(&scenario_c()).unwrap();
        assert!(result.succeeded, "{:?}", result.diagnostics);
        let warnings: Vec<_> = result.diagnostics_of(DiagnosticKind::AssignmentFailed).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert_eq!(result.summary.sections, 2);
        assert_eq!(result.summary.width, 50);
        assert_eq!(result.entities.len(), 2);
        // Second section starts after a 10-column spacer.
        assert!(result.entities.get(TilePos::new(48, 8)).is_some());
    }

    #[test]
    fn unsynchronizable_section_is_rejected() {
        let mut data = narrow_data(2);
        data.limits.sync_width_cap = 5;
        let result = LoopingOptimizer::new(&data).build(&scenario_c()).unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.diagnostics_of(DiagnosticKind::SynchronizationFailed).count(), 1);
        assert_eq!(result.entities.len(), 1);
    }

    #[test]
    fn too_narrow_level_is_reported() {
        let data = GameData::default();
        let mut request = scenario_a();
        request.level.width = 40;
        let result = LoopingOptimizer::new(&data).build(&request).unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.diagnostics_of(DiagnosticKind::OutputTooWide).count(), 1);
    }

    #[test]
    fn timing_failures_are_per_note() {
        let data = GameData::default();
        let mut request = scenario_a();
        request.sections[0].notes[1].pitch_row = 30;
        let result = LoopingOptimizer::new(&data).build(&request).unwrap();
        assert!(!result.succeeded);
        let vertical: Vec<_> = result.diagnostics_of(DiagnosticKind::OutOfBoundsVertical).collect();
        assert_eq!(vertical.len(), 1);
        assert_eq!(vertical[0].note, Some(NoteId(1)));
        assert_eq!(result.entities.len(), 3);
    }

    #[test]
    fn loop_body_failure_ends_the_build() {
        let mut data = GameData::default();
        data.looping.loop_zone_width = 3;
        let result = LoopingOptimizer::new(&data).build(&scenario_a()).unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::LoopPathfindFailed);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn bad_requests_are_errors() {
        let data = GameData::default();
        let optimizer = LoopingOptimizer::new(&data);

        let mut request = scenario_a();
        request.tempo_bpm = 0.0;
        assert!(matches!(optimizer.build(&request), Err(BuildError::InvalidRequest(_))));

        let mut request = scenario_a();
        request.scroll_speed = "warp".into();
        assert!(matches!(optimizer.build(&request), Err(BuildError::UnknownScrollSpeed(_))));

        let mut request = scenario_a();
        request.sections[0].notes[0].instrument = EntityKind::Thwomp;
        assert!(matches!(optimizer.build(&request), Err(BuildError::InvalidRequest(_))));
    }

    #[test]
    fn from_notes_groups_by_first_appearance() {
        let notes = vec![
            NoteTarget::new(0, 8, BeatTime::whole(0), EntityKind::Spiny),
            NoteTarget::new(1, 8, BeatTime::whole(1), EntityKind::Goomba),
            NoteTarget::new(2, 9, BeatTime::whole(2), EntityKind::Spiny),
        ];
        let request = LoopingRequest::from_notes(&notes, 120.0, BeatTime::whole(4), LevelBounds::new(64, 27), "run");
        assert_eq!(request.sections.len(), 2);
        assert_eq!(request.sections[0].instrument, EntityKind::Spiny);
        assert_eq!(request.sections[0].notes.len(), 2);
        assert_eq!(request.note_count(), 3);
    }
}
