// Traditional pipeline: a scrolling level of note-block shafts.
//
// Each note becomes one structure (`structure.rs`). The level scrolls at a
// fixed speed, so a note's beat maps to the column where its shaft must
// stand. `TraditionalOptimizer::build`:
// 1. Rejects notes whose pitch row, or the cap of their shortest permitted
//    structure, is outside the level height (one out-of-bounds diagnostic
//    each; they get no structure).
// 2. Ranks (scroll speed, tiles-per-beat) configurations (`quantize.rs`).
//    None admissible ends the build with a single failure.
// 3. Builds every ranked configuration independently on the rayon pool: place
//    a structure per note on setup 0, resolve conflicts (`conflict.rs`), merge
//    cells (`cell.rs`), render (`render.rs`).
// 4. Picks the first attempt in rank order that left nothing unresolved, or
//    the best-ranked attempt when none did.
//
// **Critical constraint: determinism.** Attempts run in parallel but each
// owns its `BuildContext`, and selection is by rank, never by finishing
// order. Identical requests produce identical results.

pub mod cell;
pub mod conflict;
pub mod context;
pub mod quantize;
pub mod render;
pub mod structure;

use crate::config::GameData;
use crate::error::{BuildError, Result};
use crate::grid::SparseGrid;
use crate::result::{BuildSummary, DiagnosticKind, Diagnostics, EntityPlacement, LevelTiles, OptimizationResult};
use crate::types::{LevelBounds, NoteTarget, ScrollPreference};
use cell::{Cell, merge_cells};
use conflict::{Unresolved, resolve_conflicts};
use context::BuildContext;
use quantize::{Configuration, note_column, rank_configurations};
use rayon::prelude::*;
use render::render_structures;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use structure::lowest_top;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraditionalRequest {
    pub notes: Vec<NoteTarget>,
    pub tempo_bpm: f64,
    pub level: LevelBounds,
    #[serde(default)]
    pub scroll_preference: ScrollPreference,
}

/// Outcome of building one configuration.
struct Attempt {
    config: Configuration,
    unresolved: Vec<Unresolved>,
    cells: Vec<Cell>,
    tiles: LevelTiles,
    entities: SparseGrid<EntityPlacement>,
    placed: usize,
}

pub struct TraditionalOptimizer<'a> {
    data: &'a GameData,
}

impl<'a> TraditionalOptimizer<'a> {
    pub fn new(data: &'a GameData) -> Self {
        Self { data }
    }

    pub fn build(&self, request: &TraditionalRequest) -> Result<OptimizationResult> {
        validate(request)?;
        let level = request.level;
        let mut diags = Diagnostics::new();

        // A structure rises above its note block, so a note near the top
        // edge can be out of bounds even when its own row is not.
        let mut kept = Vec::new();
        for note in &request.notes {
            let rules = self.data.instrument_rules(note.instrument)?;
            let reach = lowest_top(self.data, note.pitch_row, rules)
                .unwrap_or(note.pitch_row)
                .max(note.pitch_row);
            if note.pitch_row < 0 || reach >= level.height {
                diags.error(
                    DiagnosticKind::OutOfBoundsVertical,
                    Some(note.id),
                    format!(
                        "pitch row {} needs rows up to {reach}, the level height is {}",
                        note.pitch_row, level.height
                    ),
                );
            } else {
                kept.push(*note);
            }
        }
        let rejected_up_front = request.notes.len() - kept.len();

        let configs = rank_configurations(
            self.data,
            &kept,
            request.tempo_bpm,
            level,
            request.scroll_preference,
        );
        debug!(candidates = configs.len(), notes = kept.len(), "traditional configurations ranked");
        if configs.is_empty() {
            warn!(tempo = request.tempo_bpm, "no admissible traditional configuration");
            let mut failed = Diagnostics::new();
            failed.error(
                DiagnosticKind::NoAdmissibleConfiguration,
                None,
                format!(
                    "no scroll speed and note spacing fits {} notes into {} columns",
                    kept.len(),
                    level.width
                ),
            );
            let summary = BuildSummary {
                rejected_notes: request.notes.len(),
                ..BuildSummary::default()
            };
            return Ok(OptimizationResult::finish(
                failed,
                LevelTiles::new(level.width, level.height),
                Vec::new(),
                Vec::new(),
                SparseGrid::new(),
                summary,
            ));
        }

        let attempts: Vec<Attempt> = configs
            .into_par_iter()
            .map(|config| self.attempt(config, &kept, level))
            .collect::<Result<Vec<_>>>()?;

        let chosen_index = attempts
            .iter()
            .position(|a| a.unresolved.is_empty())
            .unwrap_or(0);
        let Some(chosen) = attempts.into_iter().nth(chosen_index) else {
            return Err(BuildError::invalid("no traditional attempt was built"));
        };

        for u in &chosen.unresolved {
            let note = kept.get(u.id.0 as usize).map(|n| n.id);
            let message = match u.kind {
                DiagnosticKind::IllegalSetup => "no legal setup fits this note".to_string(),
                _ => format!("{} conflicts remain around this note", u.conflicts),
            };
            diags.error(u.kind, note, message);
        }

        let rejected = rejected_up_front + chosen.unresolved.len();
        let summary = BuildSummary {
            width: chosen.config.width,
            scroll_speed: Some(chosen.config.speed.name.clone()),
            tiles_per_beat: Some(chosen.config.tiles_per_beat),
            effective_bpm: Some(chosen.config.effective_bpm),
            period_frames: None,
            sections: chosen.cells.len(),
            placed_notes: chosen.placed,
            rejected_notes: rejected,
        };
        diags.info(format!(
            "{} of {} notes placed at {} with {} tiles per beat ({:.2} bpm), {} cells",
            chosen.placed,
            request.notes.len(),
            chosen.config.speed.name,
            chosen.config.tiles_per_beat,
            chosen.config.effective_bpm,
            chosen.cells.len()
        ));

        let result = OptimizationResult::finish(
            diags,
            chosen.tiles,
            Vec::new(),
            Vec::new(),
            chosen.entities,
            summary,
        );
        info!(
            succeeded = result.succeeded,
            speed = %chosen.config.speed.name,
            tiles_per_beat = chosen.config.tiles_per_beat,
            placed = chosen.placed,
            rejected,
            "traditional build finished"
        );
        Ok(result)
    }

    fn attempt(&self, config: Configuration, notes: &[NoteTarget], level: LevelBounds) -> Result<Attempt> {
        let mut ctx = BuildContext::new(self.data, &config.speed, level);
        for note in notes {
            let column = note_column(self.data, note, config.tiles_per_beat).ok_or_else(|| {
                BuildError::invalid(format!("{} does not land on a column", note.id))
            })?;
            ctx.add(*note, column)?;
        }

        let mut unresolved = resolve_conflicts(&mut ctx)?;
        let excluded: BTreeSet<_> = unresolved.iter().map(|u| u.id).collect();
        let layout = merge_cells(ctx.structures(), &excluded);
        for id in &layout.over_extended {
            unresolved.push(Unresolved {
                id: *id,
                kind: DiagnosticKind::UnresolvedConflict,
                conflicts: 1,
            });
        }
        unresolved.sort_by_key(|u| u.id);

        let skipped: BTreeSet<_> = unresolved.iter().map(|u| u.id).collect();
        let rendered = render_structures(self.data, ctx.structures(), &layout.cells, &skipped, level);
        debug!(
            speed = %config.speed.name,
            tiles_per_beat = config.tiles_per_beat,
            unresolved = unresolved.len(),
            "traditional attempt built"
        );
        Ok(Attempt {
            placed: ctx.len() - skipped.len(),
            config,
            unresolved,
            cells: layout.cells,
            tiles: rendered.tiles,
            entities: rendered.entities,
        })
    }
}

fn validate(request: &TraditionalRequest) -> Result<()> {
    if !(request.tempo_bpm.is_finite() && request.tempo_bpm > 0.0) {
        return Err(BuildError::invalid(format!("tempo {} is not positive", request.tempo_bpm)));
    }
    if request.level.width <= 0 || request.level.height <= 0 {
        return Err(BuildError::invalid(format!(
            "level {}x{} is empty",
            request.level.width, request.level.height
        )));
    }
    Ok(())
}
