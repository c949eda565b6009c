// Build results and diagnostics.
//
// An `OptimizationResult` is created fresh by each build call and returned
// by value; nothing in it is shared with the optimizer afterward. It holds
// the success flag, the ordered diagnostics, three tile layers (background,
// foreground, overview), the placed tracks, the emitters that release
// looping entities, the entity grid, and a summary of the configuration the
// build settled on. Every `PlacedTrack` names a catalog template.
//
// Diagnostics are recoverable, user-facing problems: a note that could not
// be placed, a section that could not be synchronized. Programmer and
// catalog errors are `BuildError`s instead and never appear here. A result
// succeeds exactly when it carries no `Severity::Error` diagnostic.
//
// See also: `looping/layout.rs` and `traditional/render.rs`, which fill the
// layers.

use crate::grid::{BoundedGrid, SparseGrid};
use crate::types::{EntityKind, NoteId, TilePos};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    OutputTooWide,
    LoopPathfindFailed,
    LoopPeriodNotFound,
    SynchronizationFailed,
    OutOfBoundsHorizontal,
    OutOfBoundsVertical,
    SetupNotFound,
    AssignmentFailed,
    UnresolvedConflict,
    IllegalSetup,
    NoAdmissibleConfiguration,
    Summary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub note: Option<NoteId>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note {
            Some(note) => write!(f, "[{:?}] {}: {}", self.severity, note, self.message),
            None => write!(f, "[{:?}] {}", self.severity, self.message),
        }
    }
}

/// Ordered diagnostic accumulator owned by one build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, kind: DiagnosticKind, note: Option<NoteId>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity,
            kind,
            message: message.into(),
            note,
        });
    }

    pub fn error(&mut self, kind: DiagnosticKind, note: Option<NoteId>, message: impl Into<String>) {
        self.push(Severity::Error, kind, note, message);
    }

    pub fn warning(&mut self, kind: DiagnosticKind, note: Option<NoteId>, message: impl Into<String>) {
        self.push(Severity::Warning, kind, note, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, DiagnosticKind::Summary, None, message);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Tiles and entities
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    Ground,
    Wall,
    NoteBlock,
    Cap,
    Semisolid,
    Rail,
    Stack,
    Emitter,
    Track,
    Spawn,
    ConflictMark,
}

impl Tile {
    fn glyph(self) -> char {
        match self {
            Tile::Empty => '.',
            Tile::Ground => '=',
            Tile::Wall => '#',
            Tile::NoteBlock => 'N',
            Tile::Cap => 'C',
            Tile::Semisolid => '-',
            Tile::Rail => '_',
            Tile::Stack => '|',
            Tile::Emitter => 'E',
            Tile::Track => 't',
            Tile::Spawn => 'o',
            Tile::ConflictMark => '!',
        }
    }
}

/// The three rendered layers of a level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTiles {
    pub background: BoundedGrid<Tile>,
    pub foreground: BoundedGrid<Tile>,
    pub overview: BoundedGrid<Tile>,
}

impl LevelTiles {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            background: BoundedGrid::new(width, height),
            foreground: BoundedGrid::new(width, height),
            overview: BoundedGrid::new(width, height),
        }
    }

    pub fn width(&self) -> i32 {
        self.foreground.width()
    }

    pub fn height(&self) -> i32 {
        self.foreground.height()
    }

    /// Text picture of the level, top row first. Overview marks win over the
    /// foreground, which wins over the background.
    pub fn ascii(&self) -> String {
        let mut out = String::new();
        for y in (0..self.height()).rev() {
            for x in 0..self.width() {
                let pos = TilePos::new(x, y);
                let tile = [self.overview.get(pos), self.foreground.get(pos), self.background.get(pos)]
                    .into_iter()
                    .find(|t| *t != Tile::Empty)
                    .unwrap_or(Tile::Empty);
                out.push(tile.glyph());
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPlacement {
    pub kind: EntityKind,
    pub pos: TilePos,
    pub parachute: bool,
    pub wing: bool,
    pub oversized: bool,
    pub note: Option<NoteId>,
}

/// A track piece in the finished contraption, in level coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedTrack {
    pub template: String,
    pub origin: TilePos,
    pub closed_ends: [bool; 2],
}

/// A looping emitter block. The entity it releases sits at the same tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedEmitter {
    pub pos: TilePos,
    pub note: Option<NoteId>,
}

/// What configuration a build settled on.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub width: i32,
    pub scroll_speed: Option<String>,
    pub tiles_per_beat: Option<u32>,
    pub effective_bpm: Option<f64>,
    pub period_frames: Option<u32>,
    pub sections: usize,
    pub placed_notes: usize,
    pub rejected_notes: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub succeeded: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub tiles: LevelTiles,
    pub tracks: Vec<PlacedTrack>,
    #[serde(default)]
    pub emitters: Vec<PlacedEmitter>,
    pub entities: SparseGrid<EntityPlacement>,
    pub summary: BuildSummary,
}

impl OptimizationResult {
    /// Seal a build. Success is derived from the diagnostics.
    pub fn finish(
        diagnostics: Diagnostics,
        tiles: LevelTiles,
        tracks: Vec<PlacedTrack>,
        emitters: Vec<PlacedEmitter>,
        entities: SparseGrid<EntityPlacement>,
        summary: BuildSummary,
    ) -> Self {
        Self {
            succeeded: !diagnostics.has_errors(),
            diagnostics: diagnostics.into_vec(),
            tiles,
            tracks,
            emitters,
            entities,
            summary,
        }
    }

    /// Diagnostics of one kind, in order.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }
}
