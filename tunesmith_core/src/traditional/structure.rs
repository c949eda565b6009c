// Note structures: the per-note building block of a traditional level.
//
// A structure is a narrow shaft. The instrument entity spawns near the top,
// falls `drop` tiles onto a note block at the note's pitch row, and the block
// sounds. Walls flank the shaft and a cap closes it:
//
//     # C #      top = y + drop + 2
//     # o #      spawn row y + drop + 1
//     # . #
//     # N #      note block at (x, y)
//
// Oversized instruments get a two-column shaft, so the right wall moves to
// `x + 2`.
//
// Every structure starts on setup 0. Another setup changes the fall time, and
// the structure slides horizontally to compensate: a shorter fall means the
// entity must spawn later, so further right. The shift is only usable when it
// is a whole number of columns at the chosen scroll speed (`SetupPalette`).
//
// See also: `context.rs` which indexes structures by column, `conflict.rs`
// which moves them between setups.

use crate::config::{GameData, InstrumentRules, TraditionalSetup};
use crate::error::{BuildError, Result};
use crate::grid::CollisionBox;
use crate::physics::ScrollSpeed;
use crate::types::{NoteTarget, TilePos};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u32);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structure#{}", self.0)
    }
}

/// Placement of a blueprint in the level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Structure {
    /// The note block tile.
    pub origin: TilePos,
    pub bbox: CollisionBox,
}

impl Structure {
    pub fn blueprint(origin: TilePos, setup: &TraditionalSetup, rules: &InstrumentRules) -> Self {
        let right = origin.x + if rules.oversized { 2 } else { 1 };
        let top = Self::top_row(origin.y, setup);
        Self {
            origin,
            bbox: CollisionBox::new(origin.x - 1, origin.y, right, top),
        }
    }

    /// Cap row of a structure whose note block is on `pitch_row`.
    pub fn top_row(pitch_row: i32, setup: &TraditionalSetup) -> i32 {
        pitch_row + setup.drop + 2
    }

    pub fn top(&self) -> i32 {
        self.bbox.y1
    }

    pub fn left_wall(&self) -> i32 {
        self.bbox.x0
    }

    pub fn right_wall(&self) -> i32 {
        self.bbox.x1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NoteStructure {
    pub id: StructureId,
    pub structure: Structure,
    pub note: NoteTarget,
    /// Column of the note block under setup 0.
    pub base_column: i32,
    /// Index into `GameData::traditional_setups`.
    pub setup: usize,
    pub rules: InstrumentRules,
}

impl NoteStructure {
    /// A structure on setup 0, which never shifts.
    pub fn new(id: StructureId, note: NoteTarget, base_column: i32, data: &GameData) -> Result<Self> {
        let rules = data.instrument_rules(note.instrument)?.clone();
        let structure = Structure::blueprint(TilePos::new(base_column, note.pitch_row), default_setup(data)?, &rules);
        Ok(Self {
            id,
            structure,
            note,
            base_column,
            setup: 0,
            rules,
        })
    }

    /// Switch to another setup and move to its shifted column. An
    /// inadmissible setup keeps the base column.
    pub fn apply_setup(&mut self, setup: usize, data: &GameData, palette: &SetupPalette) -> Result<()> {
        let variant = data
            .traditional_setups
            .get(setup)
            .ok_or_else(|| BuildError::invalid(format!("setup index {setup} out of range")))?;
        let x = self.base_column + palette.shift(setup).unwrap_or(0);
        self.setup = setup;
        self.structure = Structure::blueprint(TilePos::new(x, self.note.pitch_row), variant, &self.rules);
        Ok(())
    }

    /// Whether the current setup can be built at all under this palette.
    pub fn is_legal(&self, data: &GameData, palette: &SetupPalette) -> bool {
        palette.shift(self.setup).is_some()
            && data
                .traditional_setups
                .get(self.setup)
                .is_some_and(|s| s.permitted_for(&self.rules))
    }

    pub fn bbox(&self) -> &CollisionBox {
        &self.structure.bbox
    }

    /// Where the entity appears.
    pub fn spawn(&self, data: &GameData) -> TilePos {
        let drop = data.traditional_setups.get(self.setup).map_or(0, |s| s.drop);
        self.structure.origin.offset(0, drop + 1)
    }
}

/// Lowest cap row any setup the instrument may use reaches for a note on
/// `pitch_row`. `None` when the instrument may use no setup at all.
pub fn lowest_top(data: &GameData, pitch_row: i32, rules: &InstrumentRules) -> Option<i32> {
    data.traditional_setups
        .iter()
        .filter(|s| s.permitted_for(rules))
        .map(|s| Structure::top_row(pitch_row, s))
        .min()
}

fn default_setup(data: &GameData) -> Result<&TraditionalSetup> {
    data.traditional_setups
        .first()
        .ok_or_else(|| BuildError::invalid("traditional setup table is empty"))
}

/// Column shift of every setup under one scroll speed; `None` where the shift
/// is not a whole number of columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupPalette {
    shifts: Vec<Option<i32>>,
}

impl SetupPalette {
    pub fn new(data: &GameData, speed: &ScrollSpeed) -> Self {
        let base = data
            .traditional_setups
            .first()
            .map_or(0, |s| s.delay(&data.physics)) as i64;
        let shifts = data
            .traditional_setups
            .iter()
            .map(|s| speed.tiles_for_frames(base - s.delay(&data.physics) as i64))
            .collect();
        Self { shifts }
    }

    pub fn shift(&self, setup: usize) -> Option<i32> {
        self.shifts.get(setup).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Setups with a whole-column shift, ascending.
    pub fn admissible(&self) -> impl Iterator<Item = usize> + '_ {
        self.shifts
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|_| i))
    }
}
