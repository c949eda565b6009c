// Delivery timing: which columns can realize a note.
//
// An entity released by the loop rides the rail and passes delivery column
// `x` after `load_frames + frames(x)`, where `frames(x)` is the scroll time
// across `x` columns. It must then climb and drop for exactly
//
//     D(x) = load_frames + T - frames(x)
//
// frames so the emitter releases it on the note's frame `T` (taken modulo the
// loop period). A column is admissible when `frames(x)` is exact, `D(x)` is a
// delay in the setup table for the note's stack height, and that setup is
// legal for the instrument. Columns are scanned ascending, so candidate
// lists are sorted.
//
// See also: `column_setup.rs` for the table, `assignment.rs` which picks one
// candidate per note.

use super::column_setup::{ColumnSetup, SetupTable};
use crate::config::{GameData, InstrumentRules};
use crate::physics::ScrollSpeed;
use crate::result::DiagnosticKind;
use crate::types::NoteTarget;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryCandidate {
    /// Column relative to the delivery zone origin.
    pub x: i32,
    pub setup: ColumnSetup,
}

/// Why a note has no candidates at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimingFailure {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl TimingFailure {
    fn new(kind: DiagnosticKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// Inputs shared by every note of one build.
pub struct DeliveryContext<'a> {
    pub data: &'a GameData,
    pub table: &'a SetupTable,
    pub speed: &'a ScrollSpeed,
    pub level_height: i32,
}

impl DeliveryContext<'_> {
    /// Admissible columns for a note whose in-period frame is `frame`.
    pub fn candidates(
        &self,
        note: &NoteTarget,
        frame: u32,
        rules: &InstrumentRules,
    ) -> Result<Vec<DeliveryCandidate>, TimingFailure> {
        let cfg = &self.data.looping;
        let height = note.pitch_row - cfg.rail_row - 1;
        if height < 1 || note.pitch_row >= self.level_height || height > cfg.max_stack_height {
            return Err(TimingFailure::new(
                DiagnosticKind::OutOfBoundsVertical,
                format!(
                    "pitch row {} needs a stack of {height} tiles (allowed 1..={}, level height {})",
                    note.pitch_row, cfg.max_stack_height, self.level_height
                ),
            ));
        }

        let min_delay = self.table.min_delay(height).unwrap_or(u32::MAX) as i64;
        let budget = cfg.load_frames as i64 + frame as i64;
        if budget < min_delay {
            return Err(TimingFailure::new(
                DiagnosticKind::OutOfBoundsHorizontal,
                format!("only {budget} frames available, a {height}-tile stack needs {min_delay}"),
            ));
        }

        let mut out = Vec::new();
        for x in 0..cfg.delivery_width {
            let Some(travel) = self.speed.frames_for_tiles(x) else {
                continue;
            };
            let delay = budget - travel as i64;
            if delay < min_delay {
                break;
            }
            if let Some(setup) = self.table.find(height, delay as u32, rules) {
                out.push(DeliveryCandidate { x, setup });
            }
        }

        if out.is_empty() {
            return Err(TimingFailure::new(
                DiagnosticKind::SetupNotFound,
                format!(
                    "no {height}-tile setup for {:?} matches any column within {} tiles",
                    note.instrument, cfg.delivery_width
                ),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::looping::column_setup::SetupKind;
    use crate::types::{BeatTime, EntityKind};

    fn note(pitch_row: i32) -> NoteTarget {
        NoteTarget::new(0, pitch_row, BeatTime::whole(0), EntityKind::Goomba)
    }

    fn columns(c: &[DeliveryCandidate]) -> Vec<i32> {
        c.iter().map(|c| c.x).collect()
    }

    #[test]
    fn medium_speed_candidates() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        let speed = data.scroll_speed("autoscroll-medium").unwrap();
        let ctx = DeliveryContext {
            data: &data,
            table: &table,
            speed,
            level_height: 27,
        };
        let rules = data.instrument_rules(EntityKind::Goomba).unwrap();
        let found = ctx.candidates(&note(8), 0, rules).unwrap();
        assert_eq!(columns(&found), vec![6, 14]);
        assert_eq!(found[0].setup.kind, SetupKind::Parachute);
        assert_eq!(found[1].setup.kind, SetupKind::Drop);

        let late = ctx.candidates(&note(9), 90, rules).unwrap();
        assert_eq!(columns(&late), vec![29, 34]);
    }

    #[test]
    fn candidate_timing_is_exact() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        let rules = data.instrument_rules(EntityKind::Goomba).unwrap();
        for speed in &data.scroll_speeds {
            let ctx = DeliveryContext {
                data: &data,
                table: &table,
                speed,
                level_height: 27,
            };
            for pitch in 4..20 {
                for frame in [0u32, 17, 45, 119] {
                    let Ok(found) = ctx.candidates(&note(pitch), frame, rules) else {
                        continue;
                    };
                    for c in found {
                        let travel = speed.frames_for_tiles(c.x).unwrap();
                        assert_eq!(travel + c.setup.delay, data.looping.load_frames + frame);
                    }
                }
            }
        }
    }

    #[test]
    fn vertical_bounds() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        let speed = data.scroll_speed("autoscroll-medium").unwrap();
        let ctx = DeliveryContext {
            data: &data,
            table: &table,
            speed,
            level_height: 27,
        };
        let rules = data.instrument_rules(EntityKind::Goomba).unwrap();
        for pitch in [3, 27, 24] {
            let err = ctx.candidates(&note(pitch), 0, rules).unwrap_err();
            assert_eq!(err.kind, DiagnosticKind::OutOfBoundsVertical, "pitch {pitch}");
        }
    }

    #[test]
    fn no_load_time_is_horizontal() {
        let mut data = GameData::default();
        data.looping.load_frames = 0;
        let table = SetupTable::new(&data);
        let speed = data.scroll_speed("autoscroll-medium").unwrap();
        let ctx = DeliveryContext {
            data: &data,
            table: &table,
            speed,
            level_height: 27,
        };
        let rules = data.instrument_rules(EntityKind::Goomba).unwrap();
        let err = ctx.candidates(&note(10), 5, rules).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::OutOfBoundsHorizontal);
    }

    #[test]
    fn narrow_zone_without_legal_setup() {
        let mut data = GameData::default();
        data.looping.delivery_width = 10;
        let table = SetupTable::new(&data);
        let speed = data.scroll_speed("autoscroll-medium").unwrap();
        let ctx = DeliveryContext {
            data: &data,
            table: &table,
            speed,
            level_height: 27,
        };
        // Only column 6 fits, and it needs a parachute.
        let thwomp = data.instrument_rules(EntityKind::Thwomp).unwrap();
        let err = ctx.candidates(&note(8), 0, thwomp).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::SetupNotFound);
    }
}
