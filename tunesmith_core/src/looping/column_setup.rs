// Delivery column setups and their timing table.
//
// A delivery column lifts an entity from the rail to the emitter at
// `pitch_row`: a stack of straight track tiles, then an empty-air gap the
// entity falls through. Three kinds of gap exist: a plain drop, a parachute
// drop, and a drop onto a semisolid that holds the entity for a settle delay.
// The total delay from rail to emitter release is
//
//     straights * stack_tile_frames + fall(air, kind) + kind extra + emitter_frames
//
// `SetupTable` precomputes every `(stack height, delay)` pair once per build
// so the delivery solver can look up setups by exact delay.
//
// See also: `delivery.rs` which queries the table, `layout.rs` which draws
// the chosen setups.

use crate::config::{GameData, InstrumentRules};
use crate::physics::FallMode;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SetupKind {
    Drop,
    Parachute,
    Semisolid,
}

impl SetupKind {
    pub const ALL: [SetupKind; 3] = [SetupKind::Drop, SetupKind::Parachute, SetupKind::Semisolid];

    fn fall_mode(self) -> FallMode {
        match self {
            SetupKind::Parachute => FallMode::Parachute,
            SetupKind::Drop | SetupKind::Semisolid => FallMode::Normal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSetup {
    pub kind: SetupKind,
    /// Tiles between the rail and the emitter.
    pub height: i32,
    pub straights: i32,
    pub air: i32,
    /// Frames from leaving the rail to the emitter releasing the entity.
    pub delay: u32,
}

impl ColumnSetup {
    pub fn permitted_for(&self, rules: &InstrumentRules) -> bool {
        let kind_ok = match self.kind {
            SetupKind::Drop => true,
            SetupKind::Parachute => rules.allow_parachute,
            SetupKind::Semisolid => rules.allow_semisolid,
        };
        kind_ok && self.air <= rules.max_free_fall
    }
}

/// Setups keyed by `(height, delay)`, each list in (air ascending, kind)
/// order.
pub struct SetupTable {
    by_key: FxHashMap<(i32, u32), SmallVec<[ColumnSetup; 2]>>,
    /// Shortest delay available per height.
    min_delay: BTreeMap<i32, u32>,
}

impl SetupTable {
    pub fn new(data: &GameData) -> Self {
        let cfg = &data.looping;
        let mut by_key: FxHashMap<(i32, u32), SmallVec<[ColumnSetup; 2]>> = FxHashMap::default();
        let mut min_delay = BTreeMap::new();

        for height in 1..=cfg.max_stack_height {
            for air in 0..=height.min(cfg.max_air_gap) {
                for kind in SetupKind::ALL {
                    // A zero gap is only a plain stack.
                    if air == 0 && kind != SetupKind::Drop {
                        continue;
                    }
                    let straights = height - air;
                    let extra = if kind == SetupKind::Semisolid {
                        data.physics.semisolid_settle_frames
                    } else {
                        0
                    };
                    let delay = straights as u32 * cfg.stack_tile_frames
                        + data.physics.fall_frames(air, kind.fall_mode())
                        + extra
                        + cfg.emitter_frames;
                    let setup = ColumnSetup {
                        kind,
                        height,
                        straights,
                        air,
                        delay,
                    };
                    by_key.entry((height, delay)).or_default().push(setup);
                    let slot = min_delay.entry(height).or_insert(delay);
                    *slot = (*slot).min(delay);
                }
            }
        }

        Self { by_key, min_delay }
    }

    pub fn lookup(&self, height: i32, delay: u32) -> &[ColumnSetup] {
        self.by_key
            .get(&(height, delay))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// First setup with this exact delay the instrument may use.
    pub fn find(&self, height: i32, delay: u32, rules: &InstrumentRules) -> Option<ColumnSetup> {
        self.lookup(height, delay)
            .iter()
            .find(|s| s.permitted_for(rules))
            .copied()
    }

    pub fn min_delay(&self, height: i32) -> Option<u32> {
        self.min_delay.get(&height).copied()
    }

    /// Every cached setup, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnSetup> + '_ {
        self.by_key.values().flat_map(|v| v.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::looping::delivery::DeliveryContext;
    use crate::types::{BeatTime, EntityKind, NoteTarget};

    #[test]
    fn delays_follow_the_formula() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        // Height 5, three tiles of parachute: 2*7 + 48 + 4.
        let found = table.lookup(5, 66);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, SetupKind::Parachute);
        assert_eq!(found[0].air, 3);
        // Height 5, two-tile drop or four-tile semisolid share 34 frames.
        let shared = table.lookup(5, 34);
        assert_eq!(shared.len(), 2);
        assert_eq!(shared[0].kind, SetupKind::Drop);
        assert_eq!(shared[1].kind, SetupKind::Semisolid);
    }

    #[test]
    fn every_entry_recomputes() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        for s in table.iter() {
            let mode = s.kind.fall_mode();
            let extra = if s.kind == SetupKind::Semisolid { 6 } else { 0 };
            let expected = s.straights as u32 * 7 + data.physics.fall_frames(s.air, mode) + extra + 4;
            assert_eq!(s.delay, expected);
            assert_eq!(s.straights + s.air, s.height);
            assert!(s.air <= data.looping.max_air_gap);
        }
    }

    #[test]
    fn instrument_filter() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        let thwomp = data.instrument_rules(EntityKind::Thwomp).unwrap();
        let goomba = data.instrument_rules(EntityKind::Goomba).unwrap();
        assert!(table.find(5, 66, thwomp).is_none());
        assert!(table.find(5, 66, goomba).is_some());
        assert_eq!(table.find(5, 34, thwomp).unwrap().kind, SetupKind::Drop);
    }

    #[test]
    fn delays_survive_scroll_conversion() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        let goomba = data.instrument_rules(EntityKind::Goomba).unwrap();
        for speed in &data.scroll_speeds {
            let ctx = DeliveryContext {
                data: &data,
                table: &table,
                speed,
                level_height: 27,
            };
            let mut seen = 0;
            for pitch in 4..20 {
                let note = NoteTarget::new(0, pitch, BeatTime::whole(0), EntityKind::Goomba);
                for frame in [0u32, 30, 77, 119] {
                    let Ok(found) = ctx.candidates(&note, frame, goomba) else {
                        continue;
                    };
                    for c in found {
                        // Rail time left over once the setup has run its delay.
                        let travel = data.looping.load_frames + frame - c.setup.delay;
                        assert_eq!(speed.tiles_for_frames(travel as i64), Some(c.x), "{}", speed.name);
                        assert_eq!(speed.frames_for_tiles(c.x), Some(travel));
                        seen += 1;
                    }
                }
            }
            assert!(seen > 0, "no candidates at {}", speed.name);
        }
    }

    #[test]
    fn min_delay_per_height() {
        let data = GameData::default();
        let table = SetupTable::new(&data);
        // One straight: 7 + 4. One-tile drop: 5 + 4.
        assert_eq!(table.min_delay(1), Some(9));
        assert_eq!(table.min_delay(5), Some(28));
        assert_eq!(table.min_delay(0), None);
    }
}
