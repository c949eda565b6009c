// Data-driven game data catalog.
//
// Every tunable constant the optimizers read lives in `GameData`: the physics
// constants, the scroll-speed table, per-instrument build rules, the
// traditional setup table, the looping and traditional layout parameters, and
// the search caps. The optimizers never use magic numbers; they read from
// here. `GameData::default()` is the built-in catalog and
// `GameData::from_json()` loads an override (missing fields fall back to the
// defaults, so a catalog file only needs to name what it changes).
//
// The track-piece catalog is not part of `GameData`: its geometry is fixed by
// the game, see `track/template.rs`.
//
// See also: `physics.rs` for the fall simulation and scroll conversions that
// consume `PhysicsConfig` and `ScrollSpeed`, `looping/delivery.rs` for the
// setup table built from `LoopingConfig`, `traditional/mod.rs` for the
// configuration search driven by `TraditionalConfig`.
//
// **Critical constraint: determinism.** Identical game data and identical
// requests must produce identical results, so every keyed collection here is
// a `BTreeMap` or an ordered `Vec`.

use crate::error::{BuildError, Result};
use crate::grid::CollisionBox;
use crate::physics::{FallMode, ScrollSpeed};
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Vertical motion constants, in subpixels and frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Added to the fall velocity every frame.
    pub gravity: u32,
    pub terminal_normal: u32,
    pub terminal_wing: u32,
    pub terminal_parachute: u32,
    /// Frames an entity spends settling on a semisolid before it drops.
    pub semisolid_settle_frames: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 48,
            terminal_normal: 64,
            terminal_wing: 32,
            terminal_parachute: 16,
            semisolid_settle_frames: 6,
        }
    }
}

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

/// What each instrument entity tolerates when it is built into a structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRules {
    /// How many tiles a traditional structure may be extended upward when it
    /// joins a cell.
    pub max_extension: i32,
    pub allow_parachute: bool,
    pub allow_semisolid: bool,
    pub allow_wing: bool,
    /// Longest free fall (tiles) that still lands on the note block cleanly.
    pub max_free_fall: i32,
    /// Oversized entities need a two-column shaft.
    pub oversized: bool,
}

impl InstrumentRules {
    fn standard() -> Self {
        Self {
            max_extension: 6,
            allow_parachute: true,
            allow_semisolid: true,
            allow_wing: true,
            max_free_fall: 8,
            oversized: false,
        }
    }
}

fn default_instruments() -> BTreeMap<EntityKind, InstrumentRules> {
    let mut map = BTreeMap::new();
    for kind in EntityKind::ALL {
        let rules = match kind {
            EntityKind::Spiny => InstrumentRules {
                allow_semisolid: false,
                ..InstrumentRules::standard()
            },
            EntityKind::Bobomb => InstrumentRules {
                allow_wing: false,
                max_free_fall: 6,
                ..InstrumentRules::standard()
            },
            EntityKind::DryBones => InstrumentRules {
                max_extension: 5,
                ..InstrumentRules::standard()
            },
            EntityKind::Thwomp => InstrumentRules {
                max_extension: 4,
                allow_parachute: false,
                allow_semisolid: false,
                allow_wing: false,
                max_free_fall: 8,
                oversized: true,
            },
            _ => InstrumentRules::standard(),
        };
        map.insert(kind, rules);
    }
    map
}

// ---------------------------------------------------------------------------
// Traditional setups
// ---------------------------------------------------------------------------

/// One structural variant of a traditional note structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraditionalSetup {
    pub name: String,
    /// Tiles between the spawn row and the note block.
    pub drop: i32,
    pub fall: FallMode,
    /// A semisolid catches the entity first and adds the settle delay.
    pub semisolid: bool,
}

impl TraditionalSetup {
    fn new(name: &str, drop: i32, fall: FallMode, semisolid: bool) -> Self {
        Self {
            name: name.to_string(),
            drop,
            fall,
            semisolid,
        }
    }

    /// Whether an instrument may use this setup at all.
    pub fn permitted_for(&self, rules: &InstrumentRules) -> bool {
        let fall_ok = match self.fall {
            FallMode::Normal => true,
            FallMode::Wing => rules.allow_wing,
            FallMode::Parachute => rules.allow_parachute,
        };
        fall_ok && (!self.semisolid || rules.allow_semisolid) && self.drop <= rules.max_free_fall
    }

    /// Frames from spawn to the note block sounding.
    pub fn delay(&self, physics: &PhysicsConfig) -> u32 {
        let settle = if self.semisolid {
            physics.semisolid_settle_frames
        } else {
            0
        };
        physics.fall_frames(self.drop, self.fall) + settle
    }
}

fn default_traditional_setups() -> Vec<TraditionalSetup> {
    use FallMode::*;
    vec![
        TraditionalSetup::new("drop-3", 3, Normal, false),
        TraditionalSetup::new("drop-1", 1, Normal, false),
        TraditionalSetup::new("drop-2", 2, Normal, false),
        TraditionalSetup::new("drop-4", 4, Normal, false),
        TraditionalSetup::new("drop-5", 5, Normal, false),
        TraditionalSetup::new("drop-6", 6, Normal, false),
        TraditionalSetup::new("drop-8", 8, Normal, false),
        TraditionalSetup::new("parachute-1", 1, Parachute, false),
        TraditionalSetup::new("parachute-2", 2, Parachute, false),
        TraditionalSetup::new("parachute-3", 3, Parachute, false),
        TraditionalSetup::new("wing-2", 2, Wing, false),
        TraditionalSetup::new("wing-4", 4, Wing, false),
        TraditionalSetup::new("semisolid-2", 2, Normal, true),
        TraditionalSetup::new("semisolid-4", 4, Normal, true),
    ]
}

fn default_scroll_speeds() -> Vec<ScrollSpeed> {
    vec![
        ScrollSpeed::new("autoscroll-slow", 32, true),
        ScrollSpeed::new("autoscroll-medium", 64, true),
        ScrollSpeed::new("autoscroll-fast", 128, true),
        ScrollSpeed::new("walk", 24, false),
        ScrollSpeed::new("run", 40, false),
        ScrollSpeed::new("sprint", 56, false),
    ]
}

// ---------------------------------------------------------------------------
// Pipeline tunables
// ---------------------------------------------------------------------------

/// Layout and timing parameters of the looping contraption.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopingConfig {
    /// Width of the track-loop area at the start of every section.
    pub loop_zone_width: i32,
    /// Columns per heuristic lane in the loop area.
    pub lane_width: i32,
    /// Shortest leg (frames) worth building between the two stubs.
    pub min_leg_cost: u32,
    /// Rectangles (relative to the loop area) the leg must stay out of.
    pub reserved_zones: Vec<CollisionBox>,
    /// Row of the horizontal delivery rail.
    pub rail_row: i32,
    /// Columns available to the delivery stacks of one section.
    pub delivery_width: i32,
    /// Frames to climb one straight stack tile.
    pub stack_tile_frames: u32,
    /// Frames the emitter track takes to release the entity.
    pub emitter_frames: u32,
    /// Frames between the loop releasing an entity and the rail carrying it
    /// past column 0 of the delivery zone.
    pub load_frames: u32,
    /// Longest empty-air gap allowed in a stack.
    pub max_air_gap: i32,
    /// Tallest stack (tiles between rail and emitter).
    pub max_stack_height: i32,
}

impl Default for LoopingConfig {
    fn default() -> Self {
        Self {
            loop_zone_width: 12,
            lane_width: 4,
            min_leg_cost: 42,
            reserved_zones: vec![CollisionBox::new(0, 0, 11, 3)],
            rail_row: 2,
            delivery_width: 48,
            stack_tile_frames: 7,
            emitter_frames: 4,
            load_frames: 90,
            max_air_gap: 4,
            max_stack_height: 20,
        }
    }
}

/// Layout parameters of the traditional pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraditionalConfig {
    /// Column of beat 0.
    pub lead_in_columns: i32,
    /// Columns at the level start where nothing may be built.
    pub start_zone_columns: i32,
    /// Empty columns required after the last note.
    pub tail_columns: i32,
    pub max_tiles_per_beat: u32,
}

impl Default for TraditionalConfig {
    fn default() -> Self {
        Self {
            lead_in_columns: 10,
            start_zone_columns: 7,
            tail_columns: 4,
            max_tiles_per_beat: 16,
        }
    }
}

/// Iteration caps. Every search loop in the optimizers is bounded by one of
/// these; they guarantee termination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Pieces one greedy track build may place.
    pub max_build_steps: usize,
    /// Nodes one conflict-resolution BFS may expand.
    pub max_search_nodes: usize,
    /// Times one structure may be revisited by conflict resolution.
    pub max_resolution_passes: usize,
    /// Traditional configurations evaluated per request.
    pub max_configurations: usize,
    /// Widest spacer tried when synchronizing a looping section.
    pub sync_width_cap: i32,
    /// Times a displaced looping note may be re-enqueued.
    pub max_section_attempts: u32,
    /// Paths followed by `walk_cycle` before giving up.
    pub max_walk_steps: usize,
    /// Largest total the duration solver tabulates.
    pub duration_cache_limit: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_build_steps: 64,
            max_search_nodes: 200,
            max_resolution_passes: 3,
            max_configurations: 12,
            sync_width_cap: 32,
            max_section_attempts: 2,
            max_walk_steps: 512,
            duration_cache_limit: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// GameData
// ---------------------------------------------------------------------------

/// The static catalog consumed by both optimizers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameData {
    pub physics: PhysicsConfig,
    /// Ordered; the index is the tie-break rank in configuration search.
    pub scroll_speeds: Vec<ScrollSpeed>,
    pub instruments: BTreeMap<EntityKind, InstrumentRules>,
    /// Index 0 is the default setup every structure starts with.
    pub traditional_setups: Vec<TraditionalSetup>,
    pub looping: LoopingConfig,
    pub traditional: TraditionalConfig,
    pub limits: SearchLimits,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            scroll_speeds: default_scroll_speeds(),
            instruments: default_instruments(),
            traditional_setups: default_traditional_setups(),
            looping: LoopingConfig::default(),
            traditional: TraditionalConfig::default(),
            limits: SearchLimits::default(),
        }
    }
}

impl GameData {
    /// Parse a catalog override and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let data: GameData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// Reject catalogs the optimizers cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.physics.gravity == 0 || self.physics.terminal_parachute == 0 {
            return Err(BuildError::invalid("fall physics must accelerate"));
        }
        if let Some(speed) = self.scroll_speeds.iter().find(|s| s.subpixels_per_frame == 0) {
            return Err(BuildError::invalid(format!(
                "scroll speed '{}' does not move",
                speed.name
            )));
        }
        if self.traditional_setups.is_empty() {
            return Err(BuildError::invalid("traditional setup table is empty"));
        }
        if self.looping.lane_width <= 0 || self.looping.loop_zone_width <= 0 {
            return Err(BuildError::invalid("loop zone dimensions must be positive"));
        }
        Ok(())
    }

    pub fn instrument_rules(&self, kind: EntityKind) -> Result<&InstrumentRules> {
        self.instruments
            .get(&kind)
            .ok_or(BuildError::UnknownInstrument(kind))
    }

    pub fn scroll_speed(&self, name: &str) -> Result<&ScrollSpeed> {
        self.scroll_speeds
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BuildError::UnknownScrollSpeed(name.to_string()))
    }
}
