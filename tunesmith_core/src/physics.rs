// Fall simulation and scroll-speed time conversions.
//
// Positions are in subpixels (256 per tile) and time is in frames (60 per
// second). A falling entity starts at rest; every frame its velocity grows by
// `gravity` up to the terminal velocity of its fall mode, then its position
// advances by the velocity. `fall_frames(n)` is the first frame on which the
// entity has covered `n` tiles. The simulation is integer-exact, so the same
// inputs always give the same frame count.
//
// Scroll speeds convert between columns and frames. The conversion is exact
// only when the subpixel distance divides evenly by the speed; the helpers
// return `None` otherwise. There is no rounding tolerance anywhere: a timing
// that is off by one frame is a wrong note.
//
// See also: `config.rs` for `PhysicsConfig`, `looping/delivery.rs` and
// `traditional/structure.rs` which turn these into setup delays.

use crate::config::PhysicsConfig;
use serde::{Deserialize, Serialize};

/// Subpixels in one tile.
pub const SUBPIXELS_PER_TILE: u32 = 256;

/// Frames per beat numerator: a beat at `bpm` lasts `FRAMES_PER_MINUTE / bpm`.
pub const FRAMES_PER_MINUTE: f64 = 3600.0;

/// How an entity falls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FallMode {
    Normal,
    Wing,
    Parachute,
}

impl PhysicsConfig {
    pub fn terminal_velocity(&self, mode: FallMode) -> u32 {
        match mode {
            FallMode::Normal => self.terminal_normal,
            FallMode::Wing => self.terminal_wing,
            FallMode::Parachute => self.terminal_parachute,
        }
    }

    /// Frames needed to fall `tiles` tiles from rest. Zero tiles take zero
    /// frames.
    pub fn fall_frames(&self, tiles: i32, mode: FallMode) -> u32 {
        if tiles <= 0 {
            return 0;
        }
        let target = tiles as u64 * SUBPIXELS_PER_TILE as u64;
        let terminal = self.terminal_velocity(mode).max(1) as u64;
        let gravity = self.gravity.max(1) as u64;
        let mut velocity = 0u64;
        let mut position = 0u64;
        let mut frames = 0u32;
        while position < target {
            velocity = (velocity + gravity).min(terminal);
            position += velocity;
            frames += 1;
        }
        frames
    }
}

// ---------------------------------------------------------------------------
// Scroll speeds
// ---------------------------------------------------------------------------

/// A horizontal scroll method and its speed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollSpeed {
    pub name: String,
    pub subpixels_per_frame: u32,
    /// Autoscroll speeds move the screen by themselves; the others are the
    /// speed of a player holding a direction.
    pub autoscroll: bool,
}

impl ScrollSpeed {
    pub fn new(name: &str, subpixels_per_frame: u32, autoscroll: bool) -> Self {
        Self {
            name: name.to_string(),
            subpixels_per_frame,
            autoscroll,
        }
    }

    /// Frames to scroll across `tiles` columns, if that is a whole number.
    pub fn frames_for_tiles(&self, tiles: i32) -> Option<u32> {
        if tiles < 0 || self.subpixels_per_frame == 0 {
            return None;
        }
        let distance = tiles as u64 * SUBPIXELS_PER_TILE as u64;
        let spf = self.subpixels_per_frame as u64;
        if distance % spf == 0 {
            u32::try_from(distance / spf).ok()
        } else {
            None
        }
    }

    /// Signed column distance covered in `frames` frames, if whole.
    pub fn tiles_for_frames(&self, frames: i64) -> Option<i32> {
        let distance = frames * self.subpixels_per_frame as i64;
        if distance % SUBPIXELS_PER_TILE as i64 == 0 {
            i32::try_from(distance / SUBPIXELS_PER_TILE as i64).ok()
        } else {
            None
        }
    }

    /// Tempo heard when notes are `tiles_per_beat` columns apart.
    pub fn effective_bpm(&self, tiles_per_beat: u32) -> f64 {
        if tiles_per_beat == 0 {
            return 0.0;
        }
        FRAMES_PER_MINUTE * self.subpixels_per_frame as f64
            / (SUBPIXELS_PER_TILE as f64 * tiles_per_beat as f64)
    }
}
