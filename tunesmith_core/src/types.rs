// Core types shared across both synthesis pipelines.
//
// Defines tile coordinates (`TilePos`), compass directions (`Dir8`), exact
// beat positions (`BeatTime`), the input `NoteTarget`, the instrument enum
// (`EntityKind`), level bounds, and the scroll preference enum. All types
// derive `Serialize`/`Deserialize` so requests and results round-trip through
// JSON at the CLI boundary.
//
// Coordinates: x grows to the right, y grows upward, row 0 is the ground row.
//
// **Critical constraint: determinism.** `TilePos` has a total order (x, then
// y) so it can key `BTreeMap`s; every registry that is iterated uses it.

use crate::physics::FRAMES_PER_MINUTE;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A tile position in the level grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Squared Euclidean distance, used by the inverse-square heuristic.
    pub fn distance_sq(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

impl std::ops::Add for TilePos {
    type Output = TilePos;
    fn add(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for TilePos {
    type Output = TilePos;
    fn sub(self, rhs: TilePos) -> TilePos {
        TilePos::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the eight compass directions. Used for the outward direction of a
/// track attachment point and for traversal headings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dir8 {
    E,
    NE,
    N,
    NW,
    W,
    SW,
    S,
    SE,
}

impl Dir8 {
    pub const ALL: [Dir8; 8] = [
        Dir8::E,
        Dir8::NE,
        Dir8::N,
        Dir8::NW,
        Dir8::W,
        Dir8::SW,
        Dir8::S,
        Dir8::SE,
    ];

    /// Index in 45° steps counter-clockwise from east.
    pub fn octant(self) -> i32 {
        self as i32
    }

    pub fn from_octant(octant: i32) -> Dir8 {
        Dir8::ALL[octant.rem_euclid(8) as usize]
    }

    pub fn opposite(self) -> Dir8 {
        Dir8::from_octant(self.octant() + 4)
    }

    /// Signed octant difference from `self` to `other`, in -3..=4.
    pub fn turn_to(self, other: Dir8) -> i32 {
        let d = (other.octant() - self.octant()).rem_euclid(8);
        if d > 4 { d - 8 } else { d }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Dir8::N | Dir8::S)
    }
}

/// Level size budget in tiles. Height is the vertical playable height: rows
/// `0..height` are usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelBounds {
    pub width: i32,
    pub height: i32,
}

impl LevelBounds {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

// ---------------------------------------------------------------------------
// Musical input
// ---------------------------------------------------------------------------

/// Identifier of a note in the caller's input. Diagnostics refer to notes by
/// this id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoteId(pub u32);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note#{}", self.0)
    }
}

/// An exact beat position `num / den`, kept reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawBeat", into = "RawBeat")]
pub struct BeatTime {
    num: u32,
    den: u32,
}

#[derive(Serialize, Deserialize)]
struct RawBeat {
    num: u32,
    #[serde(default = "one")]
    den: u32,
}

fn one() -> u32 {
    1
}

impl From<RawBeat> for BeatTime {
    fn from(raw: RawBeat) -> Self {
        BeatTime::new(raw.num, raw.den)
    }
}

impl From<BeatTime> for RawBeat {
    fn from(beat: BeatTime) -> Self {
        RawBeat {
            num: beat.num,
            den: beat.den,
        }
    }
}

impl BeatTime {
    /// Build a reduced beat time. A zero denominator is treated as 1.
    pub fn new(num: u32, den: u32) -> Self {
        let den = den.max(1);
        let g = gcd(num as u64, den as u64).max(1) as u32;
        Self {
            num: num / g,
            den: den / g,
        }
    }

    pub fn whole(beats: u32) -> Self {
        Self::new(beats, 1)
    }

    pub fn num(self) -> u32 {
        self.num
    }

    pub fn den(self) -> u32 {
        self.den
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Beat position times an integer multiplier, if it lands on an integer.
    pub fn scaled_exact(self, multiplier: u32) -> Option<u32> {
        let total = self.num as u64 * multiplier as u64;
        if total % self.den as u64 == 0 {
            u32::try_from(total / self.den as u64).ok()
        } else {
            None
        }
    }

    /// Frame at which this beat sounds for the given tempo, rounded to the
    /// nearest frame.
    pub fn to_frames(self, tempo_bpm: f64) -> u32 {
        (self.as_f64() * FRAMES_PER_MINUTE / tempo_bpm).round().max(0.0) as u32
    }
}

impl PartialOrd for BeatTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BeatTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.num as u64 * other.den as u64).cmp(&(other.num as u64 * self.den as u64))
    }
}

pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

pub fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// The instruments. Each kind is a placeable entity whose landing on a note
/// block produces its sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Goomba,
    GreenKoopa,
    RedKoopa,
    BuzzyBeetle,
    Spiny,
    Bobomb,
    DryBones,
    Thwomp,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Goomba,
        EntityKind::GreenKoopa,
        EntityKind::RedKoopa,
        EntityKind::BuzzyBeetle,
        EntityKind::Spiny,
        EntityKind::Bobomb,
        EntityKind::DryBones,
        EntityKind::Thwomp,
    ];
}

/// One musical note to realize. Input only; never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTarget {
    pub id: NoteId,
    pub pitch_row: i32,
    pub time: BeatTime,
    pub instrument: EntityKind,
}

impl NoteTarget {
    pub fn new(id: u32, pitch_row: i32, time: BeatTime, instrument: EntityKind) -> Self {
        Self {
            id: NoteId(id),
            pitch_row,
            time,
            instrument,
        }
    }
}

/// Which scroll methods the traditional pipeline may choose from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollPreference {
    #[default]
    Any,
    Autoscroll,
    NonAutoscroll,
}

impl ScrollPreference {
    pub fn permits(self, autoscroll: bool) -> bool {
        match self {
            ScrollPreference::Any => true,
            ScrollPreference::Autoscroll => autoscroll,
            ScrollPreference::NonAutoscroll => !autoscroll,
        }
    }
}
