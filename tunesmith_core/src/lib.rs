// tunesmith_core: pure Rust note-to-level synthesis library.
//
// Turns a list of musical notes (pitch row, beat, instrument) into a playable
// level in which entities land on note blocks exactly in time. Two pipelines
// share the primitives below:
// - looping: a track contraption that replays a fixed-period pattern forever;
// - traditional: a scrolling level of note-block shafts, one per note.
//
// Module overview:
// - `types.rs`:         TilePos, Dir8, BeatTime, NoteTarget, EntityKind, LevelBounds.
// - `error.rs`:         BuildError, the fatal request/catalog errors.
// - `config.rs`:        GameData: physics, scroll speeds, instrument rules, setups, tunables, search caps.
// - `grid.rs`:          BoundedGrid, SparseGrid, CollisionBox with contact modes.
// - `physics.rs`:       Subpixel fall simulation and scroll-speed time conversions.
// - `combinatorics.rs`: DurationSolver, track-duration combinations by total.
// - `track/`:           Template catalog, arena track map, legality rules, greedy construction.
// - `looping/`:         Loop body, delivery timing, column assignment, sections, layout.
// - `traditional/`:     Configuration search, structures, conflict resolution, cells, rendering.
// - `result.rs`:        OptimizationResult, diagnostics, tile layers, entity placements.
//
// This crate does no I/O and installs no logging subscriber. It emits
// `tracing` events; the `tunesmith_cli` binary decides where they go.
//
// **Critical constraint: determinism.** A build is a pure function of
// `(GameData, request)`. Anything iterated uses `BTreeMap`/`BTreeSet` or an
// ordered `Vec`; hash maps (`rustc_hash`) are only used for lookups. Parallel
// traditional attempts are selected by rank, not completion order.

pub mod combinatorics;
pub mod config;
pub mod error;
pub mod grid;
pub mod looping;
pub mod physics;
pub mod result;
pub mod track;
pub mod traditional;
pub mod types;

pub use config::GameData;
pub use error::{BuildError, Result};
pub use looping::{LoopingOptimizer, LoopingRequest, LoopingSection};
pub use result::{Diagnostic, DiagnosticKind, OptimizationResult, Severity};
pub use traditional::{TraditionalOptimizer, TraditionalRequest};
pub use types::{BeatTime, EntityKind, LevelBounds, NoteId, NoteTarget, ScrollPreference, TilePos};
