// Track graph subsystem.
//
// - `template.rs`: the immutable piece catalog and derived whitelists.
// - `map.rs`: `TrackMap`, the arena of placed tracks and traversal paths.
// - `legality.rs`: `can_add_track_to`, the placement gate.
// - `build.rs`: `build_with_score`, greedy scored line construction.
//
// The looping optimizer is the only consumer; see `looping/loop_body.rs`.

pub mod build;
pub mod legality;
pub mod map;
pub mod template;

pub use build::{BuildLimit, BuildOutcome, BuildStatus, CategoryQuotas, build_with_score, inverse_square_heuristic};
pub use legality::can_add_track_to;
pub use map::{PathId, Track, TrackId, TrackMap, WalkCycle};
pub use template::{TemplateId, TrackCatalog, TrackCategory, TrackTemplate};
