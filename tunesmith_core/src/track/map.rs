// Track map: placed track instances and their traversal paths.
//
// `TrackMap` owns every `Track` and `TrackPath` of one contraption in two
// arenas addressed by `TrackId` and `PathId`, plus a bounded occupancy grid
// of tile -> tracks. Tracks never hold references to each other; every link
// is an index into the arenas, so a map can be cloned as a snapshot.
//
// Each track owns two paths: `paths[a]` enters at attach `a` and leaves at
// the other attach. Following `next` from a path walks the rider's route:
// - leaving through an attached end continues on the neighbour's path that
//   enters at the shared attach;
// - leaving through a free or closed end turns around onto the same track's
//   other path.
// A single track is therefore a ring of two paths, and a line of tracks is
// one ring covering every track in both directions.
//
// Occupancy invariant: a tile holds more than one track only at a shared
// attachment point. The map itself does not judge legality; callers run
// `legality::can_add_track_to` first and `create_attached_track` trusts it.
//
// See also: `template.rs` for the templates, `legality.rs` for the gate,
// `build.rs` for greedy construction.
//
// **Critical constraint: determinism.** Ids are sequential in placement order
// and occupancy lists keep insertion order.

use super::template::{TemplateId, TrackCatalog, TrackCategory, TrackTemplate};
use crate::error::{BuildError, Result};
use crate::grid::BoundedGrid;
use crate::types::{Dir8, TilePos};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub u32);

/// One directed traversal of a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPath {
    pub track: TrackId,
    pub start_attach: u8,
    pub duration: u32,
    pub next: PathId,
    pub prev: PathId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub template: TemplateId,
    pub origin: TilePos,
    pub paths: [PathId; 2],
    /// Neighbour and its attach index, per own attach.
    pub links: [Option<(TrackId, u8)>; 2],
    pub closed_ends: [bool; 2],
    /// Set on the support placed by an air template.
    pub supports: Option<TrackId>,
}

impl Track {
    pub fn is_free(&self, attach: u8) -> bool {
        self.links[attach as usize].is_none() && !self.closed_ends[attach as usize]
    }
}

/// Result of one attachment: the new track and the frontier end a builder
/// continues from (the support's far end for air templates).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attached {
    pub track: TrackId,
    pub frontier: (TrackId, u8),
}

/// Length and duration of a closed walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkCycle {
    pub paths: usize,
    pub frames: u32,
}

#[derive(Clone, Debug)]
pub struct TrackMap {
    occupancy: BoundedGrid<SmallVec<[TrackId; 2]>>,
    tracks: Vec<Track>,
    paths: Vec<TrackPath>,
}

/// Tiles covered by `template` placed at `origin`.
pub fn footprint_at(template: &TrackTemplate, origin: TilePos) -> impl Iterator<Item = TilePos> + '_ {
    template.footprint.iter().map(move |&p| origin + p)
}

/// Origin a template must take so its attach `attach` lands on `at`.
pub fn origin_for(template: &TrackTemplate, attach: u8, at: TilePos) -> TilePos {
    at - template.attach[attach as usize].offset
}

impl TrackMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            occupancy: BoundedGrid::new(width, height),
            tracks: Vec::new(),
            paths: Vec::new(),
        }
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        self.occupancy.in_bounds(pos)
    }

    pub fn track(&self, id: TrackId) -> &Track {
        &self.tracks[id.0 as usize]
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn path(&self, id: PathId) -> &TrackPath {
        &self.paths[id.0 as usize]
    }

    pub fn occupants(&self, pos: TilePos) -> &[TrackId] {
        self.occupancy
            .cell(pos)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Absolute tile of a track's attach point.
    pub fn attach_pos(&self, catalog: &TrackCatalog, track: TrackId, attach: u8) -> Result<TilePos> {
        let t = self.track(track);
        let template = catalog.template(t.template)?;
        Ok(t.origin + template.attach[attach as usize].offset)
    }

    /// Place a free-standing track. Fails if any tile is out of bounds or
    /// already occupied.
    pub fn create_root_track(
        &mut self,
        catalog: &TrackCatalog,
        template: TemplateId,
        origin: TilePos,
    ) -> Result<TrackId> {
        let t = catalog.template(template)?;
        for tile in footprint_at(t, origin) {
            if !self.in_bounds(tile) || !self.occupants(tile).is_empty() {
                return Err(BuildError::invalid(format!(
                    "root track '{}' cannot be placed at {origin}",
                    t.name
                )));
            }
        }
        Ok(self.insert_track(t, origin))
    }

    /// Attach `template` by its attach `new_attach` to `existing`'s attach
    /// `existing_attach`. Assumes the caller checked legality.
    pub fn create_attached_track(
        &mut self,
        catalog: &TrackCatalog,
        existing: TrackId,
        existing_attach: u8,
        template: TemplateId,
        new_attach: u8,
    ) -> Result<Attached> {
        let at = self.attach_pos(catalog, existing, existing_attach)?;
        let t = catalog.template(template)?;
        let origin = origin_for(t, new_attach, at);
        let id = self.insert_track(t, origin);
        self.link(existing, existing_attach, id, new_attach);

        if let Some(support) = t.air_support {
            let s = catalog.template(support.template)?;
            let support_origin = origin + support.offset - s.attach[support.via_attach as usize].offset;
            let sid = self.insert_track(s, support_origin);
            self.tracks[sid.0 as usize].supports = Some(id);
            self.link(id, 1, sid, support.via_attach);
            return Ok(Attached {
                track: id,
                frontier: (sid, 1 - support.via_attach),
            });
        }

        Ok(Attached {
            track: id,
            frontier: (id, 1 - new_attach),
        })
    }

    pub fn set_closed_end(&mut self, track: TrackId, attach: u8) {
        self.tracks[track.0 as usize].closed_ends[attach as usize] = true;
    }

    fn insert_track(&mut self, template: &TrackTemplate, origin: TilePos) -> TrackId {
        let id = TrackId(self.tracks.len() as u32);
        let p0 = PathId(self.paths.len() as u32);
        let p1 = PathId(p0.0 + 1);
        // A lone track is a two-path ring.
        self.paths.push(TrackPath {
            track: id,
            start_attach: 0,
            duration: template.duration,
            next: p1,
            prev: p1,
        });
        self.paths.push(TrackPath {
            track: id,
            start_attach: 1,
            duration: template.duration,
            next: p0,
            prev: p0,
        });
        self.tracks.push(Track {
            id,
            template: template.id,
            origin,
            paths: [p0, p1],
            links: [None, None],
            closed_ends: [false, false],
            supports: None,
        });
        for tile in footprint_at(template, origin) {
            if let Some(cell) = self.occupancy.cell_mut(tile) {
                cell.push(id);
            }
        }
        id
    }

    /// Connect `a`'s attach `aa` to `b`'s attach `ba` and splice the paths.
    fn link(&mut self, a: TrackId, aa: u8, b: TrackId, ba: u8) {
        self.tracks[a.0 as usize].links[aa as usize] = Some((b, ba));
        self.tracks[b.0 as usize].links[ba as usize] = Some((a, aa));

        // Leaving a through aa means traversing the path that enters at 1 - aa.
        let a_out = self.track(a).paths[1 - aa as usize];
        let a_in = self.track(a).paths[aa as usize];
        let b_out = self.track(b).paths[1 - ba as usize];
        let b_in = self.track(b).paths[ba as usize];
        self.set_next(a_out, b_in);
        self.set_next(b_out, a_in);
    }

    fn set_next(&mut self, from: PathId, to: PathId) {
        self.paths[from.0 as usize].next = to;
        self.paths[to.0 as usize].prev = from;
    }

    /// Follow `next` from `start` until the walk returns. `None` if it does
    /// not close within `max_steps` paths.
    pub fn walk_cycle(&self, start: PathId, max_steps: usize) -> Option<WalkCycle> {
        let mut current = start;
        let mut frames = 0u32;
        for step in 1..=max_steps {
            let path = self.path(current);
            frames += path.duration;
            current = path.next;
            if current == start {
                return Some(WalkCycle { paths: step, frames });
            }
        }
        None
    }

    /// Tracks reached by walking away from `track` through its attach
    /// `through`, nearest first, as `(track, entry attach)`. Stops after
    /// `limit` tracks or at an unattached end.
    pub fn chain_from(&self, track: TrackId, through: u8, limit: usize) -> Vec<(TrackId, u8)> {
        let mut out = Vec::new();
        let mut link = self.track(track).links[through as usize];
        while let Some((next, entry)) = link {
            if out.len() >= limit || next == track {
                break;
            }
            out.push((next, entry));
            link = self.track(next).links[1 - entry as usize];
        }
        out
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh() -> TemplateId {
        TemplateId(0)
    }

    #[test]
    fn root_track_is_two_path_ring() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(10, 10);
        let root = map.create_root_track(&catalog, sh(), TilePos::new(1, 1)).unwrap();
        let cycle = map.walk_cycle(map.track(root).paths[0], 16).unwrap();
        assert_eq!(cycle.paths, 2);
        assert_eq!(cycle.frames, 42);
        assert_eq!(map.occupants(TilePos::new(3, 1)), &[root]);
    }

    #[test]
    fn root_out_of_bounds_is_rejected() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(4, 4);
        assert!(map.create_root_track(&catalog, sh(), TilePos::new(2, 0)).is_err());
    }

    #[test]
    fn attached_line_walks_both_directions() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(12, 6);
        let root = map.create_root_track(&catalog, sh(), TilePos::new(0, 2)).unwrap();
        let a = map.create_attached_track(&catalog, root, 1, sh(), 0).unwrap();
        assert_eq!(map.track(a.track).origin, TilePos::new(2, 2));
        assert_eq!(a.frontier, (a.track, 1));
        // Shared attach tile holds both tracks.
        assert_eq!(map.occupants(TilePos::new(2, 2)), &[root, a.track]);

        let cycle = map.walk_cycle(map.track(root).paths[0], 16).unwrap();
        assert_eq!(cycle.paths, 4);
        assert_eq!(cycle.frames, 84);
        // The walk is the same from any path.
        let other = map.walk_cycle(map.track(a.track).paths[1], 16).unwrap();
        assert_eq!(other, cycle);
    }

    #[test]
    fn air_template_places_support() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(12, 8);
        let root = map.create_root_track(&catalog, sh(), TilePos::new(0, 5)).unwrap();
        let air = map
            .create_attached_track(&catalog, root, 1, TemplateId(8), 0)
            .unwrap();
        let (support, far) = air.frontier;
        assert_eq!(map.track(support).supports, Some(air.track));
        assert_eq!(map.track(support).origin, TilePos::new(4, 3));
        assert_eq!(far, 1);
        assert_eq!(map.attach_pos(&catalog, support, 1).unwrap(), TilePos::new(6, 3));
        // root + air + support, both directions.
        let cycle = map.walk_cycle(map.track(root).paths[0], 16).unwrap();
        assert_eq!(cycle.paths, 6);
        assert_eq!(cycle.frames, 2 * (21 + 9 + 21));
    }

    #[test]
    fn chain_walks_back_from_end() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(12, 6);
        let root = map.create_root_track(&catalog, sh(), TilePos::new(0, 2)).unwrap();
        let a = map.create_attached_track(&catalog, root, 1, sh(), 0).unwrap();
        let b = map.create_attached_track(&catalog, a.track, 1, sh(), 0).unwrap();
        let chain = map.chain_from(b.track, 0, 8);
        assert_eq!(chain, vec![(a.track, 1), (root, 1)]);
        assert_eq!(map.chain_from(b.track, 0, 1).len(), 1);
    }

    #[test]
    fn walk_cycle_respects_cap() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(12, 6);
        let root = map.create_root_track(&catalog, sh(), TilePos::new(0, 2)).unwrap();
        map.create_attached_track(&catalog, root, 1, sh(), 0).unwrap();
        assert!(map.walk_cycle(map.track(root).paths[0], 3).is_none());
    }

    #[test]
    fn closed_end_is_not_free() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(6, 6);
        let root = map.create_root_track(&catalog, sh(), TilePos::new(0, 0)).unwrap();
        assert!(map.track(root).is_free(0));
        map.set_closed_end(root, 0);
        assert!(!map.track(root).is_free(0));
        assert!(map.track(root).is_free(1));
    }
}
