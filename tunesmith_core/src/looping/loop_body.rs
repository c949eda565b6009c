// Loop body: the bouncing track line that clocks a looping section.
//
// The body is a single line of track between two closed ends. A rider walks
// it end to end and back, so one cycle is twice the line's duration, and that
// cycle must be a whole number of loop periods.
//
// Construction, in a `TrackMap` the size of the loop zone:
// 1. A root stub (straight-h) at `(0, height - 2)`, closed at its west end.
// 2. A leg grown greedily from the root's east end under per-category quotas.
//    The leg duration `L` is the smallest total the duration solver can
//    realize, at least `min_leg_cost`, with `2 * (stubs + L)` a multiple of
//    the period. Every combination for `L` is tried in sorted order.
// 3. An end stub (first legal of straight-h, straight-v) closed at its far
//    end.
//
// The leg heuristic splits the zone into vertical lanes `lane_width` wide.
// Even lanes pull the leg downward, odd lanes pull it upward, so the line
// snakes across the zone. Positions outside the zone or inside a reserved
// rectangle are refused; spending the whole quota is the success sentinel.
//
// See also: `combinatorics.rs` for the solver, `track/build.rs` for the
// greedy builder.

use crate::combinatorics::{Combination, DurationSolver};
use crate::config::GameData;
use crate::error::Result;
use crate::grid::CollisionBox;
use crate::track::{
    BuildLimit, CategoryQuotas, TemplateId, TrackCatalog, TrackCategory, TrackId, TrackMap, WalkCycle,
    build_with_score, can_add_track_to,
};
use crate::types::TilePos;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct LoopBody {
    pub map: TrackMap,
    pub leg_frames: u32,
    pub leg: Combination,
    pub cycle: WalkCycle,
}

#[derive(Clone, Debug)]
pub enum LoopBodyOutcome {
    Built(LoopBody),
    /// No achievable leg length makes the cycle a multiple of the period.
    PeriodNotFound,
    /// Leg lengths exist but no combination could be laid out.
    PathfindFailed { leg_frames: u32 },
}

/// Lane-biased scoring for the leg.
struct LaneHeuristic<'a> {
    catalog: &'a TrackCatalog,
    width: i32,
    height: i32,
    lane_width: i32,
    reserved: &'a [CollisionBox],
    quota: [u32; 3],
}

impl LaneHeuristic<'_> {
    fn score(&self, pos: TilePos, history: &[TemplateId]) -> f64 {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return f64::NEG_INFINITY;
        }
        if self.reserved.iter().any(|r| r.contains(pos)) {
            return f64::NEG_INFINITY;
        }
        let mut used = [0u32; 3];
        for id in history {
            match self.catalog.get(*id).map(|t| t.category) {
                Some(TrackCategory::Straight) => used[0] += 1,
                Some(TrackCategory::Diagonal) => used[1] += 1,
                Some(TrackCategory::Curve) => used[2] += 1,
                _ => {}
            }
        }
        if used == self.quota {
            return f64::INFINITY;
        }
        let lane = pos.x / self.lane_width;
        if lane % 2 == 0 {
            (self.height - 1 - pos.y) as f64
        } else {
            pos.y as f64
        }
    }
}

pub fn build_loop_body(
    data: &GameData,
    catalog: &TrackCatalog,
    solver: &DurationSolver,
    period: u32,
    height: i32,
) -> Result<LoopBodyOutcome> {
    let cfg = &data.looping;
    let straight_h = catalog.by_name("straight-h")?;
    let straight_v = catalog.by_name("straight-v")?;
    let stub_frames = catalog.template(straight_h)?.duration + catalog.template(straight_v)?.duration;

    let Some(leg_frames) = find_leg_frames(solver, cfg.min_leg_cost, stub_frames, period) else {
        debug!(period, "no leg length closes the loop");
        return Ok(LoopBodyOutcome::PeriodNotFound);
    };
    debug!(period, leg_frames, "leg length chosen");

    let allowed = catalog.buildable();
    for combo in solver.combinations(leg_frames) {
        let quota = [
            combo.first().copied().unwrap_or(0),
            combo.get(1).copied().unwrap_or(0),
            combo.get(2).copied().unwrap_or(0),
        ];
        let mut map = TrackMap::new(cfg.loop_zone_width, height);
        let root = map.create_root_track(catalog, straight_h, TilePos::new(0, height - 2))?;
        map.set_closed_end(root, 0);

        let heuristic = LaneHeuristic {
            catalog,
            width: cfg.loop_zone_width,
            height,
            lane_width: cfg.lane_width,
            reserved: &cfg.reserved_zones,
            quota,
        };
        let outcome = build_with_score(
            &mut map,
            catalog,
            root,
            |pos, history| heuristic.score(pos, history),
            &allowed,
            BuildLimit::Quotas(CategoryQuotas::from_counts(&quota)),
            data.limits.max_build_steps,
        )?;
        if !outcome.status.succeeded() {
            debug!(?quota, status = ?outcome.status, "leg combination failed");
            continue;
        }

        if !attach_end_stub(&mut map, catalog, outcome.frontier.0, &[straight_h, straight_v])? {
            debug!(?quota, "no room for the end stub");
            continue;
        }

        let start = map.track(root).paths[0];
        let Some(cycle) = map.walk_cycle(start, data.limits.max_walk_steps) else {
            continue;
        };
        if period == 0 || cycle.frames % period != 0 {
            continue;
        }

        return Ok(LoopBodyOutcome::Built(LoopBody {
            map,
            leg_frames,
            leg: combo.clone(),
            cycle,
        }));
    }

    Ok(LoopBodyOutcome::PathfindFailed { leg_frames })
}

/// Smallest achievable leg `>= min_leg` whose round trip is whole periods.
fn find_leg_frames(solver: &DurationSolver, min_leg: u32, stub_frames: u32, period: u32) -> Option<u32> {
    if period == 0 {
        return None;
    }
    let mut desired = min_leg;
    loop {
        let leg = solver.nearest_loop_period(desired)?;
        if (2 * (stub_frames + leg)) % period == 0 {
            return Some(leg);
        }
        desired = leg + 1;
    }
}

/// Attach the first legal stub at the frontier's free end and close its far
/// end.
fn attach_end_stub(
    map: &mut TrackMap,
    catalog: &TrackCatalog,
    frontier: TrackId,
    stubs: &[TemplateId],
) -> Result<bool> {
    for &stub in stubs {
        for frontier_attach in 0..2u8 {
            if !map.track(frontier).is_free(frontier_attach) {
                continue;
            }
            for new_attach in 0..2u8 {
                if can_add_track_to(map, catalog, frontier, frontier_attach, stub, new_attach) {
                    let placed = map.create_attached_track(catalog, frontier, frontier_attach, stub, new_attach)?;
                    map.set_closed_end(placed.frontier.0, placed.frontier.1);
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver(catalog: &TrackCatalog) -> DurationSolver {
        DurationSolver::new(&catalog.unit_costs(), 600)
    }

    #[test]
    fn leg_for_two_second_period() {
        let catalog = TrackCatalog::standard();
        let solver = solver(&catalog);
        assert_eq!(find_leg_frames(&solver, 42, 42, 120), Some(78));
    }

    #[test]
    fn leg_search_runs_out_of_cache() {
        let catalog = TrackCatalog::standard();
        let small = DurationSolver::new(&catalog.unit_costs(), 60);
        assert_eq!(find_leg_frames(&small, 42, 42, 120), None);
    }

    #[test]
    fn builds_the_standard_loop() {
        let data = GameData::default();
        let catalog = TrackCatalog::standard();
        let solver = solver(&catalog);
        let outcome = build_loop_body(&data, &catalog, &solver, 120, 27).unwrap();
        let body = match outcome {
            LoopBodyOutcome::Built(body) => body,
            other => panic!("expected a loop body, got {other:?}"),
        };
        assert_eq!(body.leg_frames, 78);
        assert_eq!(body.leg.as_slice(), &[2, 0, 1]);
        assert_eq!(body.cycle.frames, 240);
        // root, two straights and a curve in some order, end stub.
        let tracks = body.map.tracks();
        assert_eq!(tracks.len(), 5);
        let name = |t: &crate::track::Track| catalog.get(t.template).unwrap().name.clone();
        assert_eq!(name(&tracks[0]), "straight-h");
        assert!(tracks[0].closed_ends[0]);
        let curves = tracks[1..4]
            .iter()
            .filter(|t| catalog.get(t.template).unwrap().category == TrackCategory::Curve)
            .count();
        assert_eq!(curves, 1);
        let end = &tracks[4];
        assert!(["straight-h", "straight-v"].contains(&name(end).as_str()));
        assert!(end.closed_ends.iter().any(|c| *c));
        assert_eq!(end.origin, TilePos::new(8, 21));
        for t in tracks {
            let template = catalog.get(t.template).unwrap();
            for pos in crate::track::map::footprint_at(template, t.origin) {
                assert!(pos.x >= 0 && pos.x < data.looping.loop_zone_width, "{pos:?}");
                assert!(pos.y >= 0 && pos.y < 27, "{pos:?}");
            }
        }
    }

    #[test]
    fn too_short_zone_fails_pathfinding() {
        let mut data = GameData::default();
        data.looping.loop_zone_width = 3;
        let catalog = TrackCatalog::standard();
        let solver = solver(&catalog);
        let outcome = build_loop_body(&data, &catalog, &solver, 120, 27).unwrap();
        assert!(matches!(outcome, LoopBodyOutcome::PathfindFailed { leg_frames: 78 }));
    }

    #[test]
    fn lane_heuristic_alternates() {
        let catalog = TrackCatalog::standard();
        let h = LaneHeuristic {
            catalog: &catalog,
            width: 12,
            height: 27,
            lane_width: 4,
            reserved: &[],
            quota: [1, 0, 0],
        };
        // Lane 0 prefers low rows, lane 1 high rows.
        assert!(h.score(TilePos::new(1, 3), &[]) > h.score(TilePos::new(1, 20), &[]));
        assert!(h.score(TilePos::new(5, 20), &[]) > h.score(TilePos::new(5, 3), &[]));
        assert_eq!(h.score(TilePos::new(12, 3), &[]), f64::NEG_INFINITY);
        assert_eq!(h.score(TilePos::new(5, 3), &[TemplateId(0)]), f64::INFINITY);
    }
}
