// Track attachment legality.
//
// `can_add_track_to` is the single gate every track placement passes through.
// It answers yes or no; callers move on to their next candidate on a no.
// A placement is legal when all four rules hold:
//
// (a) Occupancy. Every tile of the new piece (and of its support, for air
//     pieces) is in bounds and empty, except the one tile shared with the
//     existing track at the attach point. That attach must be free: not
//     linked and not a closed end.
// (b) Whitelists. Each side's attach whitelist accepts the other.
// (c) Corrections. The game "corrects" a rider on certain sequences, which
//     breaks the timing. Forbidden: six identical diagonals in a row; a
//     straight-curve-straight run whose curve has its vertical end facing up;
//     a curve-straight-curve run whose two curves turn the same way (a tight
//     U-turn). Each pattern reads the same in both directions, so growing a
//     line from either end gives the same verdict.
// (d) Diagonal corners. A new diagonal may not have an attach point on the
//     same row as, and exactly three columns from, an attach point of an
//     unrelated diagonal when the two pieces' center lines cross.
//
// See also: `map.rs` for the arena being checked, `build.rs` which calls this
// for every candidate.

use super::map::{TrackId, TrackMap, footprint_at, origin_for};
use super::template::{TemplateId, TrackCatalog, TrackCategory, TrackTemplate};
use crate::types::{Dir8, TilePos};

/// Longest pattern the correction rules look at.
const CORRECTION_WINDOW: usize = 6;

/// Tiles a corner conflict requires between two diagonal attach points.
const CORNER_SPACING: i32 = 3;

pub fn can_add_track_to(
    map: &TrackMap,
    catalog: &TrackCatalog,
    existing: TrackId,
    existing_attach: u8,
    template: TemplateId,
    new_attach: u8,
) -> bool {
    if existing_attach > 1 || new_attach > 1 {
        return false;
    }
    let Some(track) = map.tracks().get(existing.0 as usize) else {
        return false;
    };
    if !track.is_free(existing_attach) {
        return false;
    }
    let (Some(et), Some(nt)) = (catalog.get(track.template), catalog.get(template)) else {
        return false;
    };

    // (b)
    if !et.accepts(existing_attach, nt.id, new_attach) || !nt.accepts(new_attach, et.id, existing_attach) {
        return false;
    }

    // (a)
    let at = track.origin + et.attach[existing_attach as usize].offset;
    let origin = origin_for(nt, new_attach, at);
    if !tiles_clear(map, footprint_at(nt, origin), Some((at, existing))) {
        return false;
    }
    if let Some(support) = nt.air_support {
        let Some(st) = catalog.get(support.template) else {
            return false;
        };
        let support_origin = origin + support.offset - st.attach[support.via_attach as usize].offset;
        let own: Vec<TilePos> = footprint_at(nt, origin).collect();
        if footprint_at(st, support_origin).any(|t| own.contains(&t))
            || !tiles_clear(map, footprint_at(st, support_origin), None)
        {
            return false;
        }
    }

    // (c)
    if creates_correction(map, catalog, existing, existing_attach, nt, new_attach) {
        return false;
    }

    // (d)
    if nt.category == TrackCategory::Diagonal
        && diagonal_corner_conflict(map, catalog, existing, nt, origin)
    {
        return false;
    }

    true
}

fn tiles_clear(
    map: &TrackMap,
    tiles: impl Iterator<Item = TilePos>,
    shared: Option<(TilePos, TrackId)>,
) -> bool {
    for tile in tiles {
        if !map.in_bounds(tile) {
            return false;
        }
        let occupants = map.occupants(tile);
        let allowed = match shared {
            Some((at, owner)) if at == tile => occupants.iter().all(|&t| t == owner),
            _ => occupants.is_empty(),
        };
        if !allowed {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Corrections
// ---------------------------------------------------------------------------

/// The pieces leading up to (and including) the new one, in travel order,
/// each with the attach it is entered at.
fn forward_sequence<'a>(
    map: &TrackMap,
    catalog: &'a TrackCatalog,
    existing: TrackId,
    existing_attach: u8,
    new_template: &'a TrackTemplate,
    new_attach: u8,
) -> Vec<(&'a TrackTemplate, u8)> {
    let behind = map.chain_from(existing, 1 - existing_attach, CORRECTION_WINDOW - 2);
    let mut seq: Vec<(&TrackTemplate, u8)> = Vec::with_capacity(behind.len() + 2);
    for &(track, away_entry) in behind.iter().rev() {
        if let Some(t) = catalog.get(map.track(track).template) {
            seq.push((t, 1 - away_entry));
        }
    }
    if let Some(t) = catalog.get(map.track(existing).template) {
        seq.push((t, 1 - existing_attach));
    }
    seq.push((new_template, new_attach));
    seq
}

fn creates_correction(
    map: &TrackMap,
    catalog: &TrackCatalog,
    existing: TrackId,
    existing_attach: u8,
    new_template: &TrackTemplate,
    new_attach: u8,
) -> bool {
    let seq = forward_sequence(map, catalog, existing, existing_attach, new_template, new_attach);
    let n = seq.len();

    if n >= CORRECTION_WINDOW {
        let tail = &seq[n - CORRECTION_WINDOW..];
        let first = tail[0].0;
        if first.category == TrackCategory::Diagonal && tail.iter().all(|(t, _)| t.id == first.id) {
            return true;
        }
    }

    if n >= 3 {
        let (a, a_entry) = seq[n - 3];
        let (b, _) = seq[n - 2];
        let (c, c_entry) = seq[n - 1];
        use TrackCategory::{Curve, Straight};
        match (a.category, b.category, c.category) {
            (Straight, Curve, Straight) => {
                if b.vertical_end() == Some(Dir8::N) {
                    return true;
                }
            }
            (Curve, Straight, Curve) => {
                if a.turn(a_entry).signum() == c.turn(c_entry).signum() {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}

// ---------------------------------------------------------------------------
// Diagonal corners
// ---------------------------------------------------------------------------

fn diagonal_corner_conflict(
    map: &TrackMap,
    catalog: &TrackCatalog,
    existing: TrackId,
    new_template: &TrackTemplate,
    origin: TilePos,
) -> bool {
    let p = [
        origin + new_template.attach[0].offset,
        origin + new_template.attach[1].offset,
    ];
    for other in map.tracks() {
        if other.id == existing {
            continue;
        }
        let Some(ot) = catalog.get(other.template) else {
            continue;
        };
        if ot.category != TrackCategory::Diagonal {
            continue;
        }
        let q = [
            other.origin + ot.attach[0].offset,
            other.origin + ot.attach[1].offset,
        ];
        let spaced = p.iter().any(|a| {
            q.iter()
                .any(|b| a.y == b.y && (a.x - b.x).abs() == CORNER_SPACING)
        });
        if spaced && segments_cross(p[0], p[1], q[0], q[1]) {
            return true;
        }
    }
    false
}

fn orient(a: TilePos, b: TilePos, c: TilePos) -> i64 {
    let (abx, aby) = ((b.x - a.x) as i64, (b.y - a.y) as i64);
    let (acx, acy) = ((c.x - a.x) as i64, (c.y - a.y) as i64);
    abx * acy - aby * acx
}

/// Proper crossing: each segment strictly separates the other's endpoints.
fn segments_cross(p0: TilePos, p1: TilePos, q0: TilePos, q1: TilePos) -> bool {
    let d1 = orient(q0, q1, p0);
    let d2 = orient(q0, q1, p1);
    let d3 = orient(p0, p1, q0);
    let d4 = orient(p0, p1, q1);
    d1 * d2 < 0 && d3 * d4 < 0
}
