// Greedy scored track construction.
//
// `build_with_score` grows a line of track from a frontier end one piece at a
// time. Each step enumerates every legal `(frontier attach, template, new
// attach)` triple in a fixed order (frontier attach ascending, templates in
// the caller's order, new attach ascending), scores the position of the end
// the new piece leaves free, and places the best. The score function also
// sees the history of templates placed in this build, candidate included.
//
// Score sentinels:
// - `f64::NEG_INFINITY` (or NaN) discards the candidate;
// - `f64::INFINITY` places the candidate and ends the build successfully.
// Ties keep the earliest candidate.
//
// Two stopping regimes (`BuildLimit`): a plain piece count, or per-category
// quotas that are consumed as pieces are placed (a category with nothing
// left is not offered; spending everything without reaching +inf is a
// failure). `max_build_steps` bounds both.
//
// See also: `legality.rs` (the gate every candidate passes),
// `looping/loop_body.rs` which drives quota builds with a lane heuristic.

use super::legality::can_add_track_to;
use super::map::{TrackId, TrackMap, origin_for};
use super::template::{TemplateId, TrackCatalog, TrackCategory};
use crate::error::Result;
use crate::types::TilePos;

/// Per-category piece budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryQuotas {
    pub straight: u32,
    pub diagonal: u32,
    pub curve: u32,
}

impl CategoryQuotas {
    pub fn from_counts(counts: &[u32]) -> Self {
        let at = |i: usize| counts.get(i).copied().unwrap_or(0);
        Self {
            straight: at(0),
            diagonal: at(1),
            curve: at(2),
        }
    }

    fn remaining(&self, category: TrackCategory) -> u32 {
        match category {
            TrackCategory::Straight => self.straight,
            TrackCategory::Diagonal => self.diagonal,
            TrackCategory::Curve => self.curve,
            TrackCategory::Air => 0,
        }
    }

    fn consume(&mut self, category: TrackCategory) {
        match category {
            TrackCategory::Straight => self.straight -= 1,
            TrackCategory::Diagonal => self.diagonal -= 1,
            TrackCategory::Curve => self.curve -= 1,
            TrackCategory::Air => {}
        }
    }

    pub fn total(&self) -> u32 {
        self.straight + self.diagonal + self.curve
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildLimit {
    Count(usize),
    Quotas(CategoryQuotas),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    /// The score function returned +inf.
    Reached,
    /// `Count` mode placed the requested number of pieces.
    CountReached,
    /// No legal, non-discarded candidate.
    Stuck,
    /// `Quotas` mode spent every quota without reaching +inf.
    QuotaExhausted,
    /// `max_build_steps` pieces placed without finishing.
    StepCap,
}

impl BuildStatus {
    pub fn succeeded(self) -> bool {
        matches!(self, BuildStatus::Reached | BuildStatus::CountReached)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BuildOutcome {
    pub status: BuildStatus,
    /// Tracks placed by this build, in order (air supports included).
    pub placed: Vec<TrackId>,
    pub history: Vec<TemplateId>,
    /// The free end the line finished on.
    pub frontier: (TrackId, u8),
}

struct Candidate {
    frontier_attach: u8,
    template: TemplateId,
    new_attach: u8,
    score: f64,
}

/// Grow a line from `frontier` (a track and the attach to continue from;
/// the other free attach of that track is also tried, ascending).
pub fn build_with_score<F>(
    map: &mut TrackMap,
    catalog: &TrackCatalog,
    frontier: TrackId,
    mut score: F,
    allowed: &[TemplateId],
    limit: BuildLimit,
    max_build_steps: usize,
) -> Result<BuildOutcome>
where
    F: FnMut(TilePos, &[TemplateId]) -> f64,
{
    let mut quotas = match limit {
        BuildLimit::Quotas(q) => Some(q),
        BuildLimit::Count(_) => None,
    };
    let mut current = frontier;
    let mut frontier_end = (frontier, 1u8);
    let mut placed = Vec::new();
    let mut history: Vec<TemplateId> = Vec::new();

    loop {
        if let BuildLimit::Count(max) = limit {
            if history.len() >= max {
                return Ok(outcome(BuildStatus::CountReached, placed, history, frontier_end));
            }
        }
        if let Some(q) = &quotas {
            if q.total() == 0 {
                return Ok(outcome(BuildStatus::QuotaExhausted, placed, history, frontier_end));
            }
        }
        if history.len() >= max_build_steps {
            return Ok(outcome(BuildStatus::StepCap, placed, history, frontier_end));
        }

        let mut best: Option<Candidate> = None;
        for frontier_attach in 0..2u8 {
            if !map.track(current).is_free(frontier_attach) {
                continue;
            }
            let at = map.attach_pos(catalog, current, frontier_attach)?;
            for &template in allowed {
                let t = catalog.template(template)?;
                if let Some(q) = &quotas {
                    if q.remaining(t.category) == 0 {
                        continue;
                    }
                }
                for new_attach in 0..2u8 {
                    if !can_add_track_to(map, catalog, current, frontier_attach, template, new_attach) {
                        continue;
                    }
                    let free_end = free_end_position(catalog, template, new_attach, at)?;
                    history.push(template);
                    let s = score(free_end, &history);
                    history.pop();
                    if s.is_nan() || s == f64::NEG_INFINITY {
                        continue;
                    }
                    if best.as_ref().is_none_or(|b| s > b.score) {
                        best = Some(Candidate {
                            frontier_attach,
                            template,
                            new_attach,
                            score: s,
                        });
                    }
                }
            }
        }

        let Some(choice) = best else {
            return Ok(outcome(BuildStatus::Stuck, placed, history, frontier_end));
        };

        let attached = map.create_attached_track(
            catalog,
            current,
            choice.frontier_attach,
            choice.template,
            choice.new_attach,
        )?;
        placed.push(attached.track);
        if attached.frontier.0 != attached.track {
            placed.push(attached.frontier.0);
        }
        history.push(choice.template);
        if let Some(q) = &mut quotas {
            q.consume(catalog.template(choice.template)?.category);
        }
        current = attached.frontier.0;
        frontier_end = attached.frontier;

        if choice.score == f64::INFINITY {
            return Ok(outcome(BuildStatus::Reached, placed, history, frontier_end));
        }
    }
}

fn outcome(
    status: BuildStatus,
    placed: Vec<TrackId>,
    history: Vec<TemplateId>,
    frontier: (TrackId, u8),
) -> BuildOutcome {
    BuildOutcome {
        status,
        placed,
        history,
        frontier,
    }
}

/// Position of the end a candidate would leave free (the support's far end
/// for air templates).
fn free_end_position(
    catalog: &TrackCatalog,
    template: TemplateId,
    new_attach: u8,
    at: TilePos,
) -> Result<TilePos> {
    let t = catalog.template(template)?;
    let origin = origin_for(t, new_attach, at);
    if let Some(support) = t.air_support {
        let s = catalog.template(support.template)?;
        let support_origin = origin + support.offset - s.attach[support.via_attach as usize].offset;
        return Ok(support_origin + s.attach[1 - support.via_attach as usize].offset);
    }
    Ok(origin + t.attach[1 - new_attach as usize].offset)
}

/// Point-to-point heuristic: +inf on the target, `1 / d^2` elsewhere.
pub fn inverse_square_heuristic(target: TilePos) -> impl FnMut(TilePos, &[TemplateId]) -> f64 {
    move |pos, _history| {
        let d2 = pos.distance_sq(target);
        if d2 == 0 {
            f64::INFINITY
        } else {
            1.0 / d2 as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SH: TemplateId = TemplateId(0);
    const SV: TemplateId = TemplateId(1);

    #[test]
    fn count_mode_places_exactly_max() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(20, 5);
        let root = map.create_root_track(&catalog, SH, TilePos::new(0, 2)).unwrap();
        map.set_closed_end(root, 0);
        let out = build_with_score(&mut map, &catalog, root, |p, _| p.x as f64, &[SH], BuildLimit::Count(3), 64)
            .unwrap();
        assert_eq!(out.status, BuildStatus::CountReached);
        assert_eq!(out.placed.len(), 3);
        assert_eq!(map.attach_pos(&catalog, out.frontier.0, out.frontier.1).unwrap(), TilePos::new(8, 2));
    }

    #[test]
    fn inverse_square_reaches_target() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(20, 5);
        let root = map.create_root_track(&catalog, SH, TilePos::new(0, 2)).unwrap();
        map.set_closed_end(root, 0);
        let out = build_with_score(
            &mut map,
            &catalog,
            root,
            inverse_square_heuristic(TilePos::new(10, 2)),
            &[SH],
            BuildLimit::Count(100),
            64,
        )
        .unwrap();
        assert_eq!(out.status, BuildStatus::Reached);
        assert_eq!(out.history.len(), 4);
    }

    #[test]
    fn negative_infinity_discards_everything() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(20, 5);
        let root = map.create_root_track(&catalog, SH, TilePos::new(0, 2)).unwrap();
        let out = build_with_score(
            &mut map,
            &catalog,
            root,
            |_, _| f64::NEG_INFINITY,
            &[SH],
            BuildLimit::Count(3),
            64,
        )
        .unwrap();
        assert_eq!(out.status, BuildStatus::Stuck);
        assert!(out.placed.is_empty());
        assert_eq!(map.tracks().len(), 1);
    }

    #[test]
    fn quota_mode_skips_spent_categories_and_fails_when_empty() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(20, 10);
        let root = map.create_root_track(&catalog, SH, TilePos::new(0, 5)).unwrap();
        map.set_closed_end(root, 0);
        let quotas = CategoryQuotas {
            straight: 2,
            diagonal: 0,
            curve: 0,
        };
        let out = build_with_score(&mut map, &catalog, root, |_, _| 1.0, &[SH, SV], BuildLimit::Quotas(quotas), 64)
            .unwrap();
        assert_eq!(out.status, BuildStatus::QuotaExhausted);
        assert_eq!(out.history, vec![SH, SH]);
    }

    #[test]
    fn history_includes_candidate() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(20, 5);
        let root = map.create_root_track(&catalog, SH, TilePos::new(0, 2)).unwrap();
        map.set_closed_end(root, 0);
        let out = build_with_score(
            &mut map,
            &catalog,
            root,
            |_, h| if h.len() == 2 { f64::INFINITY } else { 0.0 },
            &[SH],
            BuildLimit::Count(10),
            64,
        )
        .unwrap();
        assert_eq!(out.status, BuildStatus::Reached);
        assert_eq!(out.history.len(), 2);
    }

    #[test]
    fn step_cap_bounds_the_build() {
        let catalog = TrackCatalog::standard();
        let mut map = TrackMap::new(40, 5);
        let root = map.create_root_track(&catalog, SH, TilePos::new(0, 2)).unwrap();
        map.set_closed_end(root, 0);
        let out = build_with_score(&mut map, &catalog, root, |_, _| 0.0, &[SH], BuildLimit::Count(50), 5)
            .unwrap();
        assert_eq!(out.status, BuildStatus::StepCap);
        assert_eq!(out.history.len(), 5);
    }
}
