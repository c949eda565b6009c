// Conflict detection and resolution between note structures.
//
// A structure's conflict count is the sum of:
// - other structures sharing two or more columns with it on overlapping rows
//   (one shared column is a shared wall, which is allowed);
// - one if its box leaves the buildable area (the start zone, the level
//   width, rows `0..height`);
// - one if its setup is illegal (no whole-column shift at this scroll speed,
//   or forbidden for the instrument);
// - wall-sharing neighbours whose top is more than `max_extension` above its
//   own, since joining their cell would stretch it too far.
//
// Resolution is queue driven. Conflicted structures are visited in ascending
// id order; each visit runs a breadth-first search over move lists, where a
// move puts one structure on another setup. The search starts from the focal
// structure and also expands the structures it touches, tries setups in
// ascending order, and keeps only children that do not make the local
// conflict count worse. The first node with no local conflicts wins. Moves
// are applied to the context and rolled back through an undo stack, so the
// context is never cloned. When the search runs out of nodes the best
// strictly improving move list found is kept. Structures still conflicted are
// requeued until they have been visited `max_resolution_passes` times.
//
// See also: `context.rs` for the neighbour index, `cell.rs` for what happens
// to wall-sharing structures afterwards.

use super::context::BuildContext;
use super::structure::{NoteStructure, StructureId};
use crate::error::Result;
use crate::grid::{CollisionBox, ContactMode};
use crate::result::DiagnosticKind;
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Boxes that cannot both be built: two or more shared columns on
/// overlapping rows.
pub fn collides(a: &CollisionBox, b: &CollisionBox) -> bool {
    a.shared_columns(b) >= 2 && a.intersects(b, ContactMode::Overlap)
}

/// Boxes that share exactly one wall column and are at most one row apart.
/// Such structures are merged into one cell.
pub fn shares_wall(a: &CollisionBox, b: &CollisionBox) -> bool {
    a.shared_columns(b) == 1 && a.intersects(b, ContactMode::Within(1))
}

fn out_of_area(ctx: &BuildContext<'_>, s: &NoteStructure) -> bool {
    let bbox = s.bbox();
    bbox.x0 < ctx.data.traditional.start_zone_columns
        || bbox.x1 >= ctx.level.width
        || bbox.y0 < 0
        || bbox.y1 >= ctx.level.height
}

/// Whether `s` would have to grow past its instrument's limit to reach
/// `other`'s top.
pub fn over_extends(s: &NoteStructure, other: &NoteStructure) -> bool {
    other.structure.top() - s.structure.top() > s.rules.max_extension
}

pub fn conflicts(ctx: &BuildContext<'_>, id: StructureId) -> usize {
    let Some(s) = ctx.get(id) else {
        return 0;
    };
    let mut count = 0;
    if !s.is_legal(ctx.data, &ctx.palette) {
        count += 1;
    }
    if out_of_area(ctx, s) {
        count += 1;
    }
    for other_id in ctx.near(id, 0) {
        let Some(other) = ctx.get(other_id) else {
            continue;
        };
        if collides(s.bbox(), other.bbox()) {
            count += 1;
        } else if shares_wall(s.bbox(), other.bbox()) && over_extends(s, other) {
            count += 1;
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// One structure switched to one setup.
type Move = (StructureId, usize);

/// Previous setups of moved structures, most recent last.
#[derive(Default)]
struct UndoStack {
    entries: Vec<(StructureId, usize)>,
}

impl UndoStack {
    fn apply(&mut self, ctx: &mut BuildContext<'_>, moves: &[Move]) -> Result<()> {
        for &(id, setup) in moves {
            let previous = ctx.set_setup(id, setup)?;
            self.entries.push((id, previous));
        }
        Ok(())
    }

    fn rollback(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        while let Some((id, previous)) = self.entries.pop() {
            ctx.set_setup(id, previous)?;
        }
        Ok(())
    }
}

/// The focal structure, every moved structure, and everything touching them.
fn scope(ctx: &BuildContext<'_>, focal: StructureId, moves: &[Move]) -> BTreeSet<StructureId> {
    let mut out = BTreeSet::from([focal]);
    out.extend(moves.iter().map(|m| m.0));
    let seeds: Vec<StructureId> = out.iter().copied().collect();
    for id in seeds {
        out.extend(ctx.near(id, 0));
    }
    out
}

fn local_conflicts(ctx: &BuildContext<'_>, focal: StructureId, moves: &[Move]) -> usize {
    scope(ctx, focal, moves)
        .into_iter()
        .map(|id| conflicts(ctx, id))
        .sum()
}

fn with_move(moves: &[Move], next: Move) -> Vec<Move> {
    let mut out = moves.to_vec();
    out.push(next);
    out.sort_unstable();
    out
}

/// Search for setups clearing the conflicts around `focal` and leave the
/// best found applied. Returns the structures whose surroundings changed.
fn search(ctx: &mut BuildContext<'_>, focal: StructureId) -> Result<BTreeSet<StructureId>> {
    let node_cap = ctx.data.limits.max_search_nodes;
    let start = local_conflicts(ctx, focal, &[]);
    let mut frontier: VecDeque<(Vec<Move>, usize)> = VecDeque::from([(Vec::new(), start)]);
    let mut visited: FxHashSet<Vec<Move>> = FxHashSet::default();
    visited.insert(Vec::new());
    let mut best: Option<(usize, Vec<Move>)> = None;
    let mut expanded = 0;
    let mut undo = UndoStack::default();

    while let Some((moves, parent_score)) = frontier.pop_front() {
        if expanded >= node_cap {
            break;
        }
        expanded += 1;
        undo.apply(ctx, &moves)?;

        let moved: BTreeSet<StructureId> = moves.iter().map(|m| m.0).collect();
        let mut expandable = vec![focal];
        expandable.extend(scope(ctx, focal, &moves).into_iter().filter(|id| *id != focal));

        let mut children = Vec::new();
        for sid in expandable {
            if moved.contains(&sid) {
                continue;
            }
            let Some(current) = ctx.get(sid) else {
                continue;
            };
            let current_setup = current.setup;
            let rules = current.rules.clone();
            let options: Vec<usize> = ctx
                .palette
                .admissible()
                .filter(|&i| i != current_setup)
                .filter(|&i| ctx.data.traditional_setups.get(i).is_some_and(|s| s.permitted_for(&rules)))
                .collect();
            for setup in options {
                let child = with_move(&moves, (sid, setup));
                if !visited.insert(child.clone()) {
                    continue;
                }
                let previous = ctx.set_setup(sid, setup)?;
                let score = local_conflicts(ctx, focal, &child);
                ctx.set_setup(sid, previous)?;

                if score == 0 {
                    undo.rollback(ctx)?;
                    debug!(%focal, nodes = expanded, moves = child.len(), "conflict cleared");
                    let touched = scope(ctx, focal, &child);
                    UndoStack::default().apply(ctx, &child)?;
                    return Ok(touched.union(&scope(ctx, focal, &child)).copied().collect());
                }
                if score < start && best.as_ref().is_none_or(|(b, _)| score < *b) {
                    best = Some((score, child.clone()));
                }
                if score <= parent_score {
                    children.push((child, score));
                }
            }
        }

        undo.rollback(ctx)?;
        frontier.extend(children);
    }

    debug!(%focal, nodes = expanded, improved = best.is_some(), "conflict search exhausted");
    let mut touched = scope(ctx, focal, &[]);
    if let Some((_, moves)) = best {
        touched.extend(scope(ctx, focal, &moves));
        UndoStack::default().apply(ctx, &moves)?;
        touched.extend(scope(ctx, focal, &moves));
    }
    Ok(touched)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unresolved {
    pub id: StructureId,
    pub kind: DiagnosticKind,
    pub conflicts: usize,
}

/// Resolve what can be resolved; report the rest in ascending id order.
pub fn resolve_conflicts(ctx: &mut BuildContext<'_>) -> Result<Vec<Unresolved>> {
    let passes = ctx.data.limits.max_resolution_passes;
    let mut visits: BTreeMap<StructureId, usize> = BTreeMap::new();
    let mut queue: VecDeque<StructureId> = ctx.ids().filter(|id| conflicts(ctx, *id) > 0).collect();
    let mut queued: BTreeSet<StructureId> = queue.iter().copied().collect();

    while let Some(id) = queue.pop_front() {
        queued.remove(&id);
        let seen = visits.entry(id).or_insert(0);
        if *seen >= passes || conflicts(ctx, id) == 0 {
            continue;
        }
        *seen += 1;

        let touched = search(ctx, id)?;
        for other in touched {
            let revisit = visits.get(&other).copied().unwrap_or(0) < passes;
            if revisit && !queued.contains(&other) && conflicts(ctx, other) > 0 {
                queue.push_back(other);
                queued.insert(other);
            }
        }
    }

    Ok(ctx
        .ids()
        .filter_map(|id| {
            let count = conflicts(ctx, id);
            (count > 0).then(|| Unresolved {
                id,
                kind: unresolved_kind(ctx, id),
                conflicts: count,
            })
        })
        .collect())
}

fn unresolved_kind(ctx: &BuildContext<'_>, id: StructureId) -> DiagnosticKind {
    match ctx.get(id) {
        Some(s) if !s.is_legal(ctx.data, &ctx.palette) => DiagnosticKind::IllegalSetup,
        _ => DiagnosticKind::UnresolvedConflict,
    }
}
