// Cells: groups of structures built as one block.
//
// Two resolved structures that share exactly one wall column and sit at most
// one row apart are merged; merging is transitive, so a run of adjacent
// shafts forms one cell. Every member is extended upward to the cell top
// (the tallest member's top), so the shared walls and caps line up. A member
// that would have to grow past its instrument's `max_extension` cannot join
// and is reported unresolved; the remaining structures are regrouped.
//
// When a cell is built, each member after the first reuses the previous
// member's right wall as its own left wall, so shared walls are drawn once.

use super::conflict::shares_wall;
use super::structure::{NoteStructure, StructureId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Ordered left to right by left wall column, then id.
    pub members: Vec<StructureId>,
    pub top: i32,
}

/// A vertical wall run, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallSegment {
    pub x: i32,
    pub y0: i32,
    pub y1: i32,
}

impl Cell {
    /// Walls of the built cell with duplicated left walls trimmed.
    pub fn walls(&self, structures: &[NoteStructure]) -> Vec<WallSegment> {
        let mut walls: Vec<WallSegment> = Vec::new();
        for id in &self.members {
            let Some(s) = structures.get(id.0 as usize) else {
                continue;
            };
            let y0 = s.structure.origin.y;
            let left = s.structure.left_wall();
            match walls.last_mut() {
                Some(prev) if prev.x == left => prev.y0 = prev.y0.min(y0),
                _ => walls.push(WallSegment {
                    x: left,
                    y0,
                    y1: self.top,
                }),
            }
            walls.push(WallSegment {
                x: s.structure.right_wall(),
                y0,
                y1: self.top,
            });
        }
        walls
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellLayout {
    pub cells: Vec<Cell>,
    /// Structures that could not reach their cell's top.
    pub over_extended: Vec<StructureId>,
}

/// Group every structure not in `excluded` into cells.
pub fn merge_cells(structures: &[NoteStructure], excluded: &BTreeSet<StructureId>) -> CellLayout {
    let mut excluded = excluded.clone();
    let mut over_extended = Vec::new();
    loop {
        let cells = group(structures, &excluded);
        let mut dropped = Vec::new();
        for cell in &cells {
            for id in &cell.members {
                let reach = structures
                    .get(id.0 as usize)
                    .map_or(0, |s| cell.top - s.structure.top() - s.rules.max_extension);
                if reach > 0 {
                    dropped.push(*id);
                }
            }
        }
        if dropped.is_empty() {
            over_extended.sort_unstable();
            return CellLayout { cells, over_extended };
        }
        excluded.extend(dropped.iter().copied());
        over_extended.extend(dropped);
    }
}

fn group(structures: &[NoteStructure], excluded: &BTreeSet<StructureId>) -> Vec<Cell> {
    let active: Vec<&NoteStructure> = structures.iter().filter(|s| !excluded.contains(&s.id)).collect();
    let mut parent: BTreeMap<StructureId, StructureId> = active.iter().map(|s| (s.id, s.id)).collect();

    fn find(parent: &mut BTreeMap<StructureId, StructureId>, id: StructureId) -> StructureId {
        let mut root = id;
        while let Some(&p) = parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        parent.insert(id, root);
        root
    }

    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if shares_wall(a.bbox(), b.bbox()) {
                let ra = find(&mut parent, a.id);
                let rb = find(&mut parent, b.id);
                if ra != rb {
                    parent.insert(ra.max(rb), ra.min(rb));
                }
            }
        }
    }

    let mut groups: BTreeMap<StructureId, Vec<&NoteStructure>> = BTreeMap::new();
    for &s in &active {
        let root = find(&mut parent, s.id);
        groups.entry(root).or_default().push(s);
    }

    groups
        .into_values()
        .map(|mut members| {
            members.sort_by_key(|s| (s.structure.left_wall(), s.id));
            let top = members.iter().map(|s| s.structure.top()).max().unwrap_or(0);
            Cell {
                members: members.iter().map(|s| s.id).collect(),
                top,
            }
        })
        .collect()
}
