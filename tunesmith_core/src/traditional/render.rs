// Drawing resolved traditional structures into the result layers.
//
// Walls go to the background layer; note blocks, caps, and semisolids to the
// foreground; spawn points and conflict marks to the overview. Each resolved
// structure produces one entity at its spawn point. Unresolved structures are
// not built, only marked at their note block.

use super::cell::Cell;
use super::structure::{NoteStructure, StructureId};
use crate::config::GameData;
use crate::grid::SparseGrid;
use crate::physics::FallMode;
use crate::result::{EntityPlacement, LevelTiles, Tile};
use crate::types::{LevelBounds, TilePos};
use std::collections::BTreeSet;

pub struct Rendered {
    pub tiles: LevelTiles,
    pub entities: SparseGrid<EntityPlacement>,
}

pub fn render_structures(
    data: &GameData,
    structures: &[NoteStructure],
    cells: &[Cell],
    unresolved: &BTreeSet<StructureId>,
    level: LevelBounds,
) -> Rendered {
    let mut tiles = LevelTiles::new(level.width, level.height);
    let mut entities = SparseGrid::new();

    for cell in cells {
        for wall in cell.walls(structures) {
            for y in wall.y0..=wall.y1 {
                tiles.background.set(TilePos::new(wall.x, y), Tile::Wall);
            }
        }
        for id in &cell.members {
            let Some(s) = structures.get(id.0 as usize) else {
                continue;
            };
            let Some(setup) = data.traditional_setups.get(s.setup) else {
                continue;
            };
            let origin = s.structure.origin;
            let shaft = if s.rules.oversized { 2 } else { 1 };
            for dx in 0..shaft {
                tiles.foreground.set(origin.offset(dx, 0), Tile::NoteBlock);
                tiles.foreground.set(TilePos::new(origin.x + dx, cell.top), Tile::Cap);
            }
            let spawn = s.spawn(data);
            if setup.semisolid {
                tiles.foreground.set(spawn.offset(0, -1), Tile::Semisolid);
            }
            tiles.overview.set(spawn, Tile::Spawn);
            entities.insert(
                spawn,
                EntityPlacement {
                    kind: s.note.instrument,
                    pos: spawn,
                    parachute: setup.fall == FallMode::Parachute,
                    wing: setup.fall == FallMode::Wing,
                    oversized: s.rules.oversized,
                    note: Some(s.note.id),
                },
            );
        }
    }

    for id in unresolved {
        if let Some(s) = structures.get(id.0 as usize) {
            tiles.overview.set(s.structure.origin, Tile::ConflictMark);
        }
    }

    Rendered { tiles, entities }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traditional::cell::merge_cells;
    use crate::traditional::context::BuildContext;
    use crate::types::{BeatTime, EntityKind, NoteTarget};

    #[test]
    fn cell_draws_shared_wall_once() {
        let data = GameData::default();
        let fast = data.scroll_speed("autoscroll-fast").unwrap();
        let level = LevelBounds::new(20, 20);
        let mut ctx = BuildContext::new(&data, fast, level);
        ctx.add(NoteTarget::new(0, 2, BeatTime::whole(0), EntityKind::Goomba), 10).unwrap();
        ctx.add(NoteTarget::new(1, 2, BeatTime::whole(1), EntityKind::Goomba), 12).unwrap();
        let layout = merge_cells(ctx.structures(), &BTreeSet::new());
        let out = render_structures(&data, ctx.structures(), &layout.cells, &BTreeSet::new(), level);

        let walls = out.tiles.background.iter().filter(|(_, t)| **t == Tile::Wall).count();
        // Columns 9, 11, 13 from row 2 to the cap row 7.
        assert_eq!(walls, 18);
        assert_eq!(out.tiles.foreground.get(TilePos::new(10, 2)), Tile::NoteBlock);
        assert_eq!(out.tiles.foreground.get(TilePos::new(12, 7)), Tile::Cap);
        assert_eq!(out.entities.len(), 2);
        let e = out.entities.get(TilePos::new(10, 6)).unwrap();
        assert_eq!(e.kind, EntityKind::Goomba);
        assert!(!e.parachute);
    }

    #[test]
    fn unresolved_structures_only_get_a_mark() {
        let data = GameData::default();
        let fast = data.scroll_speed("autoscroll-fast").unwrap();
        let level = LevelBounds::new(20, 20);
        let mut ctx = BuildContext::new(&data, fast, level);
        let id = ctx.add(NoteTarget::new(0, 2, BeatTime::whole(0), EntityKind::Goomba), 10).unwrap();
        let excluded = BTreeSet::from([id]);
        let layout = merge_cells(ctx.structures(), &excluded);
        let out = render_structures(&data, ctx.structures(), &layout.cells, &excluded, level);
        assert!(out.entities.is_empty());
        assert_eq!(out.tiles.overview.get(TilePos::new(10, 2)), Tile::ConflictMark);
        assert_eq!(out.tiles.foreground.get(TilePos::new(10, 2)), Tile::Empty);
    }
}
