// Physical layout of committed looping sections.
//
// A section occupies `[x_start, x_start + width)` and is drawn as:
//
//     | loop zone (track body) | delivery zone: rail, stacks, emitters |
//
// The rail runs along `rail_row` across the used part of the delivery zone.
// Each placed note gets a stack of straight tiles above the rail, an empty
// air gap, and an emitter at its pitch row; the instrument entity sits on
// the emitter. A synchronization spacer, if any, lies to the left of
// `x_start` and stays empty.
//
// Drawing clips silently at the level border. `OutputTooWide` is reported by
// the optimizer, not here.

use super::column_setup::{ColumnSetup, SetupKind};
use super::loop_body::LoopBody;
use crate::config::{GameData, LoopingConfig};
use crate::error::Result;
use crate::grid::SparseGrid;
use crate::result::{EntityPlacement, LevelTiles, PlacedEmitter, PlacedTrack, Tile};
use crate::track::TrackCatalog;
use crate::track::map::footprint_at;
use crate::types::{EntityKind, LevelBounds, NoteTarget, TilePos};

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedNote {
    pub note: NoteTarget,
    /// Column relative to the delivery zone origin.
    pub column: i32,
    pub setup: ColumnSetup,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectionLayout {
    pub instrument: EntityKind,
    pub x_start: i32,
    /// Empty columns inserted before `x_start` to synchronize the section.
    pub spacer: i32,
    pub width: i32,
    pub notes: Vec<PlacedNote>,
}

impl SectionLayout {
    pub fn delivery_origin(&self, cfg: &LoopingConfig) -> i32 {
        self.x_start + cfg.loop_zone_width
    }
}

/// Columns a section needs: the loop zone, the delivery zone up to the last
/// stack, and one column of rail past it.
pub fn section_width(cfg: &LoopingConfig, notes: &[PlacedNote]) -> i32 {
    let last = notes.iter().map(|n| n.column).max().unwrap_or(0);
    cfg.loop_zone_width + last + 2
}

pub struct Rendered {
    pub tiles: LevelTiles,
    pub tracks: Vec<PlacedTrack>,
    pub emitters: Vec<PlacedEmitter>,
    pub entities: SparseGrid<EntityPlacement>,
}

pub fn render_sections(
    data: &GameData,
    catalog: &TrackCatalog,
    body: &LoopBody,
    sections: &[SectionLayout],
    level: LevelBounds,
) -> Result<Rendered> {
    let cfg = &data.looping;
    let mut tiles = LevelTiles::new(level.width, level.height);
    let mut tracks = Vec::new();
    let mut emitters = Vec::new();
    let mut entities = SparseGrid::new();

    for section in sections {
        let shift = TilePos::new(section.x_start, 0);

        for track in body.map.tracks() {
            let template = catalog.template(track.template)?;
            let origin = track.origin + shift;
            for tile in footprint_at(template, origin) {
                tiles.foreground.set(tile, Tile::Track);
            }
            tracks.push(PlacedTrack {
                template: template.name.clone(),
                origin,
                closed_ends: track.closed_ends,
            });
        }

        let origin = section.delivery_origin(cfg);
        let delivery_end = section.x_start + section.width;
        for x in origin..delivery_end {
            tiles.foreground.set(TilePos::new(x, cfg.rail_row), Tile::Rail);
            for y in 0..cfg.rail_row {
                tiles.background.set(TilePos::new(x, y), Tile::Ground);
            }
        }

        let rules = data.instrument_rules(section.instrument)?;
        for placed in &section.notes {
            let x = origin + placed.column;
            let setup = &placed.setup;
            let top_straight = cfg.rail_row + setup.straights;
            for y in cfg.rail_row + 1..=top_straight {
                tiles.foreground.set(TilePos::new(x, y), Tile::Stack);
            }
            if setup.kind == SetupKind::Semisolid {
                tiles.overview.set(TilePos::new(x, top_straight + 1), Tile::Semisolid);
            }
            let emitter = TilePos::new(x, placed.note.pitch_row);
            tiles.foreground.set(emitter, Tile::Emitter);
            emitters.push(PlacedEmitter {
                pos: emitter,
                note: Some(placed.note.id),
            });
            entities.insert(
                emitter,
                EntityPlacement {
                    kind: section.instrument,
                    pos: emitter,
                    parachute: setup.kind == SetupKind::Parachute,
                    wing: false,
                    oversized: rules.oversized,
                    note: Some(placed.note.id),
                },
            );
        }
    }

    Ok(Rendered {
        tiles,
        tracks,
        emitters,
        entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_covers_last_stack_plus_rail() {
        let cfg = LoopingConfig::default();
        assert_eq!(section_width(&cfg, &[]), 14);
        let setup = ColumnSetup {
            kind: SetupKind::Drop,
            height: 5,
            straights: 3,
            air: 2,
            delay: 34,
        };
        let note = NoteTarget::new(0, 8, crate::types::BeatTime::whole(0), EntityKind::Goomba);
        let notes = vec![PlacedNote {
            note,
            column: 29,
            setup,
        }];
        assert_eq!(section_width(&cfg, &notes), 43);
    }
}
