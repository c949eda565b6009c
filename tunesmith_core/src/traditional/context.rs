// Working registry for one traditional build attempt.
//
// `BuildContext` owns every `NoteStructure` of the attempt plus a column
// index (column -> structures covering it) so neighbour queries only look at
// nearby structures. Each configuration tried by the optimizer gets its own
// context; nothing is shared between attempts, which is what lets them run in
// parallel.
//
// Structure ids are dense indices into the registry, assigned in input order.
//
// **Critical constraint: determinism.** The column index is a `BTreeMap` of
// `BTreeSet`s, so neighbour sets come back in ascending id order.

use super::structure::{NoteStructure, SetupPalette, StructureId};
use crate::config::GameData;
use crate::error::{BuildError, Result};
use crate::physics::ScrollSpeed;
use crate::types::{LevelBounds, NoteTarget};
use std::collections::{BTreeMap, BTreeSet};

pub struct BuildContext<'a> {
    pub data: &'a GameData,
    pub palette: SetupPalette,
    pub level: LevelBounds,
    structures: Vec<NoteStructure>,
    columns: BTreeMap<i32, BTreeSet<StructureId>>,
}

impl<'a> BuildContext<'a> {
    pub fn new(data: &'a GameData, speed: &ScrollSpeed, level: LevelBounds) -> Self {
        Self {
            data,
            palette: SetupPalette::new(data, speed),
            level,
            structures: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, note: NoteTarget, base_column: i32) -> Result<StructureId> {
        let id = StructureId(self.structures.len() as u32);
        let placed = NoteStructure::new(id, note, base_column, self.data)?;
        self.structures.push(placed);
        self.index(id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn get(&self, id: StructureId) -> Option<&NoteStructure> {
        self.structures.get(id.0 as usize)
    }

    pub fn structure(&self, id: StructureId) -> Result<&NoteStructure> {
        self.get(id)
            .ok_or_else(|| BuildError::invalid(format!("unknown {id}")))
    }

    pub fn structures(&self) -> &[NoteStructure] {
        &self.structures
    }

    pub fn ids(&self) -> impl Iterator<Item = StructureId> + '_ {
        self.structures.iter().map(|s| s.id)
    }

    /// Move a structure to another setup. Returns the setup it had before.
    pub fn set_setup(&mut self, id: StructureId, setup: usize) -> Result<usize> {
        let previous = self.structure(id)?.setup;
        self.unindex(id);
        let outcome = match self.structures.get_mut(id.0 as usize) {
            Some(s) => s.apply_setup(setup, self.data, &self.palette),
            None => Err(BuildError::invalid(format!("unknown {id}"))),
        };
        self.index(id);
        outcome.map(|()| previous)
    }

    /// Structures covering any column in `[x0 - margin, x1 + margin]` of
    /// `id`'s box, excluding `id` itself.
    pub fn near(&self, id: StructureId, margin: i32) -> BTreeSet<StructureId> {
        let Some(s) = self.get(id) else {
            return BTreeSet::new();
        };
        let bbox = s.bbox();
        self.columns
            .range(bbox.x0 - margin..=bbox.x1 + margin)
            .flat_map(|(_, ids)| ids.iter().copied())
            .filter(|other| *other != id)
            .collect()
    }

    fn index(&mut self, id: StructureId) {
        if let Some(s) = self.structures.get(id.0 as usize) {
            let bbox = *s.bbox();
            for x in bbox.x0..=bbox.x1 {
                self.columns.entry(x).or_default().insert(id);
            }
        }
    }

    fn unindex(&mut self, id: StructureId) {
        if let Some(s) = self.structures.get(id.0 as usize) {
            let bbox = *s.bbox();
            for x in bbox.x0..=bbox.x1 {
                if let Some(ids) = self.columns.get_mut(&x) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        self.columns.remove(&x);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BeatTime, EntityKind};

    fn context(data: &GameData) -> BuildContext<'_> {
        let fast = data.scroll_speed("autoscroll-fast").unwrap();
        BuildContext::new(data, fast, LevelBounds::new(80, 27))
    }

    fn note(id: u32) -> NoteTarget {
        NoteTarget::new(id, 8, BeatTime::whole(id), EntityKind::Goomba)
    }

    #[test]
    fn neighbours_by_column() {
        let data = GameData::default();
        let mut ctx = context(&data);
        let a = ctx.add(note(0), 10).unwrap();
        let b = ctx.add(note(1), 12).unwrap();
        let c = ctx.add(note(2), 30).unwrap();
        assert_eq!(ctx.near(a, 0), BTreeSet::from([b]));
        assert!(ctx.near(c, 0).is_empty());
        assert_eq!(ctx.near(c, 20), BTreeSet::from([a, b]));
    }

    #[test]
    fn setup_changes_reindex() {
        let data = GameData::default();
        let mut ctx = context(&data);
        let a = ctx.add(note(0), 10).unwrap();
        let b = ctx.add(note(1), 20).unwrap();
        assert!(ctx.near(a, 0).is_empty());
        // drop-1 shifts four columns right at fast scroll, drop-8 ten left.
        assert_eq!(ctx.set_setup(a, 1).unwrap(), 0);
        assert_eq!(ctx.structure(a).unwrap().structure.origin.x, 14);
        assert_eq!(ctx.set_setup(b, 6).unwrap(), 0);
        assert_eq!(ctx.structure(b).unwrap().structure.origin.x, 10);
        assert!(ctx.near(a, 0).is_empty());
        assert_eq!(ctx.near(a, 2), BTreeSet::from([b]));
        assert!(ctx.set_setup(a, 40).is_err());
        assert_eq!(ctx.structure(a).unwrap().setup, 1);
        assert_eq!(ctx.len(), 2);
    }
}
