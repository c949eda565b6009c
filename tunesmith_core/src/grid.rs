// Grid primitives: tile-occupancy registries and collision boxes.
//
// `BoundedGrid<T>` is a dense 2D grid stored as a flat `Vec<T>` indexed by
// `x + y * width`. Out-of-bounds reads return `T::default()` and out-of-bounds
// writes are no-ops, so callers never special-case the level border. It backs
// the track occupancy map and the rendered tile layers.
//
// `SparseGrid<T>` is the unbounded counterpart, a `BTreeMap<TilePos, T>`. It
// backs the entity grid, where placements are few and may be reported even
// when they fall outside the level (so the caller can see what went wrong).
//
// `CollisionBox` is an inclusive tile rectangle. Contact between two boxes is
// judged in one of three distinct modes (`ContactMode`); the optimizers rely
// on the differences between them, so they are deliberately not unified.
//
// **Critical constraint: determinism.** `BoundedGrid::iter` is row-major
// (y outer, x inner) and `SparseGrid` iterates in `TilePos` order.

use crate::types::TilePos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Bounded grid
// ---------------------------------------------------------------------------

/// Dense, bounded 2D grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedGrid<T> {
    cells: Vec<T>,
    width: i32,
    height: i32,
}

impl<T: Clone + Default> BoundedGrid<T> {
    /// Create a grid filled with `T::default()`. Negative sizes clamp to 0.
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            cells: vec![T::default(); (width as usize) * (height as usize)],
            width,
            height,
        }
    }

    /// Read a cell. Returns `T::default()` out of bounds.
    pub fn get(&self, pos: TilePos) -> T {
        self.index(pos)
            .map(|i| self.cells[i].clone())
            .unwrap_or_default()
    }

    /// Write a cell. No-op out of bounds; returns whether the write landed.
    pub fn set(&mut self, pos: TilePos, value: T) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }
}

impl<T> BoundedGrid<T> {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.x as usize + pos.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Borrow a cell, `None` out of bounds.
    pub fn cell(&self, pos: TilePos) -> Option<&T> {
        self.index(pos).map(|i| &self.cells[i])
    }

    /// Mutably borrow a cell, `None` out of bounds.
    pub fn cell_mut(&mut self, pos: TilePos) -> Option<&mut T> {
        self.index(pos).map(|i| &mut self.cells[i])
    }

    /// Iterate all cells row-major: y outer, x inner.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &T)> + '_ {
        let w = self.width.max(1);
        self.cells.iter().enumerate().map(move |(i, v)| {
            let i = i as i32;
            (TilePos::new(i % w, i / w), v)
        })
    }
}

// ---------------------------------------------------------------------------
// Sparse grid
// ---------------------------------------------------------------------------

/// Unbounded sparse grid keyed by tile position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct SparseGrid<T> {
    #[serde(with = "sparse_entries")]
    cells: BTreeMap<TilePos, T>,
}

impl<T> Default for SparseGrid<T> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }
}

impl<T> SparseGrid<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous occupant.
    pub fn insert(&mut self, pos: TilePos, value: T) -> Option<T> {
        self.cells.insert(pos, value)
    }

    pub fn get(&self, pos: TilePos) -> Option<&T> {
        self.cells.get(&pos)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &T)> + '_ {
        self.cells.iter().map(|(p, v)| (*p, v))
    }

}

// JSON object keys must be strings, so the map is written as an entry list.
mod sparse_entries {
    use crate::types::TilePos;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<T: Serialize, S: Serializer>(
        map: &BTreeMap<TilePos, T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<TilePos, T>, D::Error> {
        let entries: Vec<(TilePos, T)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Collision boxes
// ---------------------------------------------------------------------------

/// How two collision boxes are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactMode {
    /// The boxes share at least one tile.
    Overlap,
    /// The boxes share a tile or sit edge-to-edge (including corner contact).
    Touch,
    /// The boxes are separated by at most `n` empty tiles on both axes.
    Within(i32),
}

/// An inclusive axis-aligned tile rectangle: `x0..=x1` by `y0..=y1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl CollisionBox {
    /// Build a box from two corners in any order.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.x0 && pos.x <= self.x1 && pos.y >= self.y0 && pos.y <= self.y1
    }

    /// Number of empty columns between the two boxes. 0 means edge-adjacent;
    /// negative means they share columns.
    pub fn gap_x(&self, other: &CollisionBox) -> i32 {
        (other.x0 - self.x1).max(self.x0 - other.x1) - 1
    }

    /// Number of empty rows between the two boxes, same convention as `gap_x`.
    pub fn gap_y(&self, other: &CollisionBox) -> i32 {
        (other.y0 - self.y1).max(self.y0 - other.y1) - 1
    }

    /// How many columns the two boxes have in common.
    pub fn shared_columns(&self, other: &CollisionBox) -> i32 {
        (self.x1.min(other.x1) - self.x0.max(other.x0) + 1).max(0)
    }

    pub fn intersects(&self, other: &CollisionBox, mode: ContactMode) -> bool {
        let gx = self.gap_x(other);
        let gy = self.gap_y(other);
        match mode {
            ContactMode::Overlap => gx < 0 && gy < 0,
            ContactMode::Touch => gx <= 0 && gy <= 0,
            ContactMode::Within(n) => gx <= n && gy <= n,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_grid_reads_default_out_of_bounds() {
        let mut grid: BoundedGrid<u8> = BoundedGrid::new(4, 3);
        assert!(grid.set(TilePos::new(3, 2), 7));
        assert_eq!(grid.get(TilePos::new(3, 2)), 7);
        assert_eq!(grid.get(TilePos::new(-1, 0)), 0);
        assert_eq!(grid.get(TilePos::new(4, 0)), 0);
        assert!(!grid.set(TilePos::new(0, 3), 9));
    }

    #[test]
    fn bounded_grid_iterates_row_major() {
        let grid: BoundedGrid<u8> = BoundedGrid::new(2, 2);
        let order: Vec<TilePos> = grid.iter().map(|(p, _)| p).collect();
        assert_eq!(
            order,
            vec![
                TilePos::new(0, 0),
                TilePos::new(1, 0),
                TilePos::new(0, 1),
                TilePos::new(1, 1)
            ]
        );
    }

    #[test]
    fn sparse_grid_accepts_any_position() {
        let mut grid = SparseGrid::new();
        grid.insert(TilePos::new(-5, 900), 'a');
        grid.insert(TilePos::new(2, 1), 'b');
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.get(TilePos::new(-5, 900)), Some(&'a'));
        let keys: Vec<TilePos> = grid.iter().map(|(p, _)| p).collect();
        assert_eq!(keys, vec![TilePos::new(-5, 900), TilePos::new(2, 1)]);
    }

    #[test]
    fn sparse_grid_json_roundtrip() {
        let mut grid = SparseGrid::new();
        grid.insert(TilePos::new(3, 4), 10u32);
        let json = serde_json::to_string(&grid).unwrap();
        let back: SparseGrid<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn contact_modes_are_distinct() {
        let a = CollisionBox::new(0, 0, 2, 4);
        // Shares column 2.
        let sharing = CollisionBox::new(2, 0, 4, 4);
        // Edge-adjacent: starts at column 3.
        let adjacent = CollisionBox::new(3, 0, 5, 4);
        // One empty column between.
        let gapped = CollisionBox::new(4, 0, 6, 4);

        assert!(a.intersects(&sharing, ContactMode::Overlap));
        assert!(!a.intersects(&adjacent, ContactMode::Overlap));
        assert!(a.intersects(&adjacent, ContactMode::Touch));
        assert!(!a.intersects(&gapped, ContactMode::Touch));
        assert!(a.intersects(&gapped, ContactMode::Within(1)));
        assert!(!a.intersects(&gapped, ContactMode::Within(0)));
    }

    #[test]
    fn gaps_and_shared_columns() {
        let a = CollisionBox::new(0, 0, 2, 2);
        let b = CollisionBox::new(2, 5, 4, 7);
        assert_eq!(a.gap_x(&b), -1);
        assert_eq!(a.shared_columns(&b), 1);
        assert_eq!(a.gap_y(&b), 2);
        assert_eq!(b.gap_y(&a), 2);
    }

    #[test]
    fn box_contains_its_corners() {
        let b = CollisionBox::new(2, 3, 1, 1);
        assert!(b.contains(TilePos::new(1, 1)));
        assert!(b.contains(TilePos::new(2, 3)));
        assert!(!b.contains(TilePos::new(3, 3)));
        assert!(!b.contains(TilePos::new(1, 0)));
    }
}
