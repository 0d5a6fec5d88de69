//! The cell array.
//!
//! A [`Grid`] is a fixed `width x height` array of optional [`EntityId`]s
//! with two layers (see [`Layer`]). It stores ids only; entity data lives in
//! the [`World`](crate::world::World), which is also the only writer.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, GridPos};
use crate::kind::Layer;

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Fixed-size two-layer cell array, row-major with row 0 at the bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    occupants: Vec<Option<EntityId>>,
    fixtures: Vec<Option<EntityId>>,
}

impl Grid {
    /// Create an empty grid.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is not positive.
    pub fn new(width: i32, height: i32) -> Self {
        assert!(
            width > 0 && height > 0,
            "grid dimensions must be positive, got {width}x{height}"
        );
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            occupants: vec![None; cells],
            fixtures: vec![None; cells],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether `pos` lies inside the grid. Out-of-range coordinates are never
    /// clamped.
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y as usize) * (self.width as usize) + pos.x as usize)
    }

    fn layer(&self, layer: Layer) -> &[Option<EntityId>] {
        match layer {
            Layer::Occupant => &self.occupants,
            Layer::Fixture => &self.fixtures,
        }
    }

    /// The id stored at `pos` in `layer`, or `None` for empty or
    /// out-of-bounds cells.
    pub fn get(&self, layer: Layer, pos: GridPos) -> Option<EntityId> {
        self.index(pos).and_then(|i| self.layer(layer)[i])
    }

    /// Write a slot. Returns `false` (and writes nothing) when `pos` is out of
    /// bounds.
    pub(crate) fn set(&mut self, layer: Layer, pos: GridPos, value: Option<EntityId>) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        match layer {
            Layer::Occupant => self.occupants[i] = value,
            Layer::Fixture => self.fixtures[i] = value,
        }
        true
    }

    /// Non-empty cells of one layer in row-major order: bottom row first,
    /// `x` ascending within a row.
    pub fn cells(&self, layer: Layer) -> impl Iterator<Item = (GridPos, EntityId)> + '_ {
        let width = self.width as usize;
        self.layer(layer)
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| {
                slot.map(|id| (GridPos::new((i % width) as i32, (i / width) as i32), id))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
