//! World snapshot and restore support.
//!
//! Provides [`WorldSnapshot`] -- a fully serializable representation of the
//! world state (every entity record including destroyed ones, the portal
//! link table and the clock). The grid itself is not stored; restore rebuilds
//! it from entity positions, which doubles as a consistency check.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::grid::Grid;
use crate::kind::KindTag;
use crate::world::World;
use crate::GridError;

// ---------------------------------------------------------------------------
// WorldSnapshot
// ---------------------------------------------------------------------------

/// A complete, serializable snapshot of a [`World`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub width: i32,
    pub height: i32,
    /// The entity store in id order, destroyed entries included so that ids
    /// stay stable across restore.
    pub entities: Vec<Entity>,
    /// Each portal link once, lower id first.
    pub portal_links: Vec<(EntityId, EntityId)>,
    pub elapsed: f64,
}

// ---------------------------------------------------------------------------
// World snapshot/restore impl
// ---------------------------------------------------------------------------

impl World {
    /// Capture a complete snapshot of the world state.
    pub fn capture_snapshot(&self) -> WorldSnapshot {
        let portal_links = self
            .portal_links
            .iter()
            .filter(|(a, b)| a < b)
            .map(|(&a, &b)| (a, b))
            .collect();

        WorldSnapshot {
            width: self.width(),
            height: self.height(),
            entities: self.entities.clone(),
            portal_links,
            elapsed: self.elapsed,
        }
    }

    /// Restore the world from a snapshot.
    ///
    /// The new state is built off to the side and only swapped in once it is
    /// known to be consistent, so on error `self` is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot's entities overlap, lie outside the
    /// grid, are out of id order, or if a portal link references something
    /// other than two live portals.
    pub fn restore_from_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<(), GridError> {
        *self = World::from_snapshot(snapshot)?;
        Ok(())
    }

    /// Build a fresh world from a snapshot.
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Result<World, GridError> {
        if snapshot.width <= 0 || snapshot.height <= 0 {
            return Err(GridError::InvalidDimensions {
                width: snapshot.width,
                height: snapshot.height,
            });
        }

        let mut grid = Grid::new(snapshot.width, snapshot.height);
        for (index, entity) in snapshot.entities.iter().enumerate() {
            if entity.id().index() as usize != index {
                return Err(GridError::StaleEntity {
                    entity: entity.id(),
                });
            }
            if !entity.is_active() {
                continue;
            }
            let (layer, pos) = (entity.layer(), entity.pos());
            if !grid.in_bounds(pos) {
                return Err(GridError::OutOfBounds {
                    pos,
                    width: snapshot.width,
                    height: snapshot.height,
                });
            }
            if let Some(occupant) = grid.get(layer, pos) {
                return Err(GridError::Occupied { pos, occupant });
            }
            grid.set(layer, pos, Some(entity.id()));
        }

        let mut world = World {
            grid,
            entities: snapshot.entities.clone(),
            portal_links: Default::default(),
            elapsed: snapshot.elapsed,
        };

        for &(a, b) in &snapshot.portal_links {
            world.link_portals(a, b)?;
        }

        tracing::debug!(
            entities = world.entity_count(),
            portals = world.count_of_kind(KindTag::Portal),
            "world restored from snapshot"
        );
        Ok(world)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
