//! Icer Grid -- the cell grid and entity store of the ICER puzzle engine.
//!
//! This crate owns the spatial state of a level: a fixed-size grid where
//! every cell holds at most one entity per layer, and the [`World`] that owns
//! all entities and is the only code allowed to move them. Higher-level
//! systems (gravity, pushing, ice, rules) live in `icer-engine` and mutate
//! the world exclusively through the operations defined here, so the
//! position/slot invariant can never be broken from outside.
//!
//! # Quick Start
//!
//! ```
//! use icer_grid::prelude::*;
//!
//! let mut world = World::new(8, 6);
//! let wall = world.spawn(EntityKind::Wall, GridPos::new(2, 1)).unwrap();
//! let ice = world.spawn(EntityKind::ice_block(), GridPos::new(3, 1)).unwrap();
//!
//! assert_eq!(world.at(GridPos::new(3, 1)), Some(ice));
//! // A wall directly to the left makes the ice block firm.
//! assert!(world.is_firm_now(ice));
//!
//! world.remove(wall).unwrap();
//! assert!(!world.is_firm_now(ice));
//! assert!(world.check_invariants().is_ok());
//! ```

#![deny(unsafe_code)]

pub mod entity;
pub mod grid;
pub mod kind;
pub mod snapshot;
pub mod world;

use entity::{EntityId, GridPos};
use kind::KindTag;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world mutations. A failed mutation never changes the
/// world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The target cell lies outside the grid.
    #[error("cell {pos} is outside the {width}x{height} grid")]
    OutOfBounds { pos: GridPos, width: i32, height: i32 },

    /// The target cell's layer already holds another entity.
    #[error("cell {pos} is already occupied by {occupant}")]
    Occupied { pos: GridPos, occupant: EntityId },

    /// The entity was destroyed or never existed.
    #[error("entity {entity} does not exist or has been destroyed")]
    StaleEntity { entity: EntityId },

    /// The operation only applies to a different kind of entity.
    #[error("entity {entity} is a {actual}, expected a {expected}")]
    WrongKind {
        entity: EntityId,
        expected: KindTag,
        actual: KindTag,
    },

    /// A portal cannot be linked to itself.
    #[error("portal {entity} cannot be linked to itself")]
    SelfLink { entity: EntityId },

    /// Grid dimensions must both be positive.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
}

/// A broken structural invariant, reported by
/// [`World::check_invariants`](world::World::check_invariants).
///
/// These indicate a bug in the engine, never a user error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// An active entity is not found in the slot its position names.
    #[error("entity {entity} claims {stored} but its slot holds {slot:?}")]
    PositionMismatch {
        entity: EntityId,
        stored: GridPos,
        slot: Option<EntityId>,
    },

    /// A cell references an inactive, unknown, or elsewhere-positioned entity.
    #[error("cell {pos} references {entity}, which does not live there")]
    DanglingCell { pos: GridPos, entity: EntityId },

    /// An entity sits in the wrong layer for its kind.
    #[error("cell {pos} holds {entity} in the wrong layer")]
    WrongLayer { pos: GridPos, entity: EntityId },

    /// A portal link that is not mirrored, or that touches a non-portal.
    #[error("portal link {from} -> {to} is not symmetric between live portals")]
    AsymmetricPortalLink { from: EntityId, to: EntityId },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{Entity, EntityId, GridPos};
    pub use crate::grid::Grid;
    pub use crate::kind::{
        Capabilities, Direction, EntityKind, IceState, KindTag, Layer, PortalState, PotState,
    };
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::world::{World, NEIGHBOR_OFFSETS};
    pub use crate::{GridError, InvariantViolation};
}
