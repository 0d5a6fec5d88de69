//! Icer Engine -- deterministic puzzle physics and rules on top of [`icer_grid`].
//!
//! This crate provides every system that acts on a [`World`](icer_grid::world::World)
//! each tick, plus the driver that runs them in a fixed order:
//!
//! 1. [`World::update`](icer_grid::world::World::update) -- clock and firmness.
//! 2. [`PhysicsEngine`](physics::PhysicsEngine) -- gravity, sliding, interactions.
//! 3. [`PushSystem`](push::PushSystem) -- queued push requests.
//! 4. [`IceSubsystem`](ice::IceSubsystem) -- firmness, slide starts, ice interactions.
//! 5. [`RulesEngine`](rules::RulesEngine) -- puzzle passes, portals, win/lose.
//!
//! Given the same level and the same player actions, a [`Simulation`](tick::Simulation)
//! always reaches the same state hash.
//!
//! # Quick Start
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(10, 6);
//! for x in 0..10 {
//!     world.spawn(EntityKind::Wall, GridPos::new(x, 0)).unwrap();
//! }
//! world.spawn(EntityKind::flame(), GridPos::new(4, 1)).unwrap();
//! // An ice block held up by nothing falls next to the flame and puts it out.
//! world.spawn(EntityKind::ice_block(), GridPos::new(5, 4)).unwrap();
//!
//! let mut sim = Simulation::new(world, SimulationConfig::default());
//! sim.run_ticks(3);
//!
//! assert_eq!(sim.world().count_of_kind(KindTag::Flame), 0);
//! assert_eq!(sim.rules().state(), GameState::Won);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod events;
pub mod ice;
pub mod interaction;
pub mod level;
pub mod physics;
pub mod player;
pub mod push;
pub mod replay;
pub mod rules;
pub mod snapshot;
pub mod tick;

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::GridError;

/// Re-export the grid crate for convenience.
pub use icer_grid;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a requested action was refused. A rejected request is a no-op: the
/// world is left exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// The underlying world operation failed (bounds, occupancy, stale id).
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("entity {entity} is not pushable")]
    NotPushable { entity: EntityId },

    /// Firm entities are held in place by their neighbours.
    #[error("entity {entity} is firm and cannot move")]
    Firm { entity: EntityId },

    #[error("push distance {distance} is outside 1..={limit}")]
    TooFar { distance: u32, limit: u32 },

    #[error("entity {entity} is at {actual}, not at the push source {expected}")]
    NotAtSource {
        entity: EntityId,
        expected: GridPos,
        actual: GridPos,
    },

    #[error("{action} is cooling down for another {remaining:.3}s")]
    Cooldown { action: &'static str, remaining: f64 },

    #[error("ice limit of {cap} blocks reached")]
    CapacityExceeded { cap: usize },

    #[error("cannot place ice directly above the hot pot at {pot}")]
    BlockedByHotPot { pot: GridPos },

    #[error("movement into {pos} is blocked")]
    Blocked { pos: GridPos },

    #[error("({dx}, {dy}) is not a unit step")]
    InvalidDirection { dx: i32, dy: i32 },

    #[error("no live player entity")]
    NoPlayer,

    #[error("no ice block at {pos}")]
    NotIce { pos: GridPos },

    /// The level has already been won or lost.
    #[error("the level is over")]
    GameOver,
}

/// Errors raised while building a level from its description.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("unknown object kind '{kind}' at {pos}")]
    UnknownKind { kind: String, pos: GridPos },

    #[error("portal at {pos} has no portal_id")]
    MissingPortalId { pos: GridPos },

    #[error("cannot place {kind} at {pos}: {source}")]
    Placement {
        kind: String,
        pos: GridPos,
        #[source]
        source: GridError,
    },

    #[error("level dimensions must be positive, got {width}x{height}")]
    InvalidSize { width: i32, height: i32 },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("invalid level description: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Re-export everything from the grid prelude.
    pub use icer_grid::prelude::*;

    pub use crate::config::{IceConfig, PhysicsConfig, PlayerConfig, SimulationConfig};
    pub use crate::events::{EventLog, PuzzleEvent, PuzzleEventKind};
    pub use crate::ice::{IceChain, IceOrigin, IceReport, IceStatus, IceSubsystem, SlideStart};
    pub use crate::interaction::{Interaction, InteractionKind};
    pub use crate::level::{LevelDescription, LevelMetadata, ObjectProperties, ObjectSpec};
    pub use crate::physics::{Motion, PhysicsEngine, PhysicsReport};
    pub use crate::player::{IceAction, MoveKind, Player};
    pub use crate::push::{FallCandidate, PushOutcome, PushReport, PushRequest, PushSystem};
    pub use crate::replay::{
        replay, ReplayDivergence, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
    pub use crate::rules::{
        GameState, LoseReason, Observations, Requirements, RulesEngine, RulesStatus,
    };
    pub use crate::snapshot::EngineSnapshot;
    pub use crate::tick::{
        ActionOutcome, InputFrame, PlayerAction, Simulation, TickDiagnostics, TickReport,
    };
    pub use crate::{LevelError, Rejection};
}
