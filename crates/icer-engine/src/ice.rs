//! The ice subsystem: player-made ice, slide starts and collapsing stacks.
//!
//! [`IceSubsystem`] keeps a manifest of every live ice block, recording
//! whether it came from the level or was created by the player (only the
//! latter count against the block limit). The [`World`] stays the source of
//! truth: every path that destroys ice through this crate goes through
//! [`IceSubsystem::destroy`], which removes the block from the world and the
//! manifest in one call.
//!
//! Each [`tick`](IceSubsystem::tick) runs three steps in order:
//!
//! 1. refresh the firmness flag of every manifested block;
//! 2. start a slide for each loose block resting on another ice block;
//! 3. apply extinguish and melt interactions.
//!
//! # Example
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(6, 6);
//! let mut ice = IceSubsystem::new(IceConfig { max_blocks: 1 });
//!
//! let block = ice.create_at(&mut world, GridPos::new(2, 0)).unwrap();
//! assert!(ice.contains(block));
//!
//! // The limit counts live player-made blocks.
//! assert!(matches!(
//!     ice.create_at(&mut world, GridPos::new(4, 0)),
//!     Err(Rejection::CapacityExceeded { cap: 1 })
//! ));
//! ice.remove_at(&mut world, GridPos::new(2, 0)).unwrap();
//! assert!(ice.create_at(&mut world, GridPos::new(4, 0)).is_ok());
//! ```

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::{Direction, EntityKind, KindTag};
use icer_grid::world::World;
use icer_grid::GridError;
use serde::{Deserialize, Serialize};

use crate::config::IceConfig;
use crate::interaction::{self, Interaction, InteractionKind};
use crate::Rejection;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a manifested ice block came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IceOrigin {
    Level,
    Player,
}

/// A column of ice blocks that will fall together: the lowest block has lost
/// its support and every other block rests on the one below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceChain {
    /// Position of the lowest block.
    pub base: GridPos,
    /// Blocks from the bottom up.
    pub blocks: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideStart {
    pub entity: EntityId,
    pub direction: Direction,
}

/// What one [`IceSubsystem::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IceReport {
    /// Manifested blocks that are firm after the refresh.
    pub firm: usize,
    pub slides_started: Vec<SlideStart>,
    pub interactions: Vec<Interaction>,
    /// Manifest entries dropped because their block was removed elsewhere.
    pub pruned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceStatus {
    pub total: usize,
    pub player_created: usize,
    pub max_blocks: usize,
    pub sliding: usize,
    pub firm: usize,
}

// ---------------------------------------------------------------------------
// IceSubsystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceSubsystem {
    manifest: BTreeMap<EntityId, IceOrigin>,
    config: IceConfig,
}

impl IceSubsystem {
    pub fn new(config: IceConfig) -> Self {
        Self {
            manifest: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &IceConfig {
        &self.config
    }

    /// Register every ice block already in the world (level setup) that is
    /// not yet in the manifest. Returns how many were added.
    pub fn adopt_existing(&mut self, world: &World) -> usize {
        let mut adopted = 0;
        for id in world.find_all_of_kind(KindTag::IceBlock) {
            if let Entry::Vacant(slot) = self.manifest.entry(id) {
                slot.insert(IceOrigin::Level);
                adopted += 1;
            }
        }
        adopted
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.manifest.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }

    /// Live blocks created by the player.
    pub fn player_created(&self) -> usize {
        self.manifest
            .values()
            .filter(|&&origin| origin == IceOrigin::Player)
            .count()
    }

    /// Manifested block ids in id order.
    pub fn blocks(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.manifest.keys().copied()
    }

    // -- create / remove ----------------------------------------------------

    /// Create a player ice block at `pos`.
    ///
    /// # Errors
    ///
    /// - the cell is out of bounds or occupied;
    /// - the player-created block count is at the limit;
    /// - the cell directly below holds a hot pot.
    pub fn create_at(&mut self, world: &mut World, pos: GridPos) -> Result<EntityId, Rejection> {
        if !world.in_bounds(pos) {
            return Err(GridError::OutOfBounds {
                pos,
                width: world.width(),
                height: world.height(),
            }
            .into());
        }
        if let Some(occupant) = world.at(pos) {
            return Err(GridError::Occupied { pos, occupant }.into());
        }
        let cap = self.config.max_blocks;
        let live_player_blocks = self
            .manifest
            .iter()
            .filter(|&(&id, &origin)| origin == IceOrigin::Player && world.is_alive(id))
            .count();
        if live_player_blocks >= cap {
            tracing::debug!(%pos, cap, "ice creation rejected: limit reached");
            return Err(Rejection::CapacityExceeded { cap });
        }
        let below = pos.below();
        if world.occupant(below).is_some_and(|e| e.kind().is_hot_pot()) {
            tracing::debug!(%pos, "ice creation rejected: hot pot below");
            return Err(Rejection::BlockedByHotPot { pot: below });
        }

        let id = world.spawn(EntityKind::ice_block(), pos)?;
        self.manifest.insert(id, IceOrigin::Player);
        tracing::debug!(entity = %id, %pos, "ice created");
        Ok(id)
    }

    /// Remove the ice block at `pos`.
    pub fn remove_at(&mut self, world: &mut World, pos: GridPos) -> Result<EntityId, Rejection> {
        let id = world
            .occupant(pos)
            .filter(|e| e.kind().is_ice())
            .map(|e| e.id())
            .ok_or(Rejection::NotIce { pos })?;
        self.destroy(world, id)?;
        tracing::debug!(entity = %id, %pos, "ice removed");
        Ok(id)
    }

    /// Destroy an ice block in the world and drop it from the manifest.
    pub fn destroy(&mut self, world: &mut World, id: EntityId) -> Result<GridPos, GridError> {
        let pos = world.remove(id)?;
        self.manifest.remove(&id);
        Ok(pos)
    }

    /// Destroy every manifested block. Returns how many were removed.
    pub fn clear_all(&mut self, world: &mut World) -> usize {
        let ids: Vec<EntityId> = self.manifest.keys().copied().collect();
        let removed = ids
            .into_iter()
            .filter(|&id| self.destroy(world, id).is_ok())
            .count();
        self.manifest.clear();
        removed
    }

    // -- tick ---------------------------------------------------------------

    /// Run one ice step: firmness, slide starts, interactions.
    pub fn tick(&mut self, world: &mut World) -> IceReport {
        let before = self.manifest.len();
        self.manifest.retain(|&id, _| world.is_alive(id));
        let pruned = before - self.manifest.len();
        if pruned > 0 {
            tracing::trace!(pruned, "dropped ice removed outside the subsystem");
        }

        let ids: Vec<EntityId> = self.manifest.keys().copied().collect();
        let firm = ids
            .iter()
            .filter(|&&id| world.refresh_firmness_of(id) == Some(true))
            .count();

        let slides_started = world
            .find_all_of_kind(KindTag::IceBlock)
            .into_iter()
            .filter(|id| self.manifest.contains_key(id))
            .filter_map(|id| {
                Self::start_slide_if_slippery(world, id).map(|direction| SlideStart {
                    entity: id,
                    direction,
                })
            })
            .collect();

        let interactions = interaction::run_pass(
            world,
            self,
            &[InteractionKind::Extinguish, InteractionKind::Melt],
        );

        IceReport {
            firm,
            slides_started,
            interactions,
            pruned,
        }
    }

    /// Start a slide for a loose ice block resting on another ice block.
    ///
    /// Directions are tried in [`Direction::SLIDE_ORDER`]; the first
    /// destination that is in bounds, empty and supported wins. Returns the
    /// chosen direction, or `None` if the block is firm, already sliding, not
    /// resting on ice, or boxed in.
    pub fn start_slide_if_slippery(world: &mut World, id: EntityId) -> Option<Direction> {
        let entity = world.entity(id).filter(|e| e.is_active())?;
        let sliding = entity.kind().ice_state()?.sliding;
        let pos = entity.pos();
        if sliding || world.is_firm_now(id) {
            return None;
        }
        if !world.occupant(pos.below()).is_some_and(|e| e.kind().is_ice()) {
            return None;
        }

        let direction = Direction::SLIDE_ORDER.into_iter().find(|dir| {
            let (dx, dy) = dir.delta();
            let dest = pos.offset(dx, dy);
            world.in_bounds(dest) && world.at(dest).is_none() && world.is_supported(dest, Some(id))
        })?;
        world.set_slide(id, Some(direction)).ok()?;
        tracing::debug!(entity = %id, %pos, ?direction, "slide started");
        Some(direction)
    }

    // -- queries ------------------------------------------------------------

    /// Find ice columns that are about to collapse together.
    ///
    /// Starting from every loose ice block that has lost its support (bottom
    /// row first), walk upward through the ice stacked directly on top of it,
    /// stopping at the first block that is held firm. Walks of two or more
    /// blocks are reported. A block already part of a reported chain never
    /// starts another one. This is a pure query.
    pub fn find_chains(world: &World) -> Vec<IceChain> {
        let mut claimed: BTreeSet<EntityId> = BTreeSet::new();
        let mut chains = Vec::new();

        for id in world.find_all_of_kind(KindTag::IceBlock) {
            if claimed.contains(&id) || world.is_firm_now(id) {
                continue;
            }
            let Some(base) = world.pos_of(id) else {
                continue;
            };
            if world.is_supported(base, None) {
                continue;
            }

            let mut blocks = vec![id];
            let mut cursor = base;
            while let Some(above) = world
                .occupant(cursor.above())
                .filter(|e| e.kind().is_ice() && !world.is_firm_now(e.id()))
            {
                blocks.push(above.id());
                cursor = above.pos();
            }

            if blocks.len() >= 2 {
                claimed.extend(blocks.iter().copied());
                chains.push(IceChain { base, blocks });
            }
        }
        chains
    }

    pub fn status(&self, world: &World) -> IceStatus {
        let live = move || {
            self.manifest
                .keys()
                .filter_map(move |&id| world.entity(id).filter(|e| e.is_active()))
        };
        IceStatus {
            total: self.manifest.len(),
            player_created: self.player_created(),
            max_blocks: self.config.max_blocks,
            sliding: live()
                .filter(|e| e.kind().ice_state().is_some_and(|s| s.sliding))
                .count(),
            firm: live().filter(|e| e.is_firm()).count(),
        }
    }
}

impl Default for IceSubsystem {
    fn default() -> Self {
        Self::new(IceConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
