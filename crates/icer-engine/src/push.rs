//! Pushing pushable objects one move at a time.
//!
//! A push is validated in a fixed order and either applied as a single
//! atomic move or rejected with the first failing reason, leaving the world
//! untouched. After a successful push:
//!
//! - an ice block that landed on ice may start sliding;
//! - whatever stood on the vacated cell is reported as a chain-fall
//!   candidate. It is not moved here; the next gravity pass drops it.
//!
//! Requests can also be queued with [`PushSystem::request`] and applied in
//! FIFO order by [`PushSystem::process_pending`].
//!
//! # Example
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(6, 4);
//! let stone = world.spawn(EntityKind::Stone, GridPos::new(2, 0)).unwrap();
//!
//! let mut push = PushSystem::new();
//! push.request(PushRequest::new(stone, GridPos::new(2, 0), GridPos::new(3, 0)));
//! let report = push.process_pending(&mut world);
//!
//! assert_eq!(report.applied.len(), 1);
//! assert_eq!(world.pos_of(stone), Some(GridPos::new(3, 0)));
//! ```

use std::collections::VecDeque;

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::Direction;
use icer_grid::world::World;
use icer_grid::GridError;
use serde::{Deserialize, Serialize};

use crate::ice::IceSubsystem;
use crate::Rejection;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub entity: EntityId,
    pub from: GridPos,
    pub to: GridPos,
}

impl PushRequest {
    pub fn new(entity: EntityId, from: GridPos, to: GridPos) -> Self {
        Self { entity, from, to }
    }
}

/// An entity left without support by a push, with how far it will drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallCandidate {
    pub entity: EntityId,
    pub distance: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub entity: EntityId,
    pub from: GridPos,
    pub to: GridPos,
    /// Slide started on the pushed ice block, if any.
    pub slide: Option<Direction>,
    pub chain_fall: Option<FallCandidate>,
}

/// Result of draining the request queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushReport {
    pub applied: Vec<PushOutcome>,
    #[serde(skip)]
    pub rejected: Vec<(PushRequest, Rejection)>,
}

// ---------------------------------------------------------------------------
// PushSystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushSystem {
    queue: VecDeque<PushRequest>,
}

impl PushSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and apply a push of `entity` from `from` to `to`.
    ///
    /// Checks, in order: the entity is active, pushable, not firm (computed
    /// live), the distance is within `1..=push_distance`, the entity is at
    /// `from`, and `to` is in bounds and empty.
    pub fn try_push(
        world: &mut World,
        entity: EntityId,
        from: GridPos,
        to: GridPos,
    ) -> Result<PushOutcome, Rejection> {
        let (caps, actual) = world
            .entity(entity)
            .filter(|e| e.is_active())
            .map(|e| (e.capabilities(), e.pos()))
            .ok_or(GridError::StaleEntity { entity })?;

        if !caps.pushable {
            return Err(Rejection::NotPushable { entity });
        }
        if world.is_firm_now(entity) {
            return Err(Rejection::Firm { entity });
        }
        let distance = from.manhattan(to);
        if distance == 0 || distance > caps.push_distance {
            return Err(Rejection::TooFar {
                distance,
                limit: caps.push_distance,
            });
        }
        if actual != from {
            return Err(Rejection::NotAtSource {
                entity,
                expected: from,
                actual,
            });
        }
        world.move_to(entity, to)?;

        let slide = if world.kind(entity).is_some_and(|k| k.is_ice()) {
            IceSubsystem::start_slide_if_slippery(world, entity)
        } else {
            None
        };
        let chain_fall = Self::fall_candidate_above(world, from, entity);
        tracing::debug!(%entity, %from, %to, ?slide, ?chain_fall, "pushed");

        Ok(PushOutcome {
            entity,
            from,
            to,
            slide,
            chain_fall,
        })
    }

    /// The entity standing on `vacated` (other than the pushed one), if it is
    /// affected by gravity and now has nothing holding it up.
    fn fall_candidate_above(
        world: &World,
        vacated: GridPos,
        pushed: EntityId,
    ) -> Option<FallCandidate> {
        let above = vacated.above();
        let entity = world
            .occupant(above)
            .filter(|e| e.id() != pushed && e.capabilities().affected_by_gravity)?;
        if world.is_supported(above, None) {
            return None;
        }

        let mut distance = 0;
        let mut cursor = above;
        while cursor.y > 0 && world.at(cursor.below()).is_none() {
            cursor = cursor.below();
            distance += 1;
        }
        (distance > 0).then_some(FallCandidate {
            entity: entity.id(),
            distance,
        })
    }

    // -- queue --------------------------------------------------------------

    pub fn request(&mut self, request: PushRequest) {
        tracing::trace!(?request, "push queued");
        self.queue.push_back(request);
    }

    /// Apply every queued request in FIFO order. Rejected requests are
    /// dropped.
    pub fn process_pending(&mut self, world: &mut World) -> PushReport {
        let mut report = PushReport::default();
        while let Some(request) = self.queue.pop_front() {
            match Self::try_push(world, request.entity, request.from, request.to) {
                Ok(outcome) => report.applied.push(outcome),
                Err(rejection) => {
                    tracing::trace!(?request, %rejection, "push rejected");
                    report.rejected.push((request, rejection));
                }
            }
        }
        report
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PushRequest> {
        self.queue.iter()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    // -- queries ------------------------------------------------------------

    /// Whether something standing at `pusher` can push the occupant of the
    /// adjacent `target` cell one cell further in the same direction.
    pub fn pushable_from(world: &World, pusher: GridPos, target: GridPos) -> bool {
        if pusher.manhattan(target) != 1 {
            return false;
        }
        let Some(entity) = world.occupant(target) else {
            return false;
        };
        if !entity.capabilities().pushable || world.is_firm_now(entity.id()) {
            return false;
        }
        let beyond = target.offset(target.x - pusher.x, target.y - pusher.y);
        world.in_bounds(beyond) && world.at(beyond).is_none()
    }

    /// Where a one-cell push of `entity` towards `direction` would put it,
    /// or `None` if that cell is out of bounds or taken.
    pub fn preview(world: &World, entity: EntityId, direction: Direction) -> Option<GridPos> {
        let e = world.entity(entity).filter(|e| e.is_active())?;
        if !e.capabilities().pushable {
            return None;
        }
        let (dx, dy) = direction.delta();
        let to = e.pos().offset(dx, dy);
        (world.in_bounds(to) && world.at(to).is_none()).then_some(to)
    }

    /// Pushable entities that are not firm, row-major.
    pub fn pushable_objects(world: &World) -> Vec<EntityId> {
        world
            .iterate()
            .into_iter()
            .map(|(_, id)| id)
            .filter(|&id| {
                world
                    .entity(id)
                    .is_some_and(|e| e.capabilities().pushable && !world.is_firm_now(id))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
