//! The player controller: walking, hopping, pushing and making ice.
//!
//! [`Player`] wraps the player's entity id together with per-action
//! cooldowns. Every action takes the current simulation time and is rejected
//! with [`Rejection::Cooldown`] if it comes too soon after the previous one of
//! the same kind. A rejected action leaves the world untouched.

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::world::World;
use icer_grid::GridError;
use serde::{Deserialize, Serialize};

use crate::config::PlayerConfig;
use crate::ice::IceSubsystem;
use crate::push::{PushRequest, PushSystem};
use crate::Rejection;

/// Slack for cooldown comparisons.
const COOLDOWN_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Stepped into an empty neighbouring cell.
    Walk,
    /// Hopped onto the cell above a low obstacle.
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IceAction {
    Created(EntityId),
    Removed(EntityId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    entity: EntityId,
    last_move: Option<f64>,
    last_jump: Option<f64>,
    last_ice: Option<f64>,
    config: PlayerConfig,
}

impl Player {
    /// Control an already spawned player entity.
    pub fn new(entity: EntityId, config: PlayerConfig) -> Self {
        Self {
            entity,
            last_move: None,
            last_jump: None,
            last_ice: None,
            config,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn position(&self, world: &World) -> Option<GridPos> {
        world.pos_of(self.entity)
    }

    fn standing(&self, world: &World) -> Result<GridPos, Rejection> {
        self.position(world).ok_or(Rejection::NoPlayer)
    }

    fn ready(
        action: &'static str,
        last: Option<f64>,
        cooldown: f64,
        now: f64,
    ) -> Result<(), Rejection> {
        match last {
            Some(last) if now - last + COOLDOWN_EPSILON < cooldown => Err(Rejection::Cooldown {
                action,
                remaining: cooldown - (now - last),
            }),
            _ => Ok(()),
        }
    }

    // -- movement -----------------------------------------------------------

    /// Step one cell. An empty target is walked into; a solid obstacle no
    /// taller than `jump_height` is hopped onto, landing on the cell above it.
    pub fn try_move(
        &mut self,
        dx: i32,
        dy: i32,
        world: &mut World,
        now: f64,
    ) -> Result<MoveKind, Rejection> {
        let pos = self.standing(world)?;
        if dx.abs() + dy.abs() != 1 {
            return Err(Rejection::InvalidDirection { dx, dy });
        }
        Self::ready("move", self.last_move, self.config.move_cooldown, now)?;

        let target = pos.offset(dx, dy);
        if !world.in_bounds(target) {
            return Err(GridError::OutOfBounds {
                pos: target,
                width: world.width(),
                height: world.height(),
            }
            .into());
        }

        let obstacle = world.occupant(target).map(|e| e.capabilities());
        match obstacle {
            None => {
                world.move_to(self.entity, target)?;
                self.last_move = Some(now);
                tracing::debug!(player = %self.entity, from = %pos, to = %target, "walked");
                Ok(MoveKind::Walk)
            }
            Some(caps) if caps.solid && caps.height <= self.config.jump_height => {
                Self::ready("jump", self.last_jump, self.config.jump_cooldown, now)?;
                let landing = target.above();
                let clear = world.in_bounds(landing)
                    && world.at(landing).is_none()
                    && world.is_supported(landing, Some(self.entity));
                if !clear {
                    return Err(Rejection::Blocked { pos: landing });
                }
                world.move_to(self.entity, landing)?;
                self.last_move = Some(now);
                self.last_jump = Some(now);
                tracing::debug!(player = %self.entity, from = %pos, to = %landing, "jumped");
                Ok(MoveKind::Jump)
            }
            Some(_) => Err(Rejection::Blocked { pos: target }),
        }
    }

    /// Queue a one-cell push of the neighbour at `dx` (`-1` or `1`).
    pub fn try_push(
        &mut self,
        dx: i32,
        push: &mut PushSystem,
        world: &World,
        now: f64,
    ) -> Result<(), Rejection> {
        let pos = self.standing(world)?;
        if dx.abs() != 1 {
            return Err(Rejection::InvalidDirection { dx, dy: 0 });
        }
        Self::ready("move", self.last_move, self.config.move_cooldown, now)?;

        let target = pos.offset(dx, 0);
        let entity = world
            .occupant(target)
            .ok_or(Rejection::Blocked { pos: target })?;
        let id = entity.id();
        if !entity.capabilities().pushable {
            return Err(Rejection::NotPushable { entity: id });
        }
        if world.is_firm_now(id) {
            return Err(Rejection::Firm { entity: id });
        }
        let beyond = target.offset(dx, 0);
        if !PushSystem::pushable_from(world, pos, target) {
            return Err(Rejection::Blocked { pos: beyond });
        }

        push.request(PushRequest::new(id, target, beyond));
        self.last_move = Some(now);
        Ok(())
    }

    // -- ice ----------------------------------------------------------------

    /// Create ice at the cell left of and below the player, or remove the ice
    /// already there.
    pub fn create_ice_left(
        &mut self,
        world: &mut World,
        ice: &mut IceSubsystem,
        now: f64,
    ) -> Result<IceAction, Rejection> {
        self.toggle_ice(-1, world, ice, now)
    }

    /// Mirror of [`create_ice_left`](Self::create_ice_left).
    pub fn create_ice_right(
        &mut self,
        world: &mut World,
        ice: &mut IceSubsystem,
        now: f64,
    ) -> Result<IceAction, Rejection> {
        self.toggle_ice(1, world, ice, now)
    }

    fn toggle_ice(
        &mut self,
        dx: i32,
        world: &mut World,
        ice: &mut IceSubsystem,
        now: f64,
    ) -> Result<IceAction, Rejection> {
        let pos = self.standing(world)?;
        Self::ready("ice", self.last_ice, self.config.ice_cooldown, now)?;

        let target = pos.offset(dx, -1);
        let action = if world.occupant(target).is_some_and(|e| e.kind().is_ice()) {
            IceAction::Removed(ice.remove_at(world, target)?)
        } else {
            IceAction::Created(ice.create_at(world, target)?)
        };
        self.last_ice = Some(now);
        Ok(action)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use icer_grid::kind::EntityKind;

    fn p(x: i32, y: i32) -> GridPos {
        GridPos::new(x, y)
    }

    /// 8x6 world with a wall floor and the player at (2, 1).
    fn setup() -> (World, Player) {
        let mut world = World::new(8, 6);
        for x in 0..8 {
            world.spawn(EntityKind::Wall, p(x, 0)).unwrap();
        }
        let id = world.spawn(EntityKind::Player, p(2, 1)).unwrap();
        (world, Player::new(id, PlayerConfig::default()))
    }

    // -- 1. moving ----------------------------------------------------------

    #[test]
    fn walks_into_empty_cell() {
        let (mut world, mut player) = setup();
        assert_eq!(player.try_move(1, 0, &mut world, 0.0), Ok(MoveKind::Walk));
        assert_eq!(player.position(&world), Some(p(3, 1)));
    }

    #[test]
    fn move_cooldown_is_enforced() {
        let (mut world, mut player) = setup();
        player.try_move(1, 0, &mut world, 0.0).unwrap();
        assert!(matches!(
            player.try_move(1, 0, &mut world, 0.1),
            Err(Rejection::Cooldown { action: "move", .. })
        ));
        assert_eq!(player.try_move(1, 0, &mut world, 0.2), Ok(MoveKind::Walk));
        assert_eq!(player.position(&world), Some(p(4, 1)));
    }

    #[test]
    fn hops_onto_low_obstacle() {
        let (mut world, mut player) = setup();
        world.spawn(EntityKind::Stone, p(3, 1)).unwrap();
        assert_eq!(player.try_move(1, 0, &mut world, 0.0), Ok(MoveKind::Jump));
        assert_eq!(player.position(&world), Some(p(3, 2)));
    }

    #[test]
    fn jump_has_its_own_cooldown() {
        let (mut world, mut player) = setup();
        world.spawn(EntityKind::Stone, p(3, 1)).unwrap();
        world.spawn(EntityKind::Stone, p(4, 2)).unwrap();
        player.try_move(1, 0, &mut world, 0.0).unwrap();
        // Move cooldown has passed, jump cooldown has not.
        assert!(matches!(
            player.try_move(1, 0, &mut world, 0.25),
            Err(Rejection::Cooldown { action: "jump", .. })
        ));
        assert_eq!(player.try_move(1, 0, &mut world, 0.3), Ok(MoveKind::Jump));
        assert_eq!(player.position(&world), Some(p(4, 3)));
    }

    #[test]
    fn blocked_landing_is_rejected() {
        let (mut world, mut player) = setup();
        world.spawn(EntityKind::Stone, p(3, 1)).unwrap();
        world.spawn(EntityKind::Wall, p(3, 2)).unwrap();
        assert_eq!(
            player.try_move(1, 0, &mut world, 0.0),
            Err(Rejection::Blocked { pos: p(3, 2) })
        );
        assert_eq!(player.position(&world), Some(p(2, 1)));
    }

    #[test]
    fn edge_and_diagonal_are_rejected() {
        let (mut world, mut player) = setup();
        assert_eq!(
            player.try_move(1, 1, &mut world, 0.0),
            Err(Rejection::InvalidDirection { dx: 1, dy: 1 })
        );
        world.move_to(player.entity(), p(7, 1)).unwrap();
        assert!(matches!(
            player.try_move(1, 0, &mut world, 0.0),
            Err(Rejection::Grid(GridError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn dead_player_cannot_act() {
        let (mut world, mut player) = setup();
        world.remove(player.entity()).unwrap();
        assert_eq!(
            player.try_move(1, 0, &mut world, 0.0),
            Err(Rejection::NoPlayer)
        );
    }

    // -- 2. pushing ---------------------------------------------------------

    #[test]
    fn push_is_queued_not_applied() {
        let (mut world, mut player) = setup();
        // A stone on the wall floor would be firm; on ice it is loose.
        world.remove(world.at(p(3, 0)).unwrap()).unwrap();
        world.spawn(EntityKind::ice_block(), p(3, 0)).unwrap();
        let stone = world.spawn(EntityKind::Stone, p(3, 1)).unwrap();
        let mut push = PushSystem::new();

        player.try_push(1, &mut push, &world, 0.0).unwrap();
        assert_eq!(push.pending_len(), 1);
        assert_eq!(world.pos_of(stone), Some(p(3, 1)));

        push.process_pending(&mut world);
        assert_eq!(world.pos_of(stone), Some(p(4, 1)));
    }

    #[test]
    fn push_rejections() {
        let (mut world, mut player) = setup();
        let mut push = PushSystem::new();
        assert_eq!(
            player.try_push(1, &mut push, &world, 0.0),
            Err(Rejection::Blocked { pos: p(3, 1) })
        );
        let wall = world.spawn(EntityKind::Wall, p(1, 1)).unwrap();
        assert_eq!(
            player.try_push(-1, &mut push, &world, 0.0),
            Err(Rejection::NotPushable { entity: wall })
        );
        let stone = world.spawn(EntityKind::Stone, p(3, 1)).unwrap();
        assert_eq!(
            player.try_push(1, &mut push, &world, 0.0),
            Err(Rejection::Firm { entity: stone })
        );
        world.remove(world.at(p(3, 0)).unwrap()).unwrap();
        world.spawn(EntityKind::ice_block(), p(3, 0)).unwrap();
        world.spawn(EntityKind::Player, p(4, 1)).unwrap();
        assert_eq!(
            player.try_push(1, &mut push, &world, 0.0),
            Err(Rejection::Blocked { pos: p(4, 1) })
        );
        assert_eq!(push.pending_len(), 0);
    }

    // -- 3. ice -------------------------------------------------------------

    #[test]
    fn ice_toggles_below_left_and_right() {
        let (mut world, mut player) = setup();
        world.move_to(player.entity(), p(2, 3)).unwrap();
        let mut ice = IceSubsystem::default();

        let IceAction::Created(left) = player.create_ice_left(&mut world, &mut ice, 0.0).unwrap()
        else {
            panic!("expected creation");
        };
        assert_eq!(world.pos_of(left), Some(p(1, 2)));

        let right = player.create_ice_right(&mut world, &mut ice, 0.1).unwrap();
        assert!(matches!(right, IceAction::Created(_)));

        assert_eq!(
            player.create_ice_left(&mut world, &mut ice, 0.2),
            Ok(IceAction::Removed(left))
        );
        assert!(!world.is_alive(left));
    }

    #[test]
    fn ice_cooldown_is_enforced() {
        let (mut world, mut player) = setup();
        world.move_to(player.entity(), p(2, 3)).unwrap();
        let mut ice = IceSubsystem::default();
        player.create_ice_left(&mut world, &mut ice, 1.0).unwrap();
        assert!(matches!(
            player.create_ice_right(&mut world, &mut ice, 1.05),
            Err(Rejection::Cooldown { action: "ice", .. })
        ));
    }

    #[test]
    fn failed_ice_action_does_not_start_cooldown() {
        let (mut world, mut player) = setup();
        let mut ice = IceSubsystem::default();
        // Below-left of (2,1) is the floor wall at (1,0).
        assert!(matches!(
            player.create_ice_left(&mut world, &mut ice, 0.0),
            Err(Rejection::Grid(GridError::Occupied { .. }))
        ));
        world.move_to(player.entity(), p(2, 3)).unwrap();
        assert!(player.create_ice_left(&mut world, &mut ice, 0.01).is_ok());
    }
}
