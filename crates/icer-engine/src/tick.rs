//! The fixed-timestep simulation driver.
//!
//! A [`Simulation`] owns the [`World`] and every subsystem, and runs them in
//! one fixed order each [`tick`](Simulation::tick):
//!
//! 1. queued player actions, stamped with the current simulation time;
//! 2. [`World::update`]: clock and cached firmness;
//! 3. [`PhysicsEngine::update`]: gravity, slides, interactions;
//! 4. [`PushSystem::process_pending`];
//! 5. [`IceSubsystem::tick`];
//! 6. [`RulesEngine::update`], fed with what physics and ice observed.
//!
//! Only the tick counter is stored: simulation time is `tick_count *
//! fixed_dt`, never accumulated. With no hidden inputs and a fixed order, the
//! same level and the same actions always give the same state hash.
//!
//! # Example
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(8, 5);
//! for x in 0..8 {
//!     world.spawn(EntityKind::Wall, GridPos::new(x, 0)).unwrap();
//! }
//! world.spawn(EntityKind::flame(), GridPos::new(6, 1)).unwrap();
//!
//! let mut sim = Simulation::new(world, SimulationConfig::default());
//! let player = sim.spawn_player(GridPos::new(2, 1)).unwrap();
//!
//! sim.queue_action(PlayerAction::Move { dx: 1, dy: 0 });
//! let report = sim.tick();
//!
//! assert!(report.actions[0].result.is_ok());
//! assert_eq!(sim.world().pos_of(player), Some(GridPos::new(3, 1)));
//! assert_eq!(sim.rules().moves_taken(), 1);
//! assert_eq!(sim.tick_count(), 1);
//! ```

use std::time::{Duration, Instant};

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::{EntityKind, KindTag};
use icer_grid::world::World;
use icer_grid::GridError;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::events::PuzzleEvent;
use crate::ice::{IceReport, IceSubsystem};
use crate::physics::{PhysicsEngine, PhysicsReport};
use crate::player::Player;
use crate::push::{PushReport, PushSystem};
use crate::rules::{GameState, Observations, Requirements, RulesEngine, RulesStatus};
use crate::Rejection;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One player command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Move { dx: i32, dy: i32 },
    Push { dx: i32 },
    CreateIceLeft,
    CreateIceRight,
}

/// The actions to apply at the start of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    pub actions: Vec<PlayerAction>,
}

impl InputFrame {
    pub fn new(actions: Vec<PlayerAction>) -> Self {
        Self { actions }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub action: PlayerAction,
    pub result: Result<(), Rejection>,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// The tick that was executed (0 for the first).
    pub tick: u64,
    pub actions: Vec<ActionOutcome>,
    pub physics: PhysicsReport,
    pub pushes: PushReport,
    pub ice: IceReport,
    /// Puzzle events recorded by the rules this tick.
    pub events: Vec<PuzzleEvent>,
    pub state: GameState,
}

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per phase, in execution order.
    pub phase_times: Vec<(&'static str, Duration)>,
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Simulation {
    pub(crate) world: World,
    pub(crate) physics: PhysicsEngine,
    pub(crate) push: PushSystem,
    pub(crate) ice: IceSubsystem,
    pub(crate) rules: RulesEngine,
    pub(crate) player: Option<Player>,
    pub(crate) tick_counter: u64,
    pub(crate) config: SimulationConfig,
    pub(crate) current_input: InputFrame,
    last_diagnostics: TickDiagnostics,
}

impl Simulation {
    /// Wrap a prepared world. Ice blocks already in it are adopted as level
    /// ice.
    ///
    /// # Panics
    ///
    /// Panics if `config.physics.fixed_dt` is not positive and finite.
    pub fn new(world: World, config: SimulationConfig) -> Self {
        let physics = PhysicsEngine::new(config.physics.clone());
        let mut ice = IceSubsystem::new(config.ice.clone());
        let adopted = ice.adopt_existing(&world);
        tracing::debug!(
            width = world.width(),
            height = world.height(),
            entities = world.entity_count(),
            adopted,
            "simulation created"
        );
        Self {
            world,
            physics,
            push: PushSystem::new(),
            ice,
            rules: RulesEngine::default(),
            player: None,
            tick_counter: 0,
            config,
            current_input: InputFrame::default(),
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    // -- setup --------------------------------------------------------------

    /// Spawn the player entity at `pos` and take control of it.
    pub fn spawn_player(&mut self, pos: GridPos) -> Result<EntityId, GridError> {
        let id = self.world.spawn(EntityKind::Player, pos)?;
        self.set_player(id)?;
        Ok(id)
    }

    /// Take control of an existing player entity.
    pub fn set_player(&mut self, entity: EntityId) -> Result<(), GridError> {
        let actual = self
            .world
            .kind(entity)
            .map(|k| k.tag())
            .ok_or(GridError::StaleEntity { entity })?;
        if actual != KindTag::Player {
            return Err(GridError::WrongKind {
                entity,
                expected: KindTag::Player,
                actual,
            });
        }
        self.player = Some(Player::new(entity, self.config.player.clone()));
        self.rules.set_player(Some(entity));
        Ok(())
    }

    pub fn set_requirements(&mut self, requirements: Requirements) {
        self.rules.set_requirements(requirements);
    }

    // -- input --------------------------------------------------------------

    /// Append an action to the next tick's input.
    pub fn queue_action(&mut self, action: PlayerAction) {
        self.current_input.actions.push(action);
    }

    /// Replace the next tick's input.
    pub fn set_input(&mut self, input: InputFrame) {
        self.current_input = input;
    }

    /// The input the next tick will consume.
    pub fn current_input(&self) -> &InputFrame {
        &self.current_input
    }

    // -- ticking ------------------------------------------------------------

    /// Execute one simulation tick.
    pub fn tick(&mut self) -> TickReport {
        let tick_start = Instant::now();
        let mut phase_times = Vec::with_capacity(6);
        let tick = self.tick_counter;
        let now = self.sim_time();
        let dt = self.fixed_dt();

        // 1. Player actions.
        let phase = Instant::now();
        let input = std::mem::take(&mut self.current_input);
        let actions: Vec<ActionOutcome> = input
            .actions
            .into_iter()
            .map(|action| ActionOutcome {
                action,
                result: self.apply_action(action, now),
            })
            .collect();
        phase_times.push(("actions", phase.elapsed()));

        // 2. World housekeeping.
        let phase = Instant::now();
        self.world.update(dt);
        let chains = IceSubsystem::find_chains(&self.world);
        phase_times.push(("world", phase.elapsed()));

        // 3. Physics.
        let phase = Instant::now();
        let physics = self.physics.update(dt, &mut self.world, &mut self.ice);
        phase_times.push(("physics", phase.elapsed()));

        // 4. Pushes.
        let phase = Instant::now();
        let pushes = self.push.process_pending(&mut self.world);
        phase_times.push(("push", phase.elapsed()));

        // 5. Ice.
        let phase = Instant::now();
        let ice = self.ice.tick(&mut self.world);
        phase_times.push(("ice", phase.elapsed()));

        // 6. Rules.
        let phase = Instant::now();
        let observations = Observations {
            tick,
            interactions: physics
                .interactions
                .iter()
                .chain(&ice.interactions)
                .cloned()
                .collect(),
            chains,
        };
        let events = self
            .rules
            .update(dt, &mut self.world, &mut self.ice, &observations);
        phase_times.push(("rules", phase.elapsed()));

        self.tick_counter += 1;

        debug_assert!(
            self.world.check_invariants().is_ok(),
            "world invariants violated after tick {tick}: {:?}",
            self.world.check_invariants()
        );
        debug_assert!(
            self.ice.blocks().all(|id| self.world.is_alive(id)),
            "ice manifest out of sync after tick {tick}"
        );

        self.last_diagnostics = TickDiagnostics {
            phase_times,
            total_time: tick_start.elapsed(),
        };

        TickReport {
            tick,
            actions,
            physics,
            pushes,
            ice,
            events,
            state: self.rules.state(),
        }
    }

    fn apply_action(&mut self, action: PlayerAction, now: f64) -> Result<(), Rejection> {
        if self.rules.is_over() {
            return Err(Rejection::GameOver);
        }
        let player = self.player.as_mut().ok_or(Rejection::NoPlayer)?;
        let result = match action {
            PlayerAction::Move { dx, dy } => player
                .try_move(dx, dy, &mut self.world, now)
                .map(drop),
            PlayerAction::Push { dx } => player.try_push(dx, &mut self.push, &self.world, now),
            PlayerAction::CreateIceLeft => player
                .create_ice_left(&mut self.world, &mut self.ice, now)
                .map(drop),
            PlayerAction::CreateIceRight => player
                .create_ice_right(&mut self.world, &mut self.ice, now)
                .map(drop),
        };
        match &result {
            Ok(()) => self.rules.record_move(),
            Err(rejection) => tracing::debug!(?action, %rejection, "action rejected"),
        }
        result
    }

    /// Run `count` ticks. Returns the number of puzzle events recorded.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        (0..count).map(|_| self.tick().events.len() as u64).sum()
    }

    /// Tick until the level is won or lost, or `max_ticks` have run. Returns
    /// the final state.
    pub fn run_until_over(&mut self, max_ticks: u64) -> GameState {
        for _ in 0..max_ticks {
            if self.rules.is_over() {
                break;
            }
            self.tick();
        }
        self.rules.state()
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulation time in seconds, `tick_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt()
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.physics.fixed_dt
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for setup and tests. Ice spawned this way is not
    /// in the ice manifest, though interactions still destroy it.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn ice(&self) -> &IceSubsystem {
        &self.ice
    }

    pub fn physics(&self) -> &PhysicsEngine {
        &self.physics
    }

    pub fn push(&self) -> &PushSystem {
        &self.push
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RulesEngine {
        &mut self.rules
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn state(&self) -> GameState {
        self.rules.state()
    }

    pub fn status(&self) -> RulesStatus {
        self.rules.status(&self.world)
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
