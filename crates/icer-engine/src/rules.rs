//! Puzzle rules: cross-entity passes, win/lose evaluation and the event log.
//!
//! Every [`update`](RulesEngine::update) of an active level runs, in order:
//!
//! 1. advance the level clock;
//! 2. log the interactions physics and the ice subsystem already applied;
//! 3. its own passes: extinguish, ignite, melt, portal transport, chain
//!    reaction logging;
//! 4. the win predicates, then the lose predicates.
//!
//! [`GameState::Won`] and [`GameState::Lost`] are terminal: once reached,
//! `update` does nothing until [`reset`](RulesEngine::reset).
//!
//! # Example
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(6, 4);
//! world.spawn(EntityKind::Stone, GridPos::new(1, 0)).unwrap();
//! let mut ice = IceSubsystem::default();
//!
//! // No flames at all: the default requirements are already met.
//! let mut rules = RulesEngine::new(Requirements::default());
//! rules.update(1.0 / 60.0, &mut world, &mut ice, &Observations::default());
//! assert_eq!(rules.state(), GameState::Won);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::KindTag;
use icer_grid::world::World;
use serde::{Deserialize, Serialize};

use crate::events::{EventLog, PuzzleEvent, PuzzleEventKind};
use crate::ice::{IceChain, IceSubsystem};
use crate::interaction::{self, Interaction, InteractionKind};

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Per-level win and lose predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Requirements {
    /// Win when no flame is left.
    #[serde(alias = "require_all_flames_extinguished")]
    pub all_flames_extinguished: bool,
    /// Win when the player stands on [`exit`](Self::exit).
    #[serde(alias = "require_player_at_exit")]
    pub player_at_exit: bool,
    pub exit: Option<GridPos>,
    /// Win when at least this many puzzle events were logged. Zero disables.
    #[serde(alias = "require_min_objects_collected")]
    pub min_objects_collected: usize,
    /// Lose once the level clock exceeds this many seconds.
    pub time_limit: Option<f64>,
    /// Lose once more than this many moves were taken.
    pub move_limit: Option<u32>,
    pub lose_on_player_death: bool,
    /// Standing directly on a hot pot counts as death.
    pub hot_pot_is_deadly: bool,
}

impl Default for Requirements {
    fn default() -> Self {
        Self {
            all_flames_extinguished: true,
            player_at_exit: false,
            exit: None,
            min_objects_collected: 0,
            time_limit: None,
            move_limit: None,
            lose_on_player_death: true,
            hot_pot_is_deadly: true,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    #[default]
    Active,
    Won,
    Lost,
}

impl GameState {
    pub fn is_over(self) -> bool {
        self != GameState::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoseReason {
    TimeLimit,
    MoveLimit,
    PlayerDied,
}

impl fmt::Display for LoseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoseReason::TimeLimit => "Time limit exceeded",
            LoseReason::MoveLimit => "Move limit exceeded",
            LoseReason::PlayerDied => "Player died",
        })
    }
}

/// What the other subsystems saw this tick, handed to the rules for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    /// Tick being simulated.
    pub tick: u64,
    /// Interactions already applied by physics and the ice subsystem.
    pub interactions: Vec<Interaction>,
    /// Chains found before physics ran, while they were still standing.
    pub chains: Vec<IceChain>,
}

/// Serializable summary of the level, for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesStatus {
    pub state: GameState,
    pub lose_reason: Option<LoseReason>,
    pub moves_taken: u32,
    pub time_elapsed: f64,
    pub flames_remaining: usize,
    pub ice_blocks: usize,
    pub puzzles_solved: Vec<String>,
}

// ---------------------------------------------------------------------------
// RulesEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesEngine {
    requirements: Requirements,
    state: GameState,
    lose_reason: Option<LoseReason>,
    moves_taken: u32,
    time_elapsed: f64,
    events: EventLog,
    /// Block lists of the chains logged while they still stand.
    logged_chains: BTreeSet<Vec<EntityId>>,
    player: Option<EntityId>,
}

impl RulesEngine {
    pub fn new(requirements: Requirements) -> Self {
        Self {
            requirements,
            state: GameState::Active,
            lose_reason: None,
            moves_taken: 0,
            time_elapsed: 0.0,
            events: EventLog::new(),
            logged_chains: BTreeSet::new(),
            player: None,
        }
    }

    // -- configuration ------------------------------------------------------

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub fn set_requirements(&mut self, requirements: Requirements) {
        self.requirements = requirements;
    }

    /// The entity portal transport and player death apply to.
    pub fn set_player(&mut self, player: Option<EntityId>) {
        self.player = player;
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    pub fn lose_reason(&self) -> Option<LoseReason> {
        self.lose_reason
    }

    pub fn moves_taken(&self) -> u32 {
        self.moves_taken
    }

    pub fn time_elapsed(&self) -> f64 {
        self.time_elapsed
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn record_move(&mut self) {
        self.moves_taken += 1;
    }

    /// Back to a fresh active level: state, counters, event log and chain
    /// memory are cleared. Requirements and the player are kept.
    pub fn reset(&mut self) {
        self.state = GameState::Active;
        self.lose_reason = None;
        self.moves_taken = 0;
        self.time_elapsed = 0.0;
        self.events.clear();
        self.logged_chains.clear();
    }

    pub fn status(&self, world: &World) -> RulesStatus {
        RulesStatus {
            state: self.state,
            lose_reason: self.lose_reason,
            moves_taken: self.moves_taken,
            time_elapsed: self.time_elapsed,
            flames_remaining: world.count_of_kind(KindTag::Flame),
            ice_blocks: world.count_of_kind(KindTag::IceBlock),
            puzzles_solved: self
                .events
                .descriptions()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }

    // -- update -------------------------------------------------------------

    /// Run one rules step. Returns the events recorded by this call.
    pub fn update(
        &mut self,
        dt: f64,
        world: &mut World,
        ice: &mut IceSubsystem,
        observed: &Observations,
    ) -> Vec<PuzzleEvent> {
        if self.state.is_over() {
            return Vec::new();
        }
        let first_new = self.events.len();
        let tick = observed.tick;
        self.time_elapsed += dt;

        for interaction in &observed.interactions {
            self.log_interaction(tick, interaction);
        }

        for kind in [
            InteractionKind::Extinguish,
            InteractionKind::Ignite,
            InteractionKind::Melt,
        ] {
            for interaction in interaction::run_pass(world, ice, &[kind]) {
                self.log_interaction(tick, &interaction);
            }
        }

        if let Some((from, portal, linked)) = self.transport_player(world) {
            let entities = self.player.into_iter().chain([portal, linked]).collect();
            self.events
                .record(tick, PuzzleEventKind::PortalTransport, from, entities);
        }

        self.log_chains(tick, world, &observed.chains);

        if self.win_reached(world) {
            self.state = GameState::Won;
            tracing::info!(
                moves = self.moves_taken,
                time = self.time_elapsed,
                puzzles = self.events.len(),
                "level complete"
            );
        } else if let Some(reason) = self.lose_reached(world) {
            self.state = GameState::Lost;
            self.lose_reason = Some(reason);
            tracing::info!(
                %reason,
                moves = self.moves_taken,
                time = self.time_elapsed,
                "level failed"
            );
        }

        self.events.all()[first_new..].to_vec()
    }

    fn log_interaction(&mut self, tick: u64, interaction: &Interaction) {
        self.events.record(
            tick,
            interaction.kind.into(),
            interaction.site,
            vec![interaction.source, interaction.target],
        );
    }

    /// Move the player through the first usable portal above them. Returns
    /// the portal cell, the portal and its partner.
    fn transport_player(&self, world: &mut World) -> Option<(GridPos, EntityId, EntityId)> {
        let player = self.player?;
        let standing = world.pos_of(player)?;

        let (portal, at, dest) = world
            .find_all_of_kind(KindTag::Portal)
            .into_iter()
            .find_map(|portal| {
                let state = world.kind(portal)?.portal_state()?;
                let at = world.pos_of(portal)?;
                let rise = at.y - standing.y;
                if !state.active || at.x != standing.x || rise < 1 || rise > state.height_difference
                {
                    return None;
                }
                let linked = world.linked_portal(portal)?;
                if !world.kind(linked)?.portal_state()?.active {
                    return None;
                }
                let dest = world.pos_of(linked)?;
                let usable = world.in_bounds(dest)
                    && world.at(dest).is_none()
                    && world.is_supported(dest, Some(player));
                usable.then_some((portal, at, dest))
            })?;

        world.move_to(player, dest).ok()?;
        let linked = world.linked_portal(portal)?;
        tracing::debug!(%player, from = %standing, to = %dest, "portal transport");
        Some((at, portal, linked))
    }

    /// Log every chain not logged while it stood on an earlier tick. Only
    /// chains seen this tick stay remembered.
    fn log_chains(&mut self, tick: u64, world: &World, observed: &[IceChain]) {
        let standing = IceSubsystem::find_chains(world);
        let mut seen: BTreeSet<Vec<EntityId>> = BTreeSet::new();

        for chain in observed.iter().chain(standing.iter()) {
            if !seen.insert(chain.blocks.clone()) || self.logged_chains.contains(&chain.blocks) {
                continue;
            }
            self.events.record(
                tick,
                PuzzleEventKind::ChainReaction,
                chain.base,
                chain.blocks.clone(),
            );
        }
        self.logged_chains = seen;
    }

    fn win_reached(&self, world: &World) -> bool {
        let req = &self.requirements;
        if req.all_flames_extinguished && world.count_of_kind(KindTag::Flame) == 0 {
            return true;
        }
        if req.player_at_exit {
            let at_exit = self
                .player
                .and_then(|p| world.pos_of(p))
                .is_some_and(|pos| Some(pos) == req.exit);
            if at_exit {
                return true;
            }
        }
        req.min_objects_collected > 0 && self.events.len() >= req.min_objects_collected
    }

    fn lose_reached(&self, world: &World) -> Option<LoseReason> {
        let req = &self.requirements;
        if req.time_limit.is_some_and(|limit| self.time_elapsed > limit) {
            return Some(LoseReason::TimeLimit);
        }
        if req.move_limit.is_some_and(|limit| self.moves_taken > limit) {
            return Some(LoseReason::MoveLimit);
        }
        if req.lose_on_player_death && self.player_dead(world) {
            return Some(LoseReason::PlayerDied);
        }
        None
    }

    /// The player is gone, or stands directly on a hot pot when that is
    /// deadly.
    fn player_dead(&self, world: &World) -> bool {
        let Some(player) = self.player else {
            return false;
        };
        match world.pos_of(player) {
            None => true,
            Some(pos) => {
                self.requirements.hot_pot_is_deadly
                    && world
                        .occupant(pos.below())
                        .is_some_and(|e| e.kind().is_hot_pot())
            }
        }
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new(Requirements::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
