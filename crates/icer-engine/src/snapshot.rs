//! Simulation snapshot and restore with BLAKE3 hashing.
//!
//! An [`EngineSnapshot`] holds everything that influences future ticks: the
//! world, every subsystem's state (ice manifest, physics accumulator, pending
//! pushes, rules progress and event log, player cooldowns), the tick counter,
//! the configuration and the pending input. Its `hash` is a BLAKE3 hex digest
//! of all of that, so two simulations with equal hashes will evolve
//! identically under the same actions.
//!
//! # Usage
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(6, 6);
//! world.spawn(EntityKind::Stone, GridPos::new(2, 5)).unwrap();
//! world.spawn(EntityKind::flame(), GridPos::new(5, 0)).unwrap();
//! let mut sim = Simulation::new(world, SimulationConfig::default());
//! sim.run_ticks(2);
//!
//! let snapshot = sim.capture_snapshot();
//! assert_eq!(snapshot.tick_counter, 2);
//! assert_eq!(snapshot.hash.len(), 64);
//!
//! sim.run_ticks(10);
//! sim.restore_from_snapshot(&snapshot).unwrap();
//! assert_eq!(sim.tick_count(), 2);
//! assert_eq!(sim.state_hash(), snapshot.hash);
//! ```
//!
//! Timing diagnostics are transient and never snapshotted.

use icer_grid::kind::KindTag;
use icer_grid::snapshot::WorldSnapshot;
use icer_grid::world::World;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::ice::IceSubsystem;
use crate::physics::PhysicsEngine;
use crate::player::Player;
use crate::push::PushSystem;
use crate::rules::RulesEngine;
use crate::tick::{InputFrame, Simulation};

// ---------------------------------------------------------------------------
// EngineSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub world: WorldSnapshot,
    pub ice: IceSubsystem,
    pub physics: PhysicsEngine,
    pub push: PushSystem,
    pub rules: RulesEngine,
    pub player: Option<Player>,
    /// Number of ticks executed at the time of capture.
    pub tick_counter: u64,
    pub config: SimulationConfig,
    /// Input queued for the next tick.
    pub current_input: InputFrame,
    /// BLAKE3 hex digest (64 lowercase hex chars) of every other field.
    pub hash: String,
}

impl EngineSnapshot {
    /// Serialize to pretty JSON for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

struct StateRef<'a> {
    world: &'a WorldSnapshot,
    ice: &'a IceSubsystem,
    physics: &'a PhysicsEngine,
    push: &'a PushSystem,
    rules: &'a RulesEngine,
    player: Option<&'a Player>,
    tick_counter: u64,
    config: &'a SimulationConfig,
    current_input: &'a InputFrame,
}

/// BLAKE3 hex digest of the canonical JSON encoding of `state`.
fn compute_hash(state: &StateRef<'_>) -> String {
    #[derive(Serialize)]
    struct HashableState<'a> {
        world: &'a WorldSnapshot,
        ice: &'a IceSubsystem,
        physics: &'a PhysicsEngine,
        push: &'a PushSystem,
        rules: &'a RulesEngine,
        player: Option<&'a Player>,
        tick_counter: u64,
        config: &'a SimulationConfig,
        current_input: &'a InputFrame,
    }

    let hashable = HashableState {
        world: state.world,
        ice: state.ice,
        physics: state.physics,
        push: state.push,
        rules: state.rules,
        player: state.player,
        tick_counter: state.tick_counter,
        config: state.config,
        current_input: state.current_input,
    };

    let json_bytes = serde_json::to_vec(&hashable)
        .expect("simulation state should always be JSON-serializable");

    blake3::hash(&json_bytes).to_hex().to_string()
}

impl EngineSnapshot {
    fn state_ref(&self) -> StateRef<'_> {
        StateRef {
            world: &self.world,
            ice: &self.ice,
            physics: &self.physics,
            push: &self.push,
            rules: &self.rules,
            player: self.player.as_ref(),
            tick_counter: self.tick_counter,
            config: &self.config,
            current_input: &self.current_input,
        }
    }

    /// Recompute the hash from the snapshot's data.
    pub fn recompute_hash(&self) -> String {
        compute_hash(&self.state_ref())
    }
}

// ---------------------------------------------------------------------------
// Simulation snapshot/restore
// ---------------------------------------------------------------------------

impl Simulation {
    fn state_ref<'a>(&'a self, world: &'a WorldSnapshot) -> StateRef<'a> {
        StateRef {
            world,
            ice: &self.ice,
            physics: &self.physics,
            push: &self.push,
            rules: &self.rules,
            player: self.player.as_ref(),
            tick_counter: self.tick_counter,
            config: &self.config,
            current_input: &self.current_input,
        }
    }

    /// Capture the complete simulation state.
    pub fn capture_snapshot(&self) -> EngineSnapshot {
        let world = self.world.capture_snapshot();
        let hash = compute_hash(&self.state_ref(&world));
        EngineSnapshot {
            world,
            ice: self.ice.clone(),
            physics: self.physics.clone(),
            push: self.push.clone(),
            rules: self.rules.clone(),
            player: self.player.clone(),
            tick_counter: self.tick_counter,
            config: self.config.clone(),
            current_input: self.current_input.clone(),
            hash,
        }
    }

    /// Restore a previously captured state.
    ///
    /// The snapshot is fully validated first: the fixed step must be positive
    /// and finite, the hash must match the data, the world must rebuild
    /// cleanly and the player (if any) must be a live player entity. On any
    /// error the simulation is left untouched.
    pub fn restore_from_snapshot(
        &mut self,
        snapshot: &EngineSnapshot,
    ) -> Result<(), anyhow::Error> {
        let fixed_dt = snapshot.config.physics.fixed_dt;
        if !(fixed_dt > 0.0 && fixed_dt.is_finite()) {
            return Err(anyhow::anyhow!(
                "snapshot has invalid fixed_dt: {fixed_dt}. Must be positive and finite."
            ));
        }

        let expected_hash = snapshot.recompute_hash();
        if expected_hash != snapshot.hash {
            return Err(anyhow::anyhow!(
                "snapshot hash mismatch: recorded {} but recomputed {}. \
                 The snapshot may be corrupted or tampered with.",
                snapshot.hash,
                expected_hash
            ));
        }

        let world = World::from_snapshot(&snapshot.world)
            .map_err(|e| anyhow::anyhow!("failed to restore world from snapshot: {e}"))?;

        if let Some(player) = &snapshot.player {
            let tag = world.kind(player.entity()).map(|k| k.tag());
            if tag != Some(KindTag::Player) {
                return Err(anyhow::anyhow!(
                    "snapshot player {} is not a live player entity",
                    player.entity()
                ));
            }
        }
        if let Some(stale) = snapshot.ice.blocks().find(|&id| !world.is_alive(id)) {
            return Err(anyhow::anyhow!(
                "snapshot ice manifest names destroyed entity {stale}"
            ));
        }

        self.world = world;
        self.ice = snapshot.ice.clone();
        self.physics = snapshot.physics.clone();
        self.push = snapshot.push.clone();
        self.rules = snapshot.rules.clone();
        self.player = snapshot.player.clone();
        self.tick_counter = snapshot.tick_counter;
        self.config = snapshot.config.clone();
        self.current_input = snapshot.current_input.clone();

        tracing::debug!(tick = self.tick_counter, hash = %snapshot.hash, "simulation restored");
        Ok(())
    }

    /// The BLAKE3 state hash, equal to `capture_snapshot().hash`.
    pub fn state_hash(&self) -> String {
        let world = self.world.capture_snapshot();
        compute_hash(&self.state_ref(&world))
    }

    /// Capture a branch point. Identical to
    /// [`capture_snapshot`](Self::capture_snapshot).
    pub fn fork_snapshot(&self) -> EngineSnapshot {
        self.capture_snapshot()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
