//! Action recording and deterministic replay.
//!
//! A [`ReplayRecorder`] captures the initial [`EngineSnapshot`], every
//! non-empty [`InputFrame`] and periodic state-hash checkpoints while a level
//! is played. [`replay`] restores the snapshot on a [`Simulation`], feeds the
//! same inputs back tick by tick and compares hashes at each checkpoint.
//!
//! Inputs and checkpoints are both taken *before* their tick runs, after the
//! tick's actions have been queued.
//!
//! # Example
//!
//! ```
//! use icer_engine::prelude::*;
//!
//! let mut world = World::new(8, 4);
//! for x in 0..8 {
//!     world.spawn(EntityKind::Wall, GridPos::new(x, 0)).unwrap();
//! }
//! world.spawn(EntityKind::flame(), GridPos::new(7, 1)).unwrap();
//! let mut sim = Simulation::new(world, SimulationConfig::default());
//! sim.spawn_player(GridPos::new(1, 1)).unwrap();
//!
//! let mut recorder = ReplayRecorder::new(sim.capture_snapshot(), 5);
//! for tick in 0..30 {
//!     if tick % 15 == 0 {
//!         sim.queue_action(PlayerAction::Move { dx: 1, dy: 0 });
//!     }
//!     recorder.record_before_tick(&sim);
//!     sim.tick();
//! }
//! let log = recorder.finish();
//!
//! let mut fresh = Simulation::new(World::new(1, 1), SimulationConfig::default());
//! let result = replay(&mut fresh, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! assert_eq!(fresh.state_hash(), sim.state_hash());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::EngineSnapshot;
use crate::tick::{InputFrame, Simulation};

// ---------------------------------------------------------------------------
// Log types
// ---------------------------------------------------------------------------

/// A recorded play session, serializable for regression fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Replay starts by restoring this.
    pub initial_snapshot: EngineSnapshot,
    /// Number of ticks to execute from the initial snapshot.
    pub total_ticks: u64,
    pub entries: Vec<ReplayEntry>,
}

impl ReplayLog {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum ReplayEntry {
    /// The actions queued for `tick`.
    Input { tick: u64, input: InputFrame },
    /// The state hash immediately before `tick` ran.
    Checkpoint { tick: u64, state_hash: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// False when replay stopped at a divergence.
    pub completed: bool,
    pub ticks_replayed: u64,
    pub first_divergence: Option<ReplayDivergence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub tick: u64,
    pub expected_hash: String,
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Builds a [`ReplayLog`] one tick at a time.
///
/// A `checkpoint_interval` of `n` records a checkpoint on every tick that is
/// a multiple of `n`; `0` records one on every tick a hash is supplied for.
#[derive(Debug)]
pub struct ReplayRecorder {
    log: ReplayLog,
    checkpoint_interval: u64,
    last_tick: Option<u64>,
}

impl ReplayRecorder {
    pub fn new(snapshot: EngineSnapshot, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                initial_snapshot: snapshot,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            last_tick: None,
        }
    }

    fn wants_checkpoint(&self, tick: u64) -> bool {
        self.checkpoint_interval == 0 || tick % self.checkpoint_interval == 0
    }

    /// Record one tick's input and, when the interval matches and a hash is
    /// given, a checkpoint.
    ///
    /// # Panics
    ///
    /// Panics if `tick` does not exceed the previously recorded tick.
    pub fn record_tick(&mut self, tick: u64, input: &InputFrame, state_hash: Option<String>) {
        if let Some(prev) = self.last_tick {
            assert!(
                tick > prev,
                "ReplayRecorder::record_tick: tick {tick} must be greater than previous tick {prev}"
            );
        }
        self.last_tick = Some(tick);
        self.log.total_ticks += 1;

        if !input.is_empty() {
            self.log.entries.push(ReplayEntry::Input {
                tick,
                input: input.clone(),
            });
        }
        if let Some(state_hash) = state_hash {
            if self.wants_checkpoint(tick) {
                self.log
                    .entries
                    .push(ReplayEntry::Checkpoint { tick, state_hash });
            }
        }
    }

    /// Record the tick `sim` is about to run. The state hash is only computed
    /// on checkpoint ticks.
    pub fn record_before_tick(&mut self, sim: &Simulation) {
        let tick = sim.tick_count();
        let hash = self.wants_checkpoint(tick).then(|| sim.state_hash());
        self.record_tick(tick, sim.current_input(), hash);
    }

    pub fn finish(self) -> ReplayLog {
        tracing::debug!(
            ticks = self.log.total_ticks,
            entries = self.log.entries.len(),
            "replay recording finished"
        );
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay `log` on `sim`, stopping at the first checkpoint whose hash differs.
///
/// The log is validated before `sim` is touched: duplicate inputs or
/// checkpoints for one tick, an overflowing tick range, or a snapshot that
/// fails to restore all return an error with `sim` unchanged.
pub fn replay(sim: &mut Simulation, log: &ReplayLog) -> Result<ReplayResult, anyhow::Error> {
    let mut inputs: BTreeMap<u64, &InputFrame> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();
    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { tick, input } => {
                if inputs.insert(*tick, input).is_some() {
                    return Err(anyhow::anyhow!(
                        "replay log has two Input entries for tick {tick}"
                    ));
                }
            }
            ReplayEntry::Checkpoint { tick, state_hash } => {
                if checkpoints.insert(*tick, state_hash).is_some() {
                    return Err(anyhow::anyhow!(
                        "replay log has two Checkpoint entries for tick {tick}"
                    ));
                }
            }
        }
    }

    let start = log.initial_snapshot.tick_counter;
    let end = start.checked_add(log.total_ticks).ok_or_else(|| {
        anyhow::anyhow!(
            "tick range overflow: {start} + {} exceeds u64::MAX",
            log.total_ticks
        )
    })?;

    sim.restore_from_snapshot(&log.initial_snapshot)
        .map_err(|e| anyhow::anyhow!("failed to restore initial snapshot for replay: {e}"))?;

    let mut ticks_replayed = 0;
    for tick in start..end {
        let input = inputs.get(&tick).map(|i| (*i).clone()).unwrap_or_default();
        sim.set_input(input);

        if let Some(&expected) = checkpoints.get(&tick) {
            let actual = sim.state_hash();
            if actual != expected {
                tracing::warn!(tick, expected, %actual, "replay diverged");
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence {
                        tick,
                        expected_hash: expected.to_owned(),
                        actual_hash: actual,
                    }),
                });
            }
        }

        sim.tick();
        ticks_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        ticks_replayed,
        first_divergence: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
