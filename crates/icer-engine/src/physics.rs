//! Fixed-timestep grid physics: gravity, sliding and interactions.
//!
//! The [`PhysicsEngine`] accumulates frame time and runs whole fixed steps.
//! Each step runs three passes in order:
//!
//! 1. **gravity** -- every unsupported, non-firm entity affected by gravity
//!    drops straight to its landing cell in one move. Entities are visited
//!    bottom row first, so a stack falls together in a single pass.
//! 2. **sliding** -- every sliding ice block moves one cell in its slide
//!    direction, or stops if the destination is blocked or unsupported.
//! 3. **interactions** -- extinguish, ignite and melt, see
//!    [`interaction`](crate::interaction).
//!
//! Invalid moves are skipped, never raised: a step always completes.

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::{KindTag, Layer};
use icer_grid::world::World;
use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;
use crate::ice::IceSubsystem;
use crate::interaction::{self, Interaction, InteractionKind};

/// Slack for comparing accumulated time against the fixed step.
const TIME_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One atomic entity move made by a physics pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    pub entity: EntityId,
    pub from: GridPos,
    pub to: GridPos,
}

/// Everything one [`PhysicsEngine::update`] did, across all its steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicsReport {
    /// Fixed steps executed.
    pub steps: u32,
    pub falls: Vec<Motion>,
    pub slides: Vec<Motion>,
    /// Ice blocks whose slide stopped.
    pub halted: Vec<EntityId>,
    pub interactions: Vec<Interaction>,
}

// ---------------------------------------------------------------------------
// PhysicsEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    accumulator: f64,
    total_steps: u64,
}

impl PhysicsEngine {
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(config: PhysicsConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            config,
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Time carried over to the next update, always below one fixed step.
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Fixed steps run since creation.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Advance by `dt` seconds of frame time, running as many fixed steps as
    /// fit (at most `max_steps_per_update`). Time beyond the step limit is
    /// dropped.
    pub fn update(&mut self, dt: f64, world: &mut World, ice: &mut IceSubsystem) -> PhysicsReport {
        let mut report = PhysicsReport::default();
        if !(dt.is_finite() && dt > 0.0) {
            tracing::trace!(dt, "ignoring non-positive frame time");
            return report;
        }

        let step = self.config.fixed_dt;
        self.accumulator += dt;
        while self.accumulator + TIME_EPSILON >= step {
            if report.steps >= self.config.max_steps_per_update {
                tracing::warn!(
                    dropped = self.accumulator,
                    max_steps = self.config.max_steps_per_update,
                    "physics fell behind; dropping accumulated time"
                );
                self.accumulator = 0.0;
                break;
            }
            self.accumulator -= step;
            Self::step(world, ice, &mut report);
            report.steps += 1;
            self.total_steps += 1;
        }
        self.accumulator = self.accumulator.max(0.0);
        report
    }

    /// Run one fixed step, appending what happened to `report`.
    pub fn step(world: &mut World, ice: &mut IceSubsystem, report: &mut PhysicsReport) {
        report.falls.extend(Self::apply_gravity(world));
        let (slides, halted) = Self::apply_slides(world);
        report.slides.extend(slides);
        report.halted.extend(halted);
        report
            .interactions
            .extend(interaction::run_pass(world, ice, &InteractionKind::ALL));
    }

    // -- passes -------------------------------------------------------------

    /// Drop every loose entity affected by gravity to its landing cell.
    ///
    /// Firmness is evaluated live, against the world as it stands after the
    /// falls already made in this pass.
    pub fn apply_gravity(world: &mut World) -> Vec<Motion> {
        let candidates: Vec<EntityId> = world
            .grid()
            .cells(Layer::Occupant)
            .filter(|&(_, id)| {
                world
                    .entity(id)
                    .is_some_and(|e| e.capabilities().affected_by_gravity)
            })
            .map(|(_, id)| id)
            .collect();

        let mut falls = Vec::new();
        for id in candidates {
            let Some(from) = world.pos_of(id) else {
                continue;
            };
            if from.y == 0 || world.is_firm_now(id) {
                continue;
            }
            let landing = Self::landing_cell(world, from);
            if landing == from {
                continue;
            }
            match world.move_to(id, landing) {
                Ok(()) => {
                    tracing::trace!(entity = %id, %from, to = %landing, "fell");
                    falls.push(Motion {
                        entity: id,
                        from,
                        to: landing,
                    });
                }
                Err(err) => tracing::trace!(entity = %id, %err, "fall skipped"),
            }
        }
        falls
    }

    /// Lowest cell reachable from `from` through empty cells straight down.
    fn landing_cell(world: &World, from: GridPos) -> GridPos {
        let mut landing = from;
        while landing.y > 0 && world.at(landing.below()).is_none() {
            landing = landing.below();
        }
        landing
    }

    /// Move each sliding ice block one cell, halting the ones that cannot
    /// continue. Returns the moves and the halted blocks.
    pub fn apply_slides(world: &mut World) -> (Vec<Motion>, Vec<EntityId>) {
        let mut slides = Vec::new();
        let mut halted = Vec::new();

        for id in world.find_all_of_kind(KindTag::IceBlock) {
            let Some(state) = world.kind(id).and_then(|k| k.ice_state()).copied() else {
                continue;
            };
            let Some(direction) = state.slide_direction.filter(|_| state.sliding) else {
                continue;
            };
            let Some(from) = world.pos_of(id) else {
                continue;
            };

            let (dx, dy) = direction.delta();
            let to = from.offset(dx, dy);
            let clear = world.in_bounds(to)
                && world.at(to).is_none()
                && world.is_supported(to, Some(id));

            if clear && world.move_to(id, to).is_ok() {
                tracing::trace!(entity = %id, %from, %to, "slid");
                slides.push(Motion {
                    entity: id,
                    from,
                    to,
                });
            } else if world.set_slide(id, None).is_ok() {
                tracing::trace!(entity = %id, %from, ?direction, "slide halted");
                halted.push(id);
            }
        }
        (slides, halted)
    }
}

impl Default for PhysicsEngine {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
