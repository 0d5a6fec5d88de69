//! Simulation configuration.
//!
//! [`SimulationConfig`] bundles the tunables of each subsystem. Every field
//! has a default matching the stock game, and every section deserializes with
//! `#[serde(default)]`, so a JSON config only needs to name what it changes:
//!
//! ```
//! use icer_engine::config::SimulationConfig;
//!
//! let config = SimulationConfig::from_json(r#"{ "ice": { "max_blocks": 5 } }"#).unwrap();
//! assert_eq!(config.ice.max_blocks, 5);
//! assert_eq!(config.player.jump_height, 1);
//! ```

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PhysicsConfig
// ---------------------------------------------------------------------------

/// Fixed-timestep settings for the physics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed time step in seconds. Must be positive and finite.
    pub fixed_dt: f64,
    /// Upper bound on fixed steps run by a single `update`; accumulated time
    /// beyond this is dropped.
    pub max_steps_per_update: u32,
}

impl Default for PhysicsConfig {
    /// Defaults to 60 Hz with at most 8 catch-up steps.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_steps_per_update: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// IceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    /// Maximum number of live player-created ice blocks.
    pub max_blocks: usize,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self { max_blocks: 20 }
    }
}

// ---------------------------------------------------------------------------
// PlayerConfig
// ---------------------------------------------------------------------------

/// Cooldowns (seconds) and movement limits for the player controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub move_cooldown: f64,
    pub jump_cooldown: f64,
    pub ice_cooldown: f64,
    /// Tallest obstacle the player can hop onto.
    pub jump_height: i32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_cooldown: 0.2,
            jump_cooldown: 0.3,
            ice_cooldown: 0.1,
            jump_height: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub physics: PhysicsConfig,
    pub ice: IceConfig,
    pub player: PlayerConfig,
}

impl SimulationConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
