//! Level descriptions and the builder that turns them into a [`Simulation`].
//!
//! A [`LevelDescription`] is plain serde data, normally parsed from JSON:
//!
//! ```json
//! {
//!   "id": "first_frost",
//!   "name": "First Frost",
//!   "width": 8,
//!   "height": 6,
//!   "player_start": [2, 2],
//!   "objects": [
//!     { "kind": "wall", "x": 2, "y": 1 },
//!     { "kind": "flame", "x": 4, "y": 1 }
//!   ]
//! }
//! ```
//!
//! Unless `auto_floor` is turned off, a level with no object on row 0 gets a
//! full row of walls there. Portals sharing a `portal_id` are linked in pairs
//! in placement order.

use std::collections::BTreeMap;

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::{EntityKind, KindTag};
use icer_grid::world::World;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::rules::Requirements;
use crate::tick::Simulation;
use crate::LevelError;

// ---------------------------------------------------------------------------
// Description types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDescription {
    #[serde(alias = "level_id")]
    pub id: String,
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// Where the player is spawned. When absent, the first `player` object
    /// (if any) is controlled instead.
    #[serde(default)]
    pub player_start: Option<(i32, i32)>,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default = "default_auto_floor")]
    pub auto_floor: bool,
    #[serde(flatten)]
    pub metadata: LevelMetadata,
}

fn default_auto_floor() -> bool {
    true
}

/// Informational fields carried alongside a level. The engine never reads
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelMetadata {
    pub description: String,
    pub difficulty: String,
    pub author: String,
    pub hints: Vec<String>,
    pub optimal_moves: Option<u32>,
    pub optimal_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    #[serde(alias = "type")]
    pub kind: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub properties: ObjectProperties,
}

impl ObjectSpec {
    pub fn new(kind: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            kind: kind.into(),
            x,
            y,
            properties: ObjectProperties::default(),
        }
    }

    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectProperties {
    /// `ice_pot` only: start lit.
    pub is_hot: bool,
    /// `portal` only: portals with equal ids are linked.
    pub portal_id: Option<String>,
    /// `portal` only: overrides the default entry reach of 1.
    pub height_difference: Option<i32>,
}

/// Map a level-file kind string to an entity kind.
///
/// Recognised kinds are `wall`, `flame`, `stone`, `ice_block`, `ice_pot`
/// (hot when `is_hot` is set), `hot_pot`, `portal` (requires `portal_id`)
/// and `player`.
pub fn kind_from_descriptor(
    kind: &str,
    properties: &ObjectProperties,
    pos: GridPos,
) -> Result<EntityKind, LevelError> {
    let entity = match kind {
        "wall" => EntityKind::Wall,
        "flame" => EntityKind::flame(),
        "stone" => EntityKind::Stone,
        "ice_block" => EntityKind::ice_block(),
        "ice_pot" if properties.is_hot => EntityKind::hot_pot(),
        "ice_pot" => EntityKind::ice_pot(),
        "hot_pot" => EntityKind::hot_pot(),
        "player" => EntityKind::Player,
        "portal" => {
            let channel = properties
                .portal_id
                .as_deref()
                .ok_or(LevelError::MissingPortalId { pos })?;
            let mut portal = EntityKind::portal(channel);
            if let (EntityKind::Portal(state), Some(reach)) =
                (&mut portal, properties.height_difference)
            {
                state.height_difference = reach;
            }
            portal
        }
        other => {
            return Err(LevelError::UnknownKind {
                kind: other.to_owned(),
                pos,
            })
        }
    };
    Ok(entity)
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

impl LevelDescription {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Build a fresh simulation for this level.
    pub fn build(&self, config: SimulationConfig) -> Result<Simulation, LevelError> {
        let world = self.build_world()?;
        let mut sim = Simulation::new(world, config);

        match self.player_start {
            Some((x, y)) => {
                let pos = GridPos::new(x, y);
                sim.spawn_player(pos)
                    .map_err(|source| LevelError::Placement {
                        kind: "player".to_owned(),
                        pos,
                        source,
                    })?;
            }
            None => {
                let placed = sim.world().find_all_of_kind(KindTag::Player).first().copied();
                if let Some(id) = placed {
                    sim.set_player(id)?;
                }
            }
        }
        sim.set_requirements(self.requirements.clone());

        tracing::info!(
            level = %self.id,
            name = %self.name,
            entities = sim.world().entity_count(),
            ice = sim.ice().len(),
            "level loaded"
        );
        Ok(sim)
    }

    /// Place every object, add the floor and link portals.
    fn build_world(&self) -> Result<World, LevelError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(LevelError::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }
        let mut world = World::new(self.width, self.height);

        if self.auto_floor && !self.objects.iter().any(|o| o.y == 0) {
            for x in 0..self.width {
                world.spawn(EntityKind::Wall, GridPos::new(x, 0))?;
            }
        }

        let mut channels: BTreeMap<&str, Vec<EntityId>> = BTreeMap::new();
        for object in &self.objects {
            let pos = object.pos();
            let kind = kind_from_descriptor(&object.kind, &object.properties, pos)?;
            let id = world
                .spawn(kind, pos)
                .map_err(|source| LevelError::Placement {
                    kind: object.kind.clone(),
                    pos,
                    source,
                })?;
            if let Some(channel) = object.properties.portal_id.as_deref() {
                if object.kind == "portal" {
                    channels.entry(channel).or_default().push(id);
                }
            }
        }

        for (channel, portals) in &channels {
            for pair in portals.chunks(2) {
                match pair {
                    [a, b] => world.link_portals(*a, *b)?,
                    [lonely] => {
                        tracing::warn!(channel, portal = %lonely, "portal has no partner")
                    }
                    _ => {}
                }
            }
        }
        Ok(world)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
