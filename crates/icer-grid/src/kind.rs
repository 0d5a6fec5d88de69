//! Entity kinds, capability records and kind-specific state.
//!
//! Every object in a level is one variant of the closed [`EntityKind`] enum.
//! Behaviour that other engines hang off string-keyed property bags is
//! expressed here as a typed [`Capabilities`] record fixed per kind, plus a
//! small amount of per-variant state (pot heat, ice sliding, portal channel).
//!
//! | kind     | solid | push | fragile | gravity | supports | slippery | weight |
//! |----------|-------|------|---------|---------|----------|----------|--------|
//! | Player   | no    | no   | no      | no      | yes      | no       | 1      |
//! | Wall     | yes   | no   | no      | no      | yes      | no       | 999    |
//! | IceBlock | yes   | yes  | yes     | yes     | yes      | yes      | 1      |
//! | Flame    | yes   | no   | yes     | no      | yes      | no       | 0      |
//! | Stone    | yes   | yes  | no      | yes     | yes      | no       | 3      |
//! | Pot      | yes   | no   | no      | no      | yes      | no       | 2      |
//! | Portal   | no    | no   | no      | no      | no       | no       | 0      |

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// KindTag
// ---------------------------------------------------------------------------

/// Discriminant-only view of [`EntityKind`], used for kind queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindTag {
    Player,
    Wall,
    IceBlock,
    Flame,
    Stone,
    Pot,
    Portal,
}

impl KindTag {
    pub fn name(self) -> &'static str {
        match self {
            KindTag::Player => "player",
            KindTag::Wall => "wall",
            KindTag::IceBlock => "ice_block",
            KindTag::Flame => "flame",
            KindTag::Stone => "stone",
            KindTag::Pot => "pot",
            KindTag::Portal => "portal",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// Which grid layer an entity occupies.
///
/// Portals are fixtures: they sit in their own layer so an occupant (the
/// player, after transport) can share their cell. Everything else is an
/// occupant, at most one per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Occupant,
    Fixture,
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A unit grid direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
}

impl Direction {
    /// Trial order for slide starts: `+x, -x, +y, -y`.
    pub const SLIDE_ORDER: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
    ];

    /// The `(dx, dy)` unit step.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Left => (-1, 0),
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
        }
    }

    /// The direction for a unit step, if `(dx, dy)` is one.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (1, 0) => Some(Direction::Right),
            (-1, 0) => Some(Direction::Left),
            (0, 1) => Some(Direction::Up),
            (0, -1) => Some(Direction::Down),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Fixed physical capabilities of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Blocks movement into its cell and counts for firmness.
    pub solid: bool,
    pub pushable: bool,
    /// Destroyed by elemental interactions.
    pub fragile: bool,
    pub affected_by_gravity: bool,
    /// Something resting on top of it does not fall.
    pub supports_weight: bool,
    pub interactive: bool,
    /// Does not make the entity above it firm.
    pub slippery: bool,
    /// Participates in firmness checks at all.
    pub checks_firmness: bool,
    pub weight: u32,
    /// Maximum Manhattan distance of a single push.
    pub push_distance: u32,
    /// How tall the obstacle is for jumping purposes.
    pub height: i32,
}

impl Capabilities {
    const INERT: Capabilities = Capabilities {
        solid: false,
        pushable: false,
        fragile: false,
        affected_by_gravity: false,
        supports_weight: true,
        interactive: false,
        slippery: false,
        checks_firmness: false,
        weight: 1,
        push_distance: 1,
        height: 1,
    };
}

// ---------------------------------------------------------------------------
// Kind-specific state
// ---------------------------------------------------------------------------

/// Sliding state of an ice block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceState {
    pub sliding: bool,
    pub slide_direction: Option<Direction>,
}

/// Heat state of a pot. An ice pot becomes a hot pot once ignited and can
/// never be ignited again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotState {
    pub is_hot: bool,
    pub can_ignite: bool,
}

impl PotState {
    pub const fn ice_pot() -> Self {
        Self {
            is_hot: false,
            can_ignite: true,
        }
    }

    pub const fn hot_pot() -> Self {
        Self {
            is_hot: true,
            can_ignite: false,
        }
    }

    /// Light the pot. Returns `false` if it could not be ignited.
    pub fn ignite(&mut self) -> bool {
        if !self.can_ignite {
            return false;
        }
        self.is_hot = true;
        self.can_ignite = false;
        true
    }
}

/// A portal fixture. Linking is held by the world, keyed by entity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalState {
    /// Level-file portal id; portals sharing a channel are paired.
    pub channel: String,
    pub active: bool,
    /// How far below the portal the player may stand and still enter.
    pub height_difference: i32,
}

impl PortalState {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            active: true,
            height_difference: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The closed set of entity kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Wall,
    IceBlock(IceState),
    Flame { burning: bool },
    Stone,
    Pot(PotState),
    Portal(PortalState),
}

impl EntityKind {
    pub fn ice_block() -> Self {
        EntityKind::IceBlock(IceState::default())
    }

    pub fn flame() -> Self {
        EntityKind::Flame { burning: true }
    }

    pub fn ice_pot() -> Self {
        EntityKind::Pot(PotState::ice_pot())
    }

    pub fn hot_pot() -> Self {
        EntityKind::Pot(PotState::hot_pot())
    }

    pub fn portal(channel: impl Into<String>) -> Self {
        EntityKind::Portal(PortalState::new(channel))
    }

    pub fn tag(&self) -> KindTag {
        match self {
            EntityKind::Player => KindTag::Player,
            EntityKind::Wall => KindTag::Wall,
            EntityKind::IceBlock(_) => KindTag::IceBlock,
            EntityKind::Flame { .. } => KindTag::Flame,
            EntityKind::Stone => KindTag::Stone,
            EntityKind::Pot(_) => KindTag::Pot,
            EntityKind::Portal(_) => KindTag::Portal,
        }
    }

    /// Type name as used in level descriptions and event text.
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Pot(pot) if pot.is_hot => "hot_pot",
            EntityKind::Pot(_) => "ice_pot",
            other => other.tag().name(),
        }
    }

    pub fn layer(&self) -> Layer {
        match self {
            EntityKind::Portal(_) => Layer::Fixture,
            _ => Layer::Occupant,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let base = Capabilities::INERT;
        match self {
            EntityKind::Player => Capabilities {
                interactive: true,
                ..base
            },
            EntityKind::Wall => Capabilities {
                solid: true,
                weight: 999,
                ..base
            },
            EntityKind::IceBlock(_) => Capabilities {
                solid: true,
                pushable: true,
                fragile: true,
                affected_by_gravity: true,
                slippery: true,
                checks_firmness: true,
                ..base
            },
            EntityKind::Flame { .. } => Capabilities {
                solid: true,
                fragile: true,
                weight: 0,
                ..base
            },
            EntityKind::Stone => Capabilities {
                solid: true,
                pushable: true,
                affected_by_gravity: true,
                checks_firmness: true,
                weight: 3,
                ..base
            },
            EntityKind::Pot(_) => Capabilities {
                solid: true,
                weight: 2,
                ..base
            },
            EntityKind::Portal(_) => Capabilities {
                supports_weight: false,
                interactive: true,
                weight: 0,
                ..base
            },
        }
    }

    pub fn is_ice(&self) -> bool {
        matches!(self, EntityKind::IceBlock(_))
    }

    pub fn is_flame(&self) -> bool {
        matches!(self, EntityKind::Flame { .. })
    }

    pub fn is_hot_pot(&self) -> bool {
        matches!(self, EntityKind::Pot(pot) if pot.is_hot)
    }

    /// An unlit pot that can still be ignited.
    pub fn is_ignitable_pot(&self) -> bool {
        matches!(self, EntityKind::Pot(pot) if pot.can_ignite)
    }

    pub fn ice_state(&self) -> Option<&IceState> {
        match self {
            EntityKind::IceBlock(state) => Some(state),
            _ => None,
        }
    }

    pub fn portal_state(&self) -> Option<&PortalState> {
        match self {
            EntityKind::Portal(state) => Some(state),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
