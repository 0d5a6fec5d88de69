//! Ordered, append-only log of solved-puzzle events.
//!
//! The [`RulesEngine`](crate::rules::RulesEngine) records one
//! [`PuzzleEvent`] for every interaction, portal transport and chain reaction
//! it observes. Each event carries a sequence number, the tick it happened
//! on, the cell it is reported at, the entities involved and a human-readable
//! description.
//!
//! # Query API
//!
//! - **Kind**: [`EventLog::of_kind`]
//! - **Entity**: [`EventLog::for_entity`]
//! - **Tick**: [`EventLog::at_tick`]
//!
//! # Example
//!
//! ```
//! use icer_engine::events::{EventLog, PuzzleEventKind};
//! use icer_engine::icer_grid::entity::{EntityId, GridPos};
//!
//! let mut log = EventLog::new();
//! let flame = EntityId::new(3);
//! log.record(
//!     1,
//!     PuzzleEventKind::FlameExtinguished,
//!     GridPos::new(4, 1),
//!     vec![flame, EntityId::new(7)],
//! );
//!
//! assert_eq!(log.len(), 1);
//! assert_eq!(log.for_entity(flame).count(), 1);
//! assert_eq!(log.descriptions(), vec!["Extinguished flame at (4, 1)"]);
//! ```

use icer_grid::entity::{EntityId, GridPos};
use serde::{Deserialize, Serialize};

use crate::interaction::InteractionKind;

// ---------------------------------------------------------------------------
// PuzzleEventKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleEventKind {
    FlameExtinguished,
    PotIgnited,
    IceMelted,
    PortalTransport,
    ChainReaction,
}

impl PuzzleEventKind {
    /// Text reported for an event of this kind at `pos`.
    pub fn describe(self, pos: GridPos) -> String {
        match self {
            PuzzleEventKind::FlameExtinguished => format!("Extinguished flame at {pos}"),
            PuzzleEventKind::PotIgnited => format!("Ignited pot at {pos}"),
            PuzzleEventKind::IceMelted => format!("Melted ice at {pos} with hot pot"),
            PuzzleEventKind::PortalTransport => format!("Used portal from {pos}"),
            PuzzleEventKind::ChainReaction => {
                format!("Triggered chain reaction starting at {pos}")
            }
        }
    }
}

impl From<InteractionKind> for PuzzleEventKind {
    fn from(kind: InteractionKind) -> Self {
        match kind {
            InteractionKind::Extinguish => PuzzleEventKind::FlameExtinguished,
            InteractionKind::Ignite => PuzzleEventKind::PotIgnited,
            InteractionKind::Melt => PuzzleEventKind::IceMelted,
        }
    }
}

// ---------------------------------------------------------------------------
// PuzzleEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleEvent {
    /// Position in the log, starting at 0.
    pub seq: u64,
    pub tick: u64,
    pub kind: PuzzleEventKind,
    pub position: GridPos,
    pub entities: Vec<EntityId>,
    pub description: String,
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<PuzzleEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event. The description is derived from `kind` and
    /// `position`. Returns the assigned sequence number.
    pub fn record(
        &mut self,
        tick: u64,
        kind: PuzzleEventKind,
        position: GridPos,
        entities: Vec<EntityId>,
    ) -> u64 {
        let seq = self.events.len() as u64;
        let description = kind.describe(position);
        tracing::info!(seq, tick, ?kind, %position, "{description}");
        self.events.push(PuzzleEvent {
            seq,
            tick,
            kind,
            position,
            entities,
            description,
        });
        seq
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events in recording order.
    pub fn all(&self) -> &[PuzzleEvent] {
        &self.events
    }

    pub fn of_kind(&self, kind: PuzzleEventKind) -> impl Iterator<Item = &PuzzleEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn for_entity(&self, entity: EntityId) -> impl Iterator<Item = &PuzzleEvent> {
        self.events
            .iter()
            .filter(move |e| e.entities.contains(&entity))
    }

    pub fn at_tick(&self, tick: u64) -> impl Iterator<Item = &PuzzleEvent> {
        self.events.iter().filter(move |e| e.tick == tick)
    }

    pub fn descriptions(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.description.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
