//! Entity identifiers, grid coordinates and the per-entity record.
//!
//! An [`EntityId`] is a plain index into the [`World`](crate::world::World)'s
//! entity store. Ids are handed out monotonically and never recycled: a
//! destroyed entity keeps its slot (marked inactive) so that stale handles
//! always resolve to "not active" instead of to an unrelated entity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kind::{Capabilities, EntityKind, KindTag, Layer};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A stable entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Construct an `EntityId` from its store index.
    #[inline]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// The store index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Raw `u32` representation.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// Reconstruct from a raw `u32`.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GridPos
// ---------------------------------------------------------------------------

/// An integer cell coordinate. `(0, 0)` is the bottom-left cell; `y` grows
/// upward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The position shifted by `(dx, dy)`.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    #[inline]
    pub const fn above(self) -> Self {
        self.offset(0, 1)
    }

    #[inline]
    pub const fn below(self) -> Self {
        self.offset(0, -1)
    }

    /// Manhattan distance between two cells.
    pub fn manhattan(self, other: GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(i32, i32)> for GridPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A single entity record as stored by the [`World`](crate::world::World).
///
/// Fields are private: every mutation goes through `World` so that the
/// stored position can never disagree with the entity's grid slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    pos: GridPos,
    active: bool,
    /// Cached result of the last firmness refresh. Derived, not authoritative.
    firm: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId, kind: EntityKind, pos: GridPos) -> Self {
        Self {
            id,
            kind,
            pos,
            active: true,
            firm: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    /// The fixed capability record for this entity's kind.
    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    /// The grid layer this entity lives in.
    pub fn layer(&self) -> Layer {
        self.kind.layer()
    }

    pub fn pos(&self) -> GridPos {
        self.pos
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The firmness flag written by the most recent
    /// [`World::refresh_firmness`](crate::world::World::refresh_firmness).
    ///
    /// Use [`World::is_firm_now`](crate::world::World::is_firm_now) when the
    /// neighbourhood may have changed since then.
    pub fn is_firm(&self) -> bool {
        self.firm
    }

    pub(crate) fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    pub(crate) fn set_pos(&mut self, pos: GridPos) {
        self.pos = pos;
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.firm = false;
    }

    pub(crate) fn set_firm(&mut self, firm: bool) {
        self.firm = firm;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrip() {
        let id = EntityId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
        assert_eq!(format!("{id}"), "#42");
        assert_eq!(format!("{id:?}"), "EntityId(42)");
    }

    #[test]
    fn grid_pos_offsets() {
        let p = GridPos::new(3, 4);
        assert_eq!(p.above(), GridPos::new(3, 5));
        assert_eq!(p.below(), GridPos::new(3, 3));
        assert_eq!(p.offset(-2, 1), GridPos::new(1, 5));
    }

    #[test]
    fn manhattan_distance_is_symmetric() {
        let a = GridPos::new(1, 1);
        let b = GridPos::new(4, -1);
        assert_eq!(a.manhattan(b), 5);
        assert_eq!(b.manhattan(a), 5);
        assert_eq!(a.manhattan(a), 0);
    }

    #[test]
    fn grid_pos_orders_by_x_then_y() {
        let mut v = vec![GridPos::new(2, 0), GridPos::new(1, 5), GridPos::new(1, 2)];
        v.sort();
        assert_eq!(
            v,
            vec![GridPos::new(1, 2), GridPos::new(1, 5), GridPos::new(2, 0)]
        );
    }

    #[test]
    fn new_entity_is_active_and_not_firm() {
        let e = Entity::new(EntityId::new(0), EntityKind::Wall, GridPos::new(0, 0));
        assert!(e.is_active());
        assert!(!e.is_firm());
        assert_eq!(e.tag(), KindTag::Wall);
    }
}
