//! The [`World`]: owner of every entity and sole writer of the grid.
//!
//! All placement, movement and destruction goes through `World`. Each
//! operation either succeeds completely or returns a [`GridError`] and leaves
//! the world untouched, so callers never observe an entity whose stored
//! position disagrees with its grid slot.
//!
//! Destroyed entities stay in the store marked inactive; their ids are never
//! handed out again.
//!
//! # Example
//!
//! ```
//! use icer_grid::prelude::*;
//!
//! let mut world = World::new(5, 5);
//! let stone = world.spawn(EntityKind::Stone, GridPos::new(1, 3)).unwrap();
//!
//! world.move_to(stone, GridPos::new(1, 0)).unwrap();
//! assert_eq!(world.at(GridPos::new(1, 3)), None);
//! assert_eq!(world.pos_of(stone), Some(GridPos::new(1, 0)));
//!
//! // Moving into an occupied cell is rejected and changes nothing.
//! let wall = world.spawn(EntityKind::Wall, GridPos::new(2, 0)).unwrap();
//! assert!(world.move_to(stone, GridPos::new(2, 0)).is_err());
//! assert_eq!(world.at(GridPos::new(2, 0)), Some(wall));
//! ```

use std::collections::BTreeMap;

use crate::entity::{Entity, EntityId, GridPos};
use crate::grid::Grid;
use crate::kind::{Direction, EntityKind, IceState, KindTag, Layer};
use crate::{GridError, InvariantViolation};

/// Neighbour offsets in query order: up, down, right, left.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The level state: grid, entity store and portal link table.
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) grid: Grid,
    pub(crate) entities: Vec<Entity>,
    /// Symmetric portal pairing: both directions are always present.
    pub(crate) portal_links: BTreeMap<EntityId, EntityId>,
    pub(crate) elapsed: f64,
}

impl World {
    /// Create an empty world of the given size.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is not positive.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            grid: Grid::new(width, height),
            entities: Vec::new(),
            portal_links: BTreeMap::new(),
            elapsed: 0.0,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn width(&self) -> i32 {
        self.grid.width()
    }

    pub fn height(&self) -> i32 {
        self.grid.height()
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        self.grid.in_bounds(pos)
    }

    /// Seconds accumulated through [`update`](Self::update).
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    // -- placement ----------------------------------------------------------

    /// Create an entity of `kind` at `pos`.
    ///
    /// # Errors
    ///
    /// [`GridError::OutOfBounds`] if `pos` is outside the grid, or
    /// [`GridError::Occupied`] if the kind's layer is taken at `pos`.
    pub fn spawn(&mut self, kind: EntityKind, pos: GridPos) -> Result<EntityId, GridError> {
        let layer = kind.layer();
        self.check_free(layer, pos, None)?;

        let id = EntityId::new(self.entities.len() as u32);
        self.entities.push(Entity::new(id, kind, pos));
        self.grid.set(layer, pos, Some(id));
        tracing::trace!(entity = %id, %pos, "spawned");
        Ok(id)
    }

    /// Destroy an entity: detach it from the grid and mark it inactive in the
    /// same operation. Destroying a portal also unlinks it.
    ///
    /// Returns the position the entity occupied.
    pub fn remove(&mut self, id: EntityId) -> Result<GridPos, GridError> {
        let (layer, pos, is_portal) = {
            let entity = self.active(id)?;
            (entity.layer(), entity.pos(), entity.tag() == KindTag::Portal)
        };
        if is_portal {
            self.unlink_portal(id);
        }
        self.grid.set(layer, pos, None);
        self.entities[id.index() as usize].deactivate();
        tracing::trace!(entity = %id, %pos, "removed");
        Ok(pos)
    }

    /// Move an entity to `pos` atomically. Moving onto its own cell is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails exactly like [`spawn`](Self::spawn), or with
    /// [`GridError::StaleEntity`] if `id` is not active.
    pub fn move_to(&mut self, id: EntityId, pos: GridPos) -> Result<(), GridError> {
        let (layer, from) = {
            let entity = self.active(id)?;
            (entity.layer(), entity.pos())
        };
        if from == pos {
            return Ok(());
        }
        self.check_free(layer, pos, Some(id))?;

        self.grid.set(layer, from, None);
        self.grid.set(layer, pos, Some(id));
        self.entities[id.index() as usize].set_pos(pos);
        tracing::trace!(entity = %id, %from, to = %pos, "moved");
        Ok(())
    }

    fn check_free(
        &self,
        layer: Layer,
        pos: GridPos,
        mover: Option<EntityId>,
    ) -> Result<(), GridError> {
        if !self.grid.in_bounds(pos) {
            return Err(GridError::OutOfBounds {
                pos,
                width: self.width(),
                height: self.height(),
            });
        }
        match self.grid.get(layer, pos) {
            Some(occupant) if Some(occupant) != mover => Err(GridError::Occupied { pos, occupant }),
            _ => Ok(()),
        }
    }

    // -- lookup -------------------------------------------------------------

    /// The occupant-layer entity at `pos`.
    pub fn at(&self, pos: GridPos) -> Option<EntityId> {
        self.grid.get(Layer::Occupant, pos)
    }

    /// The fixture (portal) at `pos`.
    pub fn fixture_at(&self, pos: GridPos) -> Option<EntityId> {
        self.grid.get(Layer::Fixture, pos)
    }

    /// The occupant-layer entity record at `pos`.
    pub fn occupant(&self, pos: GridPos) -> Option<&Entity> {
        self.at(pos).and_then(|id| self.entity(id))
    }

    /// Any entity record, active or destroyed.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index() as usize)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(Entity::is_active)
    }

    /// The kind of an active entity.
    pub fn kind(&self, id: EntityId) -> Option<&EntityKind> {
        self.entity(id).filter(|e| e.is_active()).map(Entity::kind)
    }

    /// The position of an active entity.
    pub fn pos_of(&self, id: EntityId) -> Option<GridPos> {
        self.entity(id).filter(|e| e.is_active()).map(Entity::pos)
    }

    fn active(&self, id: EntityId) -> Result<&Entity, GridError> {
        self.entity(id)
            .filter(|e| e.is_active())
            .ok_or(GridError::StaleEntity { entity: id })
    }

    fn active_mut(&mut self, id: EntityId) -> Result<&mut Entity, GridError> {
        self.entities
            .get_mut(id.index() as usize)
            .filter(|e| e.is_active())
            .ok_or(GridError::StaleEntity { entity: id })
    }

    /// Occupant-layer neighbours of `pos` in [`NEIGHBOR_OFFSETS`] order.
    pub fn neighbors4(&self, pos: GridPos) -> Vec<(GridPos, EntityId)> {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dx, dy)| pos.offset(dx, dy))
            .filter_map(|p| self.at(p).map(|id| (p, id)))
            .collect()
    }

    /// All active entities of a kind, bottom row first, `x` ascending.
    pub fn find_all_of_kind(&self, tag: KindTag) -> Vec<EntityId> {
        let layer = match tag {
            KindTag::Portal => Layer::Fixture,
            _ => Layer::Occupant,
        };
        self.grid
            .cells(layer)
            .filter(|&(_, id)| self.kind(id).is_some_and(|k| k.tag() == tag))
            .map(|(_, id)| id)
            .collect()
    }

    pub fn count_of_kind(&self, tag: KindTag) -> usize {
        self.find_all_of_kind(tag).len()
    }

    /// Every placed entity with its cell, row-major; within a cell the
    /// occupant comes before the fixture. Intended for draw enumeration.
    pub fn iterate(&self) -> Vec<(GridPos, EntityId)> {
        let mut cells: Vec<(GridPos, Layer, EntityId)> = self
            .grid
            .cells(Layer::Occupant)
            .map(|(p, id)| (p, Layer::Occupant, id))
            .chain(
                self.grid
                    .cells(Layer::Fixture)
                    .map(|(p, id)| (p, Layer::Fixture, id)),
            )
            .collect();
        cells.sort_by_key(|&(p, layer, _)| (p.y, p.x, layer == Layer::Fixture));
        cells.into_iter().map(|(p, _, id)| (p, id)).collect()
    }

    /// Active entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_active())
    }

    /// Number of active entities.
    pub fn entity_count(&self) -> usize {
        self.entities().count()
    }

    // -- support & firmness -------------------------------------------------

    /// Whether something standing at `pos` would be held up: either `pos` is
    /// on the floor row, or the cell below holds a weight-bearing occupant
    /// other than `ignoring`.
    pub fn is_supported(&self, pos: GridPos, ignoring: Option<EntityId>) -> bool {
        if pos.y == 0 {
            return true;
        }
        self.occupant(pos.below())
            .is_some_and(|e| Some(e.id()) != ignoring && e.capabilities().supports_weight)
    }

    /// Live firmness of an entity, computed from its current neighbours.
    ///
    /// Only kinds that opt into firmness checks can be firm. Such an entity is
    /// firm when a solid entity sits directly left or right of it, or when a
    /// solid, non-slippery entity sits directly below it.
    pub fn is_firm_now(&self, id: EntityId) -> bool {
        let Some(entity) = self.entity(id).filter(|e| e.is_active()) else {
            return false;
        };
        if !entity.capabilities().checks_firmness {
            return false;
        }
        let pos = entity.pos();
        let solid = |p: GridPos| self.occupant(p).is_some_and(|o| o.capabilities().solid);
        if solid(pos.offset(-1, 0)) || solid(pos.offset(1, 0)) {
            return true;
        }
        pos.y > 0
            && self.occupant(pos.below()).is_some_and(|o| {
                let caps = o.capabilities();
                caps.solid && !caps.slippery
            })
    }

    /// Recompute the cached firmness flag of one entity. Returns the new
    /// value, or `None` if the entity is not active.
    pub fn refresh_firmness_of(&mut self, id: EntityId) -> Option<bool> {
        if !self.is_alive(id) {
            return None;
        }
        let firm = self.is_firm_now(id);
        self.entities[id.index() as usize].set_firm(firm);
        Some(firm)
    }

    /// Recompute every cached firmness flag. Returns how many changed.
    pub fn refresh_firmness(&mut self) -> usize {
        let ids: Vec<EntityId> = self.entities().map(Entity::id).collect();
        let mut changed = 0;
        for id in ids {
            let before = self.entities[id.index() as usize].is_firm();
            if self.refresh_firmness_of(id) != Some(before) {
                changed += 1;
            }
        }
        changed
    }

    // -- kind-specific state ------------------------------------------------

    fn expect_kind(&self, id: EntityId, expected: KindTag) -> Result<(), GridError> {
        let actual = self.active(id)?.tag();
        if actual != expected {
            return Err(GridError::WrongKind {
                entity: id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Set or clear the slide direction of an ice block.
    pub fn set_slide(
        &mut self,
        id: EntityId,
        direction: Option<Direction>,
    ) -> Result<(), GridError> {
        self.expect_kind(id, KindTag::IceBlock)?;
        if let EntityKind::IceBlock(state) = self.active_mut(id)?.kind_mut() {
            *state = IceState {
                sliding: direction.is_some(),
                slide_direction: direction,
            };
        }
        Ok(())
    }

    /// Ignite a pot. Returns `Ok(false)` if the pot was already lit.
    pub fn ignite_pot(&mut self, id: EntityId) -> Result<bool, GridError> {
        self.expect_kind(id, KindTag::Pot)?;
        match self.active_mut(id)?.kind_mut() {
            EntityKind::Pot(pot) => Ok(pot.ignite()),
            _ => Ok(false),
        }
    }

    pub fn set_portal_active(&mut self, id: EntityId, active: bool) -> Result<(), GridError> {
        self.expect_kind(id, KindTag::Portal)?;
        if let EntityKind::Portal(portal) = self.active_mut(id)?.kind_mut() {
            portal.active = active;
        }
        Ok(())
    }

    // -- portal links -------------------------------------------------------

    /// Link two portals to each other. Any previous links of either portal
    /// are dropped first.
    pub fn link_portals(&mut self, a: EntityId, b: EntityId) -> Result<(), GridError> {
        self.expect_kind(a, KindTag::Portal)?;
        self.expect_kind(b, KindTag::Portal)?;
        if a == b {
            return Err(GridError::SelfLink { entity: a });
        }
        self.unlink_portal(a);
        self.unlink_portal(b);
        self.portal_links.insert(a, b);
        self.portal_links.insert(b, a);
        Ok(())
    }

    /// Remove a portal's link in both directions. Returns the former partner.
    pub fn unlink_portal(&mut self, id: EntityId) -> Option<EntityId> {
        let partner = self.portal_links.remove(&id)?;
        self.portal_links.remove(&partner);
        Some(partner)
    }

    pub fn linked_portal(&self, id: EntityId) -> Option<EntityId> {
        self.portal_links.get(&id).copied()
    }

    // -- tick ---------------------------------------------------------------

    /// Per-tick world housekeeping: advance the clock and refresh every
    /// cached firmness flag.
    pub fn update(&mut self, dt: f64) {
        self.elapsed += dt;
        let changed = self.refresh_firmness();
        if changed > 0 {
            tracing::trace!(changed, "firmness refreshed");
        }
    }

    // -- invariants ---------------------------------------------------------

    /// Verify the structural invariants of the world.
    ///
    /// - Every active entity is in the slot its position names, in the layer
    ///   its kind requires.
    /// - Every non-empty cell references an active entity positioned there.
    /// - Portal links are mutual and only join live portals.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for entity in self.entities() {
            let slot = self.grid.get(entity.layer(), entity.pos());
            if slot != Some(entity.id()) {
                return Err(InvariantViolation::PositionMismatch {
                    entity: entity.id(),
                    stored: entity.pos(),
                    slot,
                });
            }
        }

        for layer in [Layer::Occupant, Layer::Fixture] {
            for (pos, id) in self.grid.cells(layer) {
                let Some(entity) = self.entity(id).filter(|e| e.is_active()) else {
                    return Err(InvariantViolation::DanglingCell { pos, entity: id });
                };
                if entity.pos() != pos {
                    return Err(InvariantViolation::DanglingCell { pos, entity: id });
                }
                if entity.layer() != layer {
                    return Err(InvariantViolation::WrongLayer { pos, entity: id });
                }
            }
        }

        for (&from, &to) in &self.portal_links {
            let mirrored = self.portal_links.get(&to) == Some(&from);
            let live = |id: EntityId| self.kind(id).is_some_and(|k| k.tag() == KindTag::Portal);
            if !mirrored || !live(from) || !live(to) {
                return Err(InvariantViolation::AsymmetricPortalLink { from, to });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> GridPos {
        GridPos::new(x, y)
    }

    // -- 1. placement -------------------------------------------------------

    #[test]
    fn spawn_places_entity_in_its_cell() {
        let mut world = World::new(5, 5);
        let id = world.spawn(EntityKind::Stone, p(2, 3)).unwrap();
        assert_eq!(world.at(p(2, 3)), Some(id));
        assert_eq!(world.pos_of(id), Some(p(2, 3)));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn spawn_out_of_bounds_is_rejected() {
        let mut world = World::new(5, 5);
        let err = world.spawn(EntityKind::Wall, p(5, 0)).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { .. }));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn spawn_on_occupied_cell_is_rejected() {
        let mut world = World::new(5, 5);
        let wall = world.spawn(EntityKind::Wall, p(1, 1)).unwrap();
        let err = world.spawn(EntityKind::Stone, p(1, 1)).unwrap_err();
        assert_eq!(
            err,
            GridError::Occupied {
                pos: p(1, 1),
                occupant: wall
            }
        );
    }

    #[test]
    fn portal_shares_cell_with_occupant() {
        let mut world = World::new(5, 5);
        let player = world.spawn(EntityKind::Player, p(2, 2)).unwrap();
        let portal = world.spawn(EntityKind::portal("a"), p(2, 2)).unwrap();
        assert_eq!(world.at(p(2, 2)), Some(player));
        assert_eq!(world.fixture_at(p(2, 2)), Some(portal));
        assert!(world.spawn(EntityKind::portal("b"), p(2, 2)).is_err());
        world.check_invariants().unwrap();
    }

    // -- 2. removal ---------------------------------------------------------

    #[test]
    fn remove_detaches_and_deactivates() {
        let mut world = World::new(5, 5);
        let id = world.spawn(EntityKind::flame(), p(0, 0)).unwrap();
        assert_eq!(world.remove(id).unwrap(), p(0, 0));
        assert_eq!(world.at(p(0, 0)), None);
        assert!(!world.is_alive(id));
        // The record is still inspectable.
        assert!(!world.entity(id).unwrap().is_active());
        assert_eq!(
            world.remove(id).unwrap_err(),
            GridError::StaleEntity { entity: id }
        );
    }

    #[test]
    fn ids_are_never_reused() {
        let mut world = World::new(3, 3);
        let a = world.spawn(EntityKind::Wall, p(0, 0)).unwrap();
        world.remove(a).unwrap();
        let b = world.spawn(EntityKind::Wall, p(0, 0)).unwrap();
        assert_ne!(a, b);
        assert!(!world.is_alive(a));
    }

    // -- 3. movement --------------------------------------------------------

    #[test]
    fn move_to_occupied_leaves_world_unchanged() {
        let mut world = World::new(5, 5);
        let a = world.spawn(EntityKind::Stone, p(1, 1)).unwrap();
        let b = world.spawn(EntityKind::Wall, p(2, 1)).unwrap();
        assert!(world.move_to(a, p(2, 1)).is_err());
        assert_eq!(world.at(p(1, 1)), Some(a));
        assert_eq!(world.at(p(2, 1)), Some(b));
        world.check_invariants().unwrap();
    }

    #[test]
    fn move_to_own_cell_is_noop() {
        let mut world = World::new(5, 5);
        let a = world.spawn(EntityKind::Stone, p(1, 1)).unwrap();
        world.move_to(a, p(1, 1)).unwrap();
        assert_eq!(world.at(p(1, 1)), Some(a));
    }

    #[test]
    fn move_destroyed_entity_fails() {
        let mut world = World::new(5, 5);
        let a = world.spawn(EntityKind::Stone, p(1, 1)).unwrap();
        world.remove(a).unwrap();
        assert!(matches!(
            world.move_to(a, p(2, 2)),
            Err(GridError::StaleEntity { .. })
        ));
    }

    // -- 4. queries ---------------------------------------------------------

    #[test]
    fn neighbors_come_up_down_right_left() {
        let mut world = World::new(5, 5);
        let left = world.spawn(EntityKind::Wall, p(1, 2)).unwrap();
        let right = world.spawn(EntityKind::Wall, p(3, 2)).unwrap();
        let down = world.spawn(EntityKind::Wall, p(2, 1)).unwrap();
        let up = world.spawn(EntityKind::Wall, p(2, 3)).unwrap();

        let ids: Vec<_> = world.neighbors4(p(2, 2)).into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids, vec![up, down, right, left]);
    }

    #[test]
    fn find_all_of_kind_is_row_major() {
        let mut world = World::new(5, 5);
        let top = world.spawn(EntityKind::flame(), p(0, 4)).unwrap();
        let right = world.spawn(EntityKind::flame(), p(3, 1)).unwrap();
        let left = world.spawn(EntityKind::flame(), p(1, 1)).unwrap();
        world.spawn(EntityKind::Wall, p(2, 1)).unwrap();

        assert_eq!(world.find_all_of_kind(KindTag::Flame), vec![left, right, top]);
        assert_eq!(world.count_of_kind(KindTag::Flame), 3);
        assert_eq!(world.count_of_kind(KindTag::Stone), 0);
    }

    #[test]
    fn iterate_lists_occupant_before_fixture() {
        let mut world = World::new(4, 4);
        let portal = world.spawn(EntityKind::portal("a"), p(1, 1)).unwrap();
        let player = world.spawn(EntityKind::Player, p(1, 1)).unwrap();
        let wall = world.spawn(EntityKind::Wall, p(0, 0)).unwrap();
        let ids: Vec<_> = world.iterate().into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids, vec![wall, player, portal]);
    }

    // -- 5. firmness --------------------------------------------------------

    #[test]
    fn side_wall_makes_ice_firm() {
        let mut world = World::new(6, 6);
        let wall = world.spawn(EntityKind::Wall, p(1, 3)).unwrap();
        let ice = world.spawn(EntityKind::ice_block(), p(2, 3)).unwrap();
        assert!(world.is_firm_now(ice));

        world.remove(wall).unwrap();
        world.update(1.0 / 60.0);
        assert!(!world.entity(ice).unwrap().is_firm());
    }

    #[test]
    fn non_solid_neighbours_do_not_make_firm() {
        let mut world = World::new(6, 6);
        world.spawn(EntityKind::Player, p(1, 3)).unwrap();
        let ice = world.spawn(EntityKind::ice_block(), p(2, 3)).unwrap();
        assert!(!world.is_firm_now(ice));
    }

    #[test]
    fn solid_support_below_makes_stone_firm() {
        let mut world = World::new(6, 6);
        world.spawn(EntityKind::Wall, p(2, 0)).unwrap();
        let stone = world.spawn(EntityKind::Stone, p(2, 1)).unwrap();
        assert!(world.is_firm_now(stone));
    }

    #[test]
    fn ice_below_is_slippery() {
        let mut world = World::new(6, 6);
        world.spawn(EntityKind::ice_block(), p(2, 1)).unwrap();
        let top = world.spawn(EntityKind::ice_block(), p(2, 2)).unwrap();
        assert!(!world.is_firm_now(top));
    }

    #[test]
    fn walls_never_check_firmness() {
        let mut world = World::new(6, 6);
        world.spawn(EntityKind::Wall, p(1, 1)).unwrap();
        let wall = world.spawn(EntityKind::Wall, p(2, 1)).unwrap();
        assert!(!world.is_firm_now(wall));
    }

    #[test]
    fn support_ignores_the_mover() {
        let mut world = World::new(6, 6);
        let ice = world.spawn(EntityKind::ice_block(), p(2, 2)).unwrap();
        assert!(world.is_supported(p(2, 3), None));
        assert!(!world.is_supported(p(2, 3), Some(ice)));
        assert!(world.is_supported(p(4, 0), None), "floor row is supported");
        assert!(!world.is_supported(p(4, 3), None));
    }

    // -- 6. kind state ------------------------------------------------------

    #[test]
    fn ignite_pot_once() {
        let mut world = World::new(4, 4);
        let pot = world.spawn(EntityKind::ice_pot(), p(1, 0)).unwrap();
        assert!(world.ignite_pot(pot).unwrap());
        assert!(world.kind(pot).unwrap().is_hot_pot());
        assert!(!world.ignite_pot(pot).unwrap());
    }

    #[test]
    fn set_slide_rejects_non_ice() {
        let mut world = World::new(4, 4);
        let stone = world.spawn(EntityKind::Stone, p(1, 0)).unwrap();
        let err = world.set_slide(stone, Some(Direction::Left)).unwrap_err();
        assert!(matches!(err, GridError::WrongKind { expected: KindTag::IceBlock, .. }));
    }

    // -- 7. portal links ----------------------------------------------------

    #[test]
    fn portal_links_are_symmetric() {
        let mut world = World::new(10, 10);
        let a = world.spawn(EntityKind::portal("x"), p(1, 5)).unwrap();
        let b = world.spawn(EntityKind::portal("x"), p(8, 2)).unwrap();
        world.link_portals(a, b).unwrap();
        assert_eq!(world.linked_portal(a), Some(b));
        assert_eq!(world.linked_portal(b), Some(a));

        assert_eq!(world.unlink_portal(b), Some(a));
        assert_eq!(world.linked_portal(a), None);
        assert_eq!(world.linked_portal(b), None);
    }

    #[test]
    fn relinking_drops_old_partner() {
        let mut world = World::new(10, 10);
        let a = world.spawn(EntityKind::portal("x"), p(1, 5)).unwrap();
        let b = world.spawn(EntityKind::portal("x"), p(2, 5)).unwrap();
        let c = world.spawn(EntityKind::portal("x"), p(3, 5)).unwrap();
        world.link_portals(a, b).unwrap();
        world.link_portals(a, c).unwrap();
        assert_eq!(world.linked_portal(b), None);
        assert_eq!(world.linked_portal(c), Some(a));
        world.check_invariants().unwrap();
    }

    #[test]
    fn destroying_a_portal_unlinks_it() {
        let mut world = World::new(10, 10);
        let a = world.spawn(EntityKind::portal("x"), p(1, 5)).unwrap();
        let b = world.spawn(EntityKind::portal("x"), p(8, 2)).unwrap();
        world.link_portals(a, b).unwrap();
        world.remove(a).unwrap();
        assert_eq!(world.linked_portal(b), None);
        world.check_invariants().unwrap();
    }

    #[test]
    fn link_rejects_self_and_non_portals() {
        let mut world = World::new(10, 10);
        let a = world.spawn(EntityKind::portal("x"), p(1, 5)).unwrap();
        let wall = world.spawn(EntityKind::Wall, p(1, 4)).unwrap();
        assert_eq!(
            world.link_portals(a, a).unwrap_err(),
            GridError::SelfLink { entity: a }
        );
        assert!(matches!(
            world.link_portals(a, wall),
            Err(GridError::WrongKind { .. })
        ));
    }

    // -- 8. invariants ------------------------------------------------------

    #[test]
    fn invariant_checker_detects_corruption() {
        let mut world = World::new(4, 4);
        let id = world.spawn(EntityKind::Stone, p(1, 1)).unwrap();
        // Corrupt the grid behind the world's back.
        world.grid.set(Layer::Occupant, p(1, 1), None);
        world.grid.set(Layer::Occupant, p(2, 2), Some(id));
        assert!(matches!(
            world.check_invariants(),
            Err(InvariantViolation::PositionMismatch { .. })
        ));
    }
}
