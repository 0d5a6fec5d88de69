//! Pairwise elemental interactions between neighbouring entities.
//!
//! Three rules exist, each symmetric in argument order:
//!
//! - **extinguish** -- a flame next to an ice block: both are destroyed.
//! - **ignite** -- an unlit pot next to a flame: the pot becomes hot and can
//!   never be ignited again. The flame survives.
//! - **melt** -- an ice block directly on top of a hot pot: the ice is
//!   destroyed.
//!
//! Detection walks occupied cells row-major and looks at each cell's
//! neighbours in the world's fixed neighbour order. Every unordered pair is
//! considered once. Rules are applied in discovery order; a pair whose entity
//! was destroyed by an earlier rule in the same pass is skipped.

use std::collections::BTreeSet;

use icer_grid::entity::{EntityId, GridPos};
use icer_grid::kind::Layer;
use icer_grid::world::World;
use serde::{Deserialize, Serialize};

use crate::ice::IceSubsystem;

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Extinguish,
    Ignite,
    Melt,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 3] = [
        InteractionKind::Extinguish,
        InteractionKind::Ignite,
        InteractionKind::Melt,
    ];
}

/// A classified interaction between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub kind: InteractionKind,
    /// The flame (extinguish) or the pot (ignite, melt).
    pub source: EntityId,
    /// The ice block (extinguish, melt) or the flame (ignite).
    pub target: EntityId,
    /// Where the effect is reported: the flame, the ignited pot, or the
    /// melted ice.
    pub site: GridPos,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify the pair `(a, b)` in either order. Returns `None` if no rule
/// applies or either entity is not active.
pub fn classify(world: &World, a: EntityId, b: EntityId) -> Option<Interaction> {
    classify_ordered(world, a, b).or_else(|| classify_ordered(world, b, a))
}

fn classify_ordered(world: &World, source: EntityId, target: EntityId) -> Option<Interaction> {
    let (src, tgt) = (world.kind(source)?, world.kind(target)?);
    let (src_pos, tgt_pos) = (world.pos_of(source)?, world.pos_of(target)?);
    let adjacent = src_pos.manhattan(tgt_pos) == 1;

    let (kind, site) = if src.is_flame() && tgt.is_ice() && adjacent {
        (InteractionKind::Extinguish, src_pos)
    } else if src.is_ignitable_pot() && tgt.is_flame() && adjacent {
        (InteractionKind::Ignite, src_pos)
    } else if src.is_hot_pot() && tgt.is_ice() && tgt_pos == src_pos.above() {
        (InteractionKind::Melt, tgt_pos)
    } else {
        return None;
    };

    Some(Interaction {
        kind,
        source,
        target,
        site,
    })
}

/// Detect every interaction currently present in the world, de-duplicated
/// by unordered entity pair, in discovery order.
pub fn detect(world: &World) -> Vec<Interaction> {
    let mut seen: BTreeSet<(EntityId, EntityId)> = BTreeSet::new();
    let mut found = Vec::new();

    for (pos, id) in world.grid().cells(Layer::Occupant) {
        for (_, other) in world.neighbors4(pos) {
            let key = if id < other { (id, other) } else { (other, id) };
            if !seen.insert(key) {
                continue;
            }
            if let Some(interaction) = classify(world, id, other) {
                found.push(interaction);
            }
        }
    }
    found
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Apply one interaction if it still holds in the current world.
///
/// Ice destroyed here is released from the ice manifest in the same call.
/// Returns `true` if the world changed.
pub fn apply(world: &mut World, ice: &mut IceSubsystem, interaction: &Interaction) -> bool {
    let still_valid = classify(world, interaction.source, interaction.target)
        .is_some_and(|current| current.kind == interaction.kind);
    if !still_valid {
        tracing::trace!(?interaction, "interaction no longer applies");
        return false;
    }

    let applied = match interaction.kind {
        InteractionKind::Extinguish => {
            let flame = world.remove(interaction.source).is_ok();
            let ice_gone = ice.destroy(world, interaction.target).is_ok();
            flame && ice_gone
        }
        InteractionKind::Ignite => world.ignite_pot(interaction.source).unwrap_or(false),
        InteractionKind::Melt => ice.destroy(world, interaction.target).is_ok(),
    };

    if applied {
        tracing::debug!(
            kind = ?interaction.kind,
            source = %interaction.source,
            target = %interaction.target,
            site = %interaction.site,
            "interaction applied"
        );
    }
    applied
}

/// Detect, then apply in discovery order every interaction whose kind is in
/// `kinds`. Returns the interactions that actually changed the world.
pub fn run_pass(
    world: &mut World,
    ice: &mut IceSubsystem,
    kinds: &[InteractionKind],
) -> Vec<Interaction> {
    detect(world)
        .into_iter()
        .filter(|i| kinds.contains(&i.kind))
        .filter(|i| apply(world, ice, i))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IceConfig;
    use icer_grid::kind::{EntityKind, KindTag};

    fn p(x: i32, y: i32) -> GridPos {
        GridPos::new(x, y)
    }

    // -- 1. classification --------------------------------------------------

    #[test]
    fn classification_is_symmetric() {
        let mut world = World::new(8, 4);
        let flame = world.spawn(EntityKind::flame(), p(1, 1)).unwrap();
        let ice = world.spawn(EntityKind::ice_block(), p(2, 1)).unwrap();

        let ab = classify(&world, flame, ice).unwrap();
        let ba = classify(&world, ice, flame).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.kind, InteractionKind::Extinguish);
        assert_eq!(ab.source, flame);
        assert_eq!(ab.site, p(1, 1));
    }

    #[test]
    fn melt_requires_ice_directly_above() {
        let mut world = World::new(8, 4);
        let pot = world.spawn(EntityKind::hot_pot(), p(3, 1)).unwrap();
        let beside = world.spawn(EntityKind::ice_block(), p(4, 1)).unwrap();
        let below = world.spawn(EntityKind::ice_block(), p(3, 0)).unwrap();
        assert_eq!(classify(&world, pot, beside), None);
        assert_eq!(classify(&world, pot, below), None);

        let above = world.spawn(EntityKind::ice_block(), p(3, 2)).unwrap();
        let melt = classify(&world, above, pot).unwrap();
        assert_eq!(melt.kind, InteractionKind::Melt);
        assert_eq!(melt.site, p(3, 2));
    }

    #[test]
    fn lit_pot_does_not_ignite_again() {
        let mut world = World::new(8, 4);
        let pot = world.spawn(EntityKind::hot_pot(), p(3, 1)).unwrap();
        let flame = world.spawn(EntityKind::flame(), p(4, 1)).unwrap();
        assert_eq!(classify(&world, pot, flame), None);
    }

    #[test]
    fn diagonal_pairs_do_not_interact() {
        let mut world = World::new(8, 4);
        world.spawn(EntityKind::flame(), p(1, 1)).unwrap();
        world.spawn(EntityKind::ice_block(), p(2, 2)).unwrap();
        assert!(detect(&world).is_empty());
    }

    // -- 2. detection -------------------------------------------------------

    #[test]
    fn each_pair_is_detected_once() {
        let mut world = World::new(8, 4);
        world.spawn(EntityKind::flame(), p(1, 1)).unwrap();
        world.spawn(EntityKind::ice_block(), p(2, 1)).unwrap();
        assert_eq!(detect(&world).len(), 1);
    }

    #[test]
    fn detection_follows_row_major_order() {
        let mut world = World::new(8, 4);
        let high_flame = world.spawn(EntityKind::flame(), p(0, 3)).unwrap();
        world.spawn(EntityKind::ice_block(), p(1, 3)).unwrap();
        let low_flame = world.spawn(EntityKind::flame(), p(5, 0)).unwrap();
        world.spawn(EntityKind::ice_block(), p(6, 0)).unwrap();

        let sources: Vec<_> = detect(&world).iter().map(|i| i.source).collect();
        assert_eq!(sources, vec![low_flame, high_flame]);
    }

    // -- 3. application -----------------------------------------------------

    #[test]
    fn one_flame_between_two_ice_blocks_takes_only_one() {
        let mut world = World::new(8, 4);
        let left = world.spawn(EntityKind::ice_block(), p(1, 1)).unwrap();
        let flame = world.spawn(EntityKind::flame(), p(2, 1)).unwrap();
        let right = world.spawn(EntityKind::ice_block(), p(3, 1)).unwrap();
        let mut ice = IceSubsystem::new(IceConfig::default());
        ice.adopt_existing(&world);

        let applied = run_pass(&mut world, &mut ice, &InteractionKind::ALL);
        assert_eq!(applied.len(), 1);
        assert!(!world.is_alive(flame));
        // Discovery starts at (1,1), so the left block is consumed.
        assert!(!world.is_alive(left));
        assert!(world.is_alive(right));
        assert!(!ice.contains(left));
        assert!(ice.contains(right));
    }

    #[test]
    fn ignite_keeps_the_flame() {
        let mut world = World::new(8, 4);
        let pot = world.spawn(EntityKind::ice_pot(), p(1, 1)).unwrap();
        let flame = world.spawn(EntityKind::flame(), p(2, 1)).unwrap();
        let mut ice = IceSubsystem::new(IceConfig::default());

        let applied = run_pass(&mut world, &mut ice, &[InteractionKind::Ignite]);
        assert_eq!(applied.len(), 1);
        assert!(world.kind(pot).unwrap().is_hot_pot());
        assert!(world.is_alive(flame));
    }

    #[test]
    fn pass_filter_skips_other_kinds() {
        let mut world = World::new(8, 4);
        world.spawn(EntityKind::flame(), p(1, 1)).unwrap();
        world.spawn(EntityKind::ice_block(), p(2, 1)).unwrap();
        let mut ice = IceSubsystem::new(IceConfig::default());

        assert!(run_pass(&mut world, &mut ice, &[InteractionKind::Melt]).is_empty());
        assert_eq!(world.count_of_kind(KindTag::Flame), 1);
    }

    #[test]
    fn stale_interaction_is_not_applied() {
        let mut world = World::new(8, 4);
        let flame = world.spawn(EntityKind::flame(), p(1, 1)).unwrap();
        let block = world.spawn(EntityKind::ice_block(), p(2, 1)).unwrap();
        let mut ice = IceSubsystem::new(IceConfig::default());
        let found = detect(&world);

        world.remove(flame).unwrap();
        assert!(!apply(&mut world, &mut ice, &found[0]));
        assert!(world.is_alive(block));
    }
}
