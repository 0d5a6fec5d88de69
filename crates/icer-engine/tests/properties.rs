//! End-to-end checks of the engine's headline guarantees, each on the
//! smallest world that exercises it.

use icer_engine::interaction;
use icer_engine::prelude::*;

fn p(x: i32, y: i32) -> GridPos {
    GridPos::new(x, y)
}

fn floored(width: i32, height: i32) -> World {
    let mut world = World::new(width, height);
    for x in 0..width {
        world.spawn(EntityKind::Wall, p(x, 0)).unwrap();
    }
    world
}

// -- 1. Grid invariant -------------------------------------------------------

#[test]
fn busy_simulation_keeps_grid_invariants() {
    let mut world = floored(12, 10);
    for y in 3..8 {
        world.spawn(EntityKind::ice_block(), p(4, y)).unwrap();
        world.spawn(EntityKind::Stone, p(7, y)).unwrap();
    }
    world.spawn(EntityKind::flame(), p(5, 1)).unwrap();
    world.spawn(EntityKind::hot_pot(), p(8, 1)).unwrap();
    let mut sim = Simulation::new(world, SimulationConfig::default());
    sim.spawn_player(p(1, 1)).unwrap();

    let actions = [
        PlayerAction::Move { dx: 1, dy: 0 },
        PlayerAction::CreateIceRight,
        PlayerAction::Push { dx: 1 },
        PlayerAction::Move { dx: 1, dy: 0 },
        PlayerAction::CreateIceLeft,
    ];
    for tick in 0..240 {
        if tick % 15 == 0 {
            sim.queue_action(actions[(tick / 15) % actions.len()]);
        }
        sim.tick();
        assert_eq!(sim.world().check_invariants(), Ok(()), "after tick {tick}");
    }
}

// -- 2. Gravity idempotence --------------------------------------------------

#[test]
fn gravity_on_settled_world_moves_nothing() {
    let mut world = floored(8, 8);
    for y in 1..4 {
        world.spawn(EntityKind::ice_block(), p(2, y)).unwrap();
    }
    world.spawn(EntityKind::Stone, p(5, 1)).unwrap();
    world.spawn(EntityKind::Player, p(6, 1)).unwrap();

    assert!(PhysicsEngine::apply_gravity(&mut world).is_empty());
    let before = world.capture_snapshot();
    assert!(PhysicsEngine::apply_gravity(&mut world).is_empty());
    assert_eq!(world.capture_snapshot(), before);
}

// -- 3. Push distance bound --------------------------------------------------

#[test]
fn two_cell_push_is_rejected_without_changes() {
    let mut world = World::new(8, 4);
    let stone = world.spawn(EntityKind::Stone, p(3, 0)).unwrap();
    let before = world.capture_snapshot();

    let result = PushSystem::try_push(&mut world, stone, p(3, 0), p(5, 0));
    assert_eq!(
        result,
        Err(Rejection::TooFar {
            distance: 2,
            limit: 1
        })
    );
    assert_eq!(world.capture_snapshot(), before);
}

// -- 4. Extinguish symmetry --------------------------------------------------

#[test]
fn flame_and_ice_destroy_each_other() {
    let mut world = floored(10, 4);
    let flame = world.spawn(EntityKind::flame(), p(5, 1)).unwrap();
    let block = world.spawn(EntityKind::ice_block(), p(6, 1)).unwrap();
    let mut ice = IceSubsystem::default();
    ice.adopt_existing(&world);

    let applied = interaction::run_pass(&mut world, &mut ice, &[InteractionKind::Extinguish]);

    assert_eq!(applied.len(), 1);
    for id in [flame, block] {
        assert!(!world.is_alive(id));
        assert!(!world.entity(id).unwrap().is_active());
    }
    assert_eq!(world.at(p(5, 1)), None);
    assert_eq!(world.at(p(6, 1)), None);
    assert!(ice.is_empty());
}

// -- 5. Portal round-trip ----------------------------------------------------

#[test]
fn player_below_portal_is_carried_to_its_partner() {
    let mut world = floored(20, 8);
    world.spawn(EntityKind::Wall, p(17, 3)).unwrap();
    let p1 = world.spawn(EntityKind::portal("a"), p(2, 5)).unwrap();
    let p2 = world.spawn(EntityKind::portal("a"), p(17, 4)).unwrap();
    world.link_portals(p1, p2).unwrap();
    world.spawn(EntityKind::Wall, p(2, 3)).unwrap();
    let player = world.spawn(EntityKind::Player, p(2, 4)).unwrap();
    world.spawn(EntityKind::flame(), p(10, 1)).unwrap();

    let mut ice = IceSubsystem::default();
    let mut rules = RulesEngine::default();
    rules.set_player(Some(player));
    let events = rules.update(0.0, &mut world, &mut ice, &Observations::default());

    assert_eq!(world.pos_of(player), Some(p(17, 4)));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PuzzleEventKind::PortalTransport);
    assert_eq!(events[0].entities, vec![player, p1, p2]);
    assert_eq!(events[0].description, "Used portal from (2, 5)");
}

// -- 6. Chain fall -----------------------------------------------------------

#[test]
fn removing_the_base_drops_the_column_in_one_pass() {
    let mut world = floored(8, 8);
    let base = world.spawn(EntityKind::ice_block(), p(3, 1)).unwrap();
    let middle = world.spawn(EntityKind::ice_block(), p(3, 2)).unwrap();
    let top = world.spawn(EntityKind::ice_block(), p(3, 3)).unwrap();

    world.remove(base).unwrap();
    let chains = IceSubsystem::find_chains(&world);
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].blocks, vec![middle, top]);

    let motions = PhysicsEngine::apply_gravity(&mut world);
    let moves: Vec<(GridPos, GridPos)> = motions.iter().map(|m| (m.from, m.to)).collect();
    assert_eq!(moves, vec![(p(3, 2), p(3, 1)), (p(3, 3), p(3, 2))]);
    assert_eq!(world.pos_of(middle), Some(p(3, 1)));
    assert_eq!(world.pos_of(top), Some(p(3, 2)));
}

// -- 7. Win terminality ------------------------------------------------------

#[test]
fn won_level_stays_won_past_its_limits() {
    let mut world = floored(6, 4);
    world.spawn(EntityKind::flame(), p(3, 1)).unwrap();
    world.spawn(EntityKind::ice_block(), p(3, 3)).unwrap();
    let mut sim = Simulation::new(world, SimulationConfig::default());
    sim.set_requirements(Requirements {
        time_limit: Some(0.5),
        ..Requirements::default()
    });

    assert_eq!(sim.run_until_over(20), GameState::Won);
    sim.run_ticks(120);
    assert!(sim.rules().time_elapsed() < 0.5);
    assert_eq!(sim.state(), GameState::Won);
    assert_eq!(sim.rules().lose_reason(), None);
}

// -- 8. Firmness -------------------------------------------------------------

#[test]
fn wall_on_the_left_makes_ice_firm_until_removed() {
    let mut world = World::new(8, 4);
    let wall = world.spawn(EntityKind::Wall, p(2, 0)).unwrap();
    let block = world.spawn(EntityKind::ice_block(), p(3, 0)).unwrap();

    assert_eq!(world.refresh_firmness_of(block), Some(true));
    assert!(world.entity(block).unwrap().is_firm());

    world.remove(wall).unwrap();
    assert_eq!(world.refresh_firmness_of(block), Some(false));
    assert!(!world.entity(block).unwrap().is_firm());
}

// -- 9. Determinism ----------------------------------------------------------

fn scripted_run() -> String {
    let mut world = floored(10, 8);
    for y in 4..7 {
        world.spawn(EntityKind::ice_block(), p(6, y)).unwrap();
    }
    world.spawn(EntityKind::flame(), p(8, 1)).unwrap();
    world.spawn(EntityKind::ice_pot(), p(9, 1)).unwrap();
    let mut sim = Simulation::new(world, SimulationConfig::default());
    sim.spawn_player(p(1, 1)).unwrap();
    for tick in 0..180 {
        if tick % 13 == 0 {
            sim.queue_action(PlayerAction::Move { dx: 1, dy: 0 });
        }
        if tick % 29 == 0 {
            sim.queue_action(PlayerAction::CreateIceRight);
        }
        sim.tick();
    }
    sim.state_hash()
}

#[test]
fn identical_runs_reach_identical_hashes() {
    assert_eq!(scripted_run(), scripted_run());
}
