//! Integration tests for snapshots and deterministic replay, run on the
//! bundled levels.

use icer_engine::prelude::*;

const PORTAL_HOP: &str = include_str!("../levels/portal_hop.json");

fn level() -> Simulation {
    LevelDescription::from_json(PORTAL_HOP)
        .unwrap()
        .build(SimulationConfig::default())
        .unwrap()
}

/// Play a wandering script for `ticks` ticks while recording it.
fn record(sim: &mut Simulation, ticks: u64, interval: u64) -> ReplayLog {
    let mut recorder = ReplayRecorder::new(sim.capture_snapshot(), interval);
    for tick in 0..ticks {
        match tick % 25 {
            0 => sim.queue_action(PlayerAction::Move { dx: -1, dy: 0 }),
            12 => sim.queue_action(PlayerAction::Move { dx: 1, dy: 0 }),
            18 => sim.queue_action(PlayerAction::CreateIceLeft),
            _ => {}
        }
        recorder.record_before_tick(sim);
        sim.tick();
    }
    recorder.finish()
}

// -- 1. Replay ----------------------------------------------------------------

#[test]
fn replay_from_json_matches_live_run() {
    let mut live = level();
    let log = record(&mut live, 100, 10);
    let json = log.to_json().unwrap();

    let parsed = ReplayLog::from_json(&json).unwrap();
    let mut fresh = Simulation::new(World::new(1, 1), SimulationConfig::default());
    let result = replay(&mut fresh, &parsed).unwrap();

    assert!(result.completed);
    assert_eq!(result.ticks_replayed, 100);
    assert_eq!(fresh.state_hash(), live.state_hash());
    assert_eq!(
        fresh.rules().events().descriptions(),
        live.rules().events().descriptions()
    );
}

#[test]
fn altered_input_is_caught_at_its_checkpoint() {
    let mut live = level();
    let mut log = record(&mut live, 60, 0);

    for entry in &mut log.entries {
        if let ReplayEntry::Input { tick: 12, input } = entry {
            input.actions = vec![PlayerAction::CreateIceRight];
        }
    }

    let mut fresh = level();
    let result = replay(&mut fresh, &log).unwrap();
    assert!(!result.completed);
    let divergence = result.first_divergence.unwrap();
    assert_eq!(divergence.tick, 12);
    assert_ne!(divergence.expected_hash, divergence.actual_hash);
}

#[test]
fn replay_starting_mid_level() {
    let mut live = level();
    live.run_ticks(7);
    let log = record(&mut live, 40, 5);
    assert_eq!(log.initial_snapshot.tick_counter, 7);

    let mut fresh = level();
    let result = replay(&mut fresh, &log).unwrap();
    assert!(result.completed);
    assert_eq!(fresh.tick_count(), 47);
    assert_eq!(fresh.state_hash(), live.state_hash());
}

// -- 2. Snapshots -------------------------------------------------------------

#[test]
fn forks_evolve_identically() {
    let mut sim = level();
    sim.run_ticks(3);
    let fork = sim.fork_snapshot();

    sim.queue_action(PlayerAction::CreateIceRight);
    sim.run_ticks(20);
    let hash_a = sim.state_hash();

    sim.restore_from_snapshot(&fork).unwrap();
    sim.queue_action(PlayerAction::CreateIceRight);
    sim.run_ticks(20);

    assert_eq!(sim.state_hash(), hash_a);
    assert_eq!(sim.state(), GameState::Won);
}

#[test]
fn snapshot_json_restores_on_another_instance() {
    let mut sim = level();
    sim.run_ticks(5);
    let json = sim.capture_snapshot().to_json().unwrap();

    let snapshot = EngineSnapshot::from_json(&json).unwrap();
    let mut other = level();
    other.restore_from_snapshot(&snapshot).unwrap();

    assert_eq!(other.state_hash(), sim.state_hash());
    assert_eq!(other.tick_count(), 5);
    assert_eq!(other.rules().events().len(), sim.rules().events().len());
}

#[test]
fn snapshot_with_foreign_player_is_rejected() {
    let mut sim = level();
    let mut snapshot = sim.capture_snapshot();
    // Point the controller at the floor wall with id 0.
    let wall_player = Player::new(EntityId::new(0), PlayerConfig::default());
    snapshot.player = Some(wall_player);
    snapshot.hash = snapshot.recompute_hash();

    let before = sim.state_hash();
    let err = sim.restore_from_snapshot(&snapshot).unwrap_err();
    assert!(err.to_string().contains("not a live player entity"));
    assert_eq!(sim.state_hash(), before);
}
