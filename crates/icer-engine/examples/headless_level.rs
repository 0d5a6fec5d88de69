//! Headless level runner -- loads the bundled levels, plays a scripted
//! solution for each, prints the board and verifies the run by replay.
//!
//! Run with:
//!   cargo run --example headless_level -p icer-engine
//!
//! Set `RUST_LOG=icer_engine=debug` to see every rejected action and move.

use icer_engine::prelude::*;

const LEVELS: &[(&str, &str)] = &[
    ("first_frost", include_str!("../levels/first_frost.json")),
    ("portal_hop", include_str!("../levels/portal_hop.json")),
];

/// Actions to queue, keyed by the tick they are queued before.
fn script(level: &str) -> Vec<(u64, PlayerAction)> {
    match level {
        "first_frost" => vec![(0, PlayerAction::CreateIceRight)],
        "portal_hop" => vec![(2, PlayerAction::CreateIceRight)],
        _ => Vec::new(),
    }
}

fn glyph(kind: &EntityKind) -> char {
    match kind {
        EntityKind::Player => '@',
        EntityKind::Wall => '#',
        EntityKind::IceBlock(_) => 'I',
        EntityKind::Flame { .. } => '^',
        EntityKind::Stone => 'o',
        EntityKind::Pot(_) if kind.is_hot_pot() => 'U',
        EntityKind::Pot(_) => 'u',
        EntityKind::Portal(_) => 'O',
    }
}

/// Render the occupant layer top row first, falling back to fixtures.
fn render(world: &World) -> String {
    let mut out = String::new();
    for y in (0..world.height()).rev() {
        for x in 0..world.width() {
            let pos = GridPos::new(x, y);
            let id = world.at(pos).or_else(|| world.fixture_at(pos));
            let c = id
                .and_then(|id| world.kind(id))
                .map(glyph)
                .unwrap_or('.');
            out.push(c);
        }
        out.push('\n');
    }
    out
}

fn play(id: &str, json: &str) -> Result<(), anyhow::Error> {
    let level = LevelDescription::from_json(json)?;
    let mut sim = level.build(SimulationConfig::default())?;
    println!("== {} ({}) ==", level.name, level.metadata.difficulty);
    print!("{}", render(sim.world()));

    let script = script(id);
    let mut recorder = ReplayRecorder::new(sim.capture_snapshot(), 10);
    while !sim.rules().is_over() && sim.tick_count() < 600 {
        let tick = sim.tick_count();
        for (_, action) in script.iter().filter(|(at, _)| *at == tick) {
            sim.queue_action(*action);
        }
        recorder.record_before_tick(&sim);
        let report = sim.tick();
        for outcome in &report.actions {
            if let Err(rejection) = &outcome.result {
                println!("tick {tick}: {:?} rejected: {rejection}", outcome.action);
            }
        }
        for event in &report.events {
            println!("tick {}: {}", event.tick, event.description);
        }
    }

    print!("{}", render(sim.world()));
    let status = sim.status();
    println!(
        "state: {:?}, moves: {}, time: {:.2}s",
        status.state, status.moves_taken, status.time_elapsed
    );

    let log = recorder.finish();
    let mut check = Simulation::new(World::new(1, 1), SimulationConfig::default());
    let result = replay(&mut check, &log)?;
    anyhow::ensure!(
        result.completed && check.state_hash() == sim.state_hash(),
        "replay of {id} diverged: {:?}",
        result.first_divergence
    );
    println!("replay verified over {} ticks\n", result.ticks_replayed);
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    for (id, json) in LEVELS {
        play(id, json)?;
    }
    Ok(())
}
