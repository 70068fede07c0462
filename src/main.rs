//! Dropzone Match Server
//!
//! Runs a demo match against the authoritative simulation and checks that
//! replaying the recording reproduces the final state hash.
//!
//! Usage: `dropzone-server [config.json]`

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dropzone::{
    TICK_RATE, VERSION,
    config::MatchConfig,
    game::{
        events::{GameEventData, LogSink},
        input::{CommandFrame, PlayerCommand},
        state::PlayerId,
        tick::replay_match,
        world::FlatGround,
        MatchHost,
    },
    FIXED_ONE,
};

/// Safety cap on the demo length (five minutes of simulated time).
const MAX_DEMO_TICKS: u32 = TICK_RATE * 300;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Dropzone Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => MatchConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => MatchConfig::default(),
    };

    demo_match(config)
}

/// Play one round with scripted fighters, then verify by replay.
fn demo_match(config: MatchConfig) -> Result<()> {
    info!("=== Starting Demo Match ===");

    let match_id = [1u8; 16];
    let seed = 12345u64;
    let mut host = MatchHost::new(match_id, seed, config, Box::new(FlatGround::new(0)))?;
    host.subscribe(Box::new(LogSink));

    let players: Vec<PlayerId> = (1..=4).map(|i| PlayerId::new([i; 16])).collect();
    for (i, id) in players.iter().enumerate() {
        let position = host.join(*id, format!("fighter-{}", i + 1))?;
        let (x, y, z) = position.to_floats();
        info!("Added player {} at ({:.1}, {:.1}, {:.1})", id.short(), x, y, z);
    }
    host.start_game();

    let delta = FIXED_ONE / TICK_RATE as i32;
    let mut total_events = 0usize;
    let mut winner = None;

    for t in 0..MAX_DEMO_TICKS {
        // Once per second every survivor takes a swing at the next survivor.
        if host.state().is_playing() && t % TICK_RATE == 0 {
            let alive: Vec<PlayerId> = host
                .state()
                .players
                .values()
                .filter(|p| p.alive)
                .map(|p| p.id)
                .collect();
            for (i, attacker) in alive.iter().enumerate() {
                let target = alive[(i + 1) % alive.len()];
                if target != *attacker {
                    host.submit(CommandFrame::new(
                        *attacker,
                        PlayerCommand::Hit { target, damage: (10 + 5 * i as i32) * FIXED_ONE },
                    ));
                }
            }
        }

        let result = host.step(delta);
        total_events += result.events.len();

        for event in &result.events {
            if let GameEventData::PlayerKilled { victim_id, killer_name, .. } = &event.data {
                info!("Player {} eliminated by {}", victim_id.short(), killer_name);
            }
        }

        if result.match_ended {
            winner = result.winner;
            info!("Match ended at tick {}", host.state().tick);
            break;
        }
    }

    info!("=== Match Results ===");
    match winner {
        Some(id) => info!("Winner: {} ({} kills)", id.short(), host.state().kills_of(&id)),
        None => info!("No winner"),
    }
    let hash = host.state_hash();
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Total events: {}", total_events);

    info!("=== Verifying Determinism ===");
    let (replayed, _) = replay_match(host.recording(), host.config(), &FlatGround::new(0));
    let replay_hash = replayed.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash != replay_hash {
        bail!("replay diverged from the live match");
    }
    info!("DETERMINISM VERIFIED: Hashes match!");
    Ok(())
}
