//! Match Lifecycle
//!
//! Roster bookkeeping and the Lobby → Starting → Playing → Ending → Lobby
//! transitions. Only the host calls these; `tick` drives the timed
//! transitions, the host drives joins, leaves and manual starts.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::MatchConfig;
use crate::core::fixed::FIXED_ONE;
use crate::core::rng::{DeterministicRng, derive_round_seed};
use crate::core::vec3::FixedVec3;
use crate::game::effects::EffectKind;
use crate::game::events::{GameEvent, GameEventData, MusicTrack, UiPanel};
use crate::game::health::DamageSource;
use crate::game::input::HostAction;
use crate::game::state::{MatchPhase, MatchState, PlayerId, PlayerState};
use crate::game::world::GroundQuery;

/// Killer name announced for deaths nobody is credited with.
pub const ENVIRONMENT_KILLER: &str = "Zone";

/// Rejected roster changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Player is already in the roster
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),

    /// Roster is at capacity
    #[error("roster full ({0} players)")]
    RosterFull(u32),
}

// =============================================================================
// ROSTER
// =============================================================================

/// Pick a spawn position for a player.
///
/// Uses a configured spawn point plus a random planar offset within
/// `spawn_radius` when any are configured, else a uniform point on the map.
/// Height comes from the ground probe; without a hit the point keeps its
/// configured height (or 0 on the open map).
pub fn spawn_position(state: &mut MatchState, config: &MatchConfig, ground: &dyn GroundQuery) -> FixedVec3 {
    let (x, z, fallback_y) = match state.rng.choose(&config.spawn_points).copied() {
        Some(point) => {
            let (dx, dz) = state.rng.random_offset_in_disc(config.spawn_radius);
            (point.x.saturating_add(dx), point.z.saturating_add(dz), point.y)
        }
        None => {
            let (x, z) = state.rng.random_map_point(config.loot.map_half_extent);
            (x, z, 0)
        }
    };
    let y = ground.ground_height(x, z).unwrap_or(fallback_y);
    FixedVec3::new(x, y, z)
}

/// Add a player to the roster and spawn them.
pub fn join(
    state: &mut MatchState,
    config: &MatchConfig,
    ground: &dyn GroundQuery,
    player_id: PlayerId,
    name: String,
) -> Result<FixedVec3, RosterError> {
    if state.players.contains_key(&player_id) {
        return Err(RosterError::AlreadyJoined(player_id));
    }
    if state.roster_size() >= config.max_players {
        return Err(RosterError::RosterFull(config.max_players));
    }

    let position = spawn_position(state, config, ground);
    state
        .players
        .insert(player_id, PlayerState::new(player_id, name.clone(), position, config));
    state.kills.insert(player_id, 0);

    info!(player = %player_id, name = %name, roster = state.roster_size(), "Player joined");
    let tick = state.tick;
    state.push_event(GameEvent::lifecycle(tick, GameEventData::PlayerJoined { player_id, name }));
    push_player_count(state);
    Ok(position)
}

/// Remove a player. Returns `false` for unknown players.
pub fn leave(state: &mut MatchState, player_id: &PlayerId) -> bool {
    if state.players.remove(player_id).is_none() {
        return false;
    }
    state.kills.remove(player_id);
    state.zone.forget(player_id);
    state.effects.cancel_owned_by(player_id);

    info!(player = %player_id, roster = state.roster_size(), "Player left");
    let tick = state.tick;
    state.push_event(GameEvent::lifecycle(tick, GameEventData::PlayerLeft { player_id: *player_id }));
    push_player_count(state);
    true
}

fn push_player_count(state: &mut MatchState) {
    let tick = state.tick;
    let count = state.roster_size();
    let alive = state.alive_count();
    state.push_event(GameEvent::lifecycle(tick, GameEventData::PlayerCount { count, alive }));
}

/// Record a death.
///
/// The victim leaves the alive set. The attacker is credited only when it is
/// another roster member; environmental and self-inflicted deaths credit
/// nobody.
pub fn on_kill(state: &mut MatchState, victim: PlayerId, source: DamageSource) {
    let Some(player) = state.players.get_mut(&victim) else {
        return;
    };
    if !player.alive {
        return;
    }
    player.alive = false;
    player.health.die();
    state.zone.forget(&victim);
    state.effects.cancel_owned_by(&victim);

    let killer = source.attacker().filter(|a| state.players.contains_key(a));
    if let Some(attacker) = killer.filter(|a| *a != victim) {
        *state.kills.entry(attacker).or_insert(0) += 1;
    }
    let killer_name = killer
        .and_then(|a| state.player_name(&a))
        .unwrap_or(ENVIRONMENT_KILLER)
        .to_string();

    info!(victim = %victim, killer = %killer_name, alive = state.alive_count(), "Player killed");
    let tick = state.tick;
    state.push_event(GameEvent::player_killed(tick, victim, killer, killer_name));
    push_player_count(state);
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Manual start. Only leaves the lobby; returns `false` anywhere else.
pub fn start_game(state: &mut MatchState, config: &MatchConfig) -> bool {
    if state.phase != MatchPhase::Lobby {
        return false;
    }
    enter_starting(state, config);
    true
}

/// Lobby → Starting.
pub fn enter_starting(state: &mut MatchState, config: &MatchConfig) {
    state.phase = MatchPhase::Starting;
    state.phase_elapsed = 0;
    info!(roster = state.roster_size(), "Game starting");
    let tick = state.tick;
    state.push_event(GameEvent::lifecycle(
        tick,
        GameEventData::GameStarting { countdown: config.countdown },
    ));
}

/// Starting → Playing. Resets the zone and spawns loot.
pub fn enter_playing(state: &mut MatchState, config: &MatchConfig) {
    state.phase = MatchPhase::Playing;
    state.phase_elapsed = 0;
    state.zone.reset();
    let count = state.spawner.respawn_all(&mut state.rng);

    info!(roster = state.roster_size(), loot = count, "Game started");
    let tick = state.tick;
    state.push_event(GameEvent::loot(tick, GameEventData::LootSpawned { count }));
    state.push_event(GameEvent::lifecycle(tick, GameEventData::GameStarted));
    state.push_event(GameEvent::music(tick, MusicTrack::Game));
    state.push_event(GameEvent::panel(tick, UiPanel::Game));
    start_music_fade(state, config);
}

/// Playing → Ending. A missing winner is announced without a name.
pub fn enter_ending(state: &mut MatchState, winner: Option<PlayerId>) {
    state.phase = MatchPhase::Ending;
    state.phase_elapsed = 0;
    state.winner = winner;

    let winner_name = winner.and_then(|w| state.player_name(&w)).map(str::to_string);
    info!(winner = ?winner_name, tick = state.tick, "Game ended");
    let tick = state.tick;
    state.push_event(GameEvent::lifecycle(
        tick,
        GameEventData::GameEnded { winner_id: winner, winner_name },
    ));
    state.push_event(GameEvent::panel(tick, UiPanel::GameOver));
    let track = if winner.is_some() { MusicTrack::Victory } else { MusicTrack::Defeat };
    state.push_event(GameEvent::music(tick, track));
}

/// Ending (or anywhere, when forced) → Lobby with a fresh round.
///
/// Reseeds the RNG for the next round, revives and respawns every roster
/// member with empty inventories, clears kills, loot and in-flight effects,
/// and resets the zone.
pub fn restart(state: &mut MatchState, config: &MatchConfig, ground: &dyn GroundQuery) {
    state.round += 1;
    state.rng_seed = derive_round_seed(&state.match_id, state.base_seed, state.round);
    state.rng = DeterministicRng::new(state.rng_seed);

    let ids: Vec<PlayerId> = state.players.keys().copied().collect();
    for id in &ids {
        state.effects.cancel_owned_by(id);
    }
    for id in ids {
        let position = spawn_position(state, config, ground);
        if let Some(player) = state.players.get_mut(&id) {
            player.health.reset();
            player.inventory.clear();
            player.alive = true;
            player.position = position;
            player.facing = FixedVec3::FORWARD;
        }
        state.kills.insert(id, 0);
    }

    state.zone.reset();
    state.spawner.clear();
    state.winner = None;
    state.phase = MatchPhase::Lobby;
    state.phase_elapsed = 0;

    info!(round = state.round, seed = state.rng_seed, "Game restarted");
    let tick = state.tick;
    let round = state.round;
    state.push_event(GameEvent::lifecycle(tick, GameEventData::GameRestarted { round }));
    state.push_event(GameEvent::panel(tick, UiPanel::Lobby));
    state.push_event(GameEvent::music(tick, MusicTrack::Lobby));
    push_player_count(state);
}

/// Winner check for the current tick.
///
/// Returns the winner once the alive count is within the mode's threshold.
/// A tick that leaves nobody alive is not a win; the match keeps running
/// until the host restarts it.
pub fn check_win(state: &MatchState) -> Option<PlayerId> {
    let alive = state.alive_count();
    if alive == 0 || alive > state.mode.alive_threshold() {
        return None;
    }
    state
        .players
        .values()
        .filter(|p| p.alive)
        .map(|p| p.id)
        .next_back()
}

fn start_music_fade(state: &mut MatchState, config: &MatchConfig) {
    let kind = EffectKind::MusicFade { target_volume: FIXED_ONE };
    let duration = config.effects.music_fade_time;
    match state.effects.start(None, kind, duration) {
        Ok(_) => {
            let tick = state.tick;
            state.push_event(GameEvent::new(
                tick,
                crate::game::events::EventPriority::Effect,
                GameEventData::EffectStarted { owner: None, kind, duration },
            ));
        }
        Err(err) => debug!(%err, "Music fade skipped"),
    }
}

/// Apply a recorded host action.
pub fn apply_host_action(
    state: &mut MatchState,
    config: &MatchConfig,
    ground: &dyn GroundQuery,
    action: &HostAction,
) -> Result<(), RosterError> {
    match action {
        HostAction::Join { player_id, name } => {
            join(state, config, ground, *player_id, name.clone()).map(|_| ())
        }
        HostAction::Leave { player_id } => {
            leave(state, player_id);
            Ok(())
        }
        HostAction::StartGame => {
            start_game(state, config);
            Ok(())
        }
        HostAction::Restart => {
            restart(state, config, ground);
            Ok(())
        }
    }
}
