//! Authoritative Simulation Tick
//!
//! One explicit step of the match. Everything that mutates match state
//! happens here or in the lifecycle functions the host calls, so two hosts fed
//! the same seed, config and command stream stay bit-identical.

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::MatchConfig;
use crate::core::fixed::Fixed;
use crate::core::vec3::FixedVec3;
use crate::game::effects::{EffectError, EffectKind};
use crate::game::events::{sort_events, EventPriority, GameEvent, GameEventData};
use crate::game::health::{DamageOutcome, DamageSource, HealthState};
use crate::game::input::{CommandFrame, MatchRecording, PlayerCommand};
use crate::game::inventory::{InventoryError, InventoryStack, ItemUse};
use crate::game::lifecycle::{self, apply_host_action, check_win};
use crate::game::spawner::PickupError;
use crate::game::state::{MatchPhase, MatchState, PlayerId, PlayerState};
use crate::game::world::GroundQuery;
use crate::game::zone::{DangerTransition, ZoneSignal};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, sorted by (tick, priority)
    pub events: Vec<GameEvent>,
    /// Whether match ended this tick
    pub match_ended: bool,
    /// Winner (if match ended with winner)
    pub winner: Option<PlayerId>,
    /// Phase after the tick
    pub phase: MatchPhase,
}

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Sender is not in the roster
    #[error("player {0} is not in the roster")]
    UnknownPlayer(PlayerId),

    /// Sender is dead
    #[error("player is dead")]
    NotAlive,

    /// Command needs active gameplay
    #[error("{0} is not allowed during {1:?}")]
    WrongPhase(&'static str, MatchPhase),

    /// No weapon in the slot
    #[error("no weapon in slot {0}")]
    NoWeapon(u8),

    /// Hit target is not in the roster
    #[error("target {0} is not in the roster")]
    UnknownTarget(PlayerId),

    /// Inventory refused
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Loot pickup or drop refused
    #[error(transparent)]
    Pickup(#[from] PickupError),

    /// Timed effect refused
    #[error(transparent)]
    Effect(#[from] EffectError),
}

/// Run one simulation tick of `delta` seconds.
///
/// # Arguments
///
/// * `state` - The match state (will be mutated)
/// * `commands` - Player commands for this tick, in arrival order
/// * `config` - Match configuration
/// * `ground` - Ground probe for positions
/// * `delta` - Step length in seconds
///
/// # Determinism
///
/// - Uses BTreeMap for iteration order
/// - Uses fixed-point math only
/// - Uses deterministic RNG (state.rng)
/// - No system calls, no floating point
pub fn tick(
    state: &mut MatchState,
    commands: &[CommandFrame],
    config: &MatchConfig,
    ground: &dyn GroundQuery,
    delta: Fixed,
) -> TickResult {
    let mut result = TickResult::default();

    // 0. Advance clocks
    state.tick += 1;
    state.clock = state.clock.saturating_add(i64::from(delta));
    state.phase_elapsed = state.phase_elapsed.saturating_add(delta);

    // 1. Apply player commands
    for frame in commands {
        if let Err(err) = apply_command(state, frame, config, ground) {
            debug!(player = %frame.player_id, command = frame.command.kind(), %err, "Command rejected");
            let tick = state.tick;
            state.push_event(GameEvent::rejected(tick, frame.player_id, err));
        }
    }

    // 2. Timed effects
    for done in state.effects.tick(delta) {
        let tick = state.tick;
        state.push_event(GameEvent::new(
            tick,
            EventPriority::Effect,
            GameEventData::EffectCompleted { owner: done.owner, kind: done.kind },
        ));
    }

    // 3. Phase machine
    match state.phase {
        MatchPhase::Lobby => {
            if state.roster_size() < state.mode.min_players() {
                state.phase_elapsed = 0;
            } else if state.phase_elapsed >= config.start_delay {
                lifecycle::enter_starting(state, config);
            }
        }
        MatchPhase::Starting => {
            if state.phase_elapsed >= config.countdown {
                lifecycle::enter_playing(state, config);
            }
        }
        MatchPhase::Playing => {
            update_zone(state, config, delta);
            update_regeneration(state, config, delta);

            if let Some(winner) = check_win(state) {
                lifecycle::enter_ending(state, Some(winner));
                result.match_ended = true;
                result.winner = Some(winner);
            }
        }
        MatchPhase::Ending => {
            if state.phase_elapsed >= config.end_delay {
                lifecycle::restart(state, config, ground);
            }
        }
    }

    result.phase = state.phase;
    result.events = state.take_events();
    sort_events(&mut result.events);
    result
}

// =============================================================================
// COMMANDS
// =============================================================================

fn living_player<'a>(
    players: &'a mut std::collections::BTreeMap<PlayerId, PlayerState>,
    id: &PlayerId,
) -> Result<&'a mut PlayerState, CommandError> {
    let player = players.get_mut(id).ok_or(CommandError::UnknownPlayer(*id))?;
    if !player.alive {
        return Err(CommandError::NotAlive);
    }
    Ok(player)
}

fn apply_command(
    state: &mut MatchState,
    frame: &CommandFrame,
    config: &MatchConfig,
    ground: &dyn GroundQuery,
) -> Result<(), CommandError> {
    let id = frame.player_id;
    let tick = state.tick;
    if state.phase != MatchPhase::Playing && !frame.command.allowed_outside_play() {
        return Err(CommandError::WrongPhase(frame.command.kind(), state.phase));
    }

    match &frame.command {
        PlayerCommand::MoveTo { position, facing } => {
            let player = living_player(&mut state.players, &id)?;
            if !player.health.can_move {
                return Err(CommandError::NotAlive);
            }
            let y = ground.ground_height(position.x, position.z).unwrap_or(position.y);
            player.position = FixedVec3::new(position.x, y, position.z);
            if let Some(direction) = facing.normalize_planar() {
                player.facing = direction;
            }
        }

        PlayerCommand::Pickup { loot_id } => {
            let player = living_player(&mut state.players, &id)?;
            let instance = state
                .spawner
                .get(*loot_id)
                .ok_or(PickupError::NotFound(*loot_id))?;
            if !player.position.within_planar(instance.position, config.pickup_radius) {
                return Err(PickupError::OutOfReach(*loot_id).into());
            }
            let picked = state.spawner.pickup_into(*loot_id, &mut player.inventory)?;
            state.push_event(GameEvent::loot(
                tick,
                GameEventData::LootPickedUp {
                    player_id: id,
                    loot_id: picked.id,
                    item: picked.name,
                    category: picked.category,
                    quantity: picked.quantity,
                },
            ));
        }

        PlayerCommand::UseItem { name } => {
            let player = living_player(&mut state.players, &id)?;
            let outcome = player.inventory.use_item(name, &mut player.health)?;
            let events = item_use_events(tick, id, name, outcome, &player.health);
            state.pending_events.extend(events);
        }

        PlayerCommand::UseQuickSlot { slot } => {
            let player = living_player(&mut state.players, &id)?;
            let name = player
                .inventory
                .equipment()
                .quick_use
                .get(*slot as usize)
                .cloned()
                .flatten()
                .map(|key| key.name);
            let outcome = player.inventory.use_quick_slot(*slot as usize, &mut player.health)?;
            if let Some(name) = name {
                let events = item_use_events(tick, id, &name, outcome, &player.health);
                state.pending_events.extend(events);
            }
        }

        PlayerCommand::AssignQuickSlot { slot, name } => {
            let player = living_player(&mut state.players, &id)?;
            player.inventory.assign_quick_slot(*slot as usize, name)?;
        }

        PlayerCommand::DropItem { name, quantity } => {
            let player = living_player(&mut state.players, &id)?;
            let held = player
                .inventory
                .find(name)
                .map(InventoryStack::key)
                .ok_or_else(|| InventoryError::ItemNotFound(name.clone()))?;
            // Items without a catalog entry cannot exist in the world.
            if state.spawner.catalog().find(&held.name, held.category).is_none() {
                return Err(PickupError::UnknownItem(held.name).into());
            }

            let (key, removed) = player.inventory.drop_item(name, *quantity)?;
            let position = player.position.add(player.facing.scale(config.drop_distance));
            let loot_id = match state.spawner.drop_into_world(&key, removed, position) {
                Ok(loot_id) => loot_id,
                Err(err) => {
                    if let Err(restore) = player.inventory.pickup(&key.name, key.category, removed) {
                        warn!(player = %id, item = %key.name, removed, %restore, "Dropped items lost");
                    }
                    return Err(err.into());
                }
            };
            state.push_event(GameEvent::loot(
                tick,
                GameEventData::LootDropped {
                    player_id: id,
                    loot_id,
                    item: key.name,
                    quantity: removed,
                },
            ));
        }

        PlayerCommand::Reload { slot } => {
            let player = living_player(&mut state.players, &id)?;
            let armed = player.health.can_use_weapons
                && matches!(player.inventory.equipment().weapons.get(*slot as usize), Some(Some(_)));
            if !armed {
                return Err(CommandError::NoWeapon(*slot));
            }
            let kind = EffectKind::Reload { slot: *slot };
            let duration = config.effects.reload_time;
            state.effects.start(Some(id), kind, duration)?;
            state.push_event(GameEvent::new(
                tick,
                EventPriority::Effect,
                GameEventData::EffectStarted { owner: Some(id), kind, duration },
            ));
        }

        PlayerCommand::Hit { target, damage } => {
            let attacker = living_player(&mut state.players, &id)?;
            if !attacker.health.can_use_weapons {
                return Err(CommandError::NotAlive);
            }
            if !state.players.contains_key(target) {
                return Err(CommandError::UnknownTarget(*target));
            }
            apply_damage(state, config, *target, *damage, DamageSource::Player(id));
        }
    }
    Ok(())
}

fn item_use_events(tick: u32, player_id: PlayerId, name: &str, outcome: ItemUse, health: &HealthState) -> Vec<GameEvent> {
    let used = GameEvent::loot(tick, GameEventData::ItemUsed { player_id, item: name.to_string() });
    match outcome {
        ItemUse::Healed { .. } | ItemUse::ArmorEquipped { .. } => {
            vec![used, GameEvent::health_updated(tick, player_id, health.health, health.armor)]
        }
        ItemUse::WeaponEquipped { .. } | ItemUse::Consumed => vec![used],
        ItemUse::AmmoLoaded { quantity } => vec![GameEvent::loot(
            tick,
            GameEventData::AmmoLoaded { player_id, item: name.to_string(), quantity },
        )],
        ItemUse::NoEffect => Vec::new(),
    }
}

// =============================================================================
// DAMAGE, ZONE, REGENERATION
// =============================================================================

/// Deal damage to a living roster member and resolve a resulting death.
pub fn apply_damage(
    state: &mut MatchState,
    config: &MatchConfig,
    target: PlayerId,
    amount: Fixed,
    source: DamageSource,
) -> Option<DamageOutcome> {
    let tick = state.tick;
    let now = state.clock;
    let player = state.players.get_mut(&target).filter(|p| p.alive)?;
    let outcome = player.health.take_damage(amount, &config.health, now)?;
    let (health, armor) = (player.health.health, player.health.armor);

    state.push_event(GameEvent::damage_flash(tick, target, amount));
    state.push_event(GameEvent::health_updated(tick, target, health, armor));

    if source.attacker().is_some() && !outcome.killed {
        let kind = EffectKind::ScreenShake { magnitude: config.effects.shake_magnitude };
        if state.effects.start(Some(target), kind, config.effects.shake_duration).is_ok() {
            state.push_event(GameEvent::new(
                tick,
                EventPriority::Effect,
                GameEventData::EffectStarted {
                    owner: Some(target),
                    kind,
                    duration: config.effects.shake_duration,
                },
            ));
        }
    }

    if outcome.killed {
        lifecycle::on_kill(state, target, source);
    }
    Some(outcome)
}

fn update_zone(state: &mut MatchState, config: &MatchConfig, delta: Fixed) {
    let tick = state.tick;
    for signal in state.zone.tick(delta) {
        let data = match signal {
            ZoneSignal::Warning { active, phase } => GameEventData::ZoneWarning { active, phase },
            ZoneSignal::PhaseCompleted { phase, radius } => GameEventData::ZonePhaseCompleted { phase, radius },
        };
        state.push_event(GameEvent::zone(tick, data));
    }

    let damage = state.zone.damage_for(delta);
    let living: Vec<(PlayerId, FixedVec3)> = state
        .players
        .values()
        .filter(|p| p.alive)
        .map(|p| (p.id, p.position))
        .collect();

    for (player_id, position) in living {
        match state.zone.update_membership(player_id, position) {
            Some(DangerTransition::Entered) => {
                state.push_event(GameEvent::zone(tick, GameEventData::PlayerEnteredDanger { player_id }));
            }
            Some(DangerTransition::Left) => {
                state.push_event(GameEvent::zone(tick, GameEventData::PlayerLeftDanger { player_id }));
            }
            None => {}
        }
        if state.zone.is_in_danger(&player_id) && damage > 0 {
            apply_damage(state, config, player_id, damage, DamageSource::Zone);
        }
    }
}

fn update_regeneration(state: &mut MatchState, config: &MatchConfig, delta: Fixed) {
    let tick = state.tick;
    let now = state.clock;
    let mut updates = Vec::new();
    for player in state.players.values_mut().filter(|p| p.alive) {
        if player.health.regenerate(&config.health, now, delta) > 0 {
            updates.push(GameEvent::health_updated(tick, player.id, player.health.health, player.health.armor));
        }
    }
    state.pending_events.extend(updates);
}

// =============================================================================
// REPLAY
// =============================================================================

/// Replay a recorded match from its checkpoint, or from scratch when it has
/// none.
///
/// Returns the final state and every event produced along the way.
pub fn replay_match(
    recording: &MatchRecording,
    config: &MatchConfig,
    ground: &dyn GroundQuery,
) -> (MatchState, Vec<GameEvent>) {
    let mut state = match recording.base() {
        Some(base) => base.clone(),
        None => MatchState::new(recording.match_id, recording.seed, config, ground),
    };
    let mut all_events = Vec::new();

    for record in recording.ticks() {
        for action in &record.actions {
            if let Err(err) = apply_host_action(&mut state, config, ground, action) {
                debug!(%err, "Recorded host action rejected");
            }
        }
        let mut roster_events = state.take_events();
        sort_events(&mut roster_events);
        all_events.extend(roster_events);

        let result = tick(&mut state, &record.commands, config, ground, record.delta);
        all_events.extend(result.events);
    }

    (state, all_events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{FIXED_ONE, TICK_DURATION, to_fixed};
    use crate::game::input::HostAction;
    use crate::game::lifecycle::join;
    use crate::game::loot::LootCategory;
    use crate::game::world::FlatGround;

    const GROUND: FlatGround = FlatGround::new(0);

    fn id(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn config() -> MatchConfig {
        let mut config = MatchConfig::default();
        config.loot.random_spawn_point_count = 20;
        config.loot.total_loot_items = 30;
        config.start_delay = FIXED_ONE;
        config.countdown = FIXED_ONE;
        config.end_delay = FIXED_ONE;
        config
    }

    fn lobby(players: u8, config: &MatchConfig) -> MatchState {
        let mut state = MatchState::new([3; 16], 4242, config, &GROUND);
        for n in 1..=players {
            join(&mut state, config, &GROUND, id(n), format!("player{}", n)).unwrap();
        }
        state.take_events();
        state
    }

    /// Lobby with players standing at the origin, already in Playing.
    fn playing(players: u8, config: &MatchConfig) -> MatchState {
        let mut state = lobby(players, config);
        lifecycle::enter_playing(&mut state, config);
        for player in state.players.values_mut() {
            player.position = FixedVec3::ZERO;
        }
        state.take_events();
        state
    }

    fn hit(attacker: u8, target: u8, damage: i32) -> CommandFrame {
        CommandFrame::new(id(attacker), PlayerCommand::Hit { target: id(target), damage: damage * FIXED_ONE })
    }

    #[test]
    fn test_lobby_timer_needs_full_roster() {
        let config = config();
        let mut state = lobby(1, &config);

        for _ in 0..3 {
            tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        }
        assert_eq!(state.phase, MatchPhase::Lobby);
        assert_eq!(state.phase_elapsed, 0);

        join(&mut state, &config, &GROUND, id(2), "b".into()).unwrap();
        tick(&mut state, &[], &config, &GROUND, to_fixed(0.5));
        assert_eq!(state.phase, MatchPhase::Lobby);
        tick(&mut state, &[], &config, &GROUND, to_fixed(0.5));
        assert_eq!(state.phase, MatchPhase::Starting);

        let result = tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert_eq!(result.phase, MatchPhase::Playing);
        assert!(result.events.iter().any(|e| e.data == GameEventData::GameStarted));
        assert!(state.spawner.count() > 0);
    }

    #[test]
    fn test_lobby_timer_resets_when_roster_drops() {
        let config = {
            let mut c = config();
            c.start_delay = 2 * FIXED_ONE;
            c
        };
        let mut state = lobby(2, &config);
        tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert_eq!(state.phase_elapsed, FIXED_ONE);

        lifecycle::leave(&mut state, &id(2));
        tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert_eq!(state.phase_elapsed, 0);

        join(&mut state, &config, &GROUND, id(2), "b".into()).unwrap();
        tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert_eq!(state.phase, MatchPhase::Lobby);
    }

    #[test]
    fn test_solo_two_to_one_ends_exactly_once() {
        let config = config();
        let mut state = playing(2, &config);

        let result = tick(&mut state, &[hit(1, 2, 500)], &config, &GROUND, TICK_DURATION);
        assert!(result.match_ended);
        assert_eq!(result.winner, Some(id(1)));
        assert_eq!(state.phase, MatchPhase::Ending);
        let ended = result
            .events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::GameEnded { .. }))
            .count();
        assert_eq!(ended, 1);

        let result = tick(&mut state, &[], &config, &GROUND, TICK_DURATION);
        assert!(!result.match_ended);
        assert!(!result.events.iter().any(|e| matches!(e.data, GameEventData::GameEnded { .. })));
    }

    #[test]
    fn test_solo_two_to_zero_does_not_end() {
        let config = config();
        let mut state = playing(2, &config);

        let result = tick(&mut state, &[hit(1, 2, 500), hit(2, 1, 500)], &config, &GROUND, TICK_DURATION);
        // Player 2 died first, so player 1's hit is refused...
        assert_eq!(state.alive_count(), 1);
        assert!(result.match_ended);

        // ...but zone damage can take both in the same tick.
        let mut config = config.clone();
        config.zone.damage_per_second = 1000 * FIXED_ONE;
        let mut state = playing(2, &config);
        for player in state.players.values_mut() {
            player.position = FixedVec3::from_ints(300, 0, 0);
        }
        let result = tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert_eq!(state.alive_count(), 0);
        assert!(!result.match_ended);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.winner, None);
    }

    #[test]
    fn test_kill_credited_and_announced() {
        let config = config();
        let mut state = playing(3, &config);

        let result = tick(&mut state, &[hit(1, 3, 500)], &config, &GROUND, TICK_DURATION);
        assert_eq!(state.kills_of(&id(1)), 1);
        assert!(result.events.iter().any(|e| matches!(
            &e.data,
            GameEventData::PlayerKilled { killer_name, .. } if killer_name == "player1"
        )));
        assert!(!result.match_ended);
    }

    #[test]
    fn test_zone_damage_and_danger_edges() {
        let mut config = config();
        config.zone.damage_per_second = 10 * FIXED_ONE;
        let mut state = playing(3, &config);
        state.players.get_mut(&id(1)).unwrap().position = FixedVec3::from_ints(250, 0, 0);

        let result = tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert!(result
            .events
            .iter()
            .any(|e| e.data == GameEventData::PlayerEnteredDanger { player_id: id(1) }));
        assert_eq!(state.players[&id(1)].health.health, 90 * FIXED_ONE);
        assert_eq!(state.players[&id(2)].health.health, 100 * FIXED_ONE);

        // Still outside: damage continues, no new edge
        let result = tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert!(!result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::PlayerEnteredDanger { .. })));
        assert_eq!(state.players[&id(1)].health.health, 80 * FIXED_ONE);

        let back = CommandFrame::new(
            id(1),
            PlayerCommand::MoveTo { position: FixedVec3::ZERO, facing: FixedVec3::FORWARD },
        );
        let result = tick(&mut state, &[back], &config, &GROUND, FIXED_ONE);
        assert!(result
            .events
            .iter()
            .any(|e| e.data == GameEventData::PlayerLeftDanger { player_id: id(1) }));
        assert_eq!(state.players[&id(1)].health.health, 80 * FIXED_ONE);
    }

    #[test]
    fn test_pickup_use_and_drop() {
        let config = config();
        let mut state = playing(2, &config);
        let loot_id = state
            .spawner
            .drop_into_world(
                &crate::game::inventory::ItemKey::new("Bandage", LootCategory::Health),
                3,
                FixedVec3::from_ints(1, 0, 0),
            )
            .unwrap();

        let far = CommandFrame::new(id(2), PlayerCommand::MoveTo {
            position: FixedVec3::from_ints(50, 0, 0),
            facing: FixedVec3::FORWARD,
        });
        let grab_far = CommandFrame::new(id(2), PlayerCommand::Pickup { loot_id });
        let grab = CommandFrame::new(id(1), PlayerCommand::Pickup { loot_id });
        let grab_again = CommandFrame::new(id(1), PlayerCommand::Pickup { loot_id });
        let result = tick(&mut state, &[far, grab_far, grab, grab_again], &config, &GROUND, TICK_DURATION);

        assert_eq!(state.players[&id(1)].inventory.item_count("Bandage"), 3);
        let rejected = result
            .events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::CommandRejected { .. }))
            .count();
        assert_eq!(rejected, 2);

        state.players.get_mut(&id(1)).unwrap().health.health = 50 * FIXED_ONE;
        let use_it = CommandFrame::new(id(1), PlayerCommand::UseItem { name: "Bandage".into() });
        tick(&mut state, &[use_it], &config, &GROUND, TICK_DURATION);
        assert_eq!(state.players[&id(1)].health.health, 70 * FIXED_ONE);

        let drop = CommandFrame::new(id(1), PlayerCommand::DropItem { name: "Bandage".into(), quantity: 9 });
        let result = tick(&mut state, &[drop], &config, &GROUND, TICK_DURATION);
        assert_eq!(state.players[&id(1)].inventory.item_count("Bandage"), 0);
        let dropped = result.events.iter().find_map(|e| match &e.data {
            GameEventData::LootDropped { loot_id, quantity, .. } => Some((*loot_id, *quantity)),
            _ => None,
        });
        let (dropped_id, quantity) = dropped.unwrap();
        assert_eq!(quantity, 2);
        let instance = state.spawner.get(dropped_id).unwrap();
        assert_eq!(instance.position, FixedVec3::from_ints(0, 0, 2));
    }

    #[test]
    fn test_reload_requires_weapon_and_completes() {
        let config = config();
        let mut state = playing(2, &config);
        let reload = CommandFrame::new(id(1), PlayerCommand::Reload { slot: 0 });

        let result = tick(&mut state, &[reload.clone()], &config, &GROUND, TICK_DURATION);
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::CommandRejected { .. })));

        let player = state.players.get_mut(&id(1)).unwrap();
        player.inventory.pickup("AK-47", LootCategory::Weapon, 1).unwrap();
        player.inventory.use_item("AK-47", &mut player.health).unwrap();

        tick(&mut state, &[reload.clone()], &config, &GROUND, FIXED_ONE);
        assert!(state.effects.is_reloading(&id(1)));
        let result = tick(&mut state, &[reload], &config, &GROUND, FIXED_ONE);
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            GameEventData::EffectCompleted { kind: EffectKind::Reload { slot: 0 }, .. }
        )));
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::CommandRejected { .. })));
    }

    #[test]
    fn test_commands_outside_play_rejected() {
        let config = config();
        let mut state = lobby(2, &config);
        let use_it = CommandFrame::new(id(1), PlayerCommand::UseItem { name: "Bandage".into() });
        let result = tick(&mut state, &[use_it], &config, &GROUND, TICK_DURATION);
        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::CommandRejected { .. })));
    }

    #[test]
    fn test_full_round_restarts_to_lobby() {
        let config = config();
        let mut state = playing(2, &config);
        tick(&mut state, &[hit(2, 1, 500)], &config, &GROUND, TICK_DURATION);
        assert_eq!(state.phase, MatchPhase::Ending);
        assert_eq!(state.winner, Some(id(2)));

        let result = tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert_eq!(result.phase, MatchPhase::Lobby);
        assert!(result
            .events
            .iter()
            .any(|e| e.data == GameEventData::GameRestarted { round: 1 }));
        assert_eq!(state.alive_count(), 2);
        assert_eq!(state.kills_of(&id(2)), 0);
    }

    #[test]
    fn test_drop_uses_unit_facing() {
        let config = config();
        let mut state = playing(2, &config);
        state
            .players
            .get_mut(&id(1))
            .unwrap()
            .inventory
            .pickup("Bandage", LootCategory::Health, 2)
            .unwrap();

        let face = CommandFrame::new(
            id(1),
            PlayerCommand::MoveTo { position: FixedVec3::ZERO, facing: FixedVec3::from_ints(100, 0, 0) },
        );
        let drop = CommandFrame::new(id(1), PlayerCommand::DropItem { name: "Bandage".into(), quantity: 2 });
        let result = tick(&mut state, &[face, drop], &config, &GROUND, TICK_DURATION);

        assert_eq!(state.players[&id(1)].facing, FixedVec3::new(FIXED_ONE, 0, 0));
        let loot_id = result
            .events
            .iter()
            .find_map(|e| match e.data {
                GameEventData::LootDropped { loot_id, .. } => Some(loot_id),
                _ => None,
            })
            .unwrap();
        assert_eq!(state.spawner.get(loot_id).unwrap().position, FixedVec3::from_ints(2, 0, 0));

        let grab = CommandFrame::new(id(1), PlayerCommand::Pickup { loot_id });
        let result = tick(&mut state, &[grab], &config, &GROUND, TICK_DURATION);
        assert!(!result.events.iter().any(|e| matches!(e.data, GameEventData::CommandRejected { .. })));
        assert_eq!(state.players[&id(1)].inventory.item_count("Bandage"), 2);

        // A zero facing keeps the previous direction
        let still = CommandFrame::new(
            id(1),
            PlayerCommand::MoveTo { position: FixedVec3::ZERO, facing: FixedVec3::ZERO },
        );
        tick(&mut state, &[still], &config, &GROUND, TICK_DURATION);
        assert_eq!(state.players[&id(1)].facing, FixedVec3::new(FIXED_ONE, 0, 0));
    }

    #[test]
    fn test_drop_of_uncatalogued_item_keeps_inventory() {
        let config = config();
        let mut state = playing(2, &config);
        state
            .players
            .get_mut(&id(1))
            .unwrap()
            .inventory
            .pickup("Mystery Crate", LootCategory::Health, 1)
            .unwrap();
        let loot_before = state.spawner.count();

        let drop = CommandFrame::new(id(1), PlayerCommand::DropItem { name: "Mystery Crate".into(), quantity: 1 });
        let result = tick(&mut state, &[drop], &config, &GROUND, TICK_DURATION);

        assert!(result.events.iter().any(|e| matches!(e.data, GameEventData::CommandRejected { .. })));
        assert_eq!(state.players[&id(1)].inventory.item_count("Mystery Crate"), 1);
        assert_eq!(state.spawner.count(), loot_before);
    }

    #[test]
    fn test_timers_survive_long_uptime() {
        let mut config = config();
        config.health.regen_enabled = true;
        let mut state = playing(2, &config);
        // Beyond the range of an i32 Q16.16 seconds clock.
        state.clock = 40_000 * i64::from(FIXED_ONE);

        let player = state.players.get_mut(&id(1)).unwrap();
        player.inventory.pickup("AK-47", LootCategory::Weapon, 1).unwrap();
        player.inventory.use_item("AK-47", &mut player.health).unwrap();

        let reload = CommandFrame::new(id(1), PlayerCommand::Reload { slot: 0 });
        tick(&mut state, &[reload, hit(1, 2, 30)], &config, &GROUND, FIXED_ONE);
        assert_eq!(state.players[&id(2)].health.health, 70 * FIXED_ONE);

        let result = tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            GameEventData::EffectCompleted { kind: EffectKind::Reload { slot: 0 }, .. }
        )));
        assert!(!state.effects.is_reloading(&id(1)));

        for _ in 0..6 {
            tick(&mut state, &[], &config, &GROUND, FIXED_ONE);
        }
        assert!(state.players[&id(2)].health.health > 70 * FIXED_ONE);
    }

    fn scripted_recording() -> MatchRecording {
        let mut recording = MatchRecording::new([5; 16], 777);
        for n in 1..=3 {
            recording.record_action(HostAction::Join { player_id: id(n), name: format!("p{}", n) });
        }
        recording.record_action(HostAction::StartGame);
        for t in 1..=240u32 {
            let mut commands = Vec::new();
            if t % 20 == 0 {
                commands.push(CommandFrame::new(
                    id(1 + (t % 3) as u8),
                    PlayerCommand::MoveTo {
                        position: FixedVec3::from_ints((t as i32) % 180, 0, 0),
                        facing: FixedVec3::FORWARD,
                    },
                ));
            }
            if t == 200 {
                commands.push(hit(1, 2, 30));
            }
            recording.record_tick(t, to_fixed(0.05), commands);
        }
        recording
    }

    #[test]
    fn test_replay_determinism() {
        let config = config();
        let recording = scripted_recording();

        let (final1, events1) = replay_match(&recording, &config, &GROUND);
        let (final2, events2) = replay_match(&recording, &config, &GROUND);

        assert_eq!(final1.phase, MatchPhase::Playing);
        assert_eq!(final1.compute_hash(), final2.compute_hash());
        assert_eq!(events1.len(), events2.len());

        // A different seed diverges
        let mut other = recording.clone();
        other.seed = 778;
        let (final3, _) = replay_match(&other, &config, &GROUND);
        assert_ne!(final1.compute_hash(), final3.compute_hash());
    }
}
