//! Match Host
//!
//! The single authoritative owner of a match. Roster changes and manual
//! transitions apply immediately; player commands queue until the next
//! `step`. Everything applied is recorded for replay, and every event goes
//! out through the host's [`EventBus`]. The recording restarts from a
//! checkpoint at each new round and whenever it reaches the checkpoint
//! interval, so memory stays bounded however long the host runs.

use tracing::{debug, info};

use crate::config::{ConfigError, MatchConfig};
use crate::core::fixed::Fixed;
use crate::core::hash::StateHash;
use crate::core::vec3::FixedVec3;
use crate::game::events::{EventBus, EventSink, GameEvent};
use crate::game::input::{CommandFrame, HostAction, MatchRecording};
use crate::game::lifecycle::{self, RosterError};
use crate::game::state::{MatchState, PlayerId};
use crate::game::tick::{tick, TickResult};
use crate::game::world::GroundQuery;

/// Recorded ticks before the host checkpoints (five minutes at 60 Hz).
pub const DEFAULT_CHECKPOINT_TICKS: usize = 60 * 60 * 5;

/// Owner of one match.
pub struct MatchHost {
    state: MatchState,
    config: MatchConfig,
    ground: Box<dyn GroundQuery>,
    bus: EventBus,
    queue: Vec<CommandFrame>,
    recording: MatchRecording,
    checkpoint_ticks: usize,
}

impl MatchHost {
    /// Create a host with a validated config.
    pub fn new(
        match_id: [u8; 16],
        seed: u64,
        config: MatchConfig,
        ground: Box<dyn GroundQuery>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = MatchState::new(match_id, seed, &config, ground.as_ref());
        info!(
            match_id = %hex::encode(&match_id[..4]),
            seed,
            mode = ?config.mode,
            loot_points = state.spawner.points().len(),
            "Match host created"
        );
        Ok(Self {
            state,
            config,
            ground,
            bus: EventBus::new(),
            queue: Vec::new(),
            recording: MatchRecording::new(match_id, seed),
            checkpoint_ticks: DEFAULT_CHECKPOINT_TICKS,
        })
    }

    /// Change how many ticks the recording holds before checkpointing.
    pub fn set_checkpoint_interval(&mut self, ticks: usize) {
        self.checkpoint_ticks = ticks.max(1);
    }

    /// Register an event observer.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.bus.subscribe(sink);
    }

    /// Add a player to the roster.
    pub fn join(&mut self, player_id: PlayerId, name: impl Into<String>) -> Result<FixedVec3, RosterError> {
        let name = name.into();
        let position = lifecycle::join(&mut self.state, &self.config, self.ground.as_ref(), player_id, name.clone())?;
        self.recording.record_action(HostAction::Join { player_id, name });
        self.flush();
        Ok(position)
    }

    /// Remove a player. Their queued commands are discarded.
    pub fn leave(&mut self, player_id: &PlayerId) -> bool {
        let removed = lifecycle::leave(&mut self.state, player_id);
        if removed {
            self.queue.retain(|frame| frame.player_id != *player_id);
            self.recording.record_action(HostAction::Leave { player_id: *player_id });
            self.flush();
        }
        removed
    }

    /// Skip the lobby timer. Only works in the lobby.
    pub fn start_game(&mut self) -> bool {
        let started = lifecycle::start_game(&mut self.state, &self.config);
        if started {
            self.recording.record_action(HostAction::StartGame);
            self.flush();
        }
        started
    }

    /// Force a new round from any phase.
    pub fn restart(&mut self) {
        lifecycle::restart(&mut self.state, &self.config, self.ground.as_ref());
        self.queue.clear();
        self.flush();
        self.checkpoint();
    }

    /// Queue a command for the next step.
    pub fn submit(&mut self, frame: CommandFrame) {
        debug!(player = %frame.player_id, command = frame.command.kind(), "Command queued");
        self.queue.push(frame);
    }

    /// Advance the match by `delta` seconds.
    pub fn step(&mut self, delta: Fixed) -> TickResult {
        let commands = std::mem::take(&mut self.queue);
        let round = self.state.round;
        let mut result = tick(&mut self.state, &commands, &self.config, self.ground.as_ref(), delta);
        self.recording.record_tick(self.state.tick, delta, commands);
        result.events = self.bus.publish(std::mem::take(&mut result.events));

        if self.state.round != round || self.recording.tick_count() >= self.checkpoint_ticks {
            self.checkpoint();
        }
        result
    }

    /// Start a fresh recording from the current state.
    fn checkpoint(&mut self) {
        debug!(
            tick = self.state.tick,
            round = self.state.round,
            dropped = self.recording.tick_count(),
            "Recording checkpoint"
        );
        self.recording = MatchRecording::from_checkpoint(&self.state);
    }

    fn flush(&mut self) {
        let events: Vec<GameEvent> = self.state.take_events();
        if !events.is_empty() {
            self.bus.publish(events);
        }
    }

    /// Current match state (read-only).
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Config in use.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Everything applied so far.
    pub fn recording(&self) -> &MatchRecording {
        &self.recording
    }

    /// Commands waiting for the next step.
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Hash of the current state.
    pub fn state_hash(&self) -> StateHash {
        self.state.compute_hash()
    }
}

impl std::fmt::Debug for MatchHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchHost")
            .field("tick", &self.state.tick)
            .field("phase", &self.state.phase)
            .field("roster", &self.state.roster_size())
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::{FIXED_ONE, to_fixed};
    use crate::game::events::{GameEventData, RecordingSink};
    use crate::game::input::PlayerCommand;
    use crate::game::state::MatchPhase;
    use crate::game::tick::replay_match;
    use crate::game::world::FlatGround;

    fn id(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn host() -> MatchHost {
        let mut config = MatchConfig::default();
        config.loot.random_spawn_point_count = 16;
        config.loot.total_loot_items = 24;
        config.countdown = FIXED_ONE;
        MatchHost::new([8; 16], 31337, config, Box::new(FlatGround::new(0))).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = MatchConfig::default();
        config.max_players = 1;
        assert!(MatchHost::new([0; 16], 1, config, Box::new(FlatGround::new(0))).is_err());
    }

    #[test]
    fn test_roster_events_reach_sinks() {
        let sink = RecordingSink::new();
        let mut host = host();
        host.subscribe(Box::new(sink.clone()));

        host.join(id(1), "alice").unwrap();
        host.join(id(2), "bob").unwrap();
        assert!(host.join(id(2), "bob").is_err());
        assert!(host.leave(&id(2)));

        let counts: Vec<u32> = sink
            .events()
            .iter()
            .filter_map(|e| match e.data {
                GameEventData::PlayerCount { count, .. } => Some(count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 2, 1]);
    }

    #[test]
    fn test_leave_discards_queued_commands() {
        let mut host = host();
        host.join(id(1), "a").unwrap();
        host.join(id(2), "b").unwrap();
        host.submit(CommandFrame::new(id(2), PlayerCommand::Reload { slot: 0 }));
        host.submit(CommandFrame::new(id(1), PlayerCommand::Reload { slot: 0 }));
        host.leave(&id(2));
        assert_eq!(host.pending_commands(), 1);
    }

    #[test]
    fn test_host_matches_replay() {
        let mut host = host();
        host.join(id(1), "a").unwrap();
        host.join(id(2), "b").unwrap();
        host.join(id(3), "c").unwrap();
        assert!(host.start_game());

        let delta = to_fixed(0.1);
        for t in 0..40 {
            if t == 25 {
                host.submit(CommandFrame::new(
                    id(1),
                    PlayerCommand::Hit { target: id(3), damage: 40 * FIXED_ONE },
                ));
            }
            host.step(delta);
        }
        host.leave(&id(2));
        host.step(delta);

        assert_eq!(host.state().phase, MatchPhase::Playing);
        let (replayed, _) = replay_match(host.recording(), host.config(), &FlatGround::new(0));
        assert_eq!(replayed.compute_hash(), host.state_hash());
    }

    #[test]
    fn test_recording_restarts_each_round() {
        let mut host = host();
        host.join(id(1), "a").unwrap();
        host.join(id(2), "b").unwrap();
        assert!(host.start_game());

        let delta = to_fixed(0.1);
        for _ in 0..20 {
            host.step(delta);
        }
        assert_eq!(host.state().phase, MatchPhase::Playing);
        host.submit(CommandFrame::new(
            id(1),
            PlayerCommand::Hit { target: id(2), damage: 500 * FIXED_ONE },
        ));
        host.step(delta);
        assert_eq!(host.state().phase, MatchPhase::Ending);
        assert_eq!(host.recording().tick_count(), 21);

        for _ in 0..80 {
            host.step(delta);
            if host.state().round == 1 {
                break;
            }
        }
        assert_eq!(host.state().round, 1);
        assert_eq!(host.recording().tick_count(), 0);
        assert!(host.recording().base().is_some());

        for _ in 0..5 {
            host.step(delta);
        }
        assert_eq!(host.recording().tick_count(), 5);
        let (replayed, _) = replay_match(host.recording(), host.config(), &FlatGround::new(0));
        assert_eq!(replayed.compute_hash(), host.state_hash());

        host.restart();
        assert_eq!(host.recording().tick_count(), 0);
        host.step(delta);
        let (replayed, _) = replay_match(host.recording(), host.config(), &FlatGround::new(0));
        assert_eq!(replayed.compute_hash(), host.state_hash());
    }

    #[test]
    fn test_recording_bounded_by_checkpoint_interval() {
        let mut host = host();
        host.set_checkpoint_interval(50);
        host.join(id(1), "a").unwrap();

        let delta = to_fixed(0.1);
        for t in 0..120 {
            if t % 7 == 0 {
                host.submit(CommandFrame::new(
                    id(1),
                    PlayerCommand::MoveTo { position: FixedVec3::from_ints(t, 0, 0), facing: FixedVec3::FORWARD },
                ));
            }
            host.step(delta);
            assert!(host.recording().tick_count() < 50);
        }
        assert_eq!(host.recording().tick_count(), 20);

        let (replayed, _) = replay_match(host.recording(), host.config(), &FlatGround::new(0));
        assert_eq!(replayed.compute_hash(), host.state_hash());
    }
}
