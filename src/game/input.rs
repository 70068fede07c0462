//! Player Commands and Match Recording
//!
//! Commands are the only way players affect the simulation. The host queues
//! them and hands them to `tick` in arrival order. Everything the host applies
//! (roster changes included) is also recorded per tick so a match can be
//! replayed and its state hash checked. A recording may start from a
//! checkpoint state instead of a fresh match, which keeps long-lived hosts
//! from holding every tick since creation.

use serde::{Serialize, Deserialize};

use crate::core::fixed::Fixed;
use crate::core::vec3::FixedVec3;
use crate::game::state::{MatchState, PlayerId};

/// One player request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Authoritative position report from the movement collaborator
    MoveTo {
        /// New position; Y is replaced by the ground probe when it hits
        position: FixedVec3,
        /// Planar facing direction
        facing: FixedVec3,
    },
    /// Take a loot instance from the world
    Pickup {
        /// Instance id
        loot_id: u32,
    },
    /// Use one held item by name
    UseItem {
        /// Item name
        name: String,
    },
    /// Drop items in front of the player
    DropItem {
        /// Item name
        name: String,
        /// Units to drop; more than held drops the stack
        quantity: u32,
    },
    /// Bind a held item to a quick-use slot
    AssignQuickSlot {
        /// Slot index
        slot: u8,
        /// Item name
        name: String,
    },
    /// Use the item bound to a quick-use slot
    UseQuickSlot {
        /// Slot index
        slot: u8,
    },
    /// Start reloading the weapon in a slot
    Reload {
        /// Weapon slot index
        slot: u8,
    },
    /// A hit reported by the weapon collaborator
    Hit {
        /// Player that was hit
        target: PlayerId,
        /// Raw damage before armor
        damage: Fixed,
    },
}

impl PlayerCommand {
    /// Short name for logs and rejection events.
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerCommand::MoveTo { .. } => "move_to",
            PlayerCommand::Pickup { .. } => "pickup",
            PlayerCommand::UseItem { .. } => "use_item",
            PlayerCommand::DropItem { .. } => "drop_item",
            PlayerCommand::AssignQuickSlot { .. } => "assign_quick_slot",
            PlayerCommand::UseQuickSlot { .. } => "use_quick_slot",
            PlayerCommand::Reload { .. } => "reload",
            PlayerCommand::Hit { .. } => "hit",
        }
    }

    /// Allowed outside of active gameplay?
    pub fn allowed_outside_play(&self) -> bool {
        matches!(self, PlayerCommand::MoveTo { .. })
    }
}

/// A command tagged with its sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    /// Sender
    pub player_id: PlayerId,
    /// Request
    pub command: PlayerCommand,
}

impl CommandFrame {
    /// Tag a command.
    pub fn new(player_id: PlayerId, command: PlayerCommand) -> Self {
        Self { player_id, command }
    }
}

/// Anything the host applied to the match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostAction {
    /// Roster join
    Join {
        /// New player
        player_id: PlayerId,
        /// Display name
        name: String,
    },
    /// Roster leave
    Leave {
        /// Departing player
        player_id: PlayerId,
    },
    /// Manual start from the lobby
    StartGame,
    /// Forced restart
    Restart,
}

/// Everything applied before and during one tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Tick number the step produced
    pub tick: u32,
    /// Step length in seconds
    pub delta: Fixed,
    /// Host actions applied before the step, in order
    pub actions: Vec<HostAction>,
    /// Commands handed to the step, in order
    pub commands: Vec<CommandFrame>,
}

/// Complete recording of a match for replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRecording {
    /// Match identifier
    pub match_id: [u8; 16],

    /// Seed the match was created with
    pub seed: u64,

    /// State replay starts from; `None` means a freshly created match
    base: Option<Box<MatchState>>,

    ticks: Vec<TickRecord>,

    /// Host actions waiting for the next step
    #[serde(skip)]
    pending: Vec<HostAction>,
}

impl MatchRecording {
    /// Empty recording.
    pub fn new(match_id: [u8; 16], seed: u64) -> Self {
        Self {
            match_id,
            seed,
            base: None,
            ticks: Vec::with_capacity(1024),
            pending: Vec::new(),
        }
    }

    /// Empty recording that replays from `state`.
    pub fn from_checkpoint(state: &MatchState) -> Self {
        let mut base = state.clone();
        base.take_events();
        Self {
            match_id: state.match_id,
            seed: state.base_seed,
            base: Some(Box::new(base)),
            ticks: Vec::with_capacity(1024),
            pending: Vec::new(),
        }
    }

    /// Checkpoint the recording starts from, if any.
    pub fn base(&self) -> Option<&MatchState> {
        self.base.as_deref()
    }

    /// Note a host action; it is attached to the next recorded step.
    pub fn record_action(&mut self, action: HostAction) {
        self.pending.push(action);
    }

    /// Close a step.
    pub fn record_tick(&mut self, tick: u32, delta: Fixed, commands: Vec<CommandFrame>) {
        self.ticks.push(TickRecord {
            tick,
            delta,
            actions: std::mem::take(&mut self.pending),
            commands,
        });
    }

    /// Recorded steps in order.
    pub fn ticks(&self) -> &[TickRecord] {
        &self.ticks
    }

    /// Number of recorded steps.
    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// Total commands across all steps.
    pub fn command_count(&self) -> usize {
        self.ticks.iter().map(|t| t.commands.len()).sum()
    }

    /// Compact binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Parse the compact binary form.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::FIXED_ONE;

    #[test]
    fn test_actions_attach_to_next_tick() {
        let id = PlayerId::new([1; 16]);
        let mut recording = MatchRecording::new([0; 16], 42);

        recording.record_action(HostAction::Join { player_id: id, name: "a".into() });
        recording.record_tick(1, FIXED_ONE, Vec::new());
        recording.record_tick(
            2,
            FIXED_ONE,
            vec![CommandFrame::new(id, PlayerCommand::Reload { slot: 0 })],
        );

        let ticks = recording.ticks();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[0].actions.len(), 1);
        assert!(ticks[1].actions.is_empty());
        assert_eq!(recording.command_count(), 1);
    }

    #[test]
    fn test_recording_binary_roundtrip() {
        let id = PlayerId::new([2; 16]);
        let mut recording = MatchRecording::new([9; 16], 7);
        recording.record_action(HostAction::StartGame);
        recording.record_tick(
            1,
            FIXED_ONE,
            vec![CommandFrame::new(id, PlayerCommand::UseItem { name: "Bandage".into() })],
        );

        let bytes = recording.to_bytes().unwrap();
        let decoded = MatchRecording::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.seed, 7);
        assert_eq!(decoded.ticks(), recording.ticks());
    }

    #[test]
    fn test_only_movement_outside_play() {
        let move_to = PlayerCommand::MoveTo { position: FixedVec3::ZERO, facing: FixedVec3::FORWARD };
        assert!(move_to.allowed_outside_play());
        assert!(!PlayerCommand::Pickup { loot_id: 0 }.allowed_outside_play());
        assert_eq!(PlayerCommand::Reload { slot: 1 }.kind(), "reload");
    }
}
