//! Game Events
//!
//! Discrete notifications produced by the simulation. Presentation and
//! transport collaborators consume them through [`EventSink`]s registered on
//! an [`EventBus`]; nothing they do feeds back into match state.

use std::sync::{Arc, Mutex};
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::fixed::Fixed;
use crate::game::effects::EffectKind;
use crate::game::loot::LootCategory;
use crate::game::state::PlayerId;

/// Ordering of events inside one tick.
///
/// Lower value = delivered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Zone warnings and danger edges
    Zone = 0,
    /// Hits and health changes
    Damage = 1,
    /// Kills
    Elimination = 2,
    /// Pickups, drops and item use
    Loot = 3,
    /// Timed effects
    Effect = 4,
    /// Match lifecycle transitions
    Lifecycle = 5,
    /// Music and UI panels
    Presentation = 6,
    /// Everything else
    Other = 255,
}

/// Music cue for the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicTrack {
    /// Waiting room
    Lobby,
    /// In match
    Game,
    /// Local player won
    Victory,
    /// Local player lost
    Defeat,
}

/// UI panel the presentation layer should show.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiPanel {
    /// Lobby screen
    Lobby,
    /// In-game HUD
    Game,
    /// Results screen
    GameOver,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player entered the roster
    PlayerJoined {
        player_id: PlayerId,
        name: String,
    },

    /// Player left the roster
    PlayerLeft {
        player_id: PlayerId,
    },

    /// Roster size or alive count changed
    PlayerCount {
        count: u32,
        alive: u32,
    },

    /// Lobby countdown started
    GameStarting {
        countdown: Fixed,
    },

    /// Match is live
    GameStarted,

    /// Match over; `winner_id` is `None` when nobody is left to announce
    GameEnded {
        winner_id: Option<PlayerId>,
        winner_name: Option<String>,
    },

    /// Roster reset after the end screen
    GameRestarted {
        round: u32,
    },

    /// Player died
    PlayerKilled {
        victim_id: PlayerId,
        killer_id: Option<PlayerId>,
        /// Killer display name, or "Zone" for environmental deaths
        killer_name: String,
    },

    /// Player took a hit
    DamageFlash {
        player_id: PlayerId,
        amount: Fixed,
    },

    /// Health or armor changed
    HealthUpdated {
        player_id: PlayerId,
        health: Fixed,
        armor: Fixed,
    },

    /// Zone shrink warning on/off
    ZoneWarning {
        active: bool,
        phase: u32,
    },

    /// Zone finished shrinking for a phase
    ZonePhaseCompleted {
        phase: u32,
        radius: Fixed,
    },

    /// Player is now outside the safe circle
    PlayerEnteredDanger {
        player_id: PlayerId,
    },

    /// Player is back inside the safe circle
    PlayerLeftDanger {
        player_id: PlayerId,
    },

    /// Loot placed in the world
    LootSpawned {
        count: u32,
    },

    /// Player picked up loot
    LootPickedUp {
        player_id: PlayerId,
        loot_id: u32,
        item: String,
        category: LootCategory,
        quantity: u32,
    },

    /// Player dropped an item into the world
    LootDropped {
        player_id: PlayerId,
        loot_id: u32,
        item: String,
        quantity: u32,
    },

    /// Player used an item
    ItemUsed {
        player_id: PlayerId,
        item: String,
    },

    /// Ammo handed to the weapon system
    AmmoLoaded {
        player_id: PlayerId,
        item: String,
        quantity: u32,
    },

    /// Timed effect began
    EffectStarted {
        owner: Option<PlayerId>,
        kind: EffectKind,
        duration: Fixed,
    },

    /// Timed effect ran to completion
    EffectCompleted {
        owner: Option<PlayerId>,
        kind: EffectKind,
    },

    /// Music should change
    MusicTrackChanged {
        track: MusicTrack,
    },

    /// UI panel should change
    UiPanelChanged {
        panel: UiPanel,
    },

    /// A command was refused
    CommandRejected {
        player_id: PlayerId,
        reason: String,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Delivery priority
    pub priority: EventPriority,

    /// Player involved (for tie-breaking)
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerJoined { player_id, .. }
            | GameEventData::PlayerLeft { player_id }
            | GameEventData::DamageFlash { player_id, .. }
            | GameEventData::HealthUpdated { player_id, .. }
            | GameEventData::PlayerEnteredDanger { player_id }
            | GameEventData::PlayerLeftDanger { player_id }
            | GameEventData::LootPickedUp { player_id, .. }
            | GameEventData::LootDropped { player_id, .. }
            | GameEventData::ItemUsed { player_id, .. }
            | GameEventData::AmmoLoaded { player_id, .. }
            | GameEventData::CommandRejected { player_id, .. } => Some(*player_id),
            GameEventData::PlayerKilled { victim_id, .. } => Some(*victim_id),
            GameEventData::GameEnded { winner_id, .. } => *winner_id,
            GameEventData::EffectStarted { owner, .. }
            | GameEventData::EffectCompleted { owner, .. } => *owner,
            _ => None,
        };

        Self {
            tick,
            priority,
            player_id,
            data,
        }
    }

    /// Lifecycle event.
    pub fn lifecycle(tick: u32, data: GameEventData) -> Self {
        Self::new(tick, EventPriority::Lifecycle, data)
    }

    /// Player killed event.
    pub fn player_killed(tick: u32, victim_id: PlayerId, killer_id: Option<PlayerId>, killer_name: String) -> Self {
        Self::new(
            tick,
            EventPriority::Elimination,
            GameEventData::PlayerKilled {
                victim_id,
                killer_id,
                killer_name,
            },
        )
    }

    /// Damage flash event.
    pub fn damage_flash(tick: u32, player_id: PlayerId, amount: Fixed) -> Self {
        Self::new(tick, EventPriority::Damage, GameEventData::DamageFlash { player_id, amount })
    }

    /// Health update event.
    pub fn health_updated(tick: u32, player_id: PlayerId, health: Fixed, armor: Fixed) -> Self {
        Self::new(
            tick,
            EventPriority::Damage,
            GameEventData::HealthUpdated { player_id, health, armor },
        )
    }

    /// Zone event.
    pub fn zone(tick: u32, data: GameEventData) -> Self {
        Self::new(tick, EventPriority::Zone, data)
    }

    /// Loot or item event.
    pub fn loot(tick: u32, data: GameEventData) -> Self {
        Self::new(tick, EventPriority::Loot, data)
    }

    /// Music change event.
    pub fn music(tick: u32, track: MusicTrack) -> Self {
        Self::new(tick, EventPriority::Presentation, GameEventData::MusicTrackChanged { track })
    }

    /// UI panel change event.
    pub fn panel(tick: u32, panel: UiPanel) -> Self {
        Self::new(tick, EventPriority::Presentation, GameEventData::UiPanelChanged { panel })
    }

    /// Rejected command event.
    pub fn rejected(tick: u32, player_id: PlayerId, reason: impl ToString) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            GameEventData::CommandRejected {
                player_id,
                reason: reason.to_string(),
            },
        )
    }
}

// =============================================================================
// BUS
// =============================================================================

/// Observer of simulation events.
pub trait EventSink: Send {
    /// Called once per event, in bus order.
    fn on_event(&mut self, event: &GameEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&mut self, event: &GameEvent) {
        match &event.data {
            GameEventData::GameStarted
            | GameEventData::GameEnded { .. }
            | GameEventData::GameRestarted { .. }
            | GameEventData::PlayerKilled { .. } => {
                info!(tick = event.tick, data = ?event.data, "Match event");
            }
            _ => debug!(tick = event.tick, data = ?event.data, "Match event"),
        }
    }
}

/// Keeps a shared copy of every event. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<GameEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn on_event(&mut self, event: &GameEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Ordered fan-out of events to registered sinks.
///
/// Events of one batch are stable-sorted by (tick, priority), so events with
/// equal keys keep the order they were produced in.
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    /// Bus with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. Sinks are called in registration order.
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Sort a batch and deliver it to every sink. Returns the sorted batch.
    pub fn publish(&mut self, mut events: Vec<GameEvent>) -> Vec<GameEvent> {
        sort_events(&mut events);
        for event in &events {
            for sink in self.sinks.iter_mut() {
                sink.on_event(event);
            }
        }
        events
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("sinks", &self.sinks.len()).finish()
    }
}

/// Stable sort by tick, then priority.
pub fn sort_events(events: &mut [GameEvent]) {
    events.sort_by_key(|e| (e.tick, e.priority));
}
