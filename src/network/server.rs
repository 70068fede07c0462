//! Host Loop
//!
//! Runs a [`MatchHost`] on its own task at a fixed tick rate. Requests arrive
//! on an mpsc channel and are applied between ticks; events and periodic
//! snapshots go out on a broadcast channel. The task owns the host, so no
//! locking is needed around the simulation.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::fixed::{Fixed, FIXED_ONE};
use crate::game::events::{EventSink, GameEvent};
use crate::game::host::MatchHost;
use crate::game::input::CommandFrame;
use crate::game::state::PlayerId;
use crate::network::protocol::{BroadcastMessage, HostRequest, MatchSnapshot};

/// Host loop configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// Ticks between snapshots; 0 disables them.
    pub snapshot_interval: u32,
    /// Capacity of the request and broadcast channels.
    pub channel_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            snapshot_interval: 30,
            channel_capacity: 256,
        }
    }
}

impl HostConfig {
    /// Fixed step length for one tick.
    pub fn tick_delta(&self) -> Fixed {
        FIXED_ONE / self.tick_rate as i32
    }
}

/// Host loop errors.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Tick rate out of range.
    #[error("Invalid tick rate: {0}")]
    InvalidTickRate(u32),

    /// Channels need room for at least one message.
    #[error("Channel capacity must be positive")]
    ZeroCapacity,

    /// The host task is gone.
    #[error("Host loop closed")]
    Closed,

    /// Request did not parse.
    #[error("Malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Forwards bus events onto the broadcast channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastSink {
    /// Wrap a broadcast sender.
    pub fn new(tx: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn on_event(&mut self, event: &GameEvent) {
        // No receivers is not an error for the simulation.
        let _ = self.tx.send(BroadcastMessage::Event(event.clone()));
    }
}

/// Cloneable handle to a running host loop.
#[derive(Debug, Clone)]
pub struct HostHandle {
    requests: mpsc::Sender<HostRequest>,
    broadcasts: broadcast::Sender<BroadcastMessage>,
    shutdown_tx: broadcast::Sender<()>,
}

impl HostHandle {
    /// Send a request to the host.
    pub async fn send(&self, request: HostRequest) -> Result<(), HostError> {
        self.requests.send(request).await.map_err(|_| HostError::Closed)
    }

    /// Parse and send a JSON request.
    pub async fn send_json(&self, json: &str) -> Result<(), HostError> {
        let request = HostRequest::from_json(json)?;
        self.send(request).await
    }

    /// Receive everything the host broadcasts from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcasts.subscribe()
    }

    /// Stop the loop after the current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Start the host loop. The join handle yields the host back on shutdown.
pub fn spawn_host(
    mut host: MatchHost,
    config: HostConfig,
) -> Result<(HostHandle, JoinHandle<MatchHost>), HostError> {
    if config.tick_rate == 0 || config.tick_rate > 1000 {
        return Err(HostError::InvalidTickRate(config.tick_rate));
    }
    if config.channel_capacity == 0 {
        return Err(HostError::ZeroCapacity);
    }

    let (request_tx, request_rx) = mpsc::channel(config.channel_capacity);
    let (broadcast_tx, _) = broadcast::channel(config.channel_capacity);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    host.subscribe(Box::new(BroadcastSink::new(broadcast_tx.clone())));

    let handle = HostHandle {
        requests: request_tx,
        broadcasts: broadcast_tx.clone(),
        shutdown_tx,
    };

    let task = tokio::spawn(run_host_loop(host, config, request_rx, broadcast_tx, shutdown_rx));
    Ok((handle, task))
}

async fn run_host_loop(
    mut host: MatchHost,
    config: HostConfig,
    mut requests: mpsc::Receiver<HostRequest>,
    broadcasts: broadcast::Sender<BroadcastMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> MatchHost {
    let delta = config.tick_delta();
    let tick_duration = Duration::from_micros(1_000_000 / config.tick_rate as u64);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(tick_rate = config.tick_rate, "Host loop started");

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let result = host.step(delta);
                if result.match_ended {
                    info!(
                        tick = host.state().tick,
                        winner = ?result.winner.map(|w| w.short()),
                        "Round over"
                    );
                }
                let tick = host.state().tick;
                if config.snapshot_interval > 0 && tick % config.snapshot_interval == 0 {
                    let _ = broadcasts.send(BroadcastMessage::Snapshot(MatchSnapshot::capture(host.state())));
                }
            }
            request = requests.recv() => {
                match request {
                    Some(request) => handle_request(&mut host, request, &broadcasts),
                    None => {
                        debug!("All host handles dropped");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Host loop shutting down");
                break;
            }
        }
    }

    host
}

fn handle_request(
    host: &mut MatchHost,
    request: HostRequest,
    broadcasts: &broadcast::Sender<BroadcastMessage>,
) {
    let reject = |player_id: Option<PlayerId>, reason: String| {
        warn!(?player_id, %reason, "Request rejected");
        let _ = broadcasts.send(BroadcastMessage::Rejected { player_id, reason });
    };

    let sender = request.player_id();
    match request {
        HostRequest::Join { name, .. } => match sender {
            Some(id) => {
                if let Err(e) = host.join(id, name) {
                    reject(Some(id), e.to_string());
                }
            }
            None => reject(None, "invalid player id".into()),
        },
        HostRequest::Leave { .. } => match sender {
            Some(id) => {
                if !host.leave(&id) {
                    reject(Some(id), "not in roster".into());
                }
            }
            None => reject(None, "invalid player id".into()),
        },
        HostRequest::Command { command, .. } => match sender {
            // Unknown senders are rejected by the tick itself.
            Some(id) => host.submit(CommandFrame::new(id, command)),
            None => reject(None, "invalid player id".into()),
        },
        HostRequest::StartGame => {
            if !host.start_game() {
                reject(None, format!("cannot start from {:?}", host.state().phase));
            }
        }
        HostRequest::Restart => host.restart(),
    }
}
