//! View-state coordinator actor
//!
//! All session state lives in one spawned task. Host commands, peer
//! messages, user actions and tile timer expiries are queued to it and
//! handled one at a time; results go out on the [`EventBus`].

mod command;
mod handlers;
mod state;

pub use command::{Input, UserAction};
pub use state::{MuteAllState, SessionSnapshot, TileSnapshot};

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::capture::CaptureProvider;
use crate::config::CoordinatorConfig;
use crate::directory::PeerId;
use crate::error::{AppError, Result};
use crate::events::{CoordinatorEvent, EventBus};
use crate::host::HostCommand;
use crate::signaling::PeerMessage;
use crate::tiles::TileExpiry;

use command::Command;
use state::SessionState;

/// Handle to a running coordinator
#[derive(Clone)]
pub struct Coordinator {
    tx: mpsc::Sender<Command>,
    events: Arc<EventBus>,
}

impl Coordinator {
    /// Validate `config` and start the coordinator task
    pub fn spawn(
        config: CoordinatorConfig,
        local_peer: PeerId,
        capture: Arc<dyn CaptureProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let events = Arc::new(EventBus::with_capacity(config.events.channel_capacity));
        let (tx, rx) = mpsc::channel(config.events.command_queue_capacity);
        let (expiry_tx, expiry_rx) = mpsc::channel(config.events.command_queue_capacity);

        info!(
            peer = %local_peer,
            privileged = config.session.privileged,
            backend = capture.name(),
            "Starting coordinator"
        );
        let state = SessionState::new(config, local_peer, capture, events.clone(), expiry_tx);
        tokio::spawn(run(state, rx, expiry_rx));

        Ok(Self { tx, events })
    }

    /// Queue an input and wait until it has been handled
    pub async fn submit(&self, input: impl Into<Input>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Input {
                input: input.into(),
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| AppError::CoordinatorStopped)?;
        reply_rx.await.map_err(|_| AppError::CoordinatorStopped)?
    }

    /// Queue an input without waiting for it to be handled
    pub async fn dispatch(&self, input: impl Into<Input>) -> Result<()> {
        self.tx
            .send(Command::Input {
                input: input.into(),
                reply: None,
            })
            .await
            .map_err(|_| AppError::CoordinatorStopped)
    }

    pub async fn host(&self, cmd: HostCommand) -> Result<()> {
        self.submit(cmd).await
    }

    pub async fn peer(&self, msg: PeerMessage) -> Result<()> {
        self.submit(msg).await
    }

    pub async fn user(&self, action: UserAction) -> Result<()> {
        self.submit(action).await
    }

    /// Current state, taken between two inputs
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(reply_tx))
            .await
            .map_err(|_| AppError::CoordinatorStopped)?;
        reply_rx.await.map_err(|_| AppError::CoordinatorStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Stop the task after the inputs already queued; local streams are released
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| AppError::CoordinatorStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn run(
    mut state: SessionState,
    mut rx: mpsc::Receiver<Command>,
    mut expiry_rx: mpsc::Receiver<TileExpiry>,
) {
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Input { input, reply }) => {
                    let result = state.handle(input).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(state.snapshot());
                }
                Some(Command::Shutdown) | None => break,
            },
            Some(expiry) = expiry_rx.recv() => state.on_tile_expired(expiry),
        }
    }

    debug!("Coordinator loop exiting");
    state.release_all().await;
    info!("Coordinator stopped");
}
