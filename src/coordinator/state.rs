//! Session state owned by the coordinator task
//!
//! Nothing in here is shared: the actor loop owns one `SessionState` and
//! runs every input against it to completion before taking the next.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::capabilities::{Capabilities, CapabilityTable};
use crate::capture::{CaptureProvider, MediaConstraints, MediaStreamHandle};
use crate::config::CoordinatorConfig;
use crate::devices::{DeviceLists, SelectionSlot, SourceRegistry, SourceSelection};
use crate::directory::{
    Contact, Directory, MuteKind, PeerId, StatusFlags, StreamName, TileId,
};
use crate::error::{AppError, Result, Severity};
use crate::events::{CoordinatorEvent, EventBus};
use crate::exclusive::{ExclusiveModes, LocalMode};
use crate::primary_view::{PrimaryView, PrimaryViewElection, StarChange};
use crate::tiles::{visible_icons, IconContext, TileBoard, TileExpiry, TileIcon};
use crate::utils::LogThrottler;
use crate::warn_throttled;

/// Global mute requests issued to every remote participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MuteAllState {
    pub mic: bool,
    pub speaker: bool,
}

impl MuteAllState {
    pub fn get(&self, kind: MuteKind) -> bool {
        match kind {
            MuteKind::Mic => self.mic,
            MuteKind::Speaker => self.speaker,
        }
    }

    pub fn toggle(&mut self, kind: MuteKind) -> bool {
        let flag = match kind {
            MuteKind::Mic => &mut self.mic,
            MuteKind::Speaker => &mut self.speaker,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSnapshot {
    pub tile: TileId,
    pub peer_id: PeerId,
    pub stream: StreamName,
    pub title: String,
    pub active: bool,
    pub icons: Vec<TileIcon>,
}

/// Serializable view of the whole session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub local_peer: PeerId,
    pub privileged: bool,
    pub devices: DeviceLists,
    pub selection: SourceSelection,
    pub local_capabilities: Capabilities,
    pub remote_capabilities: BTreeMap<PeerId, Capabilities>,
    pub local_contact: Contact,
    pub contacts: Vec<Contact>,
    pub tiles: Vec<TileSnapshot>,
    pub primary_view: PrimaryView,
    pub starred: Option<TileId>,
    pub enlarged: Option<TileId>,
    pub screen_sharing: bool,
    pub secondary_source: bool,
    pub local_streams: Vec<MediaStreamHandle>,
    pub recording: bool,
    pub mute_all: MuteAllState,
}

impl SessionSnapshot {
    pub fn tile(&self, tile: TileId) -> Option<&TileSnapshot> {
        self.tiles.iter().find(|t| t.tile == tile)
    }

    pub fn remote_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| !t.tile.is_local()).count()
    }
}

fn unknown_peer_key(peer: &PeerId) -> String {
    format!("{}:unknown", peer)
}

pub(crate) struct SessionState {
    pub(super) config: CoordinatorConfig,
    pub(super) capture: Arc<dyn CaptureProvider>,
    pub(super) events: Arc<EventBus>,
    pub(super) registry: SourceRegistry,
    pub(super) capabilities: CapabilityTable,
    pub(super) directory: Directory,
    pub(super) election: PrimaryViewElection,
    pub(super) tiles: TileBoard,
    pub(super) modes: ExclusiveModes,
    pub(super) local_streams: HashMap<StreamName, MediaStreamHandle>,
    pub(super) recording: bool,
    pub(super) mute_all: MuteAllState,
    pub(super) throttler: LogThrottler,
}

impl SessionState {
    pub fn new(
        config: CoordinatorConfig,
        local_peer: PeerId,
        capture: Arc<dyn CaptureProvider>,
        events: Arc<EventBus>,
        expiry_tx: mpsc::Sender<TileExpiry>,
    ) -> Self {
        Self {
            registry: SourceRegistry::new(config.devices.clone()),
            capabilities: CapabilityTable::new(),
            directory: Directory::new(local_peer, config.tiles.max_remote),
            election: PrimaryViewElection::new(),
            tiles: TileBoard::new(config.idle_dwell(), expiry_tx),
            modes: ExclusiveModes::new(),
            local_streams: HashMap::new(),
            recording: false,
            mute_all: MuteAllState::default(),
            throttler: LogThrottler::default(),
            config,
            capture,
            events,
        }
    }

    pub fn privileged(&self) -> bool {
        self.config.session.privileged
    }

    pub fn local_peer(&self) -> PeerId {
        self.directory.local_peer().clone()
    }

    pub fn publish(&self, event: CoordinatorEvent) {
        self.events.publish(event);
    }

    /// Log or surface a failed input according to its severity
    pub fn report(&self, origin: &str, err: &AppError) {
        match err.severity() {
            Severity::Fatal | Severity::User => {
                warn!("{} failed: {}", origin, err);
                self.publish(CoordinatorEvent::from_error(err));
            }
            Severity::Silent => match err {
                AppError::UnknownParticipant(peer) => {
                    warn_throttled!(
                        self.throttler,
                        &unknown_peer_key(peer),
                        "Dropping {} for unknown participant {}",
                        origin,
                        peer
                    );
                }
                _ => debug!("{} rejected: {}", origin, err),
            },
        }
    }

    /// Let the next drop for `peer` be logged again
    pub fn forget_throttled(&self, peer: &PeerId) {
        self.throttler.clear(&unknown_peer_key(peer));
    }

    /// Run a capture request with the optional configured timeout
    pub async fn bounded<T, F>(limit: Option<Duration>, what: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match limit {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| AppError::Timeout(format!("{} after {:?}", what, limit)))?,
            None => request.await,
        }
    }

    // ========================================================================
    // Local streams
    // ========================================================================

    /// Constraints for the local default stream, optionally overriding one slot
    pub fn primary_constraints(&self, pending: Option<(SelectionSlot, usize)>) -> MediaConstraints {
        let pick = |slot: SelectionSlot| {
            let index = match pending {
                Some((pending_slot, index)) if pending_slot == slot => Some(index),
                _ => self.registry.selection().get(slot),
            };
            index.and_then(|i| self.registry.devices(slot.kind()).get(i).cloned())
        };
        MediaConstraints::Devices {
            stream: StreamName::Default,
            video: pick(SelectionSlot::PrimaryVideo),
            audio: pick(SelectionSlot::PrimaryAudio),
        }
    }

    pub fn mode_constraints(&self, mode: LocalMode) -> Result<MediaConstraints> {
        match mode {
            LocalMode::ScreenSharing => Ok(MediaConstraints::Screen),
            LocalMode::SecondarySource => {
                if !self.registry.selection().has_secondary() {
                    return Err(AppError::AcquisitionError(
                        "no secondary source configured".into(),
                    ));
                }
                Ok(MediaConstraints::Devices {
                    stream: StreamName::Secondary,
                    video: self
                        .registry
                        .selected_device(SelectionSlot::SecondaryVideo)
                        .cloned(),
                    audio: self
                        .registry
                        .selected_device(SelectionSlot::SecondaryAudio)
                        .cloned(),
                })
            }
        }
    }

    pub async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaStreamHandle> {
        let stream = constraints.stream();
        debug!(%stream, backend = self.capture.name(), "Requesting local stream");
        Self::bounded(
            self.config.capture_timeout(),
            "stream acquisition",
            self.capture.acquire_stream(constraints),
        )
        .await
    }

    /// Keep `handle` as the live local stream, releasing what it replaces
    pub async fn install_local_stream(&mut self, handle: MediaStreamHandle) -> Result<TileId> {
        let stream = handle.stream;
        let local = self.local_peer();
        let tile = self.directory.assign_tile(&local, stream)?;

        if let Some(previous) = self.local_streams.insert(stream, handle.clone()) {
            self.capture.release_stream(previous).await;
        }
        self.publish(CoordinatorEvent::LocalStreamStarted { handle });

        if !self.tiles.is_populated(tile) {
            self.on_tile_populated(tile);
            if tile == TileId::LOCAL_PRIMARY {
                self.publish(CoordinatorEvent::TileMirrorChanged {
                    tile,
                    mirror: self.registry.selection().mirror_local_primary,
                });
                self.publish(CoordinatorEvent::TilePtzControls {
                    tile,
                    ptz: self.capabilities.local().ptz,
                });
            }
        }
        Ok(tile)
    }

    pub async fn stop_local_stream(&mut self, stream: StreamName) {
        if let Some(handle) = self.local_streams.remove(&stream) {
            self.capture.release_stream(handle).await;
            self.publish(CoordinatorEvent::LocalStreamStopped { stream });
        }
        let local = self.local_peer();
        if let Some(tile) = self.directory.release_tile(&local, stream) {
            self.on_tile_released(tile);
        }
    }

    pub async fn release_all(&mut self) {
        let streams: Vec<StreamName> = self.local_streams.keys().copied().collect();
        for stream in streams {
            self.stop_local_stream(stream).await;
        }
    }

    // ========================================================================
    // Tile rendering
    // ========================================================================

    pub fn title(&self, tile: TileId) -> String {
        self.directory
            .title_for(tile, &self.config.session.default_title_prefix)
    }

    /// Announce a newly assigned tile and start tracking its activity
    pub fn on_tile_populated(&mut self, tile: TileId) {
        let Some(key) = self.directory.stream_at(tile) else {
            return;
        };
        self.tiles.populate(tile);
        info!(%tile, peer = %key.peer_id, stream = %key.stream, "Tile populated");
        self.publish(CoordinatorEvent::TilePopulated {
            tile,
            peer_id: key.peer_id,
            stream: key.stream,
            title: self.title(tile),
        });
        self.publish_status_icons(tile);
        self.reflect_primary_view();
        self.publish_visibility(tile);
    }

    /// Tear down a tile whose stream ended
    pub fn on_tile_released(&mut self, tile: TileId) {
        self.tiles.teardown(tile);
        if self.election.tile_released(tile) {
            self.publish(CoordinatorEvent::LayoutEnlarged { tile: None });
        }
        info!(%tile, "Tile released");
        self.publish(CoordinatorEvent::TileReleased { tile });
        self.reflect_primary_view();
    }

    pub fn on_tile_expired(&mut self, expiry: TileExpiry) {
        if self.tiles.expire(expiry) {
            debug!(tile = %expiry.tile, "Tile idle");
            self.publish_visibility(expiry.tile);
        }
    }

    fn status_for(&self, tile: TileId) -> Option<(StreamName, StatusFlags)> {
        let key = self.directory.stream_at(tile)?;
        let status = self
            .directory
            .contact(&key.peer_id)
            .map(|contact| contact.status.clone())
            .unwrap_or_default();
        Some((key.stream, status))
    }

    pub fn icon_context(&self, tile: TileId) -> Option<IconContext> {
        let key = self.directory.stream_at(tile)?;
        let (stream, status) = self.status_for(tile)?;
        let mic_muted = match stream {
            StreamName::Secondary => status.mic_muted2.unwrap_or(false),
            _ => status.mic_muted,
        };
        let ptz = if tile.is_local() {
            self.capabilities.local().ptz.any()
        } else {
            self.capabilities
                .get(&key.peer_id)
                .is_some_and(|caps| caps.ptz.any())
        };

        Some(IconContext {
            active: self.tiles.is_active(tile),
            privileged: self.privileged(),
            mic_muted,
            speaker_muted: status.speaker_muted,
            video_muted: status.video_muted,
            status_controls: stream != StreamName::ScreenShare,
            star_lit: self.election.lit() == Some(tile),
            pointer_unset: self.election.pointer().is_unset(),
            source_buttons: tile == TileId::LOCAL_PRIMARY,
            screen_sharing: self.modes.is_active(LocalMode::ScreenSharing),
            secondary_source: self.modes.is_active(LocalMode::SecondarySource),
            secondary_configured: self.registry.selection().has_secondary(),
            ptz,
        })
    }

    pub fn publish_visibility(&self, tile: TileId) {
        if let Some(ctx) = self.icon_context(tile) {
            self.publish(CoordinatorEvent::TileVisibility {
                tile,
                active: ctx.active,
                icons: visible_icons(&ctx),
            });
        }
    }

    pub fn publish_all_visibility(&self) {
        for (tile, _) in self.directory.occupied_tiles() {
            self.publish_visibility(tile);
        }
    }

    /// Mute indicators of one tile
    pub fn publish_status_icons(&self, tile: TileId) {
        let Some(ctx) = self.icon_context(tile) else {
            return;
        };
        if !ctx.status_controls {
            return;
        }
        for (icon, on) in [
            (TileIcon::Mic, ctx.mic_muted),
            (TileIcon::Speaker, ctx.speaker_muted),
            (TileIcon::Video, ctx.video_muted),
        ] {
            self.publish(CoordinatorEvent::IconState { tile, icon, on });
        }
    }

    /// Recompute the star indicators from the pointer
    pub fn reflect_primary_view(&mut self) {
        let changes = self.election.reflect(&self.directory);
        for StarChange { tile, lit } in changes {
            if self.directory.stream_at(tile).is_none() {
                continue;
            }
            self.publish(CoordinatorEvent::IconState {
                tile,
                icon: TileIcon::Star,
                on: lit,
            });
            self.publish_visibility(tile);
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let tiles = self
            .directory
            .occupied_tiles()
            .into_iter()
            .map(|(tile, key)| TileSnapshot {
                tile,
                peer_id: key.peer_id,
                stream: key.stream,
                title: self.title(tile),
                active: self.tiles.is_active(tile),
                icons: self
                    .icon_context(tile)
                    .map(|ctx| visible_icons(&ctx))
                    .unwrap_or_default(),
            })
            .collect();

        let mut contacts: Vec<Contact> = self.directory.contacts().cloned().collect();
        contacts.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));

        let mut local_streams: Vec<MediaStreamHandle> = self.local_streams.values().cloned().collect();
        local_streams.sort_by_key(|handle| handle.stream.as_str());

        SessionSnapshot {
            local_peer: self.local_peer(),
            privileged: self.privileged(),
            devices: self.registry.lists(),
            selection: self.registry.selection().clone(),
            local_capabilities: *self.capabilities.local(),
            remote_capabilities: self
                .capabilities
                .remote_entries()
                .map(|(peer, caps)| (peer.clone(), *caps))
                .collect(),
            local_contact: self.directory.local_contact().clone(),
            contacts,
            tiles,
            primary_view: self.election.pointer().clone(),
            starred: self.election.lit(),
            enlarged: self.election.enlarged(),
            screen_sharing: self.modes.is_active(LocalMode::ScreenSharing),
            secondary_source: self.modes.is_active(LocalMode::SecondarySource),
            local_streams,
            recording: self.recording,
            mute_all: self.mute_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FixedCaptureProvider;

    fn session() -> SessionState {
        let (expiry_tx, _expiry_rx) = mpsc::channel(8);
        SessionState::new(
            CoordinatorConfig::default(),
            PeerId::new("me"),
            Arc::new(FixedCaptureProvider::default()),
            Arc::new(EventBus::new()),
            expiry_tx,
        )
    }

    #[test]
    fn test_forget_throttled_only_touches_that_peer() {
        let state = session();
        let a = PeerId::new("a");
        let ab = PeerId::new("ab");
        assert!(state.throttler.should_log(&unknown_peer_key(&a)));
        assert!(state.throttler.should_log(&unknown_peer_key(&ab)));

        state.forget_throttled(&a);
        assert!(state.throttler.should_log(&unknown_peer_key(&a)));
        assert!(!state.throttler.should_log(&unknown_peer_key(&ab)));
    }
}
