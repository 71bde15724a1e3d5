//! Input handlers
//!
//! Each handler mutates `SessionState` and publishes the resulting
//! notifications. Capture requests are awaited inline, so the next input is
//! only taken once the current one has fully landed.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::command::{Input, UserAction};
use super::state::SessionState;
use crate::capabilities::{CapabilityUpdate, PtzCapabilities};
use crate::devices::{DeviceKind, SelectionSlot, SourceMatcher};
use crate::directory::{ContactUpdate, MuteKind, PeerId, StatusUpdate, StreamName, TileId};
use crate::error::{AppError, Result};
use crate::events::CoordinatorEvent;
use crate::exclusive::LocalMode;
use crate::host::{HostCommand, HostSettings, SecondSources};
use crate::primary_view::{ElectionOrigin, PrimaryView, ToggleOutcome};
use crate::signaling::PeerMessage;
use crate::tiles::TileIcon;

impl SessionState {
    pub async fn handle(&mut self, input: Input) -> Result<()> {
        let origin = input.describe();
        let result = match input {
            Input::Host(cmd) => self.handle_host(cmd).await,
            Input::Peer(msg) => self.handle_peer(msg),
            Input::User(action) => self.handle_user(action).await,
        };
        if let Err(err) = &result {
            self.report(&origin, err);
        }
        result
    }

    // ========================================================================
    // Host bridge
    // ========================================================================

    async fn handle_host(&mut self, cmd: HostCommand) -> Result<()> {
        debug!("Host command: {}", cmd.name());
        match cmd {
            HostCommand::Settings(settings) => self.apply_settings(settings).await,
            other => self.apply_host_field(other).await,
        }
    }

    async fn apply_host_field(&mut self, cmd: HostCommand) -> Result<()> {
        match cmd {
            HostCommand::Settings(_) => {
                warn!("Nested settings payload ignored");
                Ok(())
            }
            HostCommand::ContactInfo(update) => {
                self.update_local_contact(update);
                Ok(())
            }
            HostCommand::VideoSource(matcher) => {
                self.select_primary_source(DeviceKind::Video, matcher).await
            }
            HostCommand::AudioSource(matcher) => {
                self.select_primary_source(DeviceKind::Audio, matcher).await
            }
            HostCommand::SecondSources(sources) => self.select_second_sources(sources).await,
            HostCommand::Mirror(mirror) => {
                self.set_local_mirror(mirror);
                Ok(())
            }
            HostCommand::Ptz(ptz) => {
                self.set_local_ptz(ptz);
                Ok(())
            }
            HostCommand::ScreenControl(enabled) => {
                self.update_local_capabilities(CapabilityUpdate {
                    supports_screen_control: Some(enabled),
                    supports_screen_sharing: Some(true),
                    ..Default::default()
                });
                Ok(())
            }
            HostCommand::VideoSourceRemoved(label) => {
                self.remove_video_source(&label);
                Ok(())
            }
            HostCommand::StartRecording => {
                self.set_recording(true);
                Ok(())
            }
            HostCommand::StopRecording => {
                self.set_recording(false);
                Ok(())
            }
        }
    }

    /// Session start: devices, every settings field, local stream, ready
    async fn apply_settings(&mut self, settings: HostSettings) -> Result<()> {
        if !self.registry.is_enumerated() {
            self.refresh_devices().await?;
        }

        for cmd in settings.into_commands() {
            self.apply_host_field(cmd).await?;
        }

        if !self.local_streams.contains_key(&StreamName::Default) {
            let handle = self.acquire(self.primary_constraints(None)).await?;
            self.install_local_stream(handle).await?;
        }

        info!("Host settings applied, ready to connect");
        self.publish(CoordinatorEvent::ReadyToConnect);
        Ok(())
    }

    async fn refresh_devices(&mut self) -> Result<()> {
        let limit = self.config.enumeration_timeout();
        let capture = self.capture.clone();
        let lists = Self::bounded(
            limit,
            "device enumeration",
            self.registry.refresh_devices(capture.as_ref()),
        )
        .await?;

        self.publish(CoordinatorEvent::SessionDevices {
            video: lists.video,
            audio: lists.audio,
        });
        self.publish_selection();
        Ok(())
    }

    fn publish_selection(&self) {
        self.publish(CoordinatorEvent::SessionSelectionChanged {
            selection: self.registry.selection().clone(),
        });
    }

    /// Change a primary device; a live stream is re-acquired before commit
    async fn select_primary_source(&mut self, kind: DeviceKind, matcher: SourceMatcher) -> Result<()> {
        let Some(index) = self.registry.resolve_primary(kind, &matcher) else {
            debug!("No {} device matches {:?}, keeping selection", kind, matcher);
            return Ok(());
        };

        let slot = SelectionSlot::primary(kind);
        if self.registry.selection().get(slot) == Some(index) {
            return Ok(());
        }

        if self.local_streams.contains_key(&StreamName::Default) {
            let handle = self
                .acquire(self.primary_constraints(Some((slot, index))))
                .await?;
            self.registry.commit(slot, Some(index));
            self.install_local_stream(handle).await?;
        } else {
            self.registry.commit(slot, Some(index));
        }

        info!("Primary {} source set to index {}", kind, index);
        self.publish_selection();
        Ok(())
    }

    async fn select_second_sources(&mut self, sources: SecondSources) -> Result<()> {
        let resolution = self.registry.select_secondary(&sources.video, &sources.audio);
        self.update_local_capabilities(CapabilityUpdate {
            supports_second_source: Some(resolution.available()),
            ..Default::default()
        });

        if !resolution.available() && self.modes.is_active(LocalMode::SecondarySource) {
            info!("Secondary source no longer configured, disabling it");
            self.disable_mode(LocalMode::SecondarySource).await;
        }

        self.publish_selection();
        self.publish_visibility(TileId::LOCAL_PRIMARY);
        Ok(())
    }

    /// Store local capabilities and broadcast them, changed or not
    fn update_local_capabilities(&mut self, update: CapabilityUpdate) {
        self.capabilities.set_local(&update);
        self.publish(CoordinatorEvent::BroadcastCapabilities {
            capabilities: *self.capabilities.local(),
        });
    }

    fn set_local_ptz(&mut self, ptz: PtzCapabilities) {
        self.update_local_capabilities(CapabilityUpdate {
            ptz: Some(ptz),
            ..Default::default()
        });
        self.publish(CoordinatorEvent::TilePtzControls {
            tile: TileId::LOCAL_PRIMARY,
            ptz,
        });
        self.publish_visibility(TileId::LOCAL_PRIMARY);
    }

    fn set_local_mirror(&mut self, mirror: bool) {
        if self.registry.set_mirror(mirror) {
            debug!("Local mirror set to {}", mirror);
        }
        self.publish(CoordinatorEvent::TileMirrorChanged {
            tile: TileId::LOCAL_PRIMARY,
            mirror,
        });
    }

    fn update_local_contact(&mut self, update: ContactUpdate) {
        let local = self.local_peer();
        let changes = self.directory.upsert_contact(&local, update);

        for tile in [TileId::LOCAL_PRIMARY, TileId::LOCAL_SECONDARY] {
            self.publish(CoordinatorEvent::TileTitle {
                tile,
                title: self.title(tile),
            });
        }
        if changes.status {
            self.publish_status_icons(TileId::LOCAL_PRIMARY);
            self.publish_status_icons(TileId::LOCAL_SECONDARY);
            self.publish_visibility(TileId::LOCAL_PRIMARY);
            self.publish_visibility(TileId::LOCAL_SECONDARY);
        }
        self.publish(CoordinatorEvent::BroadcastContactInfo {
            contact: self.directory.local_contact().clone(),
        });
    }

    fn remove_video_source(&mut self, label: &str) {
        let before = self.registry.selection().clone();
        if self.registry.remove_device(DeviceKind::Video, label).is_none() {
            return;
        }

        let lists = self.registry.lists();
        self.publish(CoordinatorEvent::SessionDevices {
            video: lists.video,
            audio: lists.audio,
        });
        if *self.registry.selection() != before {
            self.publish_selection();
        }
    }

    fn set_recording(&mut self, recording: bool) {
        if self.recording == recording {
            debug!("Recording already {}", if recording { "started" } else { "stopped" });
            return;
        }
        self.recording = recording;
        info!("Recording {}", if recording { "started" } else { "stopped" });

        self.publish(CoordinatorEvent::TileRecording {
            tile: TileId::LOCAL_PRIMARY,
            recording,
        });
        self.publish(CoordinatorEvent::BroadcastRecordingStatus {
            recording,
            at: Utc::now(),
        });
    }

    // ========================================================================
    // Peers
    // ========================================================================

    fn handle_peer(&mut self, msg: PeerMessage) -> Result<()> {
        if self.directory.is_local(msg.peer_id()) {
            debug!("Ignoring {} echoed from local peer", msg.kind());
            return Ok(());
        }

        match msg {
            PeerMessage::ContactInfo {
                peer_id,
                info,
                primary_view,
            } => {
                self.merge_remote_contact(&peer_id, info);
                if let Some(view) = primary_view {
                    self.apply_remote_election(view);
                }
                Ok(())
            }
            PeerMessage::Capabilities {
                peer_id,
                capabilities,
            } => self.update_remote_capabilities(&peer_id, &capabilities),
            PeerMessage::PrimaryView { view, .. } => {
                self.apply_remote_election(view);
                Ok(())
            }
            PeerMessage::StreamAdded { peer_id, stream } => self.add_remote_stream(&peer_id, stream),
            PeerMessage::StreamRemoved { peer_id, stream } => {
                if let Some(tile) = self.directory.release_tile(&peer_id, stream) {
                    self.on_tile_released(tile);
                }
                Ok(())
            }
            PeerMessage::PeerLeft { peer_id } => {
                self.remove_peer(&peer_id);
                Ok(())
            }
            PeerMessage::RecordingStatus { peer_id, recording } => {
                if let Some(tile) = self.directory.index_for_peer_stream(&peer_id, StreamName::Default) {
                    self.publish(CoordinatorEvent::TileRecording { tile, recording });
                }
                Ok(())
            }
        }
    }

    fn merge_remote_contact(&mut self, peer_id: &PeerId, info: ContactUpdate) {
        let changes = self.directory.upsert_contact(peer_id, info);
        if changes.created {
            self.capabilities.register(peer_id);
            self.forget_throttled(peer_id);
        }

        let tiles = self.peer_tiles(peer_id);
        if changes.name {
            for &(tile, _) in &tiles {
                self.publish(CoordinatorEvent::TileTitle {
                    tile,
                    title: self.title(tile),
                });
            }
        }
        if changes.status {
            self.refresh_remote_status_icons(&tiles);
        }
    }

    fn peer_tiles(&self, peer_id: &PeerId) -> Vec<(TileId, StreamName)> {
        self.directory
            .occupied_tiles()
            .into_iter()
            .filter(|(_, key)| key.peer_id == *peer_id)
            .map(|(tile, key)| (tile, key.stream))
            .collect()
    }

    /// Re-render mute indicators of a peer's default and secondary tiles
    fn refresh_remote_status_icons(&self, tiles: &[(TileId, StreamName)]) {
        for &(tile, stream) in tiles {
            match stream {
                StreamName::Default => {
                    self.publish_status_icons(tile);
                }
                StreamName::Secondary => {
                    if let Some(ctx) = self.icon_context(tile) {
                        self.publish(CoordinatorEvent::IconState {
                            tile,
                            icon: TileIcon::Mic,
                            on: ctx.mic_muted,
                        });
                    }
                }
                StreamName::ScreenShare => continue,
            }
            self.publish_visibility(tile);
        }
    }

    fn update_remote_capabilities(&mut self, peer_id: &PeerId, update: &CapabilityUpdate) -> Result<()> {
        if !self.capabilities.set_remote(peer_id, update)? {
            return Ok(());
        }

        if let Some(tile) = self.directory.index_for_peer_stream(peer_id, StreamName::Default) {
            if let Some(caps) = self.capabilities.get(peer_id) {
                self.publish(CoordinatorEvent::TilePtzControls { tile, ptz: caps.ptz });
            }
            self.publish_visibility(tile);
        }
        Ok(())
    }

    /// A remote election always overwrites the local pointer
    fn apply_remote_election(&mut self, view: PrimaryView) {
        info!(?view, "Primary view set remotely");
        self.election.set_primary_view(view, ElectionOrigin::Remote);
        self.reflect_primary_view();

        if self.election.follow_remote(self.privileged()) {
            self.publish(CoordinatorEvent::LayoutEnlarged {
                tile: self.election.enlarged(),
            });
        }
        self.publish_all_visibility();
    }

    fn add_remote_stream(&mut self, peer_id: &PeerId, stream: StreamName) -> Result<()> {
        if self.directory.index_for_peer_stream(peer_id, stream).is_some() {
            debug!(peer = %peer_id, %stream, "Stream already shown");
            return Ok(());
        }

        let tile = self.directory.assign_tile(peer_id, stream)?;
        self.on_tile_populated(tile);

        if let Some(caps) = self.capabilities.get(peer_id) {
            if stream == StreamName::Default && caps.ptz.any() {
                self.publish(CoordinatorEvent::TilePtzControls { tile, ptz: caps.ptz });
            }
        }
        Ok(())
    }

    fn remove_peer(&mut self, peer_id: &PeerId) {
        info!(peer = %peer_id, "Participant left");
        for tile in self.directory.remove_contact(peer_id) {
            self.on_tile_released(tile);
        }
        self.capabilities.unregister(peer_id);
        self.forget_throttled(peer_id);

        if self.election.clear_for_peer(peer_id) {
            self.reflect_primary_view();
            self.publish_all_visibility();
        }
    }

    // ========================================================================
    // Local user
    // ========================================================================

    async fn handle_user(&mut self, action: UserAction) -> Result<()> {
        match action {
            UserAction::RefreshDevices => self.refresh_devices().await,
            UserAction::Interact { tile } => {
                self.tiles.interact(tile)?;
                self.publish_visibility(tile);
                Ok(())
            }
            UserAction::TogglePrimary { tile } => self.toggle_primary(tile),
            UserAction::ToggleScreenShare => self.toggle_mode(LocalMode::ScreenSharing).await,
            UserAction::ToggleSecondSource => self.toggle_mode(LocalMode::SecondarySource).await,
            UserAction::ToggleMuteAll { kind } => {
                self.toggle_mute_all(kind);
                Ok(())
            }
            UserAction::SelectSource { kind, matcher } => self.select_primary_source(kind, matcher).await,
            UserAction::SetLocalStatus { status } => {
                self.set_local_status(status);
                Ok(())
            }
        }
    }

    fn toggle_primary(&mut self, tile: TileId) -> Result<()> {
        let key = self
            .directory
            .stream_at(tile)
            .ok_or(AppError::TileNotPopulated(tile))?;

        match self.election.toggle_as_primary(tile, &key, self.privileged()) {
            ToggleOutcome::Elected(view) => {
                self.reflect_primary_view();
                if self.election.enlarge_lit() {
                    self.publish(CoordinatorEvent::LayoutEnlarged {
                        tile: self.election.enlarged(),
                    });
                }
                self.publish(CoordinatorEvent::BroadcastPrimaryView { view });
            }
            ToggleOutcome::Enlarged(enlarged) => {
                self.reflect_primary_view();
                self.publish(CoordinatorEvent::LayoutEnlarged { tile: enlarged });
            }
            ToggleOutcome::Locked => return Ok(()),
        }
        self.publish_all_visibility();
        Ok(())
    }

    /// Enable or disable one of the exclusive local modes
    async fn toggle_mode(&mut self, mode: LocalMode) -> Result<()> {
        if self.modes.is_active(mode) {
            self.disable_mode(mode).await;
            return Ok(());
        }

        self.modes.begin_enable(
            mode,
            self.directory.remote_stream_count(),
            self.config.tiles.max_remote,
        )?;

        let acquired = match self.mode_constraints(mode) {
            Ok(constraints) => self.acquire(constraints).await,
            Err(err) => Err(err),
        };
        let handle = match acquired {
            Ok(handle) => handle,
            Err(err) => {
                warn!("Could not enable {}: {}", mode, err);
                self.modes.rollback(mode);
                return Err(err);
            }
        };

        if let Err(err) = self.install_local_stream(handle.clone()).await {
            self.capture.release_stream(handle).await;
            self.modes.rollback(mode);
            return Err(err);
        }

        info!("{} enabled", mode);
        self.publish_mode_change(mode, true);

        if mode == LocalMode::ScreenSharing && self.privileged() {
            let view = PrimaryView::stream(self.local_peer(), StreamName::ScreenShare);
            self.election.set_primary_view(view.clone(), ElectionOrigin::Local);
            self.reflect_primary_view();
            if self.election.enlarge_lit() {
                self.publish(CoordinatorEvent::LayoutEnlarged {
                    tile: self.election.enlarged(),
                });
            }
            self.publish(CoordinatorEvent::BroadcastPrimaryView { view });
        }

        self.publish_all_visibility();
        Ok(())
    }

    async fn disable_mode(&mut self, mode: LocalMode) {
        if !self.modes.disable(mode) {
            return;
        }
        self.stop_local_stream(mode.stream()).await;
        info!("{} disabled", mode);
        self.publish_mode_change(mode, false);
        self.publish_all_visibility();
    }

    fn publish_mode_change(&self, mode: LocalMode, active: bool) {
        let button = match mode {
            LocalMode::ScreenSharing => TileIcon::ShareScreen,
            LocalMode::SecondarySource => TileIcon::SecondSource,
        };
        self.publish(CoordinatorEvent::ModeChanged { mode, active });
        self.publish(CoordinatorEvent::IconState {
            tile: TileId::LOCAL_PRIMARY,
            icon: button,
            on: active,
        });

        let affordances = self.modes.affordances(self.registry.selection().has_secondary());
        self.publish(CoordinatorEvent::TileStatusControls {
            tile: TileId::LOCAL_SECONDARY,
            visible: affordances.secondary_status_controls,
        });
    }

    fn toggle_mute_all(&mut self, kind: MuteKind) {
        let muted = self.mute_all.toggle(kind);
        info!("Mute all {:?}: {}", kind, muted);

        for (_, key) in self.directory.occupied_tiles() {
            if key.stream != StreamName::Default || self.directory.is_local(&key.peer_id) {
                continue;
            }
            self.publish(CoordinatorEvent::BroadcastMuteRequest {
                peer_id: key.peer_id,
                kind,
                muted,
            });
        }
        self.publish(CoordinatorEvent::UserMuteAll { kind, muted });
    }

    fn set_local_status(&mut self, status: StatusUpdate) {
        if status.is_empty() {
            return;
        }
        self.update_local_contact(ContactUpdate {
            status,
            ..Default::default()
        });
    }
}
