use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capabilities::{Capabilities, PtzCapabilities};
use crate::capture::MediaStreamHandle;
use crate::devices::{Device, SourceSelection};
use crate::directory::{Contact, MuteKind, PeerId, StreamName, TileId};
use crate::error::{AppError, Severity};
use crate::exclusive::LocalMode;
use crate::primary_view::PrimaryView;
use crate::tiles::TileIcon;

/// Outbound coordinator notification
///
/// Serialized as `{"event": "<name>", "data": {...}}`. Names under
/// `broadcast.*` are for the transport layer, everything else is for the
/// rendering layer.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum CoordinatorEvent {
    // ============================================================================
    // Tiles
    // ============================================================================
    /// A stream got a tile
    #[serde(rename = "tile.populated")]
    TilePopulated {
        tile: TileId,
        peer_id: PeerId,
        stream: StreamName,
        title: String,
    },

    /// A tile no longer shows anything
    #[serde(rename = "tile.released")]
    TileReleased { tile: TileId },

    /// Activity state and the icons to show
    #[serde(rename = "tile.visibility")]
    TileVisibility {
        tile: TileId,
        active: bool,
        icons: Vec<TileIcon>,
    },

    #[serde(rename = "tile.title")]
    TileTitle { tile: TileId, title: String },

    #[serde(rename = "tile.mirror_changed")]
    TileMirrorChanged { tile: TileId, mirror: bool },

    /// Mic/speaker/video block shown or hidden as a whole
    #[serde(rename = "tile.status_controls")]
    TileStatusControls { tile: TileId, visible: bool },

    #[serde(rename = "tile.ptz_controls")]
    TilePtzControls { tile: TileId, ptz: PtzCapabilities },

    #[serde(rename = "tile.recording")]
    TileRecording { tile: TileId, recording: bool },

    /// On/off state of one icon (muted, lit, toggled)
    #[serde(rename = "icon.state")]
    IconState {
        tile: TileId,
        icon: TileIcon,
        on: bool,
    },

    // ============================================================================
    // Layout / user feedback
    // ============================================================================
    /// Tile shown enlarged, `None` for the grid
    #[serde(rename = "layout.enlarged")]
    LayoutEnlarged { tile: Option<TileId> },

    #[serde(rename = "user.error")]
    UserError {
        code: String,
        message: String,
        severity: Severity,
        retryable: bool,
    },

    #[serde(rename = "user.mute_all")]
    UserMuteAll { kind: MuteKind, muted: bool },

    // ============================================================================
    // Session
    // ============================================================================
    #[serde(rename = "session.devices")]
    SessionDevices {
        video: Vec<Device>,
        audio: Vec<Device>,
    },

    #[serde(rename = "session.selection_changed")]
    SessionSelectionChanged { selection: SourceSelection },

    /// Local stream acquired; transport renegotiates
    #[serde(rename = "session.local_stream_started")]
    LocalStreamStarted { handle: MediaStreamHandle },

    #[serde(rename = "session.local_stream_stopped")]
    LocalStreamStopped { stream: StreamName },

    #[serde(rename = "session.mode_changed")]
    ModeChanged { mode: LocalMode, active: bool },

    /// All host settings applied
    #[serde(rename = "session.ready_to_connect")]
    ReadyToConnect,

    // ============================================================================
    // Transport
    // ============================================================================
    #[serde(rename = "broadcast.capabilities")]
    BroadcastCapabilities { capabilities: Capabilities },

    #[serde(rename = "broadcast.primary_view")]
    BroadcastPrimaryView { view: PrimaryView },

    #[serde(rename = "broadcast.contact_info")]
    BroadcastContactInfo { contact: Contact },

    #[serde(rename = "broadcast.recording_status")]
    BroadcastRecordingStatus {
        recording: bool,
        at: DateTime<Utc>,
    },

    /// Ask a peer to mute or unmute
    #[serde(rename = "broadcast.mute_request")]
    BroadcastMuteRequest {
        peer_id: PeerId,
        kind: MuteKind,
        muted: bool,
    },
}

impl CoordinatorEvent {
    /// User-facing error notification
    pub fn from_error(err: &AppError) -> Self {
        Self::UserError {
            code: err.code().to_string(),
            message: err.to_string(),
            severity: err.severity(),
            retryable: err.is_retryable(),
        }
    }

    /// Get the event name (for filtering/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::TilePopulated { .. } => "tile.populated",
            Self::TileReleased { .. } => "tile.released",
            Self::TileVisibility { .. } => "tile.visibility",
            Self::TileTitle { .. } => "tile.title",
            Self::TileMirrorChanged { .. } => "tile.mirror_changed",
            Self::TileStatusControls { .. } => "tile.status_controls",
            Self::TilePtzControls { .. } => "tile.ptz_controls",
            Self::TileRecording { .. } => "tile.recording",
            Self::IconState { .. } => "icon.state",
            Self::LayoutEnlarged { .. } => "layout.enlarged",
            Self::UserError { .. } => "user.error",
            Self::UserMuteAll { .. } => "user.mute_all",
            Self::SessionDevices { .. } => "session.devices",
            Self::SessionSelectionChanged { .. } => "session.selection_changed",
            Self::LocalStreamStarted { .. } => "session.local_stream_started",
            Self::LocalStreamStopped { .. } => "session.local_stream_stopped",
            Self::ModeChanged { .. } => "session.mode_changed",
            Self::ReadyToConnect => "session.ready_to_connect",
            Self::BroadcastCapabilities { .. } => "broadcast.capabilities",
            Self::BroadcastPrimaryView { .. } => "broadcast.primary_view",
            Self::BroadcastContactInfo { .. } => "broadcast.contact_info",
            Self::BroadcastRecordingStatus { .. } => "broadcast.recording_status",
            Self::BroadcastMuteRequest { .. } => "broadcast.mute_request",
        }
    }

    /// Check if event name matches a topic pattern
    ///
    /// Supports wildcards:
    /// - `*` matches all events
    /// - `tile.*` matches all tile events
    /// - `tile.visibility` matches exact event
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        match topic.strip_suffix(".*") {
            Some(prefix) => event_name
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.')),
            None => event_name == topic,
        }
    }

    /// Whether the transport layer must forward this to peers
    pub fn is_broadcast(&self) -> bool {
        self.matches_topic("broadcast.*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_matches_serialized_tag() {
        let events = [
            CoordinatorEvent::TileReleased {
                tile: TileId::remote(2),
            },
            CoordinatorEvent::ReadyToConnect,
            CoordinatorEvent::BroadcastPrimaryView {
                view: PrimaryView::Unset,
            },
            CoordinatorEvent::LayoutEnlarged { tile: None },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.event_name());
        }
    }

    #[test]
    fn test_matches_topic() {
        let event = CoordinatorEvent::IconState {
            tile: TileId::LOCAL_PRIMARY,
            icon: TileIcon::Star,
            on: true,
        };
        assert!(event.matches_topic("*"));
        assert!(event.matches_topic("icon.*"));
        assert!(event.matches_topic("icon.state"));
        assert!(!event.matches_topic("tile.*"));
        assert!(!event.matches_topic("ico.*"));
        assert!(!event.is_broadcast());

        let event = CoordinatorEvent::BroadcastCapabilities {
            capabilities: Capabilities::default(),
        };
        assert!(event.is_broadcast());
    }

    #[test]
    fn test_payload_shape() {
        let event = CoordinatorEvent::TileVisibility {
            tile: TileId::remote(3),
            active: true,
            icons: vec![TileIcon::Mic, TileIcon::Star],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["tile"]["side"], "remote");
        assert_eq!(json["data"]["tile"]["slot"], 3);
        assert_eq!(json["data"]["icons"], serde_json::json!(["mic", "star"]));
    }

    #[test]
    fn test_error_event() {
        let event = CoordinatorEvent::from_error(&AppError::CapacityExceeded { limit: 4 });
        match event {
            CoordinatorEvent::UserError {
                code,
                severity,
                retryable,
                ..
            } => {
                assert_eq!(code, "capacity_exceeded");
                assert_eq!(severity, Severity::User);
                assert!(!retryable);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
