//! Inbound peer messages
//!
//! The transport layer delivers these already decoded and keyed by
//! participant. Delivery and ordering are its business; the coordinator
//! only folds them into session state.

use serde::{Deserialize, Serialize};

use crate::capabilities::CapabilityUpdate;
use crate::directory::{ContactUpdate, PeerId, StreamName};
use crate::primary_view::PrimaryView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// Contact information, optionally carrying the sender's primary view
    ContactInfo {
        peer_id: PeerId,
        #[serde(default)]
        info: ContactUpdate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary_view: Option<PrimaryView>,
    },
    Capabilities {
        peer_id: PeerId,
        capabilities: CapabilityUpdate,
    },
    PrimaryView {
        peer_id: PeerId,
        view: PrimaryView,
    },
    StreamAdded {
        peer_id: PeerId,
        stream: StreamName,
    },
    StreamRemoved {
        peer_id: PeerId,
        stream: StreamName,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    RecordingStatus {
        peer_id: PeerId,
        recording: bool,
    },
}

impl PeerMessage {
    /// Participant the message is about
    pub fn peer_id(&self) -> &PeerId {
        match self {
            Self::ContactInfo { peer_id, .. }
            | Self::Capabilities { peer_id, .. }
            | Self::PrimaryView { peer_id, .. }
            | Self::StreamAdded { peer_id, .. }
            | Self::StreamRemoved { peer_id, .. }
            | Self::PeerLeft { peer_id }
            | Self::RecordingStatus { peer_id, .. } => peer_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContactInfo { .. } => "contact_info",
            Self::Capabilities { .. } => "capabilities",
            Self::PrimaryView { .. } => "primary_view",
            Self::StreamAdded { .. } => "stream_added",
            Self::StreamRemoved { .. } => "stream_removed",
            Self::PeerLeft { .. } => "peer_left",
            Self::RecordingStatus { .. } => "recording_status",
        }
    }
}
