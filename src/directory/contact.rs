//! Contact records and their merge rules

use serde::{Deserialize, Serialize};

use super::types::PeerId;

/// Mute indicators advertised by a participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFlags {
    pub mic_muted: bool,
    pub speaker_muted: bool,
    pub video_muted: bool,
    /// Microphone of the secondary source, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mic_muted2: Option<bool>,
}

/// Partial status carried by a broadcast; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusUpdate {
    pub mic_muted: Option<bool>,
    pub speaker_muted: Option<bool>,
    pub video_muted: Option<bool>,
    pub mic_muted2: Option<bool>,
}

impl StatusUpdate {
    pub fn is_empty(&self) -> bool {
        self.mic_muted.is_none()
            && self.speaker_muted.is_none()
            && self.video_muted.is_none()
            && self.mic_muted2.is_none()
    }
}

/// Audio direction targeted by a mute-all request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuteKind {
    Mic,
    Speaker,
}

/// Presentation metadata for one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub peer_id: PeerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub status: StatusFlags,
}

/// Partial contact information as received from a peer or the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub uuid: Option<String>,
    pub status: StatusUpdate,
}

/// What a merge actually changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactChanges {
    pub created: bool,
    pub name: bool,
    pub status: bool,
}

impl ContactChanges {
    pub fn any(&self) -> bool {
        self.created || self.name || self.status
    }
}

impl Contact {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            name: None,
            uuid: None,
            status: StatusFlags::default(),
        }
    }

    /// Overwrite the fields present in `update`, keep everything else
    pub fn merge(&mut self, update: ContactUpdate) -> ContactChanges {
        let mut changes = ContactChanges::default();

        if let Some(name) = update.name {
            changes.name = self.name.as_deref() != Some(name.as_str());
            self.name = Some(name);
        }
        if let Some(uuid) = update.uuid {
            self.uuid = Some(uuid);
        }

        let before = self.status.clone();
        let status = update.status;
        if let Some(v) = status.mic_muted {
            self.status.mic_muted = v;
        }
        if let Some(v) = status.speaker_muted {
            self.status.speaker_muted = v;
        }
        if let Some(v) = status.video_muted {
            self.status.video_muted = v;
        }
        if let Some(v) = status.mic_muted2 {
            self.status.mic_muted2 = Some(v);
        }
        changes.status = before != self.status;

        changes
    }
}
