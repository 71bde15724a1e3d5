//! Device and selection types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Audio,
    Video,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Enumerated capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Collaborator-specific identifier (not stable across sessions)
    pub id: String,
    pub kind: DeviceKind,
    /// Human-readable label; empty until capture permission is granted
    #[serde(default)]
    pub label: String,
}

impl Device {
    pub fn new(id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }

    /// Label, or the device id for unlabeled devices
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Device request from the host: a label substring and an optional index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMatcher {
    pub name: String,
    pub index: Option<usize>,
}

impl SourceMatcher {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn by_index(index: usize) -> Self {
        Self {
            name: String::new(),
            index: Some(index),
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// One of the four selectable capture slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSlot {
    PrimaryVideo,
    PrimaryAudio,
    SecondaryVideo,
    SecondaryAudio,
}

impl SelectionSlot {
    pub const ALL: [SelectionSlot; 4] = [
        Self::PrimaryVideo,
        Self::PrimaryAudio,
        Self::SecondaryVideo,
        Self::SecondaryAudio,
    ];

    pub fn primary(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Video => Self::PrimaryVideo,
            DeviceKind::Audio => Self::PrimaryAudio,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::PrimaryVideo | Self::SecondaryVideo => DeviceKind::Video,
            Self::PrimaryAudio | Self::SecondaryAudio => DeviceKind::Audio,
        }
    }
}

/// Current device selection; `None` means unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSelection {
    pub primary_video: Option<usize>,
    pub primary_audio: Option<usize>,
    pub secondary_video: Option<usize>,
    pub secondary_audio: Option<usize>,
    pub mirror_local_primary: bool,
}

impl Default for SourceSelection {
    fn default() -> Self {
        Self {
            primary_video: None,
            primary_audio: None,
            secondary_video: None,
            secondary_audio: None,
            mirror_local_primary: true,
        }
    }
}

impl SourceSelection {
    pub fn get(&self, slot: SelectionSlot) -> Option<usize> {
        match slot {
            SelectionSlot::PrimaryVideo => self.primary_video,
            SelectionSlot::PrimaryAudio => self.primary_audio,
            SelectionSlot::SecondaryVideo => self.secondary_video,
            SelectionSlot::SecondaryAudio => self.secondary_audio,
        }
    }

    pub fn set(&mut self, slot: SelectionSlot, index: Option<usize>) {
        match slot {
            SelectionSlot::PrimaryVideo => self.primary_video = index,
            SelectionSlot::PrimaryAudio => self.primary_audio = index,
            SelectionSlot::SecondaryVideo => self.secondary_video = index,
            SelectionSlot::SecondaryAudio => self.secondary_audio = index,
        }
    }

    /// Whether any secondary source is configured
    pub fn has_secondary(&self) -> bool {
        self.secondary_video.is_some() || self.secondary_audio.is_some()
    }
}
