//! Host settings bridge
//!
//! The embedding application supplies one composite settings payload at
//! session start and may later push individual commands (source changes,
//! recording requests).

use serde::{Deserialize, Serialize};

use crate::capabilities::PtzCapabilities;
use crate::devices::SourceMatcher;
use crate::directory::ContactUpdate;

/// Names of the secondary camera and microphone; empty means none
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondSources {
    pub video: String,
    pub audio: String,
}

/// Composite settings payload sent once at session start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostSettings {
    pub contact_info: Option<ContactUpdate>,
    pub audio: Option<SourceMatcher>,
    pub video: Option<SourceMatcher>,
    pub mirror: Option<bool>,
    pub second_audio_video: Option<SecondSources>,
    pub ptz: Option<PtzCapabilities>,
    pub screen_control: Option<bool>,
}

impl HostSettings {
    /// Expand into the individual commands, in application order
    pub fn into_commands(self) -> Vec<HostCommand> {
        let mut commands = Vec::new();
        if let Some(contact) = self.contact_info {
            commands.push(HostCommand::ContactInfo(contact));
        }
        if let Some(audio) = self.audio {
            commands.push(HostCommand::AudioSource(audio));
        }
        if let Some(video) = self.video {
            commands.push(HostCommand::VideoSource(video));
        }
        if let Some(mirror) = self.mirror {
            commands.push(HostCommand::Mirror(mirror));
        }
        if let Some(sources) = self.second_audio_video {
            commands.push(HostCommand::SecondSources(sources));
        }
        if let Some(ptz) = self.ptz {
            commands.push(HostCommand::Ptz(ptz));
        }
        if let Some(enabled) = self.screen_control {
            commands.push(HostCommand::ScreenControl(enabled));
        }
        commands
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "snake_case")]
pub enum HostCommand {
    /// Apply everything, start the local stream, then signal ready
    Settings(HostSettings),
    ContactInfo(ContactUpdate),
    VideoSource(SourceMatcher),
    AudioSource(SourceMatcher),
    SecondSources(SecondSources),
    Mirror(bool),
    Ptz(PtzCapabilities),
    ScreenControl(bool),
    /// A camera was unplugged; payload is a label substring
    VideoSourceRemoved(String),
    StartRecording,
    StopRecording,
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Settings(_) => "settings",
            Self::ContactInfo(_) => "contact_info",
            Self::VideoSource(_) => "video_source",
            Self::AudioSource(_) => "audio_source",
            Self::SecondSources(_) => "second_sources",
            Self::Mirror(_) => "mirror",
            Self::Ptz(_) => "ptz",
            Self::ScreenControl(_) => "screen_control",
            Self::VideoSourceRemoved(_) => "video_source_removed",
            Self::StartRecording => "start_recording",
            Self::StopRecording => "stop_recording",
        }
    }
}
