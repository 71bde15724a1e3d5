//! Media capture collaborator
//!
//! The coordinator never touches capture hardware itself. Enumeration and
//! stream acquisition go through a [`CaptureProvider`], which the embedding
//! application implements on top of its platform API.

pub mod fixed;

pub use fixed::{FixedCaptureProvider, FixedCaptureScript};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::devices::Device;
use crate::directory::StreamName;
use crate::error::Result;

/// What to capture for one local stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum MediaConstraints {
    /// Camera and/or microphone
    Devices {
        stream: StreamName,
        video: Option<Device>,
        audio: Option<Device>,
    },
    /// Desktop capture
    Screen,
}

impl MediaConstraints {
    pub fn stream(&self) -> StreamName {
        match self {
            Self::Devices { stream, .. } => *stream,
            Self::Screen => StreamName::ScreenShare,
        }
    }
}

/// Opaque handle for an acquired local stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamHandle {
    pub id: String,
    pub stream: StreamName,
}

/// Capture backend trait
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Ask for capture permission; labels are only visible afterwards
    ///
    /// Fails with `PermissionDenied` when the user declines.
    async fn request_access(&self) -> Result<()>;

    /// List audio and video inputs
    ///
    /// Fails with `EnumerationError` when the capability is unavailable.
    async fn enumerate_devices(&self) -> Result<Vec<Device>>;

    /// Open a local stream; fails with `AcquisitionError`
    async fn acquire_stream(&self, constraints: MediaConstraints) -> Result<MediaStreamHandle>;

    /// Stop a previously acquired stream
    async fn release_stream(&self, handle: MediaStreamHandle);

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
