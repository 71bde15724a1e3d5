//! Identifiers shared by the directory, the election and the tile machinery

use serde::{Deserialize, Serialize};
use std::fmt;

/// Peer identifier assigned by the signaling transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Logical stream name within one participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamName {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "screenshare", alias = "ScreenShare")]
    ScreenShare,
    #[serde(rename = "secondary", alias = "2ndStream")]
    Secondary,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ScreenShare => "screenshare",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the layout a tile belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileSide {
    Local,
    Remote,
}

/// Presentation slot, 1-based within its side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub side: TileSide,
    pub slot: u8,
}

impl TileId {
    /// Local primary camera tile
    pub const LOCAL_PRIMARY: TileId = TileId::local(1);
    /// Local secondary / screen-share tile
    pub const LOCAL_SECONDARY: TileId = TileId::local(2);

    pub const fn local(slot: u8) -> Self {
        Self {
            side: TileSide::Local,
            slot,
        }
    }

    pub const fn remote(slot: u8) -> Self {
        Self {
            side: TileSide::Remote,
            slot,
        }
    }

    pub fn is_local(&self) -> bool {
        self.side == TileSide::Local
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            TileSide::Local => write!(f, "local#{}", self.slot),
            TileSide::Remote => write!(f, "remote#{}", self.slot),
        }
    }
}
