use serde::{Deserialize, Serialize};

/// Main coordinator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Tile activity and capacity settings
    pub tiles: TileConfig,
    /// Timeouts for requests sent to the capture collaborator
    pub requests: RequestConfig,
    /// Device filtering and default selection
    pub devices: DeviceConfig,
    /// Viewer role and presentation defaults
    pub session: SessionConfig,
    /// Queue and channel sizes
    pub events: EventConfig,
}

/// Tile configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Time without interaction before a tile hides its controls (ms)
    pub idle_dwell_ms: u64,
    /// Maximum concurrently visible remote streams
    pub max_remote: usize,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            idle_dwell_ms: 3000,
            max_remote: 4,
        }
    }
}

/// Request timeouts; `None` waits for the collaborator indefinitely
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Stream acquisition timeout (ms)
    pub capture_timeout_ms: Option<u64>,
    /// Permission request plus enumeration timeout (ms)
    pub enumeration_timeout_ms: Option<u64>,
}

/// Device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Label token marking infra-red cameras, which cannot be used
    pub infrared_marker: String,
    /// Case-insensitive label fragments of front-facing cameras
    pub front_facing_markers: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            infrared_marker: " IR ".to_string(),
            front_facing_markers: vec!["avant".to_string(), "front".to_string()],
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Moderator role: may set a durable, broadcast primary view
    pub privileged: bool,
    /// Title prefix used when a tile has no contact name
    pub default_title_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            privileged: false,
            default_title_prefix: "Participant #".to_string(),
        }
    }
}

/// Event configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Event bus ring buffer size
    pub channel_capacity: usize,
    /// Coordinator command queue size
    pub command_queue_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            command_queue_capacity: 64,
        }
    }
}
