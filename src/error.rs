use serde::Serialize;
use thiserror::Error;

use crate::directory::{PeerId, TileId};
use crate::exclusive::LocalMode;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Media permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device enumeration failed: {0}")]
    EnumerationError(String),

    #[error("Media acquisition failed: {0}")]
    AcquisitionError(String),

    #[error("Cannot enable {requested} while {active} is active")]
    ModeConflict {
        requested: LocalMode,
        active: LocalMode,
    },

    #[error("Too many sources in session (limit: {limit})")]
    CapacityExceeded { limit: usize },

    #[error("Unknown participant: {0}")]
    UnknownParticipant(PeerId),

    #[error("Tile {0} has no stream")]
    TileNotPopulated(TileId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Coordinator is not running")]
    CoordinatorStopped,
}

/// How an error must be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the feature it concerns; shown with a retry affordance
    Fatal,
    /// Operation rejected; shown as a dismissible message
    User,
    /// Logged only
    Silent,
}

impl AppError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::PermissionDenied(_)
            | Self::EnumerationError(_)
            | Self::AcquisitionError(_)
            | Self::Timeout(_) => Severity::Fatal,
            Self::CapacityExceeded { .. } => Severity::User,
            Self::ModeConflict { .. }
            | Self::UnknownParticipant(_)
            | Self::TileNotPopulated(_) => Severity::Silent,
            Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::CoordinatorStopped => Severity::Fatal,
        }
    }

    /// Whether the user-facing retry affordance applies
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::EnumerationError(_)
                | Self::AcquisitionError(_)
                | Self::Timeout(_)
        )
    }

    /// Stable code for programmatic handling by the rendering layer
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::EnumerationError(_) => "enumeration_error",
            Self::AcquisitionError(_) => "acquisition_error",
            Self::ModeConflict { .. } => "mode_conflict",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::UnknownParticipant(_) => "unknown_participant",
            Self::TileNotPopulated(_) => "tile_not_populated",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Serialization(_) => "serialization_error",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal_error",
            Self::CoordinatorStopped => "coordinator_stopped",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classes() {
        assert_eq!(
            AppError::PermissionDenied("denied".into()).severity(),
            Severity::Fatal
        );
        assert_eq!(
            AppError::CapacityExceeded { limit: 4 }.severity(),
            Severity::User
        );
        assert_eq!(
            AppError::ModeConflict {
                requested: LocalMode::ScreenSharing,
                active: LocalMode::SecondarySource,
            }
            .severity(),
            Severity::Silent
        );
        assert_eq!(
            AppError::UnknownParticipant(PeerId::new("ghost")).severity(),
            Severity::Silent
        );
    }

    #[test]
    fn test_retryable_only_for_capture_failures() {
        assert!(AppError::EnumerationError("gone".into()).is_retryable());
        assert!(AppError::AcquisitionError("busy".into()).is_retryable());
        assert!(!AppError::CapacityExceeded { limit: 4 }.is_retryable());
        assert!(!AppError::Internal("bug".into()).is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = AppError::ModeConflict {
            requested: LocalMode::SecondarySource,
            active: LocalMode::ScreenSharing,
        };
        assert_eq!(
            err.to_string(),
            "Cannot enable secondary source while screen sharing is active"
        );
        assert_eq!(err.code(), "mode_conflict");
    }
}
