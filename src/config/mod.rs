//! Coordinator configuration
//!
//! Every section falls back to its defaults, so a partial JSON file (or no
//! file at all) yields a usable configuration.

mod schema;

pub use schema::*;

use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, Result};

impl CoordinatorConfig {
    /// Load configuration from a JSON file and validate it
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let config: CoordinatorConfig =
            serde_json::from_str(&raw).map_err(|e| AppError::Config(e.to_string()))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tiles.max_remote == 0 {
            return Err(AppError::Config(
                "tiles.max_remote must be at least 1".to_string(),
            ));
        }
        if self.tiles.max_remote > usize::from(u8::MAX) - 1 {
            return Err(AppError::Config(format!(
                "tiles.max_remote must not exceed {}",
                u8::MAX - 1
            )));
        }
        if self.tiles.idle_dwell_ms == 0 {
            return Err(AppError::Config(
                "tiles.idle_dwell_ms must be positive".to_string(),
            ));
        }
        if self.events.channel_capacity == 0 || self.events.command_queue_capacity == 0 {
            return Err(AppError::Config(
                "event channel capacities must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn idle_dwell(&self) -> Duration {
        Duration::from_millis(self.tiles.idle_dwell_ms)
    }

    pub fn capture_timeout(&self) -> Option<Duration> {
        self.requests.capture_timeout_ms.map(Duration::from_millis)
    }

    pub fn enumeration_timeout(&self) -> Option<Duration> {
        self.requests.enumeration_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.tiles.idle_dwell_ms, 3000);
        assert_eq!(config.tiles.max_remote, 4);
        assert_eq!(config.devices.infrared_marker, " IR ");
        assert!(!config.session.privileged);
        assert!(config.capture_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coordinator.json");
        tokio::fs::write(
            &path,
            r#"{"session":{"privileged":true},"requests":{"capture_timeout_ms":5000}}"#,
        )
        .await
        .unwrap();

        let config = CoordinatorConfig::load(&path).await.unwrap();
        assert!(config.session.privileged);
        assert_eq!(config.session.default_title_prefix, "Participant #");
        assert_eq!(config.capture_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(config.tiles.max_remote, 4);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coordinator.json");
        tokio::fs::write(&path, r#"{"tiles":{"max_remote":0}}"#)
            .await
            .unwrap();

        let err = CoordinatorConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
