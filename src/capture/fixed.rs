//! Capture provider backed by a fixed device list
//!
//! Used by the headless driver and by tests. Failures can be scripted so
//! permission, enumeration and acquisition errors are reproducible.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{CaptureProvider, MediaConstraints, MediaStreamHandle};
use crate::devices::Device;
use crate::error::{AppError, Result};

/// Scripted failures and latency
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedCaptureScript {
    pub deny_access: bool,
    pub fail_enumeration: bool,
    pub fail_acquisition: bool,
    pub fail_screen: bool,
    /// Delay applied to every acquisition (milliseconds)
    pub acquisition_delay_ms: u64,
}

/// On-disk description for the headless driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedCaptureFile {
    pub devices: Vec<Device>,
    pub script: FixedCaptureScript,
}

#[derive(Default)]
struct FixedState {
    devices: Vec<Device>,
    script: FixedCaptureScript,
    active: Vec<MediaStreamHandle>,
    acquisitions: usize,
}

/// Capture provider with a fixed, replaceable device list
#[derive(Default)]
pub struct FixedCaptureProvider {
    state: Mutex<FixedState>,
}

impl FixedCaptureProvider {
    pub fn new(devices: Vec<Device>) -> Self {
        Self::with_script(devices, FixedCaptureScript::default())
    }

    pub fn with_script(devices: Vec<Device>, script: FixedCaptureScript) -> Self {
        Self {
            state: Mutex::new(FixedState {
                devices,
                script,
                ..Default::default()
            }),
        }
    }

    /// Load devices and script from a JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let file: FixedCaptureFile = serde_json::from_str(&raw)?;
        debug!(
            "Loaded {} capture devices from {}",
            file.devices.len(),
            path.display()
        );
        Ok(Self::with_script(file.devices, file.script))
    }

    /// Replace the device list (simulates hot-plug between enumerations)
    pub fn set_devices(&self, devices: Vec<Device>) {
        self.state.lock().devices = devices;
    }

    pub fn set_script(&self, script: FixedCaptureScript) {
        self.state.lock().script = script;
    }

    /// Streams acquired and not yet released
    pub fn active_streams(&self) -> Vec<MediaStreamHandle> {
        self.state.lock().active.clone()
    }

    /// Total acquisition attempts
    pub fn acquisitions(&self) -> usize {
        self.state.lock().acquisitions
    }
}

#[async_trait]
impl CaptureProvider for FixedCaptureProvider {
    async fn request_access(&self) -> Result<()> {
        if self.state.lock().script.deny_access {
            return Err(AppError::PermissionDenied(
                "NotAllowedError - Permission denied".to_string(),
            ));
        }
        Ok(())
    }

    async fn enumerate_devices(&self) -> Result<Vec<Device>> {
        let state = self.state.lock();
        if state.script.fail_enumeration {
            return Err(AppError::EnumerationError(
                "NotSupportedError - enumeration unavailable".to_string(),
            ));
        }
        Ok(state.devices.clone())
    }

    async fn acquire_stream(&self, constraints: MediaConstraints) -> Result<MediaStreamHandle> {
        let script = {
            let mut state = self.state.lock();
            state.acquisitions += 1;
            state.script.clone()
        };

        if script.acquisition_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(script.acquisition_delay_ms)).await;
        }

        let is_screen = matches!(constraints, MediaConstraints::Screen);
        if script.fail_acquisition || (is_screen && script.fail_screen) {
            return Err(AppError::AcquisitionError(format!(
                "could not start {} capture",
                constraints.stream()
            )));
        }

        let handle = MediaStreamHandle {
            id: uuid::Uuid::new_v4().to_string(),
            stream: constraints.stream(),
        };
        self.state.lock().active.push(handle.clone());
        Ok(handle)
    }

    async fn release_stream(&self, handle: MediaStreamHandle) {
        self.state.lock().active.retain(|h| h.id != handle.id);
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::DeviceKind;
    use crate::directory::StreamName;

    #[tokio::test]
    async fn test_scripted_failures() {
        let provider = FixedCaptureProvider::with_script(
            vec![Device::new("v0", DeviceKind::Video, "Front Camera")],
            FixedCaptureScript {
                deny_access: true,
                fail_screen: true,
                ..Default::default()
            },
        );

        assert!(matches!(
            provider.request_access().await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            provider.acquire_stream(MediaConstraints::Screen).await,
            Err(AppError::AcquisitionError(_))
        ));
        assert_eq!(provider.acquisitions(), 1);
        assert!(provider.active_streams().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let provider = FixedCaptureProvider::new(Vec::new());
        let handle = provider
            .acquire_stream(MediaConstraints::Devices {
                stream: StreamName::Secondary,
                video: None,
                audio: None,
            })
            .await
            .unwrap();
        assert_eq!(handle.stream, StreamName::Secondary);
        assert_eq!(provider.active_streams().len(), 1);

        provider.release_stream(handle).await;
        assert!(provider.active_streams().is_empty());
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        tokio::fs::write(
            &path,
            r#"{"devices":[{"id":"a0","kind":"audio","label":""}],"script":{"fail_enumeration":true}}"#,
        )
        .await
        .unwrap();

        let provider = FixedCaptureProvider::from_file(&path).await.unwrap();
        assert!(matches!(
            provider.enumerate_devices().await,
            Err(AppError::EnumerationError(_))
        ));
    }
}
