//! Source registry: enumerated devices and the current selection
//!
//! Device ids handed out by capture backends are not stable between
//! sessions, labels are. Every selection therefore remembers the label of
//! the device it resolved to, and each re-enumeration re-resolves indices
//! from those labels against the new device list.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::types::{Device, DeviceKind, SelectionSlot, SourceMatcher, SourceSelection};
use crate::capture::CaptureProvider;
use crate::config::DeviceConfig;
use crate::error::Result;

/// Snapshot of both device lists after an enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceLists {
    pub video: Vec<Device>,
    pub audio: Vec<Device>,
}

/// Result of resolving the secondary sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryResolution {
    pub video: Option<usize>,
    pub audio: Option<usize>,
}

impl SecondaryResolution {
    /// Whether a second source is available at all
    pub fn available(&self) -> bool {
        self.video.is_some() || self.audio.is_some()
    }
}

/// Enumerated capture devices and selected indices
#[derive(Debug)]
pub struct SourceRegistry {
    config: DeviceConfig,
    video: Vec<Device>,
    audio: Vec<Device>,
    selection: SourceSelection,
    remembered: HashMap<SelectionSlot, String>,
    enumerated: bool,
}

impl SourceRegistry {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            video: Vec::new(),
            audio: Vec::new(),
            selection: SourceSelection::default(),
            remembered: HashMap::new(),
            enumerated: false,
        }
    }

    /// Ask for permission, enumerate and reset both lists
    ///
    /// Nothing changes unless both steps succeed.
    pub async fn refresh_devices(&mut self, capture: &dyn CaptureProvider) -> Result<DeviceLists> {
        capture.request_access().await?;
        let devices = capture.enumerate_devices().await?;
        self.apply_enumeration(devices);
        Ok(self.lists())
    }

    /// Replace both lists with a fresh enumeration result
    pub fn apply_enumeration(&mut self, devices: Vec<Device>) {
        self.video.clear();
        self.audio.clear();

        for device in devices {
            match device.kind {
                DeviceKind::Video => {
                    if self.is_infrared(&device) {
                        debug!("Skipping infra-red camera: {}", device.label);
                        continue;
                    }
                    self.video.push(device);
                }
                DeviceKind::Audio => self.audio.push(device),
            }
        }

        info!(
            "Enumerated {} video and {} audio devices",
            self.video.len(),
            self.audio.len()
        );

        self.enumerated = true;
        self.revalidate();
        self.select_default_primary();
    }

    fn is_infrared(&self, device: &Device) -> bool {
        !self.config.infrared_marker.is_empty() && device.label.contains(&self.config.infrared_marker)
    }

    pub fn is_enumerated(&self) -> bool {
        self.enumerated
    }

    pub fn lists(&self) -> DeviceLists {
        DeviceLists {
            video: self.video.clone(),
            audio: self.audio.clone(),
        }
    }

    pub fn devices(&self, kind: DeviceKind) -> &[Device] {
        match kind {
            DeviceKind::Video => &self.video,
            DeviceKind::Audio => &self.audio,
        }
    }

    pub fn selection(&self) -> &SourceSelection {
        &self.selection
    }

    /// Device currently selected for `slot`
    pub fn selected_device(&self, slot: SelectionSlot) -> Option<&Device> {
        let index = self.selection.get(slot)?;
        self.devices(slot.kind()).get(index)
    }

    /// Resolve a primary-device request without applying it
    ///
    /// Label substring first, then the explicit index, otherwise `None`
    /// (the caller leaves the selection unchanged).
    pub fn resolve_primary(&self, kind: DeviceKind, matcher: &SourceMatcher) -> Option<usize> {
        if let Some(index) = self.find_by_name(kind, &matcher.name, kind == DeviceKind::Audio) {
            return Some(index);
        }

        match matcher.index {
            Some(index) if index < self.devices(kind).len() => {
                debug!("No {} device named '{}', using index {}", kind, matcher.name, index);
                Some(index)
            }
            Some(index) => {
                warn!(
                    "Ignoring {} index {} ({} devices available)",
                    kind,
                    index,
                    self.devices(kind).len()
                );
                None
            }
            None => None,
        }
    }

    /// Resolve and apply a primary-device request
    ///
    /// Returns the selected index, or `None` when nothing matched and the
    /// selection was left unchanged.
    pub fn select_primary(&mut self, kind: DeviceKind, matcher: &SourceMatcher) -> Option<usize> {
        let index = self.resolve_primary(kind, matcher)?;
        self.commit(SelectionSlot::primary(kind), Some(index));
        Some(index)
    }

    /// Fill unset primary slots with defaults
    ///
    /// Video prefers a front-facing camera, then the first device; audio
    /// always takes the first device.
    pub fn select_default_primary(&mut self) {
        if self.selection.primary_video.is_none() && !self.video.is_empty() {
            let front = self.video.iter().position(|device| {
                let label = device.label.to_lowercase();
                self.config
                    .front_facing_markers
                    .iter()
                    .any(|marker| label.contains(&marker.to_lowercase()))
            });
            if front.is_none() {
                debug!("No front-facing camera found, using first video device");
            }
            self.commit(SelectionSlot::PrimaryVideo, Some(front.unwrap_or(0)));
        }

        if self.selection.primary_audio.is_none() && !self.audio.is_empty() {
            self.commit(SelectionSlot::PrimaryAudio, Some(0));
        }
    }

    /// Resolve both secondary sources; unmatched names clear the slot
    pub fn select_secondary(&mut self, video: &str, audio: &str) -> SecondaryResolution {
        let resolution = SecondaryResolution {
            video: self.find_by_name(DeviceKind::Video, video, false),
            audio: self.find_by_name(DeviceKind::Audio, audio, false),
        };
        self.commit(SelectionSlot::SecondaryVideo, resolution.video);
        self.commit(SelectionSlot::SecondaryAudio, resolution.audio);
        info!(
            "Secondary sources: video={:?}, audio={:?}",
            resolution.video, resolution.audio
        );
        resolution
    }

    /// Drop the first device whose label contains `label`
    pub fn remove_device(&mut self, kind: DeviceKind, label: &str) -> Option<Device> {
        let list = match kind {
            DeviceKind::Video => &mut self.video,
            DeviceKind::Audio => &mut self.audio,
        };
        let Some(position) = list.iter().position(|device| device.label.contains(label)) else {
            debug!("No need to remove {} - not in {} list", label, kind);
            return None;
        };

        let removed = list.remove(position);
        info!("Removed {} device: {}", kind, removed.label);
        self.revalidate();
        Some(removed)
    }

    /// Set the local mirror flag; returns whether it changed
    pub fn set_mirror(&mut self, mirror: bool) -> bool {
        let changed = self.selection.mirror_local_primary != mirror;
        self.selection.mirror_local_primary = mirror;
        changed
    }

    /// Apply a resolved index to a slot and remember the device label
    pub fn commit(&mut self, slot: SelectionSlot, index: Option<usize>) {
        let label = index
            .and_then(|i| self.devices(slot.kind()).get(i))
            .map(|device| device.display_name().to_string());

        match label {
            Some(label) => {
                self.remembered.insert(slot, label);
                self.selection.set(slot, index);
            }
            None => {
                self.remembered.remove(&slot);
                self.selection.set(slot, None);
            }
        }
    }

    fn find_by_name(&self, kind: DeviceKind, name: &str, id_fallback: bool) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.devices(kind).iter().position(|device| {
            let candidate = if id_fallback {
                device.display_name()
            } else {
                device.label.as_str()
            };
            candidate.contains(name)
        })
    }

    /// Re-resolve every slot against the current lists
    fn revalidate(&mut self) {
        for slot in SelectionSlot::ALL {
            let devices = self.devices(slot.kind());
            let resolved = match self.remembered.get(&slot) {
                // Current index first when it still carries the label (duplicate labels)
                Some(label) => self
                    .selection
                    .get(slot)
                    .filter(|i| devices.get(*i).is_some_and(|d| d.display_name() == label))
                    .or_else(|| devices.iter().position(|device| device.display_name() == label)),
                None => self.selection.get(slot).filter(|i| *i < devices.len()),
            };

            if resolved != self.selection.get(slot) {
                debug!(
                    "Selection {:?} moved from {:?} to {:?}",
                    slot,
                    self.selection.get(slot),
                    resolved
                );
            }
            self.selection.set(slot, resolved);
        }
    }
}
