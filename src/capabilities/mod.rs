//! Per-participant capability table
//!
//! Capabilities decide which controls a tile offers. The local entry is
//! always present; remote entries live exactly as long as the matching
//! contact.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::directory::PeerId;
use crate::error::{AppError, Result};

/// Pan/tilt/zoom controls a participant exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtzCapabilities {
    pub zoom: bool,
    pub presets: bool,
    pub settings: bool,
}

impl PtzCapabilities {
    pub fn any(&self) -> bool {
        self.zoom || self.presets || self.settings
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Capabilities {
    pub supports_second_source: bool,
    pub supports_screen_control: bool,
    pub supports_screen_sharing: bool,
    pub ptz: PtzCapabilities,
}

/// Partial capability announcement; unset fields keep their value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CapabilityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_second_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_screen_control: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_screen_sharing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptz: Option<PtzCapabilities>,
}

impl Capabilities {
    /// Apply a partial update, returning whether anything changed
    pub fn apply(&mut self, update: &CapabilityUpdate) -> bool {
        let before = *self;
        if let Some(v) = update.supports_second_source {
            self.supports_second_source = v;
        }
        if let Some(v) = update.supports_screen_control {
            self.supports_screen_control = v;
        }
        if let Some(v) = update.supports_screen_sharing {
            self.supports_screen_sharing = v;
        }
        if let Some(v) = update.ptz {
            self.ptz = v;
        }
        before != *self
    }
}

#[derive(Debug, Default)]
pub struct CapabilityTable {
    local: Capabilities,
    remote: HashMap<PeerId, Capabilities>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(&self) -> &Capabilities {
        &self.local
    }

    pub fn set_local(&mut self, update: &CapabilityUpdate) -> bool {
        self.local.apply(update)
    }

    /// Create an all-false entry for a newly known participant
    pub fn register(&mut self, peer_id: &PeerId) {
        self.remote.entry(peer_id.clone()).or_default();
    }

    pub fn unregister(&mut self, peer_id: &PeerId) -> Option<Capabilities> {
        self.remote.remove(peer_id)
    }

    /// Update a remote participant's capabilities
    ///
    /// Fails with `UnknownParticipant` when no entry was registered.
    pub fn set_remote(&mut self, peer_id: &PeerId, update: &CapabilityUpdate) -> Result<bool> {
        let entry = self
            .remote
            .get_mut(peer_id)
            .ok_or_else(|| AppError::UnknownParticipant(peer_id.clone()))?;
        let changed = entry.apply(update);
        if changed {
            debug!(peer = %peer_id, ?entry, "Capabilities updated");
        }
        Ok(changed)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&Capabilities> {
        self.remote.get(peer_id)
    }

    pub fn remote_entries(&self) -> impl Iterator<Item = (&PeerId, &Capabilities)> {
        self.remote.iter()
    }

    pub fn remote_count(&self) -> usize {
        self.remote.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_entry_lifecycle() {
        let mut table = CapabilityTable::new();
        let peer = PeerId::new("a");

        table.register(&peer);
        assert_eq!(table.get(&peer), Some(&Capabilities::default()));

        let changed = table
            .set_remote(
                &peer,
                &CapabilityUpdate {
                    supports_screen_sharing: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(changed);
        assert!(table.get(&peer).unwrap().supports_screen_sharing);

        table.unregister(&peer);
        assert!(table.get(&peer).is_none());
        assert_eq!(table.remote_count(), 0);
    }

    #[test]
    fn test_unknown_participant_rejected() {
        let mut table = CapabilityTable::new();
        let err = table
            .set_remote(&PeerId::new("ghost"), &CapabilityUpdate::default())
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownParticipant(_)));
        assert_eq!(table.remote_count(), 0);
    }

    #[test]
    fn test_register_keeps_existing_entry() {
        let mut table = CapabilityTable::new();
        let peer = PeerId::new("a");
        table.register(&peer);
        table
            .set_remote(
                &peer,
                &CapabilityUpdate {
                    supports_second_source: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        table.register(&peer);
        assert!(table.get(&peer).unwrap().supports_second_source);
    }

    #[test]
    fn test_partial_update_wire_format() {
        let update: CapabilityUpdate =
            serde_json::from_str(r#"{"supportsScreenControl":true,"ptz":{"zoom":true}}"#).unwrap();
        let mut caps = Capabilities::default();
        assert!(caps.apply(&update));
        assert!(caps.supports_screen_control);
        assert!(caps.ptz.any());
        assert!(!caps.apply(&update));
    }
}
