//! Stream and contact directory
//!
//! Maps participants to their presentation metadata and their visible
//! streams to tiles. Local streams live on fixed tiles (1 for the camera,
//! 2 for the secondary source or the screen share); remote streams take the
//! first free remote tile, up to the configured capacity.

pub mod contact;
pub mod types;

pub use contact::{Contact, ContactChanges, ContactUpdate, MuteKind, StatusFlags, StatusUpdate};
pub use types::{PeerId, StreamName, TileId, TileSide};

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::exclusive::LocalMode;

/// A stream as rendered on a tile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StreamKey {
    pub peer_id: PeerId,
    pub stream: StreamName,
}

impl StreamKey {
    pub fn new(peer_id: PeerId, stream: StreamName) -> Self {
        Self { peer_id, stream }
    }
}

/// Participants, their streams and the tiles those streams occupy
#[derive(Debug)]
pub struct Directory {
    local_peer: PeerId,
    local_contact: Contact,
    contacts: HashMap<PeerId, Contact>,
    local_slots: [Option<StreamName>; 2],
    remote_slots: Vec<Option<StreamKey>>,
}

impl Directory {
    pub fn new(local_peer: PeerId, max_remote: usize) -> Self {
        Self {
            local_contact: Contact::new(local_peer.clone()),
            local_peer,
            contacts: HashMap::new(),
            local_slots: [None, None],
            remote_slots: vec![None; max_remote],
        }
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn is_local(&self, peer_id: &PeerId) -> bool {
        *peer_id == self.local_peer
    }

    /// Merge partial information into a contact, creating it if needed
    pub fn upsert_contact(&mut self, peer_id: &PeerId, update: ContactUpdate) -> ContactChanges {
        if self.is_local(peer_id) {
            return self.local_contact.merge(update);
        }

        let mut created = false;
        let contact = self.contacts.entry(peer_id.clone()).or_insert_with(|| {
            created = true;
            Contact::new(peer_id.clone())
        });
        let mut changes = contact.merge(update);
        changes.created = created;
        if created {
            info!(peer = %peer_id, "Contact registered");
        }
        changes
    }

    pub fn contact(&self, peer_id: &PeerId) -> Option<&Contact> {
        if self.is_local(peer_id) {
            Some(&self.local_contact)
        } else {
            self.contacts.get(peer_id)
        }
    }

    pub fn local_contact(&self) -> &Contact {
        &self.local_contact
    }

    pub fn has_contact(&self, peer_id: &PeerId) -> bool {
        self.is_local(peer_id) || self.contacts.contains_key(peer_id)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    /// Forget a departed peer; returns the tiles its streams occupied
    pub fn remove_contact(&mut self, peer_id: &PeerId) -> Vec<TileId> {
        self.contacts.remove(peer_id);

        let mut released = Vec::new();
        for (i, slot) in self.remote_slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|key| key.peer_id == *peer_id) {
                *slot = None;
                released.push(TileId::remote(slot_number(i)));
            }
        }
        if !released.is_empty() {
            debug!(peer = %peer_id, tiles = released.len(), "Released tiles of departed peer");
        }
        released
    }

    /// Tile currently rendering `(peer_id, stream)`, if any
    pub fn index_for_peer_stream(&self, peer_id: &PeerId, stream: StreamName) -> Option<TileId> {
        if self.is_local(peer_id) {
            let idx = local_slot_index(stream);
            return (self.local_slots[idx] == Some(stream)).then(|| TileId::local(slot_number(idx)));
        }

        self.remote_slots
            .iter()
            .position(|slot| {
                slot.as_ref()
                    .is_some_and(|key| key.peer_id == *peer_id && key.stream == stream)
            })
            .map(|i| TileId::remote(slot_number(i)))
    }

    /// Give `(peer_id, stream)` a tile; idempotent for an already visible stream
    pub fn assign_tile(&mut self, peer_id: &PeerId, stream: StreamName) -> Result<TileId> {
        if let Some(tile) = self.index_for_peer_stream(peer_id, stream) {
            return Ok(tile);
        }

        if self.is_local(peer_id) {
            let idx = local_slot_index(stream);
            if let Some(occupant) = self.local_slots[idx] {
                // Only the second local tile is shared, by the two exclusive modes
                return Err(AppError::ModeConflict {
                    requested: exclusive_mode(stream),
                    active: exclusive_mode(occupant),
                });
            }
            self.local_slots[idx] = Some(stream);
            return Ok(TileId::local(slot_number(idx)));
        }

        let free = self
            .remote_slots
            .iter()
            .position(Option::is_none)
            .ok_or(AppError::CapacityExceeded {
                limit: self.remote_slots.len(),
            })?;
        self.remote_slots[free] = Some(StreamKey::new(peer_id.clone(), stream));
        let tile = TileId::remote(slot_number(free));
        debug!(peer = %peer_id, %stream, %tile, "Tile assigned");
        Ok(tile)
    }

    /// Free the tile of `(peer_id, stream)`; later arrivals may reuse it
    pub fn release_tile(&mut self, peer_id: &PeerId, stream: StreamName) -> Option<TileId> {
        let tile = self.index_for_peer_stream(peer_id, stream)?;
        match tile.side {
            TileSide::Local => self.local_slots[usize::from(tile.slot) - 1] = None,
            TileSide::Remote => self.remote_slots[usize::from(tile.slot) - 1] = None,
        }
        debug!(peer = %peer_id, %stream, %tile, "Tile released");
        Some(tile)
    }

    /// Stream rendered on `tile`
    pub fn stream_at(&self, tile: TileId) -> Option<StreamKey> {
        let idx = usize::from(tile.slot).checked_sub(1)?;
        match tile.side {
            TileSide::Local => self
                .local_slots
                .get(idx)
                .copied()
                .flatten()
                .map(|stream| StreamKey::new(self.local_peer.clone(), stream)),
            TileSide::Remote => self.remote_slots.get(idx).cloned().flatten(),
        }
    }

    /// All populated tiles, local first
    pub fn occupied_tiles(&self) -> Vec<(TileId, StreamKey)> {
        let local = (0..self.local_slots.len())
            .map(|i| TileId::local(slot_number(i)))
            .filter_map(|tile| self.stream_at(tile).map(|key| (tile, key)));
        let remote = self
            .remote_slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.clone().map(|key| (TileId::remote(slot_number(i)), key)));
        local.chain(remote).collect()
    }

    pub fn remote_stream_count(&self) -> usize {
        self.remote_slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn remote_capacity(&self) -> usize {
        self.remote_slots.len()
    }

    /// Display title for a tile, falling back to `<prefix><slot>`
    pub fn title_for(&self, tile: TileId, fallback_prefix: &str) -> String {
        self.stream_at(tile)
            .and_then(|key| self.contact(&key.peer_id))
            .and_then(|contact| contact.name.clone())
            .unwrap_or_else(|| format!("{}{}", fallback_prefix, tile.slot))
    }
}

fn local_slot_index(stream: StreamName) -> usize {
    match stream {
        StreamName::Default => 0,
        StreamName::ScreenShare | StreamName::Secondary => 1,
    }
}

fn exclusive_mode(stream: StreamName) -> LocalMode {
    match stream {
        StreamName::ScreenShare => LocalMode::ScreenSharing,
        StreamName::Default | StreamName::Secondary => LocalMode::SecondarySource,
    }
}

fn slot_number(index: usize) -> u8 {
    u8::try_from(index + 1).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory::new(PeerId::new("me"), 4)
    }

    #[test]
    fn test_local_tiles_are_fixed() {
        let mut dir = directory();
        let me = PeerId::new("me");
        assert_eq!(
            dir.assign_tile(&me, StreamName::Default).unwrap(),
            TileId::LOCAL_PRIMARY
        );
        assert_eq!(
            dir.assign_tile(&me, StreamName::ScreenShare).unwrap(),
            TileId::LOCAL_SECONDARY
        );
        assert_eq!(
            dir.index_for_peer_stream(&me, StreamName::ScreenShare),
            Some(TileId::LOCAL_SECONDARY)
        );
        assert_eq!(dir.index_for_peer_stream(&me, StreamName::Secondary), None);
    }

    #[test]
    fn test_second_local_tile_holds_one_stream() {
        let mut dir = directory();
        let me = PeerId::new("me");
        dir.assign_tile(&me, StreamName::ScreenShare).unwrap();

        let err = dir.assign_tile(&me, StreamName::Secondary).unwrap_err();
        assert!(matches!(
            err,
            AppError::ModeConflict {
                requested: LocalMode::SecondarySource,
                active: LocalMode::ScreenSharing,
            }
        ));
        assert_eq!(
            dir.stream_at(TileId::LOCAL_SECONDARY).map(|key| key.stream),
            Some(StreamName::ScreenShare)
        );

        dir.release_tile(&me, StreamName::ScreenShare);
        assert_eq!(
            dir.assign_tile(&me, StreamName::Secondary).unwrap(),
            TileId::LOCAL_SECONDARY
        );
    }

    #[test]
    fn test_remote_tiles_in_arrival_order() {
        let mut dir = directory();
        let a = PeerId::new("a");
        let b = PeerId::new("b");
        assert_eq!(dir.assign_tile(&a, StreamName::Default).unwrap(), TileId::remote(1));
        assert_eq!(dir.assign_tile(&b, StreamName::Default).unwrap(), TileId::remote(2));
        assert_eq!(dir.assign_tile(&a, StreamName::Secondary).unwrap(), TileId::remote(3));
        // Same pair again keeps its tile
        assert_eq!(dir.assign_tile(&b, StreamName::Default).unwrap(), TileId::remote(2));
        assert_eq!(dir.remote_stream_count(), 3);
    }

    #[test]
    fn test_fifth_remote_stream_is_rejected() {
        let mut dir = directory();
        for peer in ["a", "b", "c", "d"] {
            dir.assign_tile(&PeerId::new(peer), StreamName::Default).unwrap();
        }
        let before = dir.occupied_tiles();

        let err = dir
            .assign_tile(&PeerId::new("e"), StreamName::Default)
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded { limit: 4 }));
        assert_eq!(dir.occupied_tiles(), before);
    }

    #[test]
    fn test_released_slot_is_reused() {
        let mut dir = directory();
        for peer in ["a", "b", "c"] {
            dir.assign_tile(&PeerId::new(peer), StreamName::Default).unwrap();
        }
        assert_eq!(
            dir.release_tile(&PeerId::new("b"), StreamName::Default),
            Some(TileId::remote(2))
        );
        assert_eq!(dir.release_tile(&PeerId::new("b"), StreamName::Default), None);
        assert_eq!(
            dir.assign_tile(&PeerId::new("d"), StreamName::Default).unwrap(),
            TileId::remote(2)
        );
    }

    #[test]
    fn test_remove_contact_releases_all_streams() {
        let mut dir = directory();
        let a = PeerId::new("a");
        dir.upsert_contact(&a, ContactUpdate::default());
        dir.assign_tile(&a, StreamName::Default).unwrap();
        dir.assign_tile(&PeerId::new("b"), StreamName::Default).unwrap();
        dir.assign_tile(&a, StreamName::ScreenShare).unwrap();

        let released = dir.remove_contact(&a);
        assert_eq!(released, vec![TileId::remote(1), TileId::remote(3)]);
        assert!(!dir.has_contact(&a));
        assert_eq!(dir.remote_stream_count(), 1);
    }

    #[test]
    fn test_upsert_creates_then_merges() {
        let mut dir = directory();
        let a = PeerId::new("a");
        let changes = dir.upsert_contact(
            &a,
            ContactUpdate {
                name: Some("Bob".into()),
                uuid: Some("A".into()),
                ..Default::default()
            },
        );
        assert!(changes.created);

        let changes = dir.upsert_contact(
            &a,
            ContactUpdate {
                name: Some("Alice".into()),
                ..Default::default()
            },
        );
        assert!(!changes.created);
        let contact = dir.contact(&a).unwrap();
        assert_eq!(contact.uuid.as_deref(), Some("A"));
        assert_eq!(contact.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_titles_fall_back_to_slot() {
        let mut dir = directory();
        let a = PeerId::new("a");
        dir.assign_tile(&a, StreamName::Default).unwrap();
        assert_eq!(dir.title_for(TileId::remote(1), "Participant #"), "Participant #1");

        dir.upsert_contact(
            &a,
            ContactUpdate {
                name: Some("Alice".into()),
                ..Default::default()
            },
        );
        assert_eq!(dir.title_for(TileId::remote(1), "Participant #"), "Alice");
    }
}
